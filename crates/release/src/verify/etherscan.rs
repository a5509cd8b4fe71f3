//! Etherscan-compatible verification API.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{VerificationOutcome, VerificationRequest, VerificationService};
use crate::config::Secret;

/// Timeout for a single explorer request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default interval between `checkverifystatus` polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default number of status checks before giving up on a queued submission.
const DEFAULT_MAX_POLLS: usize = 24;

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

/// Hardhat build-info file: the exact compiler input used for the artifact.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfo {
    solc_long_version: String,
    input: Value,
}

/// Why a status poll did not produce a verdict.
#[derive(Debug)]
enum StatusError {
    Pending(String),
    Transport(anyhow::Error),
}

/// Classify the `result` text of an Etherscan response.
///
/// Returns `None` while the submission is still queued.
pub fn classify_etherscan_result(result: &str) -> Option<VerificationOutcome> {
    let lower = result.to_lowercase();

    if lower.contains("already verified") {
        Some(VerificationOutcome::already_verified(result))
    } else if lower.starts_with("pass") {
        Some(VerificationOutcome::success(result))
    } else if lower.contains("pending in queue") || lower.contains("in progress") {
        None
    } else {
        Some(VerificationOutcome::failed(result))
    }
}

/// Submits standard-json source to an Etherscan-style API and polls for the verdict.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    api_url: Url,
    api_key: Secret,
    build_info: PathBuf,
    compiler_version: Option<String>,
    poll_interval: Duration,
    max_polls: usize,
}

impl EtherscanVerifier {
    pub fn new(
        api_url: Url,
        api_key: Secret,
        build_info: PathBuf,
        compiler_version: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url,
            api_key,
            build_info,
            compiler_version,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    /// Check the status every `poll_interval`, at most `max_polls` times.
    pub fn with_polling(mut self, poll_interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self
    }

    fn load_build_info(&self) -> Result<BuildInfo> {
        let content = std::fs::read_to_string(&self.build_info).with_context(|| {
            format!("Failed to read build info {}", self.build_info.display())
        })?;
        serde_json::from_str(&content).context("Failed to parse build info JSON")
    }

    async fn send_source(&self, request: &VerificationRequest) -> Result<EtherscanResponse> {
        let build_info = self.load_build_info()?;
        let compiler_version = self
            .compiler_version
            .clone()
            .unwrap_or_else(|| format!("v{}", build_info.solc_long_version));
        let source_code =
            serde_json::to_string(&build_info.input).context("Failed to encode compiler input")?;
        let address = request.contract_address.to_checksum(None);
        let constructor_args = hex::encode(request.arguments.abi_encode());

        tracing::debug!(
            api_url = %self.api_url,
            %compiler_version,
            constructor_args = %constructor_args,
            "Sending verifysourcecode request"
        );

        let form = [
            ("apikey", self.api_key.expose()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source_code.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.contract.as_str()),
            ("compilerversion", compiler_version.as_str()),
            // Sic: the API spells it this way.
            ("constructorArguements", constructor_args.as_str()),
        ];

        self.client
            .post(self.api_url.clone())
            .form(&form)
            .send()
            .await
            .context("Failed to send verifysourcecode request")?
            .json()
            .await
            .context("Failed to parse verifysourcecode response")
    }

    async fn check_status(&self, guid: &str) -> Result<VerificationOutcome, StatusError> {
        let response: EtherscanResponse = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("apikey", self.api_key.expose()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await
            .context("Failed to send checkverifystatus request")
            .map_err(StatusError::Transport)?
            .json()
            .await
            .context("Failed to parse checkverifystatus response")
            .map_err(StatusError::Transport)?;

        classify_etherscan_result(&response.result).ok_or(StatusError::Pending(response.result))
    }
}

impl VerificationService for EtherscanVerifier {
    async fn submit(&self, request: &VerificationRequest) -> Result<VerificationOutcome> {
        let response = self.send_source(request).await?;

        if response.status != "1" {
            tracing::debug!(message = %response.message, result = %response.result, "Submission refused");
            return Ok(classify_etherscan_result(&response.result)
                .unwrap_or_else(|| VerificationOutcome::failed(response.result)));
        }

        let guid = response.result;
        tracing::info!(%guid, "Source submitted, waiting for explorer verdict...");

        let backoff = ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(self.max_polls.saturating_sub(1));

        let verdict = (|| self.check_status(&guid))
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .notify(|err: &StatusError, _| {
                tracing::trace!(state = ?err, %guid, "Verification not settled yet")
            })
            .await;

        match verdict {
            Ok(outcome) => Ok(outcome),
            Err(StatusError::Pending(result)) => Ok(VerificationOutcome::failed(format!(
                "still pending after {} status checks (guid {}): {}",
                self.max_polls, guid, result
            ))),
            Err(StatusError::Transport(e)) => Err(e),
        }
    }
}
