//! Verification through a local Hardhat project (`npx hardhat verify`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::process::Command;

use super::{VerificationOutcome, VerificationRequest, VerificationService};

/// Lines of tool output kept as the diagnostic of a failure.
const DIAGNOSTIC_TAIL_LINES: usize = 5;

/// Classify the output of a `hardhat verify` run.
pub fn classify_hardhat_output(success: bool, stdout: &str, stderr: &str) -> VerificationOutcome {
    let combined = format!("{stdout}\n{stderr}");

    if combined.to_lowercase().contains("already verified") {
        VerificationOutcome::already_verified(tail(&combined, 1))
    } else if success {
        VerificationOutcome::success(tail(stdout, 1))
    } else {
        VerificationOutcome::failed(tail(&combined, DIAGNOSTIC_TAIL_LINES))
    }
}

fn tail(text: &str, lines: usize) -> String {
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    kept[kept.len().saturating_sub(lines)..].join("\n")
}

/// Runs the Hardhat verify task of an existing project.
#[derive(Debug, Clone)]
pub struct HardhatVerifier {
    program: String,
    project_dir: Option<PathBuf>,
    network_alias: Option<String>,
}

impl HardhatVerifier {
    pub fn new(project_dir: Option<PathBuf>, network_alias: Option<String>) -> Self {
        Self {
            program: "npx".to_string(),
            project_dir,
            network_alias,
        }
    }

    /// Arguments passed to `npx`. Constructor arguments follow the address, in order.
    pub fn command_args(&self, request: &VerificationRequest) -> Vec<String> {
        let network = self
            .network_alias
            .clone()
            .unwrap_or_else(|| request.network.clone());

        let mut args = vec![
            "hardhat".to_string(),
            "verify".to_string(),
            "--network".to_string(),
            network,
            "--contract".to_string(),
            request.contract.clone(),
            request.contract_address.to_checksum(None),
        ];
        args.extend(request.arguments.cli_args());
        args
    }
}

impl VerificationService for HardhatVerifier {
    async fn submit(&self, request: &VerificationRequest) -> Result<VerificationOutcome> {
        let args = self.command_args(request);
        tracing::debug!(program = %self.program, ?args, "Running hardhat verify");

        let mut command = Command::new(&self.program);
        command.args(&args).kill_on_drop(true);
        if let Some(dir) = &self.project_dir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to run {} hardhat verify", self.program))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::trace!(%stdout, %stderr, code = ?output.status.code(), "hardhat verify finished");

        Ok(classify_hardhat_output(
            output.status.success(),
            &stdout,
            &stderr,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        params::{ArgValue, ConstructorArg, ConstructorArgumentSet},
        verify::VerificationStatus,
    };
    use alloy_core::primitives::{U256, address};

    fn request() -> VerificationRequest {
        VerificationRequest {
            contract_address: address!("367Fd09F5cD2c7ceB598D28b8a1e0721D2BA78C2"),
            network: "goerli".to_string(),
            contract: "contracts/JackpotBlock.sol:JackpotBlock".to_string(),
            arguments: ConstructorArgumentSet::new(vec![
                ConstructorArg {
                    name: "betToken".to_string(),
                    value: ArgValue::Address(address!(
                        "98339D8C260052B7ad81c28c16C0b98420f2B46a"
                    )),
                },
                ConstructorArg {
                    name: "betPrice".to_string(),
                    value: ArgValue::NumericString("1000000".parse().unwrap()),
                },
                ConstructorArg {
                    name: "roundDuration".to_string(),
                    value: ArgValue::Uint(U256::from(60)),
                },
            ]),
        }
    }

    #[test]
    fn test_command_args_order() {
        let verifier = HardhatVerifier::new(None, None);
        assert_eq!(
            verifier.command_args(&request()),
            vec![
                "hardhat",
                "verify",
                "--network",
                "goerli",
                "--contract",
                "contracts/JackpotBlock.sol:JackpotBlock",
                "0x367Fd09F5cD2c7ceB598D28b8a1e0721D2BA78C2",
                "0x98339D8C260052B7ad81c28c16C0b98420f2B46a",
                "1000000",
                "60",
            ]
        );
    }

    #[test]
    fn test_network_alias_overrides_name() {
        let verifier = HardhatVerifier::new(None, Some("goerli-alchemy".to_string()));
        let args = verifier.command_args(&request());
        assert_eq!(args[3], "goerli-alchemy");
    }

    #[test]
    fn test_classify_success() {
        let outcome = classify_hardhat_output(
            true,
            "Successfully submitted source code for contract\nSuccessfully verified contract JackpotBlock on Etherscan.\n",
            "",
        );
        assert_eq!(outcome.status, VerificationStatus::Success);
        assert!(outcome.diagnostic.contains("Successfully verified"));
    }

    #[test]
    fn test_classify_already_verified_even_on_nonzero_exit() {
        let outcome = classify_hardhat_output(false, "", "Error: Contract source code already verified\n");
        assert_eq!(outcome.status, VerificationStatus::AlreadyVerified);

        let outcome = classify_hardhat_output(true, "The contract 0x367F is already verified.\n", "");
        assert_eq!(outcome.status, VerificationStatus::AlreadyVerified);
    }

    #[test]
    fn test_classify_failure_keeps_tail() {
        let stderr = (1..=10)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let outcome = classify_hardhat_output(false, "", &stderr);
        assert_eq!(outcome.status, VerificationStatus::Failed);
        assert_eq!(outcome.diagnostic, "line 6\nline 7\nline 8\nline 9\nline 10");
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let mut verifier = HardhatVerifier::new(None, None);
        verifier.program = "jackpot-no-such-program".to_string();
        assert!(verifier.submit(&request()).await.is_err());
    }
}
