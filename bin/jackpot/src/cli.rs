use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use jackpot_release::{CONFIG_FILENAME, DEFAULT_RECORDS_DIR};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "jackpot")]
#[command(
    author,
    version,
    about = "Deploy the jackpot contracts and verify them on a block explorer"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "JACKPOT_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the release configuration, or to the directory holding it.
    ///
    /// Relative artifact paths are resolved against the configuration's directory.
    #[arg(short, long, alias = "conf", env = "JACKPOT_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a starter configuration file.
    Init {
        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,
    },

    /// Show the constructor arguments a release would use. Makes no network calls.
    Plan {
        #[command(flatten)]
        target: Target,
    },

    /// Deploy without verifying.
    Deploy {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        run: RunOptions,
    },

    /// Verify a deployed contract.
    ///
    /// Without `--address`, the address and arguments come from the deployment record.
    Verify {
        /// The network the contract lives on.
        #[arg(short, long)]
        network: String,

        /// The contract to verify. May be omitted when the configuration declares only one.
        #[arg(long)]
        contract: Option<String>,

        /// Address of the deployed contract. Arguments are re-bound from the configuration.
        ///
        /// Only the explorer settings are used: no key or RPC endpoint is needed.
        #[arg(long)]
        address: Option<String>,

        /// Directory holding deployment records.
        #[arg(long, env = "JACKPOT_RECORDS", default_value = DEFAULT_RECORDS_DIR)]
        records: PathBuf,
    },

    /// Deploy then verify, one network after the other.
    Release {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        run: RunOptions,
    },
}

/// Which contract, on which networks.
#[derive(Debug, Clone, Args)]
pub struct Target {
    /// Network to release on. Repeat to release on several networks in turn.
    #[arg(short, long = "network", required = true)]
    pub networks: Vec<String>,

    /// The contract to release. May be omitted when the configuration declares only one.
    #[arg(long)]
    pub contract: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct RunOptions {
    /// Deploy even if a deployment record already exists for the network.
    #[arg(long, env = "JACKPOT_REDEPLOY", default_value_t = false)]
    pub redeploy: bool,

    /// Run against an in-memory chain and explorer. Nothing is sent and no record is written.
    #[arg(long)]
    pub dry_run: bool,

    /// Directory holding deployment records.
    #[arg(long, env = "JACKPOT_RECORDS", default_value = DEFAULT_RECORDS_DIR)]
    pub records: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_with_several_networks() {
        let cli = Cli::try_parse_from([
            "jackpot", "release", "--network", "goerli", "-n", "gnosis", "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Command::Release { target, run } => {
                assert_eq!(target.networks, ["goerli", "gnosis"]);
                assert!(run.dry_run);
                assert!(!run.redeploy);
                assert_eq!(run.records, PathBuf::from(DEFAULT_RECORDS_DIR));
            }
            _ => panic!("expected the release command"),
        }
    }

    #[test]
    fn test_deploy_requires_a_network() {
        assert!(Cli::try_parse_from(["jackpot", "deploy"]).is_err());
    }

    #[test]
    fn test_verify_with_address() {
        let cli = Cli::try_parse_from([
            "jackpot",
            "--verbosity",
            "debug",
            "verify",
            "--network",
            "goerli",
            "--address",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
        ])
        .unwrap();

        assert_eq!(cli.verbosity, LevelFilter::DEBUG);
        assert!(matches!(
            cli.command,
            Command::Verify { ref network, address: Some(_), .. } if network == "goerli"
        ));
    }
}
