//! Terminal tables.

use comfy_table::{Table, presets::UTF8_FULL};
use jackpot_release::{ArgValue, ConstructorArgumentSet, ReleaseReport};

fn table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table
}

fn kind(value: &ArgValue) -> &'static str {
    match value {
        ArgValue::Address(_) => "address",
        ArgValue::Uint(_) => "uint256",
        ArgValue::NumericString(_) => "uint256 (string)",
    }
}

/// Constructor arguments in signature order.
pub fn plan_table(arguments: &ConstructorArgumentSet) -> Table {
    let mut table = table();
    table.set_header(vec!["#", "Parameter", "Type", "Value"]);
    for (position, arg) in arguments.iter().enumerate() {
        table.add_row(vec![
            position.to_string(),
            arg.name.clone(),
            kind(&arg.value).to_string(),
            arg.value.to_string(),
        ]);
    }
    table
}

/// One row per completed release.
pub fn report_table(reports: &[ReleaseReport]) -> Table {
    let mut table = table();
    table.set_header(vec![
        "Network",
        "Contract",
        "Address",
        "Transaction",
        "Block",
        "Verification",
    ]);

    for report in reports {
        let deployment = &report.deployment;
        table.add_row(vec![
            report.network.clone(),
            report.contract.clone(),
            deployment
                .contract_address
                .map_or_else(|| "-".to_string(), |a| a.to_checksum(None)),
            deployment
                .transaction_hash
                .map_or_else(|| "-".to_string(), |h| h.to_string()),
            deployment
                .block_number
                .map_or_else(|| "-".to_string(), |b| b.to_string()),
            report
                .verification
                .as_ref()
                .map_or_else(|| "skipped".to_string(), |v| v.status.to_string()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use jackpot_release::{
        ConfirmationState, DeploymentResult, VerificationOutcome, params::ConstructorArg,
    };

    fn arguments() -> ConstructorArgumentSet {
        ConstructorArgumentSet::new(vec![
            ConstructorArg {
                name: "_betPrice".to_string(),
                value: ArgValue::NumericString("1000000".parse().unwrap()),
            },
            ConstructorArg {
                name: "_feeCollector".to_string(),
                value: ArgValue::Address(
                    "0xDe75665F3BE46D696e5579628fA17b662e6fC04e".parse().unwrap(),
                ),
            },
        ])
    }

    #[test]
    fn test_plan_table_lists_arguments_in_order() {
        let rendered = plan_table(&arguments()).to_string();

        let price = rendered.find("_betPrice").unwrap();
        let collector = rendered.find("_feeCollector").unwrap();
        assert!(price < collector);
        assert!(rendered.contains("uint256 (string)"));
        assert!(rendered.contains("0xDe75665F3BE46D696e5579628fA17b662e6fC04e"));
    }

    #[test]
    fn test_report_table() {
        let report = ReleaseReport {
            network: "goerli".to_string(),
            contract: "JackpotBlock".to_string(),
            arguments: arguments(),
            deployment: DeploymentResult {
                contract_address: Some(
                    "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap(),
                ),
                transaction_hash: None,
                confirmation_state: ConfirmationState::Confirmed,
                block_number: Some(101),
            },
            verification: Some(VerificationOutcome::already_verified("Already Verified")),
        };

        let rendered = report_table(&[report]).to_string();
        assert!(rendered.contains("0x5FbDB2315678afecb367f032d93F642f64180aa3"));
        assert!(rendered.contains("already_verified"));
        assert!(rendered.contains("101"));
    }
}
