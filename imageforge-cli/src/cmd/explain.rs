use crate::exit_codes;
use imageforge::diagnose;
use imageforge::report::BuildReport;
use std::path::Path;

pub fn explain_cmd(report_path: &Path) -> i32 {
    let raw = match std::fs::read_to_string(report_path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("error: cannot read '{}': {e}", report_path.display());
            return exit_codes::INVALID_CONFIG;
        }
    };

    let report: BuildReport = match serde_json::from_str(&raw) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: '{}' is not a run report: {e}", report_path.display());
            return exit_codes::INVALID_CONFIG;
        }
    };

    print!("{}", diagnose::explain(&report));
    exit_codes::SUCCESS
}
