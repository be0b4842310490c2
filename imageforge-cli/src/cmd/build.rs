use crate::exit_codes;
use imageforge::config::BuildConfig;
use imageforge::diagnose;
use imageforge::executor::PipelineExecutor;
use imageforge::report::RunStatus;
use std::path::Path;
use tracing::warn;

pub async fn build_cmd(config_path: &Path, report_override: Option<&Path>) -> i32 {
    let config = match BuildConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return exit_codes::INVALID_CONFIG;
        }
    };

    let report_path = report_override
        .map(Path::to_path_buf)
        .or_else(|| config.report_path.clone());

    let executor = PipelineExecutor::new();
    let token = executor.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel("interrupted by operator");
        }
    });

    let report = match executor.run(&config.into_stages()).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            return exit_codes::INVALID_CONFIG;
        }
    };

    if let Some(path) = report_path {
        if let Err(e) = report.write_json(&path) {
            warn!(path = %path.display(), %e, "could not persist run report");
        }
    }

    print!("{}", diagnose::explain(&report));

    match report.status {
        RunStatus::Succeeded => exit_codes::SUCCESS,
        RunStatus::Failed => exit_codes::BUILD_FAILED,
        RunStatus::Cancelled => exit_codes::CANCELLED,
    }
}
