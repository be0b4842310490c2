use crate::exit_codes;
use imageforge::config::BuildConfig;
use std::path::Path;

pub fn validate_cmd(config_path: &Path) -> i32 {
    match BuildConfig::load(config_path) {
        Ok(config) => {
            println!("ok: {} stage(s)", config.stages.len());
            for stage in &config.stages {
                println!(
                    "  {} -> {} (max {} attempt(s))",
                    stage.name, stage.program, stage.retry.max_attempts
                );
            }
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            exit_codes::INVALID_CONFIG
        }
    }
}
