use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod exit_codes;

#[derive(Debug, Parser)]
#[command(name = "imageforge", version, about = "Deployment-image build pipeline runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a build pipeline from a config file
    Build {
        /// Path to the build config (TOML)
        #[arg(long)]
        config: PathBuf,
        /// Write the run report as JSON to this path (overrides the config)
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Validate a build config without running it
    Validate {
        /// Path to the build config (TOML)
        #[arg(long)]
        config: PathBuf,
    },
    /// Explain a persisted run report
    Explain {
        /// Path to a report JSON file
        report: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            std::process::exit(exit_codes::RUNTIME_ERROR);
        }
    };

    let exit_code = rt.block_on(run_command(cli.command));
    std::process::exit(exit_code);
}

async fn run_command(command: Command) -> i32 {
    match command {
        Command::Build { config, report } => cmd::build::build_cmd(&config, report.as_deref()).await,
        Command::Validate { config } => cmd::validate::validate_cmd(&config),
        Command::Explain { report } => cmd::explain::explain_cmd(&report),
    }
}
