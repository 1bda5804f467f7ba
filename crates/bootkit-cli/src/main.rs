//! bootkit - offline bootstrap bundles for tool releases

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bootkit_cli::cmd;
use bootkit_cli::cmd::bootstrap::BootstrapArgs;
use bootkit_cli::{Cli, Commands};
use bootkit_core::bootstrap::{BootstrapError, EXIT_CONNECTION, EXIT_FAILURE};
use bootkit_core::catalog::SyncError;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Bad arguments exit like any other input error.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(exit_byte(EXIT_FAILURE))
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let catalog = cli.catalog_path()?;

    match cli.command {
        Commands::Bootstrap {
            release,
            output_dir,
            target_arch,
            unpacked,
            launcher,
        } => {
            let args = BootstrapArgs {
                release,
                output_dir,
                target_arch,
                unpacked,
                launcher,
            };
            cmd::bootstrap::bootstrap(&catalog, &cli.server, cli.quiet, args).await
        }
        Commands::Refresh => cmd::refresh::refresh(&catalog, &cli.server, cli.quiet).await,
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    let code = if let Some(err) = err.downcast_ref::<BootstrapError>() {
        err.exit_code()
    } else if err.downcast_ref::<SyncError>().is_some_and(SyncError::is_connection) {
        EXIT_CONNECTION
    } else {
        EXIT_FAILURE
    };
    exit_byte(code)
}

fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
