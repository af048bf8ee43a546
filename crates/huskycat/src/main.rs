use anyhow::Result;
use clap::Parser;
use hc_core::{AppError, EXIT_DIAGNOSTICS, EXIT_OK};

mod adapters;
mod cli;
mod dispatch;
mod files;
mod mcp_server;
mod setup_cmds;
mod status_cmd;

use cli::{Cli, Commands, ValidateArgs};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable in CI, Pipeline,
    // and MCP modes.
    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .try_init()
        .ok();

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<AppError>() {
            Some(app_error) => {
                eprintln!("huskycat: {app_error}");
                app_error.exit_code()
            }
            None => {
                eprintln!("huskycat: {e:#}");
                EXIT_DIAGNOSTICS
            }
        },
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        None => validate(cli.mode, cli.validate).await,
        Some(Commands::Validate(args)) => validate(cli.mode, args).await,
        Some(Commands::SetupHooks { force, hooks_dir }) => {
            setup_cmds::handle_setup_hooks(force, hooks_dir)?;
            Ok(EXIT_OK)
        }
        Some(Commands::Install { force }) => {
            setup_cmds::handle_install(force)?;
            Ok(EXIT_OK)
        }
        Some(Commands::Bootstrap { force }) => {
            setup_cmds::handle_bootstrap(force)?;
            Ok(EXIT_OK)
        }
        Some(Commands::Status) => {
            status_cmd::handle_status()?;
            Ok(EXIT_OK)
        }
        Some(Commands::McpServer) => {
            mcp_server::run_mcp_server().await?;
            Ok(EXIT_OK)
        }
        Some(Commands::CommitMsg { file }) => {
            let message = std::fs::read_to_string(&file)
                .map_err(|_| AppError::Input(file.display().to_string()))?;
            match hc_hooks::check_commit_message(&message) {
                Ok(()) => Ok(EXIT_OK),
                Err(reason) => {
                    eprintln!("huskycat: {reason}");
                    Ok(EXIT_DIAGNOSTICS)
                }
            }
        }
    }
}

async fn validate(mode_flag: Option<hc_core::Mode>, args: ValidateArgs) -> Result<i32> {
    let mode = dispatch::detect_mode(mode_flag)?;
    dispatch::run_validate(mode, &args).await
}
