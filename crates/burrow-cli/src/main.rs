//! burrow - start, inspect and stop tunnel instances.
//!
//! Every instance runs in its own process and serves a small JSON-RPC
//! endpoint on localhost so other invocations can query it.

mod cli;
mod commands;
mod relay;

use burrow_core::daemon::detached_instance_id;
use burrow_core::platform::{burrow_home, current_platform};
use burrow_core::{FsRegistry, JsonAliasStore};
use clap::{CommandFactory, FromArgMatches};
use std::process::ExitCode;
use tracing::{debug, error, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::Cli::command().get_matches();
    let args = match cli::Cli::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    let home = match args.home {
        Some(home) => home,
        None => match burrow_home() {
            Ok(home) => home,
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };
    let registry = FsRegistry::new(home.clone());
    let aliases = JsonAliasStore::new(home);

    // Resolve before logging is set up so an alias can turn on -v.
    let plan = cli::resolve(args.command, &matches, &aliases);
    let verbose = plan.as_ref().map(|p| p.verbose()).unwrap_or(false);
    init_logging(verbose);
    debug!("Running on {}", current_platform());

    let result = match plan {
        Ok(plan) => commands::execute(plan, registry, &aliases).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        // Detached instances log to a file.
        .with_ansi(detached_instance_id().is_none())
        .compact()
        .init();
}
