mod cli;
mod commands;
mod output;
mod transport;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::Context;
use output::print_error;

fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Sync(args) => {
            let ctx = Context::from_cli(cli)?;
            commands::sync::sync(&ctx, args)?;
        }
        Commands::Plan => {
            let ctx = Context::from_cli(cli)?;
            commands::sync::plan(&ctx)?;
        }
        Commands::Categories => commands::categories::categories(&cli.only),
    }
    Ok(())
}

/// Logs go to stderr so the rendered report on stdout stays clean.
fn init_tracing(verbose: u8) {
    let default = if verbose == 0 { "info" } else { "debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
