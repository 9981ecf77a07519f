//! Tally CLI - review machine-extracted statement tables.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let env = commands::Env::new(cli.store, cli.config, cli.actor);
    let result = match cli.command {
        Commands::Ingest {
            extraction,
            upload_id,
            file,
            env: environment,
        } => commands::ingest::run(&env, extraction, upload_id, file, environment),

        Commands::Status { upload_id, json } => commands::status::run(&env, &upload_id, json),

        Commands::Classify {
            upload_id,
            table,
            similar_to,
        } => commands::classify::run(&env, &upload_id, table, similar_to),

        Commands::Map {
            upload_id,
            mapping,
            accept_high,
            skip,
        } => commands::map::run(&env, &upload_id, mapping, accept_high, skip),

        Commands::Decide {
            upload_id,
            approve,
            reject,
            pending,
            date,
            carrier,
        } => {
            let decision = if approve {
                commands::decide::Decision::Approve
            } else if let Some(reason) = reject {
                commands::decide::Decision::Reject(reason)
            } else {
                debug_assert!(pending);
                commands::decide::Decision::Pending
            };
            commands::decide::run(&env, &upload_id, decision, date, carrier)
        }

        Commands::Export {
            upload_id,
            output,
            no_summary,
        } => commands::export::run(&env, &upload_id, output, no_summary),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
