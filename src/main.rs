// SaoDB CLI - one-shot queries against the federated object store
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use saodb::{
    default_config_path, init_logging_with_level, load_or_init, parse_query, render_value,
    run_query, spawn_pollers, ObjectStore, QueryError, QueryOptions,
};

#[derive(Parser)]
#[command(name = "saodb", version, about = "Federated query engine for semantic objects")]
struct Cli {
    /// Show debug output
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress everything except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Provider list file (default: $SAODB_PROVIDERS or ~/.saodb/providers.conf)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch all providers once, evaluate a query, and print the result
    Query {
        /// The query text, e.g. "person[.salary == 100].name"
        query: String,

        /// Print the per-operator timing breakdown
        #[arg(long)]
        profile: bool,

        /// Disable the index fast paths
        #[arg(long)]
        no_optimize: bool,

        /// How long to wait for the first provider sync
        #[arg(long, default_value_t = 10)]
        wait_secs: u64,
    },

    /// Parse a query and print its canonical form
    Check {
        /// The query text
        query: String,
    },

    /// List configured providers with their live status
    Providers {
        /// How long to wait for the first provider sync
        #[arg(long, default_value_t = 5)]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging_with_level(cli.verbose, cli.quiet)?;
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Command::Query {
            query,
            profile,
            no_optimize,
            wait_secs,
        } => {
            let options = QueryOptions {
                optimize: !no_optimize,
                profile,
            };
            run_query_command(&config_path, &query, options, wait_secs).await
        }
        Command::Check { query } => check_command(&query),
        Command::Providers { wait_secs } => providers_command(&config_path, wait_secs).await,
    }
}

async fn run_query_command(
    config_path: &std::path::Path,
    query: &str,
    options: QueryOptions,
    wait_secs: u64,
) -> Result<()> {
    // Fail on parse errors before any network traffic happens.
    if let Err(error) = parse_query(query) {
        report_query_error(query, &error);
        std::process::exit(1);
    }

    let providers = load_or_init(config_path)?;
    if providers.is_empty() {
        eprintln!(
            "warning: no providers configured in {}",
            config_path.display()
        );
    }

    let store = Arc::new(ObjectStore::new());
    let pollers = spawn_pollers(store.clone(), providers)?;
    pollers
        .await_initial_sync(Duration::from_secs(wait_secs))
        .await;

    let outcome = run_query(store.snapshot(), query, options);
    pollers.shutdown().await;

    match outcome {
        Ok((value, report)) => {
            println!("{}", render_value(&value));
            if let Some(report) = report {
                eprintln!("{report}");
            }
            Ok(())
        }
        Err(error) => {
            report_query_error(query, &error);
            std::process::exit(1);
        }
    }
}

fn check_command(query: &str) -> Result<()> {
    match parse_query(query) {
        Ok(chain) => {
            println!("{chain}");
            Ok(())
        }
        Err(error) => {
            report_query_error(query, &error);
            std::process::exit(1);
        }
    }
}

async fn providers_command(config_path: &std::path::Path, wait_secs: u64) -> Result<()> {
    let providers = load_or_init(config_path)?;
    if providers.is_empty() {
        println!("no providers configured in {}", config_path.display());
        return Ok(());
    }

    let store = Arc::new(ObjectStore::new());
    let pollers = spawn_pollers(store.clone(), providers)?;
    pollers
        .await_initial_sync(Duration::from_secs(wait_secs))
        .await;

    let snapshot = store.snapshot();
    for status in store.provider_statuses() {
        let objects = snapshot.contribution(&status.name).len();
        println!("{} [{}]", status.name, status.state);
        println!("  url: {}", status.url);
        println!("  objects: {objects}");
        if let Some(description) = &status.description {
            if !description.is_empty() {
                println!("  description: {description}");
            }
        }
        if let Some(error) = &status.last_error {
            println!(
                "  last error ({} consecutive): {error}",
                status.consecutive_failures
            );
        }
    }
    pollers.shutdown().await;
    Ok(())
}

/// Point at the failing byte when the error carries an offset.
fn report_query_error(query: &str, error: &QueryError) {
    eprintln!("error: {error}");
    if let Some(offset) = error.offset() {
        let column = query
            .char_indices()
            .take_while(|(i, _)| *i < offset)
            .count();
        eprintln!("  {query}");
        eprintln!("  {}^", " ".repeat(column));
    }
}
