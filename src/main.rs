mod classify;
mod cli;
mod dates;
mod dedup;
mod error;
mod extract;
mod fmt;
mod grid;
mod header;
mod locator;
mod materializer;
mod models;
mod pipeline;
mod roles;
mod settings;
mod similarity;
mod store;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, PatternsCommands};

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("HISAAB_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init {
            data_dir,
            date_order,
            dedup_key,
            default_account,
        } => cli::init::run(data_dir, date_order, dedup_key, default_account),
        Commands::Import {
            file,
            account,
            dry_run,
        } => cli::import::run(&file, account, dry_run),
        Commands::Inspect { file, rows } => cli::inspect::run(&file, rows),
        Commands::Patterns { command } => match command {
            PatternsCommands::Add {
                field,
                pattern,
                kind,
            } => cli::patterns::add(&field, &pattern, kind),
            PatternsCommands::List { field } => cli::patterns::list(field.as_deref()),
        },
        Commands::Transactions { account, from, to } => {
            cli::transactions::run(account.as_deref(), from.as_deref(), to.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
