mod classifier;
mod cli;
mod db;
mod error;
mod export;
mod fmt;
mod keys;
mod models;
mod pipeline;
mod reconciler;
mod settings;
mod sheet;
mod source;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            database,
            query_file,
            org,
            export_dir,
            cache_ttl,
        } => cli::init::run(database, query_file, org, export_dir, cache_ttl),
        Commands::Reconcile(args) => cli::reconcile::run(args),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
