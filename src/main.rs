use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod documents;
mod export;
mod extract;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use cli::{Command, QueryOptions};
use config::Config;
use semantic::SearchService;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = cli::Args::parse();

    let base_path = Config::resolve_base_path(args.base_path)?;
    let config = Config::load_with(&base_path)?;

    match args.command {
        Command::Extract { txt } => cli::run_extract(&config, txt),

        Command::Build {} => cli::run_build(&config),

        Command::Search {
            query,
            options,
            json,
            export,
        } => {
            let query = query.join(" ");
            let options = QueryOptions::resolve(&options, &config)?;
            cli::run_search(&config, &query, options, json, export.as_deref())
        }

        Command::Repl { options } => {
            let options = QueryOptions::resolve(&options, &config)?;
            cli::run_repl(&config, options)
        }

        Command::Serve { addr } => {
            let service = Arc::new(SearchService::open(&config)?);

            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            let state = web::SharedState::new(service, &config);
            web::start_daemon(state, &addr)
        }
    }
}
