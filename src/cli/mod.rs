use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

pub use commands::*;

#[derive(Parser, Debug)]
#[command(version, about = "Offline semantic search over PDF reports", long_about = None)]
pub struct Args {
    /// Directory holding config.yaml, extracted text, the index and models.
    /// Defaults to $PDFSEARCH_BASE_PATH or ~/.local/share/pdfsearch
    #[clap(long, global = true)]
    pub base_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract per-page text from every PDF in the dataset directory
    Extract {
        /// Also write a plain .txt dump next to each JSON file
        #[clap(long, default_value = "false")]
        txt: bool,
    },

    /// Embed all extracted pages and write the index
    Build {},

    /// Run a single query
    Search {
        /// Query text
        #[clap(required = true, num_args = 1..)]
        query: Vec<String>,

        #[clap(flatten)]
        options: QueryArgs,

        /// Print results as JSON
        #[clap(long, default_value = "false")]
        json: bool,

        /// Write the results to this file as JSON
        #[clap(long)]
        export: Option<PathBuf>,
    },

    /// Interactive query loop. Type `exit` to quit
    Repl {
        #[clap(flatten)]
        options: QueryArgs,
    },

    /// Start the web interface
    Serve {
        /// Listen address, e.g. 127.0.0.1:8080
        #[clap(long)]
        addr: Option<String>,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Number of results
    #[clap(short = 'k', long = "top-k")]
    pub k: Option<usize>,

    /// Drop results with a distance above this value (lower = stricter)
    #[clap(short, long)]
    pub threshold: Option<f32>,
}
