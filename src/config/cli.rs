use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "contract-ai")]
#[command(about = "Contract management assistant: ingestion, Q&A, monitoring and reports")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, default_value = "contract-ai.toml")]
    pub config: PathBuf,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process a documents directory into the vector store
    Ingest {
        /// Overrides storage.documents_directory
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List documents currently in the vector store
    Documents,
    /// Ask a question about the ingested contracts
    Ask {
        question: String,

        /// Query a remote contract-ai server instead of the local store
        #[arg(long)]
        remote: Option<String>,

        /// Restrict retrieval to one document
        #[arg(long)]
        document: Option<String>,
    },
    /// Find documents similar to the given one
    Similar {
        document: String,

        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Generate the daily expiration and conflict report
    Report {
        /// Send the report by e-mail
        #[arg(long)]
        send: bool,
    },
    /// Start the HTTP/JSON service
    Serve {
        /// Overrides server.bind_address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Create directories, .env and sample contracts
    Setup {
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}
