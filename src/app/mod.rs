pub mod daily_agent;
pub mod ingest;
pub mod rag;
pub mod runtime;
pub mod server;
pub mod setup;
pub mod similarity;
