pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{LocalStorage, McpClient, OpenAiClient};
pub use app::daily_agent::DailyAgent;
pub use app::ingest::{DocumentProcessor, DocumentSource, IngestPipeline};
pub use app::rag::RagPipeline;
pub use app::similarity::SimilarityFinder;
pub use config::AppConfig;
pub use core::engine::IngestEngine;
pub use core::vector_store::VectorStore;
pub use utils::error::{ContractError, Result};
