use crate::core::Pipeline;
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestSummary {
    pub document_count: usize,
    pub chunk_count: usize,
    pub sources: Vec<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

pub struct IngestEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> IngestEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<IngestSummary> {
        let started = Instant::now();
        tracing::info!("🚀 Starting document ingestion...");

        // Extract
        tracing::info!("📥 Loading documents...");
        let documents = self.pipeline.extract().await?;
        let sources: BTreeSet<String> = documents.iter().map(|d| d.source().to_string()).collect();
        tracing::info!(
            "Loaded {} documents from {} files",
            documents.len(),
            sources.len()
        );

        if documents.is_empty() {
            tracing::warn!("⚠️ No documents could be processed");
            return Ok(IngestSummary {
                document_count: 0,
                chunk_count: 0,
                sources: Vec::new(),
                elapsed: started.elapsed(),
            });
        }

        // Transform
        tracing::info!("✂️ Splitting documents into chunks...");
        let chunks = self.pipeline.transform(documents).await?;
        tracing::info!("Created {} chunks", chunks.len());

        // Load
        tracing::info!("🧠 Embedding and indexing chunks...");
        let indexed = self.pipeline.load(chunks).await?;

        let summary = IngestSummary {
            document_count: sources.len(),
            chunk_count: indexed,
            sources: sources.into_iter().collect(),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "✅ Ingested {} documents ({} chunks) in {:?}",
            summary.document_count,
            summary.chunk_count,
            summary.elapsed
        );
        Ok(summary)
    }
}
