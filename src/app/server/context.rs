use crate::adapters::LocalStorage;
use crate::app::ingest::DocumentProcessor;
use crate::config::AppConfig;
use crate::core::vector_store::VectorStore;
use crate::core::{LanguageModel, Mailer};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<VectorStore<LocalStorage>>,
    pub llm: Arc<dyn LanguageModel>,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub processor: DocumentProcessor,
    pub reports: LocalStorage,
    pub config: Arc<AppConfig>,
}
