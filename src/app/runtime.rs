//! 由 AppConfig 組裝各元件，CLI、daily_run 與服務共用

use crate::adapters::{LocalStorage, OpenAiClient, SmtpMailer};
use crate::app::ingest::DocumentProcessor;
use crate::app::server::AppState;
use crate::config::AppConfig;
use crate::core::splitter::TextSplitter;
use crate::core::vector_store::{VectorStore, COLLECTION_FILE};
use crate::core::{Embedder, Mailer, Storage};
use crate::utils::error::{ContractError, Result};
use std::path::Path;
use std::sync::Arc;

pub fn openai_client(config: &AppConfig) -> Arc<OpenAiClient> {
    Arc::new(OpenAiClient::new(config.openai.clone()))
}

pub fn document_processor(config: &AppConfig) -> Result<DocumentProcessor> {
    let splitter = TextSplitter::new(config.ingest.chunk_size, config.ingest.chunk_overlap)?;
    Ok(DocumentProcessor::new(splitter))
}

pub fn vector_storage(config: &AppConfig) -> LocalStorage {
    LocalStorage::new(&config.storage.vector_store_path)
}

pub fn report_storage(config: &AppConfig) -> LocalStorage {
    LocalStorage::new(&config.storage.reports_directory)
}

/// 開啟向量庫，不存在時建立空集合
pub async fn open_vector_store(
    config: &AppConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<VectorStore<LocalStorage>> {
    Ok(VectorStore::open(vector_storage(config), embedder)
        .await?
        .with_batch_size(config.openai.embedding_batch_size))
}

/// 載入既有向量庫，尚未建立時回傳 VectorStoreNotFound
pub async fn load_vector_store(
    config: &AppConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<VectorStore<LocalStorage>> {
    let storage = vector_storage(config);
    let location = storage.location(COLLECTION_FILE);
    VectorStore::load_existing(storage, embedder)
        .await?
        .map(|store| store.with_batch_size(config.openai.embedding_batch_size))
        .ok_or(ContractError::VectorStoreNotFound { path: location })
}

pub fn mailer(config: &AppConfig) -> Arc<dyn Mailer> {
    Arc::new(SmtpMailer::new(&config.email))
}

pub async fn server_state(config: AppConfig) -> Result<AppState> {
    let client = openai_client(&config);
    let store = open_vector_store(&config, client.clone()).await?;

    Ok(AppState {
        store: Arc::new(store),
        llm: client,
        mailer: Some(mailer(&config)),
        processor: document_processor(&config)?,
        reports: report_storage(&config),
        config: Arc::new(config),
    })
}

pub fn documents_directory<'a>(config: &'a AppConfig, override_dir: Option<&'a Path>) -> &'a Path {
    override_dir.unwrap_or_else(|| Path::new(&config.storage.documents_directory))
}
