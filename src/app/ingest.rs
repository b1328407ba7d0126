use crate::adapters::parsers;
use crate::core::splitter::TextSplitter;
use crate::core::vector_store::VectorStore;
use crate::core::{Document, DocumentMetadata, FileType, Pipeline, Storage};
use crate::utils::error::{ContractError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 文件載入與切割
#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    splitter: TextSplitter,
}

impl DocumentProcessor {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }

    /// 讀取資料夾內支援的檔案 (不遞迴，依檔名排序)，解析失敗的檔案記錄後略過
    pub async fn load_documents(&self, directory: &Path) -> Result<Vec<Document>> {
        let (documents, _) = self.load_directory(directory).await?;
        Ok(documents)
    }

    /// 同 `load_documents`，另外回傳被略過的檔名
    pub async fn load_directory(&self, directory: &Path) -> Result<(Vec<Document>, Vec<String>)> {
        if !tokio::fs::try_exists(directory).await.unwrap_or(false) {
            return Err(ContractError::DocumentError {
                source_name: directory.display().to_string(),
                message: "Documents directory not found".to_string(),
            });
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        let mut documents = Vec::new();
        let mut skipped = Vec::new();
        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            if FileType::from_path(&path).is_none() {
                tracing::debug!("Ignoring unsupported file {}", name);
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match self.process_file(&name, bytes).await {
                Some(Ok(docs)) => {
                    tracing::info!("📄 Processed {} ({} sections)", name, docs.len());
                    documents.extend(docs);
                }
                Some(Err(e)) => {
                    tracing::error!("❌ Error processing {}: {}", name, e);
                    skipped.push(name);
                }
                None => {}
            }
        }

        Ok((documents, skipped))
    }

    /// 依副檔名分派，不支援的格式回傳 None
    pub async fn process_file(&self, name: &str, bytes: Vec<u8>) -> Option<Result<Vec<Document>>> {
        let file_type = FileType::from_path(name)?;
        let result = match file_type {
            FileType::Pdf => self.process_pdf(name, bytes).await,
            FileType::Docx => self.process_docx(name, &bytes),
            FileType::Txt => self.process_txt(name, &bytes),
        };
        Some(result)
    }

    /// 每個非空白頁面各成一份文件，頁碼從 1 起算
    pub async fn process_pdf(&self, name: &str, bytes: Vec<u8>) -> Result<Vec<Document>> {
        let source = name.to_string();
        let pages = tokio::task::spawn_blocking(move || parsers::extract_pdf_pages(&source, &bytes))
            .await
            .map_err(|e| ContractError::ProcessingError {
                message: format!("PDF extraction task failed: {}", e),
            })??;

        Ok(pages
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| {
                Document::new(
                    text,
                    DocumentMetadata::new(name, FileType::Pdf).with_page(i as u32 + 1),
                )
            })
            .collect())
    }

    pub fn process_docx(&self, name: &str, bytes: &[u8]) -> Result<Vec<Document>> {
        let text = parsers::extract_docx_text(name, bytes)?;
        Ok(single_document(name, FileType::Docx, text))
    }

    pub fn process_txt(&self, name: &str, bytes: &[u8]) -> Result<Vec<Document>> {
        let text = parsers::extract_txt_text(name, bytes)?;
        Ok(single_document(name, FileType::Txt, text))
    }

    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Document> {
        self.splitter.split_documents(documents)
    }
}

fn single_document(name: &str, file_type: FileType, text: String) -> Vec<Document> {
    if text.trim().is_empty() {
        tracing::warn!("⚠️ {} contains no text", name);
        return Vec::new();
    }
    vec![Document::new(text, DocumentMetadata::new(name, file_type))]
}

/// 匯入來源：本機資料夾或上傳的檔案內容
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Directory(PathBuf),
    Uploads(Vec<(String, Vec<u8>)>),
}

pub struct IngestPipeline<S: Storage> {
    processor: DocumentProcessor,
    source: DocumentSource,
    store: Arc<VectorStore<S>>,
    skipped: Mutex<Vec<String>>,
}

impl<S: Storage> IngestPipeline<S> {
    pub fn new(processor: DocumentProcessor, source: DocumentSource, store: Arc<VectorStore<S>>) -> Self {
        Self {
            processor,
            source,
            store,
            skipped: Mutex::new(Vec::new()),
        }
    }

    /// 無法解析或格式不支援的檔名
    pub async fn skipped(&self) -> Vec<String> {
        self.skipped.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for IngestPipeline<S> {
    async fn extract(&self) -> Result<Vec<Document>> {
        match &self.source {
            DocumentSource::Directory(directory) => {
                tracing::debug!("Loading documents from {}", directory.display());
                let (documents, skipped) = self.processor.load_directory(directory).await?;
                self.skipped.lock().await.extend(skipped);
                Ok(documents)
            }
            DocumentSource::Uploads(files) => {
                let mut documents = Vec::new();
                let mut skipped = self.skipped.lock().await;
                for (name, bytes) in files {
                    match self.processor.process_file(name, bytes.clone()).await {
                        Some(Ok(docs)) => documents.extend(docs),
                        Some(Err(e)) => {
                            tracing::error!("❌ Error processing {}: {}", name, e);
                            skipped.push(name.clone());
                        }
                        None => {
                            tracing::warn!("⚠️ Unsupported file type: {}", name);
                            skipped.push(name.clone());
                        }
                    }
                }
                Ok(documents)
            }
        }
    }

    async fn transform(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        Ok(self.processor.chunk_documents(&documents))
    }

    async fn load(&self, chunks: Vec<Document>) -> Result<usize> {
        let indexed = self.store.add_documents(&chunks).await?;
        self.store.persist().await?;
        Ok(indexed)
    }
}
