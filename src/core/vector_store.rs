use crate::domain::model::{Document, DocumentMetadata, ScoredDocument};
use crate::domain::ports::{Embedder, Storage};
use crate::utils::error::{ContractError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const COLLECTION_FILE: &str = "collection.json";
const COLLECTION_VERSION: u32 = 1;
const DEFAULT_BATCH_SIZE: usize = 64;

/// metadata 等值過濾條件，空集合代表不過濾
pub type MetadataFilter = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: String,
    content: String,
    metadata: DocumentMetadata,
    embedding: Vec<f32>,
}

impl StoredEntry {
    fn matches(&self, filter: &MetadataFilter) -> bool {
        filter
            .iter()
            .all(|(key, value)| self.metadata.matches(key, value))
    }

    fn to_document(&self) -> Document {
        Document::new(self.content.clone(), self.metadata.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Collection {
    version: u32,
    embedding_model: String,
    entries: Vec<StoredEntry>,
}

/// 持久化的向量集合
///
/// 所有片段與其向量保存在記憶體，透過 [`Storage`] 以單一 JSON 檔
/// 寫入 persist 目錄。重新匯入同名文件時會取代舊的片段。
pub struct VectorStore<S: Storage> {
    storage: S,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    entries: RwLock<Vec<StoredEntry>>,
    // 同時只允許一個 persist，確保最後寫入的是最新快照
    persist_lock: Mutex<()>,
}

impl<S: Storage> VectorStore<S> {
    /// 開啟集合，尚未建立時回傳空集合
    pub async fn open(storage: S, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let entries = Self::read_collection(&storage, embedder.as_ref())
            .await?
            .unwrap_or_default();

        Ok(Self {
            storage,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            entries: RwLock::new(entries),
            persist_lock: Mutex::new(()),
        })
    }

    /// 只載入已存在的集合
    pub async fn load_existing(storage: S, embedder: Arc<dyn Embedder>) -> Result<Option<Self>> {
        match Self::read_collection(&storage, embedder.as_ref()).await? {
            Some(entries) => Ok(Some(Self {
                storage,
                embedder,
                batch_size: DEFAULT_BATCH_SIZE,
                entries: RwLock::new(entries),
                persist_lock: Mutex::new(()),
            })),
            None => Ok(None),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn read_collection(
        storage: &S,
        embedder: &dyn Embedder,
    ) -> Result<Option<Vec<StoredEntry>>> {
        if !storage.exists(COLLECTION_FILE).await {
            tracing::debug!(
                "No collection at {}",
                storage.location(COLLECTION_FILE)
            );
            return Ok(None);
        }

        let raw = storage.read_file(COLLECTION_FILE).await?;
        let collection: Collection =
            serde_json::from_slice(&raw).map_err(|e| ContractError::VectorStoreError {
                message: format!(
                    "Corrupted collection at {}: {}",
                    storage.location(COLLECTION_FILE),
                    e
                ),
            })?;

        if collection.version != COLLECTION_VERSION {
            return Err(ContractError::VectorStoreError {
                message: format!(
                    "Unsupported collection version {} (expected {})",
                    collection.version, COLLECTION_VERSION
                ),
            });
        }

        if collection.embedding_model != embedder.model_name() {
            tracing::warn!(
                "⚠️ Collection was built with '{}' but the configured embedding model is '{}'",
                collection.embedding_model,
                embedder.model_name()
            );
        }

        tracing::info!(
            "📚 Loaded {} chunks from {}",
            collection.entries.len(),
            storage.location(COLLECTION_FILE)
        );
        Ok(Some(collection.entries))
    }

    /// 向量化並加入片段，同一來源的舊片段會被取代
    pub async fn add_documents(&self, chunks: &[Document]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut new_entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_documents(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(ContractError::VectorStoreError {
                    message: format!(
                        "Embedder returned {} vectors for {} chunks",
                        embeddings.len(),
                        batch.len()
                    ),
                });
            }

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                let index = chunk.metadata.chunk_index.unwrap_or(new_entries.len());
                new_entries.push(StoredEntry {
                    id: format!("{}#{}", chunk.source(), index),
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                    embedding,
                });
            }
        }

        let replaced: BTreeSet<&str> = chunks.iter().map(|c| c.source()).collect();
        let mut entries = self.entries.write().await;

        let dimension = entries
            .iter()
            .find(|e| !replaced.contains(e.metadata.source.as_str()))
            .or_else(|| new_entries.first())
            .map(|e| e.embedding.len());
        if let Some(dimension) = dimension {
            if let Some(bad) = new_entries.iter().find(|e| e.embedding.len() != dimension) {
                return Err(ContractError::VectorStoreError {
                    message: format!(
                        "Embedding dimension {} for '{}' does not match collection dimension {}",
                        bad.embedding.len(),
                        bad.id,
                        dimension
                    ),
                });
            }
        }

        let before = entries.len();
        entries.retain(|e| !replaced.contains(e.metadata.source.as_str()));
        let removed = before - entries.len();

        let added = new_entries.len();
        entries.extend(new_entries);

        if removed > 0 {
            tracing::info!("♻️ Replaced {} existing chunks from re-ingested documents", removed);
        }
        tracing::info!("Indexed {} chunks ({} total)", added, entries.len());
        Ok(added)
    }

    pub async fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let entries = self.entries.read().await.clone();
        let count = entries.len();
        let collection = Collection {
            version: COLLECTION_VERSION,
            embedding_model: self.embedder.model_name().to_string(),
            entries,
        };
        let data = serde_json::to_vec(&collection)?;
        self.storage.write_file(COLLECTION_FILE, &data).await?;

        tracing::info!(
            "💾 Vector store persisted to {} ({} chunks)",
            self.storage.location(COLLECTION_FILE),
            count
        );
        Ok(())
    }

    /// 依插入順序回傳所有片段
    pub async fn get(&self) -> Vec<Document> {
        self.entries
            .read()
            .await
            .iter()
            .map(StoredEntry::to_document)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn sources(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let unique: BTreeSet<&str> = entries.iter().map(|e| e.metadata.source.as_str()).collect();
        unique.into_iter().map(str::to_string).collect()
    }

    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredDocument>> {
        let vector = self.embedder.embed_query(query).await?;
        self.similarity_search_by_vector(&vector, k, filter).await
    }

    pub async fn similarity_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredDocument>> {
        let entries = self.entries.read().await;
        let mut scored = Vec::new();

        for entry in entries.iter().filter(|e| e.matches(filter)) {
            let score = cosine_similarity(vector, &entry.embedding).ok_or_else(|| {
                ContractError::VectorStoreError {
                    message: format!(
                        "Query dimension {} does not match stored dimension {}",
                        vector.len(),
                        entry.embedding.len()
                    ),
                }
            })?;
            scored.push((score, entry));
        }

        // 穩定排序，同分時保留插入順序
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| ScoredDocument {
                document: entry.to_document(),
                score,
            })
            .collect())
    }

    pub async fn embeddings_by_source(&self) -> BTreeMap<String, Vec<Vec<f32>>> {
        let entries = self.entries.read().await;
        let mut grouped: BTreeMap<String, Vec<Vec<f32>>> = BTreeMap::new();
        for entry in entries.iter() {
            grouped
                .entry(entry.metadata.source.clone())
                .or_default()
                .push(entry.embedding.clone());
        }
        grouped
    }
}

/// 維度不同時回傳 None；零向量的相似度視為 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// 多個向量的平均 (質心)
pub fn centroid(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut sum = vec![0.0f32; first.len()];
    for vector in vectors {
        if vector.len() != sum.len() {
            return None;
        }
        for (acc, value) in sum.iter_mut().zip(vector) {
            *acc += value;
        }
    }
    let count = vectors.len() as f32;
    Some(sum.into_iter().map(|v| v / count).collect())
}


#[cfg(test)]
mod tests {
    use super::test_support::{KeywordEmbedder, MemoryStorage};
    use super::*;
    use crate::domain::model::FileType;

    fn chunk(source: &str, index: usize, content: &str) -> Document {
        let mut metadata = DocumentMetadata::new(source, FileType::Txt);
        metadata.chunk_index = Some(index);
        Document::new(content, metadata)
    }

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(KeywordEmbedder::new(&["lease", "payment", "termination"]))
    }

    #[tokio::test]
    async fn test_search_ranks_by_cosine_similarity() {
        let store = VectorStore::open(MemoryStorage::default(), embedder())
            .await
            .unwrap();
        store
            .add_documents(&[
                chunk("a.txt", 0, "payment schedule and payment terms"),
                chunk("b.txt", 0, "lease of premises"),
                chunk("c.txt", 0, "termination for convenience"),
            ])
            .await
            .unwrap();

        let results = store
            .similarity_search_with_score("when is the lease due", 2, &MetadataFilter::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.source(), "b.txt");
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_filter_restricts_candidates() {
        let store = VectorStore::open(MemoryStorage::default(), embedder())
            .await
            .unwrap();
        store
            .add_documents(&[
                chunk("a.txt", 0, "lease lease"),
                chunk("b.txt", 0, "lease payment"),
            ])
            .await
            .unwrap();

        let filter: MetadataFilter = [("source".to_string(), "b.txt".to_string())].into();
        let results = store
            .similarity_search_with_score("lease", 5, &filter)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.source(), "b.txt");
    }

    #[tokio::test]
    async fn test_reingest_replaces_chunks_of_same_source() {
        let store = VectorStore::open(MemoryStorage::default(), embedder())
            .await
            .unwrap()
            .with_batch_size(1);
        store
            .add_documents(&[chunk("a.txt", 0, "old lease"), chunk("a.txt", 1, "old payment")])
            .await
            .unwrap();
        store
            .add_documents(&[chunk("a.txt", 0, "new termination")])
            .await
            .unwrap();

        let docs = store.get().await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "new termination");
    }

    #[tokio::test]
    async fn test_persist_and_reload_roundtrip() {
        let storage = MemoryStorage::default();
        let store = VectorStore::open(storage.clone(), embedder()).await.unwrap();
        store
            .add_documents(&[chunk("b.txt", 0, "lease"), chunk("a.txt", 0, "payment")])
            .await
            .unwrap();
        store.persist().await.unwrap();

        let reloaded = VectorStore::load_existing(storage, embedder())
            .await
            .unwrap()
            .expect("collection was persisted");

        assert_eq!(reloaded.len().await, 2);
        assert_eq!(reloaded.sources().await, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_concurrent_persist_keeps_latest_snapshot() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = crate::adapters::LocalStorage::new(temp_dir.path().join("chroma_db"));
        let store = Arc::new(VectorStore::open(storage.clone(), embedder()).await.unwrap());
        let chunks: Vec<Document> = (0..500)
            .map(|i| chunk(&format!("doc{}.txt", i), 0, "lease payment termination"))
            .collect();
        store.add_documents(&chunks).await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.spawn(async move { store.persist().await });
        }
        while let Some(result) = tasks.join_next().await {
            assert!(result.unwrap().is_ok());
        }

        store
            .add_documents(&[chunk("late.txt", 0, "lease")])
            .await
            .unwrap();
        store.persist().await.unwrap();

        let reloaded = VectorStore::load_existing(storage, embedder())
            .await
            .unwrap()
            .expect("collection was persisted");
        assert_eq!(reloaded.len().await, 501);
        assert_eq!(
            std::fs::read_dir(temp_dir.path().join("chroma_db")).unwrap().count(),
            1
        );
    }

    #[tokio::test]
    async fn test_load_existing_without_collection_is_none() {
        let result = VectorStore::load_existing(MemoryStorage::default(), embedder())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_corrupted_collection_is_reported() {
        let storage = MemoryStorage::default();
        storage
            .write_file(COLLECTION_FILE, b"not json")
            .await
            .unwrap();

        let result = VectorStore::open(storage, embedder()).await;
        assert!(matches!(result, Err(ContractError::VectorStoreError { .. })));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_an_error() {
        let store = VectorStore::open(MemoryStorage::default(), embedder())
            .await
            .unwrap();
        store
            .add_documents(&[chunk("a.txt", 0, "lease")])
            .await
            .unwrap();

        let result = store
            .similarity_search_by_vector(&[1.0, 0.0], 3, &MetadataFilter::new())
            .await;
        assert!(matches!(result, Err(ContractError::VectorStoreError { .. })));
    }

    #[test]
    fn test_cosine_and_centroid() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), None);

        let c = centroid(&[vec![1.0, 3.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(c, vec![2.0, 4.0]);
        assert!(centroid(&[]).is_none());
    }
}
