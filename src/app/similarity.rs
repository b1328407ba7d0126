use crate::core::vector_store::{centroid, cosine_similarity, VectorStore};
use crate::core::Storage;
use crate::domain::model::SimilarDocument;
use crate::utils::error::{ContractError, Result};
use std::sync::Arc;

pub const DEFAULT_SIMILAR_LIMIT: usize = 5;

/// 以文件片段向量的質心比較文件相似度
pub struct SimilarityFinder<S: Storage> {
    store: Arc<VectorStore<S>>,
}

impl<S: Storage> SimilarityFinder<S> {
    pub fn new(store: Arc<VectorStore<S>>) -> Self {
        Self { store }
    }

    pub async fn find_similar(&self, document: &str, limit: usize) -> Result<Vec<SimilarDocument>> {
        let grouped = self.store.embeddings_by_source().await;

        let target = grouped
            .get(document)
            .and_then(|vectors| centroid(vectors))
            .ok_or_else(|| ContractError::DocumentNotFound {
                name: document.to_string(),
            })?;

        let mut similar = Vec::new();
        for (source, vectors) in &grouped {
            if source == document {
                continue;
            }
            let Some(other) = centroid(vectors) else {
                continue;
            };
            let score = cosine_similarity(&target, &other).ok_or_else(|| {
                ContractError::VectorStoreError {
                    message: format!(
                        "Embedding dimension of '{}' does not match '{}'",
                        source, document
                    ),
                }
            })?;
            similar.push(SimilarDocument {
                document: source.clone(),
                score,
            });
        }

        similar.sort_by(|a, b| b.score.total_cmp(&a.score));
        similar.truncate(limit);
        tracing::debug!("Found {} documents similar to {}", similar.len(), document);
        Ok(similar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vector_store::test_support::{KeywordEmbedder, MemoryStorage};
    use crate::domain::model::{Document, DocumentMetadata, FileType};

    fn chunk(source: &str, index: usize, content: &str) -> Document {
        let mut metadata = DocumentMetadata::new(source, FileType::Txt);
        metadata.chunk_index = Some(index);
        Document::new(content, metadata)
    }

    async fn finder() -> SimilarityFinder<MemoryStorage> {
        let store = VectorStore::open(
            MemoryStorage::default(),
            Arc::new(KeywordEmbedder::new(&["lease", "software", "payment"])),
        )
        .await
        .unwrap();
        store
            .add_documents(&[
                chunk("lease_a.txt", 0, "lease lease"),
                chunk("lease_a.txt", 1, "lease payment"),
                chunk("lease_b.txt", 0, "lease payment"),
                chunk("license.txt", 0, "software software payment"),
                chunk("nda.txt", 0, "software"),
            ])
            .await
            .unwrap();
        SimilarityFinder::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_ranked_by_centroid_and_excludes_self() {
        let finder = finder().await;

        let similar = finder.find_similar("lease_a.txt", 5).await.unwrap();

        let names: Vec<&str> = similar.iter().map(|s| s.document.as_str()).collect();
        assert_eq!(names, vec!["lease_b.txt", "license.txt", "nda.txt"]);
        assert!(similar[0].score > similar[1].score);
        assert_eq!(similar[2].score, 0.0);
    }

    #[tokio::test]
    async fn test_limit_is_applied() {
        let finder = finder().await;
        let similar = finder.find_similar("nda.txt", 1).await.unwrap();

        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].document, "license.txt");
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let finder = finder().await;
        let result = finder.find_similar("missing.pdf", 5).await;

        assert!(matches!(
            result,
            Err(ContractError::DocumentNotFound { .. })
        ));
    }
}
