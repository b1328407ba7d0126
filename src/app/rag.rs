use crate::core::vector_store::{MetadataFilter, VectorStore};
use crate::core::{LanguageModel, Storage};
use crate::domain::model::{QueryResult, ScoredDocument, SourceRef};
use crate::utils::error::{ContractError, Result};
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 5;
pub const ERROR_ANSWER: &str = "Sorry, I encountered an error while processing your query.";

const PROMPT_TEMPLATE: &str = "You are a contract management assistant. Use the following context to answer the question.
Always cite your sources by mentioning the document name and page number when available.

Context: {context}

Question: {question}

Answer:";

pub struct RagPipeline<S: Storage> {
    store: Arc<VectorStore<S>>,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
}

impl<S: Storage> RagPipeline<S> {
    pub fn new(store: Arc<VectorStore<S>>, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            store,
            llm,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// 任何錯誤都轉為固定的道歉回答
    pub async fn query(&self, question: &str) -> QueryResult {
        self.query_with_filters(question, &MetadataFilter::new()).await
    }

    pub async fn query_with_filters(&self, question: &str, filters: &MetadataFilter) -> QueryResult {
        match self.try_query(question, filters).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Error in RAG query: {}", e);
                QueryResult::failed(ERROR_ANSWER)
            }
        }
    }

    pub async fn try_query(&self, question: &str, filters: &MetadataFilter) -> Result<QueryResult> {
        if question.trim().is_empty() {
            return Err(ContractError::ValidationError {
                message: "Question cannot be empty".to_string(),
            });
        }

        let relevant = self
            .store
            .similarity_search_with_score(question, self.top_k, filters)
            .await?;
        tracing::debug!("Retrieved {} chunks for question", relevant.len());

        let prompt = build_prompt(&format_context(&relevant), question);
        let answer = self.llm.complete(&prompt).await?;

        Ok(QueryResult {
            answer,
            sources: collect_sources(&relevant),
            relevant_documents: relevant,
        })
    }
}

pub fn format_context(documents: &[ScoredDocument]) -> String {
    documents
        .iter()
        .map(|scored| {
            let metadata = &scored.document.metadata;
            let page_info = metadata
                .page
                .map(|p| format!(" (Page {})", p))
                .unwrap_or_default();
            format!(
                "From {}{}:\n{}\n\n",
                metadata.source, page_info, scored.document.content
            )
        })
        .collect()
}

pub fn build_prompt(context: &str, question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

/// 依檢索順序去除重複的 (文件, 頁碼)
pub fn collect_sources(documents: &[ScoredDocument]) -> Vec<SourceRef> {
    let mut sources: Vec<SourceRef> = Vec::new();
    for scored in documents {
        let source = SourceRef::from_metadata(&scored.document.metadata);
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vector_store::test_support::{KeywordEmbedder, MemoryStorage};
    use crate::domain::model::{Document, DocumentMetadata, FileType};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().await.push(prompt.to_string());
            if self.fail {
                return Err(ContractError::ApiError {
                    status: 500,
                    message: "model unavailable".to_string(),
                });
            }
            Ok("The lease expires on 2024-12-31.".to_string())
        }
    }

    fn chunk(source: &str, page: Option<u32>, index: usize, content: &str) -> Document {
        let mut metadata = DocumentMetadata::new(source, FileType::Pdf);
        metadata.page = page;
        metadata.chunk_index = Some(index);
        Document::new(content, metadata)
    }

    async fn store() -> Arc<VectorStore<MemoryStorage>> {
        let store = VectorStore::open(
            MemoryStorage::default(),
            Arc::new(KeywordEmbedder::new(&["lease", "payment", "company"])),
        )
        .await
        .unwrap();
        store
            .add_documents(&[
                chunk("lease.pdf", Some(1), 0, "The lease term is twelve months."),
                chunk("lease.pdf", Some(2), 1, "The lease expires; lease renewal optional."),
                chunk("lease.pdf", Some(2), 2, "Lease payment is due monthly."),
                chunk("vendor.pdf", None, 0, "Company: Vendor B"),
            ])
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_query_builds_prompt_and_dedups_sources() {
        let llm = Arc::new(RecordingModel::default());
        let rag = RagPipeline::new(store().await, llm.clone()).with_top_k(3);

        let result = rag.query("When does the lease expire?").await;

        assert_eq!(result.answer, "The lease expires on 2024-12-31.");
        assert_eq!(result.relevant_documents.len(), 3);
        assert_eq!(
            result.sources,
            vec![
                SourceRef {
                    document: "lease.pdf".to_string(),
                    page: "1".to_string()
                },
                SourceRef {
                    document: "lease.pdf".to_string(),
                    page: "2".to_string()
                },
            ]
        );

        let prompts = llm.prompts.lock().await;
        let prompt = &prompts[0];
        assert!(prompt.starts_with("You are a contract management assistant."));
        assert!(prompt.contains("From lease.pdf (Page 2):\nThe lease expires; lease renewal optional.\n\n"));
        assert!(prompt.contains("Question: When does the lease expire?"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[tokio::test]
    async fn test_filters_restrict_retrieval() {
        let rag = RagPipeline::new(store().await, Arc::new(RecordingModel::default()));
        let filters = MetadataFilter::from([("source".to_string(), "vendor.pdf".to_string())]);

        let result = rag.try_query("Who is the company?", &filters).await.unwrap();

        assert_eq!(result.relevant_documents.len(), 1);
        assert_eq!(result.sources[0].page, "N/A");
    }

    #[tokio::test]
    async fn test_model_failure_returns_apology() {
        let llm = Arc::new(RecordingModel {
            fail: true,
            ..Default::default()
        });
        let rag = RagPipeline::new(store().await, llm);

        let result = rag.query("When does the lease expire?").await;

        assert_eq!(result.answer, ERROR_ANSWER);
        assert!(result.sources.is_empty());
        assert!(result.relevant_documents.is_empty());
    }

    #[tokio::test]
    async fn test_empty_question_is_validation_error() {
        let rag = RagPipeline::new(store().await, Arc::new(RecordingModel::default()));

        let result = rag.try_query("   ", &MetadataFilter::new()).await;
        assert!(matches!(result, Err(ContractError::ValidationError { .. })));
    }

    #[test]
    fn test_context_without_page() {
        let docs = vec![ScoredDocument {
            document: chunk("contract1.txt", None, 0, "Company: Test Corp"),
            score: 0.9,
        }];
        assert_eq!(
            format_context(&docs),
            "From contract1.txt:\nCompany: Test Corp\n\n"
        );
    }
}
