//! HTTP/JSON service exposing ingestion, Q&A, similarity and daily reports.

mod auth;
pub mod context;
mod documents;
mod error;
mod health;
mod query;
mod reports;

pub use context::AppState;
pub use error::ApiError;

use crate::utils::error::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// base64 編碼的 PDF 可能不小
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/documents", get(documents::handle_list_documents))
        .route("/documents/upload", post(documents::handle_upload))
        .route("/query", post(query::handle_query))
        .route("/similar/{document_id}", get(query::handle_similar))
        .route("/reports/daily", post(reports::handle_daily_report))
}

pub fn router(state: AppState) -> Router {
    let api_key: Option<Arc<str>> = state
        .config
        .server
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(Arc::from);

    Router::new()
        .nest(
            "/api",
            api_router().layer(axum::middleware::from_fn_with_state(
                api_key,
                auth::require_bearer,
            )),
        )
        .merge(health::router())
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, bind_address: &str) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    tracing::info!("🌐 contract-ai service listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("🛑 Shutting down");
            }
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalStorage;
    use crate::app::ingest::DocumentProcessor;
    use crate::config::AppConfig;
    use crate::core::vector_store::test_support::KeywordEmbedder;
    use crate::core::vector_store::VectorStore;
    use crate::core::LanguageModel;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(&self, prompt: &str) -> crate::utils::error::Result<String> {
            let cited = prompt.contains("From contract1.txt");
            Ok(format!("answer (cited contract1: {})", cited))
        }
    }

    async fn state(temp_dir: &TempDir, api_key: Option<&str>) -> AppState {
        let mut config = AppConfig::default();
        config.server.api_key = api_key.map(str::to_string);

        let store = VectorStore::open(
            LocalStorage::new(temp_dir.path().join("chroma_db")),
            Arc::new(KeywordEmbedder::new(&["company", "address", "expiration"])),
        )
        .await
        .unwrap();

        AppState {
            store: Arc::new(store),
            llm: Arc::new(EchoModel),
            mailer: None,
            processor: DocumentProcessor::default(),
            reports: LocalStorage::new(temp_dir.path().join("reports")),
            config: Arc::new(config),
        }
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn upload_body() -> Value {
        json!({
            "documents": [
                {"name": "contract1.txt", "content": "Company: Test Corp\nAddress: 123 Main St"},
                {"name": "uploads/contract2.txt", "content": "Q29tcGFueTogVGVzdCBDb3JwCkFkZHJlc3M6IDQ1NiBPYWsgQXZl", "encoding": "base64"},
                {"name": "scan.png", "content": "not supported"}
            ]
        })
    }

    #[tokio::test]
    async fn test_health() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(state(&temp_dir, Some("secret")).await);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_upload_then_query_similar_and_report() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(state(&temp_dir, None).await);

        let response = app
            .clone()
            .oneshot(post_json("/api/documents/upload", upload_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["document_count"], 2);
        assert_eq!(body["skipped"], json!(["scan.png"]));
        assert!(temp_dir.path().join("chroma_db/collection.json").exists());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/documents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["documents"], json!(["contract1.txt", "contract2.txt"]));

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/query",
                json!({"question": "What is the company address?"}),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["answer"], "answer (cited contract1: true)");
        assert_eq!(body["sources"].as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/similar/contract1.txt?limit=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["similar"][0]["document"], "contract2.txt");

        let response = app
            .oneshot(post_json("/api/reports/daily", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["emailed"], false);
        assert_eq!(body["conflicts"][0]["company"], "test corp");
    }

    #[tokio::test]
    async fn test_daily_report_accepts_empty_post() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(state(&temp_dir, None).await);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/reports/daily")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["emailed"], false);
        assert!(body["report"]
            .as_str()
            .unwrap()
            .contains("Daily Contract Management Report"));
    }

    #[tokio::test]
    async fn test_bearer_token_required_when_configured() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(state(&temp_dir, Some("secret")).await);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/documents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/documents")
                    .header(header::AUTHORIZATION, "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let temp_dir = TempDir::new().unwrap();
        let app = router(state(&temp_dir, None).await);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/similar/unknown.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("unknown.pdf"));

        let response = app
            .clone()
            .oneshot(post_json("/api/query", json!({"question": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_json(
                "/api/documents/upload",
                json!({"documents": [{"name": "a.pdf", "content": "***", "encoding": "base64"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
