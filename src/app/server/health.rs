use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health_handler))
}
