//! Client for a remote contract-ai service exposing the JSON API.

use crate::domain::api::{
    DailyReportRequest, DailyReportResponse, QueryRequest, QueryResponse, SimilarResponse,
    UploadDocument, UploadRequest, UploadResponse,
};
use crate::domain::model::QueryResult;
use crate::utils::error::{ContractError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct McpClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    timeout: Duration,
}

impl McpClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: Client::new(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.timeout(self.timeout);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ContractError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn upload_documents(&self, documents: Vec<UploadDocument>) -> Result<UploadResponse> {
        let endpoint = format!("{}/api/documents/upload", self.base_url);
        tracing::debug!("Uploading {} documents to {}", documents.len(), endpoint);

        let response = self
            .authorized(self.client.post(&endpoint))
            .json(&UploadRequest { documents })
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn query_documents(
        &self,
        question: &str,
        filters: HashMap<String, String>,
    ) -> Result<QueryResponse> {
        let endpoint = format!("{}/api/query", self.base_url);
        let payload = QueryRequest {
            question: question.to_string(),
            filters,
        };

        let response = self
            .authorized(self.client.post(&endpoint))
            .json(&payload)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn get_similar_documents(
        &self,
        document_id: &str,
        limit: usize,
    ) -> Result<SimilarResponse> {
        let mut endpoint = url::Url::parse(&format!("{}/api/similar/", self.base_url)).map_err(
            |e| ContractError::InvalidConfigValueError {
                field: "mcp.base_url".to_string(),
                value: self.base_url.clone(),
                reason: e.to_string(),
            },
        )?;
        // 文件名稱可能含空白或特殊字元
        endpoint
            .path_segments_mut()
            .map_err(|_| ContractError::ConfigError {
                message: format!("'{}' cannot be used as a base URL", self.base_url),
            })?
            .pop_if_empty()
            .push(document_id);

        let response = self
            .authorized(self.client.get(endpoint))
            .query(&[("limit", limit)])
            .send()
            .await?;
        Self::parse(response).await
    }

    pub async fn trigger_daily_report(&self, send_email: bool) -> Result<DailyReportResponse> {
        let endpoint = format!("{}/api/reports/daily", self.base_url);
        let response = self
            .authorized(self.client.post(&endpoint))
            .json(&DailyReportRequest { send_email })
            .send()
            .await?;
        Self::parse(response).await
    }
}

/// 透過遠端服務回答問題，錯誤時回傳說明而非失敗
pub struct McpIntegratedRag {
    client: McpClient,
}

impl McpIntegratedRag {
    pub fn new(client: McpClient) -> Self {
        Self { client }
    }

    pub async fn query(&self, question: &str) -> QueryResult {
        self.query_with_filters(question, HashMap::new()).await
    }

    pub async fn query_with_filters(
        &self,
        question: &str,
        filters: HashMap<String, String>,
    ) -> QueryResult {
        match self.client.query_documents(question, filters).await {
            Ok(response) => QueryResult {
                answer: response.answer,
                sources: response.sources,
                relevant_documents: response.documents,
            },
            Err(e) => {
                tracing::error!("Error querying MCP server: {}", e);
                QueryResult::failed(format!("Error querying MCP server: {}", e))
            }
        }
    }
}
