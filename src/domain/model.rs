use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    /// 依副檔名判斷，不支援的格式回傳 None
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source: String,
    pub file_type: FileType,
    pub processed_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

impl DocumentMetadata {
    pub fn new(source: impl Into<String>, file_type: FileType) -> Self {
        Self {
            source: source.into(),
            file_type,
            processed_date: Utc::now(),
            page: None,
            chunk_index: None,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// 以 metadata 欄位做等值比對，未知欄位一律不符合
    pub fn matches(&self, key: &str, value: &str) -> bool {
        match key {
            "source" | "document" => self.source == value,
            "file_type" => self.file_type.as_str() == value.to_ascii_lowercase(),
            "page" => self.page.map(|p| p.to_string()).as_deref() == Some(value),
            _ => false,
        }
    }
}

/// 一份載入的文件或切割後的片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// 回答引用來源
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub document: String,
    pub page: String,
}

impl SourceRef {
    pub fn from_metadata(metadata: &DocumentMetadata) -> Self {
        Self {
            document: metadata.source.clone(),
            page: metadata
                .page
                .map(|p| p.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Page {})", self.document, self.page)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub relevant_documents: Vec<ScoredDocument>,
}

impl QueryResult {
    pub fn failed(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
            relevant_documents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationNotice {
    pub document: String,
    pub date: NaiveDate,
    pub days_until_expiration: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub company: String,
    pub issue: String,
    /// address -> 出現該地址的文件
    pub addresses: BTreeMap<String, Vec<String>>,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarDocument {
    pub document: String,
    pub score: f32,
}
