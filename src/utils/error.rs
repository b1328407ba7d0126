use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Upstream API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Failed to process document '{source_name}': {message}")]
    DocumentError { source_name: String, message: String },

    #[error("Document not found: {name}")]
    DocumentNotFound { name: String },

    #[error("Vector store error: {message}")]
    VectorStoreError { message: String },

    #[error("Vector store not found at '{path}'")]
    VectorStoreNotFound { path: String },

    #[error("Email delivery failed: {message}")]
    EmailError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Document,
    Storage,
    Notification,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ContractError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::ApiError { .. } => ErrorCategory::Network,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::DocumentError { .. } | Self::DocumentNotFound { .. } | Self::ZipError(_) => {
                ErrorCategory::Document
            }
            Self::IoError(_)
            | Self::VectorStoreError { .. }
            | Self::VectorStoreNotFound { .. } => ErrorCategory::Storage,
            Self::EmailError { .. } => ErrorCategory::Notification,
            Self::SerializationError(_)
            | Self::CsvError(_)
            | Self::ProcessingError { .. }
            | Self::ValidationError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 單一文件或郵件失敗不影響整體
            Self::DocumentError { .. } | Self::EmailError { .. } => ErrorSeverity::Low,
            Self::HttpError(_) | Self::ApiError { .. } => ErrorSeverity::Medium,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::VectorStoreNotFound { .. }
            | Self::DocumentNotFound { .. }
            | Self::ValidationError { .. }
            | Self::ProcessingError { .. }
            | Self::SerializationError(_)
            | Self::CsvError(_)
            | Self::ZipError(_) => ErrorSeverity::High,
            Self::IoError(_) | Self::VectorStoreError { .. } => ErrorSeverity::Critical,
        }
    }

    /// 錯誤是否值得重試 (網路或上游 5xx/429)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::HttpError(_) => {
                "Check network connectivity and that the API endpoint is reachable".to_string()
            }
            Self::ApiError { status, .. } if *status == 401 || *status == 403 => {
                "Check that OPENAI_API_KEY (or the server API key) is valid".to_string()
            }
            Self::ApiError { status, .. } if *status == 429 => {
                "The upstream API is rate limiting requests; retry later".to_string()
            }
            Self::ApiError { .. } => "Retry later or check the upstream service status".to_string(),
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => {
                "Review contract-ai.toml and the values in .env".to_string()
            }
            Self::MissingConfigError { field } => {
                format!("Set '{}' in contract-ai.toml or the environment", field)
            }
            Self::DocumentError { .. } => {
                "Make sure the file is a valid PDF, DOCX or UTF-8 text file".to_string()
            }
            Self::DocumentNotFound { .. } => {
                "Run `contract-ai documents` to list indexed documents".to_string()
            }
            Self::VectorStoreNotFound { .. } => {
                "Process documents first with `contract-ai ingest`".to_string()
            }
            Self::VectorStoreError { .. } => {
                "Re-run `contract-ai ingest` to rebuild the vector store".to_string()
            }
            Self::EmailError { .. } => {
                "Check the [email] SMTP server, port and credentials".to_string()
            }
            Self::IoError(_) => "Check file permissions and available disk space".to_string(),
            Self::ZipError(_) => "The DOCX archive appears to be corrupted".to_string(),
            Self::SerializationError(_) | Self::CsvError(_) => {
                "The data could not be (de)serialized; check the input format".to_string()
            }
            Self::ProcessingError { .. } | Self::ValidationError { .. } => {
                "Check the input and try again".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach an external service: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Document => format!("Document problem: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Notification => format!("Notification problem: {}", self),
            ErrorCategory::Processing => format!("Processing problem: {}", self),
        }
    }

    /// CLI 結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, ContractError>;
