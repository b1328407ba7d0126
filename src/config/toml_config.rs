use crate::utils::error::{ContractError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const API_KEY_PLACEHOLDER: &str = "your_openai_api_key_here";
pub const MAX_RETRIES: u32 = 10;
pub const MAX_RETRY_BACKOFF_MS: u64 = 60_000;

static ENV_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub openai: OpenAiConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub rag: RagConfig,
    pub monitor: MonitorConfig,
    pub email: EmailConfig,
    pub server: ServerConfig,
    pub mcp: McpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub embedding_batch_size: usize,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.0,
            timeout_seconds: 60,
            max_retries: 3,
            retry_backoff_ms: 500,
            embedding_batch_size: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub documents_directory: String,
    pub vector_store_path: String,
    pub reports_directory: String,
    pub logs_directory: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_directory: "./data/sample_documents".to_string(),
            vector_store_path: "./data/chroma_db".to_string(),
            reports_directory: "./reports".to_string(),
            logs_directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::core::splitter::DEFAULT_CHUNK_SIZE,
            chunk_overlap: crate::core::splitter::DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub expiration_window_days: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            expiration_window_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub from_email: String,
    /// 以逗號分隔多個收件者
    pub to_email: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            from_email: "contract-bot@example.com".to_string(),
            to_email: "test@example.com".to_string(),
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            timeout_seconds: 30,
        }
    }
}

impl EmailConfig {
    pub fn recipients(&self) -> Vec<String> {
        self.to_email
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub api_key: Option<String>,
    pub json_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8501".to_string(),
            api_key: None,
            json_logs: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ContractError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 先讀 .env，檔案不存在時使用預設值，API key 可由環境變數補上
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv::dotenv().ok();

        let path = path.as_ref();
        let mut config = if path.exists() {
            tracing::debug!("Loading configuration from {}", path.display());
            Self::from_file(path)?
        } else {
            tracing::debug!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
            Self::default()
        };

        config.apply_env_fallbacks();
        Ok(config)
    }

    fn apply_env_fallbacks(&mut self) {
        let configured = self
            .openai
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty() && !ENV_PLACEHOLDER.is_match(k));
        if !configured {
            self.openai.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        }
    }

    /// 替換環境變數 (例如 ${OPENAI_API_KEY})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_PLACEHOLDER
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// API key 未設定或仍為範例值
    pub fn api_key_is_placeholder(&self) -> bool {
        match self.openai.api_key.as_deref().map(str::trim) {
            Some(key) => key.is_empty() || key == API_KEY_PLACEHOLDER,
            None => true,
        }
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        let openai = &self.openai;
        validation::validate_http_url("openai.base_url", &openai.base_url)?;
        validation::validate_not_blank("openai.chat_model", &openai.chat_model)?;
        validation::validate_not_blank("openai.embedding_model", &openai.embedding_model)?;
        validation::validate_range("openai.temperature", openai.temperature, 0.0, 2.0)?;
        validation::validate_range("openai.timeout_seconds", openai.timeout_seconds, 1, 600)?;
        validation::validate_range("openai.max_retries", openai.max_retries, 0, MAX_RETRIES)?;
        validation::validate_range(
            "openai.retry_backoff_ms",
            openai.retry_backoff_ms,
            0,
            MAX_RETRY_BACKOFF_MS,
        )?;
        validation::validate_at_least("openai.embedding_batch_size", openai.embedding_batch_size, 1)?;

        for (field, path) in [
            ("storage.documents_directory", &self.storage.documents_directory),
            ("storage.vector_store_path", &self.storage.vector_store_path),
            ("storage.reports_directory", &self.storage.reports_directory),
            ("storage.logs_directory", &self.storage.logs_directory),
        ] {
            validation::validate_path(field, path)?;
        }

        validation::validate_at_least("ingest.chunk_size", self.ingest.chunk_size, 1)?;
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(ContractError::InvalidConfigValueError {
                field: "ingest.chunk_overlap".to_string(),
                value: self.ingest.chunk_overlap.to_string(),
                reason: format!(
                    "Must be smaller than ingest.chunk_size ({})",
                    self.ingest.chunk_size
                ),
            });
        }

        validation::validate_at_least("rag.top_k", self.rag.top_k, 1)?;
        validation::validate_range(
            "monitor.expiration_window_days",
            self.monitor.expiration_window_days,
            0,
            3650,
        )?;

        if self.email.enabled {
            validation::validate_not_blank("email.smtp_server", &self.email.smtp_server)?;
            validation::validate_at_least("email.smtp_port", self.email.smtp_port, 1)?;
            validation::validate_range("email.timeout_seconds", self.email.timeout_seconds, 1, 600)?;
            validation::validate_mailbox("email.from_email", &self.email.from_email)?;
            let recipients = self.email.recipients();
            if recipients.is_empty() {
                return Err(ContractError::MissingConfigError {
                    field: "email.to_email".to_string(),
                });
            }
            for recipient in &recipients {
                validation::validate_mailbox("email.to_email", recipient)?;
            }
        }

        validation::validate_not_blank("server.bind_address", &self.server.bind_address)?;
        if let Some(base_url) = &self.mcp.base_url {
            validation::validate_http_url("mcp.base_url", base_url)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();

        assert_eq!(config.ingest.chunk_size, 1000);
        assert_eq!(config.ingest.chunk_overlap, 200);
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.monitor.expiration_window_days, 30);
        assert_eq!(config.email.smtp_port, 587);
        assert_eq!(config.storage.vector_store_path, "./data/chroma_db");
        assert!(!config.email.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sections() {
        let toml_content = r#"
[openai]
api_key = "sk-from-file"
chat_model = "gpt-4o"

[ingest]
chunk_size = 500
chunk_overlap = 50

[email]
enabled = true
to_email = "legal@example.com, ops@example.com"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.openai.api_key.as_deref(), Some("sk-from-file"));
        assert_eq!(config.openai.chat_model, "gpt-4o");
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert_eq!(config.ingest.chunk_size, 500);
        assert_eq!(
            config.email.recipients(),
            vec!["legal@example.com", "ops@example.com"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CONTRACT_AI_TEST_SMTP_PASSWORD", "s3cret");

        let toml_content = r#"
[email]
password = "${CONTRACT_AI_TEST_SMTP_PASSWORD}"
username = "${CONTRACT_AI_TEST_UNSET_VARIABLE}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.email.password.as_deref(), Some("s3cret"));
        assert_eq!(
            config.email.username.as_deref(),
            Some("${CONTRACT_AI_TEST_UNSET_VARIABLE}")
        );

        std::env::remove_var("CONTRACT_AI_TEST_SMTP_PASSWORD");
    }

    #[test]
    fn test_config_validation() {
        let overlap = AppConfig::from_toml_str("[ingest]\nchunk_size = 100\nchunk_overlap = 100\n")
            .unwrap();
        assert!(matches!(
            overlap.validate(),
            Err(ContractError::InvalidConfigValueError { .. })
        ));

        let url = AppConfig::from_toml_str("[openai]\nbase_url = \"not-a-url\"\n").unwrap();
        assert!(url.validate().is_err());

        let email =
            AppConfig::from_toml_str("[email]\nenabled = true\nto_email = \"nobody\"\n").unwrap();
        assert!(email.validate().is_err());
    }

    #[test]
    fn test_retry_settings_are_bounded() {
        let retries = AppConfig::from_toml_str("[openai]\nmax_retries = 1000\n").unwrap();
        assert!(matches!(
            retries.validate(),
            Err(ContractError::InvalidConfigValueError { field, .. }) if field == "openai.max_retries"
        ));

        let backoff =
            AppConfig::from_toml_str("[openai]\nretry_backoff_ms = 3600000\n").unwrap();
        assert!(backoff.validate().is_err());

        let timeout = AppConfig::from_toml_str("[openai]\ntimeout_seconds = 0\n").unwrap();
        assert!(timeout.validate().is_err());

        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_email_addresses_use_mailbox_parsing() {
        let named = AppConfig::from_toml_str(
            "[email]\nenabled = true\nfrom_email = \"Contract Bot <bot@example.com>\"\nto_email = \"a@example.com, b@example.com\"\n",
        )
        .unwrap();
        assert!(named.validate().is_ok());

        let broken = AppConfig::from_toml_str(
            "[email]\nenabled = true\nto_email = \"a@example.com, @example.com\"\n",
        )
        .unwrap();
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = AppConfig::from_toml_str("[rag]\ntop_k = \"five\"\n");
        assert!(matches!(
            result,
            Err(ContractError::ConfigValidationError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\nbind_address = \"0.0.0.0:9000\"\n")
            .unwrap();

        let config = AppConfig::load(temp_file.path()).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
    }

    #[test]
    fn test_placeholder_api_key() {
        let mut config = AppConfig::default();
        config.openai.api_key = Some(API_KEY_PLACEHOLDER.to_string());
        assert!(config.api_key_is_placeholder());

        config.openai.api_key = Some("sk-real".to_string());
        assert!(!config.api_key_is_placeholder());
    }
}
