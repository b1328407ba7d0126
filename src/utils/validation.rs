use crate::utils::error::{ContractError, Result};
use lettre::message::Mailbox;
use std::fmt::Display;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl Display, reason: impl Into<String>) -> ContractError {
    ContractError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// OpenAI 與遠端服務只接受 http(s)
pub fn validate_http_url(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, value, "URL cannot be empty"));
    }

    let url = Url::parse(value).map_err(|e| invalid(field, value, format!("Invalid URL: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field,
            value,
            format!("Expected an http or https URL, got '{}'", url.scheme()),
        ));
    }
    Ok(())
}

pub fn validate_path(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, value, "Path cannot be empty"));
    }
    if value.contains('\0') {
        return Err(invalid(field, value, "Path contains null bytes"));
    }
    Ok(())
}

pub fn validate_not_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field, value, "Value cannot be blank"));
    }
    Ok(())
}

pub fn validate_at_least<T: PartialOrd + Display>(field: &str, value: T, min: T) -> Result<()> {
    if value < min {
        let reason = format!("Value must be at least {}", min);
        return Err(invalid(field, value, reason));
    }
    Ok(())
}

/// 含上下界
pub fn validate_range<T: PartialOrd + Display>(field: &str, value: T, min: T, max: T) -> Result<()> {
    if value < min || value > max {
        let reason = format!("Value must be between {} and {}", min, max);
        return Err(invalid(field, value, reason));
    }
    Ok(())
}

/// 與寄信時相同的 lettre 解析，設定檔通過即代表可寄送
pub fn validate_mailbox(field: &str, value: &str) -> Result<()> {
    value
        .trim()
        .parse::<Mailbox>()
        .map(|_| ())
        .map_err(|e| invalid(field, value, format!("Not a valid e-mail address: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url() {
        assert!(validate_http_url("openai.base_url", "https://api.openai.com/v1").is_ok());
        assert!(validate_http_url("mcp.base_url", "http://localhost:8501").is_ok());
        assert!(validate_http_url("openai.base_url", " ").is_err());
        assert!(validate_http_url("openai.base_url", "api.openai.com").is_err());

        let err = validate_http_url("mcp.base_url", "ftp://example.com").unwrap_err();
        assert!(err.to_string().contains("mcp.base_url"));
    }

    #[test]
    fn test_bounds() {
        assert!(validate_at_least("rag.top_k", 5usize, 1).is_ok());
        assert!(validate_at_least("rag.top_k", 0usize, 1).is_err());
        assert!(validate_range("openai.max_retries", 3u32, 0, 10).is_ok());
        assert!(validate_range("openai.max_retries", 11u32, 0, 10).is_err());
        assert!(validate_range("openai.temperature", 2.5f32, 0.0, 2.0).is_err());
    }

    #[test]
    fn test_mailbox_matches_mailer_parsing() {
        assert!(validate_mailbox("email.to_email", "test@example.com").is_ok());
        assert!(validate_mailbox("email.to_email", " ops@contracts.example.org ").is_ok());
        assert!(validate_mailbox("email.from_email", "Contract Bot <bot@example.com>").is_ok());
        assert!(validate_mailbox("email.to_email", "not-an-address").is_err());
        assert!(validate_mailbox("email.to_email", "@example.com").is_err());
    }

    #[test]
    fn test_path() {
        assert!(validate_path("storage.logs_directory", "./logs").is_ok());
        assert!(validate_path("storage.logs_directory", "").is_err());
        assert!(validate_path("storage.logs_directory", "lo\0gs").is_err());
    }
}
