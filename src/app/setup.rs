use crate::config::toml_config::{API_KEY_ENV, API_KEY_PLACEHOLDER};
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

pub const DIRECTORIES: [&str; 4] = ["data/sample_documents", "data/chroma_db", "logs", "reports"];

const SAMPLE_CONTRACTS: [(&str, &str); 3] = [
    (
        "contract1.txt",
        "SAMPLE CONTRACT 1\nParties: Company A and Vendor B\nCompany: Company A\nAddress: 123 Main St, City, State\nEffective Date: 2023-01-01\nExpiration Date: 2024-01-01\n",
    ),
    (
        "contract2.txt",
        "SAMPLE CONTRACT 2\nParties: Company A and Supplier C\nCompany: Company A\nAddress: 456 Oak Ave, City, State\nEffective Date: 2023-06-01\nExpiration Date: 2024-06-01\n",
    ),
    (
        "contract3.txt",
        "SAMPLE CONTRACT 3\nParties: Company A and Partner D\nCompany: Company A\nAddress: 123 Main St, City, State\nEffective Date: 2023-03-15\nExpiration Date: 2024-03-15\n",
    ),
];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SetupReport {
    pub created_directories: Vec<PathBuf>,
    pub env_created: bool,
    pub created_samples: Vec<PathBuf>,
    pub api_key_configured: bool,
}

/// 建立資料夾、.env 與範例合約，已存在的檔案不覆寫
pub fn run_setup(root: &Path) -> Result<SetupReport> {
    let mut report = SetupReport::default();

    for directory in DIRECTORIES {
        let path = root.join(directory);
        if !path.exists() {
            std::fs::create_dir_all(&path)?;
            report.created_directories.push(path);
        }
        tracing::info!("📁 Directory ready: {}", directory);
    }

    let env_example = root.join(".env.example");
    let env_file = root.join(".env");
    if !env_file.exists() && env_example.exists() {
        std::fs::copy(&env_example, &env_file)?;
        report.env_created = true;
        tracing::info!("Created .env file from .env.example");
    }

    let samples_dir = root.join(DIRECTORIES[0]);
    for (name, content) in SAMPLE_CONTRACTS {
        let path = samples_dir.join(name);
        if !path.exists() {
            std::fs::write(&path, content)?;
            tracing::info!("Created sample document: {}", name);
            report.created_samples.push(path);
        }
    }

    report.api_key_configured = api_key_configured(&env_file);
    if !report.api_key_configured {
        tracing::warn!("⚠️ OpenAI API key not configured or using placeholder value");
    }

    Ok(report)
}

/// 環境變數優先，其次讀取 .env 內容
fn api_key_configured(env_file: &Path) -> bool {
    let from_env = std::env::var(API_KEY_ENV).ok();
    let from_file = dotenv::from_path_iter(env_file).ok().and_then(|items| {
        items
            .filter_map(|item| item.ok())
            .find(|(key, _)| key == API_KEY_ENV)
            .map(|(_, value)| value)
    });

    from_env
        .or(from_file)
        .is_some_and(|key| !key.trim().is_empty() && key != API_KEY_PLACEHOLDER)
}

pub fn next_steps(report: &SetupReport) -> String {
    let mut lines = vec![
        String::new(),
        "=".repeat(60),
        "SETUP COMPLETE - NEXT STEPS:".to_string(),
        "=".repeat(60),
        "1. Add your contract documents to data/sample_documents/".to_string(),
        "2. Update .env file with your actual configuration:".to_string(),
        format!("   - {}=your_actual_openai_api_key", API_KEY_ENV),
        "   - Email settings for reports".to_string(),
        "3. Process documents: contract-ai ingest".to_string(),
        "4. Run the service: contract-ai serve".to_string(),
        "5. Schedule daily runs:".to_string(),
        "   - Linux/Mac: Add to crontab: 0 9 * * * /path/to/daily_run".to_string(),
        "   - Windows: Use Task Scheduler".to_string(),
        "=".repeat(60),
    ];
    if !report.api_key_configured {
        lines.insert(
            1,
            format!(
                "⚠️  WARNING: OpenAI API key not properly configured.\nPlease update the {} in your .env file",
                API_KEY_ENV
            ),
        );
    }
    lines.join("\n")
}
