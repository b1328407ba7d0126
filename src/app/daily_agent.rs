//! 每日到期監控與衝突偵測

use crate::config::EmailConfig;
use crate::core::extraction::{find_companies, find_company_addresses, find_expiration_dates};
use crate::core::report::DailyReport;
use crate::core::vector_store::VectorStore;
use crate::core::{Mailer, Storage};
use crate::domain::model::{Conflict, ExpirationNotice};
use crate::domain::ports::EmailMessage;
use crate::utils::error::{ContractError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const CONFLICT_ISSUE: &str = "Multiple addresses found for the same company";

/// 單次每日檢查的結果
#[derive(Debug, Clone, Serialize)]
pub struct DailyOutcome {
    pub report: DailyReport,
    pub rendered: String,
    pub saved: Vec<String>,
    pub emailed: bool,
}

impl DailyOutcome {
    /// 使用者明確要求寄信 (requested) 卻沒寄出時才算失敗
    pub fn ensure_delivered(&self, requested: bool) -> Result<()> {
        if requested && !self.emailed {
            return Err(ContractError::EmailError {
                message: "Report generated but the e-mail could not be sent".to_string(),
            });
        }
        Ok(())
    }
}

pub struct DailyAgent<S: Storage, R: Storage> {
    store: Arc<VectorStore<S>>,
    reports: R,
    mailer: Option<Arc<dyn Mailer>>,
    email: EmailConfig,
    window_days: i64,
}

impl<S: Storage, R: Storage> DailyAgent<S, R> {
    pub fn new(store: Arc<VectorStore<S>>, reports: R, email: EmailConfig) -> Self {
        Self {
            store,
            reports,
            mailer: None,
            email,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_window_days(mut self, window_days: i64) -> Self {
        self.window_days = window_days;
        self
    }

    /// 找出 today 起 window_days 天內 (含) 到期的合約
    pub async fn extract_contract_dates(&self, today: NaiveDate) -> Vec<ExpirationNotice> {
        let threshold = today + Duration::days(self.window_days);
        let mut seen = BTreeSet::new();

        for chunk in self.store.get().await {
            for date in find_expiration_dates(&chunk.content) {
                if date < today || date > threshold {
                    continue;
                }
                // 重疊片段可能重複出現同一日期
                seen.insert((date, chunk.metadata.source.clone()));
            }
        }

        seen.into_iter()
            .map(|(date, document)| ExpirationNotice {
                document,
                date,
                days_until_expiration: (date - today).num_days(),
            })
            .collect()
    }

    /// 同一公司出現多個不同地址即視為衝突
    pub async fn detect_conflicts(&self) -> Vec<Conflict> {
        let mut companies: BTreeMap<String, CompanyRecord> = BTreeMap::new();

        for chunk in self.store.get().await {
            let source = chunk.metadata.source.clone();

            for company in find_companies(&chunk.content) {
                companies
                    .entry(company)
                    .or_default()
                    .documents
                    .insert(source.clone());
            }
            for (company, address) in find_company_addresses(&chunk.content) {
                companies
                    .entry(company)
                    .or_default()
                    .addresses
                    .entry(address)
                    .or_default()
                    .insert(source.clone());
            }
        }

        companies
            .into_iter()
            .filter(|(_, record)| record.addresses.len() > 1)
            .map(|(company, record)| Conflict {
                company,
                issue: CONFLICT_ISSUE.to_string(),
                addresses: record
                    .addresses
                    .into_iter()
                    .map(|(address, docs)| (address, docs.into_iter().collect()))
                    .collect(),
                documents: record.documents.into_iter().collect(),
            })
            .collect()
    }

    pub async fn generate_report(&self, now: NaiveDateTime) -> DailyReport {
        let expirations = self.extract_contract_dates(now.date()).await;
        let conflicts = self.detect_conflicts().await;
        tracing::info!(
            "📋 Found {} approaching expirations and {} conflicts",
            expirations.len(),
            conflicts.len()
        );

        DailyReport {
            generated_at: now,
            window_days: self.window_days,
            expirations,
            conflicts,
        }
    }

    /// 寫出文字報告與到期清單 CSV，回傳寫入位置
    pub async fn save_report(&self, report: &DailyReport) -> Result<Vec<String>> {
        let report_file = report.report_file_name();
        self.reports
            .write_file(&report_file, report.render().as_bytes())
            .await?;

        let csv_file = report.csv_file_name();
        self.reports
            .write_file(&csv_file, &report.expirations_csv()?)
            .await?;

        let saved = vec![
            self.reports.location(&report_file),
            self.reports.location(&csv_file),
        ];
        tracing::info!("💾 Report saved to {}", saved.join(", "));
        Ok(saved)
    }

    pub async fn send_email_report(&self, report: &DailyReport) -> Result<()> {
        let Some(mailer) = &self.mailer else {
            return Err(ContractError::EmailError {
                message: "No mail transport configured".to_string(),
            });
        };

        let message = EmailMessage {
            from: self.email.from_email.clone(),
            to: self.email.recipients(),
            subject: report.subject(),
            body: report.render(),
        };
        mailer.send(&message).await
    }

    /// 產生、儲存並寄送報告；寄信失敗只記錄，不影響整體結果
    pub async fn run_daily_check(&self, now: NaiveDateTime) -> Result<DailyOutcome> {
        tracing::info!("🔍 Running daily contract check...");
        let report = self.generate_report(now).await;
        let saved = self.save_report(&report).await?;

        let emailed = if self.email.enabled {
            match self.send_email_report(&report).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!("❌ Error sending email: {}", e);
                    false
                }
            }
        } else {
            tracing::debug!("E-mail delivery disabled");
            false
        };

        tracing::info!("✅ Daily check completed");
        Ok(DailyOutcome {
            rendered: report.render(),
            report,
            saved,
            emailed,
        })
    }
}

#[derive(Default)]
struct CompanyRecord {
    addresses: BTreeMap<String, BTreeSet<String>>,
    documents: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vector_store::test_support::{KeywordEmbedder, MemoryStorage};
    use crate::domain::model::{Document, DocumentMetadata, FileType};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for MockMailer {
        async fn send(&self, message: &EmailMessage) -> Result<()> {
            if self.fail {
                return Err(ContractError::EmailError {
                    message: "connection refused".to_string(),
                });
            }
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    fn chunk(source: &str, index: usize, content: &str) -> Document {
        let mut metadata = DocumentMetadata::new(source, FileType::Txt);
        metadata.chunk_index = Some(index);
        Document::new(content, metadata)
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    async fn store(chunks: &[Document]) -> Arc<VectorStore<MemoryStorage>> {
        let store = VectorStore::open(
            MemoryStorage::default(),
            Arc::new(KeywordEmbedder::new(&["contract"])),
        )
        .await
        .unwrap();
        store.add_documents(chunks).await.unwrap();
        Arc::new(store)
    }

    fn email(enabled: bool) -> EmailConfig {
        EmailConfig {
            enabled,
            to_email: "legal@example.com".to_string(),
            ..EmailConfig::default()
        }
    }

    #[tokio::test]
    async fn test_expirations_inside_window_only() {
        let store = store(&[
            chunk("a.txt", 0, "Expiration Date: 1/20/2024"),
            // 重疊片段
            chunk("a.txt", 1, "... Expiration Date: 1/20/2024 and more"),
            chunk("b.txt", 0, "This agreement expires on 2024-02-14."),
            chunk("c.txt", 0, "End date: 01/01/2024"),
            chunk("d.txt", 0, "Termination Date: 3/1/24"),
            chunk("e.txt", 0, "Expires: 13/45/2024"),
        ])
        .await;
        let agent = DailyAgent::new(store, MemoryStorage::default(), email(false));

        let notices = agent.extract_contract_dates(now().date()).await;

        assert_eq!(
            notices,
            vec![
                ExpirationNotice {
                    document: "a.txt".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
                    days_until_expiration: 5,
                },
                ExpirationNotice {
                    document: "b.txt".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 2, 14).unwrap(),
                    days_until_expiration: 30,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_conflicting_addresses() {
        let store = store(&[
            chunk("contract1.txt", 0, "Company: Test Corp\nAddress: 123 Main St"),
            chunk("contract2.txt", 0, "Company: Test Corp\nAddress: 456 Oak Ave"),
            chunk("contract3.txt", 0, "Company: Other LLC\nAddress: 1 Elm St"),
            chunk("contract4.txt", 0, "Company: Other LLC\naddress: 1 ELM ST"),
        ])
        .await;
        let agent = DailyAgent::new(store, MemoryStorage::default(), email(false));

        let conflicts = agent.detect_conflicts().await;

        assert_eq!(conflicts.len(), 1);
        let conflict = &conflicts[0];
        assert_eq!(conflict.company, "test corp");
        assert_eq!(conflict.issue, CONFLICT_ISSUE);
        assert_eq!(conflict.documents, vec!["contract1.txt", "contract2.txt"]);
        assert_eq!(conflict.addresses["123 main st"], vec!["contract1.txt"]);
        assert_eq!(conflict.addresses["456 oak ave"], vec!["contract2.txt"]);
    }

    #[tokio::test]
    async fn test_run_daily_check_saves_and_emails() {
        let store = store(&[chunk("lease.txt", 0, "Expiration Date: 1/20/2024")]).await;
        let reports = MemoryStorage::default();
        let mailer = Arc::new(MockMailer::default());
        let agent = DailyAgent::new(store, reports.clone(), email(true)).with_mailer(mailer.clone());

        let outcome = agent.run_daily_check(now()).await.unwrap();

        assert!(outcome.emailed);
        assert_eq!(
            outcome.saved,
            vec![
                "memory://daily_report_2024-01-15.txt",
                "memory://expirations_2024-01-15.csv"
            ]
        );
        let files = reports.files.lock().await;
        let text = String::from_utf8(files["daily_report_2024-01-15.txt"].clone()).unwrap();
        assert!(text.contains("• lease.txt: Expires on 2024-01-20 (5 days)"));
        let csv = String::from_utf8(files["expirations_2024-01-15.csv"].clone()).unwrap();
        assert_eq!(
            csv,
            "document,date,days_until_expiration\nlease.txt,2024-01-20,5\n"
        );

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Daily Contract Management Report - 2024-01-15");
        assert_eq!(sent[0].to, vec!["legal@example.com"]);
        assert_eq!(sent[0].body, outcome.rendered);
    }

    #[tokio::test]
    async fn test_email_failure_does_not_fail_run() {
        let store = store(&[chunk("lease.txt", 0, "No dates here")]).await;
        let mailer = Arc::new(MockMailer {
            fail: true,
            ..Default::default()
        });
        let agent =
            DailyAgent::new(store, MemoryStorage::default(), email(true)).with_mailer(mailer);

        let outcome = agent.run_daily_check(now()).await.unwrap();

        assert!(!outcome.emailed);
        assert!(outcome
            .rendered
            .contains("No contracts expiring in the next 30 days."));
        assert!(outcome.rendered.contains("No conflicts detected."));

        // 設定啟用寄信但未明確要求時不視為失敗
        assert!(outcome.ensure_delivered(false).is_ok());
        assert!(matches!(
            outcome.ensure_delivered(true),
            Err(ContractError::EmailError { .. })
        ));
    }

    #[tokio::test]
    async fn test_disabled_email_is_not_sent() {
        let store = store(&[chunk("lease.txt", 0, "Expires: 1/16/24")]).await;
        let mailer = Arc::new(MockMailer::default());
        let agent =
            DailyAgent::new(store, MemoryStorage::default(), email(false)).with_mailer(mailer.clone());

        let outcome = agent.run_daily_check(now()).await.unwrap();

        assert!(!outcome.emailed);
        assert!(mailer.sent.lock().await.is_empty());
        assert_eq!(outcome.report.expirations[0].days_until_expiration, 1);
    }
}
