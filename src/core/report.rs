use crate::domain::model::{Conflict, ExpirationNotice};
use crate::utils::error::{ContractError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub generated_at: NaiveDateTime,
    pub window_days: i64,
    pub expirations: Vec<ExpirationNotice>,
    pub conflicts: Vec<Conflict>,
}

impl DailyReport {
    pub fn subject(&self) -> String {
        format!(
            "Daily Contract Management Report - {}",
            self.generated_at.format("%Y-%m-%d")
        )
    }

    pub fn report_file_name(&self) -> String {
        format!("daily_report_{}.txt", self.generated_at.format("%Y-%m-%d"))
    }

    pub fn csv_file_name(&self) -> String {
        format!("expirations_{}.csv", self.generated_at.format("%Y-%m-%d"))
    }

    /// 純文字報告，郵件與 CLI 共用
    pub fn render(&self) -> String {
        let mut lines = vec![
            "Daily Contract Management Report".to_string(),
            format!("Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S")),
            String::new(),
            format!(
                "=== APPROACHING CONTRACT EXPIRATIONS (Next {} days) ===",
                self.window_days
            ),
        ];

        if self.expirations.is_empty() {
            lines.push(format!(
                "No contracts expiring in the next {} days.",
                self.window_days
            ));
        }
        lines.extend(self.expirations.iter().map(|notice| {
            format!(
                "• {}: Expires on {} ({} days)",
                notice.document,
                notice.date.format("%Y-%m-%d"),
                notice.days_until_expiration
            )
        }));

        lines.push(String::new());
        lines.push("=== CONFLICTS DETECTED ===".to_string());
        if self.conflicts.is_empty() {
            lines.push("No conflicts detected.".to_string());
        }
        for conflict in &self.conflicts {
            lines.push(format!("• Company: {}", conflict.company));
            lines.push(format!("  Issue: {}", conflict.issue));
            lines.push(format!(
                "  Documents involved: {}",
                conflict.documents.join(", ")
            ));
            for (address, documents) in &conflict.addresses {
                lines.push(format!(
                    "  Address '{}' found in: {}",
                    address,
                    documents.join(", ")
                ));
            }
        }

        let mut report = lines.join("\n");
        report.push('\n');
        report
    }

    pub fn expirations_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["document", "date", "days_until_expiration"])?;
        for notice in &self.expirations {
            let date = notice.date.format("%Y-%m-%d").to_string();
            let days = notice.days_until_expiration.to_string();
            writer.write_record([notice.document.as_str(), date.as_str(), days.as_str()])?;
        }

        writer
            .into_inner()
            .map_err(|e| ContractError::ProcessingError {
                message: format!("Failed to flush expirations CSV: {}", e),
            })
    }
}
