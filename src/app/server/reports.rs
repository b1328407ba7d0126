use super::context::AppState;
use super::error::ApiError;
use crate::app::daily_agent::DailyAgent;
use crate::domain::api::{DailyReportRequest, DailyReportResponse};
use axum::extract::State;
use axum::Json;

#[tracing::instrument(skip_all)]
pub async fn handle_daily_report(
    State(state): State<AppState>,
    request: Option<Json<DailyReportRequest>>,
) -> Result<Json<DailyReportResponse>, ApiError> {
    // 沒有 body 時視為只產生報告不寄信
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let mut email = state.config.email.clone();
    email.enabled = request.send_email;

    let mut agent = DailyAgent::new(state.store.clone(), state.reports.clone(), email)
        .with_window_days(state.config.monitor.expiration_window_days);
    if let Some(mailer) = &state.mailer {
        agent = agent.with_mailer(mailer.clone());
    }

    let outcome = agent
        .run_daily_check(chrono::Local::now().naive_local())
        .await?;

    Ok(Json(DailyReportResponse {
        report: outcome.rendered,
        expirations: outcome.report.expirations,
        conflicts: outcome.report.conflicts,
        emailed: outcome.emailed,
    }))
}
