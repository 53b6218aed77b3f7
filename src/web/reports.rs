use crate::services::report;
use crate::state::SharedState;
use crate::web::session::StaffSession;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct DailyReportQuery {
    pub date: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/reports/daily", get(daily_report))
        .with_state(state)
}

/// Stored report for the requested date, generated on demand when absent.
/// Without an explicit date the report covers today in the report timezone.
async fn daily_report(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Query(query): Query<DailyReportQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let date = match query.date.as_deref() {
        Some(raw) => parse_report_date(raw).ok_or(StatusCode::BAD_REQUEST)?,
        None => Utc::now().with_timezone(&state.report_tz).date_naive(),
    };

    let payload = report::ensure_daily_report(&state.pool, &state.ai, state.report_tz, date)
        .await
        .map_err(|e| {
            tracing::error!("daily report for {} failed: {}", date, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(payload))
}

fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_dates_parse_iso_only() {
        assert_eq!(
            parse_report_date("2025-03-09"),
            NaiveDate::from_ymd_opt(2025, 3, 9)
        );
        assert_eq!(parse_report_date(" 2025-03-09 "), NaiveDate::from_ymd_opt(2025, 3, 9));
        assert!(parse_report_date("09/03/2025").is_none());
        assert!(parse_report_date("2025-13-01").is_none());
        assert!(parse_report_date("").is_none());
    }
}
