//! Multipart CSV ingestion for the six workforce datasets.
//!
//! Files pair positionally with their `dataset_types` values. Each file is
//! parsed in full, its codes resolved against the employee table, and its
//! rows committed in one transaction, so a bad row or unknown employee
//! rejects that file without touching the others. Employees are never
//! created from fact uploads.

use crate::db;
use crate::domain::models::{DatasetType, WellnessCheckStatus};
use crate::import_utils;
use crate::risk::at_risk;
use crate::state::SharedState;
use crate::web::session::StaffSession;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const ALERT_SUBJECT: &str = "A quick check-in from the People team";
const ALERT_MESSAGE: &str = "Your recent vibemeter responses suggest things might be \
tough right now. When you have a moment, please open the wellness assistant for a \
short confidential chat, or reach out to the People team directly.";

#[derive(Serialize)]
pub struct FileResult {
    pub filename: String,
    pub dataset_type: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_imported: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub results: Vec<FileResult>,
    pub flagged_employees: Vec<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn upload(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, StatusCode> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    let mut dataset_types: Vec<String> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("unreadable multipart body: {}", e);
        StatusCode::BAD_REQUEST
    })? {
        match field.name() {
            Some("files") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or(StatusCode::BAD_REQUEST)?;
                let data = field.bytes().await.map_err(|e| {
                    tracing::warn!("failed reading upload {}: {}", filename, e);
                    StatusCode::BAD_REQUEST
                })?;
                files.push((filename, data.to_vec()));
            }
            Some("dataset_types") => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| StatusCode::BAD_REQUEST)?;
                dataset_types.push(value.trim().to_lowercase());
            }
            _ => continue,
        }
    }

    if files.is_empty() || files.len() != dataset_types.len() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut datasets = Vec::with_capacity(files.len());
    for ((filename, _), raw_type) in files.iter().zip(&dataset_types) {
        if !filename.to_ascii_lowercase().ends_with(".csv") {
            return Err(StatusCode::BAD_REQUEST);
        }
        let dataset =
            DatasetType::try_from(raw_type.as_str()).map_err(|_| StatusCode::BAD_REQUEST)?;
        datasets.push(dataset);
    }

    let mut results = Vec::with_capacity(files.len());
    let mut vibemeter_loaded = false;
    for ((filename, data), dataset) in files.into_iter().zip(datasets) {
        let result = ingest_file(&state, filename, dataset, &data).await;
        if result.success && dataset == DatasetType::Vibemeter {
            vibemeter_loaded = true;
        }
        results.push(result);
    }

    let flagged_employees = if vibemeter_loaded {
        flag_at_risk_employees(&state).await
    } else {
        Vec::new()
    };

    Ok(Json(UploadResponse {
        results,
        flagged_employees,
    }))
}

async fn ingest_file(
    state: &SharedState,
    filename: String,
    dataset: DatasetType,
    data: &[u8],
) -> FileResult {
    let outcome = match dataset {
        DatasetType::Leave => ingest_leave(state, data).await,
        DatasetType::Activity => ingest_activity(state, data).await,
        DatasetType::Rewards => ingest_rewards(state, data).await,
        DatasetType::Performance => ingest_performance(state, data).await,
        DatasetType::Vibemeter => ingest_vibemeter(state, data).await,
        DatasetType::Onboarding => ingest_onboarding(state, data).await,
    };

    match outcome {
        Ok(rows_imported) => {
            tracing::info!(
                "imported {} {} rows from {}",
                rows_imported,
                dataset.as_str(),
                filename
            );
            FileResult {
                filename,
                dataset_type: dataset.as_str(),
                success: true,
                rows_imported: Some(rows_imported),
                error: None,
            }
        }
        Err(error) => {
            tracing::warn!("rejected {} ({}): {}", filename, dataset.as_str(), error);
            FileResult {
                filename,
                dataset_type: dataset.as_str(),
                success: false,
                rows_imported: None,
                error: Some(error),
            }
        }
    }
}

async fn ingest_leave(state: &SharedState, data: &[u8]) -> Result<u64, String> {
    let rows = import_utils::parse_leave(data).map_err(|e| e.to_string())?;
    let paired = resolve_rows(state, rows, |r| &r.employee_code).await?;
    db::insert_leave_batch(&state.pool, &paired)
        .await
        .map_err(batch_error)
}

async fn ingest_activity(state: &SharedState, data: &[u8]) -> Result<u64, String> {
    let rows = import_utils::parse_activity(data).map_err(|e| e.to_string())?;
    let paired = resolve_rows(state, rows, |r| &r.employee_code).await?;
    db::insert_activity_batch(&state.pool, &paired)
        .await
        .map_err(batch_error)
}

async fn ingest_rewards(state: &SharedState, data: &[u8]) -> Result<u64, String> {
    let rows = import_utils::parse_rewards(data).map_err(|e| e.to_string())?;
    let paired = resolve_rows(state, rows, |r| &r.employee_code).await?;
    db::insert_rewards_batch(&state.pool, &paired)
        .await
        .map_err(batch_error)
}

async fn ingest_performance(state: &SharedState, data: &[u8]) -> Result<u64, String> {
    let rows = import_utils::parse_performance(data).map_err(|e| e.to_string())?;
    let paired = resolve_rows(state, rows, |r| &r.employee_code).await?;
    db::insert_performance_batch(&state.pool, &paired)
        .await
        .map_err(batch_error)
}

async fn ingest_vibemeter(state: &SharedState, data: &[u8]) -> Result<u64, String> {
    let rows = import_utils::parse_vibemeter(data).map_err(|e| e.to_string())?;
    let paired = resolve_rows(state, rows, |r| &r.employee_code).await?;
    db::insert_vibemeter_batch(&state.pool, &paired)
        .await
        .map_err(batch_error)
}

async fn ingest_onboarding(state: &SharedState, data: &[u8]) -> Result<u64, String> {
    let rows = import_utils::parse_onboarding(data).map_err(|e| e.to_string())?;
    let paired = resolve_rows(state, rows, |r| &r.employee_code).await?;
    db::insert_onboarding_batch(&state.pool, &paired)
        .await
        .map_err(batch_error)
}

/// Pairs every row with its employee id. The first unknown code fails the
/// whole file.
async fn resolve_rows<R>(
    state: &SharedState,
    rows: Vec<R>,
    code_of: fn(&R) -> &str,
) -> Result<Vec<(Uuid, R)>, String> {
    let codes: Vec<String> = rows.iter().map(|r| code_of(r).to_string()).collect();
    let resolved = db::resolve_employee_codes(&state.pool, &codes)
        .await
        .map_err(|e| {
            tracing::error!("employee code resolution failed: {}", e);
            "employee lookup failed".to_string()
        })?;
    pair_rows(rows, &resolved, code_of)
}

fn pair_rows<R>(
    rows: Vec<R>,
    resolved: &HashMap<String, Uuid>,
    code_of: fn(&R) -> &str,
) -> Result<Vec<(Uuid, R)>, String> {
    let mut paired = Vec::with_capacity(rows.len());
    for row in rows {
        match resolved.get(code_of(&row)) {
            Some(id) => paired.push((*id, row)),
            None => return Err(format!("references unknown employee {}", code_of(&row))),
        }
    }
    Ok(paired)
}

fn batch_error(e: anyhow::Error) -> String {
    tracing::error!("batch insert failed: {}", e);
    "database rejected the batch".to_string()
}

/// Runs the at-risk screen over the full vibemeter history, marks the flagged
/// employees for attention and emails them concurrently. Screening problems
/// are logged rather than failing an upload whose rows already committed.
async fn flag_at_risk_employees(state: &SharedState) -> Vec<String> {
    let samples = match db::all_vibe_samples(&state.pool).await {
        Ok(samples) => samples,
        Err(e) => {
            tracing::error!("at-risk screen skipped, vibe history unavailable: {}", e);
            return Vec::new();
        }
    };

    let mut flagged = Vec::new();
    for id in at_risk::screen(&samples) {
        let employee = match db::find_employee_by_id(&state.pool, id).await {
            Ok(Some(employee)) => employee,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("employee lookup failed during at-risk screen: {}", e);
                continue;
            }
        };
        if let Err(e) = db::set_immediate_attention(&state.pool, id, true).await {
            tracing::error!("attention flag failed for {}: {}", employee.employee_code, e);
            continue;
        }
        if let Err(e) =
            db::set_wellness_check_status(&state.pool, id, WellnessCheckStatus::NotStarted).await
        {
            tracing::error!(
                "wellness status reset failed for {}: {}",
                employee.employee_code,
                e
            );
        }
        flagged.push(employee);
    }

    let sends = flagged.iter().map(|employee| {
        let mailer = state.mailer.clone();
        async move {
            if let Err(e) = mailer
                .send_employee_alert(&employee.email, &employee.name, ALERT_SUBJECT, ALERT_MESSAGE)
                .await
            {
                tracing::warn!("alert email failed for {}: {}", employee.employee_code, e);
            }
        }
    });
    join_all(sends).await;

    if !flagged.is_empty() {
        tracing::info!("at-risk screen flagged {} employees", flagged.len());
    }
    flagged.into_iter().map(|e| e.employee_code).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import_utils::LeaveCsvRow;
    use chrono::NaiveDate;

    fn leave_row(code: &str) -> LeaveCsvRow {
        LeaveCsvRow {
            employee_code: code.to_string(),
            leave_type: "Sick Leave".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(),
            days: 3,
        }
    }

    #[test]
    fn pairing_keeps_file_order() {
        let mut resolved = HashMap::new();
        resolved.insert("EMP0001".to_string(), Uuid::from_u128(1));
        resolved.insert("EMP0002".to_string(), Uuid::from_u128(2));

        let paired = pair_rows(
            vec![leave_row("EMP0002"), leave_row("EMP0001")],
            &resolved,
            |r| &r.employee_code,
        )
        .unwrap();
        assert_eq!(paired[0].0, Uuid::from_u128(2));
        assert_eq!(paired[1].0, Uuid::from_u128(1));
    }

    #[test]
    fn unknown_code_rejects_the_file_and_names_the_employee() {
        let mut resolved = HashMap::new();
        resolved.insert("EMP0001".to_string(), Uuid::from_u128(1));

        let err = pair_rows(
            vec![leave_row("EMP0001"), leave_row("EMP9999")],
            &resolved,
            |r| &r.employee_code,
        )
        .unwrap_err();
        assert!(err.contains("EMP9999"));
    }
}
