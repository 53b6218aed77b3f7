//! Staff-facing employee management: profiles, risk views, transcripts and
//! targeted alert emails. Every route requires an ADMIN or HR token.

use crate::db::{self, EmployeeProfileChanges, NewEmployee};
use crate::domain::models::SessionStatus;
use crate::risk;
use crate::state::SharedState;
use crate::web::chat::{self, ChatMessage};
use crate::web::session::StaffSession;
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateEmployeeRequest {
    pub employee_code: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub department: String,
    pub position: String,
}

#[derive(Deserialize, Default)]
pub struct UpdateEmployeeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

#[derive(Serialize)]
pub struct EmployeeWithAnalytics {
    #[serde(flatten)]
    pub employee: db::EmployeeRow,
    pub analytics: db::EmployeeAnalytics,
}

#[derive(Serialize)]
pub struct ProfileUpdateResponse {
    pub employee: db::EmployeeRow,
    pub changed_fields: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct SessionAnalytics {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub status: SessionStatus,
    pub escalated: bool,
    pub escalation_reason: Option<String>,
    pub summary: Option<String>,
    pub suggestions: Option<String>,
    pub risk_score: Option<i16>,
    pub risk_factors: Value,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct AlertRequest {
    pub subject: String,
    pub message: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/employees", get(list_employees).post(create_employee))
        .route("/employees/:code", get(get_employee).patch(update_employee))
        .route("/employees/:code/deactivate", post(deactivate_employee))
        .route("/employees/:code/reactivate", post(reactivate_employee))
        .route("/employees/:code/risk", get(employee_risk))
        .route("/employees/:code/sessions", get(employee_sessions))
        .route("/employees/:code/alert", post(send_alert))
        .route("/sessions/:id/messages", get(session_messages))
        .route("/sessions/:id/analytics", get(session_analytics))
        .with_state(state)
}

async fn list_employees(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<EmployeeWithAnalytics>>, StatusCode> {
    let employees = db::list_employees(&state.pool).await.map_err(|e| {
        tracing::error!("employee listing failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut out = Vec::with_capacity(employees.len());
    for employee in employees {
        let analytics = db::employee_analytics(&state.pool, employee.id)
            .await
            .map_err(|e| {
                tracing::error!("analytics lookup failed for {}: {}", employee.employee_code, e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
        out.push(EmployeeWithAnalytics {
            employee,
            analytics,
        });
    }
    Ok(Json(out))
}

async fn create_employee(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateEmployeeRequest>,
) -> Result<Json<db::EmployeeRow>, StatusCode> {
    let code = payload.employee_code.trim().to_uppercase();
    let name = payload.name.trim();
    let email = normalize_email(&payload.email);
    let department = payload.department.trim();
    let position = payload.position.trim();

    if code.is_empty() || name.is_empty() || department.is_empty() || position.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if email.is_empty() || !email.contains('@') {
        return Err(StatusCode::BAD_REQUEST);
    }

    if db::find_employee_by_code(&state.pool, &code)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }
    if db::find_employee_by_email(&state.pool, &email)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    // New hires sign in with their employee code until they rotate it.
    let salt = SaltString::generate(OsRng);
    let password_hash = Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("password hashing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .to_string();

    let phone = payload
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let new = NewEmployee {
        employee_code: code,
        name: name.to_string(),
        email,
        phone,
        department: department.to_string(),
        position: position.to_string(),
        password_hash,
    };
    let employee = db::insert_employee(&state.pool, &new).await.map_err(|e| {
        tracing::error!("employee creation failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    tracing::info!("employee {} created", employee.employee_code);
    Ok(Json(employee))
}

async fn get_employee(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<db::EmployeeRow>, StatusCode> {
    let employee = employee_by_code(&state, &code).await?;
    Ok(Json(employee))
}

async fn update_employee(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<UpdateEmployeeRequest>,
) -> Result<Json<ProfileUpdateResponse>, StatusCode> {
    let employee = employee_by_code(&state, &code).await?;

    let mut changes = EmployeeProfileChanges::default();
    if let Some(name) = &payload.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(StatusCode::BAD_REQUEST);
        }
        changes.name = Some(name.to_string());
    }
    if let Some(email) = &payload.email {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(StatusCode::BAD_REQUEST);
        }
        if let Some(other) = db::find_employee_by_email(&state.pool, &email)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        {
            if other.id != employee.id {
                return Err(StatusCode::CONFLICT);
            }
        }
        changes.email = Some(email);
    }
    if let Some(phone) = &payload.phone {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(StatusCode::BAD_REQUEST);
        }
        changes.phone = Some(phone.to_string());
    }
    if let Some(department) = &payload.department {
        let department = department.trim();
        if department.is_empty() {
            return Err(StatusCode::BAD_REQUEST);
        }
        changes.department = Some(department.to_string());
    }
    if let Some(position) = &payload.position {
        let position = position.trim();
        if position.is_empty() {
            return Err(StatusCode::BAD_REQUEST);
        }
        changes.position = Some(position.to_string());
    }

    let changed_fields = db::update_employee_profile(&state.pool, employee.id, &changes)
        .await
        .map_err(|e| {
            tracing::error!("profile update failed for {}: {}", employee.employee_code, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let refreshed = db::find_employee_by_id(&state.pool, employee.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(ProfileUpdateResponse {
        employee: refreshed,
        changed_fields,
    }))
}

async fn deactivate_employee(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<db::EmployeeRow>, StatusCode> {
    set_employee_active(&state, &code, false).await
}

async fn reactivate_employee(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<db::EmployeeRow>, StatusCode> {
    set_employee_active(&state, &code, true).await
}

/// Current mechanical assessment from the ingested datasets alone, with no
/// conversation signal mixed in.
async fn employee_risk(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<risk::RiskAssessment>, StatusCode> {
    let employee = employee_by_code(&state, &code).await?;
    let signals = risk::gather_signals(&state.pool, employee.id, &state.risk)
        .await
        .map_err(|e| {
            tracing::error!("risk signal gathering failed for {}: {}", employee.employee_code, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(risk::assess(&state.risk, &signals)))
}

async fn employee_sessions(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<SessionAnalytics>>, StatusCode> {
    let employee = employee_by_code(&state, &code).await?;
    let sessions = db::list_sessions_for_employee(&state.pool, employee.id)
        .await
        .map_err(|e| {
            tracing::error!("session listing failed for {}: {}", employee.employee_code, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let rows = sessions
        .into_iter()
        .map(|row| analytics_view(&state, row))
        .collect();
    Ok(Json(rows))
}

async fn session_messages(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, StatusCode> {
    db::find_session(&state.pool, session_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let messages = chat::decrypted_messages(&state, session_id).await?;
    Ok(Json(messages))
}

async fn session_analytics(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionAnalytics>, StatusCode> {
    let session = db::find_session(&state.pool, session_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(analytics_view(&state, session)))
}

async fn send_alert(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<AlertRequest>,
) -> Result<StatusCode, StatusCode> {
    let subject = payload.subject.trim();
    let message = payload.message.trim();
    if subject.is_empty() || message.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let employee = employee_by_code(&state, &code).await?;
    state
        .mailer
        .send_employee_alert(&employee.email, &employee.name, subject, message)
        .await
        .map_err(|e| {
            tracing::error!("alert email failed for {}: {}", employee.employee_code, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    tracing::info!("alert sent to {}: {}", employee.employee_code, subject);
    Ok(StatusCode::NO_CONTENT)
}

async fn employee_by_code(
    state: &SharedState,
    code: &str,
) -> Result<db::EmployeeRow, StatusCode> {
    db::find_employee_by_code(&state.pool, &code.trim().to_uppercase())
        .await
        .map_err(|e| {
            tracing::error!("employee lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}

async fn set_employee_active(
    state: &SharedState,
    code: &str,
    active: bool,
) -> Result<Json<db::EmployeeRow>, StatusCode> {
    let employee = employee_by_code(state, code).await?;
    db::set_employee_active(&state.pool, employee.id, active)
        .await
        .map_err(|e| {
            tracing::error!("activation update failed for {}: {}", employee.employee_code, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let refreshed = db::find_employee_by_id(&state.pool, employee.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    tracing::info!(
        "employee {} {}",
        refreshed.employee_code,
        if active { "reactivated" } else { "deactivated" }
    );
    Ok(Json(refreshed))
}

fn analytics_view(state: &SharedState, row: db::ChatSessionRow) -> SessionAnalytics {
    // A summary that no longer decrypts is dropped from the view rather than
    // sinking the whole response.
    let summary = row.enc_summary.as_deref().and_then(|enc| {
        state
            .cipher
            .open(enc)
            .map_err(|e| tracing::warn!("summary decryption failed for session {}: {}", row.id, e))
            .ok()
    });
    SessionAnalytics {
        id: row.id,
        employee_id: row.employee_id,
        status: row.status,
        escalated: row.escalated,
        escalation_reason: row.escalation_reason,
        summary,
        suggestions: row.suggestions,
        risk_score: row.risk_score,
        risk_factors: row.risk_factors,
        started_at: row.started_at,
        ended_at: row.ended_at,
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Priya.Sharma@Example.COM "), "priya.sharma@example.com");
        assert_eq!(normalize_email(""), "");
    }
}
