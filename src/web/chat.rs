use crate::db;
use crate::domain::models::{MessageSender, SessionStatus, WellnessCheckStatus};
use crate::risk;
use crate::services::ai::{self, EmployeeContext};
use crate::state::SharedState;
use crate::web::session::{self, EmployeeSession, TokenRole};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_MESSAGE_LENGTH: usize = 5000;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct SessionEnvelope {
    pub id: Uuid,
    pub status: SessionStatus,
    pub escalated: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl From<db::ChatSessionRow> for SessionEnvelope {
    fn from(row: db::ChatSessionRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            escalated: row.escalated,
            started_at: row.started_at,
            ended_at: row.ended_at,
        }
    }
}

#[derive(Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: MessageSender,
    pub content: String,
    pub serial_number: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct SessionWithMessages {
    #[serde(flatten)]
    pub session: SessionEnvelope,
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
pub struct ReplyEnvelope {
    pub reply: String,
    pub suggested_replies: Vec<String>,
    pub escalated: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/messages", post(send_message))
        .route("/sessions/:id/end", post(end_session))
        .with_state(state)
}

/// Idempotent: an employee with an active session gets it back instead of a
/// second one.
async fn create_session(
    EmployeeSession(employee): EmployeeSession,
    State(state): State<SharedState>,
) -> Result<Json<SessionEnvelope>, StatusCode> {
    if let Some(existing) = db::find_active_session(&state.pool, employee.id)
        .await
        .map_err(|e| {
            tracing::error!("active session lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
    {
        return Ok(Json(existing.into()));
    }

    let created = db::insert_session(&state.pool, employee.id)
        .await
        .map_err(|e| {
            tracing::error!("session creation failed for {}: {}", employee.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    tracing::info!("chat session {} started for {}", created.id, employee.employee_code);
    Ok(Json(created.into()))
}

/// Employees read their own transcript; staff tokens may read any.
async fn get_session(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionWithMessages>, StatusCode> {
    let token = session::extract_token(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    let claims = session::verify_session(&token, &state.session_key)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let chat = db::find_session(&state.pool, session_id)
        .await
        .map_err(|e| {
            tracing::error!("session lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    match claims.role {
        TokenRole::Employee => {
            if chat.employee_id != claims.subject_id {
                return Err(StatusCode::NOT_FOUND);
            }
            let employee = db::find_employee_by_id(&state.pool, claims.subject_id)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
                .ok_or(StatusCode::UNAUTHORIZED)?;
            if !employee.is_active {
                return Err(StatusCode::UNAUTHORIZED);
            }
        }
        TokenRole::Admin | TokenRole::Hr => {
            let staff = db::find_staff_by_id(&state.pool, claims.subject_id)
                .await
                .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
                .ok_or(StatusCode::UNAUTHORIZED)?;
            if !staff.is_active {
                return Err(StatusCode::UNAUTHORIZED);
            }
        }
    }

    let messages = decrypted_messages(&state, session_id).await?;
    Ok(Json(SessionWithMessages {
        session: chat.into(),
        messages,
    }))
}

async fn send_message(
    EmployeeSession(employee): EmployeeSession,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<ReplyEnvelope>, StatusCode> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if content.len() > MAX_MESSAGE_LENGTH {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let chat = owned_session(&state, employee.id, session_id).await?;
    if chat.status != SessionStatus::Active {
        return Err(StatusCode::CONFLICT);
    }

    // Prompt context is the transcript as it stood before this question.
    let history = conversation_history(&state, session_id).await?;

    let enc_question = state.cipher.seal(content).map_err(|e| {
        tracing::error!("message encryption failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    db::append_message(&state.pool, session_id, MessageSender::Employee, &enc_question)
        .await
        .map_err(|e| {
            tracing::error!("message insert failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let mut signals = risk::gather_signals(&state.pool, employee.id, &state.risk)
        .await
        .map_err(|e| {
            tracing::error!("risk signal gathering failed for {}: {}", employee.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let context = EmployeeContext {
        name: employee.name.clone(),
        employee_code: employee.employee_code.clone(),
        department: employee.department.clone(),
        position: employee.position.clone(),
        signals: signals.clone(),
    };
    let outcome = state.ai.wellness_reply(&context, &history, content).await;

    let enc_reply = state.cipher.seal(&outcome.reply).map_err(|e| {
        tracing::error!("reply encryption failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    db::append_message(&state.pool, session_id, MessageSender::Bot, &enc_reply)
        .await
        .map_err(|e| {
            tracing::error!("reply insert failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    // Blend the mechanical score with the model's read of the conversation.
    signals.conversation_urgency = outcome.urgency_level;
    let assessment = risk::assess(&state.risk, &signals);
    tracing::debug!(
        "session {} exchange: score {:.1}, urgency {:?}, emotion {:?}",
        session_id,
        assessment.score,
        outcome.urgency_level,
        outcome.primary_emotion
    );
    let suggestions = if outcome.suggested_replies.is_empty() {
        None
    } else {
        Some(outcome.suggested_replies.join("; "))
    };
    db::record_session_analysis(
        &state.pool,
        session_id,
        assessment.score.round() as i16,
        &serde_json::json!(assessment.factors),
        suggestions.as_deref(),
        None,
    )
    .await
    .map_err(|e| {
        tracing::error!("session analysis write failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let should_escalate = assessment.escalate || outcome.escalation_recommended;
    if should_escalate && !chat.escalated {
        let reason = outcome
            .escalation_reason
            .clone()
            .unwrap_or_else(|| escalation_reason_from(&assessment));
        db::escalate_session(&state.pool, session_id, &reason)
            .await
            .map_err(|e| {
                tracing::error!("session escalation write failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
        tracing::warn!(
            "session {} escalated for {} (score {:.1}): {}",
            session_id,
            employee.employee_code,
            assessment.score,
            reason
        );
        if let Err(e) = state
            .mailer
            .send_hr_escalation(&employee.name, session_id, &reason)
            .await
        {
            tracing::warn!("escalation email failed for session {}: {}", session_id, e);
        }
    }

    Ok(Json(ReplyEnvelope {
        reply: outcome.reply,
        suggested_replies: outcome.suggested_replies,
        escalated: chat.escalated || should_escalate,
    }))
}

async fn end_session(
    EmployeeSession(employee): EmployeeSession,
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionEnvelope>, StatusCode> {
    let chat = owned_session(&state, employee.id, session_id).await?;
    if chat.status != SessionStatus::Active {
        return Err(StatusCode::CONFLICT);
    }

    db::end_session(&state.pool, session_id).await.map_err(|e| {
        tracing::error!("session close failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let enc_farewell = state.cipher.seal(ai::FAREWELL_MESSAGE).map_err(|e| {
        tracing::error!("farewell encryption failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    db::append_message(&state.pool, session_id, MessageSender::Bot, &enc_farewell)
        .await
        .map_err(|e| {
            tracing::error!("farewell insert failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    db::set_wellness_check_status(&state.pool, employee.id, WellnessCheckStatus::Completed)
        .await
        .map_err(|e| {
            tracing::error!("wellness status update failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let closed = db::find_session(&state.pool, session_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let message_count = db::list_messages(&state.pool, session_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .len();
    let recap = session_recap(
        message_count,
        closed.risk_score,
        closed.escalated,
        closed.escalation_reason.as_deref(),
    );
    let enc_recap = state.cipher.seal(&recap).map_err(|e| {
        tracing::error!("summary encryption failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    db::set_session_summary(&state.pool, session_id, &enc_recap)
        .await
        .map_err(|e| {
            tracing::error!("summary write failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    tracing::info!("chat session {} completed for {}", session_id, employee.employee_code);
    Ok(Json(closed.into()))
}

async fn owned_session(
    state: &SharedState,
    employee_id: Uuid,
    session_id: Uuid,
) -> Result<db::ChatSessionRow, StatusCode> {
    let chat = db::find_session(&state.pool, session_id)
        .await
        .map_err(|e| {
            tracing::error!("session lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    // A foreign session id is indistinguishable from a missing one.
    if chat.employee_id != employee_id {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(chat)
}

pub(crate) async fn decrypted_messages(
    state: &SharedState,
    session_id: Uuid,
) -> Result<Vec<ChatMessage>, StatusCode> {
    let rows = db::list_messages(&state.pool, session_id)
        .await
        .map_err(|e| {
            tracing::error!("message listing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let content = state.cipher.open(&row.enc_content).map_err(|e| {
            tracing::error!("transcript decryption failed for message {}: {}", row.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        out.push(ChatMessage {
            id: row.id,
            sender: row.sender,
            content,
            serial_number: row.serial_number,
            created_at: row.created_at,
        });
    }
    Ok(out)
}

/// Transcript as (sender, plaintext) pairs for the prompt. Rows that no
/// longer decrypt are skipped rather than sinking the exchange.
async fn conversation_history(
    state: &SharedState,
    session_id: Uuid,
) -> Result<Vec<(MessageSender, String)>, StatusCode> {
    let rows = db::list_messages(&state.pool, session_id)
        .await
        .map_err(|e| {
            tracing::error!("message listing failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    let mut history = Vec::with_capacity(rows.len());
    for row in rows {
        match state.cipher.open(&row.enc_content) {
            Ok(content) => history.push((row.sender, content)),
            Err(e) => {
                tracing::warn!("skipping undecryptable message {} in prompt: {}", row.id, e)
            }
        }
    }
    Ok(history)
}

fn escalation_reason_from(assessment: &risk::RiskAssessment) -> String {
    if assessment.factors.is_empty() {
        format!("risk score {:.1} reached the escalation threshold", assessment.score)
    } else {
        format!(
            "risk score {:.1}: {}",
            assessment.score,
            assessment.factors.join("; ")
        )
    }
}

fn session_recap(
    message_count: usize,
    risk_score: Option<i16>,
    escalated: bool,
    escalation_reason: Option<&str>,
) -> String {
    let mut recap = format!("Wellness check completed after {message_count} messages.");
    if let Some(score) = risk_score {
        recap.push_str(&format!(" Last assessed risk score: {score}/10."));
    }
    if escalated {
        match escalation_reason {
            Some(reason) => recap.push_str(&format!(" Escalated to HR: {reason}.")),
            None => recap.push_str(" Escalated to HR."),
        }
    }
    recap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RiskConfig;
    use crate::risk::RiskSignals;
    use crate::services::ai::ChatOutcome;

    #[test]
    fn recap_mentions_score_and_escalation() {
        let recap = session_recap(6, Some(8), true, Some("talk of burnout"));
        assert!(recap.contains("6 messages"));
        assert!(recap.contains("8/10"));
        assert!(recap.contains("talk of burnout"));

        let quiet = session_recap(2, None, false, None);
        assert!(quiet.contains("2 messages"));
        assert!(!quiet.contains("Escalated"));
    }

    #[test]
    fn fallback_outcome_with_no_signals_does_not_escalate() {
        let cfg = RiskConfig::default();
        let outcome = ChatOutcome::fallback();

        let mut signals = RiskSignals::default();
        signals.conversation_urgency = outcome.urgency_level;
        let assessment = risk::assess(&cfg, &signals);

        assert!(!(assessment.escalate || outcome.escalation_recommended));
        assert_eq!(assessment.score, 0.0);
        assert_eq!(outcome.reply, ai::FALLBACK_REPLY);
        assert_eq!(outcome.suggested_replies.len(), 3);
    }

    #[test]
    fn derived_escalation_reason_lists_factors() {
        let cfg = RiskConfig::default();
        let signals = RiskSignals {
            conversation_urgency: Some(5),
            ..Default::default()
        };
        let assessment = risk::assess(&cfg, &signals);
        let reason = escalation_reason_from(&assessment);
        assert!(reason.contains("elevated urgency"));
    }
}
