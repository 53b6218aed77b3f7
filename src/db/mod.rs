pub mod seed;

use crate::domain::models::{
    EmotionZone, LeaveType, MessageSender, SessionStatus, StaffRole, WellnessCheckStatus,
};
use crate::import_utils::{
    ActivityCsvRow, LeaveCsvRow, OnboardingCsvRow, PerformanceCsvRow, RewardsCsvRow,
    VibemeterCsvRow,
};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct EmployeeRow {
    pub id: Uuid,
    pub employee_code: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: String,
    #[sqlx(rename = "job_title")]
    pub position: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub immediate_attention: bool,
    pub wellness_check_status: WellnessCheckStatus,
    pub last_vibe: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct StaffRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: StaffRole,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ChatSessionRow {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub status: SessionStatus,
    pub escalated: bool,
    pub escalation_reason: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub enc_summary: Option<String>,
    pub suggestions: Option<String>,
    pub risk_score: Option<i16>,
    pub risk_factors: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender: MessageSender,
    pub enc_content: String,
    pub serial_number: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub employee_code: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: String,
    pub position: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

/// Snapshot of the analytics columns shown next to each employee in the HR
/// list view.
#[derive(Debug, Serialize)]
pub struct EmployeeAnalytics {
    pub recent_vibe: Option<String>,
    pub leave_balance: i64,
    pub average_hours_worked: Option<f64>,
    pub latest_performance_rating: Option<i16>,
    pub rewards_count: i64,
}

// ---------- Employees ----------

const EMPLOYEE_COLUMNS: &str = r#"
    id,
    employee_code,
    name,
    email,
    phone,
    department,
    job_title,
    password_hash,
    is_active,
    immediate_attention,
    wellness_check_status,
    last_vibe,
    created_at,
    updated_at
"#;

pub async fn find_employee_by_id(pool: &PgPool, id: Uuid) -> Result<Option<EmployeeRow>> {
    let employee = sqlx::query_as::<_, EmployeeRow>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(employee)
}

pub async fn find_employee_by_code(pool: &PgPool, code: &str) -> Result<Option<EmployeeRow>> {
    let employee = sqlx::query_as::<_, EmployeeRow>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE employee_code = $1"
    ))
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(employee)
}

pub async fn find_employee_by_email(pool: &PgPool, email: &str) -> Result<Option<EmployeeRow>> {
    let employee = sqlx::query_as::<_, EmployeeRow>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(employee)
}

pub async fn list_employees(pool: &PgPool) -> Result<Vec<EmployeeRow>> {
    let employees = sqlx::query_as::<_, EmployeeRow>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY employee_code ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(employees)
}

pub async fn insert_employee(pool: &PgPool, new: &NewEmployee) -> Result<EmployeeRow> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO employees (id, employee_code, name, email, phone, department, job_title, password_hash)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(id)
    .bind(&new.employee_code)
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(&new.department)
    .bind(&new.position)
    .bind(&new.password_hash)
    .execute(pool)
    .await?;

    let employee = find_employee_by_id(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("employee vanished after insert"))?;
    Ok(employee)
}

/// Applies a profile change set and reports which fields actually changed.
/// Unchanged or omitted fields are left alone.
pub async fn update_employee_profile(
    pool: &PgPool,
    id: Uuid,
    changes: &EmployeeProfileChanges,
) -> Result<Vec<&'static str>> {
    let Some(current) = find_employee_by_id(pool, id).await? else {
        return Ok(Vec::new());
    };

    let mut changed = Vec::new();
    let name = match &changes.name {
        Some(v) if *v != current.name => {
            changed.push("name");
            v.clone()
        }
        _ => current.name.clone(),
    };
    let email = match &changes.email {
        Some(v) if *v != current.email => {
            changed.push("email");
            v.clone()
        }
        _ => current.email.clone(),
    };
    let phone = match &changes.phone {
        Some(v) if Some(v) != current.phone.as_ref() => {
            changed.push("phone");
            Some(v.clone())
        }
        _ => current.phone.clone(),
    };
    let department = match &changes.department {
        Some(v) if *v != current.department => {
            changed.push("department");
            v.clone()
        }
        _ => current.department.clone(),
    };
    let position = match &changes.position {
        Some(v) if *v != current.position => {
            changed.push("position");
            v.clone()
        }
        _ => current.position.clone(),
    };

    if changed.is_empty() {
        return Ok(changed);
    }

    sqlx::query(
        r#"
        UPDATE employees
        SET name = $2,
            email = $3,
            phone = $4,
            department = $5,
            job_title = $6,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(phone)
    .bind(department)
    .bind(position)
    .execute(pool)
    .await?;

    Ok(changed)
}

pub async fn set_employee_active(pool: &PgPool, id: Uuid, active: bool) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE employees
        SET is_active = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(active)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_employee_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE employees
        SET password_hash = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(password_hash)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_immediate_attention(pool: &PgPool, id: Uuid, flagged: bool) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE employees
        SET immediate_attention = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(flagged)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_wellness_check_status(
    pool: &PgPool,
    id: Uuid,
    status: WellnessCheckStatus,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE employees
        SET wellness_check_status = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(())
}

/// Resolves a batch of employee codes in one round trip. Codes missing from
/// the result were unknown.
pub async fn resolve_employee_codes(
    pool: &PgPool,
    codes: &[String],
) -> Result<std::collections::HashMap<String, Uuid>> {
    if codes.is_empty() {
        return Ok(std::collections::HashMap::new());
    }
    let rows = sqlx::query(
        r#"
        SELECT id, employee_code
        FROM employees
        WHERE employee_code = ANY($1)
        "#,
    )
    .bind(codes)
    .fetch_all(pool)
    .await?;

    let mut out = std::collections::HashMap::new();
    for row in rows {
        let id: Uuid = row.try_get("id")?;
        let code: String = row.try_get("employee_code")?;
        out.insert(code, id);
    }
    Ok(out)
}

pub async fn employee_analytics(pool: &PgPool, employee_id: Uuid) -> Result<EmployeeAnalytics> {
    let row = sqlx::query(
        r#"
        SELECT
            (SELECT emotion_zone::TEXT
             FROM vibemeter_records
             WHERE employee_id = $1
             ORDER BY response_date DESC, created_at DESC
             LIMIT 1) AS recent_vibe,
            (SELECT COALESCE(SUM(days), 0)::BIGINT
             FROM leave_records
             WHERE employee_id = $1
               AND EXTRACT(YEAR FROM start_date) = EXTRACT(YEAR FROM CURRENT_DATE)) AS leave_taken,
            (SELECT CAST(AVG(work_hours) AS DOUBLE PRECISION)
             FROM (SELECT work_hours
                   FROM activity_records
                   WHERE employee_id = $1
                   ORDER BY activity_date DESC
                   LIMIT 3) recent) AS average_hours,
            (SELECT rating
             FROM performance_records
             WHERE employee_id = $1
             ORDER BY created_at DESC
             LIMIT 1) AS latest_rating,
            (SELECT COUNT(*)
             FROM reward_records
             WHERE employee_id = $1) AS rewards_count
        "#,
    )
    .bind(employee_id)
    .fetch_one(pool)
    .await?;

    let leave_taken: i64 = row.try_get("leave_taken")?;
    Ok(EmployeeAnalytics {
        recent_vibe: row.try_get("recent_vibe")?,
        leave_balance: (30 - leave_taken).max(0),
        average_hours_worked: row.try_get("average_hours")?,
        latest_performance_rating: row.try_get("latest_rating")?,
        rewards_count: row.try_get("rewards_count")?,
    })
}

// ---------- Staff users ----------

const STAFF_COLUMNS: &str = r#"
    id,
    email,
    name,
    role,
    password_hash,
    is_active,
    created_at,
    updated_at
"#;

pub async fn find_staff_by_id(pool: &PgPool, id: Uuid) -> Result<Option<StaffRow>> {
    let staff = sqlx::query_as::<_, StaffRow>(&format!(
        "SELECT {STAFF_COLUMNS} FROM staff_users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(staff)
}

pub async fn find_staff_by_email(pool: &PgPool, email: &str) -> Result<Option<StaffRow>> {
    let staff = sqlx::query_as::<_, StaffRow>(&format!(
        "SELECT {STAFF_COLUMNS} FROM staff_users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(staff)
}

pub async fn list_staff(pool: &PgPool) -> Result<Vec<StaffRow>> {
    let staff = sqlx::query_as::<_, StaffRow>(&format!(
        "SELECT {STAFF_COLUMNS} FROM staff_users ORDER BY created_at ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(staff)
}

pub async fn insert_staff(
    pool: &PgPool,
    email: &str,
    name: &str,
    role: StaffRole,
    password_hash: &str,
) -> Result<StaffRow> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO staff_users (id, email, name, role, password_hash)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(name)
    .bind(role)
    .bind(password_hash)
    .execute(pool)
    .await?;

    let staff = find_staff_by_id(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("staff user vanished after insert"))?;
    Ok(staff)
}

pub async fn set_staff_active(pool: &PgPool, id: Uuid, active: bool) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE staff_users
        SET is_active = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(active)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_staff_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE staff_users
        SET password_hash = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(password_hash)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------- Chat sessions ----------

const SESSION_COLUMNS: &str = r#"
    id,
    employee_id,
    status,
    escalated,
    escalation_reason,
    started_at,
    ended_at,
    enc_summary,
    suggestions,
    risk_score,
    risk_factors
"#;

pub async fn find_session(pool: &PgPool, id: Uuid) -> Result<Option<ChatSessionRow>> {
    let session = sqlx::query_as::<_, ChatSessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(session)
}

pub async fn find_active_session(
    pool: &PgPool,
    employee_id: Uuid,
) -> Result<Option<ChatSessionRow>> {
    let session = sqlx::query_as::<_, ChatSessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE employee_id = $1 AND status = 'active'"
    ))
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;
    Ok(session)
}

pub async fn insert_session(pool: &PgPool, employee_id: Uuid) -> Result<ChatSessionRow> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO chat_sessions (id, employee_id)
        VALUES ($1, $2)
        "#,
    )
    .bind(id)
    .bind(employee_id)
    .execute(pool)
    .await?;

    let session = find_session(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("chat session vanished after insert"))?;
    Ok(session)
}

pub async fn list_sessions_for_employee(
    pool: &PgPool,
    employee_id: Uuid,
) -> Result<Vec<ChatSessionRow>> {
    let sessions = sqlx::query_as::<_, ChatSessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE employee_id = $1 ORDER BY started_at DESC"
    ))
    .bind(employee_id)
    .fetch_all(pool)
    .await?;
    Ok(sessions)
}

/// Writes the outcome of one analyzed exchange back onto the session.
pub async fn record_session_analysis(
    pool: &PgPool,
    session_id: Uuid,
    risk_score: i16,
    risk_factors: &serde_json::Value,
    suggestions: Option<&str>,
    enc_summary: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE chat_sessions
        SET risk_score = $2,
            risk_factors = $3,
            suggestions = COALESCE($4, suggestions),
            enc_summary = COALESCE($5, enc_summary),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .bind(risk_score)
    .bind(risk_factors)
    .bind(suggestions)
    .bind(enc_summary)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_session_summary(pool: &PgPool, session_id: Uuid, enc_summary: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE chat_sessions
        SET enc_summary = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .bind(enc_summary)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn escalate_session(pool: &PgPool, session_id: Uuid, reason: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE chat_sessions
        SET escalated = TRUE,
            escalation_reason = $2,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn end_session(pool: &PgPool, session_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE chat_sessions
        SET status = 'completed',
            ended_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

// ---------- Messages ----------

/// Appends a message with the next per-session serial number.
pub async fn append_message(
    pool: &PgPool,
    session_id: Uuid,
    sender: MessageSender,
    enc_content: &str,
) -> Result<MessageRow> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO messages (id, session_id, sender, enc_content, serial_number)
        SELECT $1, $2, $3, $4, COALESCE(MAX(serial_number), 0) + 1
        FROM messages
        WHERE session_id = $2
        "#,
    )
    .bind(id)
    .bind(session_id)
    .bind(sender)
    .bind(enc_content)
    .execute(pool)
    .await?;

    let message = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT id, session_id, sender, enc_content, serial_number, created_at
        FROM messages
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(message)
}

pub async fn list_messages(pool: &PgPool, session_id: Uuid) -> Result<Vec<MessageRow>> {
    let messages = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT id, session_id, sender, enc_content, serial_number, created_at
        FROM messages
        WHERE session_id = $1
        ORDER BY serial_number ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(messages)
}

// ---------- Fact ingestion ----------

/// Each batch insert runs in its own transaction so one bad row rejects the
/// whole file instead of leaving a partial import behind.
pub async fn insert_leave_batch(pool: &PgPool, rows: &[(Uuid, LeaveCsvRow)]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for (employee_id, row) in rows {
        sqlx::query(
            r#"
            INSERT INTO leave_records (id, employee_id, leave_type, start_date, end_date, days)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(LeaveType::parse_label(&row.leave_type))
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(row.days)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(rows.len() as u64)
}

pub async fn insert_activity_batch(pool: &PgPool, rows: &[(Uuid, ActivityCsvRow)]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for (employee_id, row) in rows {
        sqlx::query(
            r#"
            INSERT INTO activity_records
                (id, employee_id, activity_date, work_hours, meetings_attended, emails_sent, teams_messages_sent)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(row.date)
        .bind(row.work_hours)
        .bind(row.meetings_attended)
        .bind(row.emails_sent)
        .bind(row.teams_messages_sent)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(rows.len() as u64)
}

pub async fn insert_rewards_batch(pool: &PgPool, rows: &[(Uuid, RewardsCsvRow)]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for (employee_id, row) in rows {
        sqlx::query(
            r#"
            INSERT INTO reward_records (id, employee_id, award_type, award_date, points)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(&row.award_type)
        .bind(row.award_date)
        .bind(row.reward_points)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(rows.len() as u64)
}

pub async fn insert_performance_batch(
    pool: &PgPool,
    rows: &[(Uuid, PerformanceCsvRow)],
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for (employee_id, row) in rows {
        sqlx::query(
            r#"
            INSERT INTO performance_records
                (id, employee_id, review_period, rating, manager_feedback, promotion_consideration)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(&row.review_period)
        .bind(row.performance_rating)
        .bind(&row.manager_feedback)
        .bind(row.promotion_consideration)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(rows.len() as u64)
}

pub async fn insert_vibemeter_batch(
    pool: &PgPool,
    rows: &[(Uuid, VibemeterCsvRow)],
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for (employee_id, row) in rows {
        sqlx::query(
            r#"
            INSERT INTO vibemeter_records (id, employee_id, response_date, vibe_score, emotion_zone)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(row.response_date)
        .bind(row.vibe_score)
        .bind(row.emotion_zone)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            UPDATE employees
            SET last_vibe = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(employee_id)
        .bind(row.emotion_zone.as_str())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(rows.len() as u64)
}

pub async fn insert_onboarding_batch(
    pool: &PgPool,
    rows: &[(Uuid, OnboardingCsvRow)],
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for (employee_id, row) in rows {
        sqlx::query(
            r#"
            INSERT INTO onboarding_records
                (id, employee_id, joining_date, feedback, mentor_assigned, training_completed)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(employee_id)
        .bind(row.joining_date)
        .bind(&row.feedback)
        .bind(row.mentor_assigned)
        .bind(row.training_completed)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(rows.len() as u64)
}

// ---------- Risk signal readers ----------

#[derive(Debug, Clone)]
pub struct LatestVibe {
    pub vibe_score: i16,
    pub emotion_zone: EmotionZone,
    pub response_date: NaiveDate,
}

pub async fn latest_vibe(pool: &PgPool, employee_id: Uuid) -> Result<Option<LatestVibe>> {
    let row = sqlx::query(
        r#"
        SELECT vibe_score, emotion_zone, response_date
        FROM vibemeter_records
        WHERE employee_id = $1
        ORDER BY response_date DESC, created_at DESC
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    Ok(Some(LatestVibe {
        vibe_score: row.try_get("vibe_score")?,
        emotion_zone: row.try_get("emotion_zone")?,
        response_date: row.try_get("response_date")?,
    }))
}

/// Average work hours and meeting counts over the most recent activity rows.
pub async fn activity_averages(
    pool: &PgPool,
    employee_id: Uuid,
    window: i64,
) -> Result<Option<(f64, f64)>> {
    let row = sqlx::query(
        r#"
        SELECT
            CAST(AVG(work_hours) AS DOUBLE PRECISION) AS avg_hours,
            CAST(AVG(meetings_attended) AS DOUBLE PRECISION) AS avg_meetings
        FROM (
            SELECT work_hours, meetings_attended
            FROM activity_records
            WHERE employee_id = $1
            ORDER BY activity_date DESC
            LIMIT $2
        ) recent
        "#,
    )
    .bind(employee_id)
    .bind(window)
    .fetch_one(pool)
    .await?;

    let hours: Option<f64> = row.try_get("avg_hours")?;
    let meetings: Option<f64> = row.try_get("avg_meetings")?;
    match (hours, meetings) {
        (Some(h), Some(m)) => Ok(Some((h, m))),
        _ => Ok(None),
    }
}

pub async fn leave_days_taken_this_year(pool: &PgPool, employee_id: Uuid) -> Result<Option<i64>> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS records, COALESCE(SUM(days), 0)::BIGINT AS taken
        FROM leave_records
        WHERE employee_id = $1
          AND EXTRACT(YEAR FROM start_date) = EXTRACT(YEAR FROM CURRENT_DATE)
        "#,
    )
    .bind(employee_id)
    .fetch_one(pool)
    .await?;

    let records: i64 = row.try_get("records")?;
    if records == 0 {
        return Ok(None);
    }
    Ok(Some(row.try_get("taken")?))
}

pub async fn latest_performance_rating(pool: &PgPool, employee_id: Uuid) -> Result<Option<i16>> {
    let rating: Option<i16> = sqlx::query_scalar(
        r#"
        SELECT rating
        FROM performance_records
        WHERE employee_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;
    Ok(rating)
}

pub async fn reward_points_this_year(pool: &PgPool, employee_id: Uuid) -> Result<Option<i64>> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS records, COALESCE(SUM(points), 0)::BIGINT AS total
        FROM reward_records
        WHERE employee_id = $1
          AND EXTRACT(YEAR FROM award_date) = EXTRACT(YEAR FROM CURRENT_DATE)
        "#,
    )
    .bind(employee_id)
    .fetch_one(pool)
    .await?;

    let records: i64 = row.try_get("records")?;
    if records == 0 {
        return Ok(None);
    }
    Ok(Some(row.try_get("total")?))
}

#[derive(Debug, Clone)]
pub struct VibeSample {
    pub employee_id: Uuid,
    pub vibe_score: f64,
}

/// Every vibemeter response in the store, for the at-risk screen.
pub async fn all_vibe_samples(pool: &PgPool) -> Result<Vec<VibeSample>> {
    let rows = sqlx::query(
        r#"
        SELECT employee_id, CAST(vibe_score AS DOUBLE PRECISION) AS vibe_score
        FROM vibemeter_records
        ORDER BY employee_id, response_date ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(VibeSample {
            employee_id: row.try_get("employee_id")?,
            vibe_score: row.try_get("vibe_score")?,
        });
    }
    Ok(out)
}

// ---------- Daily reports ----------

pub async fn upsert_daily_report(
    pool: &PgPool,
    report_date: NaiveDate,
    payload: &serde_json::Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_reports (report_date, payload)
        VALUES ($1, $2)
        ON CONFLICT (report_date) DO UPDATE
        SET payload = EXCLUDED.payload
        "#,
    )
    .bind(report_date)
    .bind(payload)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_daily_report(
    pool: &PgPool,
    report_date: NaiveDate,
) -> Result<Option<serde_json::Value>> {
    let payload: Option<serde_json::Value> = sqlx::query_scalar(
        r#"
        SELECT payload
        FROM daily_reports
        WHERE report_date = $1
        "#,
    )
    .bind(report_date)
    .fetch_optional(pool)
    .await?;
    Ok(payload)
}
