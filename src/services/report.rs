//! Daily well-being report: mechanical aggregates over one calendar day in
//! the reporting timezone, plus a model-written narrative. The narrative is
//! best effort; aggregates are stored even when the model is unavailable.

use crate::db;
use crate::domain::models::EmotionZone;
use crate::services::ai::{ReportNarrative, WellnessAi};
use crate::services::email::Mailer;
use anyhow::Result;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
struct SessionDigest {
    employee_code: String,
    employee_name: String,
    department: String,
    escalated: bool,
    escalation_reason: Option<String>,
    risk_score: Option<i16>,
    risk_factors: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ReportAggregates {
    pub sessions_started: i64,
    pub escalated_sessions: i64,
    pub average_risk_score: Option<f64>,
    pub emotion_distribution: BTreeMap<String, i64>,
    pub responses: i64,
    pub responders: i64,
    pub active_employees: i64,
    /// Percentage of active employees who answered the vibemeter that day.
    pub response_rate: f64,
}

/// Builds, stores and returns the report for one date.
pub async fn generate_daily_report(
    pool: &PgPool,
    ai: &WellnessAi,
    tz: Tz,
    report_date: NaiveDate,
) -> Result<serde_json::Value> {
    let (start, end) = day_bounds_utc(tz, report_date);
    let sessions = session_digests(pool, start, end).await?;
    let aggregates = aggregates_for(pool, report_date, &sessions).await?;

    let narrative = match ai
        .report_narrative(
            report_date,
            &render_aggregates(&aggregates),
            &render_session_table(&sessions),
        )
        .await
    {
        Ok(narrative) => narrative,
        Err(err) => {
            tracing::warn!("report narrative unavailable, storing aggregates only: {err}");
            ReportNarrative::default()
        }
    };

    let payload = serde_json::json!({
        "report_date": report_date,
        "aggregates": aggregates,
        "sessions": sessions,
        "narrative": narrative,
    });
    db::upsert_daily_report(pool, report_date, &payload).await?;
    Ok(payload)
}

/// Stored report for the date, generated on demand when absent.
pub async fn ensure_daily_report(
    pool: &PgPool,
    ai: &WellnessAi,
    tz: Tz,
    report_date: NaiveDate,
) -> Result<serde_json::Value> {
    if let Some(existing) = db::get_daily_report(pool, report_date).await? {
        return Ok(existing);
    }
    generate_daily_report(pool, ai, tz, report_date).await
}

/// Backfills yesterday's report if it has not been generated yet. The
/// scheduler sweeps hourly, so the report lands within the hour after
/// midnight in the report timezone and reruns are no-ops.
pub async fn backfill_yesterday(
    pool: &PgPool,
    ai: &WellnessAi,
    mailer: &Mailer,
    tz: Tz,
) -> Result<()> {
    let today = Utc::now().with_timezone(&tz).date_naive();
    let Some(yesterday) = today.pred_opt() else {
        return Ok(());
    };
    if db::get_daily_report(pool, yesterday).await?.is_some() {
        return Ok(());
    }
    generate_daily_report(pool, ai, tz, yesterday).await?;
    if let Err(err) = mailer.send_report_notice(yesterday).await {
        tracing::warn!("report notice email failed: {err}");
    }
    Ok(())
}

fn day_bounds_utc(tz: Tz, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    (local_midnight(tz, date), local_midnight(tz, date + Days::new(1)))
}

fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.with_timezone(&Utc)
        }
        // Midnight skipped by a DST jump: take the first following valid hour.
        chrono::LocalResult::None => tz
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

async fn session_digests(
    pool: &PgPool,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<SessionDigest>> {
    let rows = sqlx::query(
        r#"
        SELECT e.employee_code, e.name AS employee_name, e.department,
               s.escalated, s.escalation_reason, s.risk_score, s.risk_factors
        FROM chat_sessions s
        JOIN employees e ON e.id = s.employee_id
        WHERE s.started_at >= $1 AND s.started_at < $2
        ORDER BY s.started_at ASC
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(SessionDigest {
            employee_code: row.try_get("employee_code")?,
            employee_name: row.try_get("employee_name")?,
            department: row.try_get("department")?,
            escalated: row.try_get("escalated")?,
            escalation_reason: row.try_get("escalation_reason")?,
            risk_score: row.try_get("risk_score")?,
            risk_factors: row.try_get("risk_factors")?,
        });
    }
    Ok(out)
}

async fn aggregates_for(
    pool: &PgPool,
    report_date: NaiveDate,
    sessions: &[SessionDigest],
) -> Result<ReportAggregates> {
    let sessions_started = sessions.len() as i64;
    let escalated_sessions = sessions.iter().filter(|s| s.escalated).count() as i64;
    let scored: Vec<f64> = sessions
        .iter()
        .filter_map(|s| s.risk_score.map(f64::from))
        .collect();
    let average_risk_score = if scored.is_empty() {
        None
    } else {
        Some(scored.iter().sum::<f64>() / scored.len() as f64)
    };

    let mut emotion_distribution: BTreeMap<String, i64> = EmotionZone::ALL
        .iter()
        .map(|zone| (zone.as_str().to_string(), 0))
        .collect();
    let mut responses = 0i64;
    let rows = sqlx::query(
        r#"
        SELECT emotion_zone, COUNT(*) AS responses
        FROM vibemeter_records
        WHERE response_date = $1
        GROUP BY emotion_zone
        "#,
    )
    .bind(report_date)
    .fetch_all(pool)
    .await?;
    for row in rows {
        let zone: EmotionZone = row.try_get("emotion_zone")?;
        let count: i64 = row.try_get("responses")?;
        responses += count;
        if let Some(slot) = emotion_distribution.get_mut(zone.as_str()) {
            *slot = count;
        }
    }

    let responders: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT employee_id) FROM vibemeter_records WHERE response_date = $1",
    )
    .bind(report_date)
    .fetch_one(pool)
    .await?;
    let active_employees: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM employees WHERE is_active = TRUE")
            .fetch_one(pool)
            .await?;
    let response_rate = if active_employees > 0 {
        responders as f64 / active_employees as f64 * 100.0
    } else {
        0.0
    };

    Ok(ReportAggregates {
        sessions_started,
        escalated_sessions,
        average_risk_score,
        emotion_distribution,
        responses,
        responders,
        active_employees,
        response_rate,
    })
}

fn render_aggregates(a: &ReportAggregates) -> String {
    let average = a
        .average_risk_score
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "none".to_string());
    let zones = a
        .emotion_distribution
        .iter()
        .map(|(zone, count)| format!("{zone} {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "- chat sessions started: {}\n\
         - escalated sessions: {}\n\
         - average session risk score: {average}\n\
         - vibemeter responses: {} from {} employees ({:.1}% of {} active)\n\
         - emotion zones: {zones}",
        a.sessions_started, a.escalated_sessions, a.responses, a.responders, a.response_rate,
        a.active_employees,
    )
}

fn render_session_table(sessions: &[SessionDigest]) -> String {
    if sessions.is_empty() {
        return "No chat sessions were started on this date.".to_string();
    }
    let mut out = String::from(
        "| Employee | Department | Risk Score | Escalated | Reason |\n|---|---|---|---|---|\n",
    );
    for s in sessions {
        out.push_str(&format!(
            "| {} ({}) | {} | {} | {} | {} |\n",
            s.employee_name,
            s.employee_code,
            s.department,
            s.risk_score
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            if s.escalated { "yes" } else { "no" },
            s.escalation_reason.as_deref().unwrap_or("-"),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_bounds_convert_local_midnight_to_utc() {
        let tz: Tz = "Europe/Kyiv".parse().unwrap();
        let summer = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let (start, end) = day_bounds_utc(tz, summer);
        assert_eq!(start.to_rfc3339(), "2024-06-14T21:00:00+00:00");
        assert_eq!(end - start, chrono::Duration::hours(24));

        let winter = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let (start, _) = day_bounds_utc(tz, winter);
        assert_eq!(start.to_rfc3339(), "2024-01-14T22:00:00+00:00");
    }

    #[test]
    fn empty_day_renders_placeholder_table() {
        assert!(render_session_table(&[]).contains("No chat sessions"));
    }

    #[test]
    fn session_table_lists_each_session() {
        let sessions = vec![SessionDigest {
            employee_code: "EMP0001".to_string(),
            employee_name: "Alex Doe".to_string(),
            department: "Engineering".to_string(),
            escalated: true,
            escalation_reason: Some("elevated distress".to_string()),
            risk_score: Some(8),
            risk_factors: serde_json::json!(["critically low vibe score (1)"]),
        }];
        let table = render_session_table(&sessions);
        assert!(table.contains("Alex Doe (EMP0001)"));
        assert!(table.contains("| 8 |"));
        assert!(table.contains("elevated distress"));
    }

    #[test]
    fn aggregate_rendering_covers_all_zones() {
        let aggregates = ReportAggregates {
            sessions_started: 3,
            escalated_sessions: 1,
            average_risk_score: Some(4.5),
            emotion_distribution: EmotionZone::ALL
                .iter()
                .map(|z| (z.as_str().to_string(), 0))
                .collect(),
            responses: 12,
            responders: 10,
            active_employees: 40,
            response_rate: 25.0,
        };
        let rendered = render_aggregates(&aggregates);
        assert!(rendered.contains("chat sessions started: 3"));
        assert!(rendered.contains("4.5"));
        assert!(rendered.contains("Frustrated 0"));
        assert!(rendered.contains("25.0% of 40 active"));
    }
}
