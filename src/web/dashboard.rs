//! Aggregate wellness dashboard for the HR landing page.

use crate::state::SharedState;
use crate::web::session::StaffSession;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{PgPool, Row};

#[derive(Serialize)]
pub struct VibeOverview {
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
}

#[derive(Serialize)]
pub struct AttentionOverview {
    pub flagged: i64,
    pub total_employees: i64,
    pub percentage: f64,
}

#[derive(Serialize)]
pub struct SessionOverview {
    pub total: i64,
    pub escalated: i64,
}

#[derive(Serialize)]
pub struct HistogramBucket {
    pub score: i16,
    pub responses: i64,
}

#[derive(Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub average_score: f64,
    pub responses: i64,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub vibe_overview: VibeOverview,
    pub attention: AttentionOverview,
    pub sessions: SessionOverview,
    pub vibe_histogram: Vec<HistogramBucket>,
    pub vibe_trend: Vec<TrendPoint>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .with_state(state)
}

async fn dashboard(
    StaffSession(_staff): StaffSession,
    State(state): State<SharedState>,
) -> Result<Json<DashboardResponse>, StatusCode> {
    build_dashboard(&state.pool).await.map(Json).map_err(|e| {
        tracing::error!("dashboard aggregation failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn build_dashboard(pool: &PgPool) -> anyhow::Result<DashboardResponse> {
    // Latest response per employee, newest insert winning a same-day tie.
    let latest_rows = sqlx::query(
        r#"
        SELECT vibe_score
        FROM (
            SELECT vibe_score,
                   ROW_NUMBER() OVER (
                       PARTITION BY employee_id
                       ORDER BY response_date DESC, created_at DESC
                   ) AS rn
            FROM vibemeter_records
        ) latest
        WHERE rn = 1
        "#,
    )
    .fetch_all(pool)
    .await?;
    let mut vibe_overview = VibeOverview {
        positive: 0,
        negative: 0,
        neutral: 0,
    };
    for row in latest_rows {
        let score: i16 = row.try_get("vibe_score")?;
        match vibe_bucket(score) {
            VibeBucket::Positive => vibe_overview.positive += 1,
            VibeBucket::Negative => vibe_overview.negative += 1,
            VibeBucket::Neutral => vibe_overview.neutral += 1,
        }
    }

    let attention = sqlx::query(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE immediate_attention) AS flagged,
            COUNT(*) AS total
        FROM employees
        "#,
    )
    .fetch_one(pool)
    .await?;
    let flagged: i64 = attention.try_get("flagged")?;
    let total_employees: i64 = attention.try_get("total")?;
    let percentage = if total_employees > 0 {
        flagged as f64 / total_employees as f64 * 100.0
    } else {
        0.0
    };

    let sessions = sqlx::query(
        r#"
        SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE escalated) AS escalated
        FROM chat_sessions
        "#,
    )
    .fetch_one(pool)
    .await?;
    let session_overview = SessionOverview {
        total: sessions.try_get("total")?,
        escalated: sessions.try_get("escalated")?,
    };

    let mut score_counts = Vec::new();
    let rows = sqlx::query(
        r#"
        SELECT vibe_score, COUNT(*) AS responses
        FROM vibemeter_records
        GROUP BY vibe_score
        "#,
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        let score: i16 = row.try_get("vibe_score")?;
        let responses: i64 = row.try_get("responses")?;
        score_counts.push((score, responses));
    }

    let mut vibe_trend = Vec::new();
    let rows = sqlx::query(
        r#"
        SELECT response_date,
               CAST(AVG(vibe_score) AS DOUBLE PRECISION) AS average_score,
               COUNT(*) AS responses
        FROM vibemeter_records
        WHERE response_date > CURRENT_DATE - 7
        GROUP BY response_date
        ORDER BY response_date ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    for row in rows {
        vibe_trend.push(TrendPoint {
            date: row.try_get("response_date")?,
            average_score: row.try_get("average_score")?,
            responses: row.try_get("responses")?,
        });
    }

    Ok(DashboardResponse {
        vibe_overview,
        attention: AttentionOverview {
            flagged,
            total_employees,
            percentage,
        },
        sessions: session_overview,
        vibe_histogram: zero_filled_histogram(&score_counts),
        vibe_trend,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VibeBucket {
    Positive,
    Negative,
    Neutral,
}

/// Overview split for the 1..=10 scale: strictly above 3 is positive,
/// strictly below is negative, exactly 3 is neutral.
fn vibe_bucket(score: i16) -> VibeBucket {
    match score.cmp(&3) {
        std::cmp::Ordering::Greater => VibeBucket::Positive,
        std::cmp::Ordering::Less => VibeBucket::Negative,
        std::cmp::Ordering::Equal => VibeBucket::Neutral,
    }
}

/// Expands sparse per-score counts into the full 1..=10 scale so chart axes
/// never shift with the data.
fn zero_filled_histogram(counts: &[(i16, i64)]) -> Vec<HistogramBucket> {
    (1..=10)
        .map(|score| HistogramBucket {
            score,
            responses: counts
                .iter()
                .find(|(s, _)| *s == score)
                .map(|(_, n)| *n)
                .unwrap_or(0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_score_is_neither_positive_nor_negative() {
        assert_eq!(vibe_bucket(2), VibeBucket::Negative);
        assert_eq!(vibe_bucket(3), VibeBucket::Neutral);
        assert_eq!(vibe_bucket(4), VibeBucket::Positive);
        assert_eq!(vibe_bucket(1), VibeBucket::Negative);
        assert_eq!(vibe_bucket(10), VibeBucket::Positive);
    }

    #[test]
    fn histogram_zero_fills_missing_scores() {
        let buckets = zero_filled_histogram(&[(2, 4), (7, 1), (10, 3)]);
        assert_eq!(buckets.len(), 10);
        assert_eq!(buckets[0].responses, 0);
        assert_eq!(buckets[1].responses, 4);
        assert_eq!(buckets[6].responses, 1);
        assert_eq!(buckets[9].responses, 3);
        let total: i64 = buckets.iter().map(|b| b.responses).sum();
        assert_eq!(total, 8);
    }

    #[test]
    fn histogram_from_no_data_is_all_zero() {
        let buckets = zero_filled_histogram(&[]);
        assert_eq!(buckets.len(), 10);
        assert!(buckets.iter().all(|b| b.responses == 0));
        assert_eq!(buckets.first().map(|b| b.score), Some(1));
        assert_eq!(buckets.last().map(|b| b.score), Some(10));
    }
}
