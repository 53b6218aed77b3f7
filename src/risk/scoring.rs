//! Mechanical risk scoring over ingested workforce signals.
//!
//! The score is an additive accumulation of weighted penalties clamped to
//! the 0..=10 scale. A missing signal contributes nothing, so an employee
//! with sparse data drifts toward zero instead of erroring.

use crate::config::RiskConfig;
use crate::db;
use anyhow::Result;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    fn for_score(cfg: &RiskConfig, score: f64) -> RiskLevel {
        if score >= cfg.escalation_threshold {
            RiskLevel::High
        } else if score >= cfg.medium_floor {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Signals for one employee. `None` means the relevant dataset has no rows
/// for them yet.
#[derive(Debug, Clone, Default)]
pub struct RiskSignals {
    pub vibe: Option<db::LatestVibe>,
    pub avg_work_hours: Option<f64>,
    pub avg_meetings: Option<f64>,
    pub leave_days_taken: Option<i64>,
    pub latest_rating: Option<i16>,
    pub reward_points: Option<i64>,
    /// 1-5 urgency rating from the conversation model, when a chat is in
    /// progress.
    pub conversation_urgency: Option<i16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    pub factors: Vec<String>,
    pub escalate: bool,
}

pub fn assess(cfg: &RiskConfig, signals: &RiskSignals) -> RiskAssessment {
    let mut score = 0.0;
    let mut factors = Vec::new();

    if let Some(vibe) = &signals.vibe {
        if vibe.vibe_score <= cfg.vibe_critical {
            score += cfg.penalty_vibe_critical;
            factors.push(format!("critically low vibe score ({})", vibe.vibe_score));
        } else if vibe.vibe_score <= cfg.vibe_concerning {
            score += cfg.penalty_vibe_concerning;
            factors.push(format!("low vibe score ({})", vibe.vibe_score));
        }
        if cfg.negative_zones.contains(&vibe.emotion_zone) {
            score += cfg.penalty_negative_zone;
            factors.push(format!(
                "recent emotion zone: {}",
                vibe.emotion_zone.as_str()
            ));
        }
    }

    if let Some(hours) = signals.avg_work_hours {
        if hours > cfg.hours_critical {
            score += cfg.penalty_hours_critical;
            factors.push(format!("sustained overwork ({hours:.1}h daily average)"));
        } else if hours > cfg.hours_concerning {
            score += cfg.penalty_hours_concerning;
            factors.push(format!("elevated working hours ({hours:.1}h daily average)"));
        }
    }

    if let Some(meetings) = signals.avg_meetings {
        if meetings > cfg.meetings_threshold {
            score += cfg.penalty_meetings;
            factors.push(format!("heavy meeting load ({meetings:.1} per day)"));
        }
    }

    if let Some(days) = signals.leave_days_taken {
        if days < cfg.leave_insufficient {
            score += cfg.penalty_leave;
            factors.push(format!("little leave taken this year ({days} days)"));
        }
    }

    if let Some(rating) = signals.latest_rating {
        if rating <= cfg.rating_concerning {
            score += cfg.penalty_rating;
            factors.push(format!("low performance rating ({rating})"));
        }
    }

    if let Some(points) = signals.reward_points {
        if points < cfg.rewards_insufficient {
            score += cfg.penalty_rewards;
            factors.push("little recognition this year".to_string());
        }
    }

    if let Some(urgency) = signals.conversation_urgency {
        let adjustment = sentiment_adjustment(cfg, urgency);
        if adjustment > 0.0 {
            score += adjustment;
            factors.push(format!("elevated urgency in conversation (level {urgency})"));
        }
    }

    let score = score.clamp(0.0, 10.0);
    RiskAssessment {
        score,
        level: RiskLevel::for_score(cfg, score),
        factors,
        escalate: score >= cfg.escalation_threshold,
    }
}

/// Maps the model's 1-5 urgency rating onto a bounded score adjustment.
pub fn sentiment_adjustment(cfg: &RiskConfig, urgency: i16) -> f64 {
    let adjustment: f64 = match urgency {
        i16::MIN..=2 => 0.0,
        3 => 1.0,
        4 => 2.0,
        _ => 3.0,
    };
    adjustment.min(cfg.sentiment_max)
}

pub async fn gather_signals(
    pool: &PgPool,
    employee_id: Uuid,
    cfg: &RiskConfig,
) -> Result<RiskSignals> {
    let activity = db::activity_averages(pool, employee_id, cfg.activity_window).await?;
    Ok(RiskSignals {
        vibe: db::latest_vibe(pool, employee_id).await?,
        avg_work_hours: activity.map(|(hours, _)| hours),
        avg_meetings: activity.map(|(_, meetings)| meetings),
        leave_days_taken: db::leave_days_taken_this_year(pool, employee_id).await?,
        latest_rating: db::latest_performance_rating(pool, employee_id).await?,
        reward_points: db::reward_points_this_year(pool, employee_id).await?,
        conversation_urgency: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::LatestVibe;
    use crate::domain::models::EmotionZone;
    use chrono::NaiveDate;

    fn vibe(score: i16, zone: EmotionZone) -> Option<LatestVibe> {
        Some(LatestVibe {
            vibe_score: score,
            emotion_zone: zone,
            response_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        })
    }

    #[test]
    fn critical_profile_hits_the_cap_and_escalates() {
        let cfg = RiskConfig::default();
        let signals = RiskSignals {
            vibe: vibe(1, EmotionZone::Okay),
            avg_work_hours: Some(9.5),
            leave_days_taken: Some(3),
            latest_rating: Some(1),
            ..Default::default()
        };
        let assessment = assess(&cfg, &signals);
        assert_eq!(assessment.score, 10.0);
        assert_eq!(assessment.level, RiskLevel::High);
        assert!(assessment.escalate);
        assert_eq!(assessment.factors.len(), 4);
    }

    #[test]
    fn healthy_profile_scores_zero() {
        let cfg = RiskConfig::default();
        let signals = RiskSignals {
            vibe: vibe(4, EmotionZone::Happy),
            avg_work_hours: Some(7.0),
            avg_meetings: Some(3.0),
            leave_days_taken: Some(12),
            latest_rating: Some(4),
            reward_points: Some(400),
            ..Default::default()
        };
        let assessment = assess(&cfg, &signals);
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(!assessment.escalate);
        assert!(assessment.factors.is_empty());
    }

    #[test]
    fn score_never_exceeds_the_cap() {
        let cfg = RiskConfig::default();
        let signals = RiskSignals {
            vibe: vibe(1, EmotionZone::Frustrated),
            avg_work_hours: Some(12.0),
            avg_meetings: Some(9.0),
            leave_days_taken: Some(0),
            latest_rating: Some(1),
            reward_points: Some(0),
            conversation_urgency: Some(5),
        };
        let assessment = assess(&cfg, &signals);
        assert_eq!(assessment.score, 10.0);
    }

    #[test]
    fn escalation_boundary_is_inclusive() {
        let cfg = RiskConfig::default();
        // 4.0 (critical vibe) + 2.0 (leave) + 1.0 (rewards) lands exactly on
        // the threshold.
        let signals = RiskSignals {
            vibe: vibe(1, EmotionZone::Okay),
            leave_days_taken: Some(2),
            reward_points: Some(50),
            ..Default::default()
        };
        let assessment = assess(&cfg, &signals);
        assert_eq!(assessment.score, cfg.escalation_threshold);
        assert!(assessment.escalate);
        assert_eq!(assessment.level, RiskLevel::High);
    }

    #[test]
    fn below_threshold_does_not_escalate() {
        let cfg = RiskConfig::default();
        let signals = RiskSignals {
            vibe: vibe(1, EmotionZone::Okay),
            avg_work_hours: Some(9.5),
            ..Default::default()
        };
        let assessment = assess(&cfg, &signals);
        assert_eq!(assessment.score, 6.5);
        assert!(!assessment.escalate);
        assert_eq!(assessment.level, RiskLevel::Medium);
    }

    #[test]
    fn missing_signals_are_neutral() {
        let cfg = RiskConfig::default();
        let assessment = assess(&cfg, &RiskSignals::default());
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.level, RiskLevel::Low);
        assert!(assessment.factors.is_empty());
        assert!(!assessment.escalate);
    }

    #[test]
    fn dropping_one_signal_shifts_by_at_most_its_weight() {
        let cfg = RiskConfig::default();
        let full = RiskSignals {
            avg_work_hours: Some(9.0),
            leave_days_taken: Some(3),
            latest_rating: Some(1),
            ..Default::default()
        };
        let without_leave = RiskSignals {
            leave_days_taken: None,
            ..full.clone()
        };
        let diff = assess(&cfg, &full).score - assess(&cfg, &without_leave).score;
        assert_eq!(diff, cfg.penalty_leave);
    }

    #[test]
    fn urgency_maps_onto_bounded_adjustments() {
        let cfg = RiskConfig::default();
        assert_eq!(sentiment_adjustment(&cfg, 1), 0.0);
        assert_eq!(sentiment_adjustment(&cfg, 2), 0.0);
        assert_eq!(sentiment_adjustment(&cfg, 3), 1.0);
        assert_eq!(sentiment_adjustment(&cfg, 4), 2.0);
        assert_eq!(sentiment_adjustment(&cfg, 5), 3.0);
        assert_eq!(sentiment_adjustment(&cfg, 9), cfg.sentiment_max);
    }

    #[test]
    fn level_boundaries() {
        let cfg = RiskConfig::default();
        assert_eq!(RiskLevel::for_score(&cfg, 0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::for_score(&cfg, 3.9), RiskLevel::Low);
        assert_eq!(RiskLevel::for_score(&cfg, 4.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::for_score(&cfg, 6.9), RiskLevel::Medium);
        assert_eq!(RiskLevel::for_score(&cfg, 7.0), RiskLevel::High);
        assert_eq!(RiskLevel::for_score(&cfg, 10.0), RiskLevel::High);
    }
}
