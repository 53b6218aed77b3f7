use crate::domain::models::EmotionZone;
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono_tz::Tz;

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Process configuration, read once in main and handed to constructors.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub openai_api_key: String,
    pub session_key: Vec<u8>,
    pub encryption_key: Vec<u8>,
    pub smtp: Option<SmtpConfig>,
    pub emails_from: String,
    pub hr_inbox: String,
    pub report_tz: Tz,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL missing")?;
        let openai_api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY missing")?;

        let session_key_b64 = std::env::var("SESSION_KEY").context("SESSION_KEY missing")?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64)
            .map_err(|_| anyhow!("SESSION_KEY must be base64"))?;

        let enc_key_b64 = std::env::var("APP_ENC_KEY").context("APP_ENC_KEY missing")?;
        let encryption_key = general_purpose::STANDARD
            .decode(enc_key_b64)
            .map_err(|_| anyhow!("APP_ENC_KEY must be base64"))?;

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => {
                let port = std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(587);
                Some(SmtpConfig {
                    host,
                    port,
                    username: std::env::var("SMTP_USERNAME").ok(),
                    password: std::env::var("SMTP_PASSWORD").ok(),
                })
            }
            Err(_) => None,
        };

        let emails_from = std::env::var("EMAILS_FROM")
            .unwrap_or_else(|_| "Vibemeter <no-reply@vibemeter.local>".to_string());
        let hr_inbox = std::env::var("HR_INBOX").unwrap_or_else(|_| emails_from.clone());

        let report_tz = std::env::var("REPORT_TZ")
            .unwrap_or_else(|_| "Europe/Kyiv".to_string())
            .parse::<Tz>()
            .map_err(|_| anyhow!("REPORT_TZ must be an IANA timezone name"))?;

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        Ok(Self {
            bind_addr,
            database_url,
            openai_api_key,
            session_key,
            encryption_key,
            smtp,
            emails_from,
            hr_inbox,
            report_tz,
        })
    }
}

/// Single source of truth for the risk heuristic. Both the mechanical
/// calculator and the chatbot prompt rubric are rendered from this struct,
/// so the two cannot drift apart.
#[derive(Clone, Debug)]
pub struct RiskConfig {
    pub vibe_critical: i16,
    pub vibe_concerning: i16,
    pub penalty_vibe_critical: f64,
    pub penalty_vibe_concerning: f64,
    pub negative_zones: Vec<EmotionZone>,
    pub penalty_negative_zone: f64,
    pub hours_critical: f64,
    pub hours_concerning: f64,
    pub penalty_hours_critical: f64,
    pub penalty_hours_concerning: f64,
    pub meetings_threshold: f64,
    pub penalty_meetings: f64,
    pub leave_insufficient: i64,
    pub penalty_leave: f64,
    pub rating_concerning: i16,
    pub penalty_rating: f64,
    pub rewards_insufficient: i64,
    pub penalty_rewards: f64,
    pub sentiment_max: f64,
    pub medium_floor: f64,
    pub escalation_threshold: f64,
    pub activity_window: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            vibe_critical: 1,
            vibe_concerning: 2,
            penalty_vibe_critical: 4.0,
            penalty_vibe_concerning: 2.0,
            negative_zones: vec![EmotionZone::Frustrated, EmotionZone::Sad],
            penalty_negative_zone: 1.0,
            hours_critical: 9.3,
            hours_concerning: 8.6,
            penalty_hours_critical: 2.5,
            penalty_hours_concerning: 1.5,
            meetings_threshold: 7.0,
            penalty_meetings: 1.5,
            leave_insufficient: 6,
            penalty_leave: 2.0,
            rating_concerning: 1,
            penalty_rating: 1.5,
            rewards_insufficient: 183,
            penalty_rewards: 1.0,
            sentiment_max: 3.0,
            medium_floor: 4.0,
            escalation_threshold: 7.0,
            activity_window: 30,
        }
    }
}

impl RiskConfig {
    /// Defaults with the escalation threshold optionally overridden from the
    /// environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(threshold) = std::env::var("RISK_ESCALATION_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
        {
            cfg.escalation_threshold = threshold.clamp(0.0, 10.0);
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds_match_documented_values() {
        let cfg = RiskConfig::default();
        assert_eq!(cfg.vibe_critical, 1);
        assert_eq!(cfg.vibe_concerning, 2);
        assert_eq!(cfg.escalation_threshold, 7.0);
        assert_eq!(cfg.leave_insufficient, 6);
        assert_eq!(cfg.rewards_insufficient, 183);
        assert!(cfg.negative_zones.contains(&EmotionZone::Frustrated));
        assert!(cfg.negative_zones.contains(&EmotionZone::Sad));
    }

    #[test]
    fn maximum_possible_raw_score_exceeds_cap() {
        let cfg = RiskConfig::default();
        let total = cfg.penalty_vibe_critical
            + cfg.penalty_negative_zone
            + cfg.penalty_hours_critical
            + cfg.penalty_meetings
            + cfg.penalty_leave
            + cfg.penalty_rating
            + cfg.penalty_rewards
            + cfg.sentiment_max;
        assert!(total > 10.0);
    }
}
