use crate::config::RiskConfig;
use crate::crypto::TranscriptCipher;
use crate::services::ai::WellnessAi;
use crate::services::email::Mailer;
use chrono_tz::Tz;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cipher: Arc<TranscriptCipher>,
    pub ai: Arc<WellnessAi>,
    pub mailer: Arc<Mailer>,
    pub risk: RiskConfig,
    pub session_key: Vec<u8>,
    pub report_tz: Tz,
}

pub type SharedState = Arc<AppState>;
