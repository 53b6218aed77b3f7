pub mod at_risk;
pub mod scoring;

pub use scoring::{assess, gather_signals, RiskAssessment, RiskLevel, RiskSignals};
