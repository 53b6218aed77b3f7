use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "staff_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum StaffRole {
    Admin,
    Hr,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "wellness_check_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WellnessCheckStatus {
    NotReceived,
    NotStarted,
    Completed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "message_sender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    Employee,
    Bot,
}

/// Self-reported mood label attached to every vibemeter response.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "emotion_zone")]
pub enum EmotionZone {
    Frustrated,
    Sad,
    Okay,
    Happy,
    Excited,
}

impl EmotionZone {
    pub const ALL: [EmotionZone; 5] = [
        EmotionZone::Frustrated,
        EmotionZone::Sad,
        EmotionZone::Okay,
        EmotionZone::Happy,
        EmotionZone::Excited,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionZone::Frustrated => "Frustrated",
            EmotionZone::Sad => "Sad",
            EmotionZone::Okay => "Okay",
            EmotionZone::Happy => "Happy",
            EmotionZone::Excited => "Excited",
        }
    }

    /// Accepts the label variants seen in exported vibemeter files:
    /// "Sad", "Sad Zone", "Leaning to Sad Zone" all map to Sad.
    pub fn parse_label(raw: &str) -> Option<EmotionZone> {
        let mut label = raw.trim().to_lowercase();
        if let Some(stripped) = label.strip_suffix(" zone") {
            label = stripped.to_string();
        }
        if let Some(stripped) = label.strip_prefix("leaning to ") {
            label = stripped.to_string();
        }
        match label.as_str() {
            "frustrated" => Some(EmotionZone::Frustrated),
            "sad" => Some(EmotionZone::Sad),
            "okay" | "ok" | "neutral" => Some(EmotionZone::Okay),
            "happy" => Some(EmotionZone::Happy),
            "excited" => Some(EmotionZone::Excited),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "leave_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Personal,
    Maternity,
    Paternity,
    Other,
}

impl LeaveType {
    /// Accepts "Sick", "Sick Leave", "sick" and falls back to Other for
    /// labels outside the canonical set.
    pub fn parse_label(raw: &str) -> LeaveType {
        let mut label = raw.trim().to_lowercase();
        if let Some(stripped) = label.strip_suffix(" leave") {
            label = stripped.to_string();
        }
        match label.as_str() {
            "annual" => LeaveType::Annual,
            "sick" => LeaveType::Sick,
            "personal" | "casual" => LeaveType::Personal,
            "maternity" => LeaveType::Maternity,
            "paternity" => LeaveType::Paternity,
            _ => LeaveType::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    Leave,
    Activity,
    Rewards,
    Performance,
    Vibemeter,
    Onboarding,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Leave => "leave",
            DatasetType::Activity => "activity",
            DatasetType::Rewards => "rewards",
            DatasetType::Performance => "performance",
            DatasetType::Vibemeter => "vibemeter",
            DatasetType::Onboarding => "onboarding",
        }
    }
}

impl TryFrom<&str> for DatasetType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "leave" => Ok(DatasetType::Leave),
            "activity" => Ok(DatasetType::Activity),
            "rewards" => Ok(DatasetType::Rewards),
            "performance" => Ok(DatasetType::Performance),
            "vibemeter" => Ok(DatasetType::Vibemeter),
            "onboarding" => Ok(DatasetType::Onboarding),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emotion_zone_label_variants() {
        assert_eq!(EmotionZone::parse_label("Sad"), Some(EmotionZone::Sad));
        assert_eq!(EmotionZone::parse_label("Sad Zone"), Some(EmotionZone::Sad));
        assert_eq!(
            EmotionZone::parse_label("Leaning to Sad Zone"),
            Some(EmotionZone::Sad)
        );
        assert_eq!(
            EmotionZone::parse_label("  frustrated zone "),
            Some(EmotionZone::Frustrated)
        );
        assert_eq!(EmotionZone::parse_label("Ecstatic"), None);
    }

    #[test]
    fn leave_type_label_variants() {
        assert_eq!(LeaveType::parse_label("Sick Leave"), LeaveType::Sick);
        assert_eq!(LeaveType::parse_label("annual"), LeaveType::Annual);
        assert_eq!(LeaveType::parse_label("Casual Leave"), LeaveType::Personal);
        assert_eq!(LeaveType::parse_label("Sabbatical"), LeaveType::Other);
    }

    #[test]
    fn dataset_type_round_trip() {
        for raw in ["leave", "activity", "rewards", "performance", "vibemeter", "onboarding"] {
            let parsed = DatasetType::try_from(raw).unwrap();
            assert_eq!(parsed.as_str(), raw);
        }
        assert!(DatasetType::try_from("payroll").is_err());
    }
}
