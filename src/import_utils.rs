//! CSV parsing for workforce dataset uploads.
//!
//! Each dataset type has a fixed header contract. A file is parsed in full
//! before anything touches the database, so one bad row rejects the whole
//! file and the error names the offending line.

use crate::domain::models::EmotionZone;
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("line {line}: {reason}")]
    Row { line: u64, reason: String },
    #[error("unreadable CSV: {0}")]
    Malformed(String),
}

impl ImportError {
    fn row(line: u64, reason: impl Into<String>) -> Self {
        Self::Row {
            line,
            reason: reason.into(),
        }
    }
}

fn csv_error(err: csv::Error) -> ImportError {
    match err.kind() {
        csv::ErrorKind::Deserialize { pos, err } => {
            let line = pos.as_ref().map(|p| p.line()).unwrap_or(0);
            ImportError::row(line, err.to_string())
        }
        _ => ImportError::Malformed(err.to_string()),
    }
}

fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data)
}

/// Upstream exports are inconsistent about employee ids: some files carry
/// `EMP0042`, others a bare `42`. Bare numerics are widened to the code form.
pub fn normalize_employee_code(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("EMP{trimmed:0>4}")
    } else {
        trimmed.to_uppercase()
    }
}

fn parse_date(raw: &str, field: &str, line: u64) -> Result<NaiveDate, ImportError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ImportError::row(line, format!("{field} is not an ISO date: {raw:?}")))
}

fn parse_flag(raw: &str, field: &str, line: u64) -> Result<bool, ImportError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" | "" => Ok(false),
        _ => Err(ImportError::row(
            line,
            format!("{field} is not a boolean: {raw:?}"),
        )),
    }
}

// ---------- Leave ----------

#[derive(Debug, Deserialize)]
struct RawLeaveRow {
    #[serde(rename = "Employee_ID")]
    employee_id: String,
    #[serde(rename = "Leave_Type")]
    leave_type: String,
    #[serde(rename = "Leave_Start_Date")]
    start_date: String,
    #[serde(rename = "Leave_End_Date")]
    end_date: String,
    #[serde(rename = "Leave_Days")]
    days: i16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaveCsvRow {
    pub employee_code: String,
    pub leave_type: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i16,
}

pub fn parse_leave(data: &[u8]) -> Result<Vec<LeaveCsvRow>, ImportError> {
    let mut rows = Vec::new();
    for (idx, record) in reader(data).deserialize::<RawLeaveRow>().enumerate() {
        let line = idx as u64 + 2;
        let raw = record.map_err(csv_error)?;
        if raw.days < 0 {
            return Err(ImportError::row(line, "Leave_Days must not be negative"));
        }
        let start_date = parse_date(&raw.start_date, "Leave_Start_Date", line)?;
        let end_date = parse_date(&raw.end_date, "Leave_End_Date", line)?;
        if end_date < start_date {
            return Err(ImportError::row(
                line,
                "Leave_End_Date precedes Leave_Start_Date",
            ));
        }
        rows.push(LeaveCsvRow {
            employee_code: normalize_employee_code(&raw.employee_id),
            leave_type: raw.leave_type,
            start_date,
            end_date,
            days: raw.days,
        });
    }
    Ok(rows)
}

// ---------- Activity ----------

#[derive(Debug, Deserialize)]
struct RawActivityRow {
    #[serde(rename = "Employee_ID")]
    employee_id: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Work_Hours")]
    work_hours: f64,
    #[serde(rename = "Meetings_Attended")]
    meetings_attended: i32,
    #[serde(rename = "Emails_Sent")]
    emails_sent: i32,
    #[serde(rename = "Teams_Messages_Sent")]
    teams_messages_sent: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityCsvRow {
    pub employee_code: String,
    pub date: NaiveDate,
    pub work_hours: f64,
    pub meetings_attended: i32,
    pub emails_sent: i32,
    pub teams_messages_sent: i32,
}

pub fn parse_activity(data: &[u8]) -> Result<Vec<ActivityCsvRow>, ImportError> {
    let mut rows = Vec::new();
    for (idx, record) in reader(data).deserialize::<RawActivityRow>().enumerate() {
        let line = idx as u64 + 2;
        let raw = record.map_err(csv_error)?;
        if !(0.0..=24.0).contains(&raw.work_hours) {
            return Err(ImportError::row(
                line,
                format!("Work_Hours out of range: {}", raw.work_hours),
            ));
        }
        if raw.meetings_attended < 0 || raw.emails_sent < 0 || raw.teams_messages_sent < 0 {
            return Err(ImportError::row(line, "activity counts must not be negative"));
        }
        rows.push(ActivityCsvRow {
            employee_code: normalize_employee_code(&raw.employee_id),
            date: parse_date(&raw.date, "Date", line)?,
            work_hours: raw.work_hours,
            meetings_attended: raw.meetings_attended,
            emails_sent: raw.emails_sent,
            teams_messages_sent: raw.teams_messages_sent,
        });
    }
    Ok(rows)
}

// ---------- Rewards ----------

#[derive(Debug, Deserialize)]
struct RawRewardsRow {
    #[serde(rename = "Employee_ID")]
    employee_id: String,
    #[serde(rename = "Award_Type")]
    award_type: String,
    #[serde(rename = "Award_Date")]
    award_date: String,
    #[serde(rename = "Reward_Points")]
    reward_points: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewardsCsvRow {
    pub employee_code: String,
    pub award_type: String,
    pub award_date: NaiveDate,
    pub reward_points: i32,
}

pub fn parse_rewards(data: &[u8]) -> Result<Vec<RewardsCsvRow>, ImportError> {
    let mut rows = Vec::new();
    for (idx, record) in reader(data).deserialize::<RawRewardsRow>().enumerate() {
        let line = idx as u64 + 2;
        let raw = record.map_err(csv_error)?;
        if raw.reward_points < 0 {
            return Err(ImportError::row(line, "Reward_Points must not be negative"));
        }
        rows.push(RewardsCsvRow {
            employee_code: normalize_employee_code(&raw.employee_id),
            award_type: raw.award_type,
            award_date: parse_date(&raw.award_date, "Award_Date", line)?,
            reward_points: raw.reward_points,
        });
    }
    Ok(rows)
}

// ---------- Performance ----------

#[derive(Debug, Deserialize)]
struct RawPerformanceRow {
    #[serde(rename = "Employee_ID")]
    employee_id: String,
    #[serde(rename = "Review_Period")]
    review_period: String,
    #[serde(rename = "Performance_Rating")]
    performance_rating: i16,
    #[serde(rename = "Manager_Feedback")]
    manager_feedback: Option<String>,
    #[serde(rename = "Promotion_Consideration")]
    promotion_consideration: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceCsvRow {
    pub employee_code: String,
    pub review_period: String,
    pub performance_rating: i16,
    pub manager_feedback: Option<String>,
    pub promotion_consideration: bool,
}

pub fn parse_performance(data: &[u8]) -> Result<Vec<PerformanceCsvRow>, ImportError> {
    let mut rows = Vec::new();
    for (idx, record) in reader(data).deserialize::<RawPerformanceRow>().enumerate() {
        let line = idx as u64 + 2;
        let raw = record.map_err(csv_error)?;
        if !(1..=5).contains(&raw.performance_rating) {
            return Err(ImportError::row(
                line,
                format!(
                    "Performance_Rating must be between 1 and 5, got {}",
                    raw.performance_rating
                ),
            ));
        }
        rows.push(PerformanceCsvRow {
            employee_code: normalize_employee_code(&raw.employee_id),
            review_period: raw.review_period,
            performance_rating: raw.performance_rating,
            manager_feedback: raw.manager_feedback.filter(|f| !f.is_empty()),
            promotion_consideration: parse_flag(
                &raw.promotion_consideration,
                "Promotion_Consideration",
                line,
            )?,
        });
    }
    Ok(rows)
}

// ---------- Vibemeter ----------

#[derive(Debug, Deserialize)]
struct RawVibemeterRow {
    #[serde(rename = "Employee_ID")]
    employee_id: String,
    #[serde(rename = "Response_Date")]
    response_date: String,
    #[serde(rename = "Vibe_Score")]
    vibe_score: i16,
    #[serde(rename = "Emotion_Zone")]
    emotion_zone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VibemeterCsvRow {
    pub employee_code: String,
    pub response_date: NaiveDate,
    pub vibe_score: i16,
    pub emotion_zone: EmotionZone,
}

pub fn parse_vibemeter(data: &[u8]) -> Result<Vec<VibemeterCsvRow>, ImportError> {
    let mut rows = Vec::new();
    for (idx, record) in reader(data).deserialize::<RawVibemeterRow>().enumerate() {
        let line = idx as u64 + 2;
        let raw = record.map_err(csv_error)?;
        if !(1..=10).contains(&raw.vibe_score) {
            return Err(ImportError::row(
                line,
                format!("Vibe_Score must be between 1 and 10, got {}", raw.vibe_score),
            ));
        }
        let emotion_zone = EmotionZone::parse_label(&raw.emotion_zone).ok_or_else(|| {
            ImportError::row(line, format!("unknown Emotion_Zone: {:?}", raw.emotion_zone))
        })?;
        rows.push(VibemeterCsvRow {
            employee_code: normalize_employee_code(&raw.employee_id),
            response_date: parse_date(&raw.response_date, "Response_Date", line)?,
            vibe_score: raw.vibe_score,
            emotion_zone,
        });
    }
    Ok(rows)
}

// ---------- Onboarding ----------

#[derive(Debug, Deserialize)]
struct RawOnboardingRow {
    #[serde(rename = "Employee_ID")]
    employee_id: String,
    #[serde(rename = "Onboarding_Feedback")]
    feedback: Option<String>,
    #[serde(rename = "Joining_Date")]
    joining_date: String,
    #[serde(rename = "Mentor_Assigned")]
    mentor_assigned: String,
    #[serde(rename = "Training_Completed")]
    training_completed: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnboardingCsvRow {
    pub employee_code: String,
    pub feedback: Option<String>,
    pub joining_date: NaiveDate,
    pub mentor_assigned: bool,
    pub training_completed: bool,
}

pub fn parse_onboarding(data: &[u8]) -> Result<Vec<OnboardingCsvRow>, ImportError> {
    let mut rows = Vec::new();
    for (idx, record) in reader(data).deserialize::<RawOnboardingRow>().enumerate() {
        let line = idx as u64 + 2;
        let raw = record.map_err(csv_error)?;
        rows.push(OnboardingCsvRow {
            employee_code: normalize_employee_code(&raw.employee_id),
            feedback: raw.feedback.filter(|f| !f.is_empty()),
            joining_date: parse_date(&raw.joining_date, "Joining_Date", line)?,
            mentor_assigned: parse_flag(&raw.mentor_assigned, "Mentor_Assigned", line)?,
            training_completed: parse_flag(&raw.training_completed, "Training_Completed", line)?,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leave_file_and_normalizes_codes() {
        let data = b"Employee_ID,Leave_Type,Leave_Start_Date,Leave_End_Date,Leave_Days\n\
            EMP0001,Sick Leave,2024-03-04,2024-03-06,3\n\
            7,Casual Leave,2024-04-01,2024-04-01,1\n";
        let rows = parse_leave(data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].employee_code, "EMP0001");
        assert_eq!(rows[0].days, 3);
        assert_eq!(rows[1].employee_code, "EMP0007");
        assert_eq!(rows[1].start_date, rows[1].end_date);
    }

    #[test]
    fn bad_date_error_names_the_line() {
        let data = b"Employee_ID,Leave_Type,Leave_Start_Date,Leave_End_Date,Leave_Days\n\
            EMP0001,Annual Leave,2024-01-05,2024-01-07,2\n\
            EMP0002,Annual Leave,2024-13-01,2024-13-02,1\n";
        let err = parse_leave(data).unwrap_err();
        match err {
            ImportError::Row { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("Leave_Start_Date"));
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }

    #[test]
    fn reversed_leave_range_is_rejected() {
        let data = b"Employee_ID,Leave_Type,Leave_Start_Date,Leave_End_Date,Leave_Days\n\
            EMP0001,Annual Leave,2024-05-10,2024-05-01,2\n";
        let err = parse_leave(data).unwrap_err();
        assert!(matches!(err, ImportError::Row { line: 2, .. }));
    }

    #[test]
    fn vibe_score_out_of_range_is_rejected() {
        let data = b"Employee_ID,Response_Date,Vibe_Score,Emotion_Zone\n\
            EMP0001,2024-06-01,4,Happy Zone\n\
            EMP0002,2024-06-01,11,Happy Zone\n";
        let err = parse_vibemeter(data).unwrap_err();
        match err {
            ImportError::Row { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("Vibe_Score"));
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }

    #[test]
    fn missing_header_is_an_error() {
        let data = b"Employee_ID,Response_Date,Vibe_Score\n\
            EMP0001,2024-06-01,4\n";
        assert!(parse_vibemeter(data).is_err());
    }

    #[test]
    fn emotion_zone_labels_are_parsed() {
        let data = b"Employee_ID,Response_Date,Vibe_Score,Emotion_Zone\n\
            EMP0001,2024-06-01,2,Leaning to Sad Zone\n\
            EMP0002,2024-06-02,9,Excited\n";
        let rows = parse_vibemeter(data).unwrap();
        assert_eq!(rows[0].emotion_zone, EmotionZone::Sad);
        assert_eq!(rows[1].emotion_zone, EmotionZone::Excited);
    }

    #[test]
    fn unknown_emotion_zone_is_rejected() {
        let data = b"Employee_ID,Response_Date,Vibe_Score,Emotion_Zone\n\
            EMP0001,2024-06-01,5,Mysterious Zone\n";
        assert!(matches!(
            parse_vibemeter(data),
            Err(ImportError::Row { line: 2, .. })
        ));
    }

    #[test]
    fn promotion_flag_accepts_python_style_booleans() {
        let data = b"Employee_ID,Review_Period,Performance_Rating,Manager_Feedback,Promotion_Consideration\n\
            EMP0001,H1 2024,4,Strong quarter,True\n\
            EMP0002,H1 2024,2,,False\n";
        let rows = parse_performance(data).unwrap();
        assert!(rows[0].promotion_consideration);
        assert!(!rows[1].promotion_consideration);
        assert_eq!(rows[1].manager_feedback, None);
    }

    #[test]
    fn performance_rating_bounds_are_checked() {
        let data = b"Employee_ID,Review_Period,Performance_Rating,Manager_Feedback,Promotion_Consideration\n\
            EMP0001,H1 2024,6,,False\n";
        assert!(matches!(
            parse_performance(data),
            Err(ImportError::Row { line: 2, .. })
        ));
    }

    #[test]
    fn activity_hours_are_bounds_checked() {
        let data = b"Employee_ID,Date,Work_Hours,Meetings_Attended,Emails_Sent,Teams_Messages_Sent\n\
            EMP0001,2024-06-01,25.5,2,10,40\n";
        assert!(matches!(
            parse_activity(data),
            Err(ImportError::Row { line: 2, .. })
        ));
    }

    #[test]
    fn onboarding_flags_are_parsed() {
        let data = b"Employee_ID,Onboarding_Feedback,Joining_Date,Mentor_Assigned,Training_Completed\n\
            EMP0001,Great first week,2024-02-12,yes,no\n";
        let rows = parse_onboarding(data).unwrap();
        assert!(rows[0].mentor_assigned);
        assert!(!rows[0].training_completed);
        assert_eq!(rows[0].feedback.as_deref(), Some("Great first week"));
    }

    #[test]
    fn parsing_is_deterministic() {
        let data = b"Employee_ID,Award_Type,Award_Date,Reward_Points\n\
            EMP0001,Innovation Award,2024-03-15,250\n\
            EMP0002,Team Player,2024-03-20,100\n";
        let first = parse_rewards(data).unwrap();
        let second = parse_rewards(data).unwrap();
        assert_eq!(first, second);
    }
}
