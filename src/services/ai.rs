use crate::config::RiskConfig;
use crate::domain::models::MessageSender;
use crate::risk::RiskSignals;
use anyhow::{anyhow, Result};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequestArgs, Role,
};
use async_openai::{config::OpenAIConfig, Client};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

/// Reply sent when the model is unreachable or keeps failing.
pub const FALLBACK_REPLY: &str = "I'm sorry, I'm having trouble processing that right now. \
Could you please try again or contact HR directly if you need immediate assistance?";

pub const FALLBACK_SUGGESTED_REPLIES: [&str; 3] = [
    "Yes, I'll try again",
    "I'll contact HR directly",
    "Can you help me with something else?",
];

/// Closing message appended when an employee ends a session.
pub const FAREWELL_MESSAGE: &str =
    "Thank you for chatting with me today! I hope our conversation was helpful.";

/// Structured outcome of one conversational turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub reply: String,
    pub escalation_recommended: bool,
    pub escalation_reason: Option<String>,
    pub suggested_replies: Vec<String>,
    pub primary_emotion: Option<String>,
    pub urgency_level: Option<i16>,
}

impl ChatOutcome {
    pub fn fallback() -> Self {
        Self {
            reply: FALLBACK_REPLY.to_string(),
            escalation_recommended: false,
            escalation_reason: None,
            suggested_replies: FALLBACK_SUGGESTED_REPLIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            primary_emotion: None,
            urgency_level: None,
        }
    }
}

/// Narrative section of the daily report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportNarrative {
    #[serde(default)]
    pub report_title: String,
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub top_risk_factors: Vec<String>,
    #[serde(default)]
    pub recommended_focus_areas: Vec<String>,
}

/// Everything the conversation prompt knows about one employee.
#[derive(Debug, Clone)]
pub struct EmployeeContext {
    pub name: String,
    pub employee_code: String,
    pub department: String,
    pub position: String,
    pub signals: RiskSignals,
}

#[derive(Clone)]
pub struct WellnessAi {
    client: Client<OpenAIConfig>,
    risk: RiskConfig,
}

impl WellnessAi {
    pub fn new(api_key: &str, risk: RiskConfig) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);
        Self { client, risk }
    }

    /// One conversational turn. Retries transient API failures and degrades
    /// to the canned fallback reply instead of erroring, so a model outage
    /// never breaks an ongoing session.
    pub async fn wellness_reply(
        &self,
        context: &EmployeeContext,
        history: &[(MessageSender, String)],
        message: &str,
    ) -> ChatOutcome {
        let system_prompt = self.system_prompt(context);
        let user_prompt = render_conversation(history, message);
        let mut retries: u64 = 0;

        loop {
            let messages = vec![
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    role: Role::System,
                    content: system_prompt.clone(),
                    name: None,
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    role: Role::User,
                    content: ChatCompletionRequestUserMessageContent::Text(user_prompt.clone()),
                    name: None,
                }),
            ];

            let request = match CreateChatCompletionRequestArgs::default()
                .model("gpt-4o")
                .messages(messages)
                .build()
            {
                Ok(request) => request,
                Err(err) => {
                    tracing::error!("chat request build failed: {err}");
                    return ChatOutcome::fallback();
                }
            };

            match self.client.chat().create(request).await {
                Ok(resp) => {
                    let content = resp
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default();
                    return parse_outcome(&content);
                }
                Err(err) => {
                    retries += 1;
                    if retries > 3 {
                        tracing::error!("chat completion failed after retries: {err}");
                        return ChatOutcome::fallback();
                    }
                    sleep(Duration::from_millis(500 * retries)).await;
                }
            }
        }
    }

    /// Narrative for the daily report. Errors propagate so the caller can
    /// store the mechanical aggregates without a narrative.
    pub async fn report_narrative(
        &self,
        report_date: chrono::NaiveDate,
        aggregates: &str,
        session_table: &str,
    ) -> Result<ReportNarrative> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                role: Role::System,
                content: "You are an HR analytics writer. You receive aggregate well-being \
                          figures and a table of chat sessions for one day and produce a concise \
                          narrative for HR leadership. Respond with a single JSON object with the \
                          fields: report_title, executive_summary, key_insights (array), \
                          top_risk_factors (array), recommended_focus_areas (array). \
                          No markdown, no commentary outside the JSON."
                    .to_string(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                role: Role::User,
                content: ChatCompletionRequestUserMessageContent::Text(format!(
                    "Daily well-being report for {report_date}.\n\nAggregates:\n{aggregates}\n\nSessions:\n{session_table}"
                )),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model("gpt-4o")
            .messages(messages)
            .build()?;

        let resp = self.client.chat().create(request).await?;
        let content = resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| anyhow!("empty completion for report narrative"))?;
        let narrative = serde_json::from_str(strip_code_fence(&content))
            .map_err(|err| anyhow!("report narrative is not valid JSON: {err}"))?;
        Ok(narrative)
    }

    fn system_prompt(&self, ctx: &EmployeeContext) -> String {
        let s = &ctx.signals;
        let (vibe_score, emotion_zone, vibe_date) = match &s.vibe {
            Some(v) => (
                v.vibe_score.to_string(),
                v.emotion_zone.as_str().to_string(),
                v.response_date.to_string(),
            ),
            None => ("Unknown".into(), "Unknown".into(), "Unknown".into()),
        };
        format!(
            r#"You are an empathetic wellness assistant named "TIA" working in the People Experience team. You analyze employee data, identify potential concerns, and hold short supportive conversations to understand employee well-being.

EMPLOYEE CONTEXT for {name} ({code}), {position} in {department}:
- Latest vibe score (1-10): {vibe_score}, reported {vibe_date}
- Latest emotion zone: {emotion_zone}
- Average daily work hours (last {window} days): {hours}
- Average meetings per day (last {window} days): {meetings}
- Leave days taken this year: {leave}
- Latest performance rating (1-5): {rating}
- Reward points this year: {points}

{rubric}

YOUR TASK:
1. Identify potential areas of concern from the context above
2. Ask specific, caring questions grounded in the data patterns, one at a time
3. Listen and respond supportively
4. Recommend escalation to HR when the conversation or the data suggests serious distress

Respond with a single JSON object and nothing else:
{{
  "response_text": "your reply to the employee",
  "escalation_recommended": false,
  "escalation_reason": "why, when recommended, else empty",
  "suggested_replies": ["up to three short replies the employee could tap"],
  "sentiment_analysis": {{"primary_emotion": "one word", "urgency_level": 1}}
}}
urgency_level is an integer from 1 (calm) to 5 (acute distress)."#,
            name = ctx.name,
            code = ctx.employee_code,
            position = ctx.position,
            department = ctx.department,
            vibe_score = vibe_score,
            vibe_date = vibe_date,
            emotion_zone = emotion_zone,
            window = self.risk.activity_window,
            hours = fmt_opt(s.avg_work_hours.map(|h| format!("{h:.1}"))),
            meetings = fmt_opt(s.avg_meetings.map(|m| format!("{m:.1}"))),
            leave = fmt_opt(s.leave_days_taken),
            rating = fmt_opt(s.latest_rating),
            points = fmt_opt(s.reward_points),
            rubric = render_rubric(&self.risk),
        )
    }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Threshold reference injected into the system prompt so the model's
/// judgement lines up with the mechanical risk score.
fn render_rubric(cfg: &RiskConfig) -> String {
    let zones: Vec<&str> = cfg.negative_zones.iter().map(|z| z.as_str()).collect();
    format!(
        "REFERENCE THRESHOLDS:\n\
         - vibe score: concerning at {} or below, critical at {} or below\n\
         - negative emotion zones: {}\n\
         - daily work hours: concerning above {}, critical above {}\n\
         - meetings per day: concerning above {}\n\
         - leave days taken this year: insufficient below {}\n\
         - performance rating: concerning at {} or below\n\
         - reward points this year: insufficient below {}\n\
         - risk score scale 0-10: low below {}, medium from {}, high and escalation from {}",
        cfg.vibe_concerning,
        cfg.vibe_critical,
        zones.join(", "),
        cfg.hours_concerning,
        cfg.hours_critical,
        cfg.meetings_threshold,
        cfg.leave_insufficient,
        cfg.rating_concerning,
        cfg.rewards_insufficient,
        cfg.medium_floor,
        cfg.medium_floor,
        cfg.escalation_threshold,
    )
}

fn render_conversation(history: &[(MessageSender, String)], message: &str) -> String {
    let mut out = String::from("Conversation so far:\n");
    for (sender, text) in history {
        let who = match sender {
            MessageSender::Employee => "Employee",
            MessageSender::Bot => "TIA",
        };
        out.push_str(who);
        out.push_str(": ");
        out.push_str(text);
        out.push('\n');
    }
    out.push_str("Employee: ");
    out.push_str(message);
    out.push_str("\nReply as TIA.");
    out
}

/// Models occasionally wrap JSON in a markdown fence despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim().strip_suffix("```").unwrap_or(inner).trim()
}

/// Lenient parse of the model's reply. A completion that is not the expected
/// JSON object is treated as plain reply text rather than discarded.
fn parse_outcome(content: &str) -> ChatOutcome {
    let json: serde_json::Value = match serde_json::from_str(strip_code_fence(content)) {
        Ok(value) => value,
        Err(_) => {
            let text = content.trim();
            if text.is_empty() {
                return ChatOutcome::fallback();
            }
            return ChatOutcome {
                reply: text.to_string(),
                escalation_recommended: false,
                escalation_reason: None,
                suggested_replies: Vec::new(),
                primary_emotion: None,
                urgency_level: None,
            };
        }
    };

    let reply = json
        .get("response_text")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_REPLY.to_string());
    let sentiment = json.get("sentiment_analysis");
    ChatOutcome {
        reply,
        escalation_recommended: json
            .get("escalation_recommended")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        escalation_reason: json
            .get("escalation_reason")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
        suggested_replies: json
            .get("suggested_replies")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .take(3)
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default(),
        primary_emotion: sentiment
            .and_then(|s| s.get("primary_emotion"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        urgency_level: sentiment
            .and_then(|s| s.get("urgency_level"))
            .and_then(|v| v.as_i64())
            .map(|v| v.clamp(1, 5) as i16),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_structured_reply() {
        let content = r#"{
            "response_text": "Thanks for telling me. How long has this been going on?",
            "escalation_recommended": true,
            "escalation_reason": "Employee mentioned burnout",
            "suggested_replies": ["A few weeks", "Just today", "I'd rather not say"],
            "sentiment_analysis": {"primary_emotion": "exhausted", "urgency_level": 4}
        }"#;
        let outcome = parse_outcome(content);
        assert!(outcome.escalation_recommended);
        assert_eq!(
            outcome.escalation_reason.as_deref(),
            Some("Employee mentioned burnout")
        );
        assert_eq!(outcome.suggested_replies.len(), 3);
        assert_eq!(outcome.urgency_level, Some(4));
        assert_eq!(outcome.primary_emotion.as_deref(), Some("exhausted"));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let content = "```json\n{\"response_text\": \"Hello!\", \"escalation_recommended\": false, \"suggested_replies\": []}\n```";
        let outcome = parse_outcome(content);
        assert_eq!(outcome.reply, "Hello!");
        assert!(!outcome.escalation_recommended);
    }

    #[test]
    fn plain_text_becomes_the_reply() {
        let outcome = parse_outcome("I hear you. Want to tell me more?");
        assert_eq!(outcome.reply, "I hear you. Want to tell me more?");
        assert!(!outcome.escalation_recommended);
        assert!(outcome.suggested_replies.is_empty());
    }

    #[test]
    fn empty_completion_falls_back() {
        let outcome = parse_outcome("");
        assert_eq!(outcome.reply, FALLBACK_REPLY);
        assert_eq!(outcome.suggested_replies.len(), 3);
    }

    #[test]
    fn urgency_is_clamped_to_scale() {
        let outcome = parse_outcome(
            r#"{"response_text": "ok", "sentiment_analysis": {"urgency_level": 12}}"#,
        );
        assert_eq!(outcome.urgency_level, Some(5));
    }

    #[test]
    fn rubric_reflects_configured_thresholds() {
        let rubric = render_rubric(&RiskConfig::default());
        assert!(rubric.contains("critical at 1 or below"));
        assert!(rubric.contains("critical above 9.3"));
        assert!(rubric.contains("insufficient below 6"));
        assert!(rubric.contains("escalation from 7"));
        assert!(rubric.contains("Frustrated, Sad"));
    }

    #[test]
    fn conversation_rendering_labels_both_sides() {
        let history = vec![
            (MessageSender::Bot, "Hi! How are you feeling?".to_string()),
            (MessageSender::Employee, "Tired, honestly.".to_string()),
        ];
        let rendered = render_conversation(&history, "Work has been a lot lately.");
        assert!(rendered.contains("TIA: Hi! How are you feeling?"));
        assert!(rendered.contains("Employee: Tired, honestly."));
        assert!(rendered.ends_with("Reply as TIA."));
    }
}
