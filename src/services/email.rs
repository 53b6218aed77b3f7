use crate::config::SmtpConfig;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use uuid::Uuid;

/// Outbound mail. Without SMTP configuration the mailer runs in log-only
/// mode: every send is recorded in the log and reported as success.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<SmtpTransport>,
    from: Mailbox,
    hr_inbox: String,
}

impl Mailer {
    pub fn new(smtp: Option<&SmtpConfig>, from: &str, hr_inbox: &str) -> Result<Self> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| anyhow!("invalid from address {from:?}: {e}"))?;
        let transport = match smtp {
            Some(cfg) => Some(build_transport(cfg)?),
            None => None,
        };
        Ok(Self {
            transport,
            from,
            hr_inbox: hr_inbox.to_string(),
        })
    }

    pub async fn send_employee_alert(
        &self,
        to: &str,
        name: &str,
        subject: &str,
        message: &str,
    ) -> Result<()> {
        let body = format!(
            "Hello {name},\n\n{message}\n\nThis is an automated message from the Vibemeter \
             system. If you have any questions, please reply to this email or contact HR.\n\n\
             Best regards,\nPeople Experience Team"
        );
        self.deliver(to, subject.to_string(), body).await
    }

    pub async fn send_hr_escalation(
        &self,
        employee_name: &str,
        session_id: Uuid,
        reason: &str,
    ) -> Result<()> {
        let subject = format!("Chat Escalation: {employee_name}");
        let body = format!(
            "A chat session with {employee_name} has been escalated to HR.\n\n\
             Reason for Escalation: {reason}\n\n\
             Session ID: {session_id}\n\n\
             Please review this conversation as soon as possible and follow up with the \
             employee. You can access the full conversation details in the HR dashboard.\n\n\
             This is an automated message from the Vibemeter system."
        );
        let inbox = self.hr_inbox.clone();
        self.deliver(&inbox, subject, body).await
    }

    pub async fn send_report_notice(&self, report_date: NaiveDate) -> Result<()> {
        let subject = format!("Daily Vibemeter Report - {report_date}");
        let body = format!(
            "Hello HR Team,\n\nThe daily Vibemeter report for {report_date} is now available.\n\n\
             Please check the HR dashboard to view the full report with analytics on employee \
             well-being, at-risk employees, and recommended actions.\n\n\
             Best regards,\nVibemeter System"
        );
        let inbox = self.hr_inbox.clone();
        self.deliver(&inbox, subject, body).await
    }

    async fn deliver(&self, to: &str, subject: String, body: String) -> Result<()> {
        let Some(transport) = self.transport.clone() else {
            tracing::info!(to, %subject, "smtp not configured, skipping delivery");
            return Ok(());
        };
        let email = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| anyhow!("invalid recipient {to:?}: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .context("mail delivery task failed")??;
        Ok(())
    }
}

fn build_transport(cfg: &SmtpConfig) -> Result<SmtpTransport> {
    let builder = match (&cfg.username, &cfg.password) {
        (Some(user), Some(pass)) => SmtpTransport::relay(&cfg.host)
            .context("smtp relay setup failed")?
            .credentials(Credentials::new(user.clone(), pass.clone())),
        _ => SmtpTransport::builder_dangerous(&cfg.host),
    };
    Ok(builder.port(cfg.port).build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_only_mode_reports_success() {
        let mailer = Mailer::new(
            None,
            "Vibemeter <no-reply@vibemeter.local>",
            "hr@vibemeter.local",
        )
        .unwrap();
        mailer
            .send_employee_alert(
                "employee@example.com",
                "Alex",
                "Checking in",
                "We noticed you might be having a tough week.",
            )
            .await
            .unwrap();
        mailer
            .send_hr_escalation("Alex Doe", Uuid::new_v4(), "elevated distress")
            .await
            .unwrap();
    }

    #[test]
    fn invalid_from_address_is_rejected() {
        assert!(Mailer::new(None, "not an address", "hr@vibemeter.local").is_err());
    }
}
