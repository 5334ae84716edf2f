use crate::config::EmailConfig;
use crate::error::ReportError;
use crate::results::RunResult;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

/// Subject line used for emailed reports
pub const EMAIL_SUBJECT: &str = "New RFPs / Calls for Proposals";

const EMPTY_REPORT: &str = "No new RFPs or calls for proposals found today.";

/// Render a run result as a plain-text report
pub fn render(result: &RunResult, now: DateTime<Local>) -> String {
    let mut lines = Vec::new();

    if result.new_items.is_empty() {
        lines.push(EMPTY_REPORT.to_string());
    } else {
        lines.push(format!(
            "RFP Monitor Report – {}",
            now.format("%Y-%m-%d %H:%M")
        ));
        lines.push("=".repeat(60));
        for (source_name, items) in result.items_by_source() {
            lines.push(format!("\n{}", source_name));
            lines.push("-".repeat(source_name.chars().count()));
            for item in items {
                lines.push(format!("- {}", item.anchor_text));
                if let Some(reason) = &item.reason {
                    lines.push(format!("  Reason: {}", reason));
                }
                lines.push(format!("  {}", item.url));
            }
        }
    }

    if !result.errors.is_empty() {
        lines.push("\nErrors".to_string());
        lines.push("-".repeat(6));
        for error in &result.errors {
            lines.push(format!("- {}: {}", error.source_name, error.message));
        }
    }

    lines.join("\n")
}

/// Delivers a rendered report somewhere outside the process
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn deliver(&self, result: &RunResult, report: &str) -> Result<(), ReportError>;
}

/// Writes the report to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn deliver(&self, _result: &RunResult, report: &str) -> Result<(), ReportError> {
        ::log::info!("\n{}", report);
        Ok(())
    }
}

/// Sends the report over SMTP with STARTTLS when there is something new
#[derive(Debug, Clone)]
pub struct EmailReporter {
    smtp_host: String,
    smtp_port: u16,
    username: String,
    password: String,
    from: String,
    to: String,
}

impl EmailReporter {
    /// Build from configuration; `Ok(None)` when email is off or has no password
    pub fn from_config(
        config: &EmailConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ReportError> {
        if !config.enabled {
            ::log::info!("Email disabled in config; skipping email send.");
            return Ok(None);
        }
        let Some(password) = config.resolved_password(&env) else {
            ::log::info!("No SMTP password provided (password_env or password); skipping email send.");
            return Ok(None);
        };
        let smtp_host = config
            .smtp_host
            .clone()
            .ok_or(ReportError::MissingSetting("smtp_host"))?;
        let username = config
            .resolved_username(&env)
            .ok_or(ReportError::MissingSetting("username"))?;
        let to = config.to.clone().ok_or(ReportError::MissingSetting("to"))?;
        let from = config.from.clone().unwrap_or_else(|| username.clone());

        Ok(Some(Self {
            smtp_host,
            smtp_port: config.smtp_port,
            username,
            password,
            from,
            to,
        }))
    }

    fn message(&self, body: &str) -> Result<Message, ReportError> {
        let from: Mailbox = self.from.parse()?;
        let to: Mailbox = self.to.parse()?;
        Ok(Message::builder()
            .from(from)
            .to(to)
            .subject(EMAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?)
    }
}

#[async_trait]
impl Reporter for EmailReporter {
    async fn deliver(&self, result: &RunResult, report: &str) -> Result<(), ReportError> {
        if result.new_items.is_empty() {
            ::log::debug!("Nothing new; not sending email");
            return Ok(());
        }

        let message = self.message(report)?;
        let mailer = SmtpTransport::starttls_relay(&self.smtp_host)?
            .port(self.smtp_port)
            .credentials(Credentials::new(
                self.username.clone(),
                self.password.clone(),
            ))
            .build();

        tokio::task::spawn_blocking(move || mailer.send(&message)).await??;
        ::log::info!("Email sent to {}.", self.to);
        Ok(())
    }
}
