use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("failed to request to the mail relay")]
    RequestError(#[from] reqwest::Error),
    #[error("mail relay rejected the message with status {0}")]
    Rejected(u16),
}

/// An inactivity reminder addressed to one student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub student_id: i64,
    pub to: String,
    pub name: String,
    /// Ordinal of this reminder, counting the current one.
    pub reminder_count: i32,
    pub window_days: i64,
}

impl Reminder {
    pub fn subject(&self) -> String {
        format!(
            "[Student Progress System] Time to get back to problem solving, {}!",
            self.name
        )
    }

    pub fn html(&self) -> String {
        format!(
            r#"<div style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <h2>Hello {name},</h2>
  <p>It looks like you haven't made any Codeforces submissions in the last {days} days.</p>
  <p>Consistency is key to improving your problem-solving skills!</p>
  <p>We encourage you to get back to coding and practice regularly.</p>
  <p>This is your <strong>{ordinal}</strong> reminder.</p>
  <p>Best regards,<br>Your Student Progress Management Team</p>
  <hr style="border: 0; border-top: 1px solid #eee; margin: 20px 0;">
  <p style="font-size: 0.8em; color: #666;">This is an automated email. Please do not reply.</p>
</div>"#,
            name = html_escape(&self.name),
            days = self.window_days,
            ordinal = ordinal(self.reminder_count)
        )
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// `1` -> `1st`, `12` -> `12th`, `22` -> `22nd`.
pub fn ordinal(n: i32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_reminder(&self, reminder: &Reminder) -> Result<(), NotificationError>;
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: Option<&'a str>,
    to: &'a str,
    subject: String,
    html: String,
}

/// Hands reminders to an HTTP mail relay as JSON.
pub struct WebhookNotifier {
    url: Url,
    from: Option<String>,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: Url, from: Option<String>) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { url, from, client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_reminder(&self, reminder: &Reminder) -> Result<(), NotificationError> {
        let message = RelayMessage {
            from: self.from.as_deref(),
            to: &reminder.to,
            subject: reminder.subject(),
            html: reminder.html(),
        };
        let res = self
            .client
            .post(self.url.clone())
            .json(&message)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(NotificationError::Rejected(res.status().as_u16()));
        }

        tracing::info!("Inactivity reminder sent to {}", reminder.to);
        Ok(())
    }
}

/// Used when no relay is configured, reminders only show up in the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_reminder(&self, reminder: &Reminder) -> Result<(), NotificationError> {
        tracing::info!(
            "Inactivity reminder for {} <{}>: {}",
            reminder.name,
            reminder.to,
            reminder.subject()
        );
        Ok(())
    }
}
