use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ServiceError;
use crate::config::GmailConfig;

/// Outbound mail. Failures are reported, never retried here.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, html_body: &str, subject: &str) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &GmailConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.user.clone(), config.app_password.clone());

        let mailer = SmtpTransport::starttls_relay("smtp.gmail.com")
            .map_err(|e| ServiceError::Delivery(e.to_string()))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!("Email service initialized with Gmail SMTP");

        Ok(Self {
            mailer,
            from_email: config.user.clone(),
        })
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send(&self, to: &str, html_body: &str, subject: &str) -> Result<(), ServiceError> {
        let from = self
            .from_email
            .parse()
            .map_err(|e: lettre::address::AddressError| ServiceError::Delivery(e.to_string()))?;
        let recipient = to
            .parse()
            .map_err(|e: lettre::address::AddressError| ServiceError::Delivery(e.to_string()))?;

        let email = Message::builder()
            .from(from)
            .to(recipient)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(strip_tags(html_body)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| ServiceError::Delivery(e.to_string()))?;

        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to, "Failed to send email");
                Err(ServiceError::Delivery(e.to_string()))
            }
        }
    }
}

/// Mail captured by [`MockNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

/// Records outgoing mail instead of delivering it.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<SentMail>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `send` fail with a delivery error.
    pub fn fail_deliveries(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last_to(&self, to: &str) -> Option<SentMail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, to: &str, html_body: &str, subject: &str) -> Result<(), ServiceError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(ServiceError::Delivery("mock delivery failure".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });
        }
        Ok(())
    }
}

pub mod templates {
    pub const WELCOME_SUBJECT: &str = "Welcome to Janatar Obhijog";
    pub const RESET_SUBJECT: &str = "Reset Password Link";
    pub const RESOLVED_SUBJECT: &str = "Your complaint has been resolved";

    pub fn welcome(name: &str) -> String {
        format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Welcome, {}!</h2>
        <p>Your account has been created. You can now submit and track complaints.</p>
    </body>
</html>"#,
            escape_html(name)
        )
    }

    pub fn reset_link(link: &str) -> String {
        format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Password Reset Request</h2>
        <p>Click the link below to set a new password:</p>
        <p>
            <a href="{0}" style="background-color: #2196F3; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                Reset Password
            </a>
        </p>
        <p>Or open this address in your browser: {0}</p>
        <p style="color: #666; font-size: 12px;">
            This link expires in 10 minutes. If you didn't request this, please ignore this email.
        </p>
    </body>
</html>"#,
            escape_html(link)
        )
    }

    pub fn complaint_resolved(name: &str, title: &str) -> String {
        format!(
            r#"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Hello {},</h2>
        <p>Your complaint "<strong>{}</strong>" has been marked as resolved.</p>
        <p>Thank you for helping improve your community.</p>
    </body>
</html>"#,
            escape_html(name),
            escape_html(title)
        )
    }

    pub fn escape_html(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(c),
            }
        }
        out
    }
}

/// Plain-text alternative for the multipart body.
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
