//! Email service.
//!
//! Every outbound message is described by an [`EmailJob`], rendered into a subject,
//! a plain-text body and an HTML body, and handed to a [`MailTransport`]. Delivery is a
//! single attempt; retries belong to the job layer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use mediateam_common::{
    AppError, AppResult,
    config::{MailConfig, TeamConfig},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A secret that must reach a mailbox but never a log line.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a plaintext secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Outbound email kinds with their template data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum EmailJob {
    /// Sent to an applicant right after submitting the form.
    RegistrationConfirmation { to: String, full_name: String },
    /// Sent to the administrator distribution address for every new application.
    AdminAlert {
        to: String,
        registration_id: String,
        applicant_name: String,
        applicant_email: String,
        preferred_roles: Vec<String>,
    },
    /// Sent to an applicant whose registration was declined.
    RegistrationRejected {
        to: String,
        full_name: String,
        reason: Option<String>,
    },
    /// Sent to a new member with their login and temporary password.
    Welcome {
        to: String,
        full_name: String,
        username: String,
        temporary_password: Credential,
    },
    /// Sent to a member who was given a role.
    RoleAssigned {
        to: String,
        full_name: String,
        role_name: String,
        notes: Option<String>,
    },
    /// Sent to a member who asked to reset their password.
    PasswordReset {
        to: String,
        full_name: String,
        token: Credential,
        expires_in_minutes: i64,
    },
}

impl EmailJob {
    /// Recipient address.
    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::RegistrationConfirmation { to, .. }
            | Self::AdminAlert { to, .. }
            | Self::RegistrationRejected { to, .. }
            | Self::Welcome { to, .. }
            | Self::RoleAssigned { to, .. }
            | Self::PasswordReset { to, .. } => to,
        }
    }

    /// Template name, for logs.
    #[must_use]
    pub const fn template(&self) -> &'static str {
        match self {
            Self::RegistrationConfirmation { .. } => "registration_confirmation",
            Self::AdminAlert { .. } => "admin_alert",
            Self::RegistrationRejected { .. } => "registration_rejected",
            Self::Welcome { .. } => "welcome",
            Self::RoleAssigned { .. } => "role_assigned",
            Self::PasswordReset { .. } => "password_reset",
        }
    }
}

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub text_body: String,
    /// HTML body.
    pub html_body: String,
}

/// Delivers rendered messages.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one message.
    async fn send(&self, message: &EmailMessage) -> AppResult<()>;

    /// Transport name, for logs.
    fn name(&self) -> &'static str;
}

/// SMTP transport backed by lettre.
pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    /// Build an SMTP transport from configuration. No connection is opened until the
    /// first send.
    pub fn from_config(config: &MailConfig) -> AppResult<Self> {
        let builder = if config.smtp_implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| AppError::Config(format!("Invalid SMTP relay {}: {e}", config.smtp_host)))?
        .port(config.smtp_port);

        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        let address: Address = config.from_address.parse().map_err(|e| {
            AppError::Config(format!("Invalid sender address {}: {e}", config.from_address))
        })?;

        Ok(Self {
            mailer: builder.build(),
            from: Mailbox::new(Some(config.from_name.clone()), address),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid recipient {}: {e}", message.to)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text_body.clone(),
                message.html_body.clone(),
            ))
            .map_err(|e| AppError::Internal(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP delivery failed: {e}")))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

/// Transport used when mail is disabled: messages are only logged.
#[derive(Debug, Clone, Default)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "Mail delivery disabled, message not sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Email service.
#[derive(Clone)]
pub struct EmailService {
    transport: Arc<dyn MailTransport>,
    team_name: String,
    portal_url: String,
}

impl EmailService {
    /// Create a new email service over an explicit transport.
    #[must_use]
    pub fn new(transport: Arc<dyn MailTransport>, team: &TeamConfig) -> Self {
        Self {
            transport,
            team_name: team.name.clone(),
            portal_url: team.portal_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create an email service with the transport selected by configuration.
    pub fn from_config(mail: &MailConfig, team: &TeamConfig) -> AppResult<Self> {
        let transport: Arc<dyn MailTransport> = if mail.enabled {
            Arc::new(SmtpMailTransport::from_config(mail)?)
        } else {
            Arc::new(LogMailTransport)
        };
        Ok(Self::new(transport, team))
    }

    /// Render and deliver one email.
    pub async fn send(&self, job: &EmailJob) -> AppResult<()> {
        let message = self.render(job);
        self.transport.send(&message).await?;

        debug!(
            template = job.template(),
            to = %message.to,
            transport = self.transport.name(),
            "Email sent"
        );
        Ok(())
    }

    /// Render an email template.
    #[must_use]
    pub fn render(&self, job: &EmailJob) -> EmailMessage {
        let team = &self.team_name;
        let portal = &self.portal_url;

        let (subject, text, html) = match job {
            EmailJob::RegistrationConfirmation { full_name, .. } => {
                let subject = format!("We received your application to the {team}");
                let text = format!(
                    "Hello {full_name},\n\n\
                    Thank you for applying to serve with the {team}. Your application is \
                    now pending review. We will email you as soon as an administrator has \
                    looked at it.\n\nGod bless,\nThe {team}"
                );
                let html = self.wrap_html(&format!(
                    "<p>Hello {},</p>\
                    <p>Thank you for applying to serve with the {}. Your application is now \
                    <strong>pending review</strong>. We will email you as soon as an \
                    administrator has looked at it.</p>",
                    escape_html(full_name),
                    escape_html(team)
                ));
                (subject, text, html)
            }

            EmailJob::AdminAlert {
                registration_id,
                applicant_name,
                applicant_email,
                preferred_roles,
                ..
            } => {
                let roles = if preferred_roles.is_empty() {
                    "none given".to_string()
                } else {
                    preferred_roles.join(", ")
                };
                let review_url = format!("{portal}/admin/registrations/{registration_id}");
                let subject = format!("New volunteer application: {applicant_name}");
                let text = format!(
                    "A new application was submitted.\n\n\
                    Name: {applicant_name}\nEmail: {applicant_email}\nPreferred roles: {roles}\n\n\
                    Review it here: {review_url}"
                );
                let html = self.wrap_html(&format!(
                    "<p>A new application was submitted.</p>\
                    <ul><li><strong>Name:</strong> {}</li>\
                    <li><strong>Email:</strong> {}</li>\
                    <li><strong>Preferred roles:</strong> {}</li></ul>\
                    <p><a href=\"{}\">Review the application</a></p>",
                    escape_html(applicant_name),
                    escape_html(applicant_email),
                    escape_html(&roles),
                    review_url
                ));
                (subject, text, html)
            }

            EmailJob::RegistrationRejected {
                full_name, reason, ..
            } => {
                let subject = format!("Your application to the {team}");
                let reason_text = reason
                    .as_deref()
                    .map(|r| format!("\n\nReason given: {r}"))
                    .unwrap_or_default();
                let reason_html = reason
                    .as_deref()
                    .map(|r| format!("<blockquote>{}</blockquote>", escape_html(r)))
                    .unwrap_or_default();
                let text = format!(
                    "Hello {full_name},\n\n\
                    Thank you for your interest in the {team}. After review, we are unable \
                    to accept your application at this time.{reason_text}\n\n\
                    You are welcome to apply again in the future.\n\nGod bless,\nThe {team}"
                );
                let html = self.wrap_html(&format!(
                    "<p>Hello {},</p>\
                    <p>Thank you for your interest in the {}. After review, we are unable to \
                    accept your application at this time.</p>{}\
                    <p>You are welcome to apply again in the future.</p>",
                    escape_html(full_name),
                    escape_html(team),
                    reason_html
                ));
                (subject, text, html)
            }

            EmailJob::Welcome {
                full_name,
                username,
                temporary_password,
                ..
            } => {
                let login_url = format!("{portal}/login");
                let subject = format!("Welcome to the {team}");
                let text = format!(
                    "Hello {full_name},\n\n\
                    Your application has been approved and your member account is ready.\n\n\
                    Username: {username}\nTemporary password: {}\n\n\
                    Sign in at {login_url}. You will be asked to choose a new password the \
                    first time you sign in.\n\nWelcome aboard,\nThe {team}",
                    temporary_password.expose()
                );
                let html = self.wrap_html(&format!(
                    "<p>Hello {},</p>\
                    <p>Your application has been approved and your member account is ready.</p>\
                    <p><strong>Username:</strong> {}<br>\
                    <strong>Temporary password:</strong> <code>{}</code></p>\
                    <p><a href=\"{}\" style=\"display:inline-block;padding:12px 24px;background:#007bff;color:#fff;text-decoration:none;border-radius:4px;\">Sign in</a></p>\
                    <p><small>You will be asked to choose a new password the first time you sign in.</small></p>",
                    escape_html(full_name),
                    escape_html(username),
                    escape_html(temporary_password.expose()),
                    login_url
                ));
                (subject, text, html)
            }

            EmailJob::RoleAssigned {
                full_name,
                role_name,
                notes,
                ..
            } => {
                let subject = format!("You have been assigned to {role_name}");
                let notes_text = notes
                    .as_deref()
                    .map(|n| format!("\n\nNotes from the team: {n}"))
                    .unwrap_or_default();
                let notes_html = notes
                    .as_deref()
                    .map(|n| format!("<blockquote>{}</blockquote>", escape_html(n)))
                    .unwrap_or_default();
                let text = format!(
                    "Hello {full_name},\n\n\
                    You have been assigned the {role_name} role in the {team}.{notes_text}\n\n\
                    See your roles at {portal}/profile"
                );
                let html = self.wrap_html(&format!(
                    "<p>Hello {},</p>\
                    <p>You have been assigned the <strong>{}</strong> role in the {}.</p>{}\
                    <p><a href=\"{}/profile\">See your roles</a></p>",
                    escape_html(full_name),
                    escape_html(role_name),
                    escape_html(team),
                    notes_html,
                    portal
                ));
                (subject, text, html)
            }

            EmailJob::PasswordReset {
                full_name,
                token,
                expires_in_minutes,
                ..
            } => {
                let reset_url = format!("{portal}/reset-password?token={}", token.expose());
                let subject = format!("Reset your {team} password");
                let text = format!(
                    "Hello {full_name},\n\n\
                    You requested a password reset. Open the following link within \
                    {expires_in_minutes} minutes to choose a new password:\n{reset_url}\n\n\
                    If you didn't request this, you can safely ignore this email."
                );
                let html = self.wrap_html(&format!(
                    "<p>Hello {},</p>\
                    <p>You requested a password reset. The link below is valid for {} minutes.</p>\
                    <p><a href=\"{}\" style=\"display:inline-block;padding:12px 24px;background:#007bff;color:#fff;text-decoration:none;border-radius:4px;\">Reset Password</a></p>\
                    <p><small>If you didn't request this, you can safely ignore this email.</small></p>",
                    escape_html(full_name),
                    expires_in_minutes,
                    reset_url
                ));
                (subject, text, html)
            }
        };

        EmailMessage {
            to: job.recipient().to_string(),
            subject,
            text_body: text,
            html_body: html,
        }
    }

    fn wrap_html(&self, content: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
        a {{ color: #007bff; }}
        blockquote {{ margin: 10px 0; padding: 10px 20px; border-left: 4px solid #e9ecef; background: #f8f9fa; }}
    </style>
</head>
<body>
    {}
    <hr style="margin-top: 40px; border: none; border-top: 1px solid #e9ecef;">
    <p style="font-size: 12px; color: #6c757d;">
        Sent by the <a href="{}">{}</a>.
    </p>
</body>
</html>"#,
            content,
            self.portal_url,
            escape_html(&self.team_name)
        )
    }
}

/// Escape text for inclusion in HTML.
fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingTransport {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl MailTransport for CapturingTransport {
        async fn send(&self, message: &EmailMessage) -> AppResult<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "capture"
        }
    }

    fn team() -> TeamConfig {
        TeamConfig {
            name: "Grace Media Team".to_string(),
            portal_url: "https://media.example.org/".to_string(),
        }
    }

    fn service() -> EmailService {
        EmailService::new(Arc::new(LogMailTransport), &team())
    }

    #[test]
    fn test_welcome_contains_credentials_and_login_link() {
        let message = service().render(&EmailJob::Welcome {
            to: "jane@x.org".to_string(),
            full_name: "Jane Doe".to_string(),
            username: "jane".to_string(),
            temporary_password: Credential::new("0123456789abcdef0123456789abcdef"),
        });

        assert_eq!(message.to, "jane@x.org");
        assert!(message.subject.contains("Grace Media Team"));
        assert!(message.text_body.contains("Username: jane"));
        assert!(
            message
                .text_body
                .contains("0123456789abcdef0123456789abcdef")
        );
        assert!(
            message
                .html_body
                .contains("https://media.example.org/login")
        );
    }

    #[test]
    fn test_rejection_includes_reason_when_given() {
        let with_reason = service().render(&EmailJob::RegistrationRejected {
            to: "jane@x.org".to_string(),
            full_name: "Jane Doe".to_string(),
            reason: Some("incomplete application".to_string()),
        });
        let without_reason = service().render(&EmailJob::RegistrationRejected {
            to: "jane@x.org".to_string(),
            full_name: "Jane Doe".to_string(),
            reason: None,
        });

        assert!(with_reason.text_body.contains("incomplete application"));
        assert!(with_reason.html_body.contains("<blockquote>"));
        assert!(!without_reason.text_body.contains("Reason given"));
    }

    #[test]
    fn test_admin_alert_links_to_review_page() {
        let message = service().render(&EmailJob::AdminAlert {
            to: "admins@example.org".to_string(),
            registration_id: "01hreg".to_string(),
            applicant_name: "Jane Doe".to_string(),
            applicant_email: "jane@x.org".to_string(),
            preferred_roles: vec!["Camera".to_string(), "Sound".to_string()],
        });

        assert!(message.subject.contains("Jane Doe"));
        assert!(message.text_body.contains("Camera, Sound"));
        assert!(
            message
                .html_body
                .contains("https://media.example.org/admin/registrations/01hreg")
        );
    }

    #[test]
    fn test_password_reset_link_carries_token() {
        let message = service().render(&EmailJob::PasswordReset {
            to: "jane@x.org".to_string(),
            full_name: "Jane Doe".to_string(),
            token: Credential::new("abc123"),
            expires_in_minutes: 60,
        });

        assert!(
            message
                .text_body
                .contains("https://media.example.org/reset-password?token=abc123")
        );
        assert!(message.text_body.contains("60 minutes"));
    }

    #[test]
    fn test_user_text_is_escaped_in_html() {
        let message = service().render(&EmailJob::RegistrationConfirmation {
            to: "jane@x.org".to_string(),
            full_name: "<script>alert(1)</script>".to_string(),
        });

        assert!(!message.html_body.contains("<script>"));
        assert!(message.html_body.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let job = EmailJob::Welcome {
            to: "jane@x.org".to_string(),
            full_name: "Jane Doe".to_string(),
            username: "jane".to_string(),
            temporary_password: Credential::new("supersecret"),
        };

        let debug = format!("{job:?}");
        assert!(!debug.contains("supersecret"));
        assert!(debug.contains("Credential(***)"));
    }

    #[test]
    fn test_job_serializes_with_template_tag() {
        let job = EmailJob::RoleAssigned {
            to: "jane@x.org".to_string(),
            full_name: "Jane Doe".to_string(),
            role_name: "Camera".to_string(),
            notes: None,
        };

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["template"], "role_assigned");

        let back: EmailJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }

    #[tokio::test]
    async fn test_send_hands_rendered_message_to_transport() {
        let transport = Arc::new(CapturingTransport::default());
        let service = EmailService::new(transport.clone(), &team());

        service
            .send(&EmailJob::RegistrationConfirmation {
                to: "jane@x.org".to_string(),
                full_name: "Jane Doe".to_string(),
            })
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text_body.contains("pending review"));
    }

    #[test]
    fn test_smtp_transport_rejects_bad_sender() {
        let config = MailConfig {
            enabled: true,
            from_address: "not an address".to_string(),
            ..MailConfig::default()
        };

        assert!(matches!(
            SmtpMailTransport::from_config(&config),
            Err(AppError::Config(_))
        ));
    }
}
