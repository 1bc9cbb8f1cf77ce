//! Outbound email for login codes and password recovery.
//!
//! Messages are rendered from Askama templates as text and HTML alternatives.
//! Delivery goes through SMTP (lettre, STARTTLS) or, in development, is
//! written to the log.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;

#[derive(Template)]
#[template(path = "email/login_code.html")]
struct LoginCodeHtml<'a> {
    username: &'a str,
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/login_code.txt")]
struct LoginCodeText<'a> {
    username: &'a str,
    code: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_recovery.html")]
struct PasswordRecoveryHtml<'a> {
    username: &'a str,
    link: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_recovery.txt")]
struct PasswordRecoveryText<'a> {
    username: &'a str,
    link: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Clone)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Console,
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Email service for transactional messages.
#[derive(Clone)]
pub struct EmailService {
    transport: Transport,
    from_address: String,
}

impl EmailService {
    /// Create the service for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let transport = match config {
            EmailConfig::Smtp(smtp) => {
                let credentials = Credentials::new(
                    smtp.username.clone(),
                    smtp.password.expose_secret().to_owned(),
                );
                let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)?
                    .port(smtp.port)
                    .credentials(credentials)
                    .build();
                Transport::Smtp(mailer)
            }
            EmailConfig::Console { .. } => Transport::Console,
        };

        Ok(Self {
            transport,
            from_address: config.from_address().to_owned(),
        })
    }

    /// A service that only logs messages.
    #[must_use]
    pub fn console(from_address: impl Into<String>) -> Self {
        Self {
            transport: Transport::Console,
            from_address: from_address.into(),
        }
    }

    /// Send the second-factor code for a password login.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or delivery fails.
    pub async fn send_login_code(
        &self,
        to: &str,
        username: &str,
        code: &str,
    ) -> Result<(), EmailError> {
        let message = login_code_email(to, username, code)?;
        self.send(&message).await
    }

    /// Send a password recovery link.
    ///
    /// # Errors
    ///
    /// Returns error if rendering or delivery fails.
    pub async fn send_password_recovery(
        &self,
        to: &str,
        username: &str,
        link: &str,
    ) -> Result<(), EmailError> {
        let message = password_recovery_email(to, username, link)?;
        self.send(&message).await
    }

    /// Deliver a rendered message.
    ///
    /// # Errors
    ///
    /// Returns error if an address does not parse or the relay rejects the
    /// message.
    pub async fn send(&self, message: &OutgoingEmail) -> Result<(), EmailError> {
        let from: Mailbox = self
            .from_address
            .parse()
            .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|_| EmailError::InvalidAddress(message.to.clone()))?;

        match &self.transport {
            Transport::Smtp(mailer) => {
                let email = Message::builder()
                    .from(from)
                    .to(to)
                    .subject(message.subject.as_str())
                    .multipart(
                        MultiPart::alternative()
                            .singlepart(
                                SinglePart::builder()
                                    .header(ContentType::TEXT_PLAIN)
                                    .body(message.text.clone()),
                            )
                            .singlepart(
                                SinglePart::builder()
                                    .header(ContentType::TEXT_HTML)
                                    .body(message.html.clone()),
                            ),
                    )?;
                mailer.send(email).await?;
                tracing::info!(to = %message.to, subject = %message.subject, "Email sent successfully");
            }
            Transport::Console => {
                // Bodies carry live codes and links.
                tracing::info!(
                    from = %from,
                    to = %to,
                    subject = %message.subject,
                    "Email (console backend)"
                );
                tracing::debug!(to = %to, body = %message.text, "Email body (console backend)");
            }
        }
        Ok(())
    }
}

fn login_code_email(to: &str, username: &str, code: &str) -> Result<OutgoingEmail, EmailError> {
    Ok(OutgoingEmail {
        to: to.to_owned(),
        subject: "Your GAMERLY login code".to_owned(),
        text: LoginCodeText { username, code }.render()?,
        html: LoginCodeHtml { username, code }.render()?,
    })
}

fn password_recovery_email(
    to: &str,
    username: &str,
    link: &str,
) -> Result<OutgoingEmail, EmailError> {
    Ok(OutgoingEmail {
        to: to.to_owned(),
        subject: "Reset your GAMERLY password".to_owned(),
        text: PasswordRecoveryText { username, link }.render()?,
        html: PasswordRecoveryHtml { username, link }.render()?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_code_email_contains_code() {
        let message = login_code_email("ana@gamerly.cl", "ana", "482913").unwrap();
        assert_eq!(message.to, "ana@gamerly.cl");
        assert!(message.text.contains("482913"));
        assert!(message.html.contains("482913"));
        assert!(message.text.contains("ana"));
    }

    #[test]
    fn test_recovery_email_contains_link() {
        let link = "https://gamerly.cl/auth/recover/5f0c";
        let message = password_recovery_email("ana@gamerly.cl", "ana", link).unwrap();
        assert!(message.text.contains(link));
        assert!(message.html.contains("5f0c"));
    }

    #[test]
    fn test_html_escapes_username() {
        let message = login_code_email("x@gamerly.cl", "<b>", "123456").unwrap();
        assert!(!message.html.contains("<b>"));
    }

    #[tokio::test]
    async fn test_console_backend_delivers() {
        let service = EmailService::console("GAMERLY <no-reply@gamerly.local>");
        let result = service
            .send_login_code("ana@gamerly.cl", "ana", "123456")
            .await;
        assert!(result.is_ok());
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_console_backend_keeps_codes_out_of_info_logs() {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let service = EmailService::console("GAMERLY <no-reply@gamerly.local>");
        service
            .send_login_code("ana@gamerly.cl", "ana", "731902")
            .await
            .unwrap();

        let logged = captured.contents();
        assert!(logged.contains("Email (console backend)"));
        assert!(!logged.contains("731902"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected() {
        let service = EmailService::console("GAMERLY <no-reply@gamerly.local>");
        let result = service
            .send_login_code("not an address", "ana", "123456")
            .await;
        assert!(matches!(result, Err(EmailError::InvalidAddress(_))));
    }
}
