//! Email delivery over SMTP.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{Recipients, SmtpSettings};
use crate::error::{DigestError, DigestResult};
use crate::types::{EmailMessage, PreprintServer};

const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Delivers a finished email.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `message` to every To, CC and BCC recipient.
    async fn send(&self, message: &EmailMessage) -> DigestResult<()>;
}

/// Mailer using an authenticated STARTTLS SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a mailer for the given relay. No connection is made until a
    /// message is sent.
    pub fn new(settings: &SmtpSettings) -> DigestResult<Self> {
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| DigestError::Mail(format!("Failed to create SMTP transport: {e}")))?
            .port(settings.port)
            .credentials(creds)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> DigestResult<()> {
        let email = build_message(message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| DigestError::Mail(format!("Failed to send email via SMTP: {e}")))?;

        tracing::info!(
            to = message.to.len(),
            cc = message.cc.len(),
            bcc = message.bcc.len(),
            subject = %message.subject,
            "Email sent successfully"
        );

        Ok(())
    }
}

fn mailbox(role: &str, address: &str) -> DigestResult<Mailbox> {
    address
        .parse()
        .map_err(|e| DigestError::Mail(format!("Invalid {role} address '{address}': {e}")))
}

/// Build a multipart (text + HTML) message.
///
/// A `Cc` header is only written when there are CC recipients; BCC
/// recipients end up in the envelope and never in the headers.
pub fn build_message(message: &EmailMessage) -> DigestResult<Message> {
    if message.to.is_empty() {
        return Err(DigestError::Mail("no To recipients".to_string()));
    }

    let mut builder = Message::builder()
        .from(mailbox("from", &message.from)?)
        .subject(message.subject.as_str());

    for address in &message.to {
        builder = builder.to(mailbox("to", address)?);
    }
    for address in &message.cc {
        builder = builder.cc(mailbox("cc", address)?);
    }
    for address in &message.bcc {
        builder = builder.bcc(mailbox("bcc", address)?);
    }

    builder
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(message.text_body.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(message.html_body.clone()),
                ),
        )
        .map_err(|e| DigestError::Mail(format!("Failed to build email message: {e}")))
}

/// A fixed message for checking SMTP settings.
pub fn test_message(server: PreprintServer, from: &str, recipients: &Recipients) -> EmailMessage {
    let name = server.display_name();
    let subject = format!("{name} digest - Test Email");

    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; padding: 20px;">
    <h2>{name} digest</h2>
    <p style="color: #16a34a; font-weight: bold;">Email configuration is working!</p>
    <p>If you are seeing this, the SMTP settings for the daily digest are correct.</p>
</body>
</html>"#
    );

    let text_body = format!(
        "{name} digest - Test Email

Email configuration is working!

If you are seeing this, the SMTP settings for the daily digest are correct.
"
    );

    EmailMessage {
        from: from.to_string(),
        to: recipients.to.clone(),
        cc: recipients.cc.clone(),
        bcc: recipients.bcc.clone(),
        subject,
        html_body,
        text_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            from: "digest@example.com".to_string(),
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            cc: vec!["c@example.com".to_string()],
            bcc: vec!["hidden@example.com".to_string()],
            subject: "bioRxiv digest: (2024-05-10)".to_string(),
            html_body: "<p>html body</p>".to_string(),
            text_body: "text body".to_string(),
        }
    }

    fn formatted(email: &Message) -> String {
        String::from_utf8(email.formatted()).unwrap()
    }

    #[test]
    fn test_bcc_only_in_envelope() {
        let email = build_message(&message()).unwrap();
        let raw = formatted(&email);

        assert!(!raw.contains("hidden@example.com"));
        assert!(!raw.to_lowercase().contains("bcc:"));

        let envelope: Vec<String> = email
            .envelope()
            .to()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(envelope.len(), 4);
        assert!(envelope.contains(&"hidden@example.com".to_string()));
        assert!(envelope.contains(&"c@example.com".to_string()));
    }

    #[test]
    fn test_headers_and_alternative_parts() {
        let raw = formatted(&build_message(&message()).unwrap());

        assert!(raw.contains("Cc: c@example.com"));
        assert!(raw.contains("a@example.com, b@example.com"));
        assert!(raw.contains("Subject: bioRxiv digest: (2024-05-10)"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_no_cc_header_without_cc() {
        let mut msg = message();
        msg.cc.clear();
        let raw = formatted(&build_message(&msg).unwrap());
        assert!(!raw.contains("Cc:"));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut msg = message();
        msg.cc = vec!["not an address".to_string()];
        assert!(matches!(build_message(&msg), Err(DigestError::Mail(_))));
    }

    #[tokio::test]
    async fn test_empty_to_fails_before_connecting() {
        let settings = SmtpSettings {
            host: "smtp.invalid".to_string(),
            port: 587,
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        let mailer = SmtpMailer::new(&settings).unwrap();

        let mut msg = message();
        msg.to.clear();

        let err = mailer.send(&msg).await.unwrap_err();
        assert!(matches!(err, DigestError::Mail(m) if m.contains("no To recipients")));
    }

    #[test]
    fn test_test_message_uses_recipients() {
        let recipients = Recipients {
            to: vec!["a@example.com".to_string()],
            cc: vec![],
            bcc: vec!["b@example.com".to_string()],
        };
        let msg = test_message(PreprintServer::Biorxiv, "digest@example.com", &recipients);

        assert_eq!(msg.to, recipients.to);
        assert_eq!(msg.subject, "bioRxiv digest - Test Email");
        assert_eq!(msg.bcc, recipients.bcc);
        assert!(build_message(&msg).is_ok());
    }

    #[test]
    fn test_test_message_names_configured_server() {
        let recipients = Recipients {
            to: vec!["a@example.com".to_string()],
            ..Recipients::default()
        };
        let msg = test_message(PreprintServer::Medrxiv, "digest@example.com", &recipients);

        assert_eq!(msg.subject, "medRxiv digest - Test Email");
        assert!(msg.html_body.contains("<h2>medRxiv digest</h2>"));
        assert!(msg.text_body.starts_with("medRxiv digest"));
        assert!(!msg.html_body.contains("bioRxiv"));
    }
}
