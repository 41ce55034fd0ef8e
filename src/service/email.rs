//! Outgoing mail: templates and the configured transport.

use crate::config::{EmailConfig, EmailMode};
use crate::error::AppError;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Clone)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Memory(Arc<Mutex<Vec<OutgoingEmail>>>),
    Log,
}

#[derive(Clone)]
pub struct Mailer {
    from: Mailbox,
    transport: Transport,
}

impl Mailer {
    pub fn from_config(cfg: &EmailConfig) -> Result<Self, AppError> {
        let from: Mailbox = cfg.from.parse()?;
        let transport = match cfg.mode {
            EmailMode::Smtp => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)?
                        .port(cfg.smtp_port);
                if let (Some(user), Some(pass)) = (&cfg.smtp_username, &cfg.smtp_password) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }
                Transport::Smtp(builder.build())
            }
            EmailMode::Memory => Transport::Memory(Arc::default()),
            EmailMode::Log => Transport::Log,
        };
        Ok(Self { from, transport })
    }

    /// In-process mailer; messages are kept in [`Mailer::outbox`].
    pub fn memory() -> Self {
        Self {
            from: Mailbox::new(None, "no-reply@watchdesk.local".parse().expect("static address")),
            transport: Transport::Memory(Arc::default()),
        }
    }

    /// Messages captured by a memory transport, oldest first.
    pub fn outbox(&self) -> Vec<OutgoingEmail> {
        match &self.transport {
            Transport::Memory(outbox) => outbox.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            _ => Vec::new(),
        }
    }

    pub async fn send(&self, mail: OutgoingEmail) -> Result<(), AppError> {
        match &self.transport {
            Transport::Smtp(smtp) => {
                let message = Message::builder()
                    .from(self.from.clone())
                    .to(mail.to.parse()?)
                    .subject(mail.subject.clone())
                    .multipart(MultiPart::alternative_plain_html(mail.text, mail.html))?;
                smtp.send(message).await?;
            }
            Transport::Memory(outbox) => {
                outbox.lock().unwrap_or_else(|e| e.into_inner()).push(mail);
            }
            Transport::Log => {
                info!(to = %mail.to, subject = %mail.subject, body = %mail.text, "email (log transport)");
            }
        }
        Ok(())
    }

    /// Mail failures never fail the calling request.
    pub async fn send_best_effort(&self, mail: OutgoingEmail) {
        let to = mail.to.clone();
        let subject = mail.subject.clone();
        if let Err(e) = self.send(mail).await {
            warn!(%to, %subject, error = %e, "failed to send email");
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, paragraphs: &[String], action: Option<(&str, &str)>) -> String {
    let mut body = format!("<h2>{}</h2>", escape_html(title));
    for p in paragraphs {
        body.push_str(&format!("<p>{}</p>", escape_html(p)));
    }
    if let Some((label, link)) = action {
        body.push_str(&format!(
            r#"<p><a href="{}" style="padding:10px 16px;background:#1f2937;color:#fff;text-decoration:none;border-radius:4px">{}</a></p>"#,
            escape_html(link),
            escape_html(label)
        ));
    }
    format!(
        r#"<!doctype html><html><body style="font-family:sans-serif;color:#111">{body}</body></html>"#
    )
}

fn greeting(name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => format!("Hi {n},"),
        None => "Hi,".to_string(),
    }
}

pub fn verification_email(to: &str, name: Option<&str>, link: &str) -> OutgoingEmail {
    let lines = vec![
        greeting(name),
        "Confirm your email address to activate your Watchdesk account. The link is valid for 48 hours.".to_string(),
    ];
    OutgoingEmail {
        to: to.to_string(),
        subject: "Verify your Watchdesk account".to_string(),
        text: format!("{}\n\n{}\n\n{link}\n", lines[0], lines[1]),
        html: layout("Verify your email", &lines, Some(("Verify email", link))),
    }
}

pub fn password_reset_email(to: &str, name: Option<&str>, link: &str) -> OutgoingEmail {
    let lines = vec![
        greeting(name),
        "Someone asked to reset your Watchdesk password. The link is valid for one hour; ignore this message if it was not you.".to_string(),
    ];
    OutgoingEmail {
        to: to.to_string(),
        subject: "Reset your Watchdesk password".to_string(),
        text: format!("{}\n\n{}\n\n{link}\n", lines[0], lines[1]),
        html: layout("Reset your password", &lines, Some(("Choose a new password", link))),
    }
}

pub fn invitation_email(to: &str, name: Option<&str>, link: &str) -> OutgoingEmail {
    let lines = vec![
        greeting(name),
        "Your Watchdesk access has been approved. Set a password within 7 days to activate your account.".to_string(),
    ];
    OutgoingEmail {
        to: to.to_string(),
        subject: "You're invited to Watchdesk".to_string(),
        text: format!("{}\n\n{}\n\n{link}\n", lines[0], lines[1]),
        html: layout("Welcome to Watchdesk", &lines, Some(("Accept invitation", link))),
    }
}

pub fn promo_confirmation_email(to: &str, first_name: &str, campaign: &str) -> OutgoingEmail {
    let lines = vec![
        greeting(Some(first_name)),
        format!("Thanks for signing up for \"{campaign}\". We review every request and will email you once your access is approved."),
    ];
    OutgoingEmail {
        to: to.to_string(),
        subject: "We received your Watchdesk signup".to_string(),
        text: format!("{}\n\n{}\n", lines[0], lines[1]),
        html: layout("Signup received", &lines, None),
    }
}

pub fn promo_admin_notice(
    to: &str,
    campaign: &str,
    applicant: &str,
    applicant_email: &str,
    message: Option<&str>,
) -> OutgoingEmail {
    let mut lines = vec![format!(
        "{applicant} <{applicant_email}> signed up for \"{campaign}\" and is waiting for review."
    )];
    if let Some(m) = message.filter(|m| !m.trim().is_empty()) {
        lines.push(format!("Message: {m}"));
    }
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("New promo signup: {campaign}"),
        text: lines.join("\n\n"),
        html: layout("New promo signup", &lines, None),
    }
}
