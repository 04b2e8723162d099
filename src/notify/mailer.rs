use chrono::Utc;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::Display;
use std::sync::Arc;

use super::compose::{html_body, recipient, subject};
use crate::config::MailConfig;
use crate::db::DbActorHandle;
use crate::error::MailError;
use crate::leads::LeadCreated;

/// What handling one [`LeadCreated`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent { to: String },
    /// The widget does not want mail for this lead.
    Skipped(&'static str),
}

/// SMTP relay from the `[mail]` table.
pub fn build_smtp_transport(
    cfg: &MailConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let builder = if cfg.starttls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.smtp_host)
    };
    let mut builder = builder.port(cfg.smtp_port).timeout(Some(cfg.timeout()));
    if let (Some(user), Some(pass)) = (&cfg.smtp_username, &cfg.smtp_password) {
        builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }
    Ok(builder.build())
}

/// Sends lead notifications through any lettre transport.
pub struct LeadMailer<T> {
    db: DbActorHandle,
    transport: Arc<T>,
    cfg: Arc<MailConfig>,
    from: Mailbox,
}

impl<T> LeadMailer<T>
where
    T: AsyncTransport + Send + Sync + 'static,
    T::Ok: Send,
    T::Error: Display + Send,
{
    pub fn new(
        db: DbActorHandle,
        transport: Arc<T>,
        cfg: Arc<MailConfig>,
    ) -> Result<Self, MailError> {
        let from = parse_mailbox(&cfg.from)?;
        Ok(Self {
            db,
            transport,
            cfg,
            from,
        })
    }

    pub async fn notify(&self, event: &LeadCreated) -> Result<NotifyOutcome, MailError> {
        let Some(widget_id) = event.submission.widget_id.filter(|id| *id > 0) else {
            return Ok(NotifyOutcome::Skipped("no widget"));
        };
        let Some(widget) = self.db.find_widget(widget_id).await? else {
            return Ok(NotifyOutcome::Skipped("widget not found"));
        };
        let Some(to) = recipient(&widget.config, &self.cfg.admin_email) else {
            return Ok(NotifyOutcome::Skipped("email disabled"));
        };

        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&to)?)
            .subject(subject(&self.cfg.site_name))
            .header(ContentType::TEXT_HTML)
            .body(html_body(
                &self.cfg.site_name,
                &event.submission.field,
                Utc::now(),
            ))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;
        Ok(NotifyOutcome::Sent { to })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}
