//! Lead notification mail: one HTML message per new lead for widgets that ask for it.

mod compose;
mod mailer;
mod worker;

pub use compose::{html_body, recipient, subject};
pub use mailer::{LeadMailer, NotifyOutcome, build_smtp_transport};
pub use worker::spawn_email_notifier;
