use thiserror::Error as ThisError;

use super::formychat::FormyChatError;

/// Lead notification failures. Logged by the notifier, never returned to a submitter.
#[derive(Debug, ThisError)]
pub enum MailError {
    #[error("Invalid mail address {address:?}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("Failed to build notification message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP transport setup failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Mail delivery failed: {0}")]
    Send(String),

    #[error(transparent)]
    Lookup(#[from] FormyChatError),
}
