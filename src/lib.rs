pub mod config;
pub mod db;
pub mod error;
pub mod integrations;
pub mod leads;
pub mod notify;
pub mod server;
pub mod sheets;

pub use error::FormyChatError;
