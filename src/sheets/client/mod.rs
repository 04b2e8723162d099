mod api;
mod token;

pub use api::{CreatedSpreadsheet, SheetsApi};
pub use token::{RefreshAttempt, TokenManager};
