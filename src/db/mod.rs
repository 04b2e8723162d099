//! Database module: models and schema for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows, plus their normalised views
//! - `patch.rs`: insert/patch payloads and the lead listing filter
//! - `options.rs`: named options, transients and loose boolean parsing
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)

pub mod actor;
pub mod models;
pub mod options;
pub mod patch;
pub mod schema;

pub use models::{DbLead, DbWidget, Lead, Widget};
pub use patch::{
    DEFAULT_PER_PAGE, LeadCount, LeadCreate, LeadFilter, LeadOrderBy, PerPage, SortOrder,
    WidgetCreate, WidgetPatch,
};
pub use options::{
    GOOGLE_SHEETS, GOOGLE_SHEETS_INTEGRATION_ID, GOOGLE_SHEETS_SYNC, JUST_CONNECTED_TRANSIENT,
    LAST_REFRESH_TRANSIENT, integration_option, validate_boolean,
};
pub use schema::SQLITE_INIT;

pub use actor::{DbActorHandle, spawn};
