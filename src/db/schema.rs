//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema includes:
/// - `scf_leads` table (one captured submission per row, soft-deleted via `deleted_at`)
/// - `scf_widgets` table (floating widget configuration blobs)
/// - `formychat_options` table (named JSON options and expiring transients)
///
/// Statements are split on semicolons, so none may appear inside comments.
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Leads
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS scf_leads (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    widget_id INTEGER NULL DEFAULT 1,
    form TEXT NULL DEFAULT 'formychat',
    form_id INTEGER NULL DEFAULT 0,
    field TEXT NULL, -- JSON object
    meta TEXT NULL, -- JSON object
    note TEXT NULL,
    created_at TEXT NOT NULL, -- RFC3339
    google_sheet_synced_at TEXT NULL, -- RFC3339
    deleted_at TEXT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_scf_leads_pending ON scf_leads(deleted_at, google_sheet_synced_at);
CREATE INDEX IF NOT EXISTS idx_scf_leads_form ON scf_leads(form, form_id);

-- ---------------------------------------------------------------------------
-- Widgets
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS scf_widgets (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name TEXT NOT NULL DEFAULT 'Untitled',
    is_active INTEGER NOT NULL DEFAULT 1,
    config TEXT NULL, -- JSON
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL, -- RFC3339
    deleted_at TEXT NULL -- RFC3339
);

-- ---------------------------------------------------------------------------
-- Options and transients (transients carry an expiry)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS formychat_options (
    name TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL, -- JSON
    expires_at TEXT NULL, -- RFC3339
    updated_at TEXT NOT NULL -- RFC3339
);
"#;
