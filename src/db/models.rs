use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// Raw `scf_leads` row. Use [`Lead`] for the normalised view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbLead {
    pub id: i64,
    pub widget_id: Option<i64>,
    pub form: Option<String>,
    pub form_id: Option<i64>,
    pub field: Option<String>,
    pub meta: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub google_sheet_synced_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A captured submission with its JSON blobs decoded.
///
/// Empty or non-object blobs read as empty maps, an empty form tag reads as `formychat` and a
/// zero widget reads as widget 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    pub id: i64,
    pub widget_id: i64,
    pub form: String,
    pub form_id: i64,
    pub field: Map<String, Value>,
    pub meta: Map<String, Value>,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub google_sheet_synced_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

pub const DEFAULT_FORM: &str = "formychat";
pub const DEFAULT_WIDGET_ID: i64 = 1;

impl From<DbLead> for Lead {
    fn from(row: DbLead) -> Self {
        Self {
            id: row.id,
            widget_id: row
                .widget_id
                .filter(|w| *w != 0)
                .unwrap_or(DEFAULT_WIDGET_ID),
            form: row
                .form
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| DEFAULT_FORM.to_string()),
            form_id: row.form_id.unwrap_or(0),
            field: decode_object(row.field.as_deref()),
            meta: decode_object(row.meta.as_deref()),
            note: row.note.unwrap_or_default(),
            created_at: row.created_at,
            google_sheet_synced_at: row.google_sheet_synced_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// Decodes a stored JSON blob as an object, keeping key order.
pub(crate) fn decode_object(raw: Option<&str>) -> Map<String, Value> {
    match raw.filter(|s| !s.trim().is_empty()) {
        Some(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        None => Map::new(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbWidget {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub config: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Widget with its configuration blob decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Widget {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbWidget> for Widget {
    fn from(row: DbWidget) -> Self {
        let config = row
            .config
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_else(|| Value::Object(Map::new()));
        Self {
            id: row.id,
            name: row.name,
            is_active: row.is_active,
            config,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(field: Option<&str>) -> DbLead {
        DbLead {
            id: 3,
            widget_id: Some(0),
            form: Some(String::new()),
            form_id: None,
            field: field.map(str::to_string),
            meta: None,
            note: None,
            created_at: Utc::now(),
            google_sheet_synced_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn empty_columns_read_as_defaults() {
        let lead = Lead::from(row(None));
        assert_eq!(lead.widget_id, 1);
        assert_eq!(lead.form, "formychat");
        assert_eq!(lead.form_id, 0);
        assert!(lead.field.is_empty());
        assert!(lead.meta.is_empty());
        assert_eq!(lead.note, "");
    }

    #[test]
    fn non_object_field_blob_reads_as_empty_map() {
        assert!(Lead::from(row(Some("[]"))).field.is_empty());
        assert!(Lead::from(row(Some("not json"))).field.is_empty());
    }

    #[test]
    fn field_blob_keeps_key_order() {
        let lead = Lead::from(row(Some(r#"{"zeta":1,"alpha":"x","mid":null}"#)));
        let keys: Vec<&str> = lead.field.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }
}
