use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::models::{DEFAULT_FORM, DEFAULT_WIDGET_ID};

/// Insert payload for `scf_leads`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadCreate {
    pub widget_id: i64,
    pub form: String,
    pub form_id: i64,
    pub field: Value,
    pub meta: Value,
    pub note: String,
}

impl Default for LeadCreate {
    fn default() -> Self {
        Self {
            widget_id: DEFAULT_WIDGET_ID,
            form: DEFAULT_FORM.to_string(),
            form_id: 0,
            field: Value::Object(Map::new()),
            meta: Value::Object(Map::new()),
            note: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(alias = "asc", alias = "ASC")]
    Asc,
    #[default]
    #[serde(alias = "desc", alias = "DESC")]
    Desc,
}

impl SortOrder {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Sortable lead columns. Anything else is rejected before reaching SQL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadOrderBy {
    #[default]
    CreatedAt,
    Id,
    WidgetId,
    FormId,
}

impl LeadOrderBy {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            LeadOrderBy::CreatedAt => "created_at",
            LeadOrderBy::Id => "id",
            LeadOrderBy::WidgetId => "widget_id",
            LeadOrderBy::FormId => "form_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerPage {
    All,
    Count(u32),
}

/// Page size when the caller does not pick one.
pub const DEFAULT_PER_PAGE: u32 = 10;

impl Default for PerPage {
    fn default() -> Self {
        PerPage::Count(DEFAULT_PER_PAGE)
    }
}

/// Lead listing filter. Empty/`None` members are not applied. Soft-deleted rows are always
/// excluded.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    /// Substring match over `field`, `meta` and `note`, or an exact widget id when numeric.
    pub search: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub widget_id: Option<i64>,
    /// `formychat` also matches rows stored without a form tag.
    pub form: Option<String>,
    pub form_id: Option<i64>,
    pub order: SortOrder,
    pub order_by: LeadOrderBy,
    pub per_page: PerPage,
    /// 1-based.
    pub page: u32,
}

/// Which non-deleted leads to count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadCount {
    Total,
    Form(String),
    Synced,
    PendingSync,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetCreate {
    pub name: String,
    pub is_active: bool,
    pub config: Value,
}

impl Default for WidgetCreate {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            is_active: true,
            config: Value::Object(Map::new()),
        }
    }
}

/// Partial widget update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WidgetPatch {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub config: Option<Value>,
}

impl WidgetPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.is_active.is_none() && self.config.is_none()
    }
}
