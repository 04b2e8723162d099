use crate::db::{Lead, LeadFilter, LeadOrderBy, PerPage, SortOrder};
use crate::error::FormyChatError;
use crate::server::router::FormyChatState;
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use super::ids_from_value;

pub fn router() -> Router<FormyChatState> {
    Router::new().route("/leads", get(list_leads).delete(delete_leads))
}

/// Raw listing parameters. Everything arrives as text and is normalised in [`LeadsQuery::into_filter`].
#[derive(Debug, Default, Deserialize)]
pub struct LeadsQuery {
    pub mode: Option<String>,
    pub form_id: Option<String>,
    pub widget_id: Option<String>,
    pub search: Option<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub order: Option<String>,
    pub order_by: Option<String>,
    pub per_page: Option<String>,
    pub page: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// `YYYY-MM-DD` or a full RFC 3339 timestamp, reduced to its UTC day.
fn parse_day(raw: &str) -> Result<NaiveDate, FormyChatError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|d| d.with_timezone(&Utc).date_naive()))
        .map_err(|_| FormyChatError::validation("invalid_date", format!("Invalid date: {raw}")))
}

impl LeadsQuery {
    pub fn into_filter(self) -> Result<LeadFilter, FormyChatError> {
        let order = match non_empty(self.order).map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        };

        let order_by = match non_empty(self.order_by) {
            Some(col) => serde_json::from_value::<LeadOrderBy>(Value::String(col.clone()))
                .map_err(|_| {
                    FormyChatError::validation(
                        "invalid_order_by",
                        format!("Cannot order leads by '{col}'."),
                    )
                })?,
            None => LeadOrderBy::default(),
        };

        let per_page = match non_empty(self.per_page) {
            Some(p) if p.eq_ignore_ascii_case("all") => PerPage::All,
            Some(p) => match p.parse::<u32>() {
                Ok(n) if n > 0 => PerPage::Count(n),
                _ => PerPage::default(),
            },
            None => PerPage::default(),
        };

        let after = non_empty(self.after)
            .map(|d| parse_day(&d))
            .transpose()?
            .map(|d| d.and_time(NaiveTime::MIN).and_utc());
        let before = non_empty(self.before)
            .map(|d| parse_day(&d))
            .transpose()?
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map(|d| d.and_utc());

        Ok(LeadFilter {
            search: non_empty(self.search),
            after,
            before,
            widget_id: non_empty(self.widget_id).and_then(|w| w.parse().ok()),
            form: Some(non_empty(self.mode).unwrap_or_else(|| "formychat".to_string())),
            form_id: non_empty(self.form_id).and_then(|f| f.parse().ok()),
            order,
            order_by,
            per_page,
            page: non_empty(self.page)
                .and_then(|p| p.parse().ok())
                .unwrap_or(1)
                .max(1),
        })
    }
}

/// GET /leads
pub async fn list_leads(
    State(state): State<FormyChatState>,
    Query(query): Query<LeadsQuery>,
) -> Result<Json<Vec<Lead>>, FormyChatError> {
    let filter = query.into_filter()?;
    Ok(Json(state.db.list_leads(filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct DeleteLeadsBody {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub form: Option<String>,
}

/// DELETE /leads
pub async fn delete_leads(
    State(state): State<FormyChatState>,
    Json(body): Json<DeleteLeadsBody>,
) -> Result<Json<Value>, FormyChatError> {
    let ids = ids_from_value(&body.id);
    if ids.is_empty() {
        return Err(FormyChatError::validation(
            "missing_id",
            "No lead ID provided.",
        ));
    }
    let form = body
        .form
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "formychat".to_string());

    let deleted = state.db.delete_leads(ids, form).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Leads deleted.",
        "deleted": deleted,
    })))
}
