use crate::db::{Widget, WidgetCreate, WidgetPatch, validate_boolean};
use crate::error::FormyChatError;
use crate::server::router::FormyChatState;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::ids_from_value;

pub fn router() -> Router<FormyChatState> {
    Router::new()
        .route("/widgets", get(list_widgets).delete(delete_widgets))
        .route("/widget", post(create_widget))
        .route("/widget/{id}", get(get_widget).put(update_widget))
}

/// Widget body for create and update. Members left out are not touched on update.
#[derive(Debug, Default, Deserialize)]
pub struct WidgetBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: Option<Value>,
    #[serde(default)]
    pub config: Option<Value>,
}

/// GET /widgets
pub async fn list_widgets(
    State(state): State<FormyChatState>,
) -> Result<Json<Vec<Widget>>, FormyChatError> {
    Ok(Json(state.db.list_widgets().await?))
}

/// POST /widget
pub async fn create_widget(
    State(state): State<FormyChatState>,
    Json(body): Json<WidgetBody>,
) -> Result<Json<Value>, FormyChatError> {
    let defaults = WidgetCreate::default();
    let create = WidgetCreate {
        name: body
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or(defaults.name),
        is_active: body
            .is_active
            .filter(|v| !v.is_null())
            .map_or(defaults.is_active, |v| validate_boolean(&v)),
        config: body
            .config
            .filter(|c| !c.is_null())
            .unwrap_or_else(|| Value::Object(Map::new())),
    };

    let id = state.db.create_widget(create).await?;
    let widget = state.db.find_widget(id).await?;
    state.sheets.engine.invalidate_widget_names();
    Ok(Json(json!({ "success": true, "id": id, "data": widget })))
}

/// GET /widget/{id}
pub async fn get_widget(
    State(state): State<FormyChatState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, FormyChatError> {
    let widget = state
        .db
        .find_widget(id)
        .await?
        .ok_or_else(|| FormyChatError::NotFound("Widget not found.".to_string()))?;
    Ok(Json(json!({ "success": true, "data": widget })))
}

/// PUT /widget/{id}
pub async fn update_widget(
    State(state): State<FormyChatState>,
    Path(id): Path<i64>,
    Json(body): Json<WidgetBody>,
) -> Result<Json<Value>, FormyChatError> {
    if state.db.find_widget(id).await?.is_none() {
        return Err(FormyChatError::NotFound("Widget not found.".to_string()));
    }

    let patch = WidgetPatch {
        name: body.name,
        is_active: body.is_active.map(|v| validate_boolean(&v)),
        config: body.config,
    };
    if patch.is_empty() {
        return Err(FormyChatError::validation(
            "no_data",
            "No data to update.",
        ));
    }

    state.db.patch_widget(id, patch).await?;
    state.sheets.engine.invalidate_widget_names();
    let widget = state.db.find_widget(id).await?;
    Ok(Json(json!({ "success": true, "data": widget })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteWidgetsBody {
    #[serde(default)]
    pub id: Value,
}

/// DELETE /widgets
pub async fn delete_widgets(
    State(state): State<FormyChatState>,
    Json(body): Json<DeleteWidgetsBody>,
) -> Result<Json<Value>, FormyChatError> {
    let ids = ids_from_value(&body.id);
    if ids.is_empty() {
        return Err(FormyChatError::validation(
            "missing_id",
            "No widget ID provided.",
        ));
    }

    let deleted = state.db.delete_widgets(ids).await?;
    if deleted == 0 {
        return Err(FormyChatError::NotFound("Widget not found.".to_string()));
    }
    state.sheets.engine.invalidate_widget_names();
    Ok(Json(json!({
        "success": true,
        "message": "Widget deleted.",
        "deleted": deleted,
    })))
}
