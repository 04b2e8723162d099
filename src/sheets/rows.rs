use ahash::AHashMap;
use chrono::FixedOffset;
use serde_json::Value;

use crate::db::Lead;

pub const LEADING_HEADERS: [&str; 5] = ["ID", "Widget", "Form", "Date", "Time"];

/// Full header row: fixed columns, then one column per field key.
pub fn headers(field_keys: &[String]) -> Vec<String> {
    LEADING_HEADERS
        .iter()
        .map(|h| h.to_string())
        .chain(field_keys.iter().map(|k| header_for_key(k)))
        .collect()
}

/// `first_name` and `first-name` both become `First name`.
pub fn header_for_key(key: &str) -> String {
    ucfirst(&key.replace(['_', '-'], " "))
}

/// Display name of a form tag.
pub fn form_name(form: &str) -> String {
    let name = match form.to_ascii_lowercase().as_str() {
        "" => return String::new(),
        "formychat" => "FormyChat",
        "whatsapp" => "WhatsApp",
        "messenger" => "Messenger",
        "cf7" => "Contact Form 7",
        "wpforms" => "WPForms",
        "gravity" => "Gravity Forms",
        "ninja" => "Ninja Forms",
        "fluentform" | "fluent" => "Fluent Forms",
        "formidable" => "Formidable Forms",
        "forminator" => "Forminator",
        "elementor" => "Elementor Forms",
        _ => return ucfirst(form),
    };
    name.to_string()
}

pub(crate) fn ucfirst(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turns leads into spreadsheet rows aligned with [`headers`].
pub struct RowBuilder<'a> {
    field_keys: &'a [String],
    widget_names: &'a AHashMap<i64, String>,
    offset: FixedOffset,
}

impl<'a> RowBuilder<'a> {
    pub fn new(
        field_keys: &'a [String],
        widget_names: &'a AHashMap<i64, String>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            field_keys,
            widget_names,
            offset,
        }
    }

    pub fn build_row(&self, lead: &Lead) -> Vec<Value> {
        let local = lead.created_at.with_timezone(&self.offset);
        let widget = self
            .widget_names
            .get(&lead.widget_id)
            .cloned()
            .unwrap_or_default();

        let mut row = Vec::with_capacity(LEADING_HEADERS.len() + self.field_keys.len());
        row.push(Value::from(lead.id));
        row.push(Value::String(widget));
        row.push(Value::String(form_name(&lead.form)));
        row.push(Value::String(local.format("%b %-d, %Y").to_string()));
        row.push(Value::String(local.format("%-I:%M %p").to_string()));
        row.extend(
            self.field_keys
                .iter()
                .map(|k| cell(lead.field.get(k.as_str()))),
        );
        row
    }

    pub fn build_rows(&self, leads: &[Lead]) -> Vec<Vec<Value>> {
        leads.iter().map(|l| self.build_row(l)).collect()
    }
}

/// Sheets cells only take scalars. Scalar lists (checkbox groups) are joined, other nested
/// values are written as JSON text.
fn cell(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => v.clone(),
        Some(other) => Value::String(display_text(other)),
    }
}

/// Plain-text rendering of a submitted value, shared by sheet cells and notification mail.
pub(crate) fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(is_scalar) => items
            .iter()
            .map(display_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn is_scalar(v: &Value) -> bool {
    matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_))
}
