use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::db::validate_boolean;
use crate::sheets::rows::{display_text, ucfirst};

/// Address a widget's `config.email` settings point at. `None` when notifications are off or
/// no address is configured.
pub fn recipient(widget_config: &Value, admin_email: &str) -> Option<String> {
    let settings = widget_config.get("email")?;
    let flag = |key: &str| settings.get(key).is_some_and(validate_boolean);

    if !flag("enabled") {
        return None;
    }
    let to = if flag("admin_email") {
        admin_email
    } else {
        settings.get("address").and_then(Value::as_str).unwrap_or_default()
    };
    let to = to.trim();
    (!to.is_empty()).then(|| to.to_string())
}

pub fn subject(site_name: &str) -> String {
    format!("New Lead from {site_name}")
}

/// One `<strong>Key</strong>: value` line per submitted field, in submission order.
pub fn html_body(site_name: &str, field: &Value, sent_at: DateTime<Utc>) -> String {
    let lines = field
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(key, value)| {
                    format!(
                        "<strong>{}</strong>: {}",
                        escape_html(&ucfirst(key)),
                        escape_html(&display_text(value))
                    )
                })
                .collect::<Vec<_>>()
                .join("<br/>")
        })
        .unwrap_or_default();
    let site = escape_html(site_name);

    format!(
        "Hi,<br/><br/>You have received a new lead from {site}. <br/><br/>Please check the details \
         below:<br/> {lines} <br/><br/><br/>Sent at {}<br/>Thank you.",
        sent_at.format("%Y-%m-%d %H:%M:%S")
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn recipient_follows_widget_email_settings() {
        let own = json!({ "email": { "enabled": "1", "admin_email": false, "address": " sales@acme.test " } });
        assert_eq!(recipient(&own, "owner@acme.test").as_deref(), Some("sales@acme.test"));

        let admin = json!({ "email": { "enabled": true, "admin_email": "true", "address": "sales@acme.test" } });
        assert_eq!(recipient(&admin, "owner@acme.test").as_deref(), Some("owner@acme.test"));
        assert_eq!(recipient(&admin, ""), None);

        let off = json!({ "email": { "enabled": "0", "address": "sales@acme.test" } });
        assert_eq!(recipient(&off, "owner@acme.test"), None);

        assert_eq!(recipient(&json!({}), "owner@acme.test"), None);
        assert_eq!(recipient(&json!({ "email": { "enabled": 1 } }), "owner@acme.test"), None);
    }

    #[test]
    fn body_lists_fields_and_escapes_markup() {
        let sent_at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let body = html_body(
            "Acme",
            &json!({ "name": "Ada <b>", "topics": ["a", "b"] }),
            sent_at,
        );
        assert!(body.contains("new lead from Acme."));
        assert!(body.contains("<strong>Name</strong>: Ada &lt;b&gt;<br/><strong>Topics</strong>: a, b"));
        assert!(body.contains("Sent at 2026-03-04 05:06:07"));
    }

    #[test]
    fn subject_names_the_site() {
        assert_eq!(subject("Acme Plumbing"), "New Lead from Acme Plumbing");
    }
}
