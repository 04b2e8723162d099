//! Lead ingestion: turn a submission into a stored lead and announce it.

mod events;

pub use events::{LeadCreated, LeadEvents};

use crate::db::models::{DEFAULT_FORM, DEFAULT_WIDGET_ID};
use crate::db::{DbActorHandle, LeadCreate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error};

/// Public submission payload. Every member is optional and there is no schema for `field`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeadSubmission {
    #[serde(default = "empty_object")]
    pub field: Value,

    #[serde(default = "empty_object")]
    pub meta: Value,

    #[serde(default, deserialize_with = "deserialize_i64_lax")]
    pub widget_id: Option<i64>,

    #[serde(default, deserialize_with = "deserialize_i64_lax")]
    pub form_id: Option<i64>,

    #[serde(default)]
    pub form: Option<String>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Accepts numbers and numeric strings. Anything else reads as absent.
fn deserialize_i64_lax<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

impl LeadSubmission {
    pub fn to_create(&self) -> LeadCreate {
        LeadCreate {
            widget_id: self.widget_id.unwrap_or(DEFAULT_WIDGET_ID),
            form: self
                .form
                .clone()
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| DEFAULT_FORM.to_string()),
            form_id: self.form_id.unwrap_or(0),
            field: self.field.clone(),
            meta: self.meta.clone(),
            note: String::new(),
        }
    }
}

/// Stores submissions and fans out [`LeadCreated`].
#[derive(Clone)]
pub struct LeadIngest {
    db: DbActorHandle,
    events: LeadEvents,
}

impl LeadIngest {
    pub fn new(db: DbActorHandle, events: LeadEvents) -> Self {
        Self { db, events }
    }

    pub fn events(&self) -> &LeadEvents {
        &self.events
    }

    /// Returns the new lead id, or 0 when the insert failed. Failures are logged, never
    /// surfaced to the submitter. Nothing is announced for a failed insert.
    pub async fn submit(&self, submission: LeadSubmission) -> i64 {
        let lead_id = match self.db.create_lead(submission.to_create()).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "failed to store lead submission");
                return 0;
            }
        };

        debug!(lead_id, "lead stored");
        self.events.publish(LeadCreated {
            lead_id,
            submission: Arc::new(submission),
        });
        lead_id
    }
}
