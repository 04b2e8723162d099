//! Catalogue of marketing integrations and their persisted enabled flags.

use crate::db::DbActorHandle;
use crate::error::FormyChatError;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

const CATEGORIES: &[(&str, &str)] = &[
    ("crm_marketing", "CRM & Marketing"),
    ("email_newsletters", "Email & Newsletters"),
    ("automation_webhooks", "Automation & Webhooks"),
    ("file_storage_cloud", "File Storage & Cloud"),
    ("analytics_tracking", "Analytics & Tracking"),
    ("communication", "Communication"),
    ("others", "Others"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationKind {
    WpPlugin,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Available,
    Upcoming,
}

/// Static description of one integration.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationDef {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub logo: &'static str,
    pub color: Option<&'static str>,
    pub kind: Option<IntegrationKind>,
    pub plugin: Option<&'static str>,
    pub categories: &'static [&'static str],
    pub status: IntegrationStatus,
    pub link: Option<&'static str>,
    pub tutorial_url: Option<&'static str>,
}

pub const INTEGRATIONS: &[IntegrationDef] = &[
    IntegrationDef {
        id: "fluent-crm",
        title: "FluentCRM",
        description: "Connect your Form leads to FluentCRM and instantly add new contacts when a form is submitted. Perfect for automated email campaigns and segmented marketing.",
        logo: "/images/integrations/fluent-crm.png",
        color: Some("rgb(119 66 230)"),
        kind: Some(IntegrationKind::WpPlugin),
        plugin: Some("fluent-crm/fluent-crm.php"),
        categories: &["crm_marketing", "email_newsletters"],
        status: IntegrationStatus::Available,
        link: Some("https://fluentcrm.com/"),
        tutorial_url: Some("https://www.youtube.com/watch?v=5VFeUIqw3cg"),
    },
    IntegrationDef {
        id: "mailchimp",
        title: "MailChimp",
        description: "Create Mailchimp newsletter signups directly from your form submissions. Automatically grow your audience and engage your subscribers.",
        logo: "/images/integrations/mailchimp.png",
        color: Some("rgb(255 224 27)"),
        kind: Some(IntegrationKind::Api),
        plugin: None,
        categories: &["crm_marketing", "email_newsletters"],
        status: IntegrationStatus::Available,
        link: Some("https://mailchimp.com/"),
        tutorial_url: Some("https://youtu.be/x70qZf2KWwg"),
    },
    IntegrationDef {
        id: "google_sheets",
        title: "Google Sheets",
        description: "Sync form submissions directly to Google Sheets in real time. Perfect for reporting, analytics, or team collaboration without manual data entry.",
        logo: "/images/integrations/google-sheets.png",
        color: Some("rgb(52 168 83)"),
        kind: Some(IntegrationKind::Api),
        plugin: None,
        categories: &["automation_webhooks", "file_storage_cloud"],
        status: IntegrationStatus::Available,
        link: Some("https://sheets.google.com"),
        tutorial_url: Some(
            "https://www.youtube.com/watch?v=bjJcWoY-8zA&list=PLd6WEu38CQSyebRIikg4qX54h-R1n35TG",
        ),
    },
    IntegrationDef {
        id: "mailpoet",
        title: "MailPoet",
        description: "Add subscribers to your MailPoet mailing lists as soon as they submit a form. Automate your newsletter growth and keep your audience engaged.",
        logo: "/images/integrations/mailpoet.png",
        color: None,
        kind: None,
        plugin: Some("mailpoet/mailpoet.php"),
        categories: &[],
        status: IntegrationStatus::Upcoming,
        link: None,
        tutorial_url: None,
    },
];

/// One catalogue entry as served to the admin UI.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationEntry {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub logo: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<IntegrationKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<&'static str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub categories: &'static [&'static str],
    pub status: IntegrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tutorial_url: Option<&'static str>,
    /// Upcoming integrations carry no flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationsCatalog {
    pub categories: Map<String, Value>,
    pub integrations: Vec<IntegrationEntry>,
}

pub fn find(id: &str) -> Option<&'static IntegrationDef> {
    INTEGRATIONS.iter().find(|i| i.id == id)
}

pub fn categories() -> Map<String, Value> {
    CATEGORIES
        .iter()
        .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
        .collect()
}

/// Catalogue with each available integration's stored enabled flag.
pub async fn catalog(db: &DbActorHandle) -> Result<IntegrationsCatalog, FormyChatError> {
    let mut integrations = Vec::with_capacity(INTEGRATIONS.len());
    for def in INTEGRATIONS {
        let enabled = match def.status {
            IntegrationStatus::Available => Some(db.integration_enabled(def.id).await?),
            IntegrationStatus::Upcoming => None,
        };
        integrations.push(IntegrationEntry {
            id: def.id,
            title: def.title,
            description: def.description,
            logo: def.logo,
            color: def.color,
            kind: def.kind,
            plugin: def.plugin,
            categories: def.categories,
            status: def.status,
            link: def.link,
            tutorial_url: def.tutorial_url,
            enabled,
        });
    }
    Ok(IntegrationsCatalog {
        categories: categories(),
        integrations,
    })
}

/// Stores the flag as given; readers apply loose truthiness.
pub async fn update(
    db: &DbActorHandle,
    integration_id: &str,
    enabled: Value,
) -> Result<(), FormyChatError> {
    if integration_id.trim().is_empty() {
        return Err(FormyChatError::validation(
            "missing_integration_id",
            "Integration ID is required.",
        ));
    }
    if find(integration_id).is_none() {
        warn!(integration_id, "Storing flag for an integration outside the catalogue");
    }
    db.set_integration_enabled(integration_id, enabled).await
}
