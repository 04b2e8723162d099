use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Drive v3 `files.list` response, restricted to `files(id,name,modifiedTime)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriveFileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
}
