use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,

    #[serde(default)]
    pub properties: SpreadsheetProperties,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sheets: Vec<Sheet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpreadsheetProperties {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(default)]
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    /// Absent on create requests; assigned by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<i64>,

    #[serde(default)]
    pub title: String,
}

impl Spreadsheet {
    /// Body for `POST /v4/spreadsheets` creating a document with a single named tab.
    pub fn new_with_sheet(title: impl Into<String>, sheet_title: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: None,
            properties: SpreadsheetProperties {
                title: title.into(),
            },
            sheets: vec![Sheet {
                properties: SheetProperties {
                    sheet_id: None,
                    title: sheet_title.into(),
                },
            }],
            spreadsheet_url: None,
        }
    }

    pub fn find_sheet_id(&self, title: &str) -> Option<i64> {
        self.sheets
            .iter()
            .find(|s| s.properties.title == title)
            .map(|s| s.properties.sheet_id.unwrap_or(0))
    }
}
