use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::spreadsheet::SheetProperties;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateSpreadsheetRequest {
    pub requests: Vec<SheetRequest>,
}

/// One entry of `requests[]`. Serialized externally tagged, e.g. `{"setBasicFilter": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetRequest {
    SetBasicFilter(SetBasicFilterRequest),
    AddSheet(AddSheetRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBasicFilterRequest {
    pub filter: BasicFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicFilter {
    pub range: GridRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_row_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_row_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_column_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column_index: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSheetRequest {
    pub properties: SheetProperties,
}

impl BatchUpdateSpreadsheetRequest {
    /// Filter over every row of the first `columns` columns.
    pub fn basic_filter(sheet_id: i64, columns: u32) -> Self {
        Self {
            requests: vec![SheetRequest::SetBasicFilter(SetBasicFilterRequest {
                filter: BasicFilter {
                    range: GridRange {
                        sheet_id,
                        start_row_index: Some(0),
                        end_row_index: None,
                        start_column_index: Some(0),
                        end_column_index: Some(columns),
                    },
                },
            })],
        }
    }

    pub fn add_sheet(title: impl Into<String>) -> Self {
        Self {
            requests: vec![SheetRequest::AddSheet(AddSheetRequest {
                properties: SheetProperties {
                    sheet_id: None,
                    title: title.into(),
                },
            })],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateSpreadsheetResponse {
    #[serde(default)]
    pub spreadsheet_id: String,

    /// One reply per request, in order. Kept loosely typed; only `addSheet` is inspected.
    #[serde(default)]
    pub replies: Vec<Value>,
}

impl BatchUpdateSpreadsheetResponse {
    /// `replies[0].addSheet.properties.sheetId`, defaulting to 0 like the first sheet.
    pub fn added_sheet_id(&self) -> i64 {
        self.replies
            .first()
            .and_then(|r| r.pointer("/addSheet/properties/sheetId"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn basic_filter_serializes_to_google_shape() {
        let req = BatchUpdateSpreadsheetRequest::basic_filter(7, 6);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "requests": [{
                    "setBasicFilter": {
                        "filter": {
                            "range": {
                                "sheetId": 7,
                                "startRowIndex": 0,
                                "startColumnIndex": 0,
                                "endColumnIndex": 6
                            }
                        }
                    }
                }]
            })
        );
    }

    #[test]
    fn added_sheet_id_reads_first_reply() {
        let resp: BatchUpdateSpreadsheetResponse = serde_json::from_value(json!({
            "spreadsheetId": "abc",
            "replies": [{ "addSheet": { "properties": { "sheetId": 42, "title": "Leads" } } }]
        }))
        .unwrap();
        assert_eq!(resp.added_sheet_id(), 42);

        let empty = BatchUpdateSpreadsheetResponse::default();
        assert_eq!(empty.added_sheet_id(), 0);
    }
}
