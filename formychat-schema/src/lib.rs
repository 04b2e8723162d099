pub mod auth;
pub mod drive;
pub mod sheets;

pub use auth::{TokenRefreshRequest, TokenRefreshResponse};
pub use drive::{DriveFile, DriveFileList};
pub use sheets::{
    AppendValuesResponse, BatchUpdateSpreadsheetRequest, BatchUpdateSpreadsheetResponse,
    ClearValuesResponse, GoogleApiErrorBody, GoogleApiErrorObject, GridRange, Sheet,
    SheetProperties, SheetRequest, Spreadsheet, SpreadsheetProperties, UpdateValuesResponse,
    ValueRange,
};
