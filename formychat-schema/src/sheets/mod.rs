//! Google Sheets v4 wire types.
//!
//! Only the subset of the API used for lead export is modelled. Unknown fields are ignored on
//! deserialization.

mod batch_update;
mod error;
mod spreadsheet;
mod values;

pub use batch_update::{
    AddSheetRequest, BasicFilter, BatchUpdateSpreadsheetRequest, BatchUpdateSpreadsheetResponse,
    GridRange, SetBasicFilterRequest, SheetRequest,
};
pub use error::{GoogleApiErrorBody, GoogleApiErrorObject};
pub use spreadsheet::{Sheet, SheetProperties, Spreadsheet, SpreadsheetProperties};
pub use values::{AppendValuesResponse, ClearValuesResponse, UpdateValuesResponse, ValueRange};
