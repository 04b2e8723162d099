use chrono::{SubsecRound, Utc};
use formychat_schema::{
    AppendValuesResponse, BatchUpdateSpreadsheetRequest, BatchUpdateSpreadsheetResponse,
    ClearValuesResponse, DriveFile, DriveFileList, GoogleApiErrorBody, Spreadsheet,
    UpdateValuesResponse, ValueRange,
};
use reqwest::{Method, header::ACCEPT};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::token::TokenManager;
use crate::config::GoogleSheetsConfig;
use crate::db::DbActorHandle;
use crate::error::{FormyChatError, SheetsError, truncate_body};
use crate::sheets::connection::GoogleConnection;

const SPREADSHEET_MIME_QUERY: &str = "mimeType='application/vnd.google-apps.spreadsheet'";

/// Spreadsheet created through the API, as reported back to the admin UI.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSpreadsheet {
    pub id: String,
    pub name: String,
    pub url: String,
}

/// Thin client over Sheets v4 and Drive v3 using the stored Google connection.
#[derive(Clone)]
pub struct SheetsApi {
    http: reqwest::Client,
    cfg: Arc<GoogleSheetsConfig>,
    db: DbActorHandle,
    tokens: TokenManager,
}

impl SheetsApi {
    pub fn new(
        http: reqwest::Client,
        cfg: Arc<GoogleSheetsConfig>,
        db: DbActorHandle,
        tokens: TokenManager,
    ) -> Self {
        Self {
            http,
            cfg,
            db,
            tokens,
        }
    }

    /// Current bearer token. An expired token is refreshed once through the auth proxy.
    pub async fn get_access_token(&self) -> Result<String, FormyChatError> {
        let conn = GoogleConnection::load(&self.db)
            .await?
            .filter(GoogleConnection::is_usable)
            .ok_or(SheetsError::NotConnected)?;
        if conn.access_token.is_none() {
            return Err(SheetsError::NoToken.into());
        }

        if !conn.is_expired(Utc::now().trunc_subsecs(0)) {
            return conn
                .access_token_secret()
                .map(str::to_string)
                .ok_or_else(|| SheetsError::NoToken.into());
        }

        debug!("Google access token expired; forcing refresh");
        let refreshed = match self.tokens.force_refresh().await {
            Ok(c) => c,
            Err(FormyChatError::Oauth(e)) => return Err(SheetsError::TokenExpired(e).into()),
            Err(e) => return Err(e),
        };
        refreshed
            .access_token_secret()
            .map(str::to_string)
            .ok_or_else(|| SheetsError::NoToken.into())
    }

    async fn make_request<B, T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T, FormyChatError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.get_access_token().await?;
        let mut req = self
            .http
            .request(method.clone(), url.clone())
            .bearer_auth(token)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(SheetsError::from)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(SheetsError::from)?;

        if status.is_client_error() || status.is_server_error() {
            let message = GoogleApiErrorBody::message_from_slice(&bytes)
                .unwrap_or_else(|| "API request failed.".to_string());
            warn!(
                method = %method,
                path = url.path(),
                status = status.as_u16(),
                message = %message,
                "Google API request failed"
            );
            return Err(SheetsError::Api { status, message }.into());
        }

        serde_json::from_slice(&bytes).map_err(|e| {
            SheetsError::Parse {
                message: e.to_string(),
                body: truncate_body(&bytes),
            }
            .into()
        })
    }

    /// `{sheets_api_base}/{segments...}`
    fn sheets_url(&self, segments: &[&str]) -> Result<Url, SheetsError> {
        join_segments(&self.cfg.sheets_api_base, segments)
    }

    /// Most recently modified spreadsheets in the connected Drive.
    pub async fn list_spreadsheets(&self) -> Result<Vec<DriveFile>, FormyChatError> {
        let mut url = self.cfg.drive_api_base.clone();
        url.query_pairs_mut()
            .append_pair("q", SPREADSHEET_MIME_QUERY)
            .append_pair("fields", "files(id,name,modifiedTime)")
            .append_pair("orderBy", "modifiedTime desc")
            .append_pair("pageSize", "50");
        let list: DriveFileList = self.make_request::<(), _>(Method::GET, url, None).await?;
        Ok(list.files)
    }

    pub async fn create_spreadsheet(
        &self,
        title: &str,
    ) -> Result<CreatedSpreadsheet, FormyChatError> {
        let url = self.sheets_url(&[])?;
        let body = Spreadsheet::new_with_sheet(title, self.cfg.sheet_name.as_str());
        let created: Spreadsheet = self.make_request(Method::POST, url, Some(&body)).await?;

        let id = created
            .spreadsheet_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SheetsError::Parse {
                message: "missing spreadsheetId".to_string(),
                body: String::new(),
            })?;
        Ok(CreatedSpreadsheet {
            id,
            name: Some(created.properties.title)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| title.to_string()),
            url: created.spreadsheet_url.unwrap_or_default(),
        })
    }

    pub async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<Spreadsheet, FormyChatError> {
        let url = self.sheets_url(&[spreadsheet_id])?;
        self.make_request::<(), _>(Method::GET, url, None).await
    }

    /// Writes the header row at `A1`.
    pub async fn set_headers(
        &self,
        spreadsheet_id: &str,
        headers: &[String],
        sheet: &str,
    ) -> Result<UpdateValuesResponse, FormyChatError> {
        let range = format!("{sheet}!A1");
        let mut url = self.sheets_url(&[spreadsheet_id, "values", range.as_str()])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let row = headers.iter().cloned().map(Value::String).collect();
        let body = ValueRange::from_rows(vec![row]);
        self.make_request(Method::PUT, url, Some(&body)).await
    }

    /// Turns on the basic filter over the first `columns` columns.
    pub async fn apply_basic_filter(
        &self,
        spreadsheet_id: &str,
        columns: u32,
        sheet_id: i64,
    ) -> Result<BatchUpdateSpreadsheetResponse, FormyChatError> {
        let body = BatchUpdateSpreadsheetRequest::basic_filter(sheet_id, columns);
        self.batch_update(spreadsheet_id, &body).await
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        body: &BatchUpdateSpreadsheetRequest,
    ) -> Result<BatchUpdateSpreadsheetResponse, FormyChatError> {
        let action = format!("{spreadsheet_id}:batchUpdate");
        let url = self.sheets_url(&[action.as_str()])?;
        self.make_request(Method::POST, url, Some(body)).await
    }

    /// Id of the tab named `sheet`, adding the tab when it does not exist.
    pub async fn get_or_create_sheet(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
    ) -> Result<i64, FormyChatError> {
        let spreadsheet = self.get_spreadsheet(spreadsheet_id).await?;
        if let Some(id) = spreadsheet.find_sheet_id(sheet) {
            return Ok(id);
        }
        debug!(spreadsheet_id, sheet, "Adding missing sheet tab");
        let resp = self
            .batch_update(spreadsheet_id, &BatchUpdateSpreadsheetRequest::add_sheet(sheet))
            .await?;
        Ok(resp.added_sheet_id())
    }

    /// Prepares a tab for a full export: clear data rows, write headers, add a filter.
    pub async fn setup_sheet(
        &self,
        spreadsheet_id: &str,
        headers: &[String],
        sheet: &str,
    ) -> Result<(), FormyChatError> {
        let sheet_id = self.get_or_create_sheet(spreadsheet_id, sheet).await?;

        if let Err(e) = self.clear_sheet(spreadsheet_id, sheet).await {
            warn!(spreadsheet_id, error = %e, "Clearing sheet rows failed; continuing setup");
        }

        self.set_headers(spreadsheet_id, headers, sheet).await?;
        let columns = u32::try_from(headers.len()).unwrap_or(u32::MAX);
        self.apply_basic_filter(spreadsheet_id, columns, sheet_id)
            .await?;
        Ok(())
    }

    /// Appends rows after the last non-empty row. No request is made for an empty batch.
    pub async fn append_rows(
        &self,
        spreadsheet_id: &str,
        rows: Vec<Vec<Value>>,
        sheet: &str,
    ) -> Result<AppendValuesResponse, FormyChatError> {
        if rows.is_empty() {
            return Ok(AppendValuesResponse::default());
        }
        let range = format!("{sheet}!A:A:append");
        let mut url = self.sheets_url(&[spreadsheet_id, "values", range.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = ValueRange::from_rows(rows);
        self.make_request(Method::POST, url, Some(&body)).await
    }

    /// Clears everything below the header row.
    pub async fn clear_sheet(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
    ) -> Result<ClearValuesResponse, FormyChatError> {
        let range = format!("{sheet}!A2:ZZ:clear");
        let url = self.sheets_url(&[spreadsheet_id, "values", range.as_str()])?;
        self.make_request(Method::POST, url, Some(&serde_json::json!({})))
            .await
    }
}

fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, SheetsError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| SheetsError::InvalidBaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_joined_under_the_base_path() {
        let base = Url::parse("https://sheets.googleapis.com/v4/spreadsheets/").unwrap();
        let url = join_segments(&base, &["abc", "values", "My Leads!A:A:append"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/My%20Leads!A:A:append"
        );
    }

    #[test]
    fn batch_update_action_stays_in_one_segment() {
        let base = Url::parse("http://127.0.0.1:9/v4/spreadsheets").unwrap();
        let url = join_segments(&base, &["abc:batchUpdate"]).unwrap();
        assert_eq!(url.path(), "/v4/spreadsheets/abc:batchUpdate");
    }

    #[test]
    fn cannot_be_a_base_is_rejected() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        assert!(matches!(
            join_segments(&base, &["x"]),
            Err(SheetsError::InvalidBaseUrl(_))
        ));
    }
}
