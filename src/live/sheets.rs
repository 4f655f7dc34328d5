use crate::error::{ReportError, Result, SinkError};
use crate::live::auth::ServiceAccountAuthenticator;
use crate::live::types::*;
use crate::schema::{SheetTab, UpdatedRange};
use crate::sink::SpreadsheetSink;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode, Url};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";
const USER_ENTERED: &str = "USER_ENTERED";
/// Tab ids, titles and grid sizes; the grid size bounds the stale-row clear.
const METADATA_FIELDS: &str = "sheets.properties(sheetId,title,gridProperties(rowCount,columnCount))";

pub struct SheetsClient {
    client: Client,
    auth: ServiceAccountAuthenticator,
    base_url: String,
}

impl SheetsClient {
    pub fn new(auth: ServiceAccountAuthenticator) -> Self {
        Self {
            client: Client::new(),
            auth,
            base_url: SHEETS_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `{base}/spreadsheets/{id}/values/{range}{suffix}`, with the range percent-encoded.
    pub fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ReportError::Configuration(format!("Invalid Sheets URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| {
                ReportError::Configuration(format!("Invalid Sheets URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .push("spreadsheets")
            .push(spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", range, suffix));

        Ok(url)
    }

}

/// Renders a non-2xx Google response, preferring the JSON error envelope over the raw body.
pub fn google_error_message(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<GoogleErrorBody>(body)
        .map(|body| match body.error.status {
            Some(code) => format!("{} {}", code, body.error.message),
            None => body.error.message,
        })
        .unwrap_or_else(|_| body.trim().to_string());

    format!("status {}: {}", status, message)
}

pub fn metadata_error(status: StatusCode, body: &str) -> ReportError {
    SinkError::Metadata(google_error_message(status, body)).into()
}

pub fn write_error(status: StatusCode, body: &str) -> ReportError {
    SinkError::WriteRejected(google_error_message(status, body)).into()
}

/// Query for a values update: cells are parsed as if typed into the sheet.
pub fn update_query() -> [(&'static str, &'static str); 1] {
    [("valueInputOption", USER_ENTERED)]
}

#[async_trait]
impl SpreadsheetSink for SheetsClient {
    async fn sheet_tabs(&self, spreadsheet_id: &str) -> Result<Vec<SheetTab>> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/spreadsheets/{}", self.base_url, spreadsheet_id);
        debug!("Sheets GET {}", url);

        let res = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("fields", METADATA_FIELDS)])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(metadata_error(status, &res.text().await?));
        }

        let metadata: SpreadsheetMetadata = res.json().await?;
        Ok(metadata.into())
    }

    async fn overwrite_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<UpdatedRange> {
        let token = self.auth.access_token().await?;
        let url = self.values_url(spreadsheet_id, range, "")?;
        debug!("Sheets PUT {} ({} rows)", url, values.len());

        let body = ValueRange {
            range,
            major_dimension: "ROWS",
            values: &values,
        };

        let res = self
            .client
            .put(url)
            .bearer_auth(token)
            .query(&update_query())
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(write_error(status, &res.text().await?));
        }

        let response: UpdateValuesResponse = res.json().await?;
        Ok(response.into())
    }

    async fn clear_range(&self, spreadsheet_id: &str, range: &str) -> Result<()> {
        let token = self.auth.access_token().await?;
        let url = self.values_url(spreadsheet_id, range, ":clear")?;
        debug!("Sheets POST {}", url);

        let res = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(write_error(status, &res.text().await?));
        }

        Ok(())
    }
}
