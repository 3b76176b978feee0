use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{CellUpdate, SheetRef, TabularSource};
use crate::core::config::settings::SheetsSettings;
use crate::core::errors::ApiError;
use crate::pipeline::types::Row;

/// Google Sheets v4 REST adapter. The access token is passed through as a
/// bearer header verbatim; obtaining and refreshing it is out of scope.
#[derive(Clone)]
pub struct GoogleSheetsClient {
    base_url: String,
    access_token: String,
    client: Client,
}

impl GoogleSheetsClient {
    pub fn new(settings: &SheetsSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("failed to build Sheets HTTP client")?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token: settings.access_token.clone(),
            client,
        })
    }

    fn values_url(&self, sheet: &SheetRef, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url,
            sheet.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    async fn get_values(&self, sheet: &SheetRef, range: &str) -> Result<Vec<Vec<String>>, ApiError> {
        let res = self
            .client
            .get(self.values_url(sheet, range))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Sheets values.get returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        Ok(parse_values(&payload))
    }
}

/// The API omits trailing empty cells; map what is present and pad with
/// empty strings at the accessor side.
fn parse_values(payload: &Value) -> Vec<Vec<String>> {
    payload["values"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| {
                            cells
                                .iter()
                                .map(|cell| cell.as_str().unwrap_or_default().to_string())
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Data rows start at sheet row 2; column A is the requirement, column B an
/// optional draft answer.
fn rows_from_values(values: Vec<Vec<String>>) -> Vec<Row> {
    values
        .into_iter()
        .enumerate()
        .map(|(offset, cells)| {
            let requirement = cells.first().cloned().unwrap_or_default();
            let draft = cells.get(1).cloned().filter(|d| !d.is_empty());
            Row {
                position: offset + 2,
                requirement,
                draft,
            }
        })
        .collect()
}

#[async_trait]
impl TabularSource for GoogleSheetsClient {
    async fn read_header(&self, sheet: &SheetRef) -> Result<Vec<String>, ApiError> {
        let range = format!("'{}'!1:1", sheet.sheet_name);
        let mut values = self.get_values(sheet, &range).await?;
        Ok(if values.is_empty() {
            vec![]
        } else {
            values.remove(0)
        })
    }

    async fn write_header(&self, sheet: &SheetRef, header: &[String]) -> Result<(), ApiError> {
        let range = format!("'{}'!1:1", sheet.sheet_name);
        let url = format!("{}?valueInputOption=RAW", self.values_url(sheet, &range));

        let body = json!({ "values": [header] });

        let res = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Sheets values.update returned {}: {}",
                status, text
            )));
        }

        Ok(())
    }

    async fn fetch_rows(&self, sheet: &SheetRef) -> Result<Vec<Row>, ApiError> {
        let range = format!("'{}'!A2:B", sheet.sheet_name);
        let values = self.get_values(sheet, &range).await?;
        Ok(rows_from_values(values))
    }

    async fn write_cells(&self, sheet: &SheetRef, updates: &[CellUpdate]) -> Result<(), ApiError> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values:batchUpdate",
            self.base_url, sheet.spreadsheet_id
        );

        let data: Vec<Value> = updates
            .iter()
            .map(|update| {
                json!({
                    "range": update.range,
                    "majorDimension": "ROWS",
                    "values": [[update.value]],
                })
            })
            .collect();

        let body = json!({
            "valueInputOption": "RAW",
            "data": data,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Sheets values.batchUpdate returned {}: {}",
                status, text
            )));
        }

        Ok(())
    }
}
