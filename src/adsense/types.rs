use crate::models::{ReportHeader, ReportResult};
use serde::Deserialize;

// https://developers.google.com/adsense/management/reference/rest/v2/accounts/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AccountsResponse {
    #[serde(default)]
    pub(super) accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Resource name, `accounts/pub-...`
    pub name: String,
    pub display_name: Option<String>,
}

// https://developers.google.com/adsense/management/reference/rest/v2/ReportResult
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReportResponse {
    #[serde(default)]
    pub(super) headers: Vec<Header>,
    #[serde(default)]
    pub(super) rows: Vec<Row>,
    #[serde(default)]
    pub(super) warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub name: String,
    pub currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub cells: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub value: String,
}

impl From<ReportResponse> for ReportResult {
    fn from(response: ReportResponse) -> Self {
        ReportResult {
            headers: response
                .headers
                .into_iter()
                .map(|h| ReportHeader {
                    name: h.name,
                    currency_code: h.currency_code,
                })
                .collect(),
            rows: response
                .rows
                .into_iter()
                .map(|row| row.cells.into_iter().map(|cell| cell.value).collect())
                .collect(),
        }
    }
}
