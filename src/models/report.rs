use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct ReportQuery {
    pub metrics: Vec<String>,
    pub dimensions: Vec<String>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Account resource name, e.g. `accounts/pub-1234`. The first account
    /// visible to the credentials is used when unset.
    pub account: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportHeader {
    pub name: String,
    pub currency_code: Option<String>,
}

impl ReportHeader {
    /// Column title, with the currency appended as `NAME (CUR)` when set.
    pub fn title(&self) -> String {
        match self.currency_code.as_deref() {
            Some(currency) if !currency.is_empty() => format!("{} ({})", self.name, currency),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReportResult {
    pub headers: Vec<ReportHeader>,
    pub rows: Vec<Vec<String>>,
}
