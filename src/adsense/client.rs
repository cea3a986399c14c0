use super::ReportOperations;
use crate::adsense::auth::{GoogleAuth, get_valid_token};
use crate::adsense::token::TokenStore;
use crate::adsense::types::{AccountsResponse, ReportResponse};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ReportQuery, ReportResult};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

const API_BASE_URL: &str = "https://adsense.googleapis.com/v2";

pub struct AdSenseClient {
    client: Client,
    access_token: String,
    api_base_url: String,
}

impl AdSenseClient {
    /// Create a new AdSenseClient with authenticated access
    ///
    /// Uses the cached token when it is still usable, otherwise refreshes it
    /// or runs the interactive authorization flow.
    pub async fn new(config: &Config, force_auth: bool) -> Result<Self> {
        let credentials = config.load_credentials()?;
        let auth = GoogleAuth::new(&credentials)?;
        let store = TokenStore::new(config.token_cache_file());
        let token = get_valid_token(&auth, &store, force_auth).await?;

        Ok(Self::with_token(
            auth.http_client(),
            token.access_token,
            API_BASE_URL,
        ))
    }

    fn with_token(client: Client, access_token: String, api_base_url: &str) -> Self {
        Self {
            client,
            access_token,
            api_base_url: api_base_url.to_string(),
        }
    }

    /// First account visible to the credentials.
    #[instrument(name = "Fetching default account", skip_all)]
    async fn default_account(&self) -> Result<String> {
        let url = format!("{}/accounts", self.api_base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Report(format!(
                "Failed to list accounts: {} - {}",
                status, body
            )));
        }

        let accounts: AccountsResponse = response.json().await?;
        if accounts.accounts.len() > 1 {
            warn!(
                count = accounts.accounts.len(),
                "Several accounts available, using the first; pass --account to choose"
            );
        }

        let account = accounts
            .accounts
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Report("No AdSense account found".to_string()))?;
        debug!(account = %account.name, display_name = ?account.display_name, "Using account");

        Ok(account.name)
    }
}

fn date_params(prefix: &str, date: NaiveDate) -> [(String, String); 3] {
    [
        (format!("{}.year", prefix), date.year().to_string()),
        (format!("{}.month", prefix), date.month().to_string()),
        (format!("{}.day", prefix), date.day().to_string()),
    ]
}

fn report_params(query: &ReportQuery) -> Vec<(String, String)> {
    let mut params = vec![("dateRange".to_string(), "CUSTOM".to_string())];
    params.extend(date_params("startDate", query.from));
    params.extend(date_params("endDate", query.to));
    params.extend(query.metrics.iter().map(|m| ("metrics".to_string(), m.clone())));
    params.extend(
        query
            .dimensions
            .iter()
            .map(|d| ("dimensions".to_string(), d.clone())),
    );
    params.push((
        "reportingTimeZone".to_string(),
        "ACCOUNT_TIME_ZONE".to_string(),
    ));
    params
}

#[async_trait]
impl ReportOperations for AdSenseClient {
    #[instrument(name = "Generating report", skip_all, fields(from = %query.from, to = %query.to))]
    async fn generate(&self, query: &ReportQuery) -> Result<ReportResult> {
        let account = match &query.account {
            Some(account) => account.clone(),
            None => self.default_account().await?,
        };
        let url = format!("{}/{}/reports:generate", self.api_base_url, account);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&report_params(query))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Report(format!(
                "Failed to generate report: {} - {}",
                status, body
            )));
        }

        let report: ReportResponse = response.json().await?;
        for warning in &report.warnings {
            warn!("AdSense: {}", warning);
        }
        info!(rows = report.rows.len(), "Report generated");

        Ok(report.into())
    }
}
