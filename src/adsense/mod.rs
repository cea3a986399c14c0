mod auth;
mod callback;
mod client;
mod token;
mod types;

pub use client::AdSenseClient;

use crate::error::Result;
use crate::models::{ReportQuery, ReportResult};

use async_trait::async_trait;

#[async_trait]
pub trait ReportOperations {
    async fn generate(&self, query: &ReportQuery) -> Result<ReportResult>;
}
