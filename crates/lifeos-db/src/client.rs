//! PostgREST client over reqwest.
//!
//! Supabase exposes tables under `/rest/v1/<table>` with `eq.`-style query
//! filters. This client keeps one process-wide instance; every method is
//! idempotent at the key level so queue redelivery stays safe.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::retry::{with_retry, RetryConfig};

/// Supabase client configuration.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Service role or anon key
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retry policy for transient errors
    pub retry: RetryConfig,
}

impl SupabaseConfig {
    /// Create config from environment variables. Both values are required;
    /// a missing one is fatal for the process at startup.
    pub fn from_env() -> DbResult<Self> {
        Ok(Self {
            url: std::env::var("SUPABASE_URL")
                .map_err(|_| DbError::config_error("SUPABASE_URL not set"))?,
            api_key: std::env::var("SUPABASE_KEY")
                .map_err(|_| DbError::config_error("SUPABASE_KEY not set"))?,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        })
    }
}

/// PostgREST client.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl SupabaseClient {
    /// Create a new client.
    pub fn new(config: SupabaseConfig) -> DbResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DbError::Network)?;

        Ok(Self {
            http,
            base_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            api_key: config.api_key,
            retry: config.retry,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> DbResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    /// Select rows matching `eq.`-filters, with optional ordering and paging.
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        order: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> DbResult<Vec<T>> {
        let url = self.table_url(table);

        with_retry(&self.retry, "select", || async {
            let mut request = self
                .http
                .get(&url)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .query(&[("select", "*")]);

            for (column, value) in filters {
                request = request.query(&[(*column, format!("eq.{}", value))]);
            }
            if let Some(order) = order {
                request = request.query(&[("order", order)]);
            }
            if let Some(limit) = limit {
                request = request.query(&[("limit", limit.to_string())]);
            }
            if let Some(offset) = offset {
                request = request.query(&[("offset", offset.to_string())]);
            }

            let response = request.send().await?;
            Self::parse_rows(response).await
        })
        .await
    }

    /// Insert one row, returning the stored representation.
    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> DbResult<T> {
        let url = self.table_url(table);

        let rows: Vec<T> = with_retry(&self.retry, "insert", || async {
            let response = self
                .http
                .post(&url)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .header("Prefer", "return=representation")
                .json(body)
                .send()
                .await?;
            Self::parse_rows(response).await
        })
        .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DbError::request_failed(format!("insert into {} returned no row", table)))
    }

    /// Update rows matching `eq.`-filters.
    pub async fn update<B: Serialize>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        body: &B,
    ) -> DbResult<u32> {
        let url = self.table_url(table);

        let rows: Vec<serde_json::Value> = with_retry(&self.retry, "update", || async {
            let mut request = self
                .http
                .patch(&url)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .header("Prefer", "return=representation")
                .json(body);

            for (column, value) in filters {
                request = request.query(&[(*column, format!("eq.{}", value))]);
            }

            let response = request.send().await?;
            Self::parse_rows(response).await
        })
        .await?;

        Ok(rows.len() as u32)
    }

    /// Delete rows matching `eq.`-filters, returning the deleted count.
    pub async fn delete(&self, table: &str, filters: &[(&str, String)]) -> DbResult<u32> {
        let url = self.table_url(table);

        let rows: Vec<serde_json::Value> = with_retry(&self.retry, "delete", || async {
            let mut request = self
                .http
                .delete(&url)
                .header("apikey", &self.api_key)
                .bearer_auth(&self.api_key)
                .header("Prefer", "return=representation");

            for (column, value) in filters {
                request = request.query(&[(*column, format!("eq.{}", value))]);
            }

            let response = request.send().await?;
            Self::parse_rows(response).await
        })
        .await?;

        debug!(table, count = rows.len(), "Deleted rows");
        Ok(rows.len() as u32)
    }

    async fn parse_rows<T: DeserializeOwned>(response: reqwest::Response) -> DbResult<Vec<T>> {
        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED => {
                let rows: Vec<T> = response.json().await?;
                Ok(rows)
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(DbError::from_http_status(status.as_u16(), body))
            }
        }
    }
}
