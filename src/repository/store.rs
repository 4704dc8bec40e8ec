//! Remote store access.
//!
//! The map frontend reads a `notams` table from a hosted PostgREST-style
//! API. The store is modeled as a trait so the reconciler and tests are
//! independent of the transport; the production implementation speaks the
//! REST dialect with key + bearer headers and `on_conflict` upserts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::StoreSettings;
use crate::models::NotamRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid store endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// Tabular store keyed by `notam_id`.
#[async_trait]
pub trait NotamStore: Send + Sync {
    /// Insert-or-update one batch of records by natural key.
    async fn upsert(&self, records: &[NotamRecord]) -> Result<(), StoreError>;

    /// Remove every row in the collection.
    async fn delete_all(&self) -> Result<(), StoreError>;
}

/// PostgREST-style REST client for the hosted store.
pub struct RestStore {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl RestStore {
    pub fn new(settings: &StoreSettings) -> Result<Self, StoreError> {
        let base = Url::parse(&settings.url)?;
        let endpoint = base.join(&format!("rest/v1/{}", settings.table))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: settings.api_key.clone(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<(), StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl NotamStore for RestStore {
    async fn upsert(&self, records: &[NotamRecord]) -> Result<(), StoreError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("on_conflict", "notam_id");

        debug!(batch = records.len(), "upserting batch");
        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records)
            .send()
            .await?;

        Self::check(response).await
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        // PostgREST refuses an unfiltered delete; a tautological filter on
        // the key column clears the table.
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("notam_id", "not.is.null");

        debug!("clearing collection");
        let response = self
            .client
            .delete(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        Self::check(response).await
    }
}
