//! Store reconciliation.
//!
//! After a run the remote `notams` collection should reflect the merged
//! dataset. Two disciplines exist: full replace (clear, then insert, with a
//! brief empty window visible to readers) and upsert-by-key (no empty
//! window, but notices that expired source-side linger until a replace run).
//! The policy is fixed from configuration for the whole run; the default is
//! upsert.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::models::NotamRecord;
use crate::repository::store::{NotamStore, StoreError};

/// Which write discipline a run uses against the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilePolicy {
    /// Upsert by natural key, never deleting. Readers never see an empty
    /// table; stale rows may linger.
    #[default]
    Upsert,
    /// Delete everything, then insert. Exact mirror of the source at the
    /// cost of a brief empty window.
    Replace,
}

impl std::fmt::Display for ReconcilePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upsert => write!(f, "upsert"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

impl std::str::FromStr for ReconcilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upsert" => Ok(Self::Upsert),
            "replace" => Ok(Self::Replace),
            other => Err(format!(
                "invalid reconcile policy '{other}'. Valid options: upsert, replace"
            )),
        }
    }
}

/// Pushes a merged record set to the store in bounded batches.
pub struct Reconciler {
    policy: ReconcilePolicy,
    batch_size: usize,
}

impl Reconciler {
    pub fn new(policy: ReconcilePolicy, batch_size: usize) -> Self {
        Self {
            policy,
            batch_size: batch_size.max(1),
        }
    }

    /// Synchronize `records` into the store. Returns the number of batches
    /// written. Any batch failure is returned to the caller; batches already
    /// committed stay committed (no cross-batch transaction).
    pub async fn reconcile(
        &self,
        store: &dyn NotamStore,
        records: &[NotamRecord],
    ) -> Result<usize, StoreError> {
        if records.is_empty() {
            info!("no records to reconcile");
            return Ok(0);
        }

        if self.policy == ReconcilePolicy::Replace {
            info!("replace policy: clearing collection before insert");
            store.delete_all().await?;
        }

        let total_batches = records.len().div_ceil(self.batch_size);
        let mut written = 0;

        for (index, chunk) in records.chunks(self.batch_size).enumerate() {
            if let Err(e) = store.upsert(chunk).await {
                error!(
                    "batch {}/{} failed with {} batch(es) already committed: {}",
                    index + 1,
                    total_batches,
                    written,
                    e
                );
                return Err(e);
            }
            written += 1;
            debug!(batch = index + 1, total = total_batches, rows = chunk.len(), "batch written");
        }

        info!(records = records.len(), batches = written, policy = %self.policy, "reconciliation complete");
        Ok(written)
    }
}
