//! Remote store access and reconciliation.

pub mod reconcile;
pub mod store;

pub use reconcile::{ReconcilePolicy, Reconciler};
pub use store::{NotamStore, RestStore, StoreError};
