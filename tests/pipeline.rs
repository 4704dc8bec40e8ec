//! Merge-and-reconcile pipeline tests.
//!
//! Exercises the path from captured page artifacts to store contents,
//! against an in-memory ledger standing in for the remote collection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use notamsync::models::NotamRecord;
use notamsync::repository::{NotamStore, ReconcilePolicy, Reconciler, StoreError};
use notamsync::services::merge_artifacts;

/// Ledger store: remembers rows by natural key and every batch size seen.
#[derive(Default)]
struct LedgerStore {
    rows: Mutex<HashMap<String, NotamRecord>>,
    batch_sizes: Mutex<Vec<usize>>,
}

#[async_trait]
impl NotamStore for LedgerStore {
    async fn upsert(&self, records: &[NotamRecord]) -> Result<(), StoreError> {
        self.batch_sizes.lock().unwrap().push(records.len());
        let mut rows = self.rows.lock().unwrap();
        for record in records {
            rows.insert(record.notam_id.clone(), record.clone());
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.rows.lock().unwrap().clear();
        Ok(())
    }
}

fn write_artifact(dir: &Path, page: u32, rows: &[(&str, &str)]) -> PathBuf {
    let mut body = String::from(
        "<html><body><table>\
         <tr><th>NOTAM No</th><th>E) TEXT</th>\
         <th>Start Date(UTC)</th><th>End Date(UTC)</th></tr>",
    );
    for (id, content) in rows {
        body.push_str(&format!(
            "<tr><td>{id}</td><td>{content}</td>\
             <td>2026-01-01 00:00</td><td>2026-06-01 00:00</td></tr>"
        ));
    }
    body.push_str("</table></body></html>");

    let path = dir.join(format!("page_{page}_notam_list.xls"));
    std::fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn merged_pages_land_in_the_store_deduplicated() {
    let dir = TempDir::new().unwrap();
    let page1 = write_artifact(
        dir.path(),
        1,
        &[
            ("A0001/26", "OBST LGT U/S 3726N12706E"),
            ("A0002/26", "TWY B CLSD"),
        ],
    );
    // Page 2 re-shows A0002/26: pagination desync corrected at merge time.
    let page2 = write_artifact(
        dir.path(),
        2,
        &[
            ("A0002/26", "TWY B CLSD (REPEATED)"),
            ("B0100/26", "AIRSPACE RESTRICTED 3300S15100E"),
        ],
    );

    let merged = merge_artifacts(&[page1, page2]);
    assert_eq!(merged.records.len(), 3);
    assert_eq!(merged.duplicates_dropped, 1);

    let store = LedgerStore::default();
    let reconciler = Reconciler::new(ReconcilePolicy::Upsert, 2);
    let batches = reconciler.reconcile(&store, &merged.records).await.unwrap();
    assert_eq!(batches, 2);
    assert_eq!(store.batch_sizes.lock().unwrap().as_slice(), [2, 1]);

    let rows = store.rows.lock().unwrap();
    assert_eq!(rows.len(), 3);

    // First-seen body wins for the duplicated key.
    assert_eq!(rows["A0002/26"].content, "TWY B CLSD");

    // Coordinates derived during projection survive the round trip.
    let northern = &rows["A0001/26"];
    assert!((northern.latitude - (37.0 + 26.0 / 60.0)).abs() < 1e-9);
    assert!((northern.longitude - (127.0 + 6.0 / 60.0)).abs() < 1e-9);

    let southern = &rows["B0100/26"];
    assert!(southern.latitude < 0.0);
    assert!(southern.longitude > 0.0);

    // No coordinate token on A0002/26: fallback location, not a dropped row.
    assert!((rows["A0002/26"].latitude - 37.5665).abs() < 1e-9);
}

#[tokio::test]
async fn corrupt_middle_page_does_not_poison_the_run() {
    let dir = TempDir::new().unwrap();
    let page1 = write_artifact(dir.path(), 1, &[("A0001/26", "ONE")]);
    let corrupt = dir.path().join("page_2_notam_list.xls");
    std::fs::write(&corrupt, "<<< truncated download >>>").unwrap();
    let page3 = write_artifact(dir.path(), 3, &[("C0003/26", "THREE")]);

    let merged = merge_artifacts(&[page1, corrupt, page3]);
    assert_eq!(merged.artifacts_used, 2);
    assert_eq!(merged.artifacts_skipped, 1);

    let store = LedgerStore::default();
    let reconciler = Reconciler::new(ReconcilePolicy::Upsert, 100);
    reconciler.reconcile(&store, &merged.records).await.unwrap();

    let rows = store.rows.lock().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.contains_key("A0001/26"));
    assert!(rows.contains_key("C0003/26"));
}

#[tokio::test]
async fn replace_policy_mirrors_the_source_exactly() {
    let dir = TempDir::new().unwrap();
    let page1 = write_artifact(dir.path(), 1, &[("A0001/26", "CURRENT")]);

    let store = LedgerStore::default();
    // A previous run left an expired notice behind.
    store
        .upsert(&[NotamRecord {
            notam_id: "Z9999/24".to_string(),
            series: "Z".to_string(),
            content: "EXPIRED".to_string(),
            latitude: 37.5665,
            longitude: 126.978,
            start_date: String::new(),
            end_date: String::new(),
        }])
        .await
        .unwrap();

    let merged = merge_artifacts(&[page1]);
    let reconciler = Reconciler::new(ReconcilePolicy::Replace, 100);
    reconciler.reconcile(&store, &merged.records).await.unwrap();

    let rows = store.rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows.contains_key("A0001/26"));
    assert!(!rows.contains_key("Z9999/24"));
}
