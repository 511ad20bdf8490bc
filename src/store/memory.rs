//! In-memory reference implementation of the storage interface.
//!
//! Keeps every record in process-local maps behind a single `RwLock`, so a
//! commit is atomic across the page row, the snapshot log, and the
//! contributor aggregate. Useful for tests and as the model for real
//! backends: the compare-and-swap check in [`MemoryStore::commit`] is
//! exactly the guard a database backend must enforce inside its
//! transaction.

use super::{Commit, CommitGuard, Storage};
use crate::error::{Result, WeaveError};
use crate::types::{Contributor, HistorySnapshot, Page};
use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct StoreInner {
    /// Page id → current page state
    pages: HashMap<String, Page>,
    /// Snapshot id → snapshot
    snapshots: HashMap<String, HistorySnapshot>,
    /// (page id, contributor id) → aggregate
    contributors: HashMap<(String, String), Contributor>,
}

/// Thread-safe in-memory page store.
///
/// Cloning creates a new handle to the same underlying maps, so clones can
/// be handed to different tasks and all see the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots recorded for a page.
    pub fn snapshot_count(&self, page_id: &str) -> usize {
        let inner = self.inner.read();
        inner
            .snapshots
            .values()
            .filter(|snapshot| snapshot.page_id == page_id)
            .count()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn load_page(&self, page_id: &str) -> Result<Page> {
        let inner = self.inner.read();
        inner
            .pages
            .get(page_id)
            .cloned()
            .ok_or_else(|| WeaveError::NotFound {
                entity: "page",
                id: page_id.to_string(),
            })
    }

    async fn load_snapshot(&self, snapshot_id: &str) -> Result<HistorySnapshot> {
        let inner = self.inner.read();
        inner
            .snapshots
            .get(snapshot_id)
            .cloned()
            .ok_or_else(|| WeaveError::NotFound {
                entity: "snapshot",
                id: snapshot_id.to_string(),
            })
    }

    async fn load_snapshot_at(&self, page_id: &str, version: u64) -> Result<HistorySnapshot> {
        let inner = self.inner.read();
        inner
            .snapshots
            .values()
            .find(|snapshot| snapshot.page_id == page_id && snapshot.version == version)
            .cloned()
            .ok_or_else(|| WeaveError::NotFound {
                entity: "snapshot",
                id: format!("{}@v{}", page_id, version),
            })
    }

    async fn load_latest_snapshot(&self, page_id: &str) -> Result<HistorySnapshot> {
        let inner = self.inner.read();
        inner
            .snapshots
            .values()
            .filter(|snapshot| snapshot.page_id == page_id)
            .max_by_key(|snapshot| snapshot.version)
            .cloned()
            .ok_or_else(|| WeaveError::NotFound {
                entity: "snapshot",
                id: page_id.to_string(),
            })
    }

    async fn load_contributor(
        &self,
        page_id: &str,
        contributor_id: &str,
    ) -> Result<Option<Contributor>> {
        let inner = self.inner.read();
        Ok(inner
            .contributors
            .get(&(page_id.to_string(), contributor_id.to_string()))
            .cloned())
    }

    async fn commit(&self, commit: Commit) -> Result<()> {
        let mut inner = self.inner.write();

        match commit.guard {
            CommitGuard::Create => {
                if inner.pages.contains_key(&commit.page.id) {
                    return Err(WeaveError::Storage(anyhow!(
                        "page already exists: {}",
                        commit.page.id
                    )));
                }
            }
            CommitGuard::Expect(expected) => {
                let current =
                    inner
                        .pages
                        .get(&commit.page.id)
                        .ok_or_else(|| WeaveError::NotFound {
                            entity: "page",
                            id: commit.page.id.clone(),
                        })?;
                if current.version != expected {
                    return Err(WeaveError::StaleVersion {
                        expected,
                        found: current.version,
                    });
                }
            }
        }

        let contributor_key = (
            commit.contributor.page_id.clone(),
            commit.contributor.contributor.id.clone(),
        );
        inner.pages.insert(commit.page.id.clone(), commit.page);
        inner
            .snapshots
            .insert(commit.snapshot.id.clone(), commit.snapshot);
        inner.contributors.insert(contributor_key, commit.contributor);

        Ok(())
    }
}
