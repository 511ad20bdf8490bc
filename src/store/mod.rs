//! Storage collaborator interface.
//!
//! The versioning core is storage-agnostic: it loads and commits records
//! through the [`Storage`] trait and never talks to a database directly.
//! Backends implement five lookups and one commit; everything else — merge
//! decisions, version bookkeeping, contributor accounting — stays in the
//! service layer.
//!
//! # Commit Semantics
//!
//! [`Storage::commit`] writes the page row, appends the history snapshot,
//! and upserts the contributor aggregate. The write is guarded:
//!
//! - [`CommitGuard::Create`] — the page must not exist yet.
//! - [`CommitGuard::Expect`] — the persisted page version must still equal
//!   the version the service read (optimistic locking); otherwise the
//!   backend returns [`WeaveError::StaleVersion`](crate::WeaveError) and the
//!   service retries from a fresh load.
//!
//! Backends should make the three writes atomic. If a backend cannot, it
//! must apply them in order — page, then snapshot, then contributor — and
//! accept that a crash mid-commit leaves the page ahead of its snapshot log
//! for external repair tooling to reconcile.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{Contributor, HistorySnapshot, Page};
use async_trait::async_trait;

/// Existence condition a commit is predicated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitGuard {
    /// The page must not exist yet (page creation).
    Create,
    /// The persisted page version must equal this value (compare-and-swap).
    Expect(u64),
}

/// One atomic write: page row, snapshot append, contributor upsert.
#[derive(Debug, Clone)]
pub struct Commit {
    /// Condition checked before anything is written.
    pub guard: CommitGuard,
    /// New page state.
    pub page: Page,
    /// Snapshot to append to the page's history.
    pub snapshot: HistorySnapshot,
    /// Contributor aggregate to insert or overwrite.
    pub contributor: Contributor,
}

/// The persistence interface the versioning service runs against.
///
/// All lookups return `NotFound` for missing records rather than `Option`,
/// except [`load_contributor`](Storage::load_contributor): a contributor's
/// first write legitimately finds no aggregate yet.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the current state of a page.
    async fn load_page(&self, page_id: &str) -> Result<Page>;

    /// Fetch a history snapshot by its own id.
    async fn load_snapshot(&self, snapshot_id: &str) -> Result<HistorySnapshot>;

    /// Fetch the snapshot a page had at a specific version.
    async fn load_snapshot_at(&self, page_id: &str, version: u64) -> Result<HistorySnapshot>;

    /// Fetch the most recent snapshot of a page.
    async fn load_latest_snapshot(&self, page_id: &str) -> Result<HistorySnapshot>;

    /// Fetch a contributor aggregate, if the contributor has written before.
    async fn load_contributor(
        &self,
        page_id: &str,
        contributor_id: &str,
    ) -> Result<Option<Contributor>>;

    /// Apply one guarded write of page + snapshot + contributor.
    async fn commit(&self, commit: Commit) -> Result<()>;
}
