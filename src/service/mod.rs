//! Optimistic versioning service: the write path.
//!
//! Orchestrates every write against a page: loading current state, deciding
//! between the fast path and the merge path, computing change statistics,
//! and committing the page row, the immutable history snapshot, and the
//! contributor aggregate in one guarded write.
//!
//! # Write Pipeline
//!
//! Every edit request carries the version its author last read
//! (`base_version`). The pipeline:
//!
//! 1. Load the current page, the snapshot at `base_version`, and the latest
//!    snapshot.
//! 2. **Fast path** — the page is still at `base_version`: the request
//!    content is used verbatim.
//! 3. **Merge path** — the page advanced: run the three-way merge with
//!    ancestor = base snapshot, mine = request, theirs = current page. A
//!    true conflict rejects the whole write with no state change.
//! 4. Diff the final body against the pre-write body for character counts,
//!    content hash, size, and tag set differences.
//! 5. Commit with a compare-and-swap on the page version. Losing the race
//!    retries the whole pipeline from a fresh load, a bounded number of
//!    times.
//!
//! Deletion is an edit that clears body and tags (and is still subject to
//! merge conflicts). Revert bypasses the merge engine entirely and fast-
//! forwards an old snapshot's content onto the tip as a new version.
//!
//! # Examples
//!
//! ```ignore
//! use pageweave::{Author, CreateRequest, MemoryStore, PageService, UpdateRequest};
//!
//! let service = PageService::new(MemoryStore::new());
//! let author = Author::new("u1", "Alice", "alice@example.com");
//!
//! let created = service.create(CreateRequest {
//!     title: "Home".to_string(),
//!     body: "Welcome".to_string(),
//!     tags: vec![],
//!     author: author.clone(),
//! }).await?;
//!
//! let updated = service.update(&created.page.id, UpdateRequest {
//!     title: "Home".to_string(),
//!     body: "Welcome!".to_string(),
//!     tags: vec![],
//!     message: "punctuation".to_string(),
//!     base_version: created.page.version,
//!     author,
//!     is_minor: true,
//! }).await?;
//! assert_eq!(updated.page.version, 2);
//! ```

use crate::diff::{self, partition_by_line, EditOp, LineChanges};
use crate::error::{Result, WeaveError};
use crate::merge;
use crate::store::{Commit, CommitGuard, Storage};
use crate::types::{Author, ChangeKind, Contributor, HistorySnapshot, Page, PageContent};
use std::time::SystemTime;
use tracing::{debug, warn};
use uuid::Uuid;

/// Tuning knobs for the service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// How many times a write is attempted when commits keep losing the
    /// version race. The first attempt counts.
    pub max_commit_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            max_commit_attempts: 3,
        }
    }
}

/// A page-creation request.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Initial title.
    pub title: String,
    /// Initial body.
    pub body: String,
    /// Initial tags.
    pub tags: Vec<String>,
    /// Who is creating the page.
    pub author: Author,
}

/// An edit request against a page the author read at `base_version`.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// New title.
    pub title: String,
    /// New body.
    pub body: String,
    /// New tags.
    pub tags: Vec<String>,
    /// Free-text change message recorded on the snapshot.
    pub message: String,
    /// The version the author last read.
    pub base_version: u64,
    /// Who is editing.
    pub author: Author,
    /// Whether the author marked this edit as minor.
    pub is_minor: bool,
}

/// A logical-deletion request.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    /// Free-text deletion message recorded on the snapshot.
    pub message: String,
    /// The version the author last read.
    pub base_version: u64,
    /// Who is deleting.
    pub author: Author,
}

/// A request to restore an earlier version's content.
#[derive(Debug, Clone)]
pub struct RevertRequest {
    /// The version whose content should be restored.
    pub version: u64,
    /// Who is reverting.
    pub author: Author,
}

/// The records produced by a successful write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Page state after the write.
    pub page: Page,
    /// The snapshot recording the write. For a revert no-op this is the
    /// target snapshot itself.
    pub snapshot: HistorySnapshot,
    /// The contributor aggregate after the write; `None` when nothing was
    /// written (revert no-op).
    pub contributor: Option<Contributor>,
}

/// A snapshot's changes relative to the snapshot it was written on top of.
#[derive(Debug, Clone)]
pub struct SnapshotDiff {
    /// Characters added by the write.
    pub added: usize,
    /// Characters removed by the write.
    pub removed: usize,
    /// The full character-level edit script.
    pub ops: Vec<EditOp>,
    /// The script regrouped into changed lines.
    pub changed_lines: Vec<LineChanges>,
}

/// What an internal write attempt should persist.
struct WriteInput {
    content: PageContent,
    base_version: u64,
    kind: ChangeKind,
    message: String,
    author: Author,
    is_minor: bool,
}

/// Versioning service over a storage backend.
///
/// All merge decisions are deterministic and side-effect free until the
/// final commit, so a rejected write leaves no partial state behind.
pub struct PageService<S> {
    storage: S,
    config: ServiceConfig,
}

impl<S: Storage> PageService<S> {
    /// Create a service with the default configuration.
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, ServiceConfig::default())
    }

    /// Create a service with explicit tuning.
    pub fn with_config(storage: S, config: ServiceConfig) -> Self {
        PageService { storage, config }
    }

    /// Create a new page at version 1.
    pub async fn create(&self, request: CreateRequest) -> Result<WriteOutcome> {
        let now = SystemTime::now();
        let stats = diff::diff("", &request.body);

        let page = Page {
            id: Uuid::new_v4().to_string(),
            title: request.title.clone(),
            body: request.body.clone(),
            tags: request.tags.clone(),
            author: request.author.clone(),
            last_editor: request.author.clone(),
            created_at: now,
            updated_at: now,
            version: 1,
            latest_version: 1,
        };
        let snapshot = HistorySnapshot {
            id: Uuid::new_v4().to_string(),
            page_id: page.id.clone(),
            version: 1,
            title: request.title.clone(),
            body: request.body.clone(),
            tags: request.tags.clone(),
            change_kind: ChangeKind::Create,
            change_message: "Page created".to_string(),
            changed_by: request.author.clone(),
            changed_at: now,
            previous_version: None,
            parent_versions: Vec::new(),
            content_hash: diff::content_hash(&request.body),
            content_size: diff::content_size(&request.body) as u64,
            added_characters: stats.added as u64,
            removed_characters: stats.removed as u64,
            added_tags: request.tags.clone(),
            removed_tags: Vec::new(),
            is_minor: false,
        };
        let contributor = Contributor {
            id: Uuid::new_v4().to_string(),
            page_id: page.id.clone(),
            contributor: request.author.clone(),
            first_contributed_at: now,
            contributed_at: now,
            lines_added: stats.added as u64,
            lines_removed: stats.removed as u64,
        };

        self.storage
            .commit(Commit {
                guard: CommitGuard::Create,
                page: page.clone(),
                snapshot: snapshot.clone(),
                contributor: contributor.clone(),
            })
            .await?;

        debug!(page_id = %page.id, "page created");
        Ok(WriteOutcome {
            page,
            snapshot,
            contributor: Some(contributor),
        })
    }

    /// Apply an edit, merging automatically when the page has advanced past
    /// the author's base version.
    ///
    /// Fails with [`WeaveError::MergeConflict`] when the divergent edits
    /// cannot be reconciled; no state changes in that case.
    pub async fn update(&self, page_id: &str, request: UpdateRequest) -> Result<WriteOutcome> {
        let input = WriteInput {
            content: PageContent::new(request.title, request.tags, request.body),
            base_version: request.base_version,
            kind: ChangeKind::Edit,
            message: request.message,
            author: request.author,
            is_minor: request.is_minor,
        };
        self.write(page_id, input).await
    }

    /// Logically delete a page: body and tags are cleared, history kept.
    ///
    /// Deletion runs through the same pipeline as an edit, so a delete
    /// against a stale base version is still reconciled — and a concurrent
    /// modification survives it.
    pub async fn delete(&self, page_id: &str, request: DeleteRequest) -> Result<WriteOutcome> {
        let base = self
            .storage
            .load_snapshot_at(page_id, request.base_version)
            .await?;
        let input = WriteInput {
            content: PageContent::new(base.title, Vec::new(), ""),
            base_version: request.base_version,
            kind: ChangeKind::Delete,
            message: request.message,
            author: request.author,
            is_minor: false,
        };
        self.write(page_id, input).await
    }

    /// Restore an earlier version's content as a new version on the tip.
    ///
    /// No merge is involved; reverting to the version the page is already at
    /// is a no-op that returns the existing state unchanged.
    pub async fn revert(&self, page_id: &str, request: RevertRequest) -> Result<WriteOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_revert(page_id, &request).await {
                Err(WeaveError::StaleVersion { expected, found })
                    if attempt < self.config.max_commit_attempts =>
                {
                    warn!(page_id, attempt, expected, found, "revert lost the version race, retrying");
                }
                outcome => return outcome,
            }
        }
    }

    /// A snapshot's diff against the snapshot it was written on top of.
    ///
    /// The first snapshot of a page is diffed against the empty string.
    pub async fn snapshot_diff(&self, snapshot_id: &str) -> Result<SnapshotDiff> {
        let snapshot = self.storage.load_snapshot(snapshot_id).await?;
        let previous_body = match &snapshot.previous_version {
            Some(previous_id) => self.storage.load_snapshot(previous_id).await?.body,
            None => String::new(),
        };

        let result = diff::diff(&previous_body, &snapshot.body);
        let changed_lines = partition_by_line(&result.ops);
        Ok(SnapshotDiff {
            added: result.added,
            removed: result.removed,
            ops: result.ops,
            changed_lines,
        })
    }

    /// Run the edit pipeline with bounded retry on version races.
    async fn write(&self, page_id: &str, input: WriteInput) -> Result<WriteOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_write(page_id, &input).await {
                Err(WeaveError::StaleVersion { expected, found })
                    if attempt < self.config.max_commit_attempts =>
                {
                    warn!(page_id, attempt, expected, found, "commit lost the version race, retrying");
                }
                outcome => return outcome,
            }
        }
    }

    /// One attempt of the edit pipeline: load, reconcile, diff, commit.
    async fn try_write(&self, page_id: &str, input: &WriteInput) -> Result<WriteOutcome> {
        let page = self.storage.load_page(page_id).await?;
        let base = self
            .storage
            .load_snapshot_at(page_id, input.base_version)
            .await?;
        let latest = self.storage.load_latest_snapshot(page_id).await?;

        let content = if page.version == input.base_version {
            input.content.clone()
        } else {
            let ancestor = base.content();
            let theirs = page.content();
            debug!(
                page_id,
                base_version = input.base_version,
                current_version = page.version,
                "page advanced past base version, attempting automatic merge"
            );
            if let Some(field) = merge::find_conflict(&ancestor, &input.content, &theirs) {
                debug!(page_id, %field, "automatic merge rejected");
                return Err(WeaveError::MergeConflict { field });
            }
            merge::merge(&ancestor, &input.content, &theirs)?
        };

        let now = SystemTime::now();
        let stats = diff::diff(&page.body, &content.body);
        let added_tags: Vec<String> = content
            .tags
            .iter()
            .filter(|tag| !page.tags.contains(tag))
            .cloned()
            .collect();
        let removed_tags: Vec<String> = page
            .tags
            .iter()
            .filter(|tag| !content.tags.contains(tag))
            .cloned()
            .collect();

        let new_version = page.latest_version + 1;
        let new_page = Page {
            id: page.id.clone(),
            title: content.title.clone(),
            body: content.body.clone(),
            tags: content.tags.clone(),
            author: page.author.clone(),
            last_editor: input.author.clone(),
            created_at: page.created_at,
            updated_at: now,
            version: new_version,
            latest_version: new_version,
        };
        let snapshot = HistorySnapshot {
            id: Uuid::new_v4().to_string(),
            page_id: page.id.clone(),
            version: new_version,
            title: content.title.clone(),
            body: content.body.clone(),
            tags: content.tags.clone(),
            change_kind: input.kind,
            change_message: input.message.clone(),
            changed_by: input.author.clone(),
            changed_at: now,
            previous_version: Some(latest.id.clone()),
            parent_versions: vec![latest.id.clone()],
            content_hash: diff::content_hash(&content.body),
            content_size: diff::content_size(&content.body) as u64,
            added_characters: stats.added as u64,
            removed_characters: stats.removed as u64,
            added_tags,
            removed_tags,
            is_minor: input.is_minor,
        };
        let contributor = self
            .upsert_contributor(page_id, &input.author, stats.added as u64, stats.removed as u64, now)
            .await?;

        self.storage
            .commit(Commit {
                guard: CommitGuard::Expect(page.version),
                page: new_page.clone(),
                snapshot: snapshot.clone(),
                contributor: contributor.clone(),
            })
            .await?;

        debug!(page_id, version = new_version, kind = ?input.kind, "write committed");
        Ok(WriteOutcome {
            page: new_page,
            snapshot,
            contributor: Some(contributor),
        })
    }

    /// One attempt of the revert pipeline.
    async fn try_revert(&self, page_id: &str, request: &RevertRequest) -> Result<WriteOutcome> {
        let page = self.storage.load_page(page_id).await?;
        let target = self
            .storage
            .load_snapshot_at(page_id, request.version)
            .await?;

        if page.version == target.version {
            debug!(page_id, version = page.version, "revert target is current, nothing to do");
            return Ok(WriteOutcome {
                page,
                snapshot: target,
                contributor: None,
            });
        }

        let latest = self.storage.load_latest_snapshot(page_id).await?;
        let now = SystemTime::now();
        let stats = diff::diff(&page.body, &target.body);
        let added_tags: Vec<String> = target
            .tags
            .iter()
            .filter(|tag| !page.tags.contains(tag))
            .cloned()
            .collect();
        let removed_tags: Vec<String> = page
            .tags
            .iter()
            .filter(|tag| !target.tags.contains(tag))
            .cloned()
            .collect();

        let new_version = page.latest_version + 1;
        let new_page = Page {
            id: page.id.clone(),
            title: target.title.clone(),
            body: target.body.clone(),
            tags: target.tags.clone(),
            author: page.author.clone(),
            last_editor: request.author.clone(),
            created_at: page.created_at,
            updated_at: now,
            version: new_version,
            latest_version: new_version,
        };
        let snapshot = HistorySnapshot {
            id: Uuid::new_v4().to_string(),
            page_id: page.id.clone(),
            version: new_version,
            title: target.title.clone(),
            body: target.body.clone(),
            tags: target.tags.clone(),
            change_kind: ChangeKind::Revert,
            change_message: format!("Revert to version {}", request.version),
            changed_by: request.author.clone(),
            changed_at: now,
            previous_version: Some(latest.id.clone()),
            parent_versions: vec![latest.id.clone()],
            content_hash: diff::content_hash(&target.body),
            content_size: diff::content_size(&target.body) as u64,
            added_characters: stats.added as u64,
            removed_characters: stats.removed as u64,
            added_tags,
            removed_tags,
            is_minor: false,
        };
        let contributor = self
            .upsert_contributor(page_id, &request.author, stats.added as u64, stats.removed as u64, now)
            .await?;

        self.storage
            .commit(Commit {
                guard: CommitGuard::Expect(page.version),
                page: new_page.clone(),
                snapshot: snapshot.clone(),
                contributor: contributor.clone(),
            })
            .await?;

        debug!(page_id, version = new_version, target = request.version, "revert committed");
        Ok(WriteOutcome {
            page: new_page,
            snapshot,
            contributor: Some(contributor),
        })
    }

    /// Fold this write's counts into the contributor aggregate.
    async fn upsert_contributor(
        &self,
        page_id: &str,
        author: &Author,
        added: u64,
        removed: u64,
        now: SystemTime,
    ) -> Result<Contributor> {
        Ok(match self.storage.load_contributor(page_id, &author.id).await? {
            Some(existing) => Contributor {
                contributed_at: now,
                lines_added: existing.lines_added + added,
                lines_removed: existing.lines_removed + removed,
                ..existing
            },
            None => Contributor {
                id: Uuid::new_v4().to_string(),
                page_id: page_id.to_string(),
                contributor: author.clone(),
                first_contributed_at: now,
                contributed_at: now,
                lines_added: added,
                lines_removed: removed,
            },
        })
    }
}
