//! Core data model for the versioning engine.
//!
//! Three records make up the persisted state of a page:
//!
//! | Type | Mutability | Cardinality |
//! |------|------------|-------------|
//! | [`Page`] | Mutable | One row per logical page |
//! | [`HistorySnapshot`] | Immutable once written | One per successful write |
//! | [`Contributor`] | Mutable aggregate | One per page × contributor pair |
//!
//! [`PageContent`] is the unit the merge engine works on: the `{title, tags,
//! body}` triple extracted from any of the records above or from an incoming
//! edit request.
//!
//! # Invariants
//!
//! - `Page::version <= Page::latest_version` at all times; the two are equal
//!   after every successful write.
//! - `(page_id, version)` is unique across a page's snapshots.
//! - Following [`HistorySnapshot::previous_version`] from the latest snapshot
//!   terminates at the version-1 snapshot, whose pointer is `None`.
//! - Snapshots are never mutated or deleted once written.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Identity triple attached to every write.
///
/// The core does not authenticate anyone; it records whatever identity the
/// caller resolved upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Stable contributor identifier.
    pub id: String,
    /// Display name at the time of the write.
    pub name: String,
    /// Email at the time of the write.
    pub email: String,
}

impl Author {
    /// Build an author triple from its parts.
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Author {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// The `{title, tags, body}` triple the merge engine reconciles.
///
/// Tag order is irrelevant; the merge engine normalizes before comparing and
/// returns its result sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    /// Page title.
    pub title: String,
    /// Unordered tag collection.
    pub tags: Vec<String>,
    /// Full body text.
    pub body: String,
}

impl PageContent {
    /// Build a content triple from its parts.
    pub fn new(
        title: impl Into<String>,
        tags: Vec<String>,
        body: impl Into<String>,
    ) -> Self {
        PageContent {
            title: title.into(),
            tags,
            body: body.into(),
        }
    }
}

/// What kind of write produced a snapshot.
///
/// A merge is not a distinct kind; a merged write is recorded as `Edit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// First snapshot of a page.
    Create,
    /// Content change, including automatically merged ones.
    Edit,
    /// Content restored from an earlier snapshot.
    Revert,
    /// Logical deletion: body cleared, history preserved.
    Delete,
}

/// The mutable current state of a page.
///
/// One row per logical page. Created on page creation, rewritten by every
/// edit, delete, and revert. A delete clears the content but keeps the row;
/// physical removal is an explicit purge operation outside this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page identifier.
    pub id: String,
    /// Current title.
    pub title: String,
    /// Current body text.
    pub body: String,
    /// Current tag set.
    pub tags: Vec<String>,
    /// Who created the page.
    pub author: Author,
    /// Who performed the most recent write.
    pub last_editor: Author,
    /// When the page was created.
    pub created_at: SystemTime,
    /// When the page was last written.
    pub updated_at: SystemTime,
    /// The version the currently-stored content represents.
    pub version: u64,
    /// Monotonically increasing write counter; never decreases.
    pub latest_version: u64,
}

impl Page {
    /// Extract the content triple the merge engine operates on.
    pub fn content(&self) -> PageContent {
        PageContent {
            title: self.title.clone(),
            tags: self.tags.clone(),
            body: self.body.clone(),
        }
    }
}

/// One immutable entry in a page's append-only history.
///
/// Records the full content as it existed *after* the write, plus the change
/// statistics relative to the content it replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySnapshot {
    /// Snapshot identifier.
    pub id: String,
    /// Owning page.
    pub page_id: String,
    /// Version number; unique per page.
    pub version: u64,
    /// Title after this write.
    pub title: String,
    /// Body after this write.
    pub body: String,
    /// Tags after this write.
    pub tags: Vec<String>,
    /// What kind of write this was.
    pub change_kind: ChangeKind,
    /// Free-text message supplied with the write.
    pub change_message: String,
    /// Who performed the write.
    pub changed_by: Author,
    /// When the write happened.
    pub changed_at: SystemTime,
    /// Snapshot this one was written on top of; `None` only for version 1.
    pub previous_version: Option<String>,
    /// Snapshot ids contributing to this one. At most one entry today; the
    /// list form leaves room for multi-parent merges.
    pub parent_versions: Vec<String>,
    /// SHA-256 of the body, lowercase hex.
    pub content_hash: String,
    /// UTF-8 byte length of the body.
    pub content_size: u64,
    /// Characters added relative to the prior current body.
    pub added_characters: u64,
    /// Characters removed relative to the prior current body.
    pub removed_characters: u64,
    /// Tags present now but not before this write.
    pub added_tags: Vec<String>,
    /// Tags present before this write but not now.
    pub removed_tags: Vec<String>,
    /// Editor marked this as a minor change.
    pub is_minor: bool,
}

impl HistorySnapshot {
    /// Extract the content triple the merge engine operates on.
    pub fn content(&self) -> PageContent {
        PageContent {
            title: self.title.clone(),
            tags: self.tags.clone(),
            body: self.body.clone(),
        }
    }
}

/// Per-page aggregate of one contributor's activity.
///
/// Counts accumulate across every write the contributor makes to the page;
/// the record is never deleted except alongside a full page purge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    /// Record identifier.
    pub id: String,
    /// Page this aggregate belongs to.
    pub page_id: String,
    /// Who contributed.
    pub contributor: Author,
    /// Timestamp of the first write.
    pub first_contributed_at: SystemTime,
    /// Timestamp of the most recent write.
    pub contributed_at: SystemTime,
    /// Cumulative added-character count (character proxy, not true lines).
    pub lines_added: u64,
    /// Cumulative removed-character count (character proxy, not true lines).
    pub lines_removed: u64,
}
