#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Pageweave: Versioning and Merge for Collaborative Pages
//!
//! This crate implements the versioning core of a collaborative document
//! store: every page carries an append-only history of immutable snapshots,
//! and concurrent edits against the same base version are reconciled
//! automatically at commit time — or rejected with an explicit conflict when
//! they cannot be.
//!
//! ## Overview
//!
//! The engine is built from four layers, leaf first:
//!
//! 1. **Diffing** — character-level edit scripts and content metrics
//! 2. **Line partitioning** — per-line change records derived from a script
//! 3. **Three-way merge** — ancestor/mine/theirs reconciliation of the
//!    `{title, tags, body}` triple with explicit conflict semantics
//! 4. **Optimistic versioning** — the write path: fast path vs merge path,
//!    snapshot chaining, contributor statistics, bounded compare-and-swap
//!    retry
//!
//! Everything below the service layer is a pure, synchronous computation:
//! deterministic, side-effect free, and trivially testable. I/O happens only
//! at the storage boundary, behind the [`Storage`] trait.
//!
//! ## Key Guarantees
//!
//! - **Append-only history**: snapshots are never mutated or deleted; each
//!   one points at the snapshot it was written on top of, forming a chain
//!   that terminates at version 1.
//! - **Monotonic versions**: `latest_version` never decreases and every
//!   successful write — edits, deletes, reverts alike — increments it.
//! - **No silent conflict resolution**: a true conflict (both edits rewrote
//!   the same line span to different non-empty content) always rejects the
//!   write; precedence rules only cover one-sided deletions and agreeing
//!   changes.
//! - **No partial state**: merge decisions are side-effect free until the
//!   single guarded commit, so a rejected write changes nothing.
//!
//! ## Merging Divergent Edits
//!
//! ```
//! use pageweave::{can_merge, merge, PageContent};
//!
//! let ancestor = PageContent::new("T", vec![], "b\na\na");
//! let mine = PageContent::new("T", vec![], "b\na\nc");
//! let theirs = PageContent::new("T", vec![], "d\na\na");
//!
//! // Different lines changed: both edits survive.
//! assert!(can_merge(&ancestor, &mine, &theirs));
//! assert_eq!(merge(&ancestor, &mine, &theirs).unwrap().body, "d\na\nc");
//! ```
//!
//! ## The Write Path
//!
//! ```ignore
//! use pageweave::{Author, CreateRequest, MemoryStore, PageService, UpdateRequest};
//!
//! let service = PageService::new(MemoryStore::new());
//! let alice = Author::new("u1", "Alice", "alice@example.com");
//!
//! let created = service.create(CreateRequest {
//!     title: "Home".to_string(),
//!     body: "Welcome".to_string(),
//!     tags: vec![],
//!     author: alice.clone(),
//! }).await?;
//!
//! // Someone else edits in the meantime; this writer still holds version 1.
//! // The service merges when it can and rejects with a `MergeConflict`
//! // when it cannot.
//! let outcome = service.update(&created.page.id, UpdateRequest {
//!     title: "Home".to_string(),
//!     body: "Welcome to the wiki".to_string(),
//!     tags: vec!["intro".to_string()],
//!     message: "expand the greeting".to_string(),
//!     base_version: 1,
//!     author: alice,
//!     is_minor: false,
//! }).await?;
//! ```
//!
//! ## Module Structure
//!
//! - **[types]** - Data model ([`Page`], [`HistorySnapshot`], [`Contributor`], [`PageContent`])
//! - **[error]** - Error taxonomy and result handling
//! - **[diff]** - Character diffing, content metrics, and line partitioning
//! - **[merge]** - Three-way merge engine with field-specific rules
//! - **[store]** - Storage collaborator trait and the in-memory reference store
//! - **[service]** - Optimistic versioning service (create/update/delete/revert)

pub mod diff;
pub mod error;
pub mod merge;
pub mod service;
pub mod store;
pub mod types;

pub use diff::{
    content_hash, content_lines, content_size, diff, partition_by_line, DiffResult, EditOp,
    LineChanges,
};
pub use error::{ConflictField, Result, WeaveError};
pub use merge::{can_merge, find_conflict, merge};
pub use service::{
    CreateRequest, DeleteRequest, PageService, RevertRequest, ServiceConfig, SnapshotDiff,
    UpdateRequest, WriteOutcome,
};
pub use store::{Commit, CommitGuard, MemoryStore, Storage};
pub use types::{Author, ChangeKind, Contributor, HistorySnapshot, Page, PageContent};

#[cfg(test)]
mod tests;
