//! Error types and result handling.
//!
//! Every fallible operation in this crate returns [`Result`], an alias over
//! [`WeaveError`]. The variants map one-to-one onto the failure classes of the
//! write pipeline:
//!
//! | Variant | Meaning | Retried internally? |
//! |---------|---------|---------------------|
//! | [`WeaveError::NotFound`] | Page, snapshot, or contributor missing | No |
//! | [`WeaveError::MergeConflict`] | Divergent edits could not be reconciled | No |
//! | [`WeaveError::StaleVersion`] | Compare-and-swap lost against a concurrent writer | Yes, bounded |
//! | [`WeaveError::Reconciliation`] | `merge` invoked on a non-mergeable triple | No (programming error) |
//! | [`WeaveError::Storage`] | Backend failure, propagated unchanged | No |
//!
//! A true merge conflict is never resolved silently and never retried: the
//! caller is expected to re-fetch the current page state and resubmit.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, WeaveError>;

/// Which part of the page content failed the mergeability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    /// Both edits renamed the page to different titles.
    Title,
    /// Both edits changed the tag set to different results.
    Tags,
    /// Both edits rewrote the same line range to different non-empty content.
    Body,
}

impl std::fmt::Display for ConflictField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictField::Title => write!(f, "title"),
            ConflictField::Tags => write!(f, "tags"),
            ConflictField::Body => write!(f, "body"),
        }
    }
}

/// Errors produced by the versioning and merge core.
#[derive(Error, Debug)]
pub enum WeaveError {
    /// A page, snapshot, or contributor lookup came back empty.
    ///
    /// Fatal for the current write: the service does not retry missing
    /// entities.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of record was being looked up ("page", "snapshot", ...).
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// Two divergent edits could not be reconciled automatically.
    ///
    /// Carries the first field that failed the mergeability check so callers
    /// can tell the user what to resolve by hand.
    #[error("automatic merge is not possible: conflicting {field}")]
    MergeConflict {
        /// The conflicting part of the content triple.
        field: ConflictField,
    },

    /// The page advanced while a commit was in flight.
    ///
    /// The service retries this internally up to a bounded number of
    /// attempts. When it still surfaces, treat it like a merge conflict:
    /// re-fetch the current state and resubmit.
    #[error("stale page version: expected {expected}, found {found}")]
    StaleVersion {
        /// The version the commit was conditioned on.
        expected: u64,
        /// The version actually persisted at commit time.
        found: u64,
    },

    /// `merge` was invoked on inputs that `can_merge` rejects.
    ///
    /// This is a caller bug, not a user-facing condition.
    #[error("reconciliation invariant violated: {0}")]
    Reconciliation(String),

    /// The storage collaborator failed; the underlying error is preserved.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl WeaveError {
    /// Whether this error means "someone else got there first".
    ///
    /// Covers both [`WeaveError::MergeConflict`] and a
    /// [`WeaveError::StaleVersion`] that survived the internal retries; the
    /// caller-side treatment is identical for both.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            WeaveError::MergeConflict { .. } | WeaveError::StaleVersion { .. }
        )
    }
}
