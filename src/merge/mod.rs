//! Three-way merge of divergent page edits.
//!
//! Given a common ancestor and two edits made against it — `mine`, the
//! incoming request, and `theirs`, whatever is currently persisted — this
//! module decides whether the two can be reconciled without human
//! intervention, and produces the reconciled content when they can.
//!
//! # Field Rules
//!
//! | Field | Conflict when | Resolution |
//! |-------|---------------|------------|
//! | Title | Both changed, to different values | Changed side wins; same change collapses |
//! | Tags | Both changed, to different sets | Union of additions minus every tag either side dropped |
//! | Body | Both rewrote a line span, both results non-empty and different | Line-based three-way merge |
//!
//! A one-sided deletion in the body is not a conflict: if one edit emptied a
//! span and the other rewrote it, the surviving content wins (deletion intent
//! does not beat modification intent). If both sides emptied the span, it
//! stays empty.
//!
//! # Examples
//!
//! ```
//! use pageweave::merge::{can_merge, merge};
//! use pageweave::PageContent;
//!
//! let ancestor = PageContent::new("Title", vec![], "b\na\na");
//! let mine = PageContent::new("Title", vec![], "b\na\nc");
//! let theirs = PageContent::new("Title", vec![], "d\na\na");
//!
//! assert!(can_merge(&ancestor, &mine, &theirs));
//! let merged = merge(&ancestor, &mine, &theirs).unwrap();
//! assert_eq!(merged.body, "d\na\nc");
//! ```
//!
//! All decisions here are deterministic and side-effect free; nothing is
//! persisted until the service layer commits the result.

mod diff3;

use crate::error::{ConflictField, Result, WeaveError};
use crate::types::PageContent;
use diff3::{merge_regions, MergeRegion};
use std::collections::BTreeSet;
use tracing::debug;

/// Find the first field that makes the triple non-mergeable.
///
/// Checks title, then tags, then body, and reports the first conflict so the
/// caller can tell the user what needs manual resolution. Returns `None`
/// when [`merge`] would succeed.
pub fn find_conflict(
    ancestor: &PageContent,
    mine: &PageContent,
    theirs: &PageContent,
) -> Option<ConflictField> {
    let mine_title_changed = mine.title != ancestor.title;
    let theirs_title_changed = theirs.title != ancestor.title;
    if mine_title_changed && theirs_title_changed && mine.title != theirs.title {
        debug!(mine = %mine.title, theirs = %theirs.title, "title conflict");
        return Some(ConflictField::Title);
    }

    let ancestor_tags = tag_set(&ancestor.tags);
    let mine_tags = tag_set(&mine.tags);
    let theirs_tags = tag_set(&theirs.tags);
    if mine_tags != ancestor_tags && theirs_tags != ancestor_tags && mine_tags != theirs_tags {
        debug!("tag conflict");
        return Some(ConflictField::Tags);
    }

    let regions = body_regions(ancestor, mine, theirs);
    for region in &regions {
        if let MergeRegion::Conflict { mine, theirs, .. } = region {
            // One side emptying the span is resolvable; both rewriting it
            // to different non-empty content is not.
            if !mine.is_empty() && !theirs.is_empty() {
                debug!(?mine, ?theirs, "body conflict");
                return Some(ConflictField::Body);
            }
        }
    }

    None
}

/// Whether the divergent edits can be reconciled automatically.
///
/// # Examples
///
/// ```
/// use pageweave::merge::can_merge;
/// use pageweave::PageContent;
///
/// let ancestor = PageContent::new("T", vec![], "Line 1\nLine 2");
/// let mine = PageContent::new("T", vec![], "Line 1 edited\nLine 2");
/// let theirs = PageContent::new("T", vec![], "Line 1 rewritten\nLine 2");
///
/// // Same line, different content: manual resolution required.
/// assert!(!can_merge(&ancestor, &mine, &theirs));
/// assert!(can_merge(&ancestor, &ancestor.clone(), &theirs));
/// ```
pub fn can_merge(ancestor: &PageContent, mine: &PageContent, theirs: &PageContent) -> bool {
    find_conflict(ancestor, mine, theirs).is_none()
}

/// Produce the reconciled content for a mergeable triple.
///
/// Must only be invoked after [`can_merge`] returned `true`; calling it on a
/// non-mergeable triple is a caller bug and yields
/// [`WeaveError::Reconciliation`].
///
/// The merged tag list is returned sorted so the result is deterministic
/// regardless of input order.
pub fn merge(
    ancestor: &PageContent,
    mine: &PageContent,
    theirs: &PageContent,
) -> Result<PageContent> {
    // Title: the changed side wins; both-changed is only reachable when the
    // two sides agree.
    let mine_title_changed = mine.title != ancestor.title;
    let theirs_title_changed = theirs.title != ancestor.title;
    let title = if mine_title_changed && theirs_title_changed && mine.title != theirs.title {
        return Err(WeaveError::Reconciliation(
            "merge invoked with conflicting titles".to_string(),
        ));
    } else if mine_title_changed {
        mine.title.clone()
    } else if theirs_title_changed {
        theirs.title.clone()
    } else {
        ancestor.title.clone()
    };

    // Tags: union of both sides' additions over the ancestor, minus every
    // ancestor tag that either side dropped.
    let ancestor_tags = tag_set(&ancestor.tags);
    let mine_tags = tag_set(&mine.tags);
    let theirs_tags = tag_set(&theirs.tags);
    if mine_tags != ancestor_tags && theirs_tags != ancestor_tags && mine_tags != theirs_tags {
        return Err(WeaveError::Reconciliation(
            "merge invoked with conflicting tag sets".to_string(),
        ));
    }
    let mut merged_tags = ancestor_tags.clone();
    for tag in mine_tags.union(&theirs_tags) {
        if !ancestor_tags.contains(*tag) {
            merged_tags.insert(*tag);
        }
    }
    for tag in &ancestor_tags {
        if !mine_tags.contains(*tag) || !theirs_tags.contains(*tag) {
            merged_tags.remove(*tag);
        }
    }
    let tags: Vec<String> = merged_tags.into_iter().map(|tag| tag.to_string()).collect();

    // Body: clean regions pass through; a conflict region must be one-sided
    // (someone emptied the span) and resolves to the surviving side.
    let mut lines: Vec<String> = Vec::new();
    for region in body_regions(ancestor, mine, theirs) {
        match region {
            MergeRegion::Clean(span) => lines.extend(span),
            MergeRegion::Conflict {
                mine: mine_span,
                theirs: theirs_span,
                ..
            } => {
                if mine_span.is_empty() {
                    lines.extend(theirs_span);
                } else if theirs_span.is_empty() {
                    lines.extend(mine_span);
                } else {
                    return Err(WeaveError::Reconciliation(
                        "merge invoked with a conflicting body span".to_string(),
                    ));
                }
            }
        }
    }

    Ok(PageContent {
        title,
        tags,
        body: lines.join("\n"),
    })
}

fn body_regions(
    ancestor: &PageContent,
    mine: &PageContent,
    theirs: &PageContent,
) -> Vec<MergeRegion> {
    let ancestor_lines: Vec<&str> = ancestor.body.split('\n').collect();
    let mine_lines: Vec<&str> = mine.body.split('\n').collect();
    let theirs_lines: Vec<&str> = theirs.body.split('\n').collect();
    merge_regions(&ancestor_lines, &mine_lines, &theirs_lines)
}

fn tag_set(tags: &[String]) -> BTreeSet<&str> {
    tags.iter().map(String::as_str).collect()
}
