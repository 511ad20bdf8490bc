//! Character-level diffing and content metrics.
//!
//! This module computes edit scripts between two text states and derives the
//! size/identity metrics recorded on every history snapshot.
//!
//! # Edit Scripts
//!
//! [`diff`] runs a Myers shortest-edit-script search over the characters of
//! both inputs and emits exactly one [`EditOp`] per character, including
//! unchanged ones. Adjacent same-type runs are never merged, so the op list
//! can be replayed one character at a time:
//!
//! - keeping `Equal` + `Inserted` ops reconstructs the new text
//! - keeping `Equal` + `Removed` ops reconstructs the old text
//!
//! # Metrics
//!
//! | Function | Unit |
//! |----------|------|
//! | [`diff`] (`added`/`removed`) | characters |
//! | [`content_size`] | UTF-8 bytes |
//! | [`content_lines`] | newline-separated lines |
//! | [`content_hash`] | SHA-256, lowercase hex |
//!
//! # Examples
//!
//! ```
//! use pageweave::diff::diff;
//!
//! let result = diff("hello", "hallo");
//! assert_eq!(result.added, 1);
//! assert_eq!(result.removed, 1);
//!
//! // No self-difference
//! let result = diff("same", "same");
//! assert_eq!(result.added, 0);
//! assert_eq!(result.removed, 0);
//! ```
//!
//! All functions here are pure: no I/O, no side effects, deterministic for
//! identical inputs.

mod lines;

pub use lines::{partition_by_line, LineChanges};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single step in an edit script.
///
/// Scripts produced by [`diff`] carry exactly one character per op; the
/// variants still hold a `String` so that callers composing their own op
/// lists (multi-character, multi-line) can feed them to
/// [`partition_by_line`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOp {
    /// Text present in both inputs.
    Equal(String),
    /// Text present only in the new input.
    Inserted(String),
    /// Text present only in the old input.
    Removed(String),
}

impl EditOp {
    /// The op's text payload.
    pub fn text(&self) -> &str {
        match self {
            EditOp::Equal(text) | EditOp::Inserted(text) | EditOp::Removed(text) => text,
        }
    }

    /// Whether this op changes the text (insertion or removal).
    pub fn is_change(&self) -> bool {
        !matches!(self, EditOp::Equal(_))
    }
}

/// An edit script plus its change counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// One op per character, in replay order.
    pub ops: Vec<EditOp>,
    /// Number of inserted characters.
    pub added: usize,
    /// Number of removed characters.
    pub removed: usize,
}

/// Compute the character-level edit script between two strings.
///
/// A common prefix and suffix are matched off first; the Myers search only
/// runs over the changed middle, so the cost scales with the size of the
/// change rather than the size of the document.
///
/// # Examples
///
/// ```
/// use pageweave::diff::{diff, EditOp};
///
/// let result = diff("ab", "b");
/// assert_eq!(result.ops, vec![
///     EditOp::Removed("a".to_string()),
///     EditOp::Equal("b".to_string()),
/// ]);
/// ```
pub fn diff(old: &str, new: &str) -> DiffResult {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let mut prefix = 0;
    while prefix < old_chars.len()
        && prefix < new_chars.len()
        && old_chars[prefix] == new_chars[prefix]
    {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < old_chars.len() - prefix
        && suffix < new_chars.len() - prefix
        && old_chars[old_chars.len() - 1 - suffix] == new_chars[new_chars.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mut ops = Vec::with_capacity(old_chars.len().max(new_chars.len()));
    ops.extend(
        old_chars[..prefix]
            .iter()
            .map(|c| EditOp::Equal(c.to_string())),
    );
    ops.extend(myers(
        &old_chars[prefix..old_chars.len() - suffix],
        &new_chars[prefix..new_chars.len() - suffix],
    ));
    ops.extend(
        old_chars[old_chars.len() - suffix..]
            .iter()
            .map(|c| EditOp::Equal(c.to_string())),
    );

    let added = ops
        .iter()
        .filter(|op| matches!(op, EditOp::Inserted(_)))
        .count();
    let removed = ops
        .iter()
        .filter(|op| matches!(op, EditOp::Removed(_)))
        .count();

    DiffResult { ops, added, removed }
}

/// SHA-256 of the text, rendered as lowercase hexadecimal.
///
/// Stable across platforms; used for snapshot integrity and deduplication.
///
/// # Examples
///
/// ```
/// use pageweave::diff::content_hash;
///
/// assert_eq!(
///     content_hash(""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// UTF-8 byte length of the text.
///
/// Deliberately bytes rather than characters so the value reproduces across
/// languages that measure encoded size.
pub fn content_size(text: &str) -> usize {
    text.len()
}

/// Number of newline-separated lines in the text.
///
/// The empty string counts as one line, matching `"".split('\n')`.
pub fn content_lines(text: &str) -> usize {
    text.split('\n').count()
}

/// Myers shortest-edit-script search, one op per character.
///
/// Records the frontier after every round so the script can be rebuilt by
/// walking the trace backwards.
fn myers(old: &[char], new: &[char]) -> Vec<EditOp> {
    let n = old.len() as i64;
    let m = new.len() as i64;
    let max = n + m;
    if max == 0 {
        return Vec::new();
    }

    let offset = max;
    let mut frontier = vec![0i64; (2 * max + 1) as usize];
    let mut trace: Vec<Vec<i64>> = Vec::new();

    'search: for d in 0..=max {
        trace.push(frontier.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            // Step down (insertion) from k+1, or right (removal) from k-1,
            // whichever frontier reaches further.
            let mut x = if k == -d || (k != d && frontier[idx - 1] < frontier[idx + 1]) {
                frontier[idx + 1]
            } else {
                frontier[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && old[x as usize] == new[y as usize] {
                x += 1;
                y += 1;
            }
            frontier[idx] = x;
            if x >= n && y >= m {
                break 'search;
            }
            k += 2;
        }
    }

    // Walk the trace backwards from (n, m), emitting ops in reverse.
    let mut ops = Vec::new();
    let mut x = n;
    let mut y = m;
    for d in (0..trace.len() as i64).rev() {
        let frontier = &trace[d as usize];
        let k = x - y;
        let idx = (k + offset) as usize;
        let prev_k = if k == -d || (k != d && frontier[idx - 1] < frontier[idx + 1]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = frontier[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            ops.push(EditOp::Equal(old[(x - 1) as usize].to_string()));
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                ops.push(EditOp::Inserted(new[(y - 1) as usize].to_string()));
            } else {
                ops.push(EditOp::Removed(old[(x - 1) as usize].to_string()));
            }
            x = prev_x;
            y = prev_y;
        }
    }

    ops.reverse();
    ops
}
