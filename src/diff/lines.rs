//! Line partitioning of character-level edit scripts.
//!
//! Regroups the flat op list produced by [`diff`](super::diff) into per-line
//! change records. Used for display (highlighting which lines a write
//! touched) and for detecting line-level overlap between edits.
//!
//! The walk keeps one open bucket per line: every newline encountered in an
//! op closes the current bucket and starts the next line, and a bucket is
//! only emitted when it contains at least one insertion or removal.

use super::EditOp;
use serde::{Deserialize, Serialize};

/// The ops belonging to one changed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChanges {
    /// 0-based line number.
    pub line: usize,
    /// Every op accumulated for this line, unchanged ops included.
    pub ops: Vec<EditOp>,
}

/// Partition an edit script into per-line change records.
///
/// Lines without any `Inserted`/`Removed` op are omitted. An op whose text
/// spans several newlines advances the line counter once per newline; the op
/// itself lands in the bucket of the line it opens. A pending changed bucket
/// at the end of the input (no trailing newline) is still emitted.
///
/// # Examples
///
/// ```
/// use pageweave::diff::{diff, partition_by_line};
///
/// let result = diff("Line 1\nLine 2", "Line 1\nLine 2!");
/// let changed = partition_by_line(&result.ops);
/// assert_eq!(changed.len(), 1);
/// assert_eq!(changed[0].line, 1);
/// ```
pub fn partition_by_line(ops: &[EditOp]) -> Vec<LineChanges> {
    let mut changed = Vec::new();
    let mut bucket: Vec<EditOp> = Vec::new();
    let mut line_changed = false;
    let mut line = 0usize;

    for op in ops {
        for _ in op.text().matches('\n') {
            if line_changed {
                changed.push(LineChanges {
                    line,
                    ops: std::mem::take(&mut bucket),
                });
            } else {
                bucket.clear();
            }
            line += 1;
            line_changed = false;
        }
        bucket.push(op.clone());
        if op.is_change() {
            line_changed = true;
        }
    }

    if line_changed {
        changed.push(LineChanges { line, ops: bucket });
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;

    #[test]
    fn test_no_changes_yields_no_lines() {
        let result = diff("Line 1\nLine 2\nLine 3", "Line 1\nLine 2\nLine 3");
        assert!(partition_by_line(&result.ops).is_empty());
    }

    #[test]
    fn test_every_emitted_line_has_a_change() {
        let result = diff("alpha\nbeta\ngamma", "alpha\nBETA\ngamma");
        let changed = partition_by_line(&result.ops);
        assert!(!changed.is_empty());
        for line in &changed {
            assert!(line.ops.iter().any(EditOp::is_change));
        }
    }

    #[test]
    fn test_change_on_second_line_only() {
        let result = diff("Line 1\nLine 2\nLine 3", "Line 1\nLine X\nLine 3");
        let changed = partition_by_line(&result.ops);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].line, 1);
    }

    #[test]
    fn test_changes_on_multiple_lines() {
        let result = diff("aa\nbb\ncc", "ax\nbb\ncx");
        let changed = partition_by_line(&result.ops);
        let lines: Vec<usize> = changed.iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![0, 2]);
    }

    #[test]
    fn test_final_partial_line_is_emitted() {
        // The change sits on the last line, which has no trailing newline.
        let result = diff("one\ntwo", "one\ntwo more");
        let changed = partition_by_line(&result.ops);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].line, 1);
    }

    #[test]
    fn test_multi_newline_op_advances_counter_per_newline() {
        let ops = vec![
            EditOp::Equal("intro".to_string()),
            EditOp::Inserted("a\n\nb".to_string()),
            EditOp::Equal("outro".to_string()),
        ];
        let changed = partition_by_line(&ops);
        assert_eq!(changed.len(), 1);
        // Two embedded newlines close lines 0 and 1; the op opens line 2.
        assert_eq!(changed[0].line, 2);
    }

    #[test]
    fn test_removed_newline_marks_following_line() {
        let result = diff("a\nb", "ab");
        let changed = partition_by_line(&result.ops);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].line, 1);
    }
}
