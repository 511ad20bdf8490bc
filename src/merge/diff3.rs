//! Line-level three-way region computation.
//!
//! Given the ancestor's lines and the two divergent edits, this module
//! splits the merge into regions: spans that can be accepted unambiguously
//! and spans where both sides touched the same ancestor range.
//!
//! The walk matches ancestor lines against each side with a longest-common-
//! subsequence pass, then advances through the ancestor. Lines matched on
//! both sides are clean; everything between two such lines forms one chunk,
//! classified by which sides changed it. Policy for conflict regions (the
//! one-sided-deletion rule) lives in the parent module; this walk only
//! reports the three slices.

use std::collections::HashMap;

/// One span of the three-way merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MergeRegion {
    /// Lines accepted unambiguously, in output order.
    Clean(Vec<String>),
    /// Both sides rewrote the same ancestor span, to different results.
    Conflict {
        /// The incoming edit's lines for the span.
        mine: Vec<String>,
        /// The ancestor's lines for the span.
        ancestor: Vec<String>,
        /// The persisted edit's lines for the span.
        theirs: Vec<String>,
    },
}

/// Compute merge regions for `ancestor` against the two edits.
pub(crate) fn merge_regions(
    ancestor: &[&str],
    mine: &[&str],
    theirs: &[&str],
) -> Vec<MergeRegion> {
    let mine_matches = lcs_matches(ancestor, mine);
    let their_matches = lcs_matches(ancestor, theirs);

    let mut regions = Vec::new();
    let mut clean: Vec<String> = Vec::new();
    let (mut oi, mut ai, mut bi) = (0usize, 0usize, 0usize);

    while oi < ancestor.len() || ai < mine.len() || bi < theirs.len() {
        if oi < ancestor.len()
            && mine_matches.get(&oi) == Some(&ai)
            && their_matches.get(&oi) == Some(&bi)
        {
            // Present in all three.
            clean.push(mine[ai].to_string());
            oi += 1;
            ai += 1;
            bi += 1;
            continue;
        }

        // Chunk runs to the next ancestor line matched on both sides.
        let mut end = oi;
        while end < ancestor.len()
            && !(mine_matches.contains_key(&end) && their_matches.contains_key(&end))
        {
            end += 1;
        }
        let (a_end, b_end) = if end < ancestor.len() {
            (mine_matches[&end], their_matches[&end])
        } else {
            (mine.len(), theirs.len())
        };

        let o_slice = &ancestor[oi..end];
        let a_slice = &mine[ai..a_end];
        let b_slice = &theirs[bi..b_end];
        let mine_changed = a_slice != o_slice;
        let theirs_changed = b_slice != o_slice;

        if mine_changed && theirs_changed && a_slice != b_slice {
            if !clean.is_empty() {
                regions.push(MergeRegion::Clean(std::mem::take(&mut clean)));
            }
            regions.push(MergeRegion::Conflict {
                mine: to_owned(a_slice),
                ancestor: to_owned(o_slice),
                theirs: to_owned(b_slice),
            });
        } else if mine_changed {
            // Covers both-changed-identically as well: take mine.
            clean.extend(a_slice.iter().map(|line| line.to_string()));
        } else if theirs_changed {
            clean.extend(b_slice.iter().map(|line| line.to_string()));
        } else {
            clean.extend(o_slice.iter().map(|line| line.to_string()));
        }

        oi = end;
        ai = a_end;
        bi = b_end;
    }

    if !clean.is_empty() {
        regions.push(MergeRegion::Clean(clean));
    }

    regions
}

/// Longest-common-subsequence match map from `x` indices to `y` indices.
///
/// The reconstruction walks forward and matches at the earliest possible
/// position on both sides, so a trailing repeated line pairs with its first
/// occurrence. That keeps deletions anchored at the end of a run, which is
/// what the region walk needs to classify them as one-sided.
fn lcs_matches(x: &[&str], y: &[&str]) -> HashMap<usize, usize> {
    let n = x.len();
    let m = y.len();
    // suffix[i][j] = LCS length of x[i..] and y[j..]
    let width = m + 1;
    let mut suffix = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            suffix[i * width + j] = if x[i] == y[j] {
                suffix[(i + 1) * width + j + 1] + 1
            } else {
                suffix[(i + 1) * width + j].max(suffix[i * width + j + 1])
            };
        }
    }

    let mut matches = HashMap::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if x[i] == y[j] {
            matches.insert(i, j);
            i += 1;
            j += 1;
        } else if suffix[(i + 1) * width + j] > suffix[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    matches
}

fn to_owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}
