//! Half-open interval arithmetic.
//!
//! `[start, end)`: two intervals that merely touch (`a.end == b.start`) do **not** overlap.

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval<T> {
    pub start: T,
    pub end: T,
}

impl<T: Ord + Copy> Interval<T> {
    /// Returns `None` for empty or inverted intervals.
    pub fn new(start: T, end: T) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        Self::new(self.start.max(other.start), self.end.min(other.end))
    }

    pub fn contains(&self, point: T) -> bool {
        self.start <= point && point < self.end
    }
}

/// Exact overlapping sub-intervals of two interval sets (sorted two-pointer merge).
///
/// Inputs need not be sorted or disjoint; the output is sorted by start.
pub fn intersect_intervals<T: Ord + Copy>(a: &[Interval<T>], b: &[Interval<T>]) -> Vec<Interval<T>> {
    let a = merge_contiguous(a);
    let b = merge_contiguous(b);

    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if let Some(hit) = a[i].intersection(&b[j]) {
            out.push(hit);
        }
        // Advance whichever ends first; the other may still overlap the next one.
        if a[i].end < b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

/// Sort and coalesce intervals that overlap or touch into maximal contiguous blocks.
pub fn merge_contiguous<T: Ord + Copy>(ranges: &[Interval<T>]) -> Vec<Interval<T>> {
    let mut sorted: Vec<Interval<T>> = ranges.to_vec();
    sorted.sort_by(|x, y| x.start.cmp(&y.start).then(x.end.cmp(&y.end)));

    let mut merged: Vec<Interval<T>> = Vec::with_capacity(sorted.len());
    for r in sorted {
        match merged.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => merged.push(r),
        }
    }
    merged
}
