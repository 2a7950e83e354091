//! Line-level diffs between two snapshots of a chapter.
//!
//! Consecutive lines of the same kind are merged, so concatenating the
//! `Added | Unchanged` segments rebuilds the newer text and concatenating the
//! `Removed | Unchanged` segments rebuilds the older one.

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Added,
    Removed,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSegment {
    pub text: String,
    pub kind: SegmentKind,
}

impl DiffSegment {
    pub fn is_change(&self) -> bool {
        self.kind != SegmentKind::Unchanged
    }
}

/// Line counts for the history list badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub added_lines: usize,
    pub removed_lines: usize,
}

pub fn diff(before: &str, after: &str) -> Vec<DiffSegment> {
    let text_diff = TextDiff::from_lines(before, after);
    let mut segments: Vec<DiffSegment> = Vec::new();
    for change in text_diff.iter_all_changes() {
        let kind = match change.tag() {
            ChangeTag::Equal => SegmentKind::Unchanged,
            ChangeTag::Insert => SegmentKind::Added,
            ChangeTag::Delete => SegmentKind::Removed,
        };
        match segments.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(change.value()),
            _ => segments.push(DiffSegment {
                text: change.value().to_string(),
                kind,
            }),
        }
    }
    segments
}

pub fn has_diff(segments: &[DiffSegment]) -> bool {
    segments.iter().any(DiffSegment::is_change)
}

pub fn stats(before: &str, after: &str) -> DiffStats {
    let text_diff = TextDiff::from_lines(before, after);
    let mut out = DiffStats::default();
    for change in text_diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => out.added_lines += 1,
            ChangeTag::Delete => out.removed_lines += 1,
            ChangeTag::Equal => {}
        }
    }
    out
}

/// Rebuilds one side of a diff. `newer = true` yields the `after` text.
pub fn reconstruct(segments: &[DiffSegment], newer: bool) -> String {
    let skip = if newer {
        SegmentKind::Removed
    } else {
        SegmentKind::Added
    };
    segments
        .iter()
        .filter(|segment| segment.kind != skip)
        .map(|segment| segment.text.as_str())
        .collect()
}
