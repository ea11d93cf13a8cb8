use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LocustError;

/// Initial revision name that stands for the empty tree.
pub const NULL_REVISION: &str = "null";

/// Whether a diff line was inserted or deleted.
///
/// Diffs are computed without context, so there is no context variant.
///
/// # Examples
///
/// ```
/// use locust_core::LineType;
///
/// let t: LineType = serde_json::from_str("\"+\"").unwrap();
/// assert_eq!(t, LineType::Insertion);
/// assert_eq!(LineType::from_origin('-'), Some(LineType::Deletion));
/// assert_eq!(LineType::from_origin(' '), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineType {
    /// A line present only in the new file (`+`).
    #[serde(rename = "+")]
    Insertion,
    /// A line present only in the old file (`-`).
    #[serde(rename = "-")]
    Deletion,
}

impl LineType {
    /// Map a diff origin character to a line type, if it is `+` or `-`.
    pub fn from_origin(origin: char) -> Option<Self> {
        match origin {
            '+' => Some(LineType::Insertion),
            '-' => Some(LineType::Deletion),
            _ => None,
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineType::Insertion => write!(f, "+"),
            LineType::Deletion => write!(f, "-"),
        }
    }
}

/// A single inserted or deleted line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInfo {
    /// Line number in the old file, absent for insertions.
    #[serde(default)]
    pub old_line_number: Option<u32>,
    /// Line number in the new file, absent for deletions.
    #[serde(default)]
    pub new_line_number: Option<u32>,
    /// Insertion or deletion.
    pub line_type: LineType,
    /// Line content without the trailing newline.
    #[serde(alias = "line")]
    pub text: String,
}

impl LineInfo {
    /// Position used for boundary computation: the new-side number, or the
    /// old-side number for lines that only exist in the old file.
    fn position(&self) -> Option<u32> {
        self.new_line_number.or(self.old_line_number)
    }
}

/// Line span covered by the lines of a hunk that match `operation_filter`.
///
/// # Examples
///
/// ```
/// use locust_core::{HunkBoundary, LineInfo, LineType};
///
/// let lines = vec![
///     LineInfo { old_line_number: None, new_line_number: Some(6), line_type: LineType::Insertion, text: "a".into() },
///     LineInfo { old_line_number: None, new_line_number: Some(7), line_type: LineType::Insertion, text: "b".into() },
/// ];
/// let b = HunkBoundary::compute(&lines, Some(LineType::Insertion)).unwrap();
/// assert_eq!((b.start, b.end), (6, 7));
/// assert!(HunkBoundary::compute(&lines, Some(LineType::Deletion)).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkBoundary {
    /// Line type the boundary was restricted to, `None` for all lines.
    #[serde(
        default,
        alias = "operation_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_filter: Option<LineType>,
    /// First covered line.
    pub start: u32,
    /// Last covered line (inclusive).
    pub end: u32,
}

impl HunkBoundary {
    /// Compute the boundary of `lines` restricted to `filter`.
    ///
    /// Returns `None` when no line matches.
    pub fn compute(lines: &[LineInfo], filter: Option<LineType>) -> Option<Self> {
        let mut positions = lines
            .iter()
            .filter(|line| filter.map_or(true, |t| line.line_type == t))
            .filter_map(LineInfo::position);

        let first = positions.next()?;
        let (start, end) = positions.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self {
            operation_filter: filter,
            start,
            end,
        })
    }
}

/// A contiguous block of changed lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkInfo {
    /// Raw `@@ ... @@` header.
    pub header: String,
    /// Inserted and deleted lines in diff order.
    pub lines: Vec<LineInfo>,
    /// Boundary over every line.
    #[serde(default)]
    pub total_boundary: Option<HunkBoundary>,
    /// Boundary over insertions only.
    #[serde(default)]
    pub insertions_boundary: Option<HunkBoundary>,
    /// Boundary over deletions only.
    #[serde(default)]
    pub deletions_boundary: Option<HunkBoundary>,
}

impl HunkInfo {
    /// Build a hunk and compute its three boundaries once.
    pub fn new(header: impl Into<String>, lines: Vec<LineInfo>) -> Self {
        let total_boundary = HunkBoundary::compute(&lines, None);
        let insertions_boundary = HunkBoundary::compute(&lines, Some(LineType::Insertion));
        let deletions_boundary = HunkBoundary::compute(&lines, Some(LineType::Deletion));
        Self {
            header: header.into(),
            lines,
            total_boundary,
            insertions_boundary,
            deletions_boundary,
        }
    }

    /// The insertion boundary, computed from the lines when the hunk arrived
    /// without one (e.g. from an external plugin).
    pub fn insertions(&self) -> Option<HunkBoundary> {
        self.insertions_boundary
            .or_else(|| HunkBoundary::compute(&self.lines, Some(LineType::Insertion)))
    }
}

/// All hunks for one file, plus the file's text on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchInfo {
    /// Path at the initial revision.
    #[serde(alias = "old_file")]
    pub old_path: String,
    /// Path at the terminal revision.
    #[serde(alias = "new_file")]
    pub new_path: String,
    /// Hunks in file order.
    #[serde(default)]
    pub hunks: Vec<HunkInfo>,
    /// File text at the initial revision; absent for added files.
    #[serde(default)]
    pub old_source: Option<String>,
    /// File text at the terminal revision; absent for deleted files.
    #[serde(default)]
    pub new_source: Option<String>,
}

impl PatchInfo {
    /// Insertion boundaries of every hunk as `(start, end)` pairs, with
    /// duplicates removed, sorted by `start` and then `end`.
    ///
    /// # Examples
    ///
    /// ```
    /// use locust_core::{HunkInfo, LineInfo, LineType, PatchInfo};
    ///
    /// let insert = |n: u32| LineInfo {
    ///     old_line_number: None,
    ///     new_line_number: Some(n),
    ///     line_type: LineType::Insertion,
    ///     text: String::new(),
    /// };
    /// let patch = PatchInfo {
    ///     old_path: "m.py".into(),
    ///     new_path: "m.py".into(),
    ///     hunks: vec![
    ///         HunkInfo::new("@@ -9,0 +10 @@", vec![insert(10)]),
    ///         HunkInfo::new("@@ -1,0 +2,2 @@", vec![insert(2), insert(3)]),
    ///     ],
    ///     old_source: None,
    ///     new_source: None,
    /// };
    /// assert_eq!(patch.insertion_boundaries(), vec![(2, 3), (10, 10)]);
    /// ```
    pub fn insertion_boundaries(&self) -> Vec<(u32, u32)> {
        let mut boundaries: Vec<(u32, u32)> = self
            .hunks
            .iter()
            .filter_map(HunkInfo::insertions)
            .map(|b| (b.start, b.end))
            .collect();
        boundaries.sort_unstable();
        boundaries.dedup();
        boundaries
    }
}

/// A complete diff between two revisions of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Identifies the repository (its path for local repositories).
    #[serde(alias = "repo")]
    pub repo_identity: String,
    /// Revision the diff starts from.
    pub initial_ref: String,
    /// Revision the diff ends at; `None` means the working copy.
    #[serde(default)]
    pub terminal_ref: Option<String>,
    /// One entry per changed file.
    #[serde(default)]
    pub patches: Vec<PatchInfo>,
}

impl DiffResult {
    /// Parse a serialized diff result.
    ///
    /// # Errors
    ///
    /// Returns [`LocustError::Serialization`] for malformed JSON.
    pub fn from_json(content: &str) -> Result<Self, LocustError> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(n: u32) -> LineInfo {
        LineInfo {
            old_line_number: None,
            new_line_number: Some(n),
            line_type: LineType::Insertion,
            text: format!("line {n}"),
        }
    }

    fn delete(n: u32) -> LineInfo {
        LineInfo {
            old_line_number: Some(n),
            new_line_number: None,
            line_type: LineType::Deletion,
            text: format!("old {n}"),
        }
    }

    #[test]
    fn hunk_computes_all_three_boundaries() {
        let hunk = HunkInfo::new("@@ -4,2 +4,3 @@", vec![delete(4), delete(5), insert(4), insert(5), insert(6)]);

        let ins = hunk.insertions_boundary.unwrap();
        assert_eq!((ins.start, ins.end), (4, 6));
        assert_eq!(ins.operation_filter, Some(LineType::Insertion));

        let del = hunk.deletions_boundary.unwrap();
        assert_eq!((del.start, del.end), (4, 5));

        let total = hunk.total_boundary.unwrap();
        assert_eq!((total.start, total.end), (4, 6));
        assert_eq!(total.operation_filter, None);
    }

    #[test]
    fn deletion_only_hunk_has_no_insertion_boundary() {
        let hunk = HunkInfo::new("@@ -3 +2,0 @@", vec![delete(3)]);
        assert!(hunk.insertions_boundary.is_none());
        assert!(hunk.deletions_boundary.is_some());
    }

    #[test]
    fn empty_hunk_has_no_boundaries() {
        let hunk = HunkInfo::new("@@ -0,0 +0,0 @@", Vec::new());
        assert!(hunk.total_boundary.is_none());
        assert!(hunk.insertions().is_none());
    }

    #[test]
    fn insertions_fall_back_to_lines_when_boundary_missing() {
        let mut hunk = HunkInfo::new("@@ -1,0 +2,2 @@", vec![insert(2), insert(3)]);
        hunk.insertions_boundary = None;
        let b = hunk.insertions().unwrap();
        assert_eq!((b.start, b.end), (2, 3));
    }

    #[test]
    fn insertion_boundaries_are_sorted_and_deduplicated() {
        let hunk = HunkInfo::new("@@ -1,0 +5 @@", vec![insert(5)]);
        let patch = PatchInfo {
            old_path: "a.py".into(),
            new_path: "a.py".into(),
            hunks: vec![
                HunkInfo::new("@@ -9,0 +12,2 @@", vec![insert(12), insert(13)]),
                hunk.clone(),
                hunk,
                HunkInfo::new("@@ -7 +8,0 @@", vec![delete(7)]),
            ],
            old_source: None,
            new_source: None,
        };
        assert_eq!(patch.insertion_boundaries(), vec![(5, 5), (12, 13)]);
    }

    #[test]
    fn line_type_serializes_as_origin_char() {
        let json = serde_json::to_string(&LineType::Deletion).unwrap();
        assert_eq!(json, "\"-\"");
        assert_eq!(LineType::Insertion.to_string(), "+");
    }

    #[test]
    fn reads_legacy_field_names() {
        let json = r#"{
            "repo": "/tmp/repo",
            "initial_ref": "HEAD~1",
            "patches": [{
                "old_file": "pkg/mod.py",
                "new_file": "pkg/mod.py",
                "hunks": [{
                    "header": "@@ -1,0 +2 @@",
                    "lines": [{"new_line_number": 2, "line_type": "+", "line": "x = 1"}],
                    "insertions_boundary": {"operation_type": "+", "start": 2, "end": 2}
                }],
                "new_source": "import os\nx = 1\n"
            }]
        }"#;
        let result = DiffResult::from_json(json).unwrap();
        assert_eq!(result.repo_identity, "/tmp/repo");
        assert!(result.terminal_ref.is_none());
        let patch = &result.patches[0];
        assert_eq!(patch.new_path, "pkg/mod.py");
        assert!(patch.old_source.is_none());
        assert_eq!(patch.hunks[0].lines[0].text, "x = 1");
        assert_eq!(patch.insertion_boundaries(), vec![(2, 2)]);
    }

    #[test]
    fn boundary_omits_absent_filter_when_serialized() {
        let b = HunkBoundary {
            operation_filter: None,
            start: 1,
            end: 3,
        };
        let json = serde_json::to_value(b).unwrap();
        assert!(json.get("operation_filter").is_none());
        assert_eq!(json["start"], 1);
    }
}
