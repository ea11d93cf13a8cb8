use std::io::ErrorKind;
use std::path::Path;

use locust_core::{HunkInfo, LineInfo, LineType, LocustError, PatchInfo};

const DEV_NULL: &str = "/dev/null";

/// Parse a unified diff string (as produced by `git diff`) into [`PatchInfo`] entries.
///
/// Context lines advance both line counters but are not recorded, so every
/// resulting [`LineInfo`] is an insertion or a deletion. Binary sections are
/// skipped. For added files `old_path` repeats the new path, and for deleted
/// files `new_path` repeats the old one. Sources are left empty; see
/// [`attach_sources`].
///
/// # Errors
///
/// Returns [`LocustError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use locust_difflens::parser::parse_unified_diff;
///
/// let diff = "diff --git a/app.py b/app.py\n\
///             --- a/app.py\n\
///             +++ b/app.py\n\
///             @@ -1,2 +1,3 @@\n\
///              def main():\n\
///             +    print(\"hi\")\n\
///                  pass\n";
/// let patches = parse_unified_diff(diff).unwrap();
/// assert_eq!(patches.len(), 1);
/// assert_eq!(patches[0].insertion_boundaries(), vec![(2, 2)]);
/// ```
pub fn parse_unified_diff(input: &str) -> Result<Vec<PatchInfo>, LocustError> {
    let mut patches: Vec<PatchInfo> = Vec::new();
    let mut current: Option<PendingPatch> = None;
    let mut hunk: Option<PendingHunk> = None;

    for line in input.lines() {
        if let Some(h) = hunk.as_mut() {
            if h.expects_more() {
                h.push(line);
                continue;
            }
        }

        if line.starts_with("diff --git ") {
            flush_hunk(&mut current, &mut hunk);
            finish(&mut patches, current.take());
            current = Some(PendingPatch::default());
            continue;
        }

        // Patches without a "diff --git" line start at the old-path header.
        let has_hunks = hunk.is_some() || current.as_ref().is_some_and(|p| !p.hunks.is_empty());
        if line.starts_with("--- ") && (current.is_none() || has_hunks) {
            flush_hunk(&mut current, &mut hunk);
            finish(&mut patches, current.take());
            current = Some(PendingPatch::default());
        }

        let Some(patch) = current.as_mut() else {
            continue;
        };

        if line.starts_with("Binary files ") || line == "GIT binary patch" {
            patch.is_binary = true;
            continue;
        }

        if let Some(path) = line.strip_prefix("rename from ") {
            patch.old_path = Some(parse_path(path));
            continue;
        }

        if let Some(path) = line.strip_prefix("rename to ") {
            patch.new_path = Some(parse_path(path));
            continue;
        }

        if let Some(path) = line.strip_prefix("--- ") {
            patch.old_path = Some(parse_path(path));
            continue;
        }

        if let Some(path) = line.strip_prefix("+++ ") {
            patch.new_path = Some(parse_path(path));
            continue;
        }

        if line.starts_with("@@ ") {
            flush_hunk(&mut current, &mut hunk);
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            hunk = Some(PendingHunk {
                header: line.to_string(),
                lines: Vec::new(),
                old_next: old_start,
                new_next: new_start,
                old_remaining: old_lines,
                new_remaining: new_lines,
            });
        }
    }

    flush_hunk(&mut current, &mut hunk);
    finish(&mut patches, current.take());

    log::debug!("read {} patches from unified diff", patches.len());
    Ok(patches)
}

/// Fill in `new_source` for every patch whose new path exists under `root`.
///
/// Files that are missing or not valid UTF-8 keep `new_source = None`.
///
/// # Errors
///
/// Returns [`LocustError::Io`] for read failures other than a missing file.
///
/// # Examples
///
/// ```
/// use locust_core::PatchInfo;
/// use locust_difflens::parser::attach_sources;
///
/// let dir = std::env::temp_dir();
/// let mut patches = vec![PatchInfo {
///     old_path: "surely-not-here.py".into(),
///     new_path: "surely-not-here.py".into(),
///     hunks: vec![],
///     old_source: None,
///     new_source: None,
/// }];
/// attach_sources(&mut patches, &dir).unwrap();
/// assert!(patches[0].new_source.is_none());
/// ```
pub fn attach_sources(patches: &mut [PatchInfo], root: &Path) -> Result<(), LocustError> {
    for patch in patches.iter_mut() {
        let path = root.join(&patch.new_path);
        match std::fs::read(&path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => patch.new_source = Some(text),
                Err(_) => log::debug!("{} is not UTF-8, leaving source empty", path.display()),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("{} not present in working tree", path.display());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[derive(Default)]
struct PendingPatch {
    old_path: Option<String>,
    new_path: Option<String>,
    hunks: Vec<HunkInfo>,
    is_binary: bool,
}

impl PendingPatch {
    fn into_patch(self) -> Option<PatchInfo> {
        if self.is_binary {
            return None;
        }
        let old = self.old_path.filter(|p| p != DEV_NULL);
        let new = self.new_path.filter(|p| p != DEV_NULL);
        let (old_path, new_path) = match (old, new) {
            (Some(o), Some(n)) => (o, n),
            (Some(o), None) => (o.clone(), o),
            (None, Some(n)) => (n.clone(), n),
            (None, None) => return None,
        };
        Some(PatchInfo {
            old_path,
            new_path,
            hunks: self.hunks,
            old_source: None,
            new_source: None,
        })
    }
}

struct PendingHunk {
    header: String,
    lines: Vec<LineInfo>,
    old_next: u32,
    new_next: u32,
    old_remaining: u32,
    new_remaining: u32,
}

impl PendingHunk {
    fn expects_more(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }

    fn push(&mut self, line: &str) {
        let (origin, text) = match line.chars().next() {
            Some(c) => (c, &line[c.len_utf8()..]),
            // Some tools strip the single space from empty context lines.
            None => (' ', ""),
        };
        match origin {
            '+' => {
                self.lines.push(LineInfo {
                    old_line_number: None,
                    new_line_number: Some(self.new_next),
                    line_type: LineType::Insertion,
                    text: text.to_string(),
                });
                self.new_next += 1;
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
            '-' => {
                self.lines.push(LineInfo {
                    old_line_number: Some(self.old_next),
                    new_line_number: None,
                    line_type: LineType::Deletion,
                    text: text.to_string(),
                });
                self.old_next += 1;
                self.old_remaining = self.old_remaining.saturating_sub(1);
            }
            '\\' => {}
            _ => {
                self.old_next += 1;
                self.new_next += 1;
                self.old_remaining = self.old_remaining.saturating_sub(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
        }
    }
}

fn flush_hunk(current: &mut Option<PendingPatch>, hunk: &mut Option<PendingHunk>) {
    if let Some(h) = hunk.take() {
        if let Some(patch) = current.as_mut() {
            patch.hunks.push(HunkInfo::new(h.header, h.lines));
        }
    }
}

fn finish(patches: &mut Vec<PatchInfo>, pending: Option<PendingPatch>) {
    if let Some(patch) = pending.and_then(PendingPatch::into_patch) {
        patches.push(patch);
    }
}

fn parse_path(raw: &str) -> String {
    // Drop the tab-separated timestamp some diff tools append.
    let raw = raw.split('\t').next().unwrap_or(raw);
    let normalized = raw.trim_matches('"');

    if normalized == DEV_NULL {
        return DEV_NULL.to_string();
    }

    normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized)
        .to_string()
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), LocustError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| LocustError::Parse(format!("invalid hunk header: {line}")))?;

    let parts: Vec<&str> = inner.split(' ').collect();
    if parts.len() != 2 {
        return Err(LocustError::Parse(format!("invalid hunk header: {line}")));
    }

    let old = parts[0]
        .strip_prefix('-')
        .ok_or_else(|| LocustError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = parts[1]
        .strip_prefix('+')
        .ok_or_else(|| LocustError::Parse(format!("invalid new range in hunk: {line}")))?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;

    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32), LocustError> {
    let invalid = || LocustError::Parse(format!("invalid range in: {context}"));
    match range.split_once(',') {
        Some((start, count)) => Ok((
            start.parse().map_err(|_| invalid())?,
            count.parse().map_err(|_| invalid())?,
        )),
        None => Ok((range.parse().map_err(|_| invalid())?, 1)),
    }
}
