//! Hunk-to-definition correlation.
//!
//! A definition counts as changed when the insertion boundary that starts
//! last at or before the definition's end line reaches the definition's
//! first line. Boundaries must be sorted by `(start, end)`; among boundaries
//! sharing that maximal start, the one ending last is the candidate, not the
//! first one in sorted order, so ties never depend on how short a hunk is.
//!
//! Definitions whose end line precedes their start line (possible in plugin
//! output) are never reported.

use locust_core::{LocustChange, RawDefinition};

/// Correlate one definition with a patch's insertion boundaries.
///
/// `boundaries` are `(start, end)` pairs sorted ascending, as returned by
/// [`locust_core::PatchInfo::insertion_boundaries`]. Returns `None` when no
/// inserted line falls inside the definition.
///
/// # Examples
///
/// ```
/// use locust_core::{DefinitionKind, RawDefinition};
/// use locust_parse::correlate;
///
/// let g = RawDefinition {
///     qualified_name: "g".into(),
///     kind: DefinitionKind::Function,
///     line: 5,
///     column: 0,
///     end_line: Some(8),
///     end_column: None,
///     parent: None,
/// };
/// let change = correlate(&g, &[(6, 7)], "m.py", None).unwrap();
/// assert_eq!(change.changed_lines, 2);
/// assert_eq!(change.total_lines, Some(4));
/// assert!(correlate(&g, &[(1, 3)], "m.py", None).is_none());
/// ```
pub fn correlate(
    definition: &RawDefinition,
    boundaries: &[(u32, u32)],
    filepath: &str,
    revision: Option<&str>,
) -> Option<LocustChange> {
    debug_assert!(
        boundaries.windows(2).all(|w| w[0] <= w[1]),
        "insertion boundaries must be sorted"
    );

    let line = definition.line;
    let end = definition.end_line;
    if let Some(end) = end.filter(|&end| end < line) {
        log::debug!(
            "ignoring `{}`: ends on line {end} before it starts on line {line}",
            definition.qualified_name
        );
        return None;
    }

    let possible = match end {
        Some(end) => &boundaries[..boundaries.partition_point(|b| b.0 <= end)],
        None => boundaries,
    };
    let &(_, candidate_end) = possible.last()?;
    if candidate_end < line {
        return None;
    }
    let changed_lines = covered_lines(possible, line, end);
    if changed_lines == 0 {
        return None;
    }

    Some(LocustChange {
        qualified_name: definition.qualified_name.clone(),
        kind: definition.kind,
        filepath: filepath.to_string(),
        revision: revision.map(String::from),
        line,
        changed_lines,
        total_lines: end.map(|end| end - line + 1),
        parent: definition.parent.clone(),
    })
}

/// Correlate every definition of one file, keeping the changed ones in order.
pub fn correlate_all(
    definitions: &[RawDefinition],
    boundaries: &[(u32, u32)],
    filepath: &str,
    revision: Option<&str>,
) -> Vec<LocustChange> {
    definitions
        .iter()
        .filter_map(|d| correlate(d, boundaries, filepath, revision))
        .collect()
}

/// Size of the union of `boundaries` clipped to `[line, end]`.
fn covered_lines(boundaries: &[(u32, u32)], line: u32, end: Option<u32>) -> u32 {
    let end = end.unwrap_or(u32::MAX);
    let mut total = 0;
    let mut covered_to: Option<u32> = None;

    for &(start, stop) in boundaries {
        if stop < line || start > end {
            continue;
        }
        let mut lo = start.max(line);
        let hi = stop.min(end);
        if let Some(prev) = covered_to {
            if hi <= prev {
                continue;
            }
            lo = lo.max(prev + 1);
        }
        if lo > hi {
            continue;
        }
        total += hi - lo + 1;
        covered_to = Some(hi);
    }
    total
}
