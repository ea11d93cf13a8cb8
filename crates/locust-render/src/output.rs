use std::fmt::Write;

use locust_core::{LocustError, OutputFormat, RenderConfig};

use crate::summary::{ChangeSummary, FileSummary, Summary};

const BRANCH: &str = "\u{251c}\u{2500}\u{2500} ";
const LAST_BRANCH: &str = "\u{2514}\u{2500}\u{2500} ";
const PIPE: &str = "\u{2502}   ";
const SPACE: &str = "    ";

/// Render `summary` in the requested format.
///
/// # Errors
///
/// Returns [`LocustError::Serialization`] if JSON output cannot be produced.
pub fn render(
    summary: &Summary,
    format: OutputFormat,
    config: &RenderConfig,
) -> Result<String, LocustError> {
    match format {
        OutputFormat::Text => Ok(format_text(summary)),
        OutputFormat::Json => format_json(summary),
        OutputFormat::Markdown => Ok(format_markdown(summary, config)),
    }
}

/// Render the summary as a box-drawing tree.
///
/// Files are listed alphabetically; definitions and their children are
/// ordered by line.
///
/// # Examples
///
/// ```
/// use locust_render::{format_text, Summary};
///
/// let text = format_text(&Summary::default());
/// assert_eq!(text, "no changed definitions\n");
/// ```
pub fn format_text(summary: &Summary) -> String {
    let mut out = String::new();
    if let Some(refs) = &summary.refs {
        let terminal = refs.terminal.as_deref().unwrap_or("working copy");
        let _ = writeln!(out, "{} \u{2192} {terminal}", refs.initial);
    }

    let mut files: Vec<&FileSummary> = summary
        .locust
        .iter()
        .filter(|f| !f.changes.is_empty())
        .collect();
    if files.is_empty() {
        out.push_str("no changed definitions\n");
        return out;
    }
    files.sort_by(|a, b| a.file.cmp(&b.file));

    let file_count = files.len();
    for (idx, file) in files.iter().enumerate() {
        let is_last = idx == file_count - 1;
        let _ = writeln!(out, "{}{}", if is_last { LAST_BRANCH } else { BRANCH }, file.file);
        let prefix = if is_last { SPACE } else { PIPE };
        write_tree(&mut out, &file.changes, prefix);
    }
    out
}

fn write_tree(out: &mut String, changes: &[ChangeSummary], prefix: &str) {
    let mut sorted: Vec<&ChangeSummary> = changes.iter().collect();
    sorted.sort_by_key(|c| c.line);

    let count = sorted.len();
    for (idx, change) in sorted.into_iter().enumerate() {
        let is_last = idx == count - 1;
        let branch = if is_last { LAST_BRANCH } else { BRANCH };
        let _ = writeln!(
            out,
            "{prefix}{branch}{} {} (line {}, {})",
            change.kind,
            change.name,
            change.line,
            line_counts(change)
        );
        let child_prefix = format!("{prefix}{}", if is_last { SPACE } else { PIPE });
        write_tree(out, &change.children, &child_prefix);
    }
}

fn line_counts(change: &ChangeSummary) -> String {
    match change.total_lines {
        Some(total) => format!("{}/{total} lines changed", change.changed_lines),
        None => format!("{} lines changed", change.changed_lines),
    }
}

/// Render the summary as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`LocustError::Serialization`] if serialization fails.
///
/// # Examples
///
/// ```
/// use locust_render::{format_json, Summary};
///
/// let json = format_json(&Summary::default()).unwrap();
/// assert!(json.contains("\"locust\": []"));
/// ```
pub fn format_json(summary: &Summary) -> Result<String, LocustError> {
    serde_json::to_string_pretty(summary).map_err(LocustError::from)
}

/// Render the summary as Markdown for a pull-request comment.
///
/// Each file becomes a collapsible `<details>` block. Nesting below
/// `config.max_depth` levels is cut off. `config.compressed` selects
/// one-line entries over labelled multi-field ones.
pub fn format_markdown(summary: &Summary, config: &RenderConfig) -> String {
    let mut out = String::from("## Locust summary\n\n");

    if let Some(refs) = &summary.refs {
        out.push_str("### Git references\n\n");
        let _ = writeln!(out, "**Initial:** `{}`  ", refs.initial);
        if let Some(terminal) = &refs.terminal {
            let _ = writeln!(out, "**Terminal:** `{terminal}`  ");
        }
        out.push('\n');
    }
    out.push_str("---\n\n");

    if summary.is_empty() {
        out.push_str("No changed definitions.\n");
        return out;
    }

    for file in summary.locust.iter().filter(|f| !f.changes.is_empty()) {
        let title = match &file.file_url {
            Some(url) => format!("<a href=\"{}\">{}</a>", escape_html(url), escape_html(&file.file)),
            None => format!("<code>{}</code>", escape_html(&file.file)),
        };
        let _ = writeln!(out, "<details>\n<summary>{title}</summary>\n");
        for change in &file.changes {
            write_markdown_change(&mut out, change, 0, config);
        }
        out.push_str("\n</details>\n\n");
    }
    out
}

fn write_markdown_change(out: &mut String, change: &ChangeSummary, depth: usize, config: &RenderConfig) {
    if depth >= config.max_depth {
        return;
    }
    let indent = "  ".repeat(depth);
    let name = match &change.link {
        Some(link) => format!("[`{}`]({link})", change.name),
        None => format!("`{}`", change.name),
    };

    if config.compressed {
        let total = change
            .total_lines
            .map(|t| format!("/{t}"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{indent}- **{}** {name} changed lines: {}{total}",
            change.kind, change.changed_lines
        );
    } else {
        let _ = write!(
            out,
            "{indent}- **Name:** {name}<br>**Type:** {}<br>**Changed lines:** {}",
            change.kind, change.changed_lines
        );
        if let Some(total) = change.total_lines {
            let _ = write!(out, "<br>**Total lines:** {total}");
        }
        out.push('\n');
    }

    for child in &change.children {
        write_markdown_change(out, child, depth + 1, config);
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
