use std::collections::BTreeMap;

use locust_core::{DefinitionKind, LocustError, NestedChange};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level keys that metadata may not overwrite.
const RESERVED_KEYS: [&str; 2] = ["locust", "refs"];

/// The summary document: changes grouped by file, plus optional refs and
/// arbitrary metadata flattened into the top level.
///
/// # Examples
///
/// ```
/// use locust_render::Summary;
///
/// let summary = Summary::default().with_refs("HEAD~1", Some("HEAD"));
/// let json = serde_json::to_value(&summary).unwrap();
/// assert_eq!(json["refs"]["initial"], "HEAD~1");
/// assert!(json["locust"].as_array().unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub locust: Vec<FileSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<Refs>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Revisions the summary was computed between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refs {
    pub initial: String,
    pub terminal: Option<String>,
}

/// Changed definitions in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub changes: Vec<ChangeSummary>,
}

/// One changed definition and the changes nested inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DefinitionKind,
    pub line: u32,
    pub changed_lines: u32,
    pub total_lines: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub children: Vec<ChangeSummary>,
}

impl ChangeSummary {
    fn from_nested(node: &NestedChange) -> Self {
        Self {
            name: node.change.qualified_name.clone(),
            kind: node.change.kind,
            line: node.change.line,
            changed_lines: node.change.changed_lines,
            total_lines: node.change.total_lines,
            link: None,
            children: node.children.iter().map(Self::from_nested).collect(),
        }
    }

    fn link_to(&mut self, file_url: &str) {
        self.link = Some(format!("{file_url}#L{}", self.line));
        for child in &mut self.children {
            child.link_to(file_url);
        }
    }
}

impl Summary {
    /// Build a summary from a per-file forest, keeping its file and root order.
    pub fn from_forest(forest: &BTreeMap<String, Vec<NestedChange>>) -> Self {
        let locust = forest
            .iter()
            .map(|(file, roots)| FileSummary {
                file: file.clone(),
                file_url: None,
                changes: roots.iter().map(ChangeSummary::from_nested).collect(),
            })
            .collect();
        Self {
            locust,
            ..Self::default()
        }
    }

    /// Record the revisions the changes were computed between.
    pub fn with_refs(mut self, initial: &str, terminal: Option<&str>) -> Self {
        self.refs = Some(Refs {
            initial: initial.to_string(),
            terminal: terminal.map(str::to_string),
        });
        self
    }

    /// Merge `metadata` into the top level of the document.
    ///
    /// Keys already set are overwritten; `locust` and `refs` are reserved and
    /// skipped with a warning.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        for (key, value) in metadata {
            if RESERVED_KEYS.contains(&key.as_str()) {
                log::warn!("ignoring metadata key `{key}`: reserved by the summary");
                continue;
            }
            self.metadata.insert(key, value);
        }
        self
    }

    /// Attach GitHub blob links for every file and change, pinned to `terminal`.
    ///
    /// # Errors
    ///
    /// Returns [`LocustError::Render`] if there is no terminal ref to link to.
    ///
    /// # Examples
    ///
    /// ```
    /// use locust_core::DefinitionKind;
    /// use locust_render::{ChangeSummary, FileSummary, Summary};
    ///
    /// let summary = Summary {
    ///     locust: vec![FileSummary {
    ///         file: "pkg/app.py".into(),
    ///         file_url: None,
    ///         changes: vec![ChangeSummary {
    ///             name: "run".into(),
    ///             kind: DefinitionKind::Function,
    ///             line: 12,
    ///             changed_lines: 3,
    ///             total_lines: Some(8),
    ///             link: None,
    ///             children: vec![],
    ///         }],
    ///     }],
    ///     ..Summary::default()
    /// };
    /// let linked = summary
    ///     .with_github_links("https://github.com/acme/app/", Some("abc123"))
    ///     .unwrap();
    /// assert_eq!(
    ///     linked.locust[0].changes[0].link.as_deref(),
    ///     Some("https://github.com/acme/app/blob/abc123/pkg/app.py#L12")
    /// );
    /// ```
    pub fn with_github_links(
        mut self,
        repo_url: &str,
        terminal: Option<&str>,
    ) -> Result<Self, LocustError> {
        let terminal = terminal.ok_or_else(|| {
            LocustError::Render("cannot create GitHub links without a terminal ref".into())
        })?;
        let base = repo_url.strip_suffix('/').unwrap_or(repo_url);

        for item in &mut self.locust {
            let relative = item.file.replace('\\', "/");
            let relative = relative.trim_start_matches('/');
            let file_url = format!("{base}/blob/{terminal}/{relative}");
            for change in &mut item.changes {
                change.link_to(&file_url);
            }
            item.file_url = Some(file_url);
        }
        Ok(self)
    }

    /// Whether no file has any change.
    pub fn is_empty(&self) -> bool {
        self.locust.iter().all(|f| f.changes.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use locust_core::{ChangeKey, LocustChange};

    use super::*;

    fn nested(name: &str, line: u32, children: Vec<NestedChange>) -> NestedChange {
        let change = LocustChange {
            qualified_name: name.into(),
            kind: DefinitionKind::Function,
            filepath: "app.py".into(),
            revision: Some("HEAD".into()),
            line,
            changed_lines: 1,
            total_lines: Some(2),
            parent: None,
        };
        NestedChange {
            key: ChangeKey {
                filepath: "app.py".into(),
                revision: Some("HEAD".into()),
                qualified_name: name.into(),
                line,
            },
            change,
            children,
        }
    }

    fn sample() -> Summary {
        let mut forest = BTreeMap::new();
        forest.insert(
            "app.py".to_string(),
            vec![nested("A", 1, vec![nested("A.f", 2, vec![nested("A.f.g", 3, vec![])])])],
        );
        Summary::from_forest(&forest)
    }

    #[test]
    fn from_forest_keeps_nesting() {
        let summary = sample();
        assert_eq!(summary.locust.len(), 1);
        let root = &summary.locust[0].changes[0];
        assert_eq!(root.name, "A");
        assert_eq!(root.children[0].children[0].name, "A.f.g");
        assert!(summary.refs.is_none());
        assert!(!summary.is_empty());
    }

    #[test]
    fn serialized_shape_uses_type_and_omits_absent_links() {
        let json = serde_json::to_value(sample()).unwrap();
        let change = &json["locust"][0]["changes"][0];
        assert_eq!(change["type"], "function");
        assert_eq!(change["total_lines"], 2);
        assert!(change.get("link").is_none());
        assert!(json["locust"][0].get("file_url").is_none());
        assert!(json.get("refs").is_none());
    }

    #[test]
    fn github_links_reach_every_depth() {
        let summary = sample()
            .with_github_links("https://github.com/acme/app", Some("v1"))
            .unwrap();
        let file = &summary.locust[0];
        assert_eq!(
            file.file_url.as_deref(),
            Some("https://github.com/acme/app/blob/v1/app.py")
        );
        let deepest = &file.changes[0].children[0].children[0];
        assert_eq!(
            deepest.link.as_deref(),
            Some("https://github.com/acme/app/blob/v1/app.py#L3")
        );
    }

    #[test]
    fn github_links_need_a_terminal_ref() {
        let err = sample()
            .with_github_links("https://github.com/acme/app", None)
            .unwrap_err();
        assert!(matches!(err, LocustError::Render(_)));
    }

    #[test]
    fn metadata_is_flattened_but_cannot_replace_changes() {
        let mut metadata = Map::new();
        metadata.insert("pr".into(), Value::from(42));
        metadata.insert("locust".into(), Value::from("nope"));
        let summary = sample().with_refs("a", None).with_metadata(metadata);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["pr"], 42);
        assert!(json["locust"].is_array());
        assert_eq!(json["refs"]["terminal"], Value::Null);

        let back: Summary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }
}
