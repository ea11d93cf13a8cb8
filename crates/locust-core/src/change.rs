use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LocustError;

/// Kind of a named definition.
///
/// # Examples
///
/// ```
/// use locust_core::DefinitionKind;
///
/// let kind: DefinitionKind = serde_json::from_str("\"async_function\"").unwrap();
/// assert_eq!(kind, DefinitionKind::AsyncFunction);
/// assert_eq!(kind.to_string(), "async_function");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Function,
    AsyncFunction,
    Class,
    /// An imported symbol, named by its fully-qualified target.
    Import,
    /// A use of an imported symbol, named by the resolved target.
    #[serde(alias = "dependency")]
    Usage,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionKind::Function => write!(f, "function"),
            DefinitionKind::AsyncFunction => write!(f, "async_function"),
            DefinitionKind::Class => write!(f, "class"),
            DefinitionKind::Import => write!(f, "import"),
            DefinitionKind::Usage => write!(f, "usage"),
        }
    }
}

/// Reference to the enclosing scope: its qualified name and start line.
///
/// Serialized as a two-element array `[name, line]`.
///
/// # Examples
///
/// ```
/// use locust_core::Parent;
///
/// let parent: Parent = serde_json::from_str(r#"["Outer", 3]"#).unwrap();
/// assert_eq!(parent, Parent::new("Outer", 3));
/// assert_eq!(serde_json::to_string(&parent).unwrap(), r#"["Outer",3]"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, u32)", into = "(String, u32)")]
pub struct Parent {
    /// Qualified name of the enclosing scope.
    pub name: String,
    /// Line on which the enclosing scope starts.
    pub line: u32,
}

impl Parent {
    pub fn new(name: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            line,
        }
    }
}

impl From<(String, u32)> for Parent {
    fn from((name, line): (String, u32)) -> Self {
        Self { name, line }
    }
}

impl From<Parent> for (String, u32) {
    fn from(parent: Parent) -> Self {
        (parent.name, parent.line)
    }
}

/// A definition found in one file, before correlation with a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDefinition {
    /// Dot-joined scope chain down to this definition; for imports and
    /// usages, the resolved import target.
    #[serde(alias = "name")]
    pub qualified_name: String,
    #[serde(alias = "change_type")]
    pub kind: DefinitionKind,
    /// 1-based start line.
    pub line: u32,
    /// 0-based start column.
    #[serde(default, alias = "offset")]
    pub column: u32,
    /// 1-based inclusive end line, when known.
    #[serde(default)]
    pub end_line: Option<u32>,
    #[serde(default, alias = "end_offset")]
    pub end_column: Option<u32>,
    /// Enclosing scope, `None` at module level.
    #[serde(default)]
    pub parent: Option<Parent>,
}

/// A definition that an edit touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocustChange {
    #[serde(alias = "name")]
    pub qualified_name: String,
    #[serde(alias = "change_type")]
    pub kind: DefinitionKind,
    /// Repository-relative path of the file.
    pub filepath: String,
    /// Terminal revision the change was observed at.
    #[serde(default)]
    pub revision: Option<String>,
    pub line: u32,
    /// Number of the definition's lines covered by insertions; at least 1.
    pub changed_lines: u32,
    /// Length of the definition, when its end line is known.
    #[serde(default)]
    pub total_lines: Option<u32>,
    #[serde(default)]
    pub parent: Option<Parent>,
}

impl LocustChange {
    /// Identity of this change.
    pub fn key(&self) -> ChangeKey {
        ChangeKey {
            filepath: self.filepath.clone(),
            revision: self.revision.clone(),
            qualified_name: self.qualified_name.clone(),
            line: self.line,
        }
    }

    /// Identity of the enclosing scope's change, if this change has a parent.
    ///
    /// A parent with an empty name is treated as no parent.
    ///
    /// # Examples
    ///
    /// ```
    /// use locust_core::{DefinitionKind, LocustChange, Parent};
    ///
    /// let change = LocustChange {
    ///     qualified_name: "A.run".into(),
    ///     kind: DefinitionKind::Function,
    ///     filepath: "app.py".into(),
    ///     revision: None,
    ///     line: 4,
    ///     changed_lines: 1,
    ///     total_lines: Some(2),
    ///     parent: Some(Parent::new("A", 1)),
    /// };
    /// let parent = change.parent_key().unwrap();
    /// assert_eq!(parent.qualified_name, "A");
    /// assert_eq!(parent.line, 1);
    /// assert_eq!(parent.filepath, "app.py");
    /// ```
    pub fn parent_key(&self) -> Option<ChangeKey> {
        let parent = self.parent.as_ref().filter(|p| !p.name.is_empty())?;
        Some(ChangeKey {
            filepath: self.filepath.clone(),
            revision: self.revision.clone(),
            qualified_name: parent.name.clone(),
            line: parent.line,
        })
    }
}

/// Unique identity of a change: two changes are the same node iff all four
/// components match.
///
/// Ordering is lexicographic over `(filepath, revision, qualified_name, line)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChangeKey {
    pub filepath: String,
    pub revision: Option<String>,
    pub qualified_name: String,
    pub line: u32,
}

/// A change together with the changes nested inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestedChange {
    pub key: ChangeKey,
    pub change: LocustChange,
    pub children: Vec<NestedChange>,
}

impl NestedChange {
    /// Every key in this subtree, depth first.
    pub fn keys(&self) -> Vec<&ChangeKey> {
        let mut keys = vec![&self.key];
        for child in &self.children {
            keys.extend(child.keys());
        }
        keys
    }

    /// Sort children by line, recursively.
    pub fn sort_by_line(&mut self) {
        self.children.sort_by_key(|c| c.change.line);
        for child in &mut self.children {
            child.sort_by_line();
        }
    }
}

/// Flat output of an analysis run, ready to be nested and rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    #[serde(default, alias = "repo")]
    pub repo_identity: String,
    #[serde(default)]
    pub initial_ref: String,
    #[serde(default)]
    pub terminal_ref: Option<String>,
    #[serde(default)]
    pub changes: Vec<LocustChange>,
}

impl ParseResult {
    /// Parse a serialized result.
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

    fn change(name: &str, line: u32, parent: Option<Parent>) -> LocustChange {
        LocustChange {
            qualified_name: name.into(),
            kind: DefinitionKind::Function,
            filepath: "m.py".into(),
            revision: Some("abc".into()),
            line,
            changed_lines: 1,
            total_lines: None,
            parent,
        }
    }

    #[test]
    fn key_carries_revision() {
        let key = change("f", 3, None).key();
        assert_eq!(key.revision.as_deref(), Some("abc"));
        assert_eq!(key.qualified_name, "f");
    }

    #[test]
    fn empty_parent_name_is_no_parent() {
        let c = change("f", 3, Some(Parent::new("", 1)));
        assert!(c.parent_key().is_none());
    }

    #[test]
    fn keys_order_by_filepath_first() {
        let a = ChangeKey {
            filepath: "a.py".into(),
            revision: None,
            qualified_name: "z".into(),
            line: 9,
        };
        let b = ChangeKey {
            filepath: "b.py".into(),
            revision: None,
            qualified_name: "a".into(),
            line: 1,
        };
        assert!(a < b);
    }

    #[test]
    fn raw_definition_reads_legacy_names() {
        let json = r#"{"name": "Outer.inner", "change_type": "function", "line": 5,
                       "offset": 4, "end_line": 10, "parent": ["Outer", 1]}"#;
        let def: RawDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.qualified_name, "Outer.inner");
        assert_eq!(def.column, 4);
        assert_eq!(def.end_line, Some(10));
        assert_eq!(def.end_column, None);
        assert_eq!(def.parent, Some(Parent::new("Outer", 1)));
    }

    #[test]
    fn sort_by_line_orders_nested_children() {
        let mut root = NestedChange {
            key: change("A", 1, None).key(),
            change: change("A", 1, None),
            children: vec![
                NestedChange {
                    key: change("A.g", 9, None).key(),
                    change: change("A.g", 9, None),
                    children: vec![],
                },
                NestedChange {
                    key: change("A.f", 2, None).key(),
                    change: change("A.f", 2, None),
                    children: vec![],
                },
            ],
        };
        root.sort_by_line();
        let lines: Vec<u32> = root.children.iter().map(|c| c.change.line).collect();
        assert_eq!(lines, vec![2, 9]);
        assert_eq!(root.keys().len(), 3);
    }

    #[test]
    fn parse_result_defaults_missing_fields() {
        let result = ParseResult::from_json(r#"{"initial_ref": "main"}"#).unwrap();
        assert_eq!(result.initial_ref, "main");
        assert!(result.changes.is_empty());
    }
}
