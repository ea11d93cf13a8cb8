//! Reconstruction of change hierarchies from a flat, parent-annotated list.
//!
//! Parents are referenced by [`ChangeKey`] value, so a forest can be rebuilt
//! from any serialized change list. A change whose parent did not itself
//! change becomes a root of its file.

use std::collections::{BTreeMap, HashMap, HashSet};

use locust_core::{ChangeKey, LocustChange, NestedChange};

/// Changes nested per file, keyed by file path.
pub type Forest = BTreeMap<String, Vec<NestedChange>>;

/// Build the per-file forest of `changes`.
///
/// Roots are changes without a parent or whose parent is not in the list.
/// They are emitted in descending order of child count, then by key. Keys
/// left unreached after that (only possible with cyclic parent links in
/// external input) are emitted as extra roots the same way. Every key
/// appears exactly once. Unlike a last-write index, repeated keys keep their
/// first occurrence, so native results (which precede plugin results in an
/// analysis) are never replaced by a plugin reporting the same definition.
/// Children keep the order of the input list.
///
/// # Examples
///
/// ```
/// use locust_core::{DefinitionKind, LocustChange, Parent};
/// use locust_engine::nest::build_forest;
///
/// let change = |name: &str, line: u32, parent: Option<Parent>| LocustChange {
///     qualified_name: name.into(),
///     kind: DefinitionKind::Function,
///     filepath: "app.py".into(),
///     revision: None,
///     line,
///     changed_lines: 1,
///     total_lines: None,
///     parent,
/// };
/// let forest = build_forest(&[
///     change("A.run", 2, Some(Parent::new("A", 1))),
///     change("A", 1, None),
/// ]);
/// let roots = &forest["app.py"];
/// assert_eq!(roots.len(), 1);
/// assert_eq!(roots[0].change.qualified_name, "A");
/// assert_eq!(roots[0].children[0].change.qualified_name, "A.run");
/// ```
pub fn build_forest(changes: &[LocustChange]) -> Forest {
    let mut index: HashMap<ChangeKey, &LocustChange> = HashMap::new();
    let mut order: Vec<ChangeKey> = Vec::new();
    for change in changes {
        let key = change.key();
        if !index.contains_key(&key) {
            index.insert(key.clone(), change);
            order.push(key);
        }
    }

    let mut children: HashMap<ChangeKey, Vec<ChangeKey>> = HashMap::new();
    let mut roots: Vec<ChangeKey> = Vec::new();
    for key in &order {
        match index[key].parent_key() {
            Some(parent) if parent != *key && index.contains_key(&parent) => {
                children.entry(parent).or_default().push(key.clone());
            }
            Some(parent) if parent != *key => {
                log::debug!(
                    "{} has no changed parent `{}`, treating it as a root",
                    key.qualified_name,
                    parent.qualified_name
                );
                roots.push(key.clone());
            }
            _ => roots.push(key.clone()),
        }
    }

    let child_count = |key: &ChangeKey| children.get(key).map_or(0, Vec::len);
    let by_fan_out = |a: &ChangeKey, b: &ChangeKey| {
        child_count(b).cmp(&child_count(a)).then_with(|| a.cmp(b))
    };

    let mut builder = Builder {
        index: &index,
        children: &children,
        visited: HashSet::new(),
    };
    let mut forest = Forest::new();

    roots.sort_by(by_fan_out);
    let mut remaining: Vec<ChangeKey> = order;
    remaining.sort_by(by_fan_out);

    for key in roots.iter().chain(remaining.iter()) {
        if let Some(node) = builder.build(key) {
            forest
                .entry(node.change.filepath.clone())
                .or_default()
                .push(node);
        }
    }
    forest
}

/// Sort roots and children of every file by line.
pub fn sort_forest(forest: &mut Forest) {
    for roots in forest.values_mut() {
        roots.sort_by_key(|n| n.change.line);
        for root in roots.iter_mut() {
            root.sort_by_line();
        }
    }
}

struct Builder<'a> {
    index: &'a HashMap<ChangeKey, &'a LocustChange>,
    children: &'a HashMap<ChangeKey, Vec<ChangeKey>>,
    visited: HashSet<ChangeKey>,
}

impl Builder<'_> {
    fn build(&mut self, key: &ChangeKey) -> Option<NestedChange> {
        if !self.visited.insert(key.clone()) {
            return None;
        }
        let change = self.index.get(key)?;
        let mut node = NestedChange {
            key: key.clone(),
            change: (*change).clone(),
            children: Vec::new(),
        };
        if let Some(child_keys) = self.children.get(key) {
            for child in child_keys {
                if let Some(child_node) = self.build(child) {
                    node.children.push(child_node);
                }
            }
        }
        Some(node)
    }
}
