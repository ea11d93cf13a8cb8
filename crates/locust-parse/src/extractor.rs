use locust_core::{DefinitionKind, LocustError, ParseConfig, RawDefinition};
use tree_sitter::{Node, Parser};

use crate::language::Language;
use crate::module_path::ModulePath;
use crate::scope::ScopeStack;

/// Per-file settings for [`extract_definitions`].
///
/// # Examples
///
/// ```
/// use locust_core::ParseConfig;
/// use locust_parse::ExtractOptions;
///
/// let options = ExtractOptions::for_file("src/pkg/mod.py", &ParseConfig {
///     source_roots: vec!["src".into()],
///     ..ParseConfig::default()
/// });
/// assert_eq!(options.module.dotted(), "pkg.mod");
/// assert!(options.dependencies);
/// ```
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Module path of the file, for resolving relative imports.
    pub module: ModulePath,
    /// Emit `Import` and `Usage` definitions.
    pub dependencies: bool,
}

impl ExtractOptions {
    /// Options for the repository-relative `filepath` under `config`.
    pub fn for_file(filepath: &str, config: &ParseConfig) -> Self {
        Self {
            module: ModulePath::from_file(filepath, &config.source_roots),
            dependencies: config.dependencies,
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            module: ModulePath::default(),
            dependencies: true,
        }
    }
}

/// Extract every named definition from Python `source`, in traversal order.
///
/// Functions and classes get a dot-joined qualified name and a parent link
/// to their enclosing scope. With `dependencies` enabled, imports are
/// emitted under their fully-qualified target and every use of an imported
/// name is emitted as a `Usage` of that target. A relative import that
/// climbs out of the package tree is logged and skipped.
///
/// # Errors
///
/// Returns [`LocustError::Parse`] if the source contains a syntax error.
///
/// # Examples
///
/// ```
/// use locust_core::DefinitionKind;
/// use locust_parse::{extract_definitions, ExtractOptions};
///
/// let source = "class A:\n    def run(self):\n        pass\n";
/// let defs = extract_definitions(source, &ExtractOptions::default()).unwrap();
/// assert_eq!(defs.len(), 2);
/// assert_eq!(defs[1].qualified_name, "A.run");
/// assert_eq!(defs[1].kind, DefinitionKind::Function);
/// assert_eq!(defs[1].parent.as_ref().unwrap().name, "A");
/// ```
pub fn extract_definitions(
    source: &str,
    options: &ExtractOptions,
) -> Result<Vec<RawDefinition>, LocustError> {
    let ts_language = Language::Python
        .tree_sitter_language()
        .ok_or_else(|| LocustError::Parse("no grammar for python".into()))?;

    let mut parser = Parser::new();
    parser
        .set_language(&ts_language)
        .map_err(|e| LocustError::Parse(format!("failed to set language: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| LocustError::Parse("parser returned no tree".into()))?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error(root).map_or(1, start_line);
        return Err(LocustError::Parse(format!("syntax error at line {line}")));
    }

    let mut walker = Walker {
        source: source.as_bytes(),
        module: &options.module,
        dependencies: options.dependencies,
        scopes: ScopeStack::default(),
        definitions: Vec::new(),
    };
    walker.visit(root);
    Ok(walker.definitions)
}

struct Walker<'a> {
    source: &'a [u8],
    module: &'a ModulePath,
    dependencies: bool,
    scopes: ScopeStack,
    definitions: Vec<RawDefinition>,
}

impl Walker<'_> {
    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "function_definition" => {
                let kind = if node.child(0).is_some_and(|c| c.kind() == "async") {
                    DefinitionKind::AsyncFunction
                } else {
                    DefinitionKind::Function
                };
                self.visit_scope(node, kind);
            }
            "class_definition" => self.visit_scope(node, DefinitionKind::Class),
            "import_statement" if self.dependencies => self.visit_import(node),
            "import_from_statement" if self.dependencies => self.visit_import_from(node),
            "import_statement" | "import_from_statement" | "future_import_statement" => {}
            "global_statement" | "nonlocal_statement" => {}
            "identifier" if self.dependencies => self.visit_name(node),
            "attribute" if self.dependencies => self.visit_attribute(node),
            "keyword_argument" => self.visit_field(node, "value"),
            "assignment" => {
                if let Some(target) = node.child_by_field_name("left") {
                    self.visit_target(target);
                }
                self.visit_field(node, "type");
                self.visit_field(node, "right");
            }
            "parameters" | "lambda_parameters" => self.visit_parameters(node),
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    fn visit_field(&mut self, node: Node<'_>, field: &str) {
        if let Some(child) = node.child_by_field_name(field) {
            self.visit(child);
        }
    }

    fn visit_scope(&mut self, node: Node<'_>, kind: DefinitionKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            self.visit_children(node);
            return;
        };
        let line = start_line(node);
        let end_line = end_line(node);
        let name = self.text(name_node);
        let (qualified_name, parent) = self.scopes.enter(&name, line, Some(end_line));

        self.definitions.push(RawDefinition {
            qualified_name,
            kind,
            line,
            column: node.start_position().column as u32,
            end_line: Some(end_line),
            end_column: Some(node.end_position().column as u32),
            parent,
        });

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.id() != name_node.id() {
                self.visit(child);
            }
        }
    }

    /// Names bound by an assignment are not uses; subscripts and attributes are.
    fn visit_target(&mut self, node: Node<'_>) {
        match node.kind() {
            "identifier" => {}
            "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.visit_target(child);
                }
            }
            _ => self.visit(node),
        }
    }

    fn visit_parameters(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        for param in node.named_children(&mut cursor) {
            match param.kind() {
                "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" | "tuple_pattern" => {}
                "default_parameter" => self.visit_field(param, "value"),
                "typed_parameter" => self.visit_field(param, "type"),
                "typed_default_parameter" => {
                    self.visit_field(param, "type");
                    self.visit_field(param, "value");
                }
                _ => self.visit(param),
            }
        }
    }

    fn visit_import(&mut self, node: Node<'_>) {
        let line = start_line(node);
        let mut cursor = node.walk();
        let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            match name.kind() {
                "dotted_name" => {
                    let target = self.text(name);
                    self.scopes.bind(line, target.clone(), target.clone());
                    self.push_import(node, target);
                }
                "aliased_import" => {
                    let (Some(module), Some(alias)) = (
                        name.child_by_field_name("name"),
                        name.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    let target = self.text(module);
                    let alias = self.text(alias);
                    self.scopes.bind(line, alias, target.clone());
                    self.push_import(node, target);
                }
                _ => {}
            }
        }
    }

    fn visit_import_from(&mut self, node: Node<'_>) {
        let line = start_line(node);
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };

        let base = if module_node.kind() == "relative_import" {
            let mut level = 0;
            let mut module = None;
            let mut cursor = module_node.walk();
            for child in module_node.named_children(&mut cursor) {
                match child.kind() {
                    "import_prefix" => level = self.text(child).matches('.').count(),
                    "dotted_name" => module = Some(self.text(child)),
                    _ => {}
                }
            }
            match self.module.resolve_relative(level, module.as_deref()) {
                Ok(base) => base,
                Err(e) => {
                    log::warn!("skipping import at line {line}: {e}");
                    return;
                }
            }
        } else {
            self.text(module_node)
        };
        let qualify = |name: &str| {
            if base.is_empty() {
                name.to_string()
            } else {
                format!("{base}.{name}")
            }
        };

        let mut cursor = node.walk();
        if node
            .named_children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import")
        {
            self.push_import(node, qualify("*"));
            return;
        }

        let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            match name.kind() {
                "dotted_name" => {
                    let local = self.text(name);
                    let target = qualify(&local);
                    self.scopes.bind(line, local, target.clone());
                    self.push_import(node, target);
                }
                "aliased_import" => {
                    let (Some(imported), Some(alias)) = (
                        name.child_by_field_name("name"),
                        name.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    let target = qualify(&self.text(imported));
                    let alias = self.text(alias);
                    self.scopes.bind(line, alias, target.clone());
                    self.push_import(node, target);
                }
                _ => {}
            }
        }
    }

    fn visit_name(&mut self, node: Node<'_>) {
        let line = start_line(node);
        let name = self.text(node);
        if let Some(target) = self.scopes.resolve(line, &name).map(String::from) {
            self.push_usage(node, target);
        }
    }

    fn visit_attribute(&mut self, node: Node<'_>) {
        let Some(parts) = self.flatten_attribute(node) else {
            // Not a plain dotted chain, e.g. `load().value`.
            self.visit_field(node, "object");
            return;
        };
        let line = start_line(node);
        for i in 1..=parts.len() {
            let prefix = parts[..i].join(".");
            if let Some(target) = self.scopes.resolve(line, &prefix).map(String::from) {
                self.push_usage(node, target);
            }
        }
    }

    fn flatten_attribute(&self, node: Node<'_>) -> Option<Vec<String>> {
        match node.kind() {
            "identifier" => Some(vec![self.text(node)]),
            "attribute" => {
                let mut parts = self.flatten_attribute(node.child_by_field_name("object")?)?;
                parts.push(self.text(node.child_by_field_name("attribute")?));
                Some(parts)
            }
            _ => None,
        }
    }

    fn push_import(&mut self, statement: Node<'_>, target: String) {
        self.push_dependency(statement, target, DefinitionKind::Import);
    }

    fn push_usage(&mut self, node: Node<'_>, target: String) {
        self.push_dependency(node, target, DefinitionKind::Usage);
    }

    fn push_dependency(&mut self, node: Node<'_>, target: String, kind: DefinitionKind) {
        let line = start_line(node);
        self.definitions.push(RawDefinition {
            qualified_name: target,
            kind,
            line,
            column: node.start_position().column as u32,
            end_line: Some(end_line(node)),
            end_column: Some(node.end_position().column as u32),
            parent: self.scopes.enclosing(line),
        });
    }

    fn text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }
}

fn start_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// Last line the node occupies; a node ending at column 0 ends on the line before.
fn end_line(node: Node<'_>) -> u32 {
    let start = node.start_position();
    let end = node.end_position();
    if end.column == 0 && end.row > start.row {
        end.row as u32
    } else {
        end.row as u32 + 1
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error)
}

#[cfg(test)]
mod tests {
    use locust_core::Parent;

    use super::*;

    fn extract(source: &str) -> Vec<RawDefinition> {
        extract_definitions(source, &ExtractOptions::default()).unwrap()
    }

    fn names(defs: &[RawDefinition], kind: DefinitionKind) -> Vec<(String, u32)> {
        defs.iter()
            .filter(|d| d.kind == kind)
            .map(|d| (d.qualified_name.clone(), d.line))
            .collect()
    }

    #[test]
    fn functions_and_classes_with_spans() {
        let source = "\
def f():
    x = 1
    return x

def g():
    a = 1
    b = 2
    return a + b
";
        let defs = extract(source);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].qualified_name, "f");
        assert_eq!((defs[0].line, defs[0].end_line), (1, Some(3)));
        assert_eq!((defs[1].line, defs[1].end_line), (5, Some(8)));
        assert!(defs[1].parent.is_none());
    }

    #[test]
    fn async_functions_and_nesting() {
        let source = "\
class Outer:
    class Inner:
        async def fetch(self):
            pass

    def after(self):
        pass
";
        let defs = extract(source);
        let kinds: Vec<DefinitionKind> = defs.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DefinitionKind::Class,
                DefinitionKind::Class,
                DefinitionKind::AsyncFunction,
                DefinitionKind::Function,
            ]
        );
        assert_eq!(defs[2].qualified_name, "Outer.Inner.fetch");
        assert_eq!(defs[2].parent, Some(Parent::new("Outer.Inner", 2)));
        assert_eq!(defs[3].qualified_name, "Outer.after");
        assert_eq!(defs[3].parent, Some(Parent::new("Outer", 1)));
    }

    #[test]
    fn decorated_function_starts_at_def() {
        let source = "@cache\ndef f():\n    pass\n";
        let defs = extract(source);
        assert_eq!(defs[0].line, 2);
        assert_eq!(defs[0].column, 0);
    }

    #[test]
    fn syntax_error_fails_the_file() {
        let err = extract_definitions("def f(:\n    pass\n", &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, LocustError::Parse(_)));
    }

    #[test]
    fn imports_are_qualified() {
        let source = "\
import os
import a.b as c
from pkg import thing as t, other
";
        let defs = extract(source);
        assert_eq!(
            names(&defs, DefinitionKind::Import),
            vec![
                ("os".to_string(), 1),
                ("a.b".to_string(), 2),
                ("pkg.thing".to_string(), 3),
                ("pkg.other".to_string(), 3),
            ]
        );
    }

    #[test]
    fn attribute_usage_resolves_alias() {
        let source = "\
from pkg import thing as t


def run():
    return t.method()
";
        let defs = extract(source);
        let usages: Vec<&RawDefinition> = defs
            .iter()
            .filter(|d| d.kind == DefinitionKind::Usage)
            .collect();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].qualified_name, "pkg.thing");
        assert_eq!(usages[0].line, 5);
        assert_eq!(usages[0].parent, Some(Parent::new("run", 4)));
    }

    #[test]
    fn every_resolving_prefix_is_a_usage() {
        let source = "import a.b\nimport a\na.b.c()\n";
        let defs = extract(source);
        assert_eq!(
            names(&defs, DefinitionKind::Usage),
            vec![("a".to_string(), 3), ("a.b".to_string(), 3)]
        );
    }

    #[test]
    fn call_result_chain_still_visits_arguments() {
        let source = "from m import x\nload(x).value.y\n";
        let defs = extract(source);
        assert_eq!(names(&defs, DefinitionKind::Usage), vec![("m.x".to_string(), 2)]);
    }

    #[test]
    fn parameter_names_are_not_usages() {
        let source = "from m import x\ndef f(x=x, *, y: x = None):\n    pass\n";
        let defs = extract(source);
        assert_eq!(
            names(&defs, DefinitionKind::Usage),
            vec![("m.x".to_string(), 2), ("m.x".to_string(), 2)]
        );
    }

    #[test]
    fn assignment_targets_are_not_usages() {
        let source = "\
from pkg import thing as t
t = 1
a, t = 1, 2
t.x = t
";
        let defs = extract(source);
        assert_eq!(
            names(&defs, DefinitionKind::Usage),
            vec![("pkg.thing".to_string(), 4), ("pkg.thing".to_string(), 4)]
        );
    }

    #[test]
    fn function_scoped_import_does_not_leak() {
        let source = "\
def f():
    import json as j
    return j.dumps({})

def g():
    return j.loads('')
";
        let defs = extract(source);
        let usages = names(&defs, DefinitionKind::Usage);
        assert_eq!(usages, vec![("json".to_string(), 3)]);
        let import = defs.iter().find(|d| d.kind == DefinitionKind::Import).unwrap();
        assert_eq!(import.parent, Some(Parent::new("f", 1)));
    }

    #[test]
    fn relative_imports_use_module_path() {
        let options = ExtractOptions {
            module: ModulePath::from_file("a/b/c.py", &[]),
            dependencies: true,
        };
        let source = "from ..sub import x\nfrom . import y\n";
        let defs = extract_definitions(source, &options).unwrap();
        assert_eq!(
            names(&defs, DefinitionKind::Import),
            vec![("a.sub.x".to_string(), 1), ("a.b.y".to_string(), 2)]
        );
    }

    #[test]
    fn escaping_relative_import_skips_only_that_statement() {
        let options = ExtractOptions {
            module: ModulePath::from_file("c.py", &[]),
            dependencies: true,
        };
        let source = "from .. import nope\nimport os\n\ndef f():\n    pass\n";
        let defs = extract_definitions(source, &options).unwrap();
        assert_eq!(names(&defs, DefinitionKind::Import), vec![("os".to_string(), 2)]);
        assert_eq!(names(&defs, DefinitionKind::Function), vec![("f".to_string(), 4)]);
    }

    #[test]
    fn wildcard_import_binds_nothing() {
        let source = "from pkg.mod import *\nmod.x\n";
        let defs = extract(source);
        assert_eq!(
            names(&defs, DefinitionKind::Import),
            vec![("pkg.mod.*".to_string(), 1)]
        );
        assert!(names(&defs, DefinitionKind::Usage).is_empty());
    }

    #[test]
    fn dependencies_can_be_disabled() {
        let options = ExtractOptions {
            module: ModulePath::default(),
            dependencies: false,
        };
        let source = "import os\n\ndef f():\n    return os.getcwd()\n";
        let defs = extract_definitions(source, &options).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].kind, DefinitionKind::Function);
    }
}
