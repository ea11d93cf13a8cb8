use locust_core::LocustError;

/// Dotted module path of a source file, used to resolve relative imports.
///
/// # Examples
///
/// ```
/// use locust_parse::ModulePath;
///
/// let module = ModulePath::from_file("src/a/b/c.py", &["src".to_string()]);
/// assert_eq!(module.dotted(), "a.b.c");
/// assert_eq!(module.package(), ["a", "b"]);
/// assert_eq!(module.resolve_relative(2, Some("sub")).unwrap(), "a.sub");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModulePath {
    components: Vec<String>,
    is_package: bool,
}

impl ModulePath {
    /// Compute the module path of a repository-relative file.
    ///
    /// The longest matching entry of `source_roots` is stripped first, then
    /// the extension. An `__init__` file names its package.
    pub fn from_file(filepath: &str, source_roots: &[String]) -> Self {
        let normalized = filepath.replace('\\', "/");
        let mut path = normalized.trim_start_matches("./");

        let root = source_roots
            .iter()
            .map(|r| r.trim_matches('/'))
            .filter(|r| !r.is_empty())
            .filter(|r| {
                path.strip_prefix(*r)
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|r| r.len());
        if let Some(root) = root {
            path = &path[root.len() + 1..];
        }

        let mut components: Vec<String> = path
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(String::from)
            .collect();

        if let Some(last) = components.last_mut() {
            if let Some((stem, _)) = last.rsplit_once('.') {
                *last = stem.to_string();
            }
        }

        let is_package = components.last().is_some_and(|c| c == "__init__");
        if is_package {
            components.pop();
        }

        Self {
            components,
            is_package,
        }
    }

    /// Dot-joined module path.
    pub fn dotted(&self) -> String {
        self.components.join(".")
    }

    /// Components of the package the file belongs to.
    pub fn package(&self) -> &[String] {
        if self.is_package {
            &self.components
        } else {
            let end = self.components.len().saturating_sub(1);
            &self.components[..end]
        }
    }

    /// Absolute module named by a relative import with `level` leading dots.
    ///
    /// One dot is the file's own package; each extra dot ascends one more
    /// package. `module` is the part after the dots, if any. The result is
    /// empty for `from . import x` in a top-level module.
    ///
    /// # Errors
    ///
    /// Returns [`LocustError::RelativeImport`] if the import ascends above
    /// the top of the package tree.
    pub fn resolve_relative(&self, level: usize, module: Option<&str>) -> Result<String, LocustError> {
        let package = self.package();
        let ascend = level.saturating_sub(1);
        if ascend > package.len() {
            return Err(LocustError::RelativeImport {
                module: self.dotted(),
                level,
            });
        }

        let mut parts: Vec<&str> = package[..package.len() - ascend]
            .iter()
            .map(String::as_str)
            .collect();
        if let Some(module) = module.filter(|m| !m.is_empty()) {
            parts.push(module);
        }
        Ok(parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_module() {
        let m = ModulePath::from_file("a/b/c.py", &[]);
        assert_eq!(m.dotted(), "a.b.c");
        assert_eq!(m.package(), ["a", "b"]);
    }

    #[test]
    fn init_file_is_its_package() {
        let m = ModulePath::from_file("a/b/__init__.py", &[]);
        assert_eq!(m.dotted(), "a.b");
        assert_eq!(m.package(), ["a", "b"]);
        assert_eq!(m.resolve_relative(1, Some("c")).unwrap(), "a.b.c");
    }

    #[test]
    fn longest_source_root_wins() {
        let roots = vec!["src".to_string(), "src/python/".to_string()];
        let m = ModulePath::from_file("src/python/pkg/mod.py", &roots);
        assert_eq!(m.dotted(), "pkg.mod");
    }

    #[test]
    fn root_must_match_whole_component() {
        let m = ModulePath::from_file("srcs/pkg/mod.py", &["src".to_string()]);
        assert_eq!(m.dotted(), "srcs.pkg.mod");
    }

    #[test]
    fn single_dot_is_own_package() {
        let m = ModulePath::from_file("a/b/c.py", &[]);
        assert_eq!(m.resolve_relative(1, Some("d")).unwrap(), "a.b.d");
        assert_eq!(m.resolve_relative(1, None).unwrap(), "a.b");
    }

    #[test]
    fn double_dot_ascends_one_package() {
        let m = ModulePath::from_file("a/b/c.py", &[]);
        assert_eq!(m.resolve_relative(2, Some("sub")).unwrap(), "a.sub");
        assert_eq!(m.resolve_relative(3, Some("top")).unwrap(), "top");
    }

    #[test]
    fn ascending_past_the_root_fails() {
        let m = ModulePath::from_file("a/b/c.py", &[]);
        let err = m.resolve_relative(4, Some("x")).unwrap_err();
        assert!(matches!(
            err,
            LocustError::RelativeImport { ref module, level: 4 } if module == "a.b.c"
        ));
    }

    #[test]
    fn top_level_module_has_empty_package() {
        let m = ModulePath::from_file("./setup.py", &[]);
        assert_eq!(m.dotted(), "setup");
        assert!(m.package().is_empty());
        assert_eq!(m.resolve_relative(1, None).unwrap(), "");
        assert!(m.resolve_relative(2, None).is_err());
    }
}
