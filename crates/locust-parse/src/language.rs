use std::path::Path;

/// Languages with a native definition extractor.
///
/// # Examples
///
/// ```
/// use locust_parse::Language;
///
/// assert_eq!(Language::from_extension("py"), Language::Python);
/// assert_eq!(Language::from_path("pkg/app.pyi"), Language::Python);
/// assert_eq!(Language::from_path("web/app.js"), Language::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    Unknown,
}

impl Language {
    /// Extensions handled natively, without the dot.
    pub const NATIVE_EXTENSIONS: &'static [&'static str] = &["py", "pyi"];

    /// Detect language from a file extension string (without the dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" | "pyi" => Language::Python,
            _ => Language::Unknown,
        }
    }

    /// Detect language from a file path.
    pub fn from_path(path: &str) -> Self {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map_or(Language::Unknown, Self::from_extension)
    }

    /// Get the tree-sitter language grammar for this language.
    ///
    /// Returns `None` for `Language::Unknown`.
    pub fn tree_sitter_language(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::Unknown => None,
        }
    }
}
