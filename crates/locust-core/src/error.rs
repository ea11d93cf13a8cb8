use std::path::PathBuf;

/// Errors that can occur across Locust.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate reports it through `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use locust_core::LocustError;
///
/// let err = LocustError::Config("unknown plugin".into());
/// assert!(err.to_string().contains("unknown plugin"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LocustError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    #[diagnostic(help("check that the path is inside a git repository and the revisions exist"))]
    Git(String),

    /// Source code or diff parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// A relative import climbs above the top of the package tree.
    #[error("relative import of level {level} in module `{module}` escapes the source root")]
    RelativeImport {
        /// Dotted module path of the importing file.
        module: String,
        /// Number of leading dots in the import.
        level: usize,
    },

    /// An external analyzer failed or produced unusable output.
    #[error("plugin `{plugin}` failed: {message}")]
    Plugin {
        /// Configured plugin name.
        plugin: String,
        /// What went wrong.
        message: String,
    },

    /// Rendering could not be completed with the given inputs.
    #[error("render error: {0}")]
    Render(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}
