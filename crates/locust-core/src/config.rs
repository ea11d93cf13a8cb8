use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LocustError;

/// Top-level configuration loaded from `.locust.toml`.
///
/// Command-line flags take precedence over values set here.
///
/// # Examples
///
/// ```
/// use locust_core::LocustConfig;
///
/// let config = LocustConfig::default();
/// assert!(config.parse.dependencies);
/// assert!(config.plugins.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocustConfig {
    /// Definition extraction settings.
    #[serde(default)]
    pub parse: ParseConfig,
    /// External analyzers for languages without a native extractor.
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
    /// Summary rendering settings.
    #[serde(default)]
    pub render: RenderConfig,
}

impl LocustConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LocustError::Io`] if the file cannot be read, or
    /// [`LocustError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use locust_core::LocustConfig;
    /// use std::path::Path;
    ///
    /// let config = LocustConfig::from_file(Path::new(".locust.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, LocustError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LocustError::Toml`] if parsing fails, or
    /// [`LocustError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use locust_core::LocustConfig;
    ///
    /// let toml = r#"
    /// [parse]
    /// dependencies = false
    /// "#;
    /// let config = LocustConfig::from_toml(toml).unwrap();
    /// assert!(!config.parse.dependencies);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LocustError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), LocustError> {
        if self.parse.max_concurrency == 0 {
            return Err(LocustError::Config(
                "parse.max_concurrency must be at least 1".into(),
            ));
        }
        if self.parse.plugin_concurrency == 0 {
            return Err(LocustError::Config(
                "parse.plugin_concurrency must be at least 1".into(),
            ));
        }
        for plugin in &self.plugins {
            if plugin.command.trim().is_empty() {
                return Err(LocustError::Config(format!(
                    "plugin `{}` has an empty command",
                    plugin.name
                )));
            }
        }
        Ok(())
    }
}

/// Definition extraction configuration.
///
/// # Examples
///
/// ```
/// use locust_core::ParseConfig;
///
/// let config = ParseConfig::default();
/// assert!(config.dependencies);
/// assert_eq!(config.max_concurrency, 8);
/// assert_eq!(config.plugin_concurrency, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Report import and usage changes alongside definitions (default: true).
    #[serde(default = "default_dependencies")]
    pub dependencies: bool,
    /// Directories, relative to the repository root, that act as the top of
    /// the package tree when computing module paths.
    #[serde(default)]
    pub source_roots: Vec<String>,
    /// Glob patterns for files to leave out of the analysis.
    #[serde(default)]
    pub skip_patterns: Vec<String>,
    /// Maximum number of files parsed at once (default: 8).
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Maximum number of plugin processes running at once (default: 4).
    #[serde(default = "default_plugin_concurrency")]
    pub plugin_concurrency: usize,
}

fn default_dependencies() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    8
}

fn default_plugin_concurrency() -> usize {
    4
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            dependencies: default_dependencies(),
            source_roots: Vec::new(),
            skip_patterns: Vec::new(),
            max_concurrency: default_max_concurrency(),
            plugin_concurrency: default_plugin_concurrency(),
        }
    }
}

/// An external analyzer invoked as `command args... <input.json> <output.json>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Name used in logs and error messages.
    pub name: String,
    /// Executable to run.
    pub command: String,
    /// Arguments placed before the input and output paths.
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the plugin after this many seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Summary rendering configuration.
///
/// # Examples
///
/// ```
/// use locust_core::RenderConfig;
///
/// let config = RenderConfig::default();
/// assert_eq!(config.max_depth, 2);
/// assert!(config.compressed);
/// assert!(config.github_url.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Base repository URL used to link changes, e.g. `https://github.com/org/repo`.
    #[serde(default)]
    pub github_url: Option<String>,
    /// Deepest nesting level shown in markdown output (default: 2).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Use one-line entries in markdown output (default: true).
    #[serde(default = "default_compressed")]
    pub compressed: bool,
}

fn default_max_depth() -> usize {
    2
}

fn default_compressed() -> bool {
    true
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            github_url: None,
            max_depth: default_max_depth(),
            compressed: default_compressed(),
        }
    }
}
