use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use locust_core::{DiffResult, LocustChange, LocustConfig, LocustError, ParseConfig, ParseResult, PatchInfo};
use locust_difflens::filter::PatchFilter;
use locust_parse::{correlate_all, extract_definitions, ExtractOptions, Language};
use tokio::sync::Semaphore;

use crate::plugin::run_plugins;

/// Counters describing one analysis run.
///
/// # Examples
///
/// ```
/// use locust_engine::pipeline::AnalysisStats;
///
/// let stats = AnalysisStats::default();
/// assert_eq!(stats.to_string(), "0 files analyzed, 0 skipped, 0 failed, 0 plugins (0 failed), 0 changes");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    /// Files handed to the native extractor.
    pub files_analyzed: usize,
    /// Files left out by the patch filter.
    pub files_skipped: usize,
    /// Files whose source failed to parse.
    pub files_failed: usize,
    /// Plugins invoked.
    pub plugins_run: usize,
    /// Plugins that failed and contributed nothing.
    pub plugins_failed: usize,
    /// Changes in the result.
    pub changes: usize,
}

impl fmt::Display for AnalysisStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files analyzed, {} skipped, {} failed, {} plugins ({} failed), {} changes",
            self.files_analyzed,
            self.files_skipped,
            self.files_failed,
            self.plugins_run,
            self.plugins_failed,
            self.changes
        )
    }
}

/// Output of [`analyze`].
#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: ParseResult,
    pub stats: AnalysisStats,
}

/// Find the definitions touched by one patch with the native extractor.
///
/// Returns no changes when the patch has no new-side source.
///
/// # Errors
///
/// Returns [`LocustError::Parse`] if the new source does not parse.
///
/// # Examples
///
/// ```
/// use locust_core::{HunkInfo, LineInfo, LineType, ParseConfig, PatchInfo};
/// use locust_engine::pipeline::analyze_patch;
///
/// let patch = PatchInfo {
///     old_path: "m.py".into(),
///     new_path: "m.py".into(),
///     hunks: vec![HunkInfo::new("@@ -1,0 +2 @@", vec![LineInfo {
///         old_line_number: None,
///         new_line_number: Some(2),
///         line_type: LineType::Insertion,
///         text: "    return 2".into(),
///     }])],
///     old_source: None,
///     new_source: Some("def f():\n    return 2\n".into()),
/// };
/// let changes = analyze_patch(&patch, &ParseConfig::default(), None).unwrap();
/// assert_eq!(changes.len(), 1);
/// assert_eq!(changes[0].qualified_name, "f");
/// ```
pub fn analyze_patch(
    patch: &PatchInfo,
    config: &ParseConfig,
    revision: Option<&str>,
) -> Result<Vec<LocustChange>, LocustError> {
    let Some(source) = patch.new_source.as_deref() else {
        return Ok(Vec::new());
    };
    let options = ExtractOptions::for_file(&patch.new_path, config);
    let definitions = extract_definitions(source, &options)?;
    let boundaries = patch.insertion_boundaries();
    Ok(correlate_all(&definitions, &boundaries, &patch.new_path, revision))
}

/// Run native extraction and every configured plugin over `diff`.
///
/// Eligible files are analyzed concurrently on blocking worker threads, at
/// most `parse.max_concurrency` at a time, while plugins run alongside under
/// their own limit. Changes are collected in patch order, followed by plugin
/// results in configuration order. A file that fails to parse or a plugin
/// that fails is logged and contributes nothing.
pub async fn analyze(diff: &DiffResult, config: &LocustConfig) -> Analysis {
    let filter = PatchFilter::from_config(&config.parse, Language::NATIVE_EXTENSIONS);
    let selected = filter.filter(diff.patches.clone());

    let mut stats = AnalysisStats {
        files_analyzed: selected.kept.len(),
        files_skipped: selected.skipped.len(),
        plugins_run: config.plugins.len(),
        ..AnalysisStats::default()
    };

    let semaphore = Arc::new(Semaphore::new(config.parse.max_concurrency.max(1)));
    let parse_config = Arc::new(config.parse.clone());
    let revision = diff.terminal_ref.clone();

    let native = selected.kept.into_iter().map(|patch| {
        let semaphore = Arc::clone(&semaphore);
        let parse_config = Arc::clone(&parse_config);
        let revision = revision.clone();
        async move {
            let path = patch.new_path.clone();
            let outcome = match semaphore.acquire_owned().await {
                Ok(permit) => tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    analyze_patch(&patch, &parse_config, revision.as_deref())
                })
                .await
                .map_err(|e| LocustError::Parse(format!("analysis task failed: {e}")))
                .and_then(|result| result),
                Err(e) => Err(LocustError::Parse(e.to_string())),
            };
            (path, outcome)
        }
    });

    let (native_results, plugin_results) = tokio::join!(
        join_all(native),
        run_plugins(diff, &config.plugins, config.parse.plugin_concurrency)
    );

    let mut changes = Vec::new();
    for (path, outcome) in native_results {
        match outcome {
            Ok(found) => {
                log::debug!("{path}: {} changed definitions", found.len());
                changes.extend(found);
            }
            Err(e) => {
                log::warn!("skipping {path}: {e}");
                stats.files_failed += 1;
            }
        }
    }
    for outcome in plugin_results {
        match outcome {
            Ok(found) => changes.extend(found),
            Err(e) => {
                log::error!("{e}");
                stats.plugins_failed += 1;
            }
        }
    }

    stats.changes = changes.len();
    Analysis {
        result: ParseResult {
            repo_identity: diff.repo_identity.clone(),
            initial_ref: diff.initial_ref.clone(),
            terminal_ref: diff.terminal_ref.clone(),
            changes,
        },
        stats,
    }
}

#[cfg(test)]
mod tests {
    use locust_core::{HunkInfo, LineInfo, LineType, PluginConfig};

    use super::*;

    fn python_patch(path: &str, source: &str, inserted: &[u32]) -> PatchInfo {
        let lines = inserted
            .iter()
            .map(|&n| LineInfo {
                old_line_number: None,
                new_line_number: Some(n),
                line_type: LineType::Insertion,
                text: String::new(),
            })
            .collect();
        PatchInfo {
            old_path: path.into(),
            new_path: path.into(),
            hunks: vec![HunkInfo::new("@@ @@", lines)],
            old_source: None,
            new_source: Some(source.into()),
        }
    }

    fn diff(patches: Vec<PatchInfo>) -> DiffResult {
        DiffResult {
            repo_identity: "/repo".into(),
            initial_ref: "HEAD~1".into(),
            terminal_ref: Some("HEAD".into()),
            patches,
        }
    }

    #[test]
    fn analyze_patch_without_source_is_empty() {
        let mut patch = python_patch("m.py", "", &[1]);
        patch.new_source = None;
        assert!(analyze_patch(&patch, &ParseConfig::default(), None)
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn broken_file_does_not_stop_the_run() {
        let input = diff(vec![
            python_patch("bad.py", "def broken(:\n", &[1]),
            python_patch("good.py", "def ok():\n    return 1\n", &[2]),
        ]);
        let analysis = analyze(&input, &LocustConfig::default()).await;
        assert_eq!(analysis.stats.files_failed, 1);
        assert_eq!(analysis.result.changes.len(), 1);
        assert_eq!(analysis.result.changes[0].filepath, "good.py");
        assert_eq!(analysis.result.changes[0].revision.as_deref(), Some("HEAD"));
    }

    #[tokio::test]
    async fn results_keep_patch_order() {
        let input = diff(
            (0..6)
                .map(|i| python_patch(&format!("m{i}.py"), "def f():\n    pass\n", &[2]))
                .collect(),
        );
        let config = LocustConfig {
            parse: ParseConfig {
                max_concurrency: 2,
                ..ParseConfig::default()
            },
            ..LocustConfig::default()
        };
        let analysis = analyze(&input, &config).await;
        let files: Vec<&str> = analysis
            .result
            .changes
            .iter()
            .map(|c| c.filepath.as_str())
            .collect();
        assert_eq!(files, vec!["m0.py", "m1.py", "m2.py", "m3.py", "m4.py", "m5.py"]);
    }

    #[tokio::test]
    async fn failing_plugin_is_isolated() {
        let input = diff(vec![python_patch("m.py", "def f():\n    pass\n", &[2])]);
        let config = LocustConfig {
            plugins: vec![PluginConfig {
                name: "missing".into(),
                command: "locust-plugin-that-does-not-exist".into(),
                args: vec![],
                timeout_secs: Some(5),
            }],
            ..LocustConfig::default()
        };
        let analysis = analyze(&input, &config).await;
        assert_eq!(analysis.stats.plugins_failed, 1);
        assert_eq!(analysis.result.changes.len(), 1);
    }

    #[tokio::test]
    async fn empty_diff_is_a_valid_empty_result() {
        let analysis = analyze(&diff(vec![]), &LocustConfig::default()).await;
        assert!(analysis.result.changes.is_empty());
        assert_eq!(analysis.result.initial_ref, "HEAD~1");
        assert_eq!(analysis.stats, AnalysisStats::default());
    }
}
