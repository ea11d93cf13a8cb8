//! Out-of-process analyzers for languages without a native extractor.
//!
//! A plugin is invoked as `command args... <input> <output>`. The input file
//! holds the serialized [`DiffResult`]; on success the plugin writes a JSON
//! array of `[patch, definitions]` pairs to the output path. Those
//! definitions go through the same correlator as native results.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use locust_core::{DiffResult, LocustChange, LocustError, PatchInfo, PluginConfig, RawDefinition};
use locust_parse::correlate_all;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::sync::Semaphore;

/// What a plugin writes to its output file.
pub type PluginOutput = Vec<(PatchInfo, Vec<RawDefinition>)>;

/// Run every plugin against `diff`, at most `concurrency` at a time.
///
/// Results come back in the order of `plugins`. A failed plugin yields an
/// error entry and never affects the others.
pub async fn run_plugins(
    diff: &DiffResult,
    plugins: &[PluginConfig],
    concurrency: usize,
) -> Vec<Result<Vec<LocustChange>, LocustError>> {
    if plugins.is_empty() {
        return Vec::new();
    }

    let input = match write_input(diff) {
        Ok(file) => file,
        Err(e) => {
            return plugins
                .iter()
                .map(|p| Err(plugin_error(p, format!("could not write input file: {e}"))))
                .collect();
        }
    };

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let revision = diff.terminal_ref.as_deref();
    let tasks = plugins.iter().map(|plugin| {
        let semaphore = Arc::clone(&semaphore);
        let input = input.path();
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| plugin_error(plugin, e.to_string()))?;
            let output = run_plugin(plugin, input).await?;
            Ok::<_, LocustError>(correlate_output(&output, revision))
        }
    });
    join_all(tasks).await
}

/// Invoke one plugin on a serialized diff and read back its definitions.
///
/// # Errors
///
/// Returns [`LocustError::Plugin`] if the process cannot be started, times
/// out, exits unsuccessfully, or leaves a missing or malformed output file.
pub async fn run_plugin(plugin: &PluginConfig, input: &Path) -> Result<PluginOutput, LocustError> {
    let workdir = tempfile::tempdir()
        .map_err(|e| plugin_error(plugin, format!("could not create output directory: {e}")))?;
    let output_path = workdir.path().join("output.json");

    let mut command = Command::new(&plugin.command);
    command
        .args(&plugin.args)
        .arg(input)
        .arg(&output_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    log::debug!("running plugin `{}`: {:?}", plugin.name, command.as_std());
    let run = command.output();
    let finished = match plugin.timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), run)
            .await
            .map_err(|_| plugin_error(plugin, format!("timed out after {secs}s")))?,
        None => run.await,
    };
    let finished = finished.map_err(|e| plugin_error(plugin, format!("could not start: {e}")))?;

    if !finished.status.success() {
        let stderr = String::from_utf8_lossy(&finished.stderr);
        return Err(plugin_error(
            plugin,
            format!("exited with {}: {}", finished.status, stderr.trim()),
        ));
    }

    let content = match tokio::fs::read_to_string(&output_path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(plugin_error(plugin, "no output file was written".into()));
        }
        Err(e) => return Err(plugin_error(plugin, format!("could not read output: {e}"))),
    };

    serde_json::from_str(&content).map_err(|e| plugin_error(plugin, format!("invalid output: {e}")))
}

/// Correlate a plugin's definitions against the insertions of each patch it returned.
pub fn correlate_output(output: &PluginOutput, revision: Option<&str>) -> Vec<LocustChange> {
    output
        .iter()
        .flat_map(|(patch, definitions)| {
            let boundaries = patch.insertion_boundaries();
            correlate_all(definitions, &boundaries, &patch.new_path, revision)
        })
        .collect()
}

fn write_input(diff: &DiffResult) -> Result<NamedTempFile, LocustError> {
    let file = NamedTempFile::new()?;
    let mut writer = BufWriter::new(file.as_file());
    serde_json::to_writer(&mut writer, diff)?;
    writer.flush()?;
    drop(writer);
    Ok(file)
}

fn plugin_error(plugin: &PluginConfig, message: String) -> LocustError {
    LocustError::Plugin {
        plugin: plugin.name.clone(),
        message,
    }
}
