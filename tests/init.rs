use std::path::Path;
use std::process::{Command, Output};

use locust_core::LocustConfig;

fn init(dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_locust"))
        .arg("init")
        .current_dir(dir)
        .output()
        .unwrap()
}

#[test]
fn template_leaves_every_setting_at_its_default() {
    let dir = tempfile::tempdir().unwrap();
    let output = init(dir.path());
    assert!(
        output.status.success(),
        "locust init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Created .locust.toml"));

    let content = std::fs::read_to_string(dir.path().join(".locust.toml")).unwrap();
    let config = LocustConfig::from_toml(&content).unwrap();
    assert!(config.parse.dependencies);
    assert!(config.parse.source_roots.is_empty());
    assert_eq!(config.parse.plugin_concurrency, 4);
    assert!(config.render.github_url.is_none());
    assert!(config.render.compressed);
    assert!(config.plugins.is_empty());
}

#[test]
fn template_documents_plugin_invocation() {
    let dir = tempfile::tempdir().unwrap();
    assert!(init(dir.path()).status.success());

    let content = std::fs::read_to_string(dir.path().join(".locust.toml")).unwrap();
    assert!(content.contains("# [[plugins]]"));
    assert!(content.contains("<input.json> <output.json>"));

    // Uncommenting the sample plugin yields a usable plugin entry.
    let enabled: String = content
        .lines()
        .skip_while(|line| !line.starts_with("# [[plugins]]"))
        .map(|line| line.trim_start_matches("# "))
        .collect::<Vec<_>>()
        .join("\n");
    let config = LocustConfig::from_toml(&enabled).unwrap();
    assert_eq!(config.plugins.len(), 1);
    assert_eq!(config.plugins[0].name, "javascript");
    assert_eq!(config.plugins[0].timeout_secs, Some(60));
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".locust.toml"), "[render]\nmax_depth = 5\n").unwrap();

    let output = init(dir.path());
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
    let content = std::fs::read_to_string(dir.path().join(".locust.toml")).unwrap();
    assert_eq!(content, "[render]\nmax_depth = 5\n");
}
