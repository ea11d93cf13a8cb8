//! Revision resolution and diff materialization via git2.

use std::path::Path;

use git2::{Delta, Diff, DiffDelta, DiffFindOptions, DiffOptions, Oid, Patch, Repository, Tree};
use locust_core::{DiffResult, HunkInfo, LineInfo, LineType, LocustError, PatchInfo, NULL_REVISION};

/// Collect the diff between `initial` and `terminal` in the repository
/// containing `repo_path`.
///
/// `initial` is any rev-parse expression, or `"null"` for the empty tree.
/// With `terminal = None` the initial tree is compared against the working
/// copy (through the index) and new sources are read from disk. The diff has
/// no context lines, so every hunk line is an insertion or a deletion.
/// Renames are detected, so a moved file yields one patch with both paths.
///
/// # Errors
///
/// Returns [`LocustError::Git`] if no repository contains `repo_path`, a
/// revision does not resolve to a tree, or the diff cannot be computed.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use locust_gitpulse::collect_diff;
///
/// let diff = collect_diff(Path::new("."), "HEAD~1", Some("HEAD")).unwrap();
/// for patch in &diff.patches {
///     println!("{}: {} hunks", patch.new_path, patch.hunks.len());
/// }
/// ```
pub fn collect_diff(
    repo_path: &Path,
    initial: &str,
    terminal: Option<&str>,
) -> Result<DiffResult, LocustError> {
    let repo = Repository::discover(repo_path).map_err(|e| {
        LocustError::Git(format!(
            "failed to open repository at {}: {e}",
            repo_path.display()
        ))
    })?;

    let old_tree = resolve_tree(&repo, initial)?;
    let new_tree = terminal.map(|rev| resolve_tree(&repo, rev)).transpose()?.flatten();

    let mut opts = DiffOptions::new();
    opts.context_lines(0);

    let mut diff = match terminal {
        Some(_) => repo.diff_tree_to_tree(old_tree.as_ref(), new_tree.as_ref(), Some(&mut opts)),
        None => repo.diff_tree_to_workdir_with_index(old_tree.as_ref(), Some(&mut opts)),
    }
    .map_err(|e| LocustError::Git(format!("failed to compute diff: {e}")))?;

    let mut find = DiffFindOptions::new();
    find.renames(true);
    diff.find_similar(Some(&mut find))
        .map_err(|e| LocustError::Git(format!("failed to detect renames: {e}")))?;

    let patches = collect_patches(&repo, &diff, terminal.is_none())?;
    log::debug!(
        "collected {} patches between {initial} and {}",
        patches.len(),
        terminal.unwrap_or("the working copy")
    );

    Ok(DiffResult {
        repo_identity: repo_identity(&repo),
        initial_ref: initial.to_string(),
        terminal_ref: terminal.map(str::to_string),
        patches,
    })
}

/// Resolve a revision to its tree; the null revision has none.
fn resolve_tree<'r>(repo: &'r Repository, rev: &str) -> Result<Option<Tree<'r>>, LocustError> {
    if rev == NULL_REVISION {
        return Ok(None);
    }
    let object = repo
        .revparse_single(rev)
        .map_err(|e| LocustError::Git(format!("failed to resolve revision '{rev}': {e}")))?;
    let tree = object
        .peel_to_tree()
        .map_err(|e| LocustError::Git(format!("revision '{rev}' has no tree: {e}")))?;
    Ok(Some(tree))
}

fn collect_patches(
    repo: &Repository,
    diff: &Diff<'_>,
    from_workdir: bool,
) -> Result<Vec<PatchInfo>, LocustError> {
    let mut patches = Vec::new();
    for idx in 0..diff.deltas().len() {
        let Some(patch) = Patch::from_diff(diff, idx)
            .map_err(|e| LocustError::Git(format!("failed to load patch: {e}")))?
        else {
            continue;
        };
        let delta = patch.delta();
        let old_path = delta_path(&delta, Side::Old);
        let new_path = delta_path(&delta, Side::New);
        let binary = delta.flags().is_binary();

        let old_source = match delta.status() {
            Delta::Added | Delta::Untracked => None,
            _ if binary => None,
            _ => blob_text(repo, delta.old_file().id()),
        };
        let new_source = match delta.status() {
            Delta::Deleted => None,
            _ if binary => None,
            _ if from_workdir => workdir_text(repo, &new_path),
            _ => blob_text(repo, delta.new_file().id()),
        };

        let hunks = collect_hunks(&patch)?;
        log::debug!("{new_path}: {:?}, {} hunks", delta.status(), hunks.len());
        patches.push(PatchInfo {
            old_path,
            new_path,
            hunks,
            old_source,
            new_source,
        });
    }
    Ok(patches)
}

fn collect_hunks(patch: &Patch<'_>) -> Result<Vec<HunkInfo>, LocustError> {
    let mut hunks = Vec::with_capacity(patch.num_hunks());
    for hunk_idx in 0..patch.num_hunks() {
        let (hunk, line_count) = patch
            .hunk(hunk_idx)
            .map_err(|e| LocustError::Git(format!("failed to read hunk: {e}")))?;
        let header = String::from_utf8_lossy(hunk.header()).trim_end().to_string();

        let mut lines = Vec::with_capacity(line_count);
        for line_idx in 0..line_count {
            let line = patch
                .line_in_hunk(hunk_idx, line_idx)
                .map_err(|e| LocustError::Git(format!("failed to read diff line: {e}")))?;
            // Skips "no newline at end of file" markers.
            let Some(line_type) = LineType::from_origin(line.origin()) else {
                continue;
            };
            lines.push(LineInfo {
                old_line_number: line.old_lineno(),
                new_line_number: line.new_lineno(),
                line_type,
                text: String::from_utf8_lossy(line.content())
                    .trim_end_matches(['\n', '\r'])
                    .to_string(),
            });
        }
        hunks.push(HunkInfo::new(header, lines));
    }
    Ok(hunks)
}

#[derive(Clone, Copy)]
enum Side {
    Old,
    New,
}

fn delta_path(delta: &DiffDelta<'_>, side: Side) -> String {
    let (primary, fallback) = match side {
        Side::Old => (delta.old_file(), delta.new_file()),
        Side::New => (delta.new_file(), delta.old_file()),
    };
    primary
        .path()
        .or_else(|| fallback.path())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}

fn blob_text(repo: &Repository, id: Oid) -> Option<String> {
    if id.is_zero() {
        return None;
    }
    let blob = match repo.find_blob(id) {
        Ok(blob) => blob,
        Err(e) => {
            log::warn!("failed to read blob {id}: {e}");
            return None;
        }
    };
    if blob.is_binary() {
        return None;
    }
    String::from_utf8(blob.content().to_vec()).ok()
}

fn workdir_text(repo: &Repository, path: &str) -> Option<String> {
    let full = repo.workdir()?.join(path);
    match std::fs::read(&full) {
        Ok(bytes) => String::from_utf8(bytes).ok(),
        Err(e) => {
            log::warn!("failed to read {}: {e}", full.display());
            None
        }
    }
}

fn repo_identity(repo: &Repository) -> String {
    let path = repo.workdir().unwrap_or_else(|| repo.path());
    let display = path.to_string_lossy();
    match display.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed.to_string(),
        _ => display.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use git2::{IndexAddOption, Signature};
    use tempfile::TempDir;

    use super::*;

    fn init_repo(files: &[(&str, &str)]) -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        for (path, content) in files {
            std::fs::write(dir.path().join(path), content).unwrap();
        }
        {
            let mut index = repo.index().unwrap();
            index
                .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
                .unwrap();
            index.write().unwrap();
            let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
            let sig = Signature::now("Test", "test@example.com").unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        (dir, repo)
    }

    #[test]
    fn null_revision_has_no_tree() {
        let (_dir, repo) = init_repo(&[("a.py", "x = 1\n")]);
        assert!(resolve_tree(&repo, NULL_REVISION).unwrap().is_none());
        assert!(resolve_tree(&repo, "HEAD").unwrap().is_some());
    }

    #[test]
    fn unknown_revision_is_a_git_error() {
        let (_dir, repo) = init_repo(&[("a.py", "x = 1\n")]);
        let err = resolve_tree(&repo, "no-such-branch").unwrap_err();
        assert!(matches!(err, LocustError::Git(ref m) if m.contains("no-such-branch")));
    }

    #[test]
    fn identity_is_the_workdir_without_trailing_slash() {
        let (dir, repo) = init_repo(&[("a.py", "x = 1\n")]);
        let identity = repo_identity(&repo);
        assert!(!identity.ends_with('/'));
        let expected = dir.path().canonicalize().unwrap();
        let actual = Path::new(&identity).canonicalize().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn workdir_text_reads_utf8_only() {
        let (dir, repo) = init_repo(&[("a.py", "x = 1\n")]);
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();
        assert_eq!(workdir_text(&repo, "a.py").as_deref(), Some("x = 1\n"));
        assert!(workdir_text(&repo, "blob.bin").is_none());
        assert!(workdir_text(&repo, "missing.py").is_none());
    }
}
