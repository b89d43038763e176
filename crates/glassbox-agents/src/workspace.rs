//! The working tree a fix is applied to, and how it is reset between attempts.
//!
//! Attempt *k* must see the pristine sources, so every retry starts with
//! [`WorkingTree::reset_to_baseline`]. [`GitWorkingTree`] asks git to
//! discard changes; [`SnapshotWorkingTree`] restores an in-memory snapshot
//! and needs no repository.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use ignore::WalkBuilder;
use tracing::{debug, info};

use crate::config::Settings;

/// Directories never read, snapshotted or cleaned.
const SKIP_DIRS: &[&str] = &[".git", "__pycache__", ".pytest_cache", "target", "node_modules", ".venv"];

pub trait WorkingTree: Send + Sync {
    fn root(&self) -> &Path;

    /// Source files shown to the agents, keyed by `/`-separated relative path.
    fn read_sources(&self) -> Result<BTreeMap<String, String>>;

    /// Undo every change made since the baseline, including new files.
    fn reset_to_baseline(&self) -> Result<()>;
}

/// Which files count as agent-visible sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFilter {
    pub prefix: String,
    pub extensions: Vec<String>,
}

impl SourceFilter {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            prefix: settings.source_prefix.clone(),
            extensions: settings.source_extensions.clone(),
        }
    }

    pub fn accepts(&self, relative: &str) -> bool {
        if !relative.starts_with(&self.prefix) {
            return false;
        }
        Path::new(relative)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|want| want == ext))
    }
}

/// Every regular file under `root`, as `(relative, absolute)`, sorted.
fn walk_files(root: &Path) -> Vec<(String, PathBuf)> {
    WalkBuilder::new(root)
        .hidden(false)
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map_or(true, |n| !SKIP_DIRS.contains(&n))
        })
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
        .flatten()
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some((key, entry.into_path()))
        })
        .collect()
}

fn collect_sources(root: &Path, filter: &SourceFilter) -> Result<BTreeMap<String, String>> {
    let mut sources = BTreeMap::new();
    for (relative, path) in walk_files(root) {
        if !filter.accepts(&relative) {
            continue;
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read source {}", path.display()))?;
        sources.insert(relative, content);
    }
    debug!(root = %root.display(), files = sources.len(), "Sources read");
    Ok(sources)
}

// ---------------------------------------------------------------------------
// git
// ---------------------------------------------------------------------------

/// A git checkout reset with `git checkout -- .` and `git clean -fd`.
pub struct GitWorkingTree {
    root: PathBuf,
    filter: SourceFilter,
}

impl GitWorkingTree {
    pub fn new(root: impl AsRef<Path>, filter: SourceFilter) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let check = Command::new("git")
            .args(["rev-parse", "--git-dir"])
            .current_dir(&root)
            .output()
            .context("Failed to check git repo")?;
        if !check.status.success() {
            bail!("Not a git repository: {}", root.display());
        }
        Ok(Self { root, filter })
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .with_context(|| format!("Failed to run git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed: {stderr}", args.join(" "));
        }
        Ok(())
    }
}

impl WorkingTree for GitWorkingTree {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read_sources(&self) -> Result<BTreeMap<String, String>> {
        collect_sources(&self.root, &self.filter)
    }

    fn reset_to_baseline(&self) -> Result<()> {
        self.git(&["checkout", "--", "."])?;
        self.git(&["clean", "-fd"])?;
        info!(root = %self.root.display(), "Working tree reset (git)");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// snapshot
// ---------------------------------------------------------------------------

/// Restores the bytes of every file present at construction and deletes
/// files created afterwards.
pub struct SnapshotWorkingTree {
    root: PathBuf,
    filter: SourceFilter,
    baseline: BTreeMap<String, Vec<u8>>,
}

impl SnapshotWorkingTree {
    pub fn capture(root: impl AsRef<Path>, filter: SourceFilter) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut baseline = BTreeMap::new();
        for (relative, path) in walk_files(&root) {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to snapshot {}", path.display()))?;
            baseline.insert(relative, bytes);
        }
        info!(root = %root.display(), files = baseline.len(), "Working tree snapshot captured");
        Ok(Self {
            root,
            filter,
            baseline,
        })
    }

    /// Paths in the snapshot.
    pub fn captured(&self) -> BTreeSet<&str> {
        self.baseline.keys().map(String::as_str).collect()
    }
}

impl WorkingTree for SnapshotWorkingTree {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read_sources(&self) -> Result<BTreeMap<String, String>> {
        collect_sources(&self.root, &self.filter)
    }

    fn reset_to_baseline(&self) -> Result<()> {
        let mut removed = 0usize;
        for (relative, path) in walk_files(&self.root) {
            if !self.baseline.contains_key(&relative) {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                removed += 1;
            }
        }

        for (relative, bytes) in &self.baseline {
            let path = self.root.join(relative);
            if std::fs::read(&path).ok().as_deref() == Some(bytes.as_slice()) {
                continue;
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(&path, bytes)
                .with_context(|| format!("Failed to restore {}", path.display()))?;
        }

        info!(root = %self.root.display(), removed, "Working tree reset (snapshot)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn filter() -> SourceFilter {
        SourceFilter {
            prefix: "src/".into(),
            extensions: vec!["py".into()],
        }
    }

    fn seeded() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/app")).unwrap();
        std::fs::create_dir_all(dir.path().join("tests")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("src/app/trust.py"), "DEFAULT = 0.50\n").unwrap();
        std::fs::write(dir.path().join("src/app/notes.md"), "# notes\n").unwrap();
        std::fs::write(dir.path().join("tests/test_trust.py"), "def test_a(): pass\n").unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        dir
    }

    #[test]
    fn test_filter() {
        let f = filter();
        assert!(f.accepts("src/app/x.py"));
        assert!(!f.accepts("src/app/x.pyc"));
        assert!(!f.accepts("tests/test_x.py"));
        assert!(!f.accepts("src/Makefile"));
    }

    #[test]
    fn test_read_sources_applies_filter() {
        let dir = seeded();
        let tree = SnapshotWorkingTree::capture(dir.path(), filter()).unwrap();
        let sources = tree.read_sources().unwrap();
        assert_eq!(sources.keys().collect::<Vec<_>>(), vec!["src/app/trust.py"]);
        assert!(!tree.captured().contains(".git/HEAD"));
    }

    #[test]
    fn test_reset_restores_edits_and_removes_new_files() {
        let dir = seeded();
        let tree = SnapshotWorkingTree::capture(dir.path(), filter()).unwrap();

        std::fs::write(dir.path().join("src/app/trust.py"), "DEFAULT = 0.99\n").unwrap();
        std::fs::write(dir.path().join("tests/test_trust.py"), "def test_a(): pass\n\ndef test_b(): pass\n").unwrap();
        std::fs::write(dir.path().join("tests/test_issue_7.py"), "def test_fix(): pass\n").unwrap();
        std::fs::remove_file(dir.path().join("src/app/notes.md")).unwrap();
        std::fs::write(dir.path().join(".git/index"), "keep").unwrap();

        tree.reset_to_baseline().unwrap();

        let read = |p: &str| std::fs::read_to_string(dir.path().join(p)).unwrap();
        assert_eq!(read("src/app/trust.py"), "DEFAULT = 0.50\n");
        assert_eq!(read("tests/test_trust.py"), "def test_a(): pass\n");
        assert_eq!(read("src/app/notes.md"), "# notes\n");
        assert!(!dir.path().join("tests/test_issue_7.py").exists());
        assert!(dir.path().join(".git/index").exists());
    }

    #[test]
    fn test_reset_is_idempotent() {
        let dir = seeded();
        let tree = SnapshotWorkingTree::capture(dir.path(), filter()).unwrap();
        tree.reset_to_baseline().unwrap();
        tree.reset_to_baseline().unwrap();
        assert_eq!(tree.read_sources().unwrap()["src/app/trust.py"], "DEFAULT = 0.50\n");
    }

    #[test]
    fn test_git_tree_requires_repo() {
        let dir = TempDir::new().unwrap();
        assert!(GitWorkingTree::new(dir.path(), filter()).is_err());
    }
}
