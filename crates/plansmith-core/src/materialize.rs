//! Materialization: write a validated [`Manifest`] onto the filesystem.
//!
//! - [`materialize`] writes every entry under the project root, creating
//!   parent directories and overwriting existing files.
//! - [`write_artifact`] writes a diagnostic or notes file into the artifacts
//!   directory.
//!
//! Every target is checked before the first write, including symlinks that
//! already exist under the root. After that, writes are not transactional:
//! if entry *k* fails, entries before it stay on disk and the remaining
//! entries are not attempted.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::manifest::{Manifest, PathEscape, resolve_within};

/// Filesystem failure while writing a manifest entry or an artifact.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("refusing to write {path:?}: {reason}")]
    Containment { path: String, reason: PathEscape },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Compute where each manifest entry would land, without writing anything.
pub async fn plan_paths(manifest: &Manifest, root: &Path) -> Result<Vec<PathBuf>, WriteError> {
    let real_root = real_path(root).await.unwrap_or_else(|| root.to_path_buf());

    let mut targets = Vec::with_capacity(manifest.files.len());
    for entry in &manifest.files {
        targets.push(contained_target(root, &real_root, &entry.path).await?);
    }
    Ok(targets)
}

/// Write every entry of `manifest` under `root`, in manifest order.
///
/// Returns the written paths, each joined onto `root`. Writing the
/// same manifest twice leaves the same end state.
pub async fn materialize(manifest: &Manifest, root: &Path) -> Result<Vec<PathBuf>, WriteError> {
    let targets = plan_paths(manifest, root).await?;

    for (entry, target) in manifest.files.iter().zip(&targets) {
        write_file(target, &entry.content).await?;
        info!(path = %entry.path, bytes = entry.content.len(), "wrote file");
    }

    Ok(targets)
}

/// Join `relative` onto `root` and confirm that, following whatever already
/// exists on disk, it still lands under `real_root`.
async fn contained_target(root: &Path, real_root: &Path, relative: &str) -> Result<PathBuf, WriteError> {
    let refuse = |reason: PathEscape| WriteError::Containment {
        path: relative.to_owned(),
        reason,
    };

    let target = resolve_within(root, relative).map_err(refuse)?;
    match real_path(&target).await {
        Some(real) if real.starts_with(real_root) => Ok(target),
        _ => Err(refuse(PathEscape::ThroughSymlink(relative.to_owned()))),
    }
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// components that do not exist yet.
///
/// Returns `None` when an ancestor is a dangling symlink, since writing
/// through it would create its target wherever it points.
async fn real_path(path: &Path) -> Option<PathBuf> {
    let mut missing: Vec<OsString> = Vec::new();
    let mut current = path.to_path_buf();

    loop {
        if let Ok(real) = tokio::fs::canonicalize(&current).await {
            let mut real = real;
            real.extend(missing.iter().rev());
            return Some(real);
        }
        if tokio::fs::symlink_metadata(&current).await.is_ok() {
            return None;
        }

        let name = current.file_name()?.to_os_string();
        missing.push(name);
        current = match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
    }
}

/// Write a diagnostic artifact named `name` into `dir`.
pub async fn write_artifact(dir: &Path, name: &str, content: &str) -> Result<PathBuf, WriteError> {
    let target = dir.join(name);
    write_file(&target, content).await?;
    info!(artifact = %target.display(), bytes = content.len(), "wrote artifact");
    Ok(target)
}

async fn write_file(target: &Path, content: &str) -> Result<(), WriteError> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| WriteError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    tokio::fs::write(target, content)
        .await
        .map_err(|source| WriteError::Write {
            path: target.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::FileEntry;
    use tempfile::TempDir;

    fn manifest(entries: &[(&str, &str)]) -> Manifest {
        Manifest {
            files: entries
                .iter()
                .map(|(p, c)| FileEntry {
                    path: p.to_string(),
                    content: c.to_string(),
                })
                .collect(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn round_trip_identity() {
        let dir = TempDir::new().unwrap();
        let m = manifest(&[
            ("README.md", "# hello\n"),
            ("app/login/page.tsx", "export default function Page() {}\n"),
            ("supabase/migrations/001_init.sql", "create table t();"),
            ("empty.txt", ""),
        ]);

        let written = materialize(&m, dir.path()).await.unwrap();
        assert_eq!(written.len(), 4);

        for entry in &m.files {
            let on_disk = std::fs::read_to_string(dir.path().join(&entry.path)).unwrap();
            assert_eq!(on_disk, entry.content, "content mismatch for {}", entry.path);
        }
    }

    #[tokio::test]
    async fn materialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let m = manifest(&[("a/b.txt", "one"), ("c.txt", "two")]);

        materialize(&m, dir.path()).await.unwrap();
        materialize(&m, dir.path()).await.unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("a/b.txt")).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(dir.path().join("c.txt")).unwrap(), "two");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.txt"), "old content that is longer").unwrap();

        materialize(&manifest(&[("x.txt", "new")]), dir.path()).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("x.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn duplicate_paths_last_write_wins() {
        let dir = TempDir::new().unwrap();
        materialize(&manifest(&[("x.txt", "first"), ("x.txt", "second")]), dir.path())
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("x.txt")).unwrap(), "second");
    }

    #[tokio::test]
    async fn refuses_escaping_path_before_any_write() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();

        let m = manifest(&[("ok.txt", "fine"), ("../escaped.txt", "nope"), ("never.txt", "x")]);
        let err = materialize(&m, &root).await.unwrap_err();

        assert!(matches!(err, WriteError::Containment { .. }), "got: {err}");
        assert!(!root.join("ok.txt").exists());
        assert!(!outer.path().join("escaped.txt").exists());
        assert!(!root.join("never.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn refuses_directory_symlink_leading_outside_root() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        let outside = outer.path().join("outside");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let m = manifest(&[("ok.txt", "fine"), ("link/pwned.txt", "x")]);
        let err = materialize(&m, &root).await.unwrap_err();

        assert!(
            matches!(
                &err,
                WriteError::Containment { reason: PathEscape::ThroughSymlink(p), .. } if p == "link/pwned.txt"
            ),
            "got: {err}"
        );
        assert!(!outside.join("pwned.txt").exists());
        assert!(!root.join("ok.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn refuses_file_symlink_leading_outside_root() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let secret = outer.path().join("secret.txt");
        std::fs::write(&secret, "keep").unwrap();
        std::os::unix::fs::symlink(&secret, root.join("notes.txt")).unwrap();

        let err = materialize(&manifest(&[("notes.txt", "clobber")]), &root)
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::Containment { .. }), "got: {err}");
        assert_eq!(std::fs::read_to_string(&secret).unwrap(), "keep");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn refuses_dangling_symlink() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let target = outer.path().join("created-outside.txt");
        std::os::unix::fs::symlink(&target, root.join("dangling.txt")).unwrap();

        let err = materialize(&manifest(&[("dangling.txt", "x")]), &root)
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::Containment { .. }), "got: {err}");
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_inside_root_is_allowed() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        materialize(&manifest(&[("alias/file.txt", "ok")]), dir.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("real/file.txt")).unwrap(), "ok");
    }

    #[tokio::test]
    async fn missing_root_is_created() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("not").join("yet");

        materialize(&manifest(&[("a.txt", "x")]), &root).await.unwrap();

        assert_eq!(std::fs::read_to_string(root.join("a.txt")).unwrap(), "x");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn write_failure_aborts_remaining_entries() {
        let dir = TempDir::new().unwrap();
        // A regular file where a directory is needed makes create_dir_all fail.
        std::fs::write(dir.path().join("blocker"), "").unwrap();

        let m = manifest(&[("first.txt", "1"), ("blocker/inner.txt", "2"), ("third.txt", "3")]);
        let err = materialize(&m, dir.path()).await.unwrap_err();

        assert!(matches!(err, WriteError::CreateDir { .. }), "got: {err}");
        assert!(dir.path().join("first.txt").exists());
        assert!(!dir.path().join("third.txt").exists());
    }

    #[tokio::test]
    async fn plan_paths_resolves_without_writing() {
        let dir = TempDir::new().unwrap();
        let paths = plan_paths(&manifest(&[("a/b.txt", "x")]), dir.path()).await.unwrap();
        assert_eq!(paths, vec![dir.path().join("a").join("b.txt")]);
        assert!(!dir.path().join("a").exists());
    }

    #[tokio::test]
    async fn write_artifact_creates_directory() {
        let dir = TempDir::new().unwrap();
        let artifacts = dir.path().join("diag");
        let path = write_artifact(&artifacts, "AI_RAW_openai.txt", "raw").await.unwrap();
        assert_eq!(path, artifacts.join("AI_RAW_openai.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "raw");
    }
}
