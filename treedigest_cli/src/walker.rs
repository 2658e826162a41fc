//! Directory walker driving the digest pool
//!
//! Starts one worker pool for the whole run and feeds it every regular file
//! under the root, sorted by file name. Symbolic links are not followed.

use log::{debug, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use treedigest_core::{
    DigestConfig, DigestRegistry, DigestStats, FileDigest, end_workers, start_workers,
};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum WalkError {
    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error(transparent)]
    Digest(#[from] treedigest_core::Error),

    /// Raised by the per-file output callback
    #[error("Failed to write output for {}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type Result<T> = std::result::Result<T, WalkError>;

/// Outcome of one walk
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WalkSummary {
    pub stats: DigestStats,
    /// Directory entries that could not be read during traversal
    pub walk_errors: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl WalkSummary {
    /// Files without a digest plus unreadable directory entries
    pub fn error_count(&self) -> u64 {
        self.stats.files_failed + self.walk_errors
    }
}

pub struct Walker {
    root: PathBuf,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            return Err(WalkError::NotFound(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Regular files under the root in traversal order
    ///
    /// Unreadable entries are yielded as errors so the caller can count them.
    pub fn files(&self) -> impl Iterator<Item = walkdir::Result<PathBuf>> + use<> {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
    }

    /// Digest every file, handing each result to `on_digest`
    ///
    /// The pool is started before the first file and shut down after the
    /// last. Unreadable files are counted and skipped; a worker failure
    /// aborts the walk.
    pub async fn run<F>(
        &self,
        config: &DigestConfig,
        registry: &DigestRegistry,
        mut on_digest: F,
    ) -> Result<WalkSummary>
    where
        F: FnMut(&Path, &FileDigest) -> anyhow::Result<()>,
    {
        let start = Instant::now();
        let mut pool = start_workers(config, registry)?;
        let mut walk_errors = 0;

        for entry in self.files() {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    walk_errors += 1;
                    continue;
                }
            };

            match pool.digest_file(&path).await? {
                Some(digest) => on_digest(&path, &digest)
                    .map_err(|e| WalkError::Output {
                        path,
                        source: e.into(),
                    })?,
                None => warn!("No digest for {}", path.display()),
            }
        }

        let stats = end_workers(pool).await?;
        let summary = WalkSummary {
            stats,
            walk_errors,
            elapsed: start.elapsed(),
        };

        debug!(
            "Walked {}: {} files, {} errors in {:.2}s",
            self.root.display(),
            summary.stats.files_digested,
            summary.error_count(),
            summary.elapsed.as_secs_f64()
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("b/nested")).unwrap();
        fs::write(root.join("c.txt"), b"abc").unwrap();
        fs::write(root.join("a.txt"), b"").unwrap();
        fs::write(root.join("b/nested/d.bin"), vec![7u8; 5000]).unwrap();
        temp_dir
    }

    fn config() -> DigestConfig {
        DigestConfig::test().with_algorithms(["crc32", "md5"])
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            Walker::new(temp_dir.path().join("nope")),
            Err(WalkError::NotFound(_))
        ));
    }

    #[test]
    fn test_files_are_sorted_and_regular() {
        let temp_dir = tree();
        let walker = Walker::new(temp_dir.path()).unwrap();

        let names: Vec<_> = walker
            .files()
            .map(|p| {
                p.unwrap()
                    .strip_prefix(temp_dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();

        assert_eq!(names, vec!["a.txt", "b/nested/d.bin", "c.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp_dir = tree();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            temp_dir.path().join("file-link"),
        )
        .unwrap();

        let walker = Walker::new(temp_dir.path()).unwrap();
        assert_eq!(walker.files().count(), 3);
    }

    #[tokio::test]
    async fn test_run_digests_every_file() {
        let temp_dir = tree();
        let walker = Walker::new(temp_dir.path()).unwrap();
        let registry = DigestRegistry::builtin();

        let mut seen = Vec::new();
        let summary = walker
            .run(&config(), &registry, |path, digest| {
                seen.push((path.file_name().unwrap().to_owned(), digest.clone()));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(summary.stats.files_digested, 3);
        assert_eq!(summary.error_count(), 0);
        assert_eq!(summary.stats.bytes_read, 5003);
        assert_eq!(seen[2].1.digests["crc32"], "352441c2");
        assert_eq!(seen[0].1.digests["crc32"], "00000000");
    }

    #[tokio::test]
    async fn test_single_file_root() {
        let temp_dir = tree();
        let walker = Walker::new(temp_dir.path().join("c.txt")).unwrap();
        let registry = DigestRegistry::builtin();

        let mut count = 0;
        let summary = walker
            .run(&config(), &registry, |_, digest| {
                assert_eq!(digest.digests["md5"], "900150983cd24fb0d6963f7d28e17f72");
                count += 1;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(summary.stats.files_digested, 1);
    }

    #[tokio::test]
    async fn test_output_failure_aborts_walk() {
        let temp_dir = tree();
        let walker = Walker::new(temp_dir.path()).unwrap();
        let registry = DigestRegistry::builtin();

        let result = walker
            .run(&config(), &registry, |_, _| anyhow::bail!("pipe closed"))
            .await;
        assert!(matches!(result, Err(WalkError::Output { .. })));
    }
}
