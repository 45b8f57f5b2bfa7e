//! Swapping the compressed file into the original's place.
//!
//! The swap is two renames and is not atomic: if the process dies between
//! them the original survives under its backup name and nothing sits at the
//! original path. A failed second rename moves the original back.
//!
//! An existing `<stem>_original<ext>` from an earlier run is overwritten.

use crate::error::{Result, ShrinkError};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSwapPlan {
    pub original: PathBuf,
    /// `<dir>/<stem>_original<ext>`
    pub backup: PathBuf,
    /// `<source>.compressed<ext>`, a sibling of the source.
    pub temp_output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalPaths {
    pub compressed: PathBuf,
    pub backup: PathBuf,
}

#[derive(Debug)]
pub enum RollbackOutcome {
    Removed(PathBuf),
    NothingToRemove,
    Failed(PathBuf, io::Error),
}

impl FileSwapPlan {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let original = source.into();
        let ext = original
            .extension()
            .map(|e| {
                let mut dotted = OsString::from(".");
                dotted.push(e);
                dotted
            })
            .unwrap_or_default();

        let mut temp = original.clone().into_os_string();
        temp.push(".compressed");
        temp.push(&ext);

        let mut backup_name = original
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_default();
        backup_name.push("_original");
        backup_name.push(&ext);
        let backup = match original.parent() {
            Some(dir) => dir.join(backup_name),
            None => PathBuf::from(backup_name),
        };

        Self {
            original,
            backup,
            temp_output: PathBuf::from(temp),
        }
    }

    /// Move the original aside and the compressed output into its place.
    pub fn commit(self) -> Result<FinalPaths> {
        if self.backup.exists() {
            warn!(
                backup = %self.backup.display(),
                "overwriting an earlier backup; its contents are lost"
            );
        }
        rename(&self.original, &self.backup)?;
        if let Err(e) = rename(&self.temp_output, &self.original) {
            // put the original back so the source path is never left empty
            if let Err(restore) = fs::rename(&self.backup, &self.original) {
                warn!(
                    backup = %self.backup.display(),
                    error = %restore,
                    "could not restore original from backup"
                );
            }
            return Err(e);
        }
        info!(
            compressed = %self.original.display(),
            backup = %self.backup.display(),
            "swap committed"
        );
        Ok(FinalPaths {
            compressed: self.original,
            backup: self.backup,
        })
    }

    /// Delete the temporary output, if there is one.
    pub fn rollback(&self) -> RollbackOutcome {
        match fs::remove_file(&self.temp_output) {
            Ok(()) => {
                debug!(path = %self.temp_output.display(), "temporary output removed");
                RollbackOutcome::Removed(self.temp_output.clone())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => RollbackOutcome::NothingToRemove,
            Err(e) => {
                warn!(path = %self.temp_output.display(), error = %e, "could not remove temporary output");
                RollbackOutcome::Failed(self.temp_output.clone(), e)
            }
        }
    }
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    debug!(from = %from.display(), to = %to.display(), "rename");
    fs::rename(from, to).map_err(|source| ShrinkError::Swap {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn plan_derives_sibling_paths() {
        let plan = FileSwapPlan::new("/videos/holiday.mp4");
        assert_eq!(plan.temp_output, PathBuf::from("/videos/holiday.mp4.compressed.mp4"));
        assert_eq!(plan.backup, PathBuf::from("/videos/holiday_original.mp4"));
    }

    #[test]
    fn plan_keeps_inner_dots_in_stem() {
        let plan = FileSwapPlan::new("clip.final.mkv");
        assert_eq!(plan.backup, PathBuf::from("clip.final_original.mkv"));
        assert_eq!(plan.temp_output, PathBuf::from("clip.final.mkv.compressed.mkv"));
    }

    #[test]
    fn plan_without_extension() {
        let plan = FileSwapPlan::new("/v/raw");
        assert_eq!(plan.temp_output, PathBuf::from("/v/raw.compressed"));
        assert_eq!(plan.backup, PathBuf::from("/v/raw_original"));
    }

    #[test]
    fn commit_swaps_contents() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("movie.mp4");
        fs::write(&source, b"original bytes").unwrap();
        let plan = FileSwapPlan::new(&source);
        fs::write(&plan.temp_output, b"small").unwrap();
        let temp = plan.temp_output.clone();

        let paths = plan.commit().unwrap();

        assert_eq!(fs::read(&paths.compressed).unwrap(), b"small");
        assert_eq!(fs::read(&paths.backup).unwrap(), b"original bytes");
        assert_eq!(paths.backup, dir.path().join("movie_original.mp4"));
        assert!(!temp.exists());
    }

    #[test]
    fn failed_second_rename_restores_original() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("movie.mp4");
        fs::write(&source, b"original").unwrap();

        let err = FileSwapPlan::new(&source).commit().unwrap_err();

        assert!(matches!(err, ShrinkError::Swap { .. }));
        assert_eq!(fs::read(&source).unwrap(), b"original");
        assert!(!dir.path().join("movie_original.mp4").exists());
    }

    #[test]
    fn commit_replaces_stale_backup() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("movie.mp4");
        fs::write(&source, b"second original").unwrap();
        fs::write(dir.path().join("movie_original.mp4"), b"first original").unwrap();
        let plan = FileSwapPlan::new(&source);
        fs::write(&plan.temp_output, b"small").unwrap();

        let paths = plan.commit().unwrap();

        assert_eq!(fs::read(&paths.backup).unwrap(), b"second original");
        assert_eq!(fs::read(&paths.compressed).unwrap(), b"small");
    }

    #[test]
    fn rollback_removes_temp_and_leaves_original() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.mov");
        fs::write(&source, b"keep me").unwrap();
        let plan = FileSwapPlan::new(&source);
        fs::write(&plan.temp_output, b"partial").unwrap();

        assert!(matches!(plan.rollback(), RollbackOutcome::Removed(_)));
        assert!(!plan.temp_output.exists());
        assert_eq!(fs::read(&source).unwrap(), b"keep me");
        assert!(matches!(plan.rollback(), RollbackOutcome::NothingToRemove));
    }
}
