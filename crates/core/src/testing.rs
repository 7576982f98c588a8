//! In-memory [`Filesystem`] for tests that need controlled timestamps.

use crate::filesystem::{match_options, Filesystem};
use crate::{ArchiveError, ArchiveResult};
use chrono::{DateTime, Duration, Utc};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub(crate) struct MemoryFilesystem {
    entries: RefCell<BTreeMap<PathBuf, DateTime<Utc>>>,
    failing_moves: RefCell<BTreeSet<PathBuf>>,
}

impl MemoryFilesystem {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `path` and any missing parents, all modified at `modified`.
    pub(crate) fn add(&self, path: impl AsRef<Path>, modified: DateTime<Utc>) {
        let path = path.as_ref();
        let mut entries = self.entries.borrow_mut();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            entries.entry(ancestor.to_path_buf()).or_insert(modified);
        }
        entries.insert(path.to_path_buf(), modified);
    }

    /// Adds `path` modified `weeks` before `now`.
    pub(crate) fn add_weeks_ago(&self, path: impl AsRef<Path>, now: DateTime<Utc>, weeks: i64) {
        self.add(path, now - Duration::weeks(weeks));
    }

    pub(crate) fn fail_moves_of(&self, path: impl AsRef<Path>) {
        self.failing_moves
            .borrow_mut()
            .insert(path.as_ref().to_path_buf());
    }
}

impl Filesystem for MemoryFilesystem {
    fn glob(&self, pattern: &str) -> ArchiveResult<Vec<PathBuf>> {
        let compiled =
            glob::Pattern::new(pattern).map_err(|source| ArchiveError::GlobPattern {
                pattern: pattern.to_owned(),
                source,
            })?;
        Ok(self
            .entries
            .borrow()
            .keys()
            .filter(|path| compiled.matches_path_with(path, match_options()))
            .cloned()
            .collect())
    }

    fn modified_time(&self, path: &Path) -> ArchiveResult<DateTime<Utc>> {
        self.entries
            .borrow()
            .get(path)
            .copied()
            .ok_or_else(|| ArchiveError::ModifiedTime {
                path: path.to_path_buf(),
                source: ErrorKind::NotFound.into(),
            })
    }

    fn exists(&self, path: &Path) -> bool {
        self.entries.borrow().contains_key(path)
    }

    fn move_dir(&self, from: &Path, to: &Path) -> ArchiveResult<()> {
        if self.failing_moves.borrow().contains(from) {
            return Err(ArchiveError::Move {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source: ErrorKind::PermissionDenied.into(),
            });
        }
        if self.exists(to) {
            return Err(ArchiveError::MoveTargetExists {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
        }

        let mut entries = self.entries.borrow_mut();
        let moved: Vec<_> = entries
            .keys()
            .filter(|path| path.starts_with(from))
            .cloned()
            .collect();
        if moved.is_empty() {
            return Err(ArchiveError::Move {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source: ErrorKind::NotFound.into(),
            });
        }
        for path in moved {
            if let Some(modified) = entries.remove(&path) {
                let target = match path.strip_prefix(from) {
                    Ok(relative) if !relative.as_os_str().is_empty() => to.join(relative),
                    _ => to.to_path_buf(),
                };
                entries.insert(target, modified);
            }
        }
        Ok(())
    }
}
