//! Filesystem access used by the planner.
//!
//! Every read and write the planner performs goes through the [`Filesystem`] trait, so the
//! staleness and move logic can be exercised against an in-memory tree with controlled
//! timestamps. [`StdFilesystem`] is the real implementation over `std::fs` and the `glob` crate.
//!
//! `*` never crosses a path separator but does match a leading `.`: a hidden file left in the
//! holding directory still makes it non-empty, and a recently written hidden file still counts
//! as activity in a patient directory.

use crate::{ArchiveError, ArchiveResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Matching rules shared by every glob the planner issues.
pub fn match_options() -> glob::MatchOptions {
    glob::MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// Builds a glob pattern from a literal directory and a pattern relative to it.
///
/// The directory part is escaped so that characters such as `[` in a site path are matched
/// literally.
pub fn pattern_within(dir: &Path, relative: &str) -> String {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    format!("{}/{}", escaped.trim_end_matches('/'), relative)
}

/// The filesystem operations the archive planner depends on.
pub trait Filesystem {
    /// Lists the paths matching `pattern`, in lexical order.
    ///
    /// A pattern under a directory that does not exist matches nothing.
    fn glob(&self, pattern: &str) -> ArchiveResult<Vec<PathBuf>>;

    /// Last-modified time of `path`.
    fn modified_time(&self, path: &Path) -> ArchiveResult<DateTime<Utc>>;

    /// Whether `path` currently exists. Queried live; never cached.
    fn exists(&self, path: &Path) -> bool;

    /// Moves the directory `from` to `to`. `to` must not exist.
    fn move_dir(&self, from: &Path, to: &Path) -> ArchiveResult<()>;

    /// Lists every entry directly inside `dir`, hidden ones included.
    fn children(&self, dir: &Path) -> ArchiveResult<Vec<PathBuf>> {
        self.glob(&pattern_within(dir, "*"))
    }
}

/// [`Filesystem`] backed by the host operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdFilesystem;

impl StdFilesystem {
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for StdFilesystem {
    fn glob(&self, pattern: &str) -> ArchiveResult<Vec<PathBuf>> {
        let paths =
            glob::glob_with(pattern, match_options()).map_err(|source| ArchiveError::GlobPattern {
                pattern: pattern.to_owned(),
                source,
            })?;

        paths
            .map(|entry| {
                entry.map_err(|e| ArchiveError::Listing {
                    path: e.path().to_path_buf(),
                    source: e.into_error(),
                })
            })
            .collect()
    }

    fn modified_time(&self, path: &Path) -> ArchiveResult<DateTime<Utc>> {
        let modified = fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .map_err(|source| ArchiveError::ModifiedTime {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn move_dir(&self, from: &Path, to: &Path) -> ArchiveResult<()> {
        if to.exists() {
            return Err(ArchiveError::MoveTargetExists {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
        }

        let move_error = |source: std::io::Error| ArchiveError::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };

        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if is_cross_device(&e) => {
                tracing::debug!(
                    "rename of {} crosses filesystems, copying instead",
                    from.display()
                );
                copy_dir_recursive(from, to).map_err(move_error)?;
                fs::remove_dir_all(from).map_err(move_error)
            }
            Err(e) => Err(move_error(e)),
        }
    }
}

#[cfg(unix)]
fn is_cross_device(error: &std::io::Error) -> bool {
    // EXDEV
    error.raw_os_error() == Some(18)
}

#[cfg(windows)]
fn is_cross_device(error: &std::io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    error.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_error: &std::io::Error) -> bool {
    false
}

/// Recursively copies a directory and its contents to a destination.
///
/// File modification times are carried over so a patient directory copied across filesystems
/// keeps its staleness.
///
/// # Errors
/// Returns an `std::io::Error` if:
/// - creating the destination directory fails,
/// - reading source directory entries fails,
/// - copying a file fails.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
            let modified = entry.metadata()?.modified()?;
            match fs::File::options().write(true).open(&dst_path) {
                Ok(file) => file.set_modified(modified)?,
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    tracing::warn!(
                        "could not keep modification time of {}: {}",
                        dst_path.display(),
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}
