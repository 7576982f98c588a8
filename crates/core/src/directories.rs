//! Patient directory discovery.
//!
//! A Monaco clinic directory holds one sub-directory per patient plan set, named
//! `{sequence}~{patient_id}`. A directory only counts as a patient directory once it carries a
//! `demographic.*` file, which rules out half-created or foreign folders:
//!
//! ```text
//! <clinic>/
//! ├── 001~P1/
//! │   ├── demographic.001
//! │   └── plan/
//! │       └── ...
//! └── 002~P2/
//!     └── demographic.002
//! ```

use crate::constants::DEMOGRAPHIC_FILE_PATTERN;
use crate::filesystem::{pattern_within, Filesystem};
use crate::{ArchiveError, ArchiveResult};
use archive_types::PatientDirectoryName;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A patient directory within a clinic, identified by its path.
///
/// Existence is not stored; ask the [`Filesystem`] when it matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct PatientDirectory {
    path: PathBuf,
    name: PatientDirectoryName,
}

impl PatientDirectory {
    /// Wraps a path whose final component is a `{sequence}~{patient_id}` name.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::UnnamedPath` if the path has no UTF-8 final component, or
    /// `ArchiveError::InvalidDirectoryName` if that component is not a patient directory name.
    pub fn new(path: impl Into<PathBuf>) -> ArchiveResult<Self> {
        let path = path.into();
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            return Err(ArchiveError::UnnamedPath(path));
        };
        let name = PatientDirectoryName::parse(file_name)?;
        Ok(Self { path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &PatientDirectoryName {
        &self.name
    }

    /// Where this directory lands when moved into `root`.
    pub fn relocated_to(&self, root: &Path) -> PathBuf {
        root.join(self.name.as_str())
    }
}

impl TryFrom<PathBuf> for PatientDirectory {
    type Error = ArchiveError;

    fn try_from(path: PathBuf) -> ArchiveResult<Self> {
        Self::new(path)
    }
}

impl From<PatientDirectory> for PathBuf {
    fn from(directory: PatientDirectory) -> Self {
        directory.path
    }
}

/// Finds every patient directory in `clinic`.
///
/// Matches `<clinic>/*~*/demographic.*` and returns the parent of each match, once per
/// directory, in the order the glob yields them. Names that match the glob but are not a
/// valid `{sequence}~{patient_id}` (for example `1~2~3`) are logged and skipped.
///
/// # Errors
///
/// Returns an error if the clinic directory cannot be listed.
pub fn discover_patient_directories(
    fs: &impl Filesystem,
    clinic: &Path,
) -> ArchiveResult<Vec<PatientDirectory>> {
    let demographic_files = fs.glob(&pattern_within(clinic, DEMOGRAPHIC_FILE_PATTERN))?;

    let mut seen = HashSet::new();
    let mut directories = Vec::new();

    for demographic_file in demographic_files {
        let Some(parent) = demographic_file.parent() else {
            continue;
        };
        if !seen.insert(parent.to_path_buf()) {
            continue;
        }

        match PatientDirectory::new(parent) {
            Ok(directory) => directories.push(directory),
            Err(e) => tracing::warn!("skipping {}: {}", parent.display(), e),
        }
    }

    tracing::info!(
        "found {} patient directories in {}",
        directories.len(),
        clinic.display()
    );
    Ok(directories)
}

/// Sorts directories by patient ID, then sequence number.
pub fn sort_by_patient(directories: &mut [PatientDirectory]) {
    directories.sort_by_cached_key(|directory| directory.name().sort_key());
}
