//! Two-phase move of stale patient directories.
//!
//! The tool only ever moves directories from the clinic into the holding directory. The
//! operator then moves the holding contents to the final archive with their own file manager,
//! and [`MovePlan::verify`] confirms that every planned directory arrived there.
//!
//! A batch is all-or-nothing at the gate: if any precondition fails, nothing moves. Once
//! moving has started, a failure stops the batch and what already moved stays moved; the
//! [`MoveReport`] says exactly which entries got where, and verification picks up the rest.

use crate::directories::PatientDirectory;
use crate::filesystem::Filesystem;
use crate::{ArchiveError, ArchiveResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One directory's journey: clinic → holding → archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlanEntry {
    pub source: PatientDirectory,
    pub holding: PathBuf,
    pub archive: PathBuf,
}

/// Why a move batch may not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum PreconditionFailure {
    /// The directory was moved or deleted since it was discovered.
    SourceMissing(PathBuf),
    /// Something already sits at the final archive location.
    ArchiveDestinationExists(PathBuf),
    /// The holding directory still holds a previous batch.
    HoldingNotEmpty(PathBuf),
    /// The holding directory itself is missing.
    HoldingMissing(PathBuf),
}

impl fmt::Display for PreconditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceMissing(path) => write!(f, "`{}` does not exist anymore", path.display()),
            Self::ArchiveDestinationExists(path) => write!(
                f,
                "the final intended destination of `{}` already exists",
                path.display()
            ),
            Self::HoldingNotEmpty(path) => write!(
                f,
                "the holding directory `{}` is not empty; move its contents to the archive first",
                path.display()
            ),
            Self::HoldingMissing(path) => {
                write!(f, "the holding directory `{}` does not exist", path.display())
            }
        }
    }
}

/// A move that was attempted and failed.
#[derive(Debug)]
pub struct MoveFailure {
    pub entry: MovePlanEntry,
    pub error: ArchiveError,
}

/// Outcome of [`MovePlan::execute`].
#[derive(Debug, Default)]
pub struct MoveReport {
    pub moved: Vec<MovePlanEntry>,
    pub failed: Option<MoveFailure>,
    pub not_attempted: Vec<MovePlanEntry>,
}

impl MoveReport {
    /// Whether every planned move happened.
    pub fn is_complete(&self) -> bool {
        self.failed.is_none() && self.not_attempted.is_empty()
    }
}

/// Outcome of [`MovePlan::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Sources that still exist in the clinic.
    pub left_behind: Vec<PathBuf>,
    /// Archive locations with nothing there.
    pub not_in_archive: Vec<PathBuf>,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.left_behind.is_empty() && self.not_in_archive.is_empty()
    }
}

/// The moves for one batch of selected directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePlan {
    holding_root: PathBuf,
    archive_root: PathBuf,
    entries: Vec<MovePlanEntry>,
}

impl MovePlan {
    /// Plans moves of `selected` into `holding_root`, bound for `archive_root`.
    pub fn new(selected: &[PatientDirectory], holding_root: &Path, archive_root: &Path) -> Self {
        let entries = selected
            .iter()
            .map(|source| MovePlanEntry {
                holding: source.relocated_to(holding_root),
                archive: source.relocated_to(archive_root),
                source: source.clone(),
            })
            .collect();

        Self {
            holding_root: holding_root.to_path_buf(),
            archive_root: archive_root.to_path_buf(),
            entries,
        }
    }

    pub fn holding_root(&self) -> &Path {
        &self.holding_root
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    pub fn entries(&self) -> &[MovePlanEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every reason the batch may not run right now. Empty means it may.
    ///
    /// # Errors
    ///
    /// Returns an error if the holding directory cannot be listed.
    pub fn check_preconditions(
        &self,
        fs: &impl Filesystem,
    ) -> ArchiveResult<Vec<PreconditionFailure>> {
        let mut failures = Vec::new();

        for entry in &self.entries {
            if !fs.exists(entry.source.path()) {
                failures.push(PreconditionFailure::SourceMissing(
                    entry.source.path().to_path_buf(),
                ));
            }
        }

        for entry in &self.entries {
            if fs.exists(&entry.archive) {
                failures.push(PreconditionFailure::ArchiveDestinationExists(
                    entry.archive.clone(),
                ));
            }
        }

        if !fs.exists(&self.holding_root) {
            failures.push(PreconditionFailure::HoldingMissing(self.holding_root.clone()));
        } else if !fs.children(&self.holding_root)?.is_empty() {
            failures.push(PreconditionFailure::HoldingNotEmpty(self.holding_root.clone()));
        }

        for failure in &failures {
            tracing::warn!("{}", failure);
        }
        Ok(failures)
    }

    /// Moves every source into the holding directory.
    ///
    /// Preconditions are re-checked first, as the filesystem may have changed since the plan
    /// was shown. The first failed move stops the batch; nothing is rolled back.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::MoveBlocked` with every failed precondition if the batch may not
    /// run, in which case nothing was moved. Failures of individual moves are reported in the
    /// returned [`MoveReport`], not as an error.
    pub fn execute(&self, fs: &impl Filesystem) -> ArchiveResult<MoveReport> {
        let failures = self.check_preconditions(fs)?;
        if !failures.is_empty() {
            return Err(ArchiveError::MoveBlocked(failures));
        }

        let mut report = MoveReport::default();
        let mut remaining = self.entries.iter();

        for entry in remaining.by_ref() {
            match fs.move_dir(entry.source.path(), &entry.holding) {
                Ok(()) => {
                    tracing::info!(
                        "moved {} => {}",
                        entry.source.path().display(),
                        entry.holding.display()
                    );
                    report.moved.push(entry.clone());
                }
                Err(error) => {
                    tracing::error!("move batch stopped: {}", error);
                    report.failed = Some(MoveFailure {
                        entry: entry.clone(),
                        error,
                    });
                    break;
                }
            }
        }
        report.not_attempted = remaining.cloned().collect();

        tracing::info!(
            "moved {} of {} planned directories into {}",
            report.moved.len(),
            self.entries.len(),
            self.holding_root.display()
        );
        Ok(report)
    }

    /// Checks that each planned directory left the clinic and reached the final archive.
    pub fn verify(&self, fs: &impl Filesystem) -> VerificationReport {
        let mut report = VerificationReport::default();

        for entry in &self.entries {
            if fs.exists(entry.source.path()) {
                tracing::warn!("{} was left behind", entry.source.path().display());
                report.left_behind.push(entry.source.path().to_path_buf());
            }
            if !fs.exists(&entry.archive) {
                tracing::warn!("{} was not found in archive", entry.archive.display());
                report.not_in_archive.push(entry.archive.clone());
            }
        }

        report
    }
}
