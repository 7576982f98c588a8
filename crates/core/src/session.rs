//! State carried between operator actions.
//!
//! The operator works through the same steps every time: find patient directories, calculate
//! how long each has been untouched, choose how many weeks to keep, move, and later verify.
//! [`ArchiveSession`] holds the results of the earlier steps so later steps can use them, and
//! drops derived data whenever what it was derived from is refreshed.

use crate::config::SiteDirectories;
use crate::directories::{discover_patient_directories, PatientDirectory};
use crate::filesystem::Filesystem;
use crate::moves::MovePlan;
use crate::selection::select_for_archive;
use crate::staleness::{weeks_since_touched, ProgressCb, StalenessRecord};
use crate::ArchiveResult;
use chrono::{DateTime, Utc};

/// One operator's archiving session for a site.
#[derive(Debug, Clone)]
pub struct ArchiveSession {
    site: SiteDirectories,
    weeks_to_keep: u32,
    directories: Vec<PatientDirectory>,
    staleness: Option<StalenessRecord>,
}

impl ArchiveSession {
    pub fn new(site: SiteDirectories, weeks_to_keep: u32) -> Self {
        Self {
            site,
            weeks_to_keep,
            directories: Vec::new(),
            staleness: None,
        }
    }

    pub fn site(&self) -> &SiteDirectories {
        &self.site
    }

    pub fn weeks_to_keep(&self) -> u32 {
        self.weeks_to_keep
    }

    pub fn directories(&self) -> &[PatientDirectory] {
        &self.directories
    }

    pub fn staleness(&self) -> Option<&StalenessRecord> {
        self.staleness.as_ref()
    }

    /// Re-scans the clinic. Any previous staleness calculation is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails; the session is left unchanged in that case.
    pub fn refresh_directories(&mut self, fs: &impl Filesystem) -> ArchiveResult<usize> {
        let directories = discover_patient_directories(fs, &self.site.clinic())?;
        self.directories = directories;
        self.staleness = None;
        Ok(self.directories.len())
    }

    /// Calculates staleness for the directories found by the last scan, replacing any previous
    /// record. Directories that cannot be assessed end up in the record's failures.
    pub fn recompute_staleness(
        &mut self,
        fs: &impl Filesystem,
        now: DateTime<Utc>,
        progress: Option<ProgressCb<'_>>,
    ) -> &StalenessRecord {
        let record = weeks_since_touched(fs, &self.directories, now, progress);
        self.staleness.insert(record)
    }

    pub fn set_weeks_to_keep(&mut self, weeks_to_keep: u32) {
        self.weeks_to_keep = weeks_to_keep;
    }

    /// Directories selected at the current threshold. Empty until staleness is calculated.
    pub fn selected(&self) -> Vec<PatientDirectory> {
        self.staleness
            .as_ref()
            .map(|record| select_for_archive(record, self.weeks_to_keep))
            .unwrap_or_default()
    }

    /// Move plan for the current selection, or `None` until staleness is calculated.
    pub fn move_plan(&self) -> Option<MovePlan> {
        self.staleness.as_ref().map(|record| {
            MovePlan::new(
                &select_for_archive(record, self.weeks_to_keep),
                &self.site.holding(),
                self.site.destination(),
            )
        })
    }
}
