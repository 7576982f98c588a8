//! Weeks-since-touched calculation.
//!
//! A patient directory is only as stale as the most recently modified item inside it. The items
//! considered are the direct children of the directory plus the direct children of its `plan`
//! sub-directory, since Monaco rewrites plan files without touching the parent. The staleness of
//! a directory is therefore the *minimum* age across those items, in weeks.

use crate::constants::{PLAN_DIR_NAME, SECONDS_PER_WEEK};
use crate::directories::PatientDirectory;
use crate::filesystem::Filesystem;
use crate::{ArchiveError, ArchiveResult};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A directory whose staleness could not be worked out, and why.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StalenessFailure {
    pub directory: PatientDirectory,
    pub reason: String,
}

/// Progress of a staleness calculation, handed to the optional progress callback.
#[derive(Debug, Clone, Copy)]
pub struct StalenessProgress<'a> {
    pub directory: &'a PatientDirectory,
    pub completed: usize,
    pub total: usize,
}

impl StalenessProgress<'_> {
    /// Fraction of directories processed, from 0 to 1.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

pub type ProgressCb<'a> = &'a mut dyn FnMut(StalenessProgress<'_>);

/// Weeks since a patient directory was last touched.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StalenessEntry {
    pub directory: PatientDirectory,
    pub weeks: f64,
}

/// Staleness for a set of directories, in the order they were calculated.
///
/// Built in one pass by [`weeks_since_touched`] and never modified afterwards; recalculate to
/// refresh it. Directories that could not be assessed are listed in [`failures`] and have no
/// entry, so they are never selected for archiving.
///
/// [`failures`]: StalenessRecord::failures
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct StalenessRecord {
    entries: Vec<StalenessEntry>,
    failures: Vec<StalenessFailure>,
    calculated_at: Option<DateTime<Utc>>,
}

impl StalenessRecord {
    /// Builds a record from already calculated entries.
    pub fn from_entries(entries: Vec<StalenessEntry>, calculated_at: DateTime<Utc>) -> Self {
        Self {
            entries,
            failures: Vec::new(),
            calculated_at: Some(calculated_at),
        }
    }

    pub fn entries(&self) -> &[StalenessEntry] {
        &self.entries
    }

    pub fn failures(&self) -> &[StalenessFailure] {
        &self.failures
    }

    pub fn calculated_at(&self) -> Option<DateTime<Utc>> {
        self.calculated_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Staleness of `directory`, if it was part of the calculation.
    pub fn weeks(&self, directory: &PatientDirectory) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| &entry.directory == directory)
            .map(|entry| entry.weeks)
    }

    /// Entries ordered most stale first.
    pub fn by_weeks_descending(&self) -> Vec<&StalenessEntry> {
        let mut sorted: Vec<_> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.weeks.total_cmp(&a.weeks));
        sorted
    }
}

/// Converts the gap between `modified` and `now` to weeks.
///
/// Modification times in the future are treated as touched just now.
pub fn weeks_between(modified: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = (now - modified).num_milliseconds() as f64 / 1000.0;
    (seconds / SECONDS_PER_WEEK).max(0.0)
}

/// Paths whose modification times decide the staleness of `directory`.
///
/// # Errors
///
/// Returns an error if either listing fails. A missing `plan` directory contributes nothing.
pub fn paths_to_check(
    fs: &impl Filesystem,
    directory: &PatientDirectory,
) -> ArchiveResult<Vec<PathBuf>> {
    let mut paths = fs.children(directory.path())?;
    paths.extend(fs.children(&directory.path().join(PLAN_DIR_NAME))?);
    Ok(paths)
}

/// Minimum weeks since any checked item in `directory` was modified.
///
/// # Errors
///
/// Returns `ArchiveError::NoModificationData` if the directory and its `plan` sub-directory
/// are both empty, or any error from listing or reading modification times.
pub fn directory_staleness(
    fs: &impl Filesystem,
    directory: &PatientDirectory,
    now: DateTime<Utc>,
) -> ArchiveResult<f64> {
    let mut minimum: Option<f64> = None;

    for path in paths_to_check(fs, directory)? {
        let modified = fs.modified_time(&path)?;
        if modified > now {
            tracing::warn!(
                "{} is modified in the future ({}), counting it as touched now",
                path.display(),
                modified
            );
        }
        let weeks = weeks_between(modified, now);
        minimum = Some(minimum.map_or(weeks, |current| current.min(weeks)));
    }

    minimum.ok_or_else(|| ArchiveError::NoModificationData {
        directory: directory.path().to_path_buf(),
    })
}

/// Calculates weeks since touched for every directory.
///
/// `now` is the reference time for all directories, so one calculation is internally
/// consistent however long the scan takes. `progress`, when given, is called after each
/// directory and has no influence on the result.
///
/// A directory that cannot be assessed (see [`directory_staleness`]) is logged and recorded as
/// a [`StalenessFailure`]; the remaining directories are still assessed.
pub fn weeks_since_touched(
    fs: &impl Filesystem,
    directories: &[PatientDirectory],
    now: DateTime<Utc>,
    mut progress: Option<ProgressCb<'_>>,
) -> StalenessRecord {
    let total = directories.len();
    let mut record = StalenessRecord::from_entries(Vec::with_capacity(total), now);

    for (index, directory) in directories.iter().enumerate() {
        match directory_staleness(fs, directory, now) {
            Ok(weeks) => {
                tracing::debug!("{}: {:.2} weeks since touched", directory.name(), weeks);
                record.entries.push(StalenessEntry {
                    directory: directory.clone(),
                    weeks,
                });
            }
            Err(e) => {
                tracing::warn!("cannot assess {}: {}", directory.name(), e);
                record.failures.push(StalenessFailure {
                    directory: directory.clone(),
                    reason: e.to_string(),
                });
            }
        }

        if let Some(cb) = progress.as_mut() {
            cb(StalenessProgress {
                directory,
                completed: index + 1,
                total,
            });
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::StdFilesystem;
    use crate::testing::MemoryFilesystem;
    use chrono::{Duration, TimeZone};
    use std::path::Path;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn directory(path: &str) -> PatientDirectory {
        PatientDirectory::new(path).unwrap()
    }

    #[test]
    fn test_weeks_between() {
        assert_eq!(weeks_between(now() - Duration::weeks(3), now()), 3.0);
        assert_eq!(weeks_between(now() - Duration::days(3), now()), 3.0 / 7.0);
        assert_eq!(weeks_between(now() + Duration::days(1), now()), 0.0);
    }

    #[test]
    fn test_staleness_is_most_recent_item() {
        let now = now();
        let fs = MemoryFilesystem::new();
        fs.add_weeks_ago("/clinic/001~P1/demographic.001", now, 10);
        fs.add_weeks_ago("/clinic/001~P1/a", now, 3);
        fs.add_weeks_ago("/clinic/001~P1/plan", now, 1);

        let weeks = directory_staleness(&fs, &directory("/clinic/001~P1"), now).unwrap();
        assert_eq!(weeks, 1.0);
    }

    #[test]
    fn test_plan_children_count() {
        let now = now();
        let fs = MemoryFilesystem::new();
        fs.add_weeks_ago("/clinic/001~P1/demographic.001", now, 60);
        fs.add_weeks_ago("/clinic/001~P1/plan", now, 60);
        fs.add_weeks_ago("/clinic/001~P1/plan/beam.dat", now, 2);
        fs.add_weeks_ago("/clinic/001~P1/plan/nested/deeper", now, 40);

        let weeks = directory_staleness(&fs, &directory("/clinic/001~P1"), now).unwrap();
        assert_eq!(weeks, 2.0);
    }

    #[test]
    fn test_hidden_items_count_as_activity() {
        let now = now();
        let fs = MemoryFilesystem::new();
        fs.add_weeks_ago("/clinic/001~P1/demographic.001", now, 100);
        fs.add_weeks_ago("/clinic/001~P1/.recent", now, 0);

        let weeks = directory_staleness(&fs, &directory("/clinic/001~P1"), now).unwrap();
        assert_eq!(weeks, 0.0);
    }

    #[test]
    fn test_empty_directory_fails_explicitly() {
        let now = now();
        let fs = MemoryFilesystem::new();
        fs.add("/clinic/001~P1", now);

        let err = directory_staleness(&fs, &directory("/clinic/001~P1"), now).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::NoModificationData { ref directory } if directory == Path::new("/clinic/001~P1")
        ));
    }

    #[test]
    fn test_weeks_since_touched_reports_progress_in_order() {
        let now = now();
        let fs = MemoryFilesystem::new();
        fs.add_weeks_ago("/clinic/002~P2/demographic.002", now, 5);
        fs.add_weeks_ago("/clinic/001~P1/demographic.001", now, 80);

        let directories = vec![directory("/clinic/002~P2"), directory("/clinic/001~P1")];
        let mut seen = Vec::new();
        let mut cb = |p: StalenessProgress<'_>| {
            seen.push((p.directory.name().to_string(), p.fraction()));
        };

        let record = weeks_since_touched(&fs, &directories, now, Some(&mut cb));

        assert_eq!(
            seen,
            vec![("002~P2".to_string(), 0.5), ("001~P1".to_string(), 1.0)]
        );
        assert_eq!(record.len(), 2);
        assert_eq!(record.entries()[0].directory, directories[0]);
        assert_eq!(record.weeks(&directories[1]), Some(80.0));
        assert_eq!(record.calculated_at(), Some(now));
        assert_eq!(
            record.by_weeks_descending()[0].directory.name().as_str(),
            "001~P1"
        );
    }

    #[test]
    fn test_weeks_since_touched_without_progress() {
        let now = now();
        let fs = MemoryFilesystem::new();
        fs.add_weeks_ago("/clinic/001~P1/demographic.001", now, 1);

        let record = weeks_since_touched(&fs, &[directory("/clinic/001~P1")], now, None);
        assert_eq!(record.entries()[0].weeks, 1.0);
        assert!(record.failures().is_empty());
    }

    #[test]
    fn test_unassessable_directory_does_not_stop_the_others() {
        let now = now();
        let fs = MemoryFilesystem::new();
        fs.add_weeks_ago("/clinic/001~P1/demographic.001", now, 70);
        fs.add("/clinic/002~P2", now);
        fs.add_weeks_ago("/clinic/003~P3/demographic.003", now, 4);

        let directories = vec![
            directory("/clinic/001~P1"),
            directory("/clinic/002~P2"),
            directory("/clinic/003~P3"),
        ];
        let mut completed = 0;
        let mut cb = |p: StalenessProgress<'_>| completed = p.completed;
        let record = weeks_since_touched(&fs, &directories, now, Some(&mut cb));

        assert_eq!(completed, 3);
        assert_eq!(record.len(), 2);
        assert_eq!(record.weeks(&directories[0]), Some(70.0));
        assert_eq!(record.weeks(&directories[1]), None);
        assert_eq!(record.weeks(&directories[2]), Some(4.0));
        assert_eq!(record.failures().len(), 1);
        assert_eq!(record.failures()[0].directory, directories[1]);
        assert!(record.failures()[0].reason.contains("002~P2"));
    }

    #[test]
    #[cfg(unix)]
    fn test_staleness_on_real_files() {
        use std::time::SystemTime;

        let temp = tempfile::TempDir::new().unwrap();
        let patient = temp.path().join("001~P1");
        std::fs::create_dir_all(patient.join("plan")).unwrap();

        let reference = SystemTime::now();
        let week = std::time::Duration::from_secs(7 * 24 * 60 * 60);
        for (name, weeks) in [("demographic.001", 10), ("notes", 3), ("plan/p1", 1)] {
            let file = std::fs::File::create(patient.join(name)).unwrap();
            file.set_modified(reference - week * weeks).unwrap();
        }
        // Creating plan/p1 touched the plan directory itself.
        let plan_dir = std::fs::File::open(patient.join("plan")).unwrap();
        plan_dir.set_modified(reference - week * 12).unwrap();
        drop(plan_dir);

        let directory = PatientDirectory::new(&patient).unwrap();
        let now = DateTime::<Utc>::from(reference);

        let weeks = directory_staleness(&StdFilesystem, &directory, now).unwrap();
        assert!((weeks - 1.0).abs() < 1e-6, "expected 1 week, got {weeks}");
    }
}
