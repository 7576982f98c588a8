//! Choosing which patient directories to archive.

use crate::directories::PatientDirectory;
use crate::staleness::StalenessRecord;

/// Directories untouched for strictly longer than `weeks_to_keep`.
///
/// Directories exactly `weeks_to_keep` weeks old are kept. The result follows the order of the
/// record and depends on nothing but the arguments, so it is cheap to recompute whenever the
/// threshold changes.
pub fn select_for_archive(
    staleness: &StalenessRecord,
    weeks_to_keep: u32,
) -> Vec<PatientDirectory> {
    let threshold = f64::from(weeks_to_keep);
    staleness
        .entries()
        .iter()
        .filter(|entry| entry.weeks > threshold)
        .map(|entry| entry.directory.clone())
        .collect()
}
