//! # Archive Core
//!
//! Core logic for moving stale Monaco patient directories out of a clinic.
//!
//! This crate finds patient directories, works out how long each has gone untouched, picks the
//! ones older than the retention threshold and moves them into a holding directory:
//! - [`directories`]: discovery of `{sequence}~{patient_id}` directories
//! - [`staleness`]: weeks since each directory was last touched
//! - [`selection`]: the retention threshold filter
//! - [`moves`]: move planning, gating, execution and verification
//! - [`session`]: state kept between operator actions
//!
//! **No UI concerns**: prompting and display belong in the binaries.

pub mod config;
pub mod constants;
pub mod directories;
pub mod error;
pub mod filesystem;
pub mod moves;
pub mod selection;
pub mod session;
pub mod staleness;

#[cfg(test)]
pub(crate) mod testing;

pub use archive_types::{sort_key, DirectoryNameError, PatientDirectoryName};
pub use config::{ArchiveConfig, SiteDirectories};
pub use directories::{discover_patient_directories, sort_by_patient, PatientDirectory};
pub use error::{ArchiveError, ArchiveResult};
pub use filesystem::{Filesystem, StdFilesystem};
pub use moves::{
    MoveFailure, MovePlan, MovePlanEntry, MoveReport, PreconditionFailure, VerificationReport,
};
pub use selection::select_for_archive;
pub use session::ArchiveSession;
pub use staleness::{
    weeks_since_touched, StalenessEntry, StalenessFailure, StalenessProgress, StalenessRecord,
};
