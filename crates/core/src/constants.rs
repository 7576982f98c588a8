//! Constants used throughout the archive core crate.
//!
//! This module contains the Monaco layout names and default values so that discovery,
//! staleness and configuration agree on them.

/// Glob, relative to the clinic directory, matching the demographic file of every patient.
pub const DEMOGRAPHIC_FILE_PATTERN: &str = "*~*/demographic.*";

/// Sub-directory of a patient directory holding the treatment plans.
pub const PLAN_DIR_NAME: &str = "plan";

/// Weeks to keep when the config does not say otherwise.
pub const DEFAULT_WEEKS_TO_KEEP: u32 = 52;

/// Seconds in one week, the unit staleness is reported in.
pub const SECONDS_PER_WEEK: f64 = 7.0 * 24.0 * 60.0 * 60.0;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "MONACO_ARCHIVE_CONFIG";

/// Config filename looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILENAME: &str = "monaco-archive.yaml";
