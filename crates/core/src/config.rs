//! Site configuration.
//!
//! Configuration is read once at process startup and then passed into the planner. Each site
//! names the Monaco `FocalData` directory, the clinic and holding directories within it, and the
//! final archive destination. Sites with an incomplete `monaco` section are dropped rather than
//! failing the whole load, so one half-configured site does not lock operators out of the rest.

use crate::constants::{CONFIG_PATH_ENV, DEFAULT_CONFIG_FILENAME, DEFAULT_WEEKS_TO_KEEP};
use crate::{ArchiveError, ArchiveResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    site: Vec<RawSite>,
    #[serde(default)]
    monaco_archiving: Option<RawArchiving>,
}

#[derive(Debug, Deserialize)]
struct RawSite {
    name: Option<String>,
    monaco: Option<RawMonaco>,
}

#[derive(Debug, Deserialize)]
struct RawMonaco {
    focaldata: Option<PathBuf>,
    clinic: Option<PathBuf>,
    archive_holding: Option<PathBuf>,
    archive_destination: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawArchiving {
    default_weeks_to_keep: Option<u32>,
}

/// The directories the archive tool works with for one site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteDirectories {
    name: String,
    focal_data: PathBuf,
    clinic: PathBuf,
    holding: PathBuf,
    destination: PathBuf,
}

impl SiteDirectories {
    /// Create a new `SiteDirectories`.
    ///
    /// `clinic` and `holding` are relative to `focal_data`; `destination` stands alone.
    pub fn new(
        name: impl Into<String>,
        focal_data: PathBuf,
        clinic: PathBuf,
        holding: PathBuf,
        destination: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            focal_data,
            clinic,
            holding,
            destination,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn focal_data(&self) -> &Path {
        &self.focal_data
    }

    /// Directory scanned for patient directories.
    pub fn clinic(&self) -> PathBuf {
        self.focal_data.join(&self.clinic)
    }

    /// Directory stale patients are moved into by the tool.
    pub fn holding(&self) -> PathBuf {
        self.focal_data.join(&self.holding)
    }

    /// Final archive the operator moves the holding contents to.
    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    sites: Vec<SiteDirectories>,
    default_weeks_to_keep: u32,
}

impl ArchiveConfig {
    /// Create a new `ArchiveConfig`.
    pub fn new(sites: Vec<SiteDirectories>, default_weeks_to_keep: u32) -> Self {
        Self {
            sites,
            default_weeks_to_keep,
        }
    }

    /// Parse a config from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::ConfigParse` if the text is not valid YAML for the config shape.
    /// Sites missing a name or any of the four `monaco` keys are skipped, not rejected.
    pub fn from_yaml_str(text: &str) -> ArchiveResult<Self> {
        let raw: RawConfig = if text.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(text).map_err(ArchiveError::ConfigParse)?
        };

        let sites = raw.site.into_iter().filter_map(usable_site).collect();
        let default_weeks_to_keep = raw
            .monaco_archiving
            .and_then(|archiving| archiving.default_weeks_to_keep)
            .unwrap_or(DEFAULT_WEEKS_TO_KEEP);

        Ok(Self::new(sites, default_weeks_to_keep))
    }

    /// Read and parse a YAML config file.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::ConfigRead` if the file cannot be read, or
    /// `ArchiveError::ConfigParse` if it is not valid.
    pub fn load(path: &Path) -> ArchiveResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ArchiveError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(
            "loaded {} usable site(s) from {}",
            config.sites.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn sites(&self) -> &[SiteDirectories] {
        &self.sites
    }

    pub fn default_weeks_to_keep(&self) -> u32 {
        self.default_weeks_to_keep
    }

    /// Look up a site by name.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::UnknownSite` if no usable site has that name.
    pub fn site(&self, name: &str) -> ArchiveResult<&SiteDirectories> {
        self.sites
            .iter()
            .find(|site| site.name == name)
            .ok_or_else(|| ArchiveError::UnknownSite(name.to_owned()))
    }

    /// Pick a site, defaulting to the only one when no name is given.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::NoUsableSites` when the config has none,
    /// `ArchiveError::InvalidInput` when a name is needed to choose between several, or
    /// `ArchiveError::UnknownSite` when the named site does not exist.
    pub fn choose_site(&self, name: Option<&str>) -> ArchiveResult<&SiteDirectories> {
        match (name, self.sites.as_slice()) {
            (_, []) => Err(ArchiveError::NoUsableSites),
            (Some(name), _) => self.site(name),
            (None, [only]) => Ok(only),
            (None, _) => Err(ArchiveError::InvalidInput(format!(
                "several sites configured, choose one of: {}",
                self.site_names().join(", ")
            ))),
        }
    }

    pub fn site_names(&self) -> Vec<&str> {
        self.sites.iter().map(|site| site.name()).collect()
    }
}

fn usable_site(raw: RawSite) -> Option<SiteDirectories> {
    let Some(name) = raw.name.filter(|name| !name.trim().is_empty()) else {
        tracing::debug!("skipping site without a name");
        return None;
    };

    let complete = raw.monaco.and_then(|monaco| {
        Some(SiteDirectories::new(
            name.clone(),
            monaco.focaldata?,
            monaco.clinic?,
            monaco.archive_holding?,
            monaco.archive_destination?,
        ))
    });

    if complete.is_none() {
        tracing::debug!("skipping site `{}`: incomplete monaco section", name);
    }
    complete
}

/// Resolve which config file to read without touching the filesystem.
///
/// An explicit path wins, then the `MONACO_ARCHIVE_CONFIG` value (passed in by the caller so
/// that environment reads stay at startup), then `monaco-archive.yaml` in the working directory.
pub fn resolve_config_path(explicit: Option<PathBuf>, env_value: Option<String>) -> PathBuf {
    explicit
        .or_else(|| {
            env_value
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILENAME))
}

/// Read the config path environment variable.
pub fn config_path_from_env() -> Option<String> {
    std::env::var(CONFIG_PATH_ENV).ok()
}
