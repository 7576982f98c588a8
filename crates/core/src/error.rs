use crate::moves::PreconditionFailure;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid patient directory name: {0}")]
    InvalidDirectoryName(#[from] archive_types::DirectoryNameError),
    #[error("path has no usable directory name: {}", .0.display())]
    UnnamedPath(PathBuf),

    #[error("failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config YAML: {0}")]
    ConfigParse(serde_yaml::Error),
    #[error("no site in the config has a complete monaco section")]
    NoUsableSites,
    #[error("unknown site `{0}`")]
    UnknownSite(String),

    #[error("invalid glob pattern `{pattern}`: {source}")]
    GlobPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("failed to list {}: {source}", path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read modified time of {}: {source}", path.display())]
    ModifiedTime {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no files found to determine staleness of {}", directory.display())]
    NoModificationData { directory: PathBuf },

    #[error("move batch blocked by {} failed precondition(s)", .0.len())]
    MoveBlocked(Vec<PreconditionFailure>),
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("refusing to move {} onto existing {}", from.display(), to.display())]
    MoveTargetExists { from: PathBuf, to: PathBuf },
}

pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;
