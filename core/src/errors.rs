use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur with finding the config directory.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Unable to find the config directory for tunedir.")]
    Config,
}

/// Errors that abort a whole library operation.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Music root {} is unavailable: {source}", path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from reading the metadata of a single file.
///
/// These never abort a catalog walk, the offending file is skipped.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lofty error: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
    #[error("Unrecognized audio format: {}", .0.display())]
    UnknownFormat(PathBuf),
    #[error("Could not determine the duration of {}", .0.display())]
    MissingDuration(PathBuf),
}

/// Errors from mapping a relative identifier to a path (or back).
///
/// Callers facing the network must not distinguish between these variants.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("Path escapes the music root.")]
    Escape,
    #[error("Malformed identifier: {0:?}")]
    Invalid(String),
    #[error("No such file in the music root.")]
    NotFound,
}

/// Why a single file was left out of the catalog.
#[derive(Error, Debug)]
pub enum TrackError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Path(#[from] PathError),
}
