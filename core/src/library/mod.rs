//! The indexing pipeline: from a directory tree to a list of addressable tracks.
//!
//! - [`classify`] decides what is audio,
//! - [`metadata`] reads tags, duration, and embedded art,
//! - [`cover`] finds (and caches) cover images,
//! - [`catalog`] walks the root and builds [`TrackRecord`]s,
//! - [`identity`] maps paths to URL identifiers and back.
//!
//! [`MusicLibrary`] ties them together for one configured music root.

use std::path::{Path, PathBuf};

use crate::{
    config::Settings,
    errors::{LibraryError, PathError, TrackError},
};

pub mod catalog;
pub mod classify;
pub mod cover;
pub mod identity;
pub mod metadata;

pub use catalog::{ScanFilter, TrackRecord, TrackUrls};
pub use cover::{CoverArt, CoverResolver};

/// A music root, plus everything needed to catalog it and serve from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MusicLibrary {
    root: PathBuf,
    urls: TrackUrls,
    filter: ScanFilter,
    covers: CoverResolver,
}

impl MusicLibrary {
    #[must_use]
    #[inline]
    pub const fn new(
        root: PathBuf,
        urls: TrackUrls,
        filter: ScanFilter,
        covers: CoverResolver,
    ) -> Self {
        Self {
            root,
            urls,
            filter,
            covers,
        }
    }

    #[must_use]
    #[inline]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.library.music_dir.clone(),
            TrackUrls::new(settings.base_url()),
            ScanFilter::new(&settings.library.ignored_extensions),
            CoverResolver::new(settings.library.cover_file_name.clone()),
        )
    }

    #[must_use]
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// See [`catalog::check_root`].
    ///
    /// # Errors
    ///
    /// If the root is missing or unreadable.
    #[inline]
    pub fn check_root(&self) -> Result<(), LibraryError> {
        catalog::check_root(&self.root)
    }

    /// Every track under the root, see [`catalog::discover_tracks`].
    ///
    /// # Errors
    ///
    /// If the root is missing or unreadable.
    #[inline]
    pub fn discover(&self) -> Result<Vec<PathBuf>, LibraryError> {
        catalog::discover_tracks(&self.root, &self.filter)
    }

    /// The record of a single discovered track.
    ///
    /// # Errors
    ///
    /// If its metadata can't be read.
    #[inline]
    pub fn load_track(&self, path: &Path) -> Result<TrackRecord, TrackError> {
        TrackRecord::load(path, &self.root, &self.urls)
    }

    /// The whole catalog, built on the calling thread.
    ///
    /// # Errors
    ///
    /// If the root is missing or unreadable.
    #[inline]
    pub fn build_catalog(&self) -> Result<Vec<TrackRecord>, LibraryError> {
        catalog::build_catalog(&self.root, &self.urls, &self.filter)
    }

    /// Map a request identifier to an existing file under the root.
    ///
    /// # Errors
    ///
    /// See [`identity::to_absolute_path`]. Directories are reported as [`PathError::NotFound`].
    #[inline]
    pub fn resolve_file(&self, relative_id: &str) -> Result<PathBuf, PathError> {
        let path = identity::to_absolute_path(relative_id, &self.root)?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(PathError::NotFound)
        }
    }

    /// Map a request identifier to a track, i.e. a file the catalog would list.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_file`]. Junk, files inside junk directories, and non-audio
    /// files are reported as [`PathError::NotFound`].
    #[inline]
    pub fn resolve_track(&self, relative_id: &str) -> Result<PathBuf, PathError> {
        let path = self.resolve_file(relative_id)?;
        // the walk never descends into junk directories, so nothing below one is a track
        let in_junk_dir = relative_id
            .rsplit('/')
            .skip(1)
            .any(|segment| self.filter.is_junk(Path::new(segment)));
        if in_junk_dir || self.filter.is_junk(&path) || !classify::is_audio_file(&path) {
            return Err(PathError::NotFound);
        }
        Ok(path)
    }

    /// Find the cover of the track with the given identifier.
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_track`].
    #[inline]
    pub fn resolve_cover(&self, relative_id: &str) -> Result<CoverArt, PathError> {
        let track = self.resolve_track(relative_id)?;
        Ok(self.covers.resolve(&track))
    }
}
