//! Walking the music root and turning every audio file into a [`TrackRecord`].
//!
//! Nothing is cached between calls, each listing reflects the filesystem as it is right now.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Serialize, Serializer};
use tracing::instrument;
use walkdir::{DirEntry, WalkDir};

use crate::{
    errors::{LibraryError, TrackError},
    format_duration,
};

use super::{
    classify::sniff,
    identity::to_relative_id,
    metadata::{ExtractOptions, TrackMetadata},
};

/// Characters that can't appear verbatim in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Builds the URLs a client uses to fetch a track's cover and audio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackUrls {
    base_url: String,
}

impl TrackUrls {
    /// `base_url` is something like `http://localhost:13525`, a trailing `/` is ignored.
    #[must_use]
    #[inline]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url }
    }

    fn build(&self, endpoint: &str, relative_id: &str) -> String {
        let encoded = relative_id
            .split('/')
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{endpoint}/{encoded}", self.base_url)
    }

    #[must_use]
    #[inline]
    pub fn icon(&self, relative_id: &str) -> String {
        self.build("icon", relative_id)
    }

    #[must_use]
    #[inline]
    pub fn audio(&self, relative_id: &str) -> String {
        self.build("audio", relative_id)
    }
}

/// Which files the walk skips by name, regardless of what they contain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanFilter {
    ignored_extensions: Vec<String>,
}

impl ScanFilter {
    #[must_use]
    #[inline]
    pub fn new<I, S>(ignored_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ignored_extensions: ignored_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    /// Configuration files and hidden files (including our own in-flight temp files) are junk.
    #[must_use]
    #[inline]
    pub fn is_junk(&self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'));
        let ignored = path.extension().is_some_and(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            self.ignored_extensions.iter().any(|ignored| *ignored == ext)
        });
        hidden || ignored
    }
}

impl Default for ScanFilter {
    #[inline]
    fn default() -> Self {
        Self::new(["ini"])
    }
}

/// One audio file, as presented to clients.
///
/// Serializes to `{icon, title, artist, album, duration, audioUrl}`, with absent tags
/// left out and the duration formatted as `m:ss`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackRecord {
    /// Root-relative, `/`-separated. Unique within a catalog.
    #[serde(skip)]
    pub relative_path: String,
    #[serde(rename = "icon")]
    pub icon_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(rename = "duration", serialize_with = "serialize_duration")]
    pub duration_seconds: f64,
    #[serde(rename = "audioUrl")]
    pub audio_url: String,
}

fn serialize_duration<S: Serializer>(seconds: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*seconds))
}

impl TrackRecord {
    /// Build the record of an already-extracted track.
    #[must_use]
    #[inline]
    pub fn from_metadata(metadata: TrackMetadata, relative_path: String, urls: &TrackUrls) -> Self {
        Self {
            icon_url: urls.icon(&relative_path),
            audio_url: urls.audio(&relative_path),
            duration_seconds: metadata.duration_seconds(),
            title: metadata.title,
            artist: metadata.artist,
            album: metadata.album,
            relative_path,
        }
    }

    /// Read the track at `path` (which must be under `root`) and build its record.
    ///
    /// # Errors
    ///
    /// Fails if the metadata can't be read, or `path` isn't under `root`.
    #[inline]
    pub fn load(path: &Path, root: &Path, urls: &TrackUrls) -> Result<Self, TrackError> {
        let relative_path = to_relative_id(path, root)?;
        let metadata = TrackMetadata::load_from_path(path, ExtractOptions::TAGS_ONLY)?;
        Ok(Self::from_metadata(metadata, relative_path, urls))
    }
}

/// Check that the root is a readable directory.
///
/// # Errors
///
/// [`LibraryError::RootUnavailable`] if it isn't.
#[inline]
pub fn check_root(root: &Path) -> Result<(), LibraryError> {
    std::fs::read_dir(root)
        .map(drop)
        .map_err(|source| LibraryError::RootUnavailable {
            path: root.to_path_buf(),
            source,
        })
}

/// Whether a (possibly symlinked) entry really lives inside the canonical root.
fn stays_inside(entry: &DirEntry, canonical_root: &Path) -> bool {
    if !entry.path_is_symlink() {
        return true;
    }
    entry
        .path()
        .canonicalize()
        .is_ok_and(|target| target.starts_with(canonical_root))
}

/// Find every track under `root`.
///
/// The walk is depth-first in file name order, so the result is stable for a given filesystem.
/// Directories, junk (see [`ScanFilter::is_junk`]), non-audio files, and symlinks leading
/// out of the root are skipped. So are entries that can't be read, after a warning.
///
/// # Errors
///
/// [`LibraryError::RootUnavailable`] if `root` is missing or unreadable.
#[instrument(level = "debug", skip(filter))]
#[inline]
pub fn discover_tracks(root: &Path, filter: &ScanFilter) -> Result<Vec<PathBuf>, LibraryError> {
    check_root(root)?;
    let canonical_root = root
        .canonicalize()
        .map_err(|source| LibraryError::RootUnavailable {
            path: root.to_path_buf(),
            source,
        })?;

    let tracks = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        // never descend into hidden directories or out of the root, but the root itself may be hidden
        .filter_entry(|entry| {
            entry.depth() == 0 || (!filter.is_junk(entry.path()) && stays_inside(entry, &canonical_root))
        })
        .filter_map(|entry| {
            entry
                .map_err(|e| warn!("Error reading path: {e}"))
                .ok()
        })
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .filter(|path| match sniff(path) {
            Some(file_type) => {
                debug!("found {file_type:?} file {}", path.display());
                true
            }
            None => {
                debug!("skipping non-audio file {}", path.display());
                false
            }
        })
        .collect();

    Ok(tracks)
}

/// Build the catalog of every track under `root`.
///
/// Files whose metadata can't be read are logged and left out, one bad file never
/// empties the catalog.
///
/// # Errors
///
/// [`LibraryError::RootUnavailable`] if `root` is missing or unreadable.
#[instrument(level = "debug", skip(urls, filter))]
#[inline]
pub fn build_catalog(
    root: &Path,
    urls: &TrackUrls,
    filter: &ScanFilter,
) -> Result<Vec<TrackRecord>, LibraryError> {
    let tracks: Vec<_> = discover_tracks(root, filter)?
        .iter()
        .filter_map(|path| {
            TrackRecord::load(path, root, urls)
                .map_err(|e| warn!("Skipping {}: {e}", path.display()))
                .ok()
        })
        .collect();

    info!("Cataloged {} tracks under {}", tracks.len(), root.display());
    Ok(tracks)
}
