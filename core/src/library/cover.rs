//! Finding the cover art for a track.
//!
//! Embedded art wins. Since pulling it out means parsing the whole tag, the bytes are
//! cached in a "sidecar" file next to the track, which later requests (and restarts) reuse.
//! Without embedded art we fall back to a directory-level cover file.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use tracing::instrument;

use super::{classify::is_audio_file, metadata::embedded_cover};

/// Where the cover of a track was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoverArt {
    /// Embedded art, extracted to a sidecar file.
    Sidecar(PathBuf),
    /// The directory's shared cover file.
    Directory(PathBuf),
    None,
}

impl CoverArt {
    /// The image file to serve, if any.
    #[must_use]
    #[inline]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Sidecar(path) | Self::Directory(path) => Some(path),
            Self::None => None,
        }
    }
}

/// The sidecar path for a track: the same path with a `.jpg` extension.
///
/// A track that is itself named `*.jpg` gets `<stem>.cover.jpg` instead, so the
/// cache can never clobber the audio.
#[must_use]
#[inline]
pub fn sidecar_path(track: &Path) -> PathBuf {
    let is_jpg = track
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"));
    if is_jpg {
        track.with_extension("cover.jpg")
    } else {
        track.with_extension("jpg")
    }
}

/// The fallback sidecar path, `<stem>.cover.jpg`, for when [`sidecar_path`] is taken.
fn alternate_sidecar_path(track: &Path) -> PathBuf {
    track.with_extension("cover.jpg")
}

/// Write `bytes` to `sidecar` unless something is already there.
///
/// New sidecars are written to a temporary file in the same directory and renamed into place,
/// so readers only ever see a complete image even when several requests race to create it.
fn write_sidecar(sidecar: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if sidecar.is_file() {
        return Ok(());
    }

    let dir = sidecar.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(".tunedir-cover")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    // rename over whatever a concurrent writer put there, it holds the same bytes
    temp.persist(sidecar).map_err(|e| e.error)?;
    Ok(())
}

/// Resolves the cover of a track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverResolver {
    cover_file_name: String,
}

impl CoverResolver {
    #[must_use]
    #[inline]
    pub fn new(cover_file_name: impl Into<String>) -> Self {
        Self {
            cover_file_name: cover_file_name.into(),
        }
    }

    /// The directory-level cover for `track`, whether or not it exists.
    #[must_use]
    #[inline]
    pub fn directory_cover(&self, track: &Path) -> Option<PathBuf> {
        track
            .parent()
            .map(|dir| dir.join(&self.cover_file_name))
    }

    /// Where the embedded art of `track` gets cached.
    ///
    /// Normally [`sidecar_path`], but never a file that is itself audio, nor the directory
    /// cover: serving either of those as this track's cover would be wrong. In that case
    /// `<stem>.cover.jpg` is used, and if that is taken too there's nowhere to cache.
    #[must_use]
    #[inline]
    pub fn sidecar_for(&self, track: &Path) -> Option<PathBuf> {
        let directory_cover = self.directory_cover(track);
        [sidecar_path(track), alternate_sidecar_path(track)]
            .into_iter()
            .find(|candidate| {
                directory_cover.as_ref() != Some(candidate) && !is_audio_file(candidate)
            })
    }

    /// Make sure the embedded art of `track` is cached, writing `bytes` if it isn't yet.
    ///
    /// An existing sidecar is left alone, so repeated calls are cheap and don't change the
    /// file. See [`Self::sidecar_for`] for where it goes.
    ///
    /// # Errors
    ///
    /// Fails if there is no usable sidecar path, or the temporary file can't be created,
    /// written, or renamed.
    #[instrument(level = "debug", skip(self, bytes))]
    #[inline]
    pub fn ensure_cached(&self, track: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let sidecar = self.sidecar_for(track).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "every sidecar path is taken by another file",
            )
        })?;
        write_sidecar(&sidecar, bytes)?;

        debug!("cached embedded cover of {}", track.display());
        Ok(sidecar)
    }

    /// Find the cover of `track`.
    ///
    /// In order:
    /// 1. embedded art, cached to the sidecar file (see [`Self::ensure_cached`]),
    /// 2. the directory's cover file,
    /// 3. nothing.
    ///
    /// Unreadable tags and unwritable sidecars aren't errors, they just mean
    /// moving on to the next step.
    #[instrument(level = "debug", skip(self))]
    #[inline]
    pub fn resolve(&self, track: &Path) -> CoverArt {
        match embedded_cover(track) {
            Ok(Some(bytes)) => match self.ensure_cached(track, &bytes) {
                Ok(sidecar) => return CoverArt::Sidecar(sidecar),
                Err(e) => warn!(
                    "Error caching embedded cover of {}: {e}",
                    track.display()
                ),
            },
            Ok(None) => {}
            Err(e) => debug!("no embedded cover for {}: {e}", track.display()),
        }

        match self.directory_cover(track) {
            Some(cover) if cover.is_file() => CoverArt::Directory(cover),
            _ => CoverArt::None,
        }
    }
}

impl Default for CoverResolver {
    #[inline]
    fn default() -> Self {
        Self::new("cover.jpg")
    }
}
