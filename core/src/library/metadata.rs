use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use lofty::{
    config::ParseOptions,
    file::{AudioFile, TaggedFile, TaggedFileExt},
    probe::Probe,
    tag::{Accessor, Tag},
};
use tracing::instrument;

use crate::errors::MetadataError;

/// What to read out of a file besides the basic tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Decode embedded pictures. Listing tracks doesn't need them, resolving covers does.
    pub read_cover: bool,
}

impl ExtractOptions {
    pub const TAGS_ONLY: Self = Self { read_cover: false };
    pub const WITH_COVER: Self = Self { read_cover: true };
}

impl Default for ExtractOptions {
    #[inline]
    fn default() -> Self {
        Self::WITH_COVER
    }
}

/// The metadata of a single audio file.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackMetadata {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Duration,
    /// The raw bytes of the first embedded picture, if any.
    pub cover: Option<Vec<u8>>,
}

impl TrackMetadata {
    /// Load a [`TrackMetadata`] from a file path.
    ///
    /// The container is detected from the file's content, the extension is not trusted.
    /// Missing tags are fine, a missing duration is not.
    ///
    /// # Errors
    ///
    /// Fails if the file can't be opened, isn't a recognized audio format, can't be parsed,
    /// or doesn't say how long it is.
    #[instrument(level = "debug")]
    #[inline]
    pub fn load_from_path(path: &Path, options: ExtractOptions) -> Result<Self, MetadataError> {
        let file = File::open(path)?;
        let detected = Probe::new(BufReader::new(file))
            .options(ParseOptions::new().read_cover_art(options.read_cover))
            .guess_file_type()?;

        if detected.file_type().is_none() {
            return Err(MetadataError::UnknownFormat(path.to_path_buf()));
        }

        let tagged_file = detected.read()?;

        let duration = tagged_file.properties().duration();
        if duration.is_zero() {
            return Err(MetadataError::MissingDuration(path.to_path_buf()));
        }

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        Ok(Self {
            path: path.to_path_buf(),
            title: tag.and_then(|t| clean(t.title().as_deref())),
            artist: tag.and_then(|t| clean(t.artist().as_deref())),
            album: tag.and_then(|t| clean(t.album().as_deref())),
            duration,
            cover: options
                .read_cover
                .then(|| first_picture(&tagged_file))
                .flatten(),
        })
    }

    /// The duration in (fractional) seconds.
    #[must_use]
    #[inline]
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Read just the first embedded picture of the file at `path`.
///
/// # Errors
///
/// See [`TrackMetadata::load_from_path`].
#[inline]
pub fn embedded_cover(path: &Path) -> Result<Option<Vec<u8>>, MetadataError> {
    TrackMetadata::load_from_path(path, ExtractOptions::WITH_COVER).map(|metadata| metadata.cover)
}

/// Tag values sometimes carry NUL padding, and an empty value is no value at all.
fn clean(value: Option<&str>) -> Option<String> {
    let value = value?.replace('\0', "");
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// The first picture of the primary tag, falling back to the first tag that has any.
fn first_picture(tagged_file: &TaggedFile) -> Option<Vec<u8>> {
    let picture_of = |tag: &Tag| tag.pictures().first().map(|pic| pic.data().to_vec());

    tagged_file
        .primary_tag()
        .and_then(picture_of)
        .or_else(|| tagged_file.tags().iter().find_map(picture_of))
}
