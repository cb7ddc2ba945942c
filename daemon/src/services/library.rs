use std::{path::PathBuf, sync::Arc};

use futures::{StreamExt as _, stream};
use log::{error, info, warn};
use tokio::task::spawn_blocking;
use tracing::instrument;
use tunedir_core::library::{MusicLibrary, TrackRecord};

use crate::errors::ApiError;

/// Build the catalog of the library, reading up to `concurrency` files at once.
///
/// Tracks come back in discovery order. Files whose metadata can't be read are skipped.
/// If the returned future is dropped (e.g. the client went away), no further files are read.
///
/// # Errors
///
/// Fails if the music root is missing or unreadable.
#[instrument(skip(library))]
#[inline]
pub async fn list_tracks(
    library: Arc<MusicLibrary>,
    concurrency: usize,
) -> Result<Vec<TrackRecord>, ApiError> {
    let paths = {
        let library = library.clone();
        spawn_blocking(move || library.discover()).await??
    };

    let tracks: Vec<TrackRecord> = stream::iter(paths)
        .map(|path| {
            let library = library.clone();
            spawn_blocking(move || {
                let track = library.load_track(&path);
                (path, track)
            })
        })
        .buffered(concurrency.max(1))
        .filter_map(|joined| async move {
            match joined {
                Ok((_, Ok(track))) => Some(track),
                Ok((path, Err(e))) => {
                    warn!("Skipping {}: {e}", path.display());
                    None
                }
                Err(e) => {
                    error!("Error reading track metadata: {e}");
                    None
                }
            }
        })
        .collect()
        .await;

    info!(
        "Listed {} tracks under {}",
        tracks.len(),
        library.root().display()
    );
    Ok(tracks)
}

/// The image to serve as the cover of the track with the given identifier.
///
/// # Errors
///
/// [`ApiError::NotFound`] if the identifier is bad or the track has no cover.
#[instrument(skip(library))]
#[inline]
pub async fn cover_path(library: Arc<MusicLibrary>, id: String) -> Result<PathBuf, ApiError> {
    let cover = spawn_blocking(move || library.resolve_cover(&id)).await??;
    cover
        .path()
        .map(std::path::Path::to_path_buf)
        .ok_or(ApiError::NotFound)
}

/// The audio file with the given identifier.
///
/// # Errors
///
/// [`ApiError::NotFound`] if the identifier is bad or doesn't name an audio file.
#[instrument(skip(library))]
#[inline]
pub async fn track_path(library: Arc<MusicLibrary>, id: String) -> Result<PathBuf, ApiError> {
    Ok(spawn_blocking(move || library.resolve_track(&id)).await??)
}
