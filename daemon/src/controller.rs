//! HTTP routes: `/list`, `/icon/{*id}` and `/audio/{*id}`.

//----------------------------------------------------------------------------------------- std lib
use std::{path::PathBuf, sync::Arc};
//--------------------------------------------------------------------------------- other libraries
use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Request, State, rejection::PathRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use log::debug;
use tower::ServiceExt as _;
use tower_http::{cors::CorsLayer, services::ServeFile, trace::TraceLayer};
use tracing::instrument;
//------------------------------------------------------------------------------ tunedir libraries
use tunedir_core::{config::Settings, library::MusicLibrary};

use crate::{errors::ApiError, services};

/// The listing changes whenever the library does, so clients only get to keep it briefly.
pub const LIST_CACHE_CONTROL: &str = "max-age=60, stale-while-revalidate=120, private";
/// Covers and audio bytes rarely change once a file is in the library.
pub const MEDIA_CACHE_CONTROL: &str = "max-age=2592000, stale-while-revalidate=2678000, private";

#[derive(Clone, Debug)]
pub struct AppState {
    library: Arc<MusicLibrary>,
    scan_concurrency: usize,
}

impl AppState {
    #[must_use]
    #[inline]
    pub fn new(library: MusicLibrary, scan_concurrency: usize) -> Self {
        Self {
            library: Arc::new(library),
            scan_concurrency,
        }
    }

    #[must_use]
    #[inline]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            MusicLibrary::from_settings(settings),
            settings.library.scan_concurrency,
        )
    }

    #[must_use]
    #[inline]
    pub fn library(&self) -> &MusicLibrary {
        &self.library
    }
}

/// Build the router for the given state.
#[inline]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/list", get(list))
        .route("/icon/{*id}", get(icon))
        .route("/audio/{*id}", get(audio))
        .fallback(|| async { ApiError::NotFound })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[instrument(skip(state))]
async fn list(State(state): State<AppState>) -> Result<Response, ApiError> {
    let tracks = services::library::list_tracks(state.library, state.scan_concurrency).await?;

    let mut response = Json(tracks).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(LIST_CACHE_CONTROL),
    );
    Ok(response)
}

#[instrument(skip(state, request))]
async fn icon(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    request: Request,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::NotFound)?;
    let path = services::library::cover_path(state.library, id).await?;
    Ok(serve_file(path, request).await)
}

#[instrument(skip(state, request))]
async fn audio(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    request: Request,
) -> Result<Response, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::NotFound)?;
    let path = services::library::track_path(state.library, id).await?;
    Ok(serve_file(path, request).await)
}

/// Stream a file that is known to exist, honoring `Range` and conditional headers.
async fn serve_file(path: PathBuf, request: Request) -> Response {
    debug!("Serving {}", path.display());
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => {
            let mut response = response.map(Body::new);
            let status = response.status();
            if status.is_success() || status == StatusCode::NOT_MODIFIED {
                response.headers_mut().insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static(MEDIA_CACHE_CONTROL),
                );
            }
            response
        }
        Err(infallible) => match infallible {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init;
    use axum::{body::to_bytes, http};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use serde_json::{Value, json};
    use tower::ServiceExt as _;
    use tempfile::TempDir;
    use tunedir_core::{
        library::{CoverResolver, ScanFilter, TrackUrls},
        test_utils::{Tags, flac_bytes, jpeg_bytes, mp3_bytes, write_file},
    };

    const BASE: &str = "http://localhost:13525";

    #[fixture]
    fn music() -> (TempDir, Router) {
        init();
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "Artist 0/Album 0/song.mp3", &mp3_bytes(&Tags::full()));
        write_file(dir.path(), "Artist 0/Album 0/desktop.ini", b"[.ShellClassInfo]");
        write_file(dir.path(), "Loose/plain.flac", &flac_bytes());
        write_file(dir.path(), "Loose/notes.txt", b"not audio");
        write_file(dir.path(), "Odd #1/100% yes?.flac", &flac_bytes());
        write_file(dir.path(), "With Cover/plain.flac", &flac_bytes());
        write_file(dir.path(), "With Cover/cover.jpg", &jpeg_bytes());

        let library = MusicLibrary::new(
            dir.path().to_path_buf(),
            TrackUrls::new(BASE),
            ScanFilter::default(),
            CoverResolver::default(),
        );
        (dir, router(AppState::new(library, 2)))
    }

    fn get_request(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[rstest]
    #[tokio::test]
    async fn test_list(music: (TempDir, Router)) {
        let (_dir, router) = music;

        let response = router.oneshot(get_request("/list")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            LIST_CACHE_CONTROL
        );
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(
            body,
            json!([
                {
                    "icon": format!("{BASE}/icon/Artist%200/Album%200/song.mp3"),
                    "title": "Song 0",
                    "artist": "Artist 0",
                    "album": "Album 0",
                    "duration": "0:01",
                    "audioUrl": format!("{BASE}/audio/Artist%200/Album%200/song.mp3"),
                },
                {
                    "icon": format!("{BASE}/icon/Loose/plain.flac"),
                    "duration": "0:02",
                    "audioUrl": format!("{BASE}/audio/Loose/plain.flac"),
                },
                {
                    "icon": format!("{BASE}/icon/Odd%20%231/100%25%20yes%3F.flac"),
                    "duration": "0:02",
                    "audioUrl": format!("{BASE}/audio/Odd%20%231/100%25%20yes%3F.flac"),
                },
                {
                    "icon": format!("{BASE}/icon/With%20Cover/plain.flac"),
                    "duration": "0:02",
                    "audioUrl": format!("{BASE}/audio/With%20Cover/plain.flac"),
                },
            ])
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_list_missing_root() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let library = MusicLibrary::new(
            dir.path().join("unplugged"),
            TrackUrls::new(BASE),
            ScanFilter::default(),
            CoverResolver::default(),
        );

        let response = router(AppState::new(library, 2))
            .oneshot(get_request("/list"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_bytes(response).await, b"Music library unavailable");
    }

    #[rstest]
    #[tokio::test]
    async fn test_listed_urls_resolve(music: (TempDir, Router)) {
        let (_dir, router) = music;

        let response = router.clone().oneshot(get_request("/list")).await.unwrap();
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();

        for track in body.as_array().unwrap() {
            let audio_url = track["audioUrl"].as_str().unwrap();
            let uri = audio_url.strip_prefix(BASE).unwrap();
            let response = router.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }

    #[rstest]
    #[case::embedded("/icon/Artist%200/Album%200/song.mp3")]
    #[case::directory("/icon/With%20Cover/plain.flac")]
    #[tokio::test]
    async fn test_icon(music: (TempDir, Router), #[case] uri: &str) {
        let (_dir, router) = music;

        let response = router.oneshot(get_request(uri)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            MEDIA_CACHE_CONTROL
        );
        assert_eq!(body_bytes(response).await, jpeg_bytes());
    }

    #[rstest]
    #[tokio::test]
    async fn test_icon_writes_sidecar(music: (TempDir, Router)) {
        let (dir, router) = music;
        let sidecar = dir.path().join("Artist 0/Album 0/song.jpg");
        assert!(!sidecar.exists());

        let response = router
            .oneshot(get_request("/icon/Artist%200/Album%200/song.mp3"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(std::fs::read(sidecar).unwrap(), jpeg_bytes());
    }

    #[rstest]
    #[case::no_cover("/icon/Loose/plain.flac")]
    #[case::missing("/icon/Loose/missing.flac")]
    #[case::directory("/icon/Loose")]
    #[case::traversal("/icon/..%2F..%2Fetc%2Fpasswd")]
    #[case::dot_segment("/icon/Loose/.%2E/Loose/plain.flac")]
    #[case::absolute("/icon/%2Fetc%2Fpasswd")]
    #[case::backslash("/icon/Loose%5Cplain.flac")]
    #[case::not_a_track("/icon/Loose/notes.txt")]
    #[case::cover_itself("/icon/With%20Cover/cover.jpg")]
    #[case::audio_missing("/audio/Loose/missing.flac")]
    #[case::audio_traversal("/audio/..%2F..%2Fetc%2Fpasswd")]
    #[case::audio_directory("/audio/Loose")]
    #[case::audio_not_audio("/audio/Loose/notes.txt")]
    #[case::audio_junk("/audio/Artist%200/Album%200/desktop.ini")]
    #[case::audio_cover("/audio/With%20Cover/cover.jpg")]
    #[case::bad_utf8("/audio/%FF%FE")]
    #[tokio::test]
    async fn test_not_found(music: (TempDir, Router), #[case] uri: &str) {
        let (_dir, router) = music;

        let response = router.oneshot(get_request(uri)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(header::CACHE_CONTROL).is_none());
        assert_eq!(body_bytes(response).await, b"Not found");
    }

    #[rstest]
    #[tokio::test]
    async fn test_audio(music: (TempDir, Router)) {
        let (dir, router) = music;

        let response = router.oneshot(get_request("/audio/Loose/plain.flac")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            MEDIA_CACHE_CONTROL
        );
        assert_eq!(
            body_bytes(response).await,
            std::fs::read(dir.path().join("Loose/plain.flac")).unwrap()
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_audio_range(music: (TempDir, Router)) {
        let (dir, router) = music;
        let request = http::Request::builder()
            .uri("/audio/Artist%200/Album%200/song.mp3")
            .header(header::RANGE, "bytes=0-9")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            MEDIA_CACHE_CONTROL
        );
        let file = std::fs::read(dir.path().join("Artist 0/Album 0/song.mp3")).unwrap();
        assert_eq!(body_bytes(response).await, file[..10].to_vec());
    }

    #[rstest]
    #[tokio::test]
    async fn test_cors(music: (TempDir, Router)) {
        let (_dir, router) = music;
        let request = http::Request::builder()
            .uri("/list")
            .header(header::ORIGIN, "http://player.example")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
