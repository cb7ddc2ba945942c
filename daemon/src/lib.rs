#![deny(clippy::missing_inline_in_public_items)]

//--------------------------------------------------------------------------------- other libraries
use log::{error, info, warn};
use tokio::net::TcpListener;
//------------------------------------------------------------------------------ tunedir libraries
use tunedir_core::{config::Settings, logger::init_logger};

pub mod controller;
pub mod errors;
pub mod services;
pub mod termination;
#[cfg(test)]
pub use tunedir_core::test_utils;

use crate::{
    controller::{AppState, router},
    termination::{InterruptReceiver, create_termination},
};

/// Run the server until an interrupt signal arrives.
///
/// A missing music directory is not fatal: the server starts anyway and `/list` reports the
/// library as unavailable until the directory shows up.
///
/// # Errors
///
/// If the listener can't be bound, or the server fails while running.
#[inline]
pub async fn start_daemon(settings: Settings) -> anyhow::Result<()> {
    init_logger(settings.server.log_level);

    let state = AppState::from_settings(&settings);
    match state.library().check_root() {
        Ok(()) => info!(
            "Serving music from {}",
            state.library().root().display()
        ),
        Err(e) => warn!("{e}, requests will fail until it is available"),
    }

    let listener = TcpListener::bind((settings.server.bind_address.as_str(), settings.server.port))
        .await
        .map_err(|e| {
            error!(
                "Failed to bind {}:{}: {e}",
                settings.server.bind_address, settings.server.port
            );
            e
        })?;
    let addr = listener.local_addr()?;
    info!("Listening on http://{addr}, track URLs start with {}", settings.base_url());

    let (_terminator, interrupt) = create_termination();
    serve(listener, state, interrupt).await?;

    info!("Server stopped");
    Ok(())
}

/// Serve the routes on an already bound listener until `interrupt` fires.
///
/// # Errors
///
/// If accepting connections fails.
#[inline]
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut interrupt: InterruptReceiver,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            match interrupt.wait().await {
                Ok(reason) => info!("Shutting down ({reason:?})"),
                Err(e) => error!("Lost the shutdown signal, shutting down: {e}"),
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        termination::{Interrupted, Terminator},
        test_utils::init,
    };
    use rstest::rstest;
    use tokio::{
        io::{AsyncReadExt as _, AsyncWriteExt as _},
        net::TcpStream,
        sync::broadcast,
    };
    use tunedir_core::library::{CoverResolver, MusicLibrary, ScanFilter, TrackUrls};

    #[rstest]
    #[timeout(Duration::from_secs(5))]
    #[tokio::test]
    async fn test_serve_until_interrupted() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(
            MusicLibrary::new(
                dir.path().to_path_buf(),
                TrackUrls::new(format!("http://{addr}")),
                ScanFilter::default(),
                CoverResolver::default(),
            ),
            1,
        );
        let (tx, rx) = broadcast::channel(1);
        let terminator = Terminator::new(tx);
        let server = tokio::spawn(serve(listener, state, InterruptReceiver::new(rx)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /list HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with("[]"), "{response}");

        terminator.terminate(Interrupted::UserInt).unwrap();
        server.await.unwrap().unwrap();
    }
}
