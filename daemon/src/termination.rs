//! Shutdown signalling for the server.

use log::{error, warn};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    OsSigInt,
    OsSigQuit,
    OsSigTerm,
    UserInt,
}

/// Signals received after this many are taken as a request to quit right away,
/// without waiting for in-flight requests.
const FORCE_QUIT_THRESHOLD: u8 = 3;

/// The receiving side of the shutdown channel.
#[derive(Debug)]
pub struct InterruptReceiver {
    interrupt_rx: broadcast::Receiver<Interrupted>,
}

impl InterruptReceiver {
    #[must_use]
    #[inline]
    pub const fn new(interrupt_rx: broadcast::Receiver<Interrupted>) -> Self {
        Self { interrupt_rx }
    }

    /// Wait until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Fails if every [`Terminator`] has been dropped.
    #[inline]
    pub async fn wait(&mut self) -> Result<Interrupted, broadcast::error::RecvError> {
        self.interrupt_rx.recv().await
    }
}

/// The sending side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct Terminator {
    interrupt_tx: broadcast::Sender<Interrupted>,
}

impl Terminator {
    #[must_use]
    #[inline]
    pub const fn new(interrupt_tx: broadcast::Sender<Interrupted>) -> Self {
        Self { interrupt_tx }
    }

    /// Ask the server to shut down.
    ///
    /// # Errors
    ///
    /// Fails if nothing is listening anymore.
    #[inline]
    pub fn terminate(&self, interrupted: Interrupted) -> anyhow::Result<()> {
        self.interrupt_tx.send(interrupted)?;
        Ok(())
    }

    fn forward(&self, interrupted: Interrupted, count: &mut u8) {
        if let Err(e) = self.terminate(interrupted) {
            warn!("Failed to forward {interrupted:?}: {e}");
        }
        *count += 1;
        if *count >= FORCE_QUIT_THRESHOLD {
            warn!("Received {FORCE_QUIT_THRESHOLD} signals, quitting without a graceful shutdown");
            std::process::exit(1);
        }
    }
}

#[cfg(unix)]
async fn listen_for_signals(terminator: Terminator) {
    use tokio::signal::unix::{SignalKind, signal};

    let streams = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    );
    let (mut interrupt, mut term, mut quit) = match streams {
        (Ok(interrupt), Ok(term), Ok(quit)) => (interrupt, term, quit),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            error!("Unable to listen for OS signals, falling back to Ctrl-C only: {e}");
            return listen_for_ctrl_c(terminator).await;
        }
    };

    let mut count = 0;
    loop {
        tokio::select! {
            _ = interrupt.recv() => terminator.forward(Interrupted::OsSigInt, &mut count),
            _ = term.recv() => terminator.forward(Interrupted::OsSigTerm, &mut count),
            _ = quit.recv() => terminator.forward(Interrupted::OsSigQuit, &mut count),
        }
    }
}

#[cfg(not(unix))]
async fn listen_for_signals(terminator: Terminator) {
    listen_for_ctrl_c(terminator).await;
}

async fn listen_for_ctrl_c(terminator: Terminator) {
    let mut count = 0;
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {e}");
            return;
        }
        terminator.forward(Interrupted::UserInt, &mut count);
    }
}

/// Create the shutdown channel and start listening for OS signals on it.
///
/// Must be called from within a tokio runtime.
#[allow(clippy::module_name_repetitions)]
#[must_use]
#[inline]
pub fn create_termination() -> (Terminator, InterruptReceiver) {
    let (tx, rx) = broadcast::channel(FORCE_QUIT_THRESHOLD as usize);
    let terminator = Terminator::new(tx);
    let interrupt = InterruptReceiver::new(rx);

    tokio::spawn(listen_for_signals(terminator.clone()));

    (terminator, interrupt)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[timeout(Duration::from_secs(1))]
    #[tokio::test]
    async fn test_terminate() {
        let (terminator, mut rx) = create_termination();

        terminator.terminate(Interrupted::UserInt).unwrap();

        assert_eq!(rx.wait().await, Ok(Interrupted::UserInt));
    }

    #[rstest]
    #[timeout(Duration::from_secs(1))]
    #[tokio::test]
    async fn test_wait_fails_without_terminators() {
        let (tx, rx) = broadcast::channel(1);
        let mut rx = InterruptReceiver::new(rx);
        drop(Terminator::new(tx));

        assert_eq!(rx.wait().await, Err(broadcast::error::RecvError::Closed));
    }
}
