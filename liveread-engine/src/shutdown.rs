//! Cooperative shutdown driven by process signals

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit status used when a second signal cuts the process short.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Shared stop flag.
///
/// Producers check it between chunks, never in the middle of a network call,
/// so an interrupted write still ends with a completed upload.
#[derive(Debug, Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
    signals: Arc<AtomicUsize>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stop request and return how many have been received so far.
    pub fn request(&self) -> usize {
        let count = self.signals.fetch_add(1, Ordering::SeqCst) + 1;
        self.token.cancel();
        count
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once a stop has been requested.
    pub async fn requested(&self) {
        self.token.cancelled().await
    }

    /// Listen for SIGINT (and SIGTERM on unix).
    ///
    /// The first signal sets the flag. A second one exits the process with
    /// [`INTERRUPTED_EXIT_CODE`] for when the producer is stuck. Once tokio
    /// owns a signal its default disposition cannot be restored, so the exit
    /// stands in for the default handler.
    pub fn install_signal_handlers(&self) -> std::io::Result<JoinHandle<()>> {
        let controller = self.clone();
        let mut signals = Signals::new()?;

        Ok(tokio::spawn(async move {
            loop {
                let name = signals.recv().await;
                if controller.request() > 1 {
                    warn!("Caught {} again. Exiting immediately.", name);
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
                info!("Caught {}. Processing remaining data.", name);
            }
        }))
    }
}

struct Signals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    #[cfg(unix)]
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Signals {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn new() -> std::io::Result<Self> {
        Ok(Signals {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "Ctrl-C"
    }
}
