//! Signal handling.
//!
//! The [`SignalWatcher`] is the run-group actor that turns SIGINT/SIGTERM
//! into a group outcome. Its interrupt is a cancellation token, so calling
//! it any number of times is harmless. OS handlers are installed when the
//! watcher is built, so a signal that lands before the group runs is kept.

use std::fmt;
use std::io;

use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::group::GroupError;

/// Termination signal observed by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminated",
        })
    }
}

/// Installed process signal handlers.
struct OsSignals {
    #[cfg(unix)]
    interrupt: signal::unix::Signal,
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl OsSignals {
    #[cfg(unix)]
    fn install() -> io::Result<Self> {
        use signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for SIGTERM or SIGINT
    #[cfg(unix)]
    async fn recv(&mut self) -> io::Result<Signal> {
        tokio::select! {
            _ = self.interrupt.recv() => Ok(Signal::Interrupt),
            _ = self.terminate.recv() => Ok(Signal::Terminate),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> io::Result<Signal> {
        signal::ctrl_c().await.map(|()| Signal::Interrupt)
    }
}

enum Source {
    Os(OsSignals),
    Channel(mpsc::Receiver<Signal>),
}

/// Run-group actor that waits for a termination signal.
pub struct SignalWatcher {
    cancel: CancellationToken,
    source: Source,
}

impl SignalWatcher {
    /// Watch the process signals. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails when the signal handlers cannot be installed.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            cancel: CancellationToken::new(),
            source: Source::Os(OsSignals::install()?),
        })
    }

    /// Watch signals delivered through `rx` instead of the OS.
    #[must_use]
    pub fn from_channel(rx: mpsc::Receiver<Signal>) -> Self {
        Self {
            cancel: CancellationToken::new(),
            source: Source::Channel(rx),
        }
    }

    /// Token that stops the watcher without a signal.
    #[must_use]
    pub fn interrupter(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Block until a signal arrives or the watcher is interrupted.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::Signal`] naming the received signal, or
    /// [`GroupError::Actor`] when the OS signal stream fails.
    pub async fn run(self) -> Result<(), GroupError> {
        let Self { cancel, source } = self;
        let received = async move {
            match source {
                Source::Os(mut signals) => signals.recv().await,
                Source::Channel(mut rx) => match rx.recv().await {
                    Some(sig) => Ok(sig),
                    None => std::future::pending().await,
                },
            }
        };

        tokio::select! {
            () = cancel.cancelled() => Ok(()),
            sig = received => {
                let sig = sig.map_err(|e| GroupError::actor("signal", e))?;
                info!(signal = %sig, "Received signal, initiating shutdown");
                Err(GroupError::Signal(sig))
            }
        }
    }
}
