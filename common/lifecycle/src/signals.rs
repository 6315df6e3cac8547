use tokio::signal::unix::{signal, Signal, SignalKind};

/// SIGTERM and SIGINT listeners.
///
/// Installing replaces the default kill-on-signal behavior, and a signal that
/// arrives after [`ShutdownSignal::install`] is kept until [`ShutdownSignal::recv`]
/// is awaited. Install before spawning any work that must be drained.
pub struct ShutdownSignal {
    term: Signal,
    interrupt: Signal,
}

impl ShutdownSignal {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Resolves on the first SIGTERM or SIGINT.
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.term.recv() => tracing::info!("received SIGTERM"),
            _ = self.interrupt.recv() => tracing::info!("received SIGINT"),
        }
    }
}
