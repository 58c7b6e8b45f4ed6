//! Process-wide graceful shutdown signal.
//!
//! A [`Shutdown`] fires at most once. Every [`ShutdownListener`] observes the same event,
//! including listeners created after it fired.

use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Returns false if it had already fired.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener { rx: self.tx.subscribe() }
    }
}

impl ShutdownListener {
    /// Resolve once the signal has fired. Returns immediately if it already has.
    pub async fn wait(&mut self) {
        // A dropped sender can never fire again, treat it as shutdown.
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Translate SIGINT/SIGTERM (Ctrl-C elsewhere) into the shutdown signal.
/// Signals after the first are logged and ignored.
/// Handlers are installed before this returns.
pub fn listen_for_signals(shutdown: Shutdown) -> JoinHandle<()> {
    let signals = SignalStreams::install();
    tokio::spawn(async move {
        let mut signals = match signals {
            Ok(signals) => signals,
            Err(e) => {
                warn!("Failed to listen for shutdown signals: {}", e);
                return;
            }
        };
        loop {
            let name = match signals.recv().await {
                Ok(name) => name,
                Err(e) => {
                    warn!("Failed to listen for shutdown signals: {}", e);
                    return;
                }
            };
            if shutdown.trigger() {
                info!("Received {}, shutting down", name);
            } else {
                warn!("Received {} again, shutdown already in progress", name);
            }
        }
    })
}

#[cfg(unix)]
struct SignalStreams {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalStreams {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self { terminate: signal(SignalKind::terminate())?, interrupt: signal(SignalKind::interrupt())? })
    }

    async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::select! {
            _ = self.terminate.recv() => Ok("SIGTERM"),
            _ = self.interrupt.recv() => Ok("SIGINT"),
        }
    }
}

#[cfg(not(unix))]
struct SignalStreams;

#[cfg(not(unix))]
impl SignalStreams {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl-C")
    }
}
