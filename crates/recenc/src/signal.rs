use std::io;
use std::sync::{Arc, OnceLock};
use log::warn;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    signal: OnceLock<&'static str>,
    notify: Notify,
}

/// Cloneable handle to the stop request
///
/// Handlers only record which signal arrived; the main path does the cleanup.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    /// A stop handle with no signal handlers attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Register handlers for HUP, INT, QUIT and TERM
    ///
    /// Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let stop = Self::new();
        let kinds = [
            (SignalKind::hangup(), "HUP"),
            (SignalKind::interrupt(), "INT"),
            (SignalKind::quit(), "QUIT"),
            (SignalKind::terminate(), "TERM"),
        ];

        for (kind, name) in kinds {
            let mut stream = signal(kind)?;
            let stop = stop.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    stop.trigger(name);
                }
            });
        }

        Ok(stop)
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        let stop = Self::new();
        let handle = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.trigger("INT");
            }
        });
        Ok(stop)
    }

    /// Record a stop request; only the first signal name is kept
    pub fn trigger(&self, name: &'static str) {
        warn!("Trap signal SIG{}", name);
        if self.inner.signal.set(name).is_ok() {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.inner.signal.get().is_some()
    }

    /// Name of the signal that requested the stop, without the `SIG` prefix
    pub fn signal_name(&self) -> Option<&'static str> {
        self.inner.signal.get().copied()
    }

    /// Resolve once a stop has been requested
    pub async fn requested(&self) -> &'static str {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(name) = self.signal_name() {
                return name;
            }
            notified.await;
        }
    }
}
