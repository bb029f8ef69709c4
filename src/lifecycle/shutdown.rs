//! Stop signal shared by the content server, the sidecar and every open
//! live-reload socket.

use tokio::sync::broadcast;

/// One-shot stop broadcast.
///
/// `ContentServer::run`/`run_tls` and `Sidecar::run` each hold a receiver for
/// graceful shutdown of their listener; each browser session holds another so
/// it can send a close frame. Clones share the same channel.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for a listener or a browser session.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop both listeners and close open reload sockets.
    ///
    /// Calling it with nobody subscribed (before startup finished) is a no-op.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Listeners plus connected browsers still waiting for the signal.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.clone().subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn closed_session_releases_its_receiver() {
        let shutdown = Shutdown::new();
        let _listener = shutdown.subscribe();
        let session = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        drop(session);
        assert_eq!(shutdown.receiver_count(), 1);
    }

    #[test]
    fn trigger_without_subscribers_is_harmless() {
        Shutdown::default().trigger();
    }
}
