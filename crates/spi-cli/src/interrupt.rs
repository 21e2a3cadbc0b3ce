//! User interrupt wiring: Ctrl-C, SIGTERM and the live view's stop key all
//! flip one watch channel that the driver and fan-out select on.

use tokio::sync::watch;
use tracing::debug;

#[derive(Clone)]
pub struct Interrupt {
    tx: watch::Sender<bool>,
}

impl Interrupt {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Re-arms the channel so the next workflow in a chat session can run.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Spawns the SIGINT and SIGTERM listeners. In raw mode Ctrl-C arrives
    /// as a key press instead, which the live view forwards to [`Self::trigger`].
    pub fn listen_for_signals(&self) {
        let on_int = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupt received (SIGINT)");
                on_int.trigger();
            }
        });

        #[cfg(unix)]
        {
            let on_term = self.clone();
            tokio::spawn(async move {
                use tokio::signal::unix::{SignalKind, signal};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        while sigterm.recv().await.is_some() {
                            debug!("SIGTERM received");
                            on_term.trigger();
                        }
                    }
                    Err(e) => debug!(error = %e, "Could not register SIGTERM handler"),
                }
            });
        }
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
