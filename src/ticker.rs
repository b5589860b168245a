//! Periodic tick driver.
//!
//! The deferral queue only makes progress when someone calls
//! [`TernaryEngine::tick`]. Embedded callers can do that from their own
//! scheduler; everyone else attaches a [`Ticker`], a dedicated thread that
//! ticks the engine at the configured interval until shut down or dropped.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::trace;

use crate::engine::TernaryEngine;

/// Handle to the background tick thread. Shutting down (or dropping) the
/// handle stops the thread and joins it.
#[derive(Debug)]
pub struct Ticker {
    shutdown_tx: Sender<()>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Ticker {
    /// Spawns a tick thread driving `engine` at `interval`.
    #[must_use]
    pub fn spawn(engine: Arc<TernaryEngine>, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_micros(1));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let join = thread::Builder::new()
            .name("trivalent-ticker".to_string())
            .spawn(move || loop {
                match shutdown_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let resolved = engine.tick();
                        if resolved > 0 {
                            trace!(resolved, "ticker pass");
                        }
                    }
                }
            })
            .expect("failed to spawn trivalent ticker");

        Self {
            shutdown_tx,
            join: Mutex::new(Some(join)),
        }
    }

    /// Spawns a ticker using the engine's configured tick interval.
    #[must_use]
    pub fn spawn_default(engine: Arc<TernaryEngine>) -> Self {
        let interval = engine.config().tick_interval;
        Self::spawn(engine, interval)
    }

    /// Stops the tick thread and waits for it to exit. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
        let handle = {
            let mut join = match self.join.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            join.take()
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
