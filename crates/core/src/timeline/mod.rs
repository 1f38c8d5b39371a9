use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{session::EventSender, ArDancerError, Result};

/// Periodic source of [`SessionEvent::Tick`](crate::SessionEvent::Tick).
///
/// Runs on its own thread until stopped, dropped, or until the session queue
/// closes.
#[derive(Debug)]
pub struct Ticker {
    sent: Arc<AtomicU64>,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn spawn(events: EventSender, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(ArDancerError::InvalidInput("tick interval must be non-zero"));
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let sent = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sent);

        let worker = thread::Builder::new()
            .name("session-ticker".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if events.tick().is_err() {
                            tracing::debug!("session queue closed, ticker exiting");
                            break;
                        }
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Self {
            sent,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }

    /// Number of ticks delivered so far.
    pub fn ticks_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| ArDancerError::msg("ticker thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
