
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use ipfilter_common::Mode;
use num_traits::FromPrimitive;
use tokio::sync::Notify;
use tracing::info;

/// State shared between the dispatcher and whoever controls it.
///
/// The mode is read once per record, so a change applies from the next
/// record on. A stop request is seen at the top of the dispatch loop and also
/// wakes a dispatcher blocked on its input.
#[derive(Debug)]
pub struct SharedState {
    mode: AtomicU8,
    stop: AtomicBool,
    // Holds at most one permit, there is a single dispatcher waiting on it.
    wake: Notify,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl SharedState {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode: AtomicU8::new(mode as u8),
            stop: AtomicBool::new(false),
            wake: Notify::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        // Only `set_mode` stores into the cell, so the fallback never fires.
        Mode::from_u8(self.mode.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn set_mode(&self, mode: Mode) {
        self.mode.store(mode as u8, Ordering::Release);
        info!(%mode, "mode changed");
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Completes once a stop has been requested.
    pub async fn stopped(&self) {
        while !self.stop_requested() {
            self.wake.notified().await;
        }
    }
}
