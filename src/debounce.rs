// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trailing-edge debounce between raw keystrokes and settled search terms.
//!
//! Every update cancels the pending timer and schedules a new one. When a
//! window elapses with no further input the raw term becomes the settled
//! term and is published on a `watch` channel. Superseded values are
//! overwritten, never queued.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebouncePolicy {
    /// 200ms, used by the indexed search path.
    #[default]
    Optimized,
    /// 300ms, used by the plain field filter.
    Simple,
    Custom(Duration),
}

impl DebouncePolicy {
    pub fn window(self) -> Duration {
        match self {
            DebouncePolicy::Optimized => Duration::from_millis(200),
            DebouncePolicy::Simple => Duration::from_millis(300),
            DebouncePolicy::Custom(window) => window,
        }
    }
}

#[derive(Default)]
struct ControllerState {
    raw: String,
    settled: String,
    settling: bool,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

struct Shared {
    state: Mutex<ControllerState>,
    settled_tx: watch::Sender<String>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, term: &str) {
        self.settled_tx.send_if_modified(|current| {
            if current == term {
                return false;
            }
            term.clone_into(current);
            true
        });
    }

    fn settle(&self, generation: u64) {
        let mut state = self.lock();
        // A newer update got here first.
        if state.generation != generation {
            return;
        }
        state.settled = state.raw.clone();
        state.settling = false;
        state.timer = None;
        debug!(term = %state.settled, "search term settled");
        self.publish(&state.settled);
    }
}

/// Raw/settled term pair with an explicit cancellable timer.
///
/// [`set_term`](QueryController::set_term) spawns onto the current Tokio
/// runtime and must be called from within one.
pub struct QueryController {
    shared: Arc<Shared>,
    window: Duration,
}

impl QueryController {
    pub fn new(policy: DebouncePolicy) -> Self {
        Self::with_initial(String::new(), policy)
    }

    /// Start already settled on `term`, e.g. a restored search.
    pub fn with_initial(term: impl Into<String>, policy: DebouncePolicy) -> Self {
        let term = term.into();
        let (settled_tx, _) = watch::channel(term.clone());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ControllerState {
                    raw: term.clone(),
                    settled: term,
                    ..ControllerState::default()
                }),
                settled_tx,
            }),
            window: policy.window(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a keystroke and restart the settling window.
    pub fn set_term(&self, term: impl Into<String>) {
        let mut state = self.shared.lock();
        state.raw = term.into();
        if state.raw != state.settled {
            state.settling = true;
        }
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;

        let generation = state.generation;
        let shared = Arc::clone(&self.shared);
        let deadline = tokio::time::Instant::now() + self.window;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            shared.settle(generation);
        }));
    }

    /// Cancel any pending window and settle on the empty term immediately.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;
        state.raw.clear();
        state.settled.clear();
        state.settling = false;
        self.shared.publish("");
    }

    /// Settle the current raw term now instead of waiting out the window.
    pub fn flush(&self) {
        let generation = {
            let mut state = self.shared.lock();
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.generation += 1;
            state.generation
        };
        self.shared.settle(generation);
    }

    pub fn raw_term(&self) -> String {
        self.shared.lock().raw.clone()
    }

    pub fn settled_term(&self) -> String {
        self.shared.lock().settled.clone()
    }

    /// True from the first divergence of raw and settled terms until the
    /// window passes quietly.
    pub fn is_settling(&self) -> bool {
        self.shared.lock().settling
    }

    /// Receiver notified each time the settled term changes.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.shared.settled_tx.subscribe()
    }
}

impl Drop for QueryController {
    fn drop(&mut self) {
        if let Some(timer) = self.shared.lock().timer.take() {
            timer.abort();
        }
    }
}
