//! Refresh coordinator: runs an update method on an interval and caches its last good result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::ports::ApiError;

#[derive(thiserror::Error, Debug)]
/// Reasons an update method can fail.
pub enum UpdateFailed {
    /// The update did not finish before its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    /// The backend request failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

#[async_trait]
/// Produces a fresh snapshot for a [`DataUpdateCoordinator`].
pub trait UpdateMethod<T>: Send + Sync {
    /// Fetch a complete snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateFailed`] when no snapshot could be produced.
    async fn update(&self) -> Result<T, UpdateFailed>;
}

struct CoordinatorState<T> {
    data: Option<Arc<T>>,
    last_update_success: bool,
    last_error: Option<String>,
}

/// Single-flight refresher with last-known-good caching.
///
/// The snapshot is replaced wholesale on success and left untouched on failure;
/// readers always see a complete value.
pub struct DataUpdateCoordinator<T> {
    name: String,
    update_interval: Duration,
    update_method: Arc<dyn UpdateMethod<T>>,
    state: RwLock<CoordinatorState<T>>,
    refresh_lock: Mutex<()>,
    generation: watch::Sender<u64>,
    cancel: CancellationToken,
}

impl<T: Send + Sync + 'static> DataUpdateCoordinator<T> {
    /// Create a coordinator; nothing runs until [`refresh`](Self::refresh) or [`start`](Self::start).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        update_interval: Duration,
        update_method: Arc<dyn UpdateMethod<T>>,
    ) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            name: name.into(),
            update_interval,
            update_method,
            state: RwLock::new(CoordinatorState {
                data: None,
                last_update_success: true,
                last_error: None,
            }),
            refresh_lock: Mutex::new(()),
            generation,
            cancel: CancellationToken::new(),
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time between scheduled refreshes.
    #[must_use]
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Latest successfully fetched snapshot.
    #[must_use]
    pub fn data(&self) -> Option<Arc<T>> {
        self.state.read().data.clone()
    }

    /// Whether the most recent refresh succeeded.
    #[must_use]
    pub fn last_update_success(&self) -> bool {
        self.state.read().last_update_success
    }

    /// Message of the most recent failure, cleared on success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    /// Receiver bumped after every completed refresh attempt.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Token cancelled by [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the update method once and publish its outcome.
    ///
    /// Callers arriving while a refresh is in flight wait for it and share its result.
    pub async fn refresh(&self) {
        let seen = *self.generation.borrow();
        let _guard = self.refresh_lock.lock().await;
        if *self.generation.borrow() != seen {
            debug!(coordinator = %self.name, "Joined in-flight refresh");
            return;
        }

        let started = Instant::now();
        let result = self.update_method.update().await;

        {
            let mut state = self.state.write();
            match result {
                Ok(data) => {
                    if !state.last_update_success {
                        info!(coordinator = %self.name, "Fetching data recovered");
                    }
                    state.data = Some(Arc::new(data));
                    state.last_update_success = true;
                    state.last_error = None;
                    debug!(
                        coordinator = %self.name,
                        elapsed = ?started.elapsed(),
                        "Finished fetching data"
                    );
                }
                Err(err) => {
                    if state.last_update_success {
                        error!(coordinator = %self.name, error = %err, "Error fetching data");
                    } else {
                        debug!(coordinator = %self.name, error = %err, "Error fetching data");
                    }
                    state.last_update_success = false;
                    state.last_error = Some(err.to_string());
                }
            }
        }

        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Spawn the interval task. The first scheduled refresh happens one interval from now.
    ///
    /// A refresh in flight when the coordinator shuts down is dropped without publishing.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let period = coordinator.update_interval;
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = coordinator.refresh() => {}
                }
            }
            debug!(coordinator = %coordinator.name, "Stopped scheduled refreshes");
        })
    }

    /// Stop scheduled refreshes.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
