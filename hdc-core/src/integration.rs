//! Setup and teardown of config entries.
//!
//! [`HostContext`] stands in for the host runtime: it owns the council API client, the
//! entity registry, and the per-domain data mapping each UPRN to its coordinator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config_flow::ConfigFlow;
use crate::model::{ConfigEntry, Uprn};
use crate::ports::BinCollectionPort;
use crate::registry::EntityRegistry;
use crate::sensor::{BinCoordinator, BinUpdateMethod, setup_sensor_platform};

/// Time between scheduled refreshes.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
/// Deadline for a single call to the council.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Tunables applied to every entry.
pub struct IntegrationOptions {
    /// Time between scheduled refreshes.
    pub update_interval: Duration,
    /// Deadline for verification and refresh calls.
    pub refresh_timeout: Duration,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            update_interval: UPDATE_INTERVAL,
            refresh_timeout: REFRESH_TIMEOUT,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
/// Errors raised while setting up an entry.
pub enum SetupError {
    /// An entry for the UPRN is already loaded.
    #[error("UPRN {0} is already set up")]
    AlreadySetUp(Uprn),
    /// The entry was unloaded before setup finished.
    #[error("UPRN {0} was unloaded during setup")]
    UnloadedDuringSetup(Uprn),
}

/// Host-owned state shared by every entry of the integration.
pub struct HostContext {
    api: Arc<dyn BinCollectionPort>,
    registry: Arc<EntityRegistry>,
    options: IntegrationOptions,
    domain_data: Mutex<Option<HashMap<Uprn, Arc<BinCoordinator>>>>,
}

impl HostContext {
    /// Create a context with default options.
    #[must_use]
    pub fn new(api: Arc<dyn BinCollectionPort>, registry: Arc<EntityRegistry>) -> Self {
        Self {
            api,
            registry,
            options: IntegrationOptions::default(),
            domain_data: Mutex::new(None),
        }
    }

    /// Replace the options applied to entries set up from now on.
    #[must_use]
    pub fn with_options(mut self, options: IntegrationOptions) -> Self {
        self.options = options;
        self
    }

    /// Council API client shared by all entries.
    #[must_use]
    pub fn api(&self) -> Arc<dyn BinCollectionPort> {
        Arc::clone(&self.api)
    }

    /// Registry holding every sensor.
    #[must_use]
    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    /// Options in effect.
    #[must_use]
    pub fn options(&self) -> IntegrationOptions {
        self.options
    }

    /// Start a config flow for a new entry.
    #[must_use]
    pub fn config_flow<'entry, I>(&self, configured: I) -> ConfigFlow
    where
        I: IntoIterator<Item = &'entry ConfigEntry>,
    {
        ConfigFlow::new(self.api(), configured).with_timeout(self.options.refresh_timeout)
    }

    /// Coordinator of a loaded UPRN.
    #[must_use]
    pub fn coordinator(&self, uprn: Uprn) -> Option<Arc<BinCoordinator>> {
        self.domain_data
            .lock()
            .as_ref()
            .and_then(|coordinators| coordinators.get(&uprn).cloned())
    }

    /// Whether any entry is loaded.
    #[must_use]
    pub fn has_domain_data(&self) -> bool {
        self.domain_data.lock().is_some()
    }

    /// Loaded UPRNs in ascending order.
    #[must_use]
    pub fn loaded_uprns(&self) -> Vec<Uprn> {
        let mut uprns: Vec<Uprn> = self
            .domain_data
            .lock()
            .as_ref()
            .map(|coordinators| coordinators.keys().copied().collect())
            .unwrap_or_default();
        uprns.sort_unstable();
        uprns
    }
}

/// Set up bin collection sensors for a config entry.
///
/// Refreshes once before any sensor is created, then schedules refreshes every
/// [`IntegrationOptions::update_interval`]. A failed first refresh is not fatal: sensors are
/// created by the first refresh that succeeds.
///
/// # Errors
///
/// Returns [`SetupError::AlreadySetUp`] if the entry's UPRN is already loaded, and
/// [`SetupError::UnloadedDuringSetup`] if [`unload_entry`] ran before setup finished; no
/// sensors are left behind in that case.
pub async fn setup_entry(ctx: &HostContext, entry: &ConfigEntry) -> Result<(), SetupError> {
    let uprn = entry.uprn();
    let options = ctx.options;

    let coordinator = Arc::new(BinCoordinator::new(
        format!("bin collections {uprn}"),
        options.update_interval,
        Arc::new(BinUpdateMethod::new(
            ctx.api(),
            uprn,
            options.refresh_timeout,
        )),
    ));

    {
        let mut domain_data = ctx.domain_data.lock();
        let coordinators = domain_data.get_or_insert_with(HashMap::new);
        if coordinators.contains_key(&uprn) {
            return Err(SetupError::AlreadySetUp(uprn));
        }
        coordinators.insert(uprn, Arc::clone(&coordinator));
    }

    coordinator.refresh().await;
    if coordinator.is_shut_down() {
        debug!(uprn = %uprn, "Entry unloaded while refreshing, abandoning setup");
        return Err(SetupError::UnloadedDuringSetup(uprn));
    }
    if !coordinator.last_update_success() {
        warn!(uprn = %uprn, "Initial refresh failed, sensors will be added once data arrives");
    }

    let _discovery = setup_sensor_platform(&coordinator, entry, &ctx.registry);
    if coordinator.is_shut_down() {
        ctx.registry.remove_entry(&entry.entry_id);
        return Err(SetupError::UnloadedDuringSetup(uprn));
    }
    let _scheduler = coordinator.start();

    info!(
        uprn = %uprn,
        sensors = ctx.registry.entities_for_entry(&entry.entry_id).len(),
        "Set up bin collection entry"
    );
    Ok(())
}

/// Unload a config entry, stopping its refreshes and removing its sensors.
///
/// Returns `false` if the entry was not loaded.
pub fn unload_entry(ctx: &HostContext, entry: &ConfigEntry) -> bool {
    let uprn = entry.uprn();
    let removed = {
        let mut domain_data = ctx.domain_data.lock();
        let removed = domain_data
            .as_mut()
            .and_then(|coordinators| coordinators.remove(&uprn));
        if domain_data.as_ref().is_some_and(HashMap::is_empty) {
            *domain_data = None;
        }
        removed
    };

    let Some(coordinator) = removed else {
        debug!(uprn = %uprn, "Entry was not loaded");
        return false;
    };

    coordinator.shutdown();
    let sensors = ctx.registry.remove_entry(&entry.entry_id);
    info!(uprn = %uprn, sensors, "Unloaded bin collection entry");
    true
}
