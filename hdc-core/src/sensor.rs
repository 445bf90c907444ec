//! Timestamp sensors exposing the next collection of each bin.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info};

use crate::DOMAIN;
use crate::coordinator::{DataUpdateCoordinator, UpdateFailed, UpdateMethod};
use crate::model::{BinSchedule, ConfigEntry, Uprn};
use crate::ports::BinCollectionPort;
use crate::registry::EntityRegistry;

/// Credit shown alongside every sensor.
pub const ATTRIBUTION: &str = "This uses data from FCC Environment and Harborough District Council";
/// Icon replacing the default clock.
pub const ICON: &str = "mdi:trash-can";
/// Manufacturer reported on each device.
pub const MANUFACTURER: &str = "Harborough District Council";
/// Area suggested for each device.
pub const SUGGESTED_AREA: &str = "Outside";

/// Coordinator type shared by all sensors of one property.
pub type BinCoordinator = DataUpdateCoordinator<BinSchedule>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How the host should interpret a sensor's value.
pub enum SensorDeviceClass {
    /// A point in time.
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Kind of device an entity belongs to.
pub enum DeviceEntryType {
    /// A web service rather than physical hardware.
    Service,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Device registry metadata for a sensor.
pub struct DeviceInfo {
    /// Kind of device.
    pub entry_type: DeviceEntryType,
    /// Identifier triple `(domain, kind, key)`.
    pub identifiers: (String, String, String),
    /// Device manufacturer.
    pub manufacturer: String,
    /// Device model.
    pub model: String,
    /// Device name.
    pub name: String,
    /// Area the device is suggested for.
    pub suggested_area: String,
}

/// Fetches a property's collections within a deadline.
pub struct BinUpdateMethod {
    port: Arc<dyn BinCollectionPort>,
    uprn: Uprn,
    timeout: Duration,
}

impl BinUpdateMethod {
    /// Create an update method for one property.
    #[must_use]
    pub fn new(port: Arc<dyn BinCollectionPort>, uprn: Uprn, timeout: Duration) -> Self {
        Self {
            port,
            uprn,
            timeout,
        }
    }
}

#[async_trait]
impl UpdateMethod<BinSchedule> for BinUpdateMethod {
    async fn update(&self) -> Result<BinSchedule, UpdateFailed> {
        let records = time::timeout(self.timeout, self.port.collect(self.uprn))
            .await
            .map_err(|_elapsed| UpdateFailed::Timeout(self.timeout))??;

        debug!(uprn = %self.uprn, records = records.len(), "Fetched bin collections");
        Ok(BinSchedule::from_records(records))
    }
}

/// A bin and its next collection date.
pub struct BinSensor {
    coordinator: Arc<BinCoordinator>,
    unique_id: String,
    uprn: Uprn,
    bin_type: String,
}

impl BinSensor {
    /// Create the sensor for `bin_type` at `uprn`.
    #[must_use]
    pub fn new(coordinator: Arc<BinCoordinator>, uprn: Uprn, bin_type: impl Into<String>) -> Self {
        let bin_type = bin_type.into();
        Self {
            coordinator,
            unique_id: sensor_unique_id(uprn, &bin_type),
            uprn,
            bin_type,
        }
    }

    /// Stable identity across restarts.
    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Property the bin belongs to.
    #[must_use]
    pub fn uprn(&self) -> Uprn {
        self.uprn
    }

    /// Waste category.
    #[must_use]
    pub fn bin_type(&self) -> &str {
        &self.bin_type
    }

    /// Display name, e.g. `General bin - 100030478839`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{} bin - {}", title_case(&self.bin_type), self.uprn)
    }

    /// Next collection, if the latest snapshot lists this bin.
    #[must_use]
    pub fn native_value(&self) -> Option<NaiveDateTime> {
        self.coordinator
            .data()
            .and_then(|schedule| schedule.get(&self.bin_type))
    }

    /// Whether the last refresh succeeded.
    #[must_use]
    pub fn available(&self) -> bool {
        self.coordinator.last_update_success()
    }

    /// Always [`SensorDeviceClass::Timestamp`].
    #[must_use]
    pub fn device_class(&self) -> SensorDeviceClass {
        SensorDeviceClass::Timestamp
    }

    /// Icon shown by the host.
    #[must_use]
    pub fn icon(&self) -> &'static str {
        ICON
    }

    /// Data source credit.
    #[must_use]
    pub fn attribution(&self) -> &'static str {
        ATTRIBUTION
    }

    /// Device registry entry for this bin.
    #[must_use]
    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            entry_type: DeviceEntryType::Service,
            identifiers: (
                DOMAIN.to_owned(),
                "uprn_and_bin".to_owned(),
                self.unique_id.clone(),
            ),
            manufacturer: MANUFACTURER.to_owned(),
            model: title_case(&self.bin_type),
            name: self.name(),
            suggested_area: SUGGESTED_AREA.to_owned(),
        }
    }

    /// State attributes reported next to the value.
    #[must_use]
    pub fn extra_state_attributes(&self) -> BTreeMap<&'static str, String> {
        let mut attributes = BTreeMap::new();
        attributes.insert("attribution", ATTRIBUTION.to_owned());
        attributes.insert("bin_type", self.bin_type.clone());
        attributes.insert("uprn", self.uprn.to_string());
        attributes
    }
}

/// Unique id of the sensor for `bin_type` at `uprn`.
#[must_use]
pub fn sensor_unique_id(uprn: Uprn, bin_type: &str) -> String {
    format!("{uprn}_{bin_type}_bin")
}

/// Register sensors for bin types in the current snapshot that have none yet.
///
/// Returns how many sensors were added; none once the coordinator has shut down.
pub fn add_new_sensors(
    coordinator: &Arc<BinCoordinator>,
    entry: &ConfigEntry,
    registry: &EntityRegistry,
) -> usize {
    if coordinator.is_shut_down() {
        return 0;
    }
    let Some(schedule) = coordinator.data() else {
        return 0;
    };

    let sensors: Vec<BinSensor> = schedule
        .bin_types()
        .filter(|bin_type| !registry.contains(&sensor_unique_id(entry.uprn(), bin_type)))
        .map(|bin_type| BinSensor::new(Arc::clone(coordinator), entry.uprn(), bin_type))
        .collect();

    if sensors.is_empty() {
        return 0;
    }
    info!(uprn = %entry.uprn(), count = sensors.len(), "Adding bin sensors");
    registry.add_entities(&entry.entry_id, sensors)
}

/// Set up the sensor platform for an entry whose coordinator has already refreshed once.
///
/// Sensors for the current snapshot are added immediately; bin types appearing in later
/// refreshes get sensors as they show up, until the coordinator shuts down.
pub fn setup_sensor_platform(
    coordinator: &Arc<BinCoordinator>,
    entry: &ConfigEntry,
    registry: &Arc<EntityRegistry>,
) -> JoinHandle<()> {
    let mut updates = coordinator.subscribe();
    add_new_sensors(coordinator, entry, registry);

    let coordinator = Arc::clone(coordinator);
    let registry = Arc::clone(registry);
    let entry = entry.clone();
    let cancel = coordinator.cancellation_token();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    add_new_sensors(&coordinator, &entry, &registry);
                }
            }
        }
    })
}

/// Capitalise the first letter of every word and lowercase the rest.
fn title_case(raw: &str) -> String {
    let mut titled = String::with_capacity(raw.len());
    let mut word_start = true;
    for character in raw.chars() {
        if character.is_alphabetic() {
            if word_start {
                titled.extend(character.to_uppercase());
            } else {
                titled.extend(character.to_lowercase());
            }
            word_start = false;
        } else {
            titled.push(character);
            word_start = true;
        }
    }
    titled
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(BinSchedule);

    #[async_trait]
    impl UpdateMethod<BinSchedule> for Fixed {
        async fn update(&self) -> Result<BinSchedule, UpdateFailed> {
            Ok(self.0.clone())
        }
    }

    fn sensor(bin_type: &str) -> BinSensor {
        let coordinator = Arc::new(BinCoordinator::new(
            "test",
            Duration::from_secs(60),
            Arc::new(Fixed(BinSchedule::default())),
        ));
        BinSensor::new(coordinator, Uprn(100_030_478_839), bin_type)
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("general"), "General", "single word");
        assert_eq!(title_case("FOOD waste"), "Food Waste", "mixed case");
        assert_eq!(title_case("garden-waste"), "Garden-Waste", "hyphenated");
    }

    #[test]
    fn identity_is_deterministic() {
        let sensor = sensor("recycling");

        assert_eq!(sensor.unique_id(), "100030478839_recycling_bin", "unique id");
        assert_eq!(sensor.name(), "Recycling bin - 100030478839", "name");
    }

    #[test]
    fn device_info_describes_service() {
        let info = sensor("general").device_info();

        assert_eq!(info.entry_type, DeviceEntryType::Service, "entry type");
        assert_eq!(
            info.identifiers,
            (
                "hdc".to_owned(),
                "uprn_and_bin".to_owned(),
                "100030478839_general_bin".to_owned()
            ),
            "identifiers"
        );
        assert_eq!(info.model, "General", "model");
        assert_eq!(info.suggested_area, "Outside", "area");
    }

    #[test]
    fn value_is_empty_before_first_refresh() {
        let sensor = sensor("general");

        assert_eq!(sensor.native_value(), None, "no data yet");
        assert_eq!(sensor.device_class(), SensorDeviceClass::Timestamp, "class");
        assert_eq!(sensor.icon(), ICON, "icon");
    }
}
