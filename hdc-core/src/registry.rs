//! Entity registry tracking which sensors each config entry owns.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::sensor::BinSensor;

struct Registered {
    entry_id: String,
    sensor: Arc<BinSensor>,
}

/// Sensors keyed by unique id.
#[derive(Default)]
pub struct EntityRegistry {
    entities: RwLock<BTreeMap<String, Registered>>,
}

impl EntityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register sensors for an entry, skipping unique ids already taken.
    ///
    /// Returns how many sensors were added.
    pub fn add_entities(&self, entry_id: &str, sensors: Vec<BinSensor>) -> usize {
        let mut entities = self.entities.write();
        let mut added = 0;
        for sensor in sensors {
            if entities.contains_key(sensor.unique_id()) {
                warn!(unique_id = %sensor.unique_id(), "Entity already registered, skipping");
                continue;
            }
            entities.insert(
                sensor.unique_id().to_owned(),
                Registered {
                    entry_id: entry_id.to_owned(),
                    sensor: Arc::new(sensor),
                },
            );
            added += 1;
        }
        added
    }

    /// Whether a sensor with `unique_id` exists.
    #[must_use]
    pub fn contains(&self, unique_id: &str) -> bool {
        self.entities.read().contains_key(unique_id)
    }

    /// Look up a sensor by unique id.
    #[must_use]
    pub fn get(&self, unique_id: &str) -> Option<Arc<BinSensor>> {
        self.entities
            .read()
            .get(unique_id)
            .map(|registered| Arc::clone(&registered.sensor))
    }

    /// All sensors, ordered by unique id.
    #[must_use]
    pub fn entities(&self) -> Vec<Arc<BinSensor>> {
        self.entities
            .read()
            .values()
            .map(|registered| Arc::clone(&registered.sensor))
            .collect()
    }

    /// Sensors owned by one entry, ordered by unique id.
    #[must_use]
    pub fn entities_for_entry(&self, entry_id: &str) -> Vec<Arc<BinSensor>> {
        self.entities
            .read()
            .values()
            .filter(|registered| registered.entry_id == entry_id)
            .map(|registered| Arc::clone(&registered.sensor))
            .collect()
    }

    /// Drop every sensor owned by an entry. Returns how many were removed.
    pub fn remove_entry(&self, entry_id: &str) -> usize {
        let mut entities = self.entities.write();
        let before = entities.len();
        entities.retain(|_, registered| registered.entry_id != entry_id);
        before - entities.len()
    }

    /// Number of registered sensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Whether no sensors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::coordinator::{UpdateFailed, UpdateMethod};
    use crate::model::{BinSchedule, Uprn};
    use crate::sensor::BinCoordinator;

    struct Empty;

    #[async_trait]
    impl UpdateMethod<BinSchedule> for Empty {
        async fn update(&self) -> Result<BinSchedule, UpdateFailed> {
            Ok(BinSchedule::default())
        }
    }

    fn sensors(uprn: u64, bin_types: &[&str]) -> Vec<BinSensor> {
        let coordinator = Arc::new(BinCoordinator::new(
            "test",
            Duration::from_secs(60),
            Arc::new(Empty),
        ));
        bin_types
            .iter()
            .map(|bin_type| BinSensor::new(Arc::clone(&coordinator), Uprn(uprn), *bin_type))
            .collect()
    }

    #[test]
    fn taken_unique_ids_are_skipped() {
        let registry = EntityRegistry::new();

        let added = registry.add_entities("hdc_1", sensors(1, &["general", "recycling"]));
        assert_eq!(added, 2, "both added");

        let added = registry.add_entities("hdc_1", sensors(1, &["recycling", "garden"]));
        assert_eq!(added, 1, "only garden is new");
        assert_eq!(registry.len(), 3, "three sensors");
        assert!(registry.contains("1_garden_bin"), "garden registered");
    }

    #[test]
    fn removing_an_entry_keeps_other_entries() {
        let registry = EntityRegistry::new();
        registry.add_entities("hdc_1", sensors(1, &["general", "recycling"]));
        registry.add_entities("hdc_2", sensors(2, &["general"]));

        assert_eq!(registry.remove_entry("hdc_1"), 2, "first entry's sensors removed");
        assert_eq!(registry.remove_entry("hdc_1"), 0, "nothing left to remove");

        let remaining: Vec<String> = registry
            .entities()
            .iter()
            .map(|sensor| sensor.unique_id().to_owned())
            .collect();
        assert_eq!(remaining, vec!["2_general_bin".to_owned()], "second entry kept");
        assert_eq!(
            registry.entities_for_entry("hdc_2").len(),
            1,
            "lookup by entry"
        );
        assert!(registry.get("1_general_bin").is_none(), "lookup by unique id");
    }
}
