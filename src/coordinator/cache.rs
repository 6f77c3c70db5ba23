use crate::prelude::*;
use crate::snapshot::{InverterRatedParams, InverterSensorData, InverterSettings, InverterSnapshot};

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Last good response for one command on one inverter.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedResponse {
    pub data: Decoded,
    /// Set when the most recent poll failed and `data` is from an earlier one.
    pub stale: bool,
    pub updated_at: DateTime<Local>,
}

/// Keyed by (inverter name, upper-cased command).
#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<Mutex<HashMap<(String, String), CachedResponse>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<(String, String), CachedResponse>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn key(inverter: &str, command: &str) -> (String, String) {
        (inverter.to_string(), command.trim().to_ascii_uppercase())
    }

    /// Stores a fresh result. An error result never overwrites data; it only
    /// marks whatever is already cached as stale. Returns true if `data` was
    /// stored.
    pub fn update(&self, inverter: &str, command: &str, data: Decoded) -> bool {
        let mut entries = self.entries();
        let key = Self::key(inverter, command);

        if data.is_error() {
            if let Some(entry) = entries.get_mut(&key) {
                entry.stale = true;
            }
            return false;
        }

        entries.insert(
            key,
            CachedResponse {
                data,
                stale: false,
                updated_at: Local::now(),
            },
        );
        true
    }

    pub fn get(&self, inverter: &str, command: &str) -> Option<CachedResponse> {
        self.entries().get(&Self::key(inverter, command)).cloned()
    }

    /// Builds a typed snapshot from whatever is cached for `inverter`,
    /// preferring the raw Modbus blocks over the ASCII queries.
    pub fn snapshot(&self, inverter: &str) -> Option<InverterSnapshot> {
        let sensors_block = self.get(inverter, modbus::SENSORS_COMMAND);
        let config_block = self.get(inverter, modbus::CONFIG_COMMAND);

        let (sensors_entry, config_entry, sensors, settings, rated) =
            if sensors_block.is_some() || config_block.is_some() {
                let sensors = sensors_block
                    .as_ref()
                    .and_then(|c| InverterSensorData::from_modbus(&c.data));
                let settings = config_block
                    .as_ref()
                    .and_then(|c| InverterSettings::from_modbus(&c.data));
                (sensors_block, config_block, sensors, settings, None)
            } else {
                let qpigs = self.get(inverter, "QPIGS");
                let qpiri = self.get(inverter, "QPIRI");
                let sensors = qpigs.as_ref().and_then(|c| InverterSensorData::from_qpigs(&c.data));
                let settings = qpiri.as_ref().and_then(|c| InverterSettings::from_qpiri(&c.data));
                let rated = qpiri.as_ref().and_then(|c| InverterRatedParams::from_qpiri(&c.data));
                (qpigs, qpiri, sensors, settings, rated)
            };

        let used: Vec<&CachedResponse> = sensors_entry.iter().chain(config_entry.iter()).collect();
        let updated_at = used.iter().map(|c| c.updated_at).max()?;

        Some(InverterSnapshot {
            name: inverter.to_string(),
            sensors,
            settings,
            rated,
            stale: used.iter().any(|c| c.stale),
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voltronic::decode;

    const QPIGS: &str = "(230.0 50.0 230.0 50.0 0600 0550 010 400 52.60 010 090 0040 006.1 095.0 52.60 00000 00000000 00 00 00555 00000000 00 00 0000";

    #[test]
    fn errors_mark_previous_value_stale() {
        let cache = ResponseCache::new();
        assert!(!cache.update("main", "QMOD", Decoded::error("timeout after 5000ms")));
        assert_eq!(cache.get("main", "QMOD"), None);

        assert!(cache.update("main", "qmod", decode("QMOD", "(B")));
        assert!(!cache.get("main", "QMOD").unwrap().stale);

        cache.update("main", "QMOD", Decoded::error("empty response"));
        let entry = cache.get("main", "QMOD").unwrap();
        assert!(entry.stale);
        assert_eq!(entry.data.get_str("operating_mode"), Some("Battery"));
    }

    #[test]
    fn ascii_snapshot() {
        let cache = ResponseCache::new();
        assert_eq!(cache.snapshot("main"), None);

        cache.update("main", "QPIGS", decode("QPIGS", QPIGS));
        let snapshot = cache.snapshot("main").unwrap();
        assert_eq!(snapshot.name, "main");
        assert!(!snapshot.stale);
        assert_eq!(snapshot.sensors.unwrap().battery_capacity, 90.0);
        assert_eq!(snapshot.settings, None);

        cache.update("main", "QPIGS", Decoded::error("empty response"));
        assert!(cache.snapshot("main").unwrap().stale);
        assert_eq!(cache.snapshot("other"), None);
    }
}
