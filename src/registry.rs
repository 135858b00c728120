//! Live accessories keyed by Bluetooth address
use std::collections::HashMap;
use std::fmt;

use log::debug;
use time::{Duration, OffsetDateTime};

use crate::bluetooth::decoder::DecodedReading;
use crate::bridge::AccessoryInfo;
use crate::config::SensorEntry;
use crate::models::{BroadcastEvent, SensorValues, VendorKind};

/// State of one bridged sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessoryRecord {
    pub address: String,
    /// Vendor the address is bound to for the lifetime of the record.
    pub kind: VendorKind,
    pub info: AccessoryInfo,
    /// Last decoded reading, before calibration.
    pub reading: DecodedReading,
    /// Displayed values, calibration included.
    pub values: SensorValues,
    pub configuration: Option<SensorEntry>,
    pub first_seen: OffsetDateTime,
    pub last_seen: OffsetDateTime,
    pub reachable: bool,
}

impl AccessoryRecord {
    fn new(event: &BroadcastEvent, reading: DecodedReading, entry: Option<&SensorEntry>) -> Self {
        Self {
            address: event.address.clone(),
            kind: reading.kind(),
            info: AccessoryInfo::new(&event.address, event.local_name.as_deref(), &reading, entry),
            reading,
            values: displayed_values(&reading, entry),
            configuration: entry.cloned(),
            first_seen: event.received_at,
            last_seen: event.received_at,
            reachable: true,
        }
    }

    fn update(&mut self, reading: DecodedReading, entry: Option<&SensorEntry>, seen_at: OffsetDateTime) {
        self.reading = reading;
        self.values = displayed_values(&reading, entry);
        self.configuration = entry.cloned();
        self.last_seen = self.last_seen.max(seen_at);
        self.reachable = true;
    }

    /// Time since the sensor was last heard.
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.last_seen
    }
}

// Calibration always starts from the raw decoded values.
fn displayed_values(reading: &DecodedReading, entry: Option<&SensorEntry>) -> SensorValues {
    let raw = reading.values();
    match entry {
        Some(entry) => raw.calibrated(entry.temperature_delta(), entry.humidity_delta()),
        None => raw,
    }
}

/// Why an offered reading was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The address is already tracked as another vendor.
    KindMismatch {
        bound: VendorKind,
        offered: VendorKind,
    },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KindMismatch { bound, offered } => {
                write!(f, "bound to {}, offered {}", bound, offered)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OfferOutcome {
    Created(AccessoryRecord),
    Updated(AccessoryRecord),
    Rejected(RejectReason),
}

/// Accessories currently tracked, one per Bluetooth address.
#[derive(Debug, Default)]
pub struct AccessoryRegistry {
    records: HashMap<String, AccessoryRecord>,
}

impl AccessoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an accepted reading: create the record on first sight, update it
    /// when the vendor matches, reject it otherwise.
    pub fn offer(
        &mut self,
        event: &BroadcastEvent,
        reading: DecodedReading,
        entry: Option<&SensorEntry>,
    ) -> OfferOutcome {
        match self.records.get_mut(&event.address) {
            Some(record) if record.kind != reading.kind() => {
                let reason = RejectReason::KindMismatch {
                    bound: record.kind,
                    offered: reading.kind(),
                };
                debug!("Ignoring reading for {}: {}", event.address, reason);
                OfferOutcome::Rejected(reason)
            }
            Some(record) => {
                record.update(reading, entry, event.received_at);
                OfferOutcome::Updated(record.clone())
            }
            None => {
                let record = AccessoryRecord::new(event, reading, entry);
                self.records.insert(event.address.clone(), record.clone());
                OfferOutcome::Created(record)
            }
        }
    }

    /// Remove every record unseen for longer than `timeout`.
    pub fn evict_stale(&mut self, now: OffsetDateTime, timeout: Duration) -> Vec<AccessoryRecord> {
        let stale: Vec<String> = self
            .records
            .values()
            .filter(|record| record.age(now) > timeout)
            .map(|record| record.address.clone())
            .collect();

        let mut evicted: Vec<AccessoryRecord> = stale
            .iter()
            .filter_map(|address| self.records.remove(address))
            .map(|mut record| {
                record.reachable = false;
                record
            })
            .collect();
        evicted.sort_by(|a, b| a.address.cmp(&b.address));
        evicted
    }

    /// Copy of all records, ordered by address.
    pub fn snapshot(&self) -> Vec<AccessoryRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.address.cmp(&b.address));
        records
    }

    pub fn get(&self, address: &str) -> Option<&AccessoryRecord> {
        self.records.get(address)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::decoder::{GeSensor, GoveeThermometer};
    use crate::config::Calibration;

    fn ge(temperature: u16) -> DecodedReading {
        DecodedReading::Ge(GeSensor {
            model: 1,
            version: 1,
            battery: 190,
            temperature,
            humidity: 500,
            checksum: 0,
        })
    }

    fn govee() -> DecodedReading {
        DecodedReading::Govee(GoveeThermometer {
            packed: 224_154,
            battery: 80,
        })
    }

    fn event(address: &str, at: OffsetDateTime) -> BroadcastEvent {
        BroadcastEvent::new(address, None).received_at(at)
    }

    fn calibrated_entry(temperature: f32) -> SensorEntry {
        let mut entry = SensorEntry::new("AA:BB:CC");
        entry.calibration = Some(Calibration {
            temperature: Some(temperature),
            humidity: None,
        });
        entry
    }

    #[test]
    fn first_offer_creates_then_updates() {
        let mut registry = AccessoryRegistry::new();
        let now = OffsetDateTime::now_utc();

        let created = registry.offer(&event("AA:BB:CC", now), ge(200), None);
        let OfferOutcome::Created(first) = created else {
            panic!("expected Created, got {created:?}");
        };
        let updated = registry.offer(&event("AA:BB:CC", now), ge(200), None);
        let OfferOutcome::Updated(second) = updated else {
            panic!("expected Updated, got {updated:?}");
        };

        assert_eq!(first.values, second.values);
        assert_eq!(registry.len(), 1);
        assert!(second.reachable);
    }

    #[test]
    fn readings_are_overwritten() {
        let mut registry = AccessoryRegistry::new();
        let now = OffsetDateTime::now_utc();
        registry.offer(&event("AA:BB:CC", now), ge(200), None);
        registry.offer(&event("AA:BB:CC", now), ge(215), None);
        let record = registry.get("AA:BB:CC").unwrap();
        assert_eq!(record.values.temperature, 21.5);
        assert_eq!(record.reading, ge(215));
    }

    #[test]
    fn calibration_does_not_compound() {
        let mut registry = AccessoryRegistry::new();
        let entry = calibrated_entry(1.5);
        let now = OffsetDateTime::now_utc();
        for _ in 0..3 {
            registry.offer(&event("AA:BB:CC", now), ge(200), Some(&entry));
            assert_eq!(registry.get("AA:BB:CC").unwrap().values.temperature, 21.5);
        }
    }

    #[test]
    fn other_vendor_is_rejected_while_tracked() {
        let mut registry = AccessoryRegistry::new();
        let now = OffsetDateTime::now_utc();
        registry.offer(&event("AA:BB:CC", now), ge(200), None);

        let outcome = registry.offer(&event("AA:BB:CC", now), govee(), None);
        assert_eq!(
            outcome,
            OfferOutcome::Rejected(RejectReason::KindMismatch {
                bound: VendorKind::Ge,
                offered: VendorKind::Govee,
            })
        );
        assert_eq!(registry.get("AA:BB:CC").unwrap().kind, VendorKind::Ge);
    }

    #[test]
    fn last_seen_never_moves_backwards() {
        let mut registry = AccessoryRegistry::new();
        let now = OffsetDateTime::now_utc();
        registry.offer(&event("AA:BB:CC", now), ge(200), None);
        registry.offer(&event("AA:BB:CC", now - Duration::seconds(30)), ge(210), None);
        let record = registry.get("AA:BB:CC").unwrap();
        assert_eq!(record.last_seen, now);
        assert_eq!(record.values.temperature, 21.0);
    }

    #[test]
    fn evicts_only_stale_records() {
        let mut registry = AccessoryRegistry::new();
        let now = OffsetDateTime::now_utc();
        registry.offer(&event("AA:BB:CC", now - Duration::seconds(400)), ge(200), None);
        registry.offer(&event("DD:EE:FF", now - Duration::seconds(100)), govee(), None);

        let evicted = registry.evict_stale(now, Duration::seconds(300));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].address, "AA:BB:CC");
        assert!(!evicted[0].reachable);
        assert!(registry.get("AA:BB:CC").is_none());
        assert!(registry.get("DD:EE:FF").is_some());
        assert!(registry.evict_stale(now, Duration::seconds(300)).is_empty());
    }

    #[test]
    fn evicted_address_is_rediscovered_with_new_binding() {
        let mut registry = AccessoryRegistry::new();
        let now = OffsetDateTime::now_utc();
        registry.offer(&event("AA:BB:CC", now - Duration::seconds(400)), ge(200), None);
        registry.evict_stale(now, Duration::seconds(300));

        let outcome = registry.offer(&event("AA:BB:CC", now), govee(), None);
        let OfferOutcome::Created(record) = outcome else {
            panic!("expected Created, got {outcome:?}");
        };
        assert_eq!(record.kind, VendorKind::Govee);
        assert_eq!(record.first_seen, now);
    }

    #[test]
    fn snapshot_is_sorted_copy() {
        let mut registry = AccessoryRegistry::new();
        let now = OffsetDateTime::now_utc();
        registry.offer(&event("DD:EE:FF", now), govee(), None);
        registry.offer(&event("AA:BB:CC", now), ge(200), None);
        let addresses: Vec<_> = registry.snapshot().into_iter().map(|r| r.address).collect();
        assert_eq!(addresses, vec!["AA:BB:CC", "DD:EE:FF"]);
        assert!(!registry.is_empty());
    }
}
