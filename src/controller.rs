//! Broadcast pipeline: decode, filter against the configuration, update the
//! registry and drive the protocol bridge
use std::sync::Arc;

use futures_util::{pin_mut, Stream, StreamExt};
use log::{debug, info};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::bluetooth::decoder;
use crate::bridge::ProtocolBridge;
use crate::config::SensorConfiguration;
use crate::error::BridgeError;
use crate::models::BroadcastEvent;
use crate::registry::{AccessoryRecord, AccessoryRegistry, OfferOutcome, RejectReason};
use crate::utils::{duration_to_seconds, format_datetime, to_hex};
use crate::watchdog;

/// What happened to a single broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// No supported payload.
    Ignored,
    /// Decoded, but not in the configured allow-list.
    Filtered,
    Created,
    Updated,
    Rejected(RejectReason),
}

/// Shared handle to the bridge. Clones share one registry.
#[derive(Clone)]
pub struct BridgeController {
    inner: Arc<Inner>,
}

struct Inner {
    config: SensorConfiguration,
    registry: Mutex<AccessoryRegistry>,
    bridge: Arc<dyn ProtocolBridge>,
}

impl BridgeController {
    pub fn new(config: SensorConfiguration, bridge: Arc<dyn ProtocolBridge>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry: Mutex::new(AccessoryRegistry::new()),
                bridge,
            }),
        }
    }

    pub fn config(&self) -> &SensorConfiguration {
        &self.inner.config
    }

    /// Process one broadcast to completion.
    pub async fn handle_event(&self, event: &BroadcastEvent) -> EventOutcome {
        let Some(manufacturer_data) = &event.manufacturer_data else {
            return EventOutcome::Ignored;
        };
        let Some(reading) = decoder::decode(manufacturer_data) else {
            debug!(
                "No decoder for {} (company {:#06x}): {}",
                event.address,
                manufacturer_data.company_id,
                to_hex(&manufacturer_data.data)
            );
            return EventOutcome::Ignored;
        };

        let config = &self.inner.config;
        let entry = config.lookup(&event.id_candidates());
        if entry.is_none() && config.is_allow_list_active() {
            info!(
                "Ignoring {} {} ({}): not configured",
                reading.kind(),
                event.address,
                event.local_name.as_deref().unwrap_or("unnamed")
            );
            return EventOutcome::Filtered;
        }

        let mut registry = self.inner.registry.lock().await;
        match registry.offer(event, reading, entry) {
            OfferOutcome::Created(record) => {
                info!(
                    "Discovered {} '{}' at {}: {}",
                    record.kind, record.info.name, record.address, record.values
                );
                self.inner
                    .bridge
                    .add_device(&record.address, record.kind, &record.info, &record.values);
                EventOutcome::Created
            }
            OfferOutcome::Updated(record) => {
                debug!("Received data from {}: {}", record.address, record.values);
                self.inner.bridge.update_device(&record.address, &record.values);
                EventOutcome::Updated
            }
            OfferOutcome::Rejected(reason) => EventOutcome::Rejected(reason),
        }
    }

    /// Remove accessories unseen for longer than the configured timeout.
    pub async fn sweep(&self, now: OffsetDateTime) -> Vec<AccessoryRecord> {
        let mut registry = self.inner.registry.lock().await;
        let evicted = registry.evict_stale(now, self.inner.config.timeout());

        for record in &evicted {
            info!(
                "Removing '{}' ({}): not seen for {}s, last seen {}",
                record.info.name,
                record.address,
                duration_to_seconds(record.age(now)),
                format_datetime(&record.last_seen)
            );
            self.inner.bridge.remove_device(&record.address);
        }
        if !evicted.is_empty() {
            info!("{} accessories remain", registry.len());
        }

        evicted
    }

    pub async fn snapshot(&self) -> Vec<AccessoryRecord> {
        self.inner.registry.lock().await.snapshot()
    }

    /// Start the reachability watchdog on the runtime.
    pub fn spawn_watchdog(&self) -> JoinHandle<()> {
        let period = watchdog::period_for(self.inner.config.timeout());
        tokio::spawn(watchdog::run(self.clone(), period))
    }

    /// Consume broadcasts one at a time until the radio stream fails or ends.
    ///
    /// Only returns on transport failure.
    pub async fn run<S>(&self, events: S) -> Result<(), BridgeError>
    where
        S: Stream<Item = Result<BroadcastEvent, BridgeError>>,
    {
        info!("Starting sensor bridge");
        pin_mut!(events);

        while let Some(event) = events.next().await {
            self.handle_event(&event?).await;
        }

        Err(BridgeError::ScanEnded)
    }
}
