//! Bluetooth Low Energy scanning that turns BlueZ discovery events into broadcasts
use bluer::{Adapter, AdapterEvent, Address};
use futures_util::{stream, Stream, StreamExt};
use log::{debug, error, info, warn};
use time::OffsetDateTime;

use crate::error::BridgeError;
use crate::models::{BroadcastEvent, ManufacturerData};

/// Open the default adapter, power it on and restrict discovery to LE.
pub async fn open_adapter() -> Result<Adapter, bluer::Error> {
    // Initialize Bluetooth session
    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create Bluetooth session: {}", e);
            return Err(e);
        }
    };

    let adapter = match session.default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Failed to get default Bluetooth adapter: {}", e);
            return Err(e);
        }
    };

    if let Err(e) = adapter.set_powered(true).await {
        error!("Failed to power on adapter: {}", e);
        return Err(e);
    }

    // Sensors repeat the same advertisement with new values, keep duplicates
    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le,
        duplicate_data: true,
        ..Default::default()
    };

    // Apply the discovery filter (warn if it fails, but continue)
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    info!("Using Bluetooth adapter {}", adapter.name());
    Ok(adapter)
}

/// Endless stream of broadcasts seen by `adapter`.
///
/// Each manufacturer data entry of a device becomes its own event. The stream
/// ends when BlueZ stops the discovery session.
pub async fn advertisement_stream(
    adapter: &Adapter,
) -> Result<impl Stream<Item = Result<BroadcastEvent, BridgeError>> + Send, bluer::Error> {
    let discovery = match adapter.discover_devices_with_changes().await {
        Ok(discovery) => discovery,
        Err(e) => {
            error!("Failed to start device discovery: {}", e);
            return Err(e);
        }
    };

    let adapter = adapter.clone();
    let events = discovery
        .filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                match event {
                    AdapterEvent::DeviceAdded(address) => {
                        Some(read_broadcasts(&adapter, address).await)
                    }
                    other => {
                        debug!("Discovery event: {:?}", other);
                        None
                    }
                }
            }
        })
        .flat_map(stream::iter)
        .map(Ok);

    Ok(events)
}

async fn read_broadcasts(adapter: &Adapter, address: Address) -> Vec<BroadcastEvent> {
    let device = match adapter.device(address) {
        Ok(device) => device,
        Err(e) => {
            debug!("Failed to open device {}: {}", address, e);
            return Vec::new();
        }
    };

    let received_at = OffsetDateTime::now_utc();
    let address = address.to_string().to_uppercase();
    let local_name = device.name().await.ok().flatten();

    match device.manufacturer_data().await {
        Ok(Some(manufacturer_data)) if !manufacturer_data.is_empty() => manufacturer_data
            .into_iter()
            .map(|(company_id, data)| BroadcastEvent {
                address: address.clone(),
                local_name: local_name.clone(),
                manufacturer_data: Some(ManufacturerData::new(company_id, data)),
                received_at,
            })
            .collect(),
        Ok(_) => vec![BroadcastEvent {
            address,
            local_name,
            manufacturer_data: None,
            received_at,
        }],
        Err(e) => {
            debug!("Failed to get manufacturer data for {}: {}", address, e);
            Vec::new()
        }
    }
}
