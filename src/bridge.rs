//! Interface to the smart-home protocol layer and the information projected to it
use log::{debug, info};

use crate::bluetooth::decoder::DecodedReading;
use crate::config::{SensorConfiguration, SensorEntry};
use crate::models::{SensorValues, VendorKind};

const DEFAULT_FIRMWARE_REVISION: &str = "1.0.0";

/// Accessory information shown by the home app for the bridge itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeInfo {
    pub name: String,
    pub serial_number: String,
    pub model: String,
    pub manufacturer: String,
    pub firmware_revision: String,
}

impl From<&SensorConfiguration> for BridgeInfo {
    fn from(config: &SensorConfiguration) -> Self {
        Self {
            name: config.name.clone(),
            serial_number: config.serial_number.clone(),
            model: config.model.clone(),
            manufacturer: config.manufacturer.clone(),
            firmware_revision: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Accessory information of a bridged sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub name: String,
    pub serial_number: String,
    pub manufacturer: String,
    pub model: String,
    pub firmware_revision: String,
}

impl AccessoryInfo {
    /// Vendor defaults, overridden by the configured name and model.
    pub fn new(
        address: &str,
        local_name: Option<&str>,
        reading: &DecodedReading,
        entry: Option<&SensorEntry>,
    ) -> Self {
        let (name, serial_number, manufacturer, model, firmware_revision) = match reading {
            DecodedReading::Ge(sensor) => (
                "GE Thermometer Sensor",
                address.to_string(),
                "GE",
                sensor.model.to_string(),
                sensor.version.to_string(),
            ),
            DecodedReading::Govee(_) => (
                "Govee Thermometer Sensor",
                address.to_string(),
                "Govee (Shenzhen Intellirocks Tech. Co., Ltd.)",
                local_name.unwrap_or("Govee Thermometer").to_string(),
                DEFAULT_FIRMWARE_REVISION.to_string(),
            ),
            DecodedReading::Tpms(sensor) => (
                "Tire Pressure Monitoring System Sensor",
                sensor.address_string(),
                "TPMS",
                "TPMS".to_string(),
                DEFAULT_FIRMWARE_REVISION.to_string(),
            ),
        };

        Self {
            name: entry
                .and_then(|e| e.name.clone())
                .unwrap_or_else(|| name.to_string()),
            serial_number,
            manufacturer: manufacturer.to_string(),
            model: entry.and_then(|e| e.model.clone()).unwrap_or(model),
            firmware_revision,
        }
    }
}

/// Side effects the controller drives on the protocol layer. The controller
/// never reads state back.
pub trait ProtocolBridge: Send + Sync {
    /// Register a new bridged endpoint for a discovered sensor.
    fn add_device(&self, address: &str, kind: VendorKind, info: &AccessoryInfo, values: &SensorValues);

    /// Push fresh values to an existing endpoint.
    fn update_device(&self, address: &str, values: &SensorValues);

    /// Remove the endpoint of a sensor that went quiet.
    fn remove_device(&self, address: &str);
}

/// Protocol bridge that only logs the topology changes.
#[derive(Debug)]
pub struct LogBridge {
    info: BridgeInfo,
}

impl LogBridge {
    pub fn new(info: BridgeInfo) -> Self {
        info!(
            "Bridge '{}' ({} {}, serial {}, firmware {})",
            info.name, info.manufacturer, info.model, info.serial_number, info.firmware_revision
        );
        Self { info }
    }
}

impl ProtocolBridge for LogBridge {
    fn add_device(&self, address: &str, kind: VendorKind, info: &AccessoryInfo, values: &SensorValues) {
        info!(
            "[{}] Added {} '{}' ({} {}): {}",
            self.info.name, kind, info.name, info.manufacturer, info.model, values
        );
        debug!("Accessory {} serial {}", address, info.serial_number);
    }

    fn update_device(&self, address: &str, values: &SensorValues) {
        debug!("[{}] Updated {}: {}", self.info.name, address, values);
    }

    fn remove_device(&self, address: &str) {
        info!("[{}] Removed {}", self.info.name, address);
    }
}
