//! Bridges BLE thermometer, hygrometer and tire pressure advertisements into
//! bridged accessories of a smart-home protocol.
//!
//! Broadcasts are decoded by [`bluetooth::decoder`], filtered against the
//! [`config::SensorConfiguration`], tracked in the [`registry::AccessoryRegistry`]
//! and pushed to a [`bridge::ProtocolBridge`]. The [`watchdog`] removes sensors
//! that stop advertising.

pub mod bluetooth;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod registry;
pub mod utils;
pub mod watchdog;

pub use bridge::{AccessoryInfo, BridgeInfo, LogBridge, ProtocolBridge};
pub use config::{Calibration, SensorConfiguration, SensorEntry};
pub use controller::{BridgeController, EventOutcome};
pub use error::{BridgeError, ConfigError};
pub use models::{BroadcastEvent, ManufacturerData, SensorValues, VendorKind};
pub use registry::{AccessoryRecord, AccessoryRegistry, OfferOutcome, RejectReason};
