//! Vendor specific manufacturer data decoding
use std::fmt;

use crate::models::{ManufacturerData, SensorValues, VendorKind, LOW_BATTERY_THRESHOLD};

// Vendor protocol constants
pub const GE_COMPANY_ID: u16 = 473; // GE Lighting
pub const GOVEE_COMPANY_ID: u16 = 0xEC88; // Govee H5075 family
pub const TPMS_COMPANY_ID: u16 = 0x0100; // Generic BLE tire pressure sensors

const GE_PAYLOAD_LEN: usize = 18;
const GOVEE_PAYLOAD_LEN: usize = 6;
const TPMS_PAYLOAD_LEN: usize = 16;

const MAX_BATTERY_VOLTAGE: f32 = 3.3;
const PASCAL_PER_PSI: f32 = 6894.757;

/// GE temperature and humidity sensor advertisement.
///
/// Payload layout (18 bytes after the company identifier):
/// - Byte 0: Model identifier
/// - Byte 1: Protocol version
/// - Byte 2: Battery (voltage = 1.0 + raw / 100)
/// - Bytes 3-4: Temperature (unsigned 16-bit BE, 0.1°C resolution)
/// - Bytes 5-6: Humidity (unsigned 16-bit BE, 0.1% resolution)
/// - Bytes 7-13: Reserved
/// - Bytes 14-17: Checksum (unsigned 32-bit BE, not verified)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeSensor {
    pub model: u8,
    pub version: u8,
    pub battery: u8,
    pub temperature: u16,
    pub humidity: u16,
    pub checksum: u32,
}

impl GeSensor {
    pub fn decode(manufacturer_data: &ManufacturerData) -> Option<Self> {
        let data = &manufacturer_data.data;
        if manufacturer_data.company_id != GE_COMPANY_ID || data.len() != GE_PAYLOAD_LEN {
            return None;
        }

        Some(Self {
            model: data[0],
            version: data[1],
            battery: data[2],
            temperature: u16::from_be_bytes([data[3], data[4]]),
            humidity: u16::from_be_bytes([data[5], data[6]]),
            checksum: u32::from_be_bytes([data[14], data[15], data[16], data[17]]),
        })
    }

    pub fn battery_voltage(&self) -> f32 {
        1.0 + (self.battery as f32 / 100.0)
    }

    pub fn battery_level(&self) -> f32 {
        (self.battery_voltage().min(MAX_BATTERY_VOLTAGE) / MAX_BATTERY_VOLTAGE) * 100.0
    }

    pub fn temperature_celsius(&self) -> f32 {
        (self.temperature as f32 / 10.0).min(100.0)
    }

    pub fn humidity_percentage(&self) -> f32 {
        (self.humidity as f32 / 10.0).clamp(0.0, 100.0)
    }
}

/// Govee thermometer/hygrometer advertisement (H5075 style).
///
/// Payload layout (6 bytes after the company identifier):
/// - Byte 0: Reserved
/// - Bytes 1-3: Packed reading (24-bit BE, bit 23 is the temperature sign,
///   temperature = (value % 1_000_000) / 1000 in 0.1°C,
///   humidity = value % 1000 in 0.1%)
/// - Byte 4: Battery percent
/// - Byte 5: Reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GoveeThermometer {
    pub packed: u32,
    pub battery: u8,
}

impl GoveeThermometer {
    const SIGN_BIT: u32 = 0x80_0000;

    pub fn decode(manufacturer_data: &ManufacturerData) -> Option<Self> {
        let data = &manufacturer_data.data;
        if manufacturer_data.company_id != GOVEE_COMPANY_ID || data.len() != GOVEE_PAYLOAD_LEN {
            return None;
        }

        Some(Self {
            packed: u32::from_be_bytes([0, data[1], data[2], data[3]]),
            battery: data[4],
        })
    }

    fn magnitude(&self) -> u32 {
        self.packed & !Self::SIGN_BIT
    }

    pub fn temperature_celsius(&self) -> f32 {
        let celsius = (self.magnitude() % 1_000_000 / 1000) as f32 / 10.0;
        if self.packed & Self::SIGN_BIT != 0 {
            -celsius
        } else {
            celsius
        }
    }

    pub fn humidity_percentage(&self) -> f32 {
        ((self.magnitude() % 1000) as f32 / 10.0).clamp(0.0, 100.0)
    }

    pub fn battery_level(&self) -> f32 {
        (self.battery as f32).min(100.0)
    }
}

/// Tire pressure monitoring sensor advertisement.
///
/// Payload layout (16 bytes after the company identifier):
/// - Bytes 0-5: Sensor address
/// - Bytes 6-9: Pressure (unsigned 32-bit LE, Pa)
/// - Bytes 10-13: Temperature (signed 32-bit LE, 0.01°C resolution)
/// - Byte 14: Battery percent
/// - Byte 15: Alarm flag (non-zero when the sensor reports a leak)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TirePressureSensor {
    pub sensor_address: [u8; 6],
    pub pressure: u32,
    pub temperature: i32,
    pub battery: u8,
    pub alarm: bool,
}

impl TirePressureSensor {
    pub fn decode(manufacturer_data: &ManufacturerData) -> Option<Self> {
        let data = &manufacturer_data.data;
        if manufacturer_data.company_id != TPMS_COMPANY_ID || data.len() != TPMS_PAYLOAD_LEN {
            return None;
        }

        let mut sensor_address = [0u8; 6];
        sensor_address.copy_from_slice(&data[0..6]);

        Some(Self {
            sensor_address,
            pressure: u32::from_le_bytes([data[6], data[7], data[8], data[9]]),
            temperature: i32::from_le_bytes([data[10], data[11], data[12], data[13]]),
            battery: data[14],
            alarm: data[15] != 0,
        })
    }

    pub fn pressure_psi(&self) -> f32 {
        self.pressure as f32 / PASCAL_PER_PSI
    }

    pub fn temperature_celsius(&self) -> f32 {
        self.temperature as f32 / 100.0
    }

    pub fn battery_level(&self) -> f32 {
        (self.battery as f32).min(100.0)
    }

    /// Address embedded in the payload, formatted like a Bluetooth address.
    pub fn address_string(&self) -> String {
        self.sensor_address
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// A successfully decoded advertisement from one of the supported vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodedReading {
    Ge(GeSensor),
    Govee(GoveeThermometer),
    Tpms(TirePressureSensor),
}

impl DecodedReading {
    pub fn kind(&self) -> VendorKind {
        match self {
            Self::Ge(_) => VendorKind::Ge,
            Self::Govee(_) => VendorKind::Govee,
            Self::Tpms(_) => VendorKind::Tpms,
        }
    }

    /// Normalized display values before any calibration.
    pub fn values(&self) -> SensorValues {
        let (temperature, humidity, battery_level, battery_voltage, pressure_psi) = match self {
            Self::Ge(sensor) => (
                sensor.temperature_celsius(),
                Some(sensor.humidity_percentage()),
                sensor.battery_level(),
                Some(sensor.battery_voltage()),
                None,
            ),
            Self::Govee(sensor) => (
                sensor.temperature_celsius(),
                Some(sensor.humidity_percentage()),
                sensor.battery_level(),
                None,
                None,
            ),
            Self::Tpms(sensor) => (
                sensor.temperature_celsius(),
                None,
                sensor.battery_level(),
                None,
                Some(sensor.pressure_psi()),
            ),
        };

        SensorValues {
            temperature,
            humidity,
            battery_level,
            battery_voltage,
            pressure_psi,
            low_battery: battery_level < LOW_BATTERY_THRESHOLD,
        }
    }
}

impl fmt::Display for DecodedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind(), self.values())
    }
}

pub type Decoder = fn(&ManufacturerData) -> Option<DecodedReading>;

fn decode_ge(manufacturer_data: &ManufacturerData) -> Option<DecodedReading> {
    GeSensor::decode(manufacturer_data).map(DecodedReading::Ge)
}

fn decode_govee(manufacturer_data: &ManufacturerData) -> Option<DecodedReading> {
    GoveeThermometer::decode(manufacturer_data).map(DecodedReading::Govee)
}

fn decode_tpms(manufacturer_data: &ManufacturerData) -> Option<DecodedReading> {
    TirePressureSensor::decode(manufacturer_data).map(DecodedReading::Tpms)
}

/// Registered decoders in priority order, the first match wins.
pub const DECODERS: [(VendorKind, Decoder); 3] = [
    (VendorKind::Ge, decode_ge),
    (VendorKind::Govee, decode_govee),
    (VendorKind::Tpms, decode_tpms),
];

/// Decode manufacturer data with the first registered decoder that accepts it.
///
/// Returns None for foreign or malformed payloads, which is the common case
/// for advertisements sharing the air.
pub fn decode(manufacturer_data: &ManufacturerData) -> Option<DecodedReading> {
    DECODERS
        .iter()
        .find_map(|(_, decoder)| decoder(manufacturer_data))
}
