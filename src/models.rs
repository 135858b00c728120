use std::fmt;
use time::OffsetDateTime;

/// Battery level (percent) below which a sensor is reported as low on battery.
pub const LOW_BATTERY_THRESHOLD: f32 = 25.0;

/// Manufacturer specific data block of an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturerData {
    pub company_id: u16,
    pub data: Vec<u8>,
}

impl ManufacturerData {
    pub fn new(company_id: u16, data: impl Into<Vec<u8>>) -> Self {
        Self {
            company_id,
            data: data.into(),
        }
    }
}

/// A single advertisement received from the radio layer.
#[derive(Debug, Clone)]
pub struct BroadcastEvent {
    pub address: String,
    pub local_name: Option<String>,
    pub manufacturer_data: Option<ManufacturerData>,
    pub received_at: OffsetDateTime,
}

impl BroadcastEvent {
    pub fn new(address: impl Into<String>, manufacturer_data: Option<ManufacturerData>) -> Self {
        Self {
            address: address.into(),
            local_name: None,
            manufacturer_data,
            received_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    pub fn received_at(mut self, at: OffsetDateTime) -> Self {
        self.received_at = at;
        self
    }

    /// Identifiers a configuration entry may match: the address first, then the name.
    pub fn id_candidates(&self) -> Vec<&str> {
        let mut candidates = vec![self.address.as_str()];
        if let Some(name) = self.local_name.as_deref() {
            candidates.push(name);
        }
        candidates
    }
}

/// Vendor family a physical address is bound to while it is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VendorKind {
    Ge,
    Govee,
    Tpms,
}

impl VendorKind {
    /// Stable sensor type tag exposed to the protocol layer.
    pub fn sensor_type(self) -> &'static str {
        match self {
            Self::Ge => "com.ge.sensor",
            Self::Govee => "com.Govee.Thermometer",
            Self::Tpms => "com.TPMS.Sensor",
        }
    }
}

impl fmt::Display for VendorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sensor_type())
    }
}

/// Display values of a sensor, normalized to °C, percent and PSI.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorValues {
    pub temperature: f32,
    pub humidity: Option<f32>,
    pub battery_level: f32,
    pub battery_voltage: Option<f32>,
    pub pressure_psi: Option<f32>,
    pub low_battery: bool,
}

impl SensorValues {
    /// Returns a copy with calibration deltas added to the raw values.
    pub fn calibrated(&self, temperature_delta: f32, humidity_delta: f32) -> Self {
        Self {
            temperature: self.temperature + temperature_delta,
            humidity: self.humidity.map(|h| h + humidity_delta),
            ..self.clone()
        }
    }
}

impl fmt::Display for SensorValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "temp={:.2}°C", self.temperature)?;
        if let Some(humidity) = self.humidity {
            write!(f, ", humidity={:.2}%", humidity)?;
        }
        if let Some(pressure) = self.pressure_psi {
            write!(f, ", pressure={:.2} PSI", pressure)?;
        }
        write!(f, ", battery={:.0}%", self.battery_level)
    }
}
