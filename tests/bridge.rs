use std::sync::{Arc, Mutex};

use futures_util::stream;
use sensor_bridge::bluetooth::decoder::{GE_COMPANY_ID, GOVEE_COMPANY_ID};
use sensor_bridge::{
    AccessoryInfo, BridgeController, BridgeError, BroadcastEvent, ManufacturerData,
    ProtocolBridge, SensorConfiguration, SensorValues, VendorKind,
};
use time::{Duration, OffsetDateTime};

#[derive(Default)]
struct Topology {
    endpoints: Mutex<Vec<(String, String, f32)>>,
}

impl ProtocolBridge for Topology {
    fn add_device(&self, address: &str, _kind: VendorKind, info: &AccessoryInfo, values: &SensorValues) {
        self.endpoints
            .lock()
            .unwrap()
            .push((address.to_string(), info.name.clone(), values.temperature));
    }

    fn update_device(&self, address: &str, values: &SensorValues) {
        for endpoint in self.endpoints.lock().unwrap().iter_mut() {
            if endpoint.0 == address {
                endpoint.2 = values.temperature;
            }
        }
    }

    fn remove_device(&self, address: &str) {
        self.endpoints.lock().unwrap().retain(|e| e.0 != address);
    }
}

fn ge(address: &str, temperature: u16, at: OffsetDateTime) -> BroadcastEvent {
    let mut data = vec![0x01, 0x01, 0xBE, 0, 0, 0x01, 0xF4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    data[3..5].copy_from_slice(&temperature.to_be_bytes());
    BroadcastEvent::new(address, Some(ManufacturerData::new(GE_COMPANY_ID, data))).received_at(at)
}

fn govee(address: &str, name: &str, at: OffsetDateTime) -> BroadcastEvent {
    let data = vec![0x00, 0x03, 0x6B, 0x9A, 0x50, 0x00];
    BroadcastEvent::new(address, Some(ManufacturerData::new(GOVEE_COMPANY_ID, data)))
        .with_local_name(name)
        .received_at(at)
}

#[tokio::test]
async fn bridges_configured_sensors_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configuration.json");
    std::fs::write(
        &path,
        r#"{
            "timeout": 60,
            "sensors": [
                { "id": "AA:BB:CC:DD:EE:01", "name": "Garage", "calibration": { "temperature": -0.5 } },
                { "id": "GVH5075_9A2F", "name": "Bedroom" }
            ]
        }"#,
    )
    .unwrap();

    let config = SensorConfiguration::load_or_default(&path);
    assert_eq!(config.timeout, 60);

    let topology = Arc::new(Topology::default());
    let controller = BridgeController::new(config, topology.clone());
    let now = OffsetDateTime::now_utc();

    let events = stream::iter(vec![
        Ok(ge("AA:BB:CC:DD:EE:01", 200, now - Duration::seconds(90))),
        Ok(govee("A4:C1:38:00:00:07", "GVH5075_9A2F", now)),
        Ok(ge("AA:BB:CC:DD:EE:02", 250, now)),
        Ok(ge("AA:BB:CC:DD:EE:01", 210, now - Duration::seconds(80))),
    ]);
    let result = controller.run(events).await;
    assert!(matches!(result, Err(BridgeError::ScanEnded)));

    {
        let endpoints = topology.endpoints.lock().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0], ("AA:BB:CC:DD:EE:01".to_string(), "Garage".to_string(), 20.5));
        assert_eq!(endpoints[1].1, "Bedroom");
    }

    // the garage sensor went quiet more than a minute ago
    let evicted = controller.sweep(now).await;
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].address, "AA:BB:CC:DD:EE:01");
    let endpoints = topology.endpoints.lock().unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].0, "A4:C1:38:00:00:07");
}

#[tokio::test]
async fn missing_configuration_bridges_everything() {
    let dir = tempfile::tempdir().unwrap();
    let config = SensorConfiguration::load_or_default(dir.path().join("absent.json"));
    assert!(!config.is_allow_list_active());

    let topology = Arc::new(Topology::default());
    let controller = BridgeController::new(config, topology.clone());
    let now = OffsetDateTime::now_utc();
    for address in ["11:11:11:11:11:11", "22:22:22:22:22:22"] {
        controller.handle_event(&ge(address, 187, now)).await;
    }

    let records = controller.snapshot().await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| (r.values.temperature - 18.7).abs() < 0.01));
    assert_eq!(topology.endpoints.lock().unwrap().len(), 2);
}
