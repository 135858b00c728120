//! Error types for configuration loading and the bridge pipeline
use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or writing the sensor configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write configuration {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid staleness timeout '{0}', expected a positive number of seconds")]
    InvalidTimeout(String),
}

/// Errors that stop the bridge controller.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),

    #[error("advertisement stream ended")]
    ScanEnded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_mention_the_path() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/sensor-bridge/configuration.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let message = err.to_string();
        assert!(message.contains("/etc/sensor-bridge/configuration.json"));
        assert!(message.contains("missing"));
    }

    #[test]
    fn invalid_timeout_echoes_the_value() {
        let err = ConfigError::InvalidTimeout("abc".into());
        assert!(err.to_string().contains("'abc'"));
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfigError>();
        assert_send_sync::<BridgeError>();
    }
}
