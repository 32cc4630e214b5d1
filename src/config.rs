//! Runtime configuration for the bridge.

use std::path::PathBuf;
use std::time::Duration;

/// Default reporting interval handed to the controller, in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 30_000;

/// Number of spectral channels in one sensor reading.
pub const SENSOR_CHANNELS: usize = 16;

// ---------------------------------------------------------------------------
// Serial channels
// ---------------------------------------------------------------------------

/// One serial link (sensor or controller).
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Upper bound for every blocking read on this channel.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Sensor link defaults: 115200 baud, 5 s timeout.
    pub fn sensor(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 115_200,
            timeout: Duration::from_secs(5),
        }
    }

    /// Controller link defaults: 9600 baud, 5 s timeout.
    pub fn controller(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: 9_600,
            timeout: Duration::from_secs(5),
        }
    }
}

/// How the sensor is asked for a capture.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Byte that triggers one physical capture.
    pub capture_command: u8,
    /// Maximum response size read back per capture.
    pub response_bytes: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            capture_command: b'S',
            response_bytes: 320,
        }
    }
}

// ---------------------------------------------------------------------------
// Message bus
// ---------------------------------------------------------------------------

/// Topic names used on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub telemetry: String,
    pub log: String,
    pub status: String,
    pub interval: String,
}

impl Topics {
    /// Derive all topics from a common prefix.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            telemetry: prefix.to_string(),
            log: format!("{prefix}/log"),
            status: format!("{prefix}/status"),
            interval: format!("{prefix}/interval"),
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::with_prefix("mantispectra")
    }
}

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// Capacity of the outgoing request queue.
    pub request_capacity: usize,
    pub topics: Topics,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "test.mosquitto.org".to_string(),
            port: 1883,
            client_id: "spectra-bridge".to_string(),
            keep_alive: Duration::from_secs(30),
            request_capacity: 64,
            topics: Topics::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Keywords the controller uses to talk to the bridge.
#[derive(Debug, Clone)]
pub struct CommandSet {
    /// Exact line requesting a sensor capture.
    pub capture: String,
    /// Exact line requesting the current interval.
    pub interval: String,
    /// Substring introducing a comma-separated feature list.
    pub inference_marker: String,
    /// Substring the controller puts in its JSON telemetry.
    pub telemetry_marker: String,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            capture: "C".to_string(),
            interval: "I".to_string(),
            inference_marker: "Machine_Learning".to_string(),
            telemetry_marker: "Arduino Uno".to_string(),
        }
    }
}

/// Fixed delays that keep the loop in step with the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Wait after forwarding a capture.
    pub settle: Duration,
    /// Wait after every handled, non-empty line.
    pub loop_delay: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            loop_delay: Duration::from_secs(3),
        }
    }
}

impl Pacing {
    /// No delays at all (tests, replay).
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            loop_delay: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub artifact_path: PathBuf,
    pub dataset_path: PathBuf,
    pub components: usize,
    pub holdout_fraction: f64,
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("pls_model.json"),
            dataset_path: PathBuf::from("mantispectra_dataset.csv"),
            components: 2,
            holdout_fraction: 0.2,
            seed: 42,
        }
    }
}

impl ModelConfig {
    pub fn with_paths(artifact_path: impl Into<PathBuf>, dataset_path: impl Into<PathBuf>) -> Self {
        Self {
            artifact_path: artifact_path.into(),
            dataset_path: dataset_path.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Whole bridge
// ---------------------------------------------------------------------------

/// Everything the bridge needs to start a session.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub sensor_serial: SerialConfig,
    pub controller_serial: SerialConfig,
    pub sensor: SensorConfig,
    pub bus: BusConfig,
    pub commands: CommandSet,
    pub pacing: Pacing,
    pub model: ModelConfig,
    pub default_interval_ms: u64,
}

impl BridgeConfig {
    /// Defaults for everything except the two port paths.
    pub fn new(sensor_port: impl Into<String>, controller_port: impl Into<String>) -> Self {
        Self {
            sensor_serial: SerialConfig::sensor(sensor_port),
            controller_serial: SerialConfig::controller(controller_port),
            sensor: SensorConfig::default(),
            bus: BusConfig::default(),
            commands: CommandSet::default(),
            pacing: Pacing::default(),
            model: ModelConfig::default(),
            default_interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_follow_prefix() {
        let topics = Topics::with_prefix("lab7");
        assert_eq!(topics.telemetry, "lab7");
        assert_eq!(topics.log, "lab7/log");
        assert_eq!(topics.status, "lab7/status");
        assert_eq!(topics.interval, "lab7/interval");
    }

    #[test]
    fn defaults_match_the_devices() {
        let config = BridgeConfig::new("/dev/ttyUSB0", "/dev/ttyACM0");
        assert_eq!(config.sensor_serial.baud_rate, 115_200);
        assert_eq!(config.controller_serial.baud_rate, 9_600);
        assert_eq!(config.sensor.capture_command, b'S');
        assert_eq!(config.default_interval_ms, 30_000);
        assert_eq!(config.pacing.settle, Duration::from_secs(2));
        assert_eq!(config.pacing.loop_delay, Duration::from_secs(3));
        assert_eq!(config.bus.topics, Topics::default());
    }
}
