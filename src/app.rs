use std::sync::atomic::AtomicBool;

use log::{info, warn};
use serialport::SerialPort;

use crate::bus::{BusClient, Publisher};
use crate::config::{BridgeConfig, ModelConfig, SerialConfig};
use crate::dispatch::{Dispatcher, LineReader, SessionStats};
use crate::error::{BridgeError, Result};
use crate::regression::{self, ModelArtifact};
use crate::sensor::SensorLink;
use crate::state::IntervalState;

// ---------------------------------------------------------------------------
// Bridge session
// ---------------------------------------------------------------------------

/// One bridge instance: one sensor, one controller, one broker connection.
pub struct Bridge {
    pub config: BridgeConfig,
    pub interval: IntervalState,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        let interval = IntervalState::new(config.default_interval_ms);
        Self { config, interval }
    }

    /// Start up, serve the controller until `stop` is set or its channel
    /// closes, then release everything.
    ///
    /// Any error returned comes from startup; once the loop runs, problems
    /// are logged and served around. Resources are released in reverse
    /// order of acquisition on every path out of this function.
    pub fn run(&self, stop: &AtomicBool) -> Result<SessionStats> {
        let config = &self.config;
        let topics = &config.bus.topics;

        let bus = BusClient::connect(&config.bus)?;
        bus.subscribe(&topics.interval, self.interval.subscriber())
            .map_err(|e| BridgeError::BusConnection(e.to_string()))?;
        if let Err(e) = bus.publish(&topics.status, "bridge connected") {
            warn!("{e}");
        }

        let sensor_port = open_port(&config.sensor_serial)?;
        let controller_port = open_port(&config.controller_serial)?;
        let controller_writer = controller_port.try_clone().map_err(|source| BridgeError::SerialOpen {
            port: config.controller_serial.port.clone(),
            source,
        })?;

        let model = regression::load_or_train(&config.model)?;

        let mut lines = LineReader::new(controller_port);
        let mut dispatcher = Dispatcher::new(
            SensorLink::new(sensor_port, config.sensor.clone()),
            controller_writer,
            &bus,
            &model,
            self.interval.clone(),
            &config.commands,
            topics.clone(),
            config.pacing,
        );
        let stats = dispatcher.run(&mut lines, stop);
        drop(dispatcher);
        drop(lines);

        if let Err(e) = bus.publish(&topics.status, "bridge disconnected") {
            warn!("{e}");
        }
        bus.disconnect();
        info!("Bridge stopped after {} lines", stats.handled());
        Ok(stats)
    }
}

/// Retrain from the dataset and overwrite the artifact, ignoring any
/// existing one.
pub fn retrain(config: &ModelConfig) -> Result<ModelArtifact> {
    let artifact = regression::train(&config.dataset_path, config)?;
    artifact.save(&config.artifact_path)?;
    Ok(artifact)
}

fn open_port(serial: &SerialConfig) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(serial.port.as_str(), serial.baud_rate)
        .timeout(serial.timeout)
        .open()
        .map_err(|source| BridgeError::SerialOpen {
            port: serial.port.clone(),
            source,
        })?;
    info!("Opened {} at {} baud", serial.port, serial.baud_rate);
    Ok(port)
}
