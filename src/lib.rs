//! Serial/MQTT bridge for a spectral sensor and its controlling microcontroller.
//!
//! The controller drives everything over its serial line: it asks for sensor
//! captures, for the current reporting interval and for model predictions,
//! and it streams telemetry and log lines that are relayed to the bus. The
//! interval itself is set remotely through a bus topic.

pub mod ansi;
pub mod app;
pub mod bus;
pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod regression;
pub mod sensor;
pub mod state;

pub use app::Bridge;
pub use bus::{BusClient, Publisher};
pub use config::BridgeConfig;
pub use data::model::SensorReading;
pub use dispatch::{Dispatcher, Outcome};
pub use error::{BridgeError, Result};
pub use regression::ModelArtifact;
pub use sensor::SensorLink;
pub use state::IntervalState;
