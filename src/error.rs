//! Error types for the bridge.

use std::io;

use thiserror::Error;

/// Everything that can go wrong between the controller, the sensor, the
/// model and the bus.
///
/// Errors raised inside a single dispatch iteration are logged and dropped
/// by the dispatcher; only the startup phase lets them escape.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Serial read/write failure or timeout
    #[error("device I/O error on {channel}: {source}")]
    DeviceIo {
        channel: &'static str,
        #[source]
        source: io::Error,
    },

    /// A serial port could not be opened
    #[error("cannot open serial port {port}: {source}")]
    SerialOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Sensor response did not contain enough integer tokens
    #[error("malformed sensor reading: expected {expected} integers, found {found}")]
    MalformedReading { expected: usize, found: usize },

    /// Unexpected text shape from the controller or the bus
    #[error("parse error: {0}")]
    Parse(String),

    /// Inference input has the wrong number of features
    #[error("dimension mismatch: model expects {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Broker unreachable or refused the connection
    #[error("bus connection error: {0}")]
    BusConnection(String),

    /// Publish/subscribe request failed after startup
    #[error("bus error: {0}")]
    Bus(String),

    /// Dataset file missing, empty or malformed
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Numerical failure while fitting the model
    #[error("training error: {0}")]
    Training(String),

    /// Model artifact could not be read, written or decoded
    #[error("model artifact error: {0}")]
    Artifact(String),
}

impl BridgeError {
    pub(crate) fn device(channel: &'static str, source: io::Error) -> Self {
        BridgeError::DeviceIo { channel, source }
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
