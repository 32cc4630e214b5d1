//! Sensor link: trigger one capture and read the reading back.

use std::io::{ErrorKind, Read, Write};

use log::{debug, trace};

use crate::ansi::strip_ansi;
use crate::config::{SensorConfig, SENSOR_CHANNELS};
use crate::data::model::SensorReading;
use crate::error::{BridgeError, Result};

const CHANNEL: &str = "sensor";

/// Result of one capture: the cleaned-up text the sensor sent and the
/// reading parsed from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub text: String,
    pub reading: SensorReading,
}

/// Owns the sensor's serial channel.
pub struct SensorLink<P> {
    port: P,
    config: SensorConfig,
}

impl<P: Read + Write> SensorLink<P> {
    pub fn new(port: P, config: SensorConfig) -> Self {
        Self { port, config }
    }

    /// Trigger a capture and parse the response.
    ///
    /// Every call makes the sensor take a new measurement.
    pub fn capture(&mut self) -> Result<Capture> {
        let text = self.capture_text()?;
        let reading = parse_reading(&text)?;
        debug!("Sensor reading: {reading}");
        Ok(Capture { text, reading })
    }

    /// Trigger a capture and return the sanitized response text unparsed.
    pub fn capture_text(&mut self) -> Result<String> {
        self.port
            .write_all(&[self.config.capture_command])
            .and_then(|_| self.port.flush())
            .map_err(|e| BridgeError::device(CHANNEL, e))?;

        let raw = self.read_response()?;
        let text = strip_ansi(&String::from_utf8_lossy(&raw));
        trace!("Sensor response ({} bytes): {text:?}", raw.len());
        Ok(text)
    }

    /// Read until the buffer is full, the port goes quiet or reports EOF.
    fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.config.response_bytes];
        let mut filled = 0;

        while filled < buf.len() {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut && filled > 0 => break,
                Err(e) => return Err(BridgeError::device(CHANNEL, e)),
            }
        }

        if filled == 0 {
            return Err(BridgeError::device(
                CHANNEL,
                std::io::Error::new(ErrorKind::UnexpectedEof, "no response from sensor"),
            ));
        }
        buf.truncate(filled);
        Ok(buf)
    }

    /// Give the port back (used at shutdown).
    pub fn into_inner(self) -> P {
        self.port
    }
}

/// Extract the first 16 integer tokens from sanitized sensor text.
///
/// Tokens that are not integers (labels, units) are skipped; anything after
/// the 16th integer is ignored.
pub fn parse_reading(text: &str) -> Result<SensorReading> {
    let values: Vec<i64> = text
        .split_whitespace()
        .filter_map(|tok| tok.parse::<i64>().ok())
        .take(SENSOR_CHANNELS)
        .collect();

    if values.len() < SENSOR_CHANNELS {
        return Err(BridgeError::MalformedReading {
            expected: SENSOR_CHANNELS,
            found: values.len(),
        });
    }
    SensorReading::try_from(values)
}
