//! The bridge loop: read controller lines, classify, act, answer.
//!
//! ```text
//!   controller ──line──▶ Classifier ──▶ Capture ───────▶ SensorLink ──▶ controller
//!                                   ├─▶ IntervalQuery ─▶ IntervalState ─▶ controller
//!                                   ├─▶ Inference ─────▶ ModelArtifact ─▶ controller
//!                                   ├─▶ Telemetry ─────▶ bus (telemetry)
//!                                   └─▶ Log ───────────▶ bus (log)
//! ```
//!
//! Nothing that happens while handling one line can end the loop; only an
//! interrupt or the controller channel going away does.

pub mod command;
pub mod line;

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::ansi::strip_ansi;
use crate::bus::Publisher;
use crate::config::{CommandSet, Pacing, Topics};
use crate::data::model::SensorReading;
use crate::error::{BridgeError, Result};
use crate::regression::ModelArtifact;
use crate::sensor::SensorLink;
use crate::state::IntervalState;

pub use command::{parse_feature_list, Classifier, Command};
pub use line::{LineEvent, LineReader};

const CONTROLLER: &str = "controller";

/// What handling one line amounted to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// Telemetry forwarded to the bus.
    Relayed,
    /// Sensor text written back to the controller.
    Captured,
    IntervalReported(u64),
    Inferred(f64, f64),
    /// A request that could not be served; nothing was written back.
    Rejected,
    /// Blank line.
    Ignored,
    /// Forwarded to the log topic.
    Logged,
    /// Bytes that are not UTF-8.
    Undecodable,
}

/// Per-session counters, logged at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub relayed: usize,
    pub captured: usize,
    pub interval_reports: usize,
    pub inferences: usize,
    pub rejected: usize,
    pub ignored: usize,
    pub logged: usize,
    pub undecodable: usize,
}

impl SessionStats {
    fn record(&mut self, outcome: Outcome) {
        let slot = match outcome {
            Outcome::Relayed => &mut self.relayed,
            Outcome::Captured => &mut self.captured,
            Outcome::IntervalReported(_) => &mut self.interval_reports,
            Outcome::Inferred(..) => &mut self.inferences,
            Outcome::Rejected => &mut self.rejected,
            Outcome::Ignored => &mut self.ignored,
            Outcome::Logged => &mut self.logged,
            Outcome::Undecodable => &mut self.undecodable,
        };
        *slot += 1;
    }

    /// Lines that got past decoding.
    pub fn handled(&self) -> usize {
        self.relayed
            + self.captured
            + self.interval_reports
            + self.inferences
            + self.rejected
            + self.ignored
            + self.logged
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Everything one bridge session needs, minus the controller's read side.
pub struct Dispatcher<'m, S, W, P> {
    sensor: SensorLink<S>,
    controller: W,
    bus: P,
    model: &'m ModelArtifact,
    interval: IntervalState,
    classifier: Classifier,
    topics: Topics,
    pacing: Pacing,
    stats: SessionStats,
}

impl<'m, S, W, P> Dispatcher<'m, S, W, P>
where
    S: Read + Write,
    W: Write,
    P: Publisher,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sensor: SensorLink<S>,
        controller: W,
        bus: P,
        model: &'m ModelArtifact,
        interval: IntervalState,
        commands: &CommandSet,
        topics: Topics,
        pacing: Pacing,
    ) -> Self {
        Self {
            sensor,
            controller,
            bus,
            model,
            interval,
            classifier: Classifier::new(commands),
            topics,
            pacing,
            stats: SessionStats::default(),
        }
    }

    /// Serve controller lines until `stop` is set or the channel closes.
    pub fn run<R: Read>(&mut self, lines: &mut LineReader<R>, stop: &AtomicBool) -> SessionStats {
        info!("Bridge loop started");
        while !stop.load(Ordering::SeqCst) {
            match lines.next_line() {
                Ok(LineEvent::Line(bytes)) => {
                    let outcome = self.handle_bytes(&bytes);
                    if !matches!(outcome, Outcome::Ignored | Outcome::Undecodable) {
                        pause(self.pacing.loop_delay);
                    }
                }
                Ok(LineEvent::Idle) => continue,
                Ok(LineEvent::Closed) => {
                    info!("Controller channel closed");
                    break;
                }
                Err(e) => {
                    warn!("{}; stopping", BridgeError::device(CONTROLLER, e));
                    break;
                }
            }
        }
        if stop.load(Ordering::SeqCst) {
            info!("Interrupted; leaving bridge loop");
        }
        info!("Session summary: {:?}", self.stats);
        self.stats.clone()
    }

    /// Decode and handle one raw line from the controller.
    pub fn handle_bytes(&mut self, bytes: &[u8]) -> Outcome {
        let outcome = match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_line(text),
            Err(_) => {
                warn!("Non-UTF-8 data received from controller ({} bytes)", bytes.len());
                Outcome::Undecodable
            }
        };
        self.stats.record(outcome);
        outcome
    }

    /// Handle one decoded line. Never fails; problems are logged.
    pub fn handle_line(&mut self, raw: &str) -> Outcome {
        let clean = strip_ansi(raw);
        let line = clean.trim();

        match self.classifier.classify(line) {
            Command::Telemetry(_) => {
                info!("Telemetry received from controller");
                // relayed as received, minus the line terminator
                let verbatim = raw.trim_end_matches(&['\r', '\n'][..]);
                self.publish_or_report(&self.topics.telemetry, verbatim);
                Outcome::Relayed
            }
            Command::Capture => self.capture(),
            Command::IntervalQuery => self.report_interval(),
            Command::Inference(payload) => self.infer(payload),
            Command::Empty => Outcome::Ignored,
            Command::Log(text) => {
                info!("Log/controller: {text}");
                self.publish_or_report(&self.topics.log, text);
                Outcome::Logged
            }
        }
    }

    fn capture(&mut self) -> Outcome {
        debug!("Capturing from sensor");
        let capture = match self.sensor.capture() {
            Ok(capture) => capture,
            Err(e) => {
                warn!("Capture failed: {e}");
                return Outcome::Rejected;
            }
        };

        if let Err(e) = self.reply(capture.text.as_bytes()) {
            warn!("{e}");
            return Outcome::Rejected;
        }
        info!("Sensor data written to controller");
        pause(self.pacing.settle);
        Outcome::Captured
    }

    fn report_interval(&mut self) -> Outcome {
        let interval = self.interval.get();
        match self.reply(interval.to_string().as_bytes()) {
            Ok(()) => {
                info!("Sent interval {interval} ms to controller");
                Outcome::IntervalReported(interval)
            }
            Err(e) => {
                warn!("{e}");
                Outcome::Rejected
            }
        }
    }

    fn infer(&mut self, payload: &str) -> Outcome {
        let reading = match parse_feature_list(payload)
            .map_err(BridgeError::Parse)
            .and_then(SensorReading::try_from)
        {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Inference request rejected: {e}");
                return Outcome::Rejected;
            }
        };

        let (alcohol, sugar) = match self.model.predict(&reading.as_features()) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!("Inference request rejected: {e}");
                return Outcome::Rejected;
            }
        };

        let answer = format!("{alcohol},{sugar}\n");
        match self.reply(answer.as_bytes()) {
            Ok(()) => {
                info!("Prediction sent to controller: {}", answer.trim_end());
                Outcome::Inferred(alcohol, sugar)
            }
            Err(e) => {
                warn!("{e}");
                Outcome::Rejected
            }
        }
    }

    fn reply(&mut self, bytes: &[u8]) -> Result<()> {
        self.controller
            .write_all(bytes)
            .and_then(|_| self.controller.flush())
            .map_err(|e| BridgeError::device(CONTROLLER, e))
    }

    /// Publish; on failure try to tell the log topic, ignoring that outcome.
    fn publish_or_report(&self, topic: &str, payload: &str) {
        if let Err(e) = self.bus.publish(topic, payload) {
            warn!("{e}");
            let _ = self
                .bus
                .publish(&self.topics.log, &format!("bridge: publish to {topic} failed: {e}"));
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Hand back the channels (for cleanup by the owner).
    pub fn into_parts(self) -> (SensorLink<S>, W, P) {
        (self.sensor, self.controller, self.bus)
    }
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
