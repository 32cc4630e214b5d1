// Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::path::Path;

use spectra_bridge::bus::Publisher;
use spectra_bridge::config::ModelConfig;
use spectra_bridge::data::model::LabeledDataset;
use spectra_bridge::regression::{self, ModelArtifact};
use spectra_bridge::BridgeError;

/// Deterministic 16-channel dataset whose targets are noisy linear
/// functions of the channels.
pub fn synthetic_rows(n: usize) -> (Vec<String>, Vec<Vec<f64>>) {
    let mut columns: Vec<String> = (1..=16).map(|i| format!("spectrum_{i}")).collect();
    columns.push("alcohol_percentage".to_string());
    columns.push("sugar_percentage".to_string());

    let rows = (0..n)
        .map(|i| {
            let mut row: Vec<f64> = (0..16)
                .map(|j| 800.0 + ((i * 37 + j * 11) % 53) as f64 * (1.0 + j as f64 * 0.25))
                .collect();
            let wobble = ((i * 7) % 5) as f64 * 0.01;
            let alcohol = 0.02 * row[2] - 0.01 * row[11] + 3.0 + wobble;
            let sugar = 0.015 * row[5] + 0.005 * row[14] - 10.0 - wobble;
            row.push(alcohol);
            row.push(sugar);
            row
        })
        .collect();
    (columns, rows)
}

pub fn write_dataset_csv(path: &Path, n: usize) {
    let (columns, rows) = synthetic_rows(n);
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(&columns).unwrap();
    for row in rows {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .unwrap();
    }
    writer.flush().unwrap();
}

pub fn trained_model() -> ModelArtifact {
    let (columns, rows) = synthetic_rows(40);
    let dataset = LabeledDataset::from_rows(columns, rows).unwrap();
    regression::train_on(&dataset, &ModelConfig::default()).unwrap()
}

pub fn sixteen_values() -> Vec<i64> {
    (0..16).map(|j| 820 + j * 3).collect()
}

/// A sensor that answers every capture with the next scripted response.
pub struct FakeSensor {
    responses: VecDeque<Vec<u8>>,
    current: VecDeque<u8>,
    pub commands: Vec<u8>,
}

impl FakeSensor {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: responses.into_iter().map(|r| r.as_bytes().to_vec()).collect(),
            current: VecDeque::new(),
            commands: Vec::new(),
        }
    }
}

impl Write for FakeSensor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.commands.extend_from_slice(buf);
        if let Some(next) = self.responses.pop_front() {
            self.current.extend(next);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for FakeSensor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.current.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "sensor quiet"));
        }
        let n = buf.len().min(self.current.len());
        for (slot, byte) in buf.iter_mut().zip(self.current.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Records every publish; can be told to fail.
#[derive(Default)]
pub struct RecordingBus {
    pub published: RefCell<Vec<(String, String)>>,
    pub fail_topic: Option<String>,
}

impl RecordingBus {
    pub fn failing_on(topic: &str) -> Self {
        Self {
            published: RefCell::new(Vec::new()),
            fail_topic: Some(topic.to_string()),
        }
    }

    pub fn on(&self, topic: &str) -> Vec<String> {
        self.published
            .borrow()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.published.borrow().len()
    }
}

impl Publisher for RecordingBus {
    fn publish(&self, topic: &str, payload: &str) -> spectra_bridge::Result<()> {
        if self.fail_topic.as_deref() == Some(topic) {
            return Err(BridgeError::Bus(format!("publish to {topic}: queue full")));
        }
        self.published
            .borrow_mut()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}
