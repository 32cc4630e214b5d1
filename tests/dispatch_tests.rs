// Dispatcher integration tests: a scripted controller, a fake sensor and a
// recording bus, no hardware and no broker.

mod common;

use std::io::Cursor;
use std::sync::atomic::AtomicBool;

use common::{sixteen_values, trained_model, FakeSensor, RecordingBus};
use spectra_bridge::config::{CommandSet, Pacing, SensorConfig, Topics};
use spectra_bridge::dispatch::{Dispatcher, LineReader, Outcome};
use spectra_bridge::regression::ModelArtifact;
use spectra_bridge::{IntervalState, SensorLink};

type TestDispatcher<'a> = Dispatcher<'a, FakeSensor, Vec<u8>, &'a RecordingBus>;

fn dispatcher<'a>(
    sensor: FakeSensor,
    bus: &'a RecordingBus,
    model: &'a ModelArtifact,
    interval: IntervalState,
) -> TestDispatcher<'a> {
    Dispatcher::new(
        SensorLink::new(sensor, SensorConfig::default()),
        Vec::new(),
        bus,
        model,
        interval,
        &CommandSet::default(),
        Topics::default(),
        Pacing::immediate(),
    )
}

fn controller_output(d: TestDispatcher<'_>) -> String {
    let (_, written, _) = d.into_parts();
    String::from_utf8(written).unwrap()
}

fn sensor_text() -> String {
    (1..=16).map(|v| (v * 12).to_string()).collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Capture
// ============================================================================

#[test]
fn capture_forwards_sanitized_sensor_text() {
    let response = format!("\x1b[1;32m{} \x1b[0m", sensor_text());
    let sensor = FakeSensor::new(vec![response.as_str()]);
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(sensor, &bus, &model, IntervalState::default());

    assert_eq!(d.handle_line("C"), Outcome::Captured);
    assert_eq!(bus.count(), 0);

    let (link, written, _) = d.into_parts();
    assert_eq!(String::from_utf8(written).unwrap(), format!("{} ", sensor_text()));
    assert_eq!(link.into_inner().commands, b"S");
}

#[test]
fn capture_with_short_reading_sends_nothing() {
    let sensor = FakeSensor::new(vec!["12 34 ERR"]);
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(sensor, &bus, &model, IntervalState::default());

    assert_eq!(d.handle_line("C"), Outcome::Rejected);
    assert_eq!(controller_output(d), "");
}

#[test]
fn capture_with_silent_sensor_is_rejected() {
    let sensor = FakeSensor::new(vec![]);
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(sensor, &bus, &model, IntervalState::default());

    assert_eq!(d.handle_line("C"), Outcome::Rejected);
    assert_eq!(controller_output(d), "");
}

// ============================================================================
// Interval
// ============================================================================

#[test]
fn interval_request_reports_default() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    assert_eq!(d.handle_line("I"), Outcome::IntervalReported(30_000));
    assert_eq!(controller_output(d), "30000");
}

#[test]
fn interval_request_is_stable_without_updates() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    assert_eq!(d.handle_line("I"), d.handle_line("I"));
    assert_eq!(controller_output(d), "3000030000");
}

#[test]
fn bus_update_is_seen_by_next_request() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let interval = IntervalState::default();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, interval.clone());

    let listener = std::thread::spawn(move || interval.handle_message(b"45000"));
    assert_eq!(listener.join().unwrap(), Some(45_000));

    assert_eq!(d.handle_line("I"), Outcome::IntervalReported(45_000));
    assert_eq!(controller_output(d), "45000");
}

// ============================================================================
// Inference
// ============================================================================

#[test]
fn inference_writes_both_predictions() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    let values = sixteen_values();
    let line = format!(
        "Machine_Learning{}",
        values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
    );
    let features: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    let (alcohol, sugar) = model.predict(&features).unwrap();

    assert_eq!(d.handle_line(&line), Outcome::Inferred(alcohol, sugar));
    assert_eq!(controller_output(d), format!("{alcohol},{sugar}\n"));
}

#[test]
fn inference_with_fifteen_values_is_dropped() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    let all = sixteen_values();
    let values = &all[..15];
    let line = format!(
        "Machine_Learning{}",
        values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
    );
    assert_eq!(d.handle_line(&line), Outcome::Rejected);
    assert_eq!(bus.count(), 0);
    assert_eq!(controller_output(d), "");
}

#[test]
fn inference_with_garbage_is_dropped() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    assert_eq!(d.handle_line("Machine_Learning1,2,three"), Outcome::Rejected);
    assert_eq!(d.handle_line("Machine_Learning"), Outcome::Rejected);
    assert_eq!(controller_output(d), "");
}

// ============================================================================
// Relaying
// ============================================================================

#[test]
fn telemetry_goes_to_telemetry_topic_verbatim() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    let json = r#"{"device":"Arduino Uno","temp":21.5}"#;
    assert_eq!(d.handle_line(&format!("{json}\r")), Outcome::Relayed);
    assert_eq!(bus.on("mantispectra"), vec![json.to_string()]);
    assert_eq!(controller_output(d), "");
}

#[test]
fn telemetry_is_relayed_as_received() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    let raw = "\x1b[32m {\"device\":\"Arduino Uno\"} \x1b[0m";
    assert_eq!(d.handle_line(&format!("{raw}\r\n")), Outcome::Relayed);
    assert_eq!(bus.on("mantispectra"), vec![raw.to_string()]);
}

#[test]
fn unknown_line_is_logged_once_without_reply() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    assert_eq!(d.handle_line("valve opened"), Outcome::Logged);
    assert_eq!(bus.count(), 1);
    assert_eq!(bus.on("mantispectra/log"), vec!["valve opened".to_string()]);
    assert_eq!(controller_output(d), "");
}

#[test]
fn failed_publish_is_reported_on_log_topic() {
    let bus = RecordingBus::failing_on("mantispectra");
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    assert_eq!(d.handle_line("Arduino Uno {}"), Outcome::Relayed);
    let log = bus.on("mantispectra/log");
    assert_eq!(log.len(), 1);
    assert!(log[0].contains("publish to mantispectra failed"));
}

#[test]
fn blank_line_does_nothing() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    assert_eq!(d.handle_line("   \r"), Outcome::Ignored);
    assert_eq!(bus.count(), 0);
    assert_eq!(controller_output(d), "");
}

// ============================================================================
// Full loop
// ============================================================================

#[test]
fn loop_survives_bad_lines_and_stops_at_close() {
    let text = sensor_text();
    let sensor = FakeSensor::new(vec![text.as_str()]);
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(sensor, &bus, &model, IntervalState::new(15_000));

    let mut script: Vec<u8> = Vec::new();
    script.extend_from_slice(b"hello\n");
    script.extend_from_slice(&[0xff, 0xfe, b'\n']);
    script.extend_from_slice(b"\n");
    script.extend_from_slice(b"Machine_Learning1,2\n");
    script.extend_from_slice(b"I\r\n");
    script.extend_from_slice(b"C\n");

    let mut lines = LineReader::new(Cursor::new(script));
    let stats = d.run(&mut lines, &AtomicBool::new(false));

    assert_eq!(stats.logged, 1);
    assert_eq!(stats.undecodable, 1);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.interval_reports, 1);
    assert_eq!(stats.captured, 1);
    assert_eq!(stats.handled(), 5);
    assert_eq!(d.stats(), &stats);
    assert_eq!(controller_output(d), format!("15000{}", sensor_text()));
}

#[test]
fn loop_exits_immediately_when_stopped() {
    let bus = RecordingBus::default();
    let model = trained_model();
    let mut d = dispatcher(FakeSensor::new(vec![]), &bus, &model, IntervalState::default());

    let mut lines = LineReader::new(Cursor::new(b"hello\n".to_vec()));
    let stats = d.run(&mut lines, &AtomicBool::new(true));
    assert_eq!(stats.handled(), 0);
    assert_eq!(bus.count(), 0);
}
