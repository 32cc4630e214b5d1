use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};

use spectra_bridge::app::{self, Bridge};
use spectra_bridge::config::{BridgeConfig, ModelConfig, Topics};

/// Bridge a spectral sensor and a microcontroller to an MQTT broker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Mode>,

    /// Serial port of the spectral sensor (e.g. /dev/ttyUSB0, COM3)
    #[arg(long)]
    sensor_port: Option<String>,

    /// Serial port of the controller (e.g. /dev/ttyUSB1, COM4)
    #[arg(long)]
    controller_port: Option<String>,

    /// MQTT broker host
    #[arg(long, default_value = "test.mosquitto.org")]
    broker: String,

    /// MQTT broker port
    #[arg(long, default_value = "1883")]
    broker_port: u16,

    /// Prefix for the telemetry/log/status/interval topics
    #[arg(long, default_value = "mantispectra")]
    topic_prefix: String,

    /// Model artifact (created from --dataset if missing)
    #[arg(long, global = true, default_value = "pls_model.json")]
    model: PathBuf,

    /// Labeled dataset used when the model has to be trained
    #[arg(long, global = true, default_value = "mantispectra_dataset.csv")]
    dataset: PathBuf,

    /// Delay after forwarding a capture, in milliseconds
    #[arg(long, default_value = "2000")]
    settle_ms: u64,

    /// Delay after each handled line, in milliseconds
    #[arg(long, default_value = "3000")]
    loop_delay_ms: u64,

    /// Log filter (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Train the model from the dataset, overwrite the artifact and exit
    Train,
}

fn main() {
    let args = Args::parse();

    logger(args.log_level.as_deref()).init();

    if let Err(e) = run(args) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

/// `--log-level` wins over `RUST_LOG`; with neither, log at info.
fn logger(level: Option<&str>) -> env_logger::Builder {
    match level {
        Some(filters) => {
            let mut builder = env_logger::Builder::new();
            builder.parse_filters(filters);
            builder
        }
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")),
    }
}

fn run(args: Args) -> Result<()> {
    let model = ModelConfig::with_paths(args.model, args.dataset);

    if let Some(Mode::Train) = args.command {
        let artifact = app::retrain(&model).context("training failed")?;
        match artifact.training.holdout_rmse {
            Some([a, b]) => println!(
                "Trained on {} rows; holdout RMSE {} = {a:.4}, {} = {b:.4}",
                artifact.training.train_rows, artifact.target_names[0], artifact.target_names[1]
            ),
            None => println!("Trained on {} rows (no holdout)", artifact.training.train_rows),
        }
        return Ok(());
    }

    let (Some(sensor_port), Some(controller_port)) = (args.sensor_port, args.controller_port) else {
        anyhow::bail!("--sensor-port and --controller-port are required");
    };

    let mut config = BridgeConfig::new(sensor_port, controller_port);
    config.bus.host = args.broker;
    config.bus.port = args.broker_port;
    config.bus.topics = Topics::with_prefix(&args.topic_prefix);
    config.pacing.settle = Duration::from_millis(args.settle_ms);
    config.pacing.loop_delay = Duration::from_millis(args.loop_delay_ms);
    config.model = model;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            info!("Interrupt received; shutting down");
            stop.store(true, Ordering::SeqCst);
        })
        .context("installing interrupt handler")?;
    }

    let bridge = Bridge::new(config);
    let stats = bridge.run(&stop).context("bridge startup failed")?;
    info!("Session stats: {stats:?}");
    Ok(())
}
