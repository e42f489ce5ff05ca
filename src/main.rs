use chrono::{DateTime, Local, TimeDelta};
use color_eyre::{eyre::eyre, Result};
use sensormux::backend::{self, VendorDelay};
use sensormux::config::{DelaySink, SensorConfig};
use sensormux::device::{AkmControlDevice, DelayControl, EvdevSource};
use sensormux::hub::SensorHub;
use sensormux::sensor::SensorEvent;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let path = SensorConfig::default_path();
    SensorConfig::ensure_default_config(&path).await?;
    let config = SensorConfig::load(&path).await?;

    let mut hub = open_hub(&config)?;
    start_sensors(&mut hub, &config);

    run_poll_loop(&mut hub, &config).await;

    info!("Shutting down, disabling sensors");
    for sensor in hub.enabled_mask().sensors() {
        if let Err(e) = hub.set_enabled(sensor.handle(), false) {
            warn!("Could not disable {}: {}", sensor, e);
        }
    }
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn open_hub(config: &SensorConfig) -> Result<SensorHub> {
    let backend = backend::load(&config.backend.library);

    let source = EvdevSource::open(&config.device.input_path).map_err(|e| {
        eyre!(
            "Failed to open input node {}: {}",
            config.device.input_path.display(),
            e
        )
    })?;

    let delay_control: Box<dyn DelayControl> = match config.backend.delay_sink {
        DelaySink::ControlDevice => Box::new(
            AkmControlDevice::open(&config.device.control_path).map_err(|e| {
                eyre!(
                    "Failed to open control node {}: {}",
                    config.device.control_path.display(),
                    e
                )
            })?,
        ),
        DelaySink::Vendor => Box::new(VendorDelay::new(backend.clone())),
    };

    Ok(SensorHub::new(config, Box::new(source), backend, delay_control))
}

fn start_sensors(hub: &mut SensorHub, config: &SensorConfig) {
    for sensor in &config.startup.sensors {
        if let Err(e) = hub.set_delay(sensor.handle(), config.startup.delay_ns) {
            warn!("Could not set sampling period of {}: {}", sensor, e);
        }
        match hub.set_enabled(sensor.handle(), true) {
            Ok(()) => info!("Started {}", sensor),
            Err(e) => error!("Could not start {}: {} (errno {})", sensor, e, e.errno()),
        }
    }
}

#[derive(Debug)]
struct PollStats {
    started: DateTime<Local>,
    last_report: DateTime<Local>,
    events: u64,
    polls: u64,
    errors: u64,
}

impl PollStats {
    fn new() -> Self {
        let now = Local::now();
        Self {
            started: now,
            last_report: now,
            events: 0,
            polls: 0,
            errors: 0,
        }
    }

    fn report_if_due(&mut self, every: TimeDelta) {
        let now = Local::now();
        if now - self.last_report < every {
            return;
        }
        let uptime = (now - self.started).num_seconds();
        info!(
            "Uptime {}s: {} events in {} polls, {} read errors",
            uptime, self.events, self.polls, self.errors
        );
        self.last_report = now;
    }
}

async fn run_poll_loop(hub: &mut SensorHub, config: &SensorConfig) {
    let mut interval = tokio::time::interval(Duration::from_millis(config.poll.interval_ms.max(1)));
    let report_every = TimeDelta::seconds(config.poll.stats_interval_secs.max(1));
    let mut stats = PollStats::new();

    info!("Polling every {} ms", config.poll.interval_ms);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                stats.polls += 1;
                match hub.poll_events(config.poll.max_events) {
                    Ok(events) => {
                        stats.events += events.len() as u64;
                        events.iter().for_each(log_event);
                    }
                    Err(e) => {
                        stats.errors += 1;
                        error!("Failed to read sensor events: {}", e);
                    }
                }
                stats.report_if_due(report_every);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C");
                break;
            }
        }
    }
}

fn log_event(event: &SensorEvent) {
    info!(
        "{} [type {}] t={} {:?}",
        event.sensor,
        event.kind.type_code(),
        event.timestamp,
        event.payload
    );
}
