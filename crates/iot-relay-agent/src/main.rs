// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, process::ExitCode, sync::Arc};

use tokio::{signal, time::sleep};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use iot_relay::{
    adafruit::AdafruitSink,
    config::RelayConfig,
    error::RelayError,
    finance::FinanceSource,
    sender::Sender,
    sensor::SensorConfig,
    shutdown::{ShutdownReport, Supervisor},
    source::Fetcher,
    weather::WeatherSource,
};

#[cfg(feature = "rpi")]
use iot_relay::sensor::SensorSource;

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("RELAY_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    if let Err(e) = init_logging(&log_level) {
        eprintln!("Unable to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    debug!("Logging subsystem enabled");

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(report) => {
            info!(
                "Relay stopped after {} producers, sender {:?}",
                report.producers, report.outcome
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Relay stopped with an error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_level: &str) -> Result<(), String> {
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(env_filter).map_err(|e| e.to_string())?)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| e.to_string())
}

async fn run(config: RelayConfig) -> Result<ShutdownReport, RelayError> {
    let sink = AdafruitSink::new(config.adafruit_config()).map_err(|e| RelayError::Startup {
        component: "adafruit sink",
        reason: e.to_string(),
    })?;
    let (sender, handle) =
        Sender::new(Arc::new(sink), config.queue_capacity).map_err(|e| RelayError::Startup {
            component: "telemetry sender",
            reason: e.to_string(),
        })?;
    let mut supervisor = Supervisor::start(sender, handle);

    if let Some(weather) = config.weather_config() {
        let source = WeatherSource::new(weather).map_err(|e| RelayError::Startup {
            component: "weather source",
            reason: e.to_string(),
        })?;
        let fetcher = Fetcher::new(source, config.poll_interval);
        supervisor.spawn_producer(|handle, cancel| fetcher.run(handle, cancel));
    } else {
        info!("OPEN_WEATHER_KEY not set, weather producer disabled");
    }

    if let Some(finance) = config.finance_config() {
        let source = FinanceSource::new(finance).map_err(|e| RelayError::Startup {
            component: "finance source",
            reason: e.to_string(),
        })?;
        let fetcher = Fetcher::new(source, config.poll_interval);
        supervisor.spawn_producer(|handle, cancel| fetcher.run(handle, cancel));
    } else {
        info!("FINNHUB_API_KEY not set, finance producer disabled");
    }

    if let Some(sensor) = config.sensor_config() {
        spawn_sensor_producer(&mut supervisor, &config, sensor);
    } else {
        info!("RELAY_I2C_DEVICE not set, sensor producer disabled");
    }

    info!(
        "Relay running with {} producers, queue capacity {}",
        supervisor.producer_count(),
        supervisor.handle().capacity()
    );

    tokio::select! {
        () = shutdown_signal() => {}
        () = run_timer(config.run_duration) => {
            info!("Run duration elapsed");
        }
    }

    supervisor.shutdown(config.drain_timeout).await
}

#[cfg(feature = "rpi")]
fn spawn_sensor_producer(supervisor: &mut Supervisor, config: &RelayConfig, sensor: SensorConfig) {
    let Some(settings) = &config.sensor else {
        return;
    };
    let board = iot_relay::sensor::hardware::open_board(&settings.device);
    let period = sensor.report_period();
    match SensorSource::new(board, sensor) {
        Ok(source) => {
            let fetcher = Fetcher::new(source, period);
            supervisor.spawn_producer(|handle, cancel| fetcher.run(handle, cancel));
        }
        Err(e) => error!("Sensor producer disabled on {}: {}", settings.device, e),
    }
}

#[cfg(not(feature = "rpi"))]
fn spawn_sensor_producer(_: &mut Supervisor, _: &RelayConfig, _: SensorConfig) {
    tracing::warn!("RELAY_I2C_DEVICE is set but this build has no sensor support (feature rpi)");
}

async fn run_timer(duration: Option<std::time::Duration>) {
    match duration {
        Some(duration) => sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

/// Waits for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
