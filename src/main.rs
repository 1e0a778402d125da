use log::{error, info, warn};
use p1meter::{AggregationEngine, Config, ConfiguredSink, ReaderError, ReaderOptions, SourceReader};
use std::time::Duration;
use tokio::sync::watch;

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                warn!("Unable to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    let default_filter = std::env::var("P1M_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let prices = match config.prices.price_table() {
        Ok(prices) => prices,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };
    info!("Price for kWh {} at low tariff", config.prices.kwh_low);
    info!("Price for kWh {} at high tariff", config.prices.kwh_high);
    info!("Price for gas {}", config.prices.gas);

    let sink = ConfiguredSink::from_config(&config.sink);

    /* Signals only request a stop, the read loop exits at its next iteration */
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("Trapped signal, stopping");
        let _ = cancel_tx.send(true);
    });

    let engine = AggregationEngine::new(config.meter.profile.definition(), prices);
    let mut reader = SourceReader::new(engine, sink, ReaderOptions::from_config(&config));

    let mut attempts: u32 = 0;
    loop {
        let result = match &config.replay.path {
            Some(path) => reader.run_replay(path, config.replay.step, &cancel_rx).await,
            None => reader.run_device(&config.device.port, &cancel_rx).await,
        };

        match result {
            Ok(stats) => {
                info!("Done, {} telegrams processed", stats.telegrams);
                break;
            }
            Err(ReaderError::DeviceRead(e)) if attempts < config.restart.max_attempts && !*cancel_rx.borrow() => {
                attempts += 1;
                warn!(
                    "Read failed ({}), restart {}/{} in {}s",
                    e, attempts, config.restart.max_attempts, config.restart.backoff
                );
                tokio::time::sleep(Duration::from_secs(config.restart.backoff)).await;
            }
            Err(e) => {
                error!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
