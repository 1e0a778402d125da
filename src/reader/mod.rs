use crate::aggregation::{AggregationEngine, EngineError, InstantRecord};
use crate::config::{Config, OutputMode};
use crate::sink::{Sink, SinkError};
use crate::telegram::{Framer, Telegram};
use log::{debug, error, info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;

pub mod device;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Could not open device '{port}': {source}")]
    DeviceOpen { port: String, source: tokio_serial::Error },
    #[error("Could not open replay file '{path}': {source}")]
    Replay { path: String, source: std::io::Error },
    #[error("Could not read from device: {0}")]
    DeviceRead(std::io::Error),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("Sink write did not finish within {0:?}")]
    SinkTimeout(Duration),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Closed,
    Opening,
    Reading,
    Closing,
    Failed,
}

/// Source of telegram timestamps
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Clock {
    /// Live sources, telegrams are stamped with the current time
    Wall,
    /// Replayed sources, telegrams are `step` seconds apart
    Synthetic { next: i64, step: i64 },
}

impl Clock {
    pub fn synthetic_from_now(step: i64) -> Self {
        Clock::Synthetic { next: crate::get_unix_ts(), step }
    }

    pub fn now(&self) -> i64 {
        match self {
            Clock::Wall => crate::get_unix_ts(),
            Clock::Synthetic { next, .. } => *next,
        }
    }

    /// Timestamp for the next telegram
    pub fn stamp(&mut self) -> i64 {
        match self {
            Clock::Wall => crate::get_unix_ts(),
            Clock::Synthetic { next, step } => {
                let t = *next;
                *next += *step;
                t
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReaderOptions {
    pub mode: OutputMode,
    /// Seconds between two flushes
    pub interval: i64,
    pub read_timeout: Duration,
    pub sink_timeout: Duration,
}

impl ReaderOptions {
    pub fn from_config(config: &Config) -> Self {
        ReaderOptions {
            mode: config.output.mode,
            interval: config.output.interval as i64,
            read_timeout: config.read_timeout(),
            sink_timeout: config.sink_timeout(),
        }
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        ReaderOptions::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub telegrams: u64,
    pub flushes: u64,
    pub instant_records: u64,
}

/// Owns the read loop: lines go through the framer into the engine, and
/// records go out to the sink either on the flush interval or, in live
/// mode, for every telegram.
pub struct SourceReader<S: Sink> {
    engine: AggregationEngine,
    sink: S,
    framer: Framer,
    options: ReaderOptions,
    clock: Clock,
    state: ReaderState,
    last_flush: i64,
    stats: ReaderStats,
}

impl<S: Sink> SourceReader<S> {
    pub fn new(engine: AggregationEngine, sink: S, options: ReaderOptions) -> Self {
        SourceReader {
            engine,
            sink,
            framer: Framer::new(),
            options,
            clock: Clock::Wall,
            state: ReaderState::Closed,
            last_flush: 0,
            stats: ReaderStats::default(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Read from the serial device until a read error or cancellation
    pub async fn run_device(&mut self, port: &str, cancel: &watch::Receiver<bool>) -> Result<ReaderStats, ReaderError> {
        self.state = ReaderState::Opening;
        let stream = match device::open_device(port, self.options.read_timeout) {
            Ok(stream) => stream,
            Err(source) => {
                self.state = ReaderState::Failed;
                return Err(ReaderError::DeviceOpen { port: port.to_string(), source });
            }
        };

        info!("Reading data from '{}'", port);
        self.run_source(BufReader::new(stream), Clock::Wall, cancel).await
    }

    /// Feed a recorded telegram file through the same loop
    pub async fn run_replay(&mut self, path: &str, step: i64, cancel: &watch::Receiver<bool>) -> Result<ReaderStats, ReaderError> {
        self.state = ReaderState::Opening;
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(source) => {
                self.state = ReaderState::Failed;
                return Err(ReaderError::Replay { path: path.to_string(), source });
            }
        };

        info!("Reading data from '{}'", path);
        self.run_source(BufReader::new(file), Clock::synthetic_from_now(step), cancel).await
    }

    pub async fn run_source<R>(&mut self, mut source: R, clock: Clock, cancel: &watch::Receiver<bool>) -> Result<ReaderStats, ReaderError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.clock = clock;
        self.last_flush = self.clock.now();
        self.state = ReaderState::Reading;

        let outcome = self.read_loop(&mut source, cancel).await;

        self.state = ReaderState::Closing;
        if let Some(dropped) = self.framer.finish() {
            info!("Discarded {} bytes of an unterminated telegram", dropped);
        }

        /* Sink errors are not retried, anything else gets a last flush */
        if !matches!(outcome, Err(ReaderError::Sink(_)) | Err(ReaderError::SinkTimeout(_))) {
            self.final_flush().await;
        }

        self.state = if outcome.is_ok() { ReaderState::Closed } else { ReaderState::Failed };
        info!(
            "Reader closed after {} telegrams, {} flushes, {} instant records",
            self.stats.telegrams, self.stats.flushes, self.stats.instant_records
        );

        outcome.map(|_| self.stats)
    }

    async fn read_loop<R>(&mut self, source: &mut R, cancel: &watch::Receiver<bool>) -> Result<(), ReaderError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf: Vec<u8> = Vec::new();

        loop {
            if *cancel.borrow() {
                info!("Cancellation requested, stopping read loop");
                return Ok(());
            }

            /* Partial lines stay in buf when the read times out */
            match tokio::time::timeout(self.options.read_timeout, source.read_until(b'\n', &mut buf)).await {
                Err(_) => {
                    debug!("No data within {:?}", self.options.read_timeout);
                    continue;
                }
                Ok(Err(e)) => {
                    error!("Could not read from source: {}", e);
                    return Err(ReaderError::DeviceRead(e));
                }
                Ok(Ok(0)) => {
                    info!("End of stream reached");
                    return Ok(());
                }
                Ok(Ok(_)) => {}
            }

            let line = String::from_utf8_lossy(&buf).into_owned();
            buf.clear();

            if let Some(raw) = self.framer.push_line(&line) {
                self.handle_telegram(raw).await?;
            }
        }
    }

    async fn handle_telegram(&mut self, raw: String) -> Result<(), ReaderError> {
        let telegram = Telegram::new(raw, self.clock.stamp());
        debug!("\n{}", telegram.raw);

        let report = self.engine.parse(&telegram);
        self.stats.telegrams += 1;

        match self.options.mode {
            OutputMode::Live => {
                /* Nothing is ever flushed in live mode */
                self.engine.discard();
                for record in report.instant_records() {
                    self.write_instant(&record).await?;
                }
            }
            OutputMode::Aggregate => {
                if telegram.captured_at - self.last_flush >= self.options.interval {
                    self.flush(telegram.captured_at).await?;
                }
            }
        }

        Ok(())
    }

    async fn write_instant(&mut self, record: &InstantRecord) -> Result<(), ReaderError> {
        let timeout = self.options.sink_timeout;
        match tokio::time::timeout(timeout, self.sink.write_instant(record)).await {
            Err(_) => Err(ReaderError::SinkTimeout(timeout)),
            Ok(result) => {
                result?;
                self.stats.instant_records += 1;
                Ok(())
            }
        }
    }

    async fn flush(&mut self, now: i64) -> Result<(), ReaderError> {
        self.last_flush = now;
        let record = self.engine.flush(now)?;
        info!(
            "Flushing {} telegrams to {}: {}",
            record.telegrams,
            self.sink.name(),
            record.to_line().trim_end()
        );

        let timeout = self.options.sink_timeout;
        match tokio::time::timeout(timeout, self.sink.write_aggregate(&record)).await {
            Err(_) => Err(ReaderError::SinkTimeout(timeout)),
            Ok(result) => {
                result?;
                self.stats.flushes += 1;
                Ok(())
            }
        }
    }

    async fn final_flush(&mut self) {
        if self.options.mode != OutputMode::Aggregate || self.engine.counter() == 0 {
            return;
        }

        let now = self.clock.now();
        if let Err(e) = self.flush(now).await {
            warn!("Final flush failed: {}", e);
        }
    }
}
