use crate::aggregation::{AggregateRecord, InstantRecord};
use crate::config::SinkConfig;
use thiserror::Error;

pub mod file;
pub mod mqtt;

pub use file::FileSink;
pub use mqtt::MqttSink;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("MQTT publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    #[error("Unable to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Sink does not accept {0}")]
    Unsupported(&'static str),
}

/// Destination for flushed aggregates and, in live mode, per telegram values
#[allow(async_fn_in_trait)]
pub trait Sink {
    fn name(&self) -> String;

    async fn write_aggregate(&mut self, record: &AggregateRecord) -> Result<(), SinkError>;

    async fn write_instant(&mut self, _record: &InstantRecord) -> Result<(), SinkError> {
        Err(SinkError::Unsupported("instant records"))
    }
}

/// The sink selected in the configuration
pub enum ConfiguredSink {
    File(FileSink),
    Mqtt(MqttSink),
}

impl ConfiguredSink {
    /// Needs a running tokio runtime for the MQTT event loop
    pub fn from_config(config: &SinkConfig) -> Self {
        match config {
            SinkConfig::File { path } => ConfiguredSink::File(FileSink::new(path)),
            SinkConfig::Mqtt(mqtt) => ConfiguredSink::Mqtt(MqttSink::new(mqtt)),
        }
    }
}

impl Sink for ConfiguredSink {
    fn name(&self) -> String {
        match self {
            ConfiguredSink::File(s) => s.name(),
            ConfiguredSink::Mqtt(s) => s.name(),
        }
    }

    async fn write_aggregate(&mut self, record: &AggregateRecord) -> Result<(), SinkError> {
        match self {
            ConfiguredSink::File(s) => s.write_aggregate(record).await,
            ConfiguredSink::Mqtt(s) => s.write_aggregate(record).await,
        }
    }

    async fn write_instant(&mut self, record: &InstantRecord) -> Result<(), SinkError> {
        match self {
            ConfiguredSink::File(s) => s.write_instant(record).await,
            ConfiguredSink::Mqtt(s) => s.write_instant(record).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sink_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avg.dat");
        let config = SinkConfig::File { path: path.to_string_lossy().to_string() };
        let mut sink = ConfiguredSink::from_config(&config);
        assert!(sink.name().starts_with("file:"));

        let instant = InstantRecord::Power { timestamp: 0, power_in_w: 1.0, power_out_w: 0.0, cost: None };
        assert!(matches!(sink.write_instant(&instant).await, Err(SinkError::Unsupported(_))));
    }
}
