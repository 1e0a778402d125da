use super::{Sink, SinkError};
use crate::aggregation::{AggregateRecord, InstantRecord};
use crate::config::MqttConfig;
use log::{debug, error, info};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;

/// Publishes records as JSON, one topic per record kind
pub struct MqttSink {
    client: AsyncClient,
    base_topic: String,
    host: String,
}

pub fn topic_for(base_topic: &str, record: &InstantRecord) -> String {
    match record {
        InstantRecord::Power { .. } => format!("{}/power", base_topic),
        InstantRecord::Gas { .. } => format!("{}/gas", base_topic),
    }
}

impl MqttSink {
    pub fn new(config: &MqttConfig) -> Self {
        info!("MQTT connection starting up");
        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if let (Some(user), Some(pass)) = (&config.user, &config.pass) {
            mqttoptions.set_credentials(user.clone(), pass.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);

        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Error in MQTT {:?}, reconnecting", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        MqttSink {
            client,
            base_topic: config.base_topic.clone(),
            host: format!("{}:{}", config.host, config.port),
        }
    }
}

impl Sink for MqttSink {
    fn name(&self) -> String {
        format!("mqtt://{}/{}", self.host, self.base_topic)
    }

    async fn write_aggregate(&mut self, record: &AggregateRecord) -> Result<(), SinkError> {
        let payload = serde_json::to_string(record)?;
        let topic = format!("{}/aggregate", self.base_topic);
        self.client.publish(topic.clone(), QoS::AtLeastOnce, true, payload).await?;
        debug!("Published aggregate to {}", topic);
        Ok(())
    }

    async fn write_instant(&mut self, record: &InstantRecord) -> Result<(), SinkError> {
        let payload = serde_json::to_string(record)?;
        let topic = topic_for(&self.base_topic, record);
        self.client.publish(topic.clone(), QoS::AtMostOnce, false, payload).await?;
        debug!("Published instant record to {}", topic);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_for() {
        let power = InstantRecord::Power { timestamp: 0, power_in_w: 1.0, power_out_w: 0.0, cost: Some(0.1) };
        let gas = InstantRecord::Gas { timestamp: 0, volume_delta: 0.1, cost: 0.06 };
        assert_eq!(topic_for("p1meter", &power), "p1meter/power");
        assert_eq!(topic_for("home/meter", &gas), "home/meter/gas");
    }

    #[tokio::test]
    async fn test_sink_name() {
        let config = MqttConfig {
            host: "localhost".to_string(),
            port: 1883,
            user: None,
            pass: None,
            client_name: "p1meter-test".to_string(),
            base_topic: "p1meter".to_string(),
        };
        let sink = MqttSink::new(&config);
        assert_eq!(sink.name(), "mqtt://localhost:1883/p1meter");
    }
}
