//! Broker URL parsing.

use crate::{MqttSourceError, MqttSourceResult};
use rumqttc::QoS;
use url::Url;

/// Port used when the broker URL has none.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Host, port and optional credentials parsed from a broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl BrokerAddress {
    /// Parse `tcp://host[:port]` or `mqtt://[user:pass@]host[:port]`.
    pub fn parse(broker: &str) -> MqttSourceResult<Self> {
        let url = Url::parse(broker.trim())?;

        match url.scheme() {
            "tcp" | "mqtt" => {}
            other => {
                return Err(MqttSourceError::InvalidBroker(format!(
                    "unsupported scheme {:?}, expected tcp or mqtt",
                    other
                )))
            }
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MqttSourceError::InvalidBroker(format!("missing host in {}", broker)))?
            .to_string();

        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_MQTT_PORT),
            username,
            password: url.password().map(str::to_string),
        })
    }
}

/// Map a numeric QoS level (0, 1, 2) to rumqttc's enum.
pub fn qos_from_level(level: u8) -> MqttSourceResult<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(MqttSourceError::UnsupportedQos(other)),
    }
}
