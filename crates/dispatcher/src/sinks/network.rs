//! NetworkDispatcher - one UDP datagram per outbound record

use async_trait::async_trait;
use contracts::{DataDispatcher, DispatcherConfig, DistributorError, OutboundFields};
use serde_json::Value;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument};

/// Serialization format for network transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    /// JSON (human-readable, larger)
    #[default]
    Json,
    /// Bincode (binary, compact)
    Bincode,
}

/// Configuration for NetworkDispatcher
#[derive(Debug, Clone)]
pub struct NetworkDispatcherConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Serialization format
    pub format: NetworkFormat,
    /// Max packet size (UDP typically 65507 for IPv4)
    pub max_packet_size: usize,
}

impl NetworkDispatcherConfig {
    /// Create config from dispatcher params
    pub fn from_config(config: &DispatcherConfig) -> Result<Self, String> {
        let addr_str = config
            .param_str("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match config.param_str("format") {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = config
            .params
            .get("maxPacketSize")
            .and_then(Value::as_u64)
            .map(|size| size as usize)
            .unwrap_or(65000);

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

/// Any-address, any-port local endpoint of the target's address family
fn local_bind_addr(target: &SocketAddr) -> SocketAddr {
    let ip = if target.is_ipv6() {
        IpAddr::V6(Ipv6Addr::UNSPECIFIED)
    } else {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    };
    SocketAddr::new(ip, 0)
}

/// Dispatcher that sends each record as a UDP datagram
pub struct NetworkDispatcher {
    name: String,
    config: NetworkDispatcherConfig,
    socket: UdpSocket,
}

impl NetworkDispatcher {
    /// Create a new NetworkDispatcher
    #[instrument(name = "network_dispatcher_new", skip(name, config))]
    pub async fn new(
        name: impl Into<String>,
        config: NetworkDispatcherConfig,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind(local_bind_addr(&config.addr)).await?;
        socket.connect(&config.addr).await?;

        debug!(
            dispatcher = %name,
            target = %config.addr,
            "NetworkDispatcher connected"
        );

        Ok(Self {
            name,
            config,
            socket,
        })
    }

    /// Create from dispatcher configuration (for factory)
    #[instrument(name = "network_dispatcher_from_config", skip(config), fields(dispatcher = %config.name))]
    pub async fn from_config(config: &DispatcherConfig) -> Result<Self, String> {
        let network_config = NetworkDispatcherConfig::from_config(config)?;
        Self::new(&config.name, network_config)
            .await
            .map_err(|e| e.to_string())
    }

    fn serialize_fields(&self, fields: &OutboundFields) -> Result<Vec<u8>, String> {
        match self.config.format {
            NetworkFormat::Json => {
                serde_json::to_vec(fields).map_err(|e| format!("json error: {}", e))
            }
            // values travel as JSON text so the datagram decodes without a schema
            NetworkFormat::Bincode => {
                let flat: Vec<(&str, String)> = fields
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.to_string()))
                    .collect();
                bincode::serialize(&flat).map_err(|e| format!("bincode error: {}", e))
            }
        }
    }

    fn prepare_payload(&self, fields: &OutboundFields) -> Result<Vec<u8>, DistributorError> {
        let data = self
            .serialize_fields(fields)
            .map_err(|e| DistributorError::delivery(&self.name, e))?;

        if data.len() > self.config.max_packet_size {
            return Err(DistributorError::delivery(
                &self.name,
                format!(
                    "packet of {} bytes exceeds max packet size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }

        Ok(data)
    }
}

#[async_trait]
impl DataDispatcher for NetworkDispatcher {
    fn keyword(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_dispatcher_send",
        skip(self, fields),
        fields(dispatcher = %self.name, fields = fields.len())
    )]
    async fn send(&self, fields: &OutboundFields) -> Result<(), DistributorError> {
        let data = self.prepare_payload(fields)?;
        match self.socket.send(&data).await {
            Ok(sent) => {
                debug!(dispatcher = %self.name, bytes = sent, "Sent");
                Ok(())
            }
            Err(e) => {
                error!(dispatcher = %self.name, error = %e, "UDP send failed");
                Err(DistributorError::delivery(&self.name, e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher_config(params: Value) -> DispatcherConfig {
        let mut entry = json!({ "name": "net", "type": "udp" });
        if let (Some(entry), Value::Object(params)) = (entry.as_object_mut(), params) {
            entry.extend(params);
        }
        serde_json::from_value(entry).unwrap()
    }

    #[test]
    fn test_network_config_parsing() {
        let config = NetworkDispatcherConfig::from_config(&dispatcher_config(json!({
            "addr": "127.0.0.1:9999",
            "format": "bincode"
        })))
        .unwrap();
        assert_eq!(config.addr.port(), 9999);
        assert_eq!(config.format, NetworkFormat::Bincode);
        assert_eq!(config.max_packet_size, 65000);

        assert!(NetworkDispatcherConfig::from_config(&dispatcher_config(json!({}))).is_err());
        assert!(NetworkDispatcherConfig::from_config(&dispatcher_config(json!({
            "addr": "127.0.0.1:9999",
            "format": "xml"
        })))
        .is_err());
    }

    #[test]
    fn test_bind_address_follows_target_family() {
        let v4 = local_bind_addr(&"127.0.0.1:9999".parse().unwrap());
        assert_eq!(v4, "0.0.0.0:0".parse::<SocketAddr>().unwrap());

        let v6 = local_bind_addr(&"[::1]:9999".parse().unwrap());
        assert_eq!(v6, "[::]:0".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_network_dispatcher_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = NetworkDispatcherConfig {
            addr: receiver.local_addr().unwrap(),
            format: NetworkFormat::Json,
            max_packet_size: 65000,
        };

        let dispatcher = NetworkDispatcher::new("test_net", config).await.unwrap();
        let mut fields = OutboundFields::new();
        fields.insert("field1".into(), json!("value1"));
        dispatcher.send(&fields).await.unwrap();

        let mut buf = vec![0u8; 1024];
        let len = receiver.recv(&mut buf).await.unwrap();
        let received: Value = serde_json::from_slice(&buf[..len]).unwrap();
        assert_eq!(received, json!({ "field1": "value1" }));
    }

    #[tokio::test]
    async fn test_oversized_packet_fails() {
        let config = NetworkDispatcherConfig {
            addr: "127.0.0.1:19998".parse().unwrap(),
            format: NetworkFormat::Json,
            max_packet_size: 8,
        };

        let dispatcher = NetworkDispatcher::new("test_net", config).await.unwrap();
        let mut fields = OutboundFields::new();
        fields.insert("field1".into(), json!("a long enough value"));
        let err = dispatcher.send(&fields).await.unwrap_err();
        assert!(err.to_string().contains("exceeds max packet size"));
    }
}
