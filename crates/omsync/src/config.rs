//! Endpoint configuration.

use serde::{Deserialize, Serialize};

use omsync_sync::frame::HEADER_LEN;
use omsync_sync::{AgentConfig, ChangeSyncConfig, TransferConfig};

use crate::error::{EndpointError, Result};

/// What `?` does to the properties it names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Mark them dirty; the next change-sync pass sends them.
    #[default]
    Deferred,
    /// Queue their assignments right away.
    Immediate,
}

/// Configuration for an [`Endpoint`](crate::Endpoint).
///
/// Every field has a default, so a JSON document only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub agent: AgentConfig,
    pub sync: ChangeSyncConfig,
    pub transfer: TransferConfig,
    /// Namespace the preference store keeps values under.
    pub pref_namespace: String,
    pub query_mode: QueryMode,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            sync: ChangeSyncConfig::default(),
            transfer: TransferConfig::default(),
            pref_namespace: "OM".to_string(),
            query_mode: QueryMode::Deferred,
        }
    }
}

impl EndpointConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every frame the endpoint can build fits the link.
    pub fn validate(&self) -> Result<()> {
        let max = self.agent.max_packet_len;
        let invalid = |msg: String| Err(EndpointError::InvalidConfig(msg));

        if self.transfer.chunk_size == 0 {
            return invalid("transfer chunk_size must be at least 1".into());
        }
        if HEADER_LEN + self.transfer.chunk_size > max {
            return invalid(format!(
                "data frame of {} bytes exceeds max_packet_len {}",
                HEADER_LEN + self.transfer.chunk_size,
                max
            ));
        }
        if HEADER_LEN + self.transfer.max_name_len > max {
            return invalid(format!(
                "start frame of {} bytes exceeds max_packet_len {}",
                HEADER_LEN + self.transfer.max_name_len,
                max
            ));
        }
        if self.sync.batch_limit > max {
            return invalid(format!(
                "batch_limit {} exceeds max_packet_len {}",
                self.sync.batch_limit, max
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_from_json_overrides() {
        let config = EndpointConfig::from_json(
            r#"{
                "agent": { "send_timeout": 20 },
                "transfer": { "inbox_dir": "/tmp/inbox", "chunk_size": 128 },
                "query_mode": "immediate"
            }"#,
        )
        .unwrap();
        assert_eq!(config.agent.send_timeout, Duration::from_millis(20));
        assert_eq!(config.agent.max_packet_len, 250);
        assert_eq!(config.transfer.chunk_size, 128);
        assert_eq!(config.transfer.max_retries, 2);
        assert_eq!(config.query_mode, QueryMode::Immediate);
        assert_eq!(config.pref_namespace, "OM");
    }

    #[test]
    fn test_default_is_valid() {
        assert!(EndpointConfig::default().validate().is_ok());
    }

    #[test]
    fn test_chunk_must_fit_packet() {
        let mut config = EndpointConfig::default();
        config.transfer.chunk_size = config.agent.max_packet_len - HEADER_LEN;
        assert!(config.validate().is_ok());

        config.transfer.chunk_size += 1;
        assert!(matches!(
            config.validate(),
            Err(EndpointError::InvalidConfig(_))
        ));

        config.transfer.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_rejects_oversize_batch() {
        let result = EndpointConfig::from_json(r#"{ "sync": { "batch_limit": 400 } }"#);
        assert!(matches!(result, Err(EndpointError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(EndpointConfig::from_json("{}").unwrap(), EndpointConfig::default());
        assert!(EndpointConfig::from_json("{ \"query_mode\": \"later\" }").is_err());
    }
}
