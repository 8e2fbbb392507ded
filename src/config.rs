//! Connection configuration.

use serde::{Deserialize, Serialize};

use crate::codec::DEFAULT_MAX_LINE_LENGTH;
use crate::types::{PsxError, PSX_DEFAULT_PORT};

/// Configuration for a PSX client connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Host and port of the PSX server, router or switch
    pub server: String,
    /// Client name reported to Router/SwitchPSX in response to `id`
    pub client_name: String,
    /// Optional sub-instance name, appended to the client name after `;`
    pub instance_name: Option<String>,
    /// Disable Nagle on the TCP stream
    pub no_delay: bool,
    /// Longest line the listener will accept
    pub max_line_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: format!("localhost:{}", PSX_DEFAULT_PORT),
            client_name: "psxlink".to_string(),
            instance_name: None,
            no_delay: true,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ConnectionConfig {
    pub fn new(server: impl Into<String>, client_name: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            client_name: client_name.into(),
            ..Self::default()
        }
    }

    pub fn with_instance_name(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = Some(instance_name.into());
        self
    }

    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, PsxError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PsxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PsxError> {
        if self.server.trim().is_empty() {
            return Err(PsxError::Config("server address is empty".into()));
        }
        if self.client_name.is_empty() {
            return Err(PsxError::Config("client name is empty".into()));
        }
        if self.max_line_length == 0 {
            return Err(PsxError::Config("max_line_length must be positive".into()));
        }
        Ok(())
    }

    /// Value of the `name` line sent after the server assigns an id
    pub fn identity(&self) -> String {
        match self.instance_name.as_deref() {
            Some(instance) if !instance.is_empty() => {
                format!("{};{}", self.client_name, instance)
            }
            _ => self.client_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.server, "localhost:10747");
        assert!(config.no_delay);
        assert!(config.instance_name.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_identity() {
        let config = ConnectionConfig::new("psx:10747", "poswatch");
        assert_eq!(config.identity(), "poswatch");
        let config = config.with_instance_name("left");
        assert_eq!(config.identity(), "poswatch;left");
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config =
            ConnectionConfig::from_json_str(r#"{"server":"10.0.0.2:10748","client_name":"mcp"}"#)
                .unwrap();
        assert_eq!(config.server, "10.0.0.2:10748");
        assert_eq!(config.client_name, "mcp");
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
        assert!(config.no_delay);
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            ConnectionConfig::from_json_str("{not json"),
            Err(PsxError::Config(_))
        ));
        assert!(matches!(
            ConnectionConfig::from_json_str(r#"{"server":""}"#),
            Err(PsxError::Config(_))
        ));
    }
}
