use serde::{Deserialize, Serialize};

/// Client configuration.
///
/// TLS verification is scoped to the client built from this config; turning
/// it off never touches process-wide state. The default endpoint matches the
/// self-signed development server, hence `verify_tls: false` by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub verify_tls: bool,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:5001/api/".to_string(),
            verify_tls: false,
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, "https://localhost:5001/api/");
        assert!(!config.verify_tls);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"endpoint": "https://fhir.example.org/api/"}"#).unwrap();
        assert_eq!(config.endpoint, "https://fhir.example.org/api/");
        assert!(!config.verify_tls);
        assert_eq!(config.timeout_secs, 30);
    }
}
