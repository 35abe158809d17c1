//! Provider configuration
//!
//! Built once, explicitly or from `HCS_*` environment variables, and passed
//! by reference afterwards.

use std::collections::HashMap;
use std::time::Duration;

use hcs_core::lifecycle::Timeouts;
use thiserror::Error;

const ENDPOINT_PREFIX: &str = "HCS_ENDPOINT_";

/// Upper bound for `HCS_TIMEOUT` (one week)
const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Connection settings shared by every resource kind
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub region: String,
    pub project_id: String,
    /// Cloud domain, e.g. "hcs.example.com"
    pub cloud: String,
    pub auth_token: Option<String>,
    /// Service name -> base URL
    pub endpoints: HashMap<String, String>,
    /// Skip TLS verification
    pub insecure: bool,
    pub timeouts: Timeouts,
}

impl ProviderConfig {
    pub fn new(region: impl Into<String>, project_id: impl Into<String>, cloud: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            project_id: project_id.into(),
            cloud: cloud.into(),
            auth_token: None,
            endpoints: HashMap::new(),
            insecure: false,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Override the base URL of one service
    pub fn with_endpoint(mut self, service: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoints.insert(service.into(), url.into());
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Read the configuration from `HCS_*` variables
    ///
    /// `HCS_ENDPOINT_<SERVICE>` overrides the endpoint of one service and
    /// `HCS_TIMEOUT` (seconds) sets all operation timeouts.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(k, v)| k.starts_with("HCS_") && !v.is_empty())
            .collect();
        let required = |name: &'static str| vars.get(name).cloned().ok_or(ConfigError::Missing(name));

        let mut config = Self::new(
            required("HCS_REGION_NAME")?,
            required("HCS_PROJECT_ID")?,
            required("HCS_CLOUD")?,
        );
        config.auth_token = vars.get("HCS_AUTH_TOKEN").cloned();

        if let Some(value) = vars.get("HCS_INSECURE") {
            config.insecure = parse_bool("HCS_INSECURE", value)?;
        }

        if let Some(value) = vars.get("HCS_TIMEOUT") {
            let invalid = |reason: &str| ConfigError::Invalid {
                name: "HCS_TIMEOUT".to_string(),
                value: value.clone(),
                reason: reason.to_string(),
            };
            let secs: u64 = value
                .parse()
                .map_err(|_| invalid("expected a number of seconds"))?;
            if secs == 0 || secs > MAX_TIMEOUT_SECS {
                return Err(invalid("must be between 1 second and one week"));
            }
            let timeout = Duration::from_secs(secs);
            config.timeouts = Timeouts {
                create: timeout,
                update: timeout,
                delete: timeout,
            };
        }

        for (name, url) in &vars {
            if let Some(service) = name.strip_prefix(ENDPOINT_PREFIX) {
                config
                    .endpoints
                    .insert(service.to_lowercase(), url.clone());
            }
        }

        Ok(config)
    }

    /// Base URL of a service, always ending in `/`
    pub fn endpoint_for(&self, service: &str) -> String {
        let url = match self.endpoints.get(service) {
            Some(url) => url.clone(),
            None => format!("https://{}.{}.{}/", service, self.region, self.cloud),
        };
        if url.ends_with('/') { url } else { format!("{}/", url) }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Fixture identifiers used by acceptance tests
///
/// Unset variables stay `None`; tests that need one skip themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptanceConfig {
    pub availability_zone: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub network_id: Option<String>,
    pub enterprise_project_id: Option<String>,
    pub rocketmq_flavor_id: Option<String>,
}

impl AcceptanceConfig {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .collect();
        let get = |name: &str| vars.get(name).cloned();
        Self {
            availability_zone: get("HCS_AVAILABILITY_ZONE"),
            vpc_id: get("HCS_VPC_ID"),
            subnet_id: get("HCS_SUBNET_ID"),
            network_id: get("HCS_NETWORK_ID"),
            enterprise_project_id: get("HCS_ENTERPRISE_PROJECT_ID"),
            rocketmq_flavor_id: get("HCS_DMS_ROCKETMQ_FLAVOR_ID"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn from_vars_reads_required_settings_and_overrides() {
        let config = ProviderConfig::from_vars(vars(&[
            ("HCS_REGION_NAME", "region-1"),
            ("HCS_PROJECT_ID", "p1"),
            ("HCS_CLOUD", "hcs.example.com"),
            ("HCS_AUTH_TOKEN", "secret"),
            ("HCS_INSECURE", "true"),
            ("HCS_TIMEOUT", "120"),
            ("HCS_ENDPOINT_VPC", "http://127.0.0.1:8080"),
            ("HOME", "/root"),
        ]))
        .unwrap();

        assert_eq!(config.region, "region-1");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert!(config.insecure);
        assert_eq!(config.timeouts.delete, Duration::from_secs(120));
        assert_eq!(config.endpoint_for("vpc"), "http://127.0.0.1:8080/");
        assert_eq!(config.endpoint_for("dms"), "https://dms.region-1.hcs.example.com/");
    }

    #[test]
    fn from_vars_reports_missing_and_invalid_values() {
        let err = ProviderConfig::from_vars(vars(&[("HCS_REGION_NAME", "r")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("HCS_PROJECT_ID"));

        let err = ProviderConfig::from_vars(vars(&[
            ("HCS_REGION_NAME", "r"),
            ("HCS_PROJECT_ID", "p"),
            ("HCS_CLOUD", "c"),
            ("HCS_INSECURE", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("HCS_INSECURE"));
    }

    #[test]
    fn from_vars_rejects_out_of_range_timeouts() {
        for value in ["0", "18446744073709551615", "604801"] {
            let err = ProviderConfig::from_vars(vars(&[
                ("HCS_REGION_NAME", "r"),
                ("HCS_PROJECT_ID", "p"),
                ("HCS_CLOUD", "c"),
                ("HCS_TIMEOUT", value),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains("HCS_TIMEOUT"), "{value}");
        }

        let config = ProviderConfig::from_vars(vars(&[
            ("HCS_REGION_NAME", "r"),
            ("HCS_PROJECT_ID", "p"),
            ("HCS_CLOUD", "c"),
            ("HCS_TIMEOUT", "604800"),
        ]))
        .unwrap();
        assert_eq!(config.timeouts.create, Duration::from_secs(604_800));
    }

    #[test]
    fn acceptance_config_leaves_unset_fixtures_empty() {
        let config = AcceptanceConfig::from_vars(vars(&[
            ("HCS_VPC_ID", "vpc-1"),
            ("HCS_SUBNET_ID", ""),
        ]));
        assert_eq!(config.vpc_id.as_deref(), Some("vpc-1"));
        assert_eq!(config.subnet_id, None);
        assert_eq!(config.availability_zone, None);
    }
}
