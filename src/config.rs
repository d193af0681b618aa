use crate::error::{Result, RelayError};
use std::env;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Inbound listener configuration
    pub server: ServerConfig,
    /// Gate pool and routing configuration
    pub gates: GateConfig,
    /// Status reporting configuration
    pub status: StatusConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Listener port (default: 8080)
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// File with one gate address per line
    pub list_file: String,
    /// File with one user-agent string per line
    pub user_agent_file: String,
    /// Calibration timeout in seconds
    pub calibration_timeout: u64,
    /// Operational per-request timeout in seconds
    pub request_timeout: u64,
    /// Retries after the first failed round
    pub max_retries: u32,
    /// Concurrent attempts per round
    pub fan_out: usize,
    /// Explore/exploit threshold in [0, 1]; larger values exploit more
    pub explore_bias: f64,
    /// Responder that echoes the caller's public IP
    pub probe_url: Url,
}

#[derive(Debug, Clone)]
pub struct StatusConfig {
    /// Seconds between status reports; 0 disables reporting
    pub interval: u64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl GateConfig {
    pub fn calibration_timeout(&self) -> Duration {
        Duration::from_secs(self.calibration_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    fn validate(&self) -> Result<()> {
        if self.calibration_timeout == 0 {
            return Err(RelayError::InvalidConfig(
                "GATE_TEST_TIMEOUT must be at least 1 second".into(),
            ));
        }
        if self.request_timeout == 0 {
            return Err(RelayError::InvalidConfig(
                "GATE_REQ_TIMEOUT must be at least 1 second".into(),
            ));
        }
        if self.fan_out == 0 {
            return Err(RelayError::InvalidConfig(
                "GATE_FAN_OUT must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.explore_bias) {
            return Err(RelayError::InvalidConfig(
                "GATE_EXPLORE_BIAS must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let gates = GateConfig {
            list_file: get_env_or("GATE_LIST_FILE", "ip_list"),
            user_agent_file: get_env_or("UA_LIST_FILE", "ua"),
            calibration_timeout: parse_env("GATE_TEST_TIMEOUT", "10")?,
            request_timeout: parse_env("GATE_REQ_TIMEOUT", "10")?,
            max_retries: parse_env("GATE_MAX_RETRIES", "10")?,
            fan_out: parse_env("GATE_FAN_OUT", "1")?,
            explore_bias: parse_env("GATE_EXPLORE_BIAS", "0.8")?,
            probe_url: parse_probe_url(&get_env_or("GATE_PROBE_URL", "http://api.ipify.org"))?,
        };
        gates.validate()?;

        Ok(Config {
            server: ServerConfig {
                host: get_env_or("RELAY_HOST", "0.0.0.0"),
                port: get_env_or("RELAY_PORT", "8080").parse().map_err(|_| {
                    RelayError::InvalidConfig("RELAY_PORT must be a valid port number".into())
                })?,
            },
            gates,
            status: StatusConfig {
                interval: parse_env("STATUS_INTERVAL", "10")?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the listener address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_probe_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        RelayError::InvalidConfig(format!("GATE_PROBE_URL must be a valid URL: {}", e))
    })?;
    if url.scheme() != "http" {
        return Err(RelayError::InvalidConfig(
            "GATE_PROBE_URL must use the http scheme".into(),
        ));
    }
    Ok(url)
}

/// Parse an environment variable, falling back to a default
fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| RelayError::InvalidConfig(format!("{} has an invalid value", key)))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
