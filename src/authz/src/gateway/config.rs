//! Gateway configuration
//!
//! Hosts for the hosted environments are presets on [`GatewayConfig`];
//! nothing is read from process-wide state except through
//! [`GatewayConfig::from_env`].

use crate::engine::StrategyKind;
use crate::snapshot::DEFAULT_SNAPSHOT_REFRESH_INTERVAL;
use entitlements_core::{EntitlementsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEVELOPMENT_HOST: &str = "entitlements-dev.aws.barchart.com";
pub const STAGING_HOST: &str = "entitlements-stage.aws.barchart.com";
pub const PRODUCTION_HOST: &str = "entitlements.aws.barchart.com";
pub const ADMIN_HOST: &str = "entitlements-admin.aws.barchart.com";

/// Transport protocol of the entitlements service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = EntitlementsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(EntitlementsError::configuration(format!("unknown protocol '{}'", other))),
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub protocol: Protocol,

    pub host: String,

    pub port: u16,

    /// Environment description (development, staging, production, admin)
    pub environment: String,

    /// How long a fetched entitlements snapshot is trusted
    pub snapshot_refresh_interval: Duration,

    pub strategy: StrategyKind,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl GatewayConfig {
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16, environment: impl Into<String>) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
            environment: environment.into(),
            snapshot_refresh_interval: DEFAULT_SNAPSHOT_REFRESH_INTERVAL,
            strategy: StrategyKind::default(),
        }
    }

    /// Private development environment
    pub fn development() -> Self {
        Self::new(Protocol::Https, DEVELOPMENT_HOST, 443, "development")
    }

    /// Staging environment
    pub fn staging() -> Self {
        Self::new(Protocol::Https, STAGING_HOST, 443, "staging")
    }

    /// Production environment
    pub fn production() -> Self {
        Self::new(Protocol::Https, PRODUCTION_HOST, 443, "production")
    }

    /// Private admin environment
    pub fn admin() -> Self {
        Self::new(Protocol::Https, ADMIN_HOST, 443, "admin")
    }

    pub fn for_environment(environment: &str) -> Result<Self> {
        match environment.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::development()),
            "staging" | "stage" => Ok(Self::staging()),
            "production" | "prod" => Ok(Self::production()),
            "admin" => Ok(Self::admin()),
            other => Err(EntitlementsError::configuration(format!(
                "unknown environment '{}'",
                other
            ))),
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_snapshot_refresh_interval(mut self, interval: Duration) -> Self {
        self.snapshot_refresh_interval = interval;
        self
    }

    /// Base URL of the service, omitting the port when it is the default
    pub fn base_url(&self) -> String {
        if self.port == self.protocol.default_port() {
            format!("{}://{}", self.protocol, self.host)
        } else {
            format!("{}://{}:{}", self.protocol, self.host, self.port)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(EntitlementsError::configuration("host must not be empty"));
        }
        if self.port == 0 {
            return Err(EntitlementsError::configuration("port must not be zero"));
        }
        if self.snapshot_refresh_interval.is_zero() {
            return Err(EntitlementsError::configuration(
                "snapshot refresh interval must not be zero",
            ));
        }
        Ok(())
    }

    /// Load configuration from `ENTITLEMENTS_*` environment variables
    ///
    /// - `ENTITLEMENTS_ENVIRONMENT` - preset to start from (default: production)
    /// - `ENTITLEMENTS_PROTOCOL` - http or https
    /// - `ENTITLEMENTS_HOST` - service hostname
    /// - `ENTITLEMENTS_PORT` - service port
    /// - `ENTITLEMENTS_SNAPSHOT_REFRESH_SECS` - snapshot refresh interval
    /// - `ENTITLEMENTS_STRATEGY` - local-first or remote-only
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GatewayConfig::from_env`] with an injected variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("ENTITLEMENTS_ENVIRONMENT") {
            Some(environment) => Self::for_environment(&environment)?,
            None => Self::production(),
        };

        if let Some(protocol) = lookup("ENTITLEMENTS_PROTOCOL") {
            config.protocol = protocol.parse()?;
        }

        if let Some(host) = lookup("ENTITLEMENTS_HOST") {
            config.host = host;
        }

        if let Some(port) = lookup("ENTITLEMENTS_PORT") {
            config.port = port
                .parse()
                .map_err(|_| EntitlementsError::configuration(format!("invalid port '{}'", port)))?;
        }

        if let Some(secs) = lookup("ENTITLEMENTS_SNAPSHOT_REFRESH_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                EntitlementsError::configuration(format!("invalid snapshot refresh interval '{}'", secs))
            })?;
            config.snapshot_refresh_interval = Duration::from_secs(secs);
        }

        if let Some(strategy) = lookup("ENTITLEMENTS_STRATEGY") {
            config.strategy = strategy.parse()?;
        }

        config.validate()?;
        Ok(config)
    }
}
