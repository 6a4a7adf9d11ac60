use serde::Deserialize;
use pizzatel_core::error::{Result, PizzatelError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub metrics: MetricsSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PizzatelError::UnsupportedVersion);
        }

        self.service.validate()?;
        self.metrics.validate()?;
        self.logging.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self { listen: default_listen() }
    }
}

impl ServiceSection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(PizzatelError::BadRequest(
                "service.listen must be a valid socket address".into(),
            ));
        }
        Ok(())
    }
}

/// Metrics export destination. Without `url` and `api_key` export is disabled.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default)]
    pub url: Option<String>,

    /// When set, the credential is `user_id:api_key`; otherwise `api_key` as-is.
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            source: default_source(),
            url: None,
            user_id: None,
            api_key: None,
            flush_interval_ms: default_flush_interval_ms(),
            push_timeout_ms: default_push_timeout_ms(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=3_600_000).contains(&self.flush_interval_ms) {
            return Err(PizzatelError::BadRequest(
                "metrics.flush_interval_ms must be between 100 and 3600000".into(),
            ));
        }
        if !(100..=60_000).contains(&self.push_timeout_ms) {
            return Err(PizzatelError::BadRequest(
                "metrics.push_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        if self.push_timeout_ms > self.flush_interval_ms {
            return Err(PizzatelError::BadRequest(
                "metrics.push_timeout_ms must not exceed flush_interval_ms".into(),
            ));
        }
        Ok(())
    }

    /// Basic-auth credential, if export is configured.
    pub fn credential(&self) -> Option<String> {
        let key = non_empty(self.api_key.as_deref())?;
        Some(match non_empty(self.user_id.as_deref()) {
            Some(user) => format!("{user}:{key}"),
            None => key.to_string(),
        })
    }

    pub fn endpoint(&self) -> Option<&str> {
        non_empty(self.url.as_deref())
    }
}

/// Log shipping destination. All of `url`, `user_id`, `api_key` are required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            source: default_source(),
            url: None,
            user_id: None,
            api_key: None,
            push_timeout_ms: default_push_timeout_ms(),
        }
    }
}

impl LoggingSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60_000).contains(&self.push_timeout_ms) {
            return Err(PizzatelError::BadRequest(
                "logging.push_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn credential(&self) -> Option<String> {
        let user = non_empty(self.user_id.as_deref())?;
        let key = non_empty(self.api_key.as_deref())?;
        Some(format!("{user}:{key}"))
    }

    pub fn endpoint(&self) -> Option<&str> {
        non_empty(self.url.as_deref())
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

fn default_listen() -> String {
    "0.0.0.0:3000".into()
}
fn default_source() -> String {
    "jwt-pizza-service".into()
}
fn default_flush_interval_ms() -> u64 {
    10_000
}
fn default_push_timeout_ms() -> u64 {
    5_000
}
