use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ConfigError;

pub const DEFAULT_USER_AGENT: &str = "Clash/1.0.0";
pub const DEFAULT_MIRROR_PREFIX: &str =
    "https://raw.githubusercontent.com/free-nodes/clashfree/refs/heads/main/clash";
pub const DEFAULT_MIRROR_SUFFIX: &str = ".yml";
pub const DEFAULT_API_PORT: u16 = 9090;
pub const DEFAULT_API_SECRET: &str = "clash-cleaner-secret";
pub const DEFAULT_PROBE_TARGET: &str = "http://www.gstatic.com/generate_204";
pub const DEFAULT_MAX_LATENCY_MS: u32 = 1500;

/// How the fetcher walks the configured source list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Try every URL and concatenate everything that decoded.
    #[default]
    AggregateAll,
    /// Try URLs in order, stop at the first one that yields nodes.
    FirstSuccess,
}

impl FromStr for FetchPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggregate-all" | "aggregate" | "all" => Ok(Self::AggregateAll),
            "first-success" | "first" => Ok(Self::FirstSuccess),
            other => Err(ConfigError::FetchPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AggregateAll => f.write_str("aggregate-all"),
            Self::FirstSuccess => f.write_str("first-success"),
        }
    }
}

/// Where subscriptions come from and how they are fetched.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Explicit subscription URLs. When empty, dated mirror URLs are used.
    pub urls: Vec<String>,
    pub mirror_prefix: String,
    pub mirror_suffix: String,
    pub policy: FetchPolicy,
    /// Outbound forwarding proxy (`socks5://`, `http://`...).
    pub outbound_proxy: Option<String>,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            mirror_prefix: DEFAULT_MIRROR_PREFIX.to_string(),
            mirror_suffix: DEFAULT_MIRROR_SUFFIX.to_string(),
            policy: FetchPolicy::default(),
            outbound_proxy: None,
            request_timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// The external test engine: binary, working directory and control API.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub binary_path: PathBuf,
    pub work_dir: PathBuf,
    pub config_file_name: String,
    /// Host the supervisor and prober use to reach the control API.
    pub api_host: String,
    /// Address the engine binds its control API on.
    pub bind_host: String,
    pub api_port: u16,
    pub api_secret: String,
    pub log_level: String,
    pub ready_retries: u32,
    pub ready_interval: Duration,
    /// Time allowed between SIGTERM and SIGKILL.
    pub stop_grace: Duration,
}

impl EngineSettings {
    /// Base URL of the control API as seen from this process.
    pub fn controller_url(&self) -> String {
        format!("http://{}:{}/", self.api_host, self.api_port)
    }

    /// `host:port` written into the engine config.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.api_port)
    }

    pub fn config_path(&self) -> PathBuf {
        self.work_dir.join(&self.config_file_name)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("/app/mihomo"),
            work_dir: PathBuf::from("/app/data"),
            config_file_name: "test_config.yaml".to_string(),
            api_host: "127.0.0.1".to_string(),
            bind_host: "127.0.0.1".to_string(),
            api_port: DEFAULT_API_PORT,
            api_secret: DEFAULT_API_SECRET.to_string(),
            log_level: "info".to_string(),
            ready_retries: 10,
            ready_interval: Duration::from_secs(1),
            stop_grace: Duration::from_secs(5),
        }
    }
}

/// Per-node delay measurement.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// Nodes at or above this delay are discarded.
    pub max_latency_ms: u32,
    pub target_url: String,
    /// Timeout the engine applies to its own connectivity check.
    pub engine_timeout_ms: u32,
    /// HTTP timeout for the delay query itself.
    pub request_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            max_latency_ms: DEFAULT_MAX_LATENCY_MS,
            target_url: DEFAULT_PROBE_TARGET.to_string(),
            engine_timeout_ms: 2000,
            request_timeout: Duration::from_secs(3),
        }
    }
}

/// Everything one pipeline needs.
#[derive(Debug, Clone, Default)]
pub struct PipelineSettings {
    pub sources: SourceSettings,
    pub engine: EngineSettings,
    pub probe: ProbeSettings,
    /// Merge the currently published nodes into the next run's candidates.
    pub accumulate_verified: bool,
}

impl PipelineSettings {
    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in &self.sources.urls {
            check_url("sources.urls", url)?;
        }
        if self.sources.urls.is_empty() {
            check_url("sources.mirror_prefix", &self.sources.mirror_prefix)?;
        }
        if let Some(proxy) = &self.sources.outbound_proxy {
            check_url("sources.outbound_proxy", proxy)?;
        }
        if self.sources.request_timeout.is_zero() {
            return Err(ConfigError::Zero { field: "sources.request_timeout" });
        }

        let engine = &self.engine;
        if engine.api_secret.is_empty() {
            return Err(ConfigError::Empty { field: "engine.api_secret" });
        }
        if engine.api_port == 0 {
            return Err(ConfigError::Zero { field: "engine.api_port" });
        }
        if engine.ready_retries == 0 {
            return Err(ConfigError::Zero { field: "engine.ready_retries" });
        }
        if engine.binary_path.as_os_str().is_empty() {
            return Err(ConfigError::Empty { field: "engine.binary_path" });
        }
        if engine.config_file_name.is_empty() {
            return Err(ConfigError::Empty { field: "engine.config_file_name" });
        }
        check_url("engine.controller_url", &engine.controller_url())?;

        let probe = &self.probe;
        if probe.max_latency_ms == 0 {
            return Err(ConfigError::Zero { field: "probe.max_latency_ms" });
        }
        check_url("probe.target_url", &probe.target_url)?;
        if probe.request_timeout.as_millis() <= u128::from(probe.engine_timeout_ms) {
            return Err(ConfigError::ProbeTimeouts {
                request_ms: probe.request_timeout.as_millis(),
                engine_ms: probe.engine_timeout_ms,
            });
        }
        Ok(())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineSettings::default().validate().unwrap();
    }

    #[test]
    fn fetch_policy_parses_both_spellings() {
        assert_eq!("first-success".parse::<FetchPolicy>().unwrap(), FetchPolicy::FirstSuccess);
        assert_eq!(" Aggregate-All ".parse::<FetchPolicy>().unwrap(), FetchPolicy::AggregateAll);
        assert!("random".parse::<FetchPolicy>().is_err());
    }

    #[test]
    fn rejects_empty_secret_and_bad_urls() {
        let mut s = PipelineSettings::default();
        s.engine.api_secret.clear();
        assert!(matches!(s.validate(), Err(ConfigError::Empty { .. })));

        let mut s = PipelineSettings::default();
        s.sources.urls = vec!["not a url".to_string()];
        assert!(matches!(s.validate(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn rejects_malformed_outbound_proxy() {
        let mut s = PipelineSettings::default();
        s.sources.outbound_proxy = Some("socks5 at 10.0.0.1".to_string());
        assert!(matches!(
            s.validate(),
            Err(ConfigError::InvalidUrl { field: "sources.outbound_proxy", .. })
        ));

        s.sources.outbound_proxy = Some("socks5://10.0.0.1:1080".to_string());
        s.validate().unwrap();
    }

    #[test]
    fn request_timeout_must_cover_engine_timeout() {
        let mut s = PipelineSettings::default();
        s.probe.request_timeout = Duration::from_millis(1500);
        assert!(matches!(s.validate(), Err(ConfigError::ProbeTimeouts { .. })));
    }

    #[test]
    fn controller_url_uses_api_host() {
        let e = EngineSettings::default();
        assert_eq!(e.controller_url(), "http://127.0.0.1:9090/");
        assert_eq!(e.config_path(), PathBuf::from("/app/data/test_config.yaml"));
    }
}
