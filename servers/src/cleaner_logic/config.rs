use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lib_cleaner::retrieve::split_source_list;
use lib_cleaner::{FetchPolicy, PipelineSettings};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const DEFAULT_CONFIG_FILE: &str = "server_cleaner.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Proxy subscription cleaner", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "CLEANER_PORT", help = "Port the HTTP API listens on.")]
    pub port: Option<u16>,

    #[clap(long, env = "CLEANER_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "SOURCE_URLS", help = "Comma separated subscription URLs. Empty uses the dated mirror.")]
    pub source_urls: Option<String>,

    #[clap(long, env = "SOCKS5_PROXY", help = "Outbound proxy for subscription downloads.")]
    pub socks5_proxy: Option<String>,

    #[clap(long, env = "FETCH_POLICY", help = "aggregate-all or first-success.")]
    pub fetch_policy: Option<String>,

    #[clap(long, env = "CRON_INTERVAL", help = "Seconds between scheduled runs.")]
    pub cron_interval: Option<u64>,

    #[clap(long, env = "MAX_LATENCY", help = "Latency ceiling in milliseconds; slower nodes are dropped.")]
    pub max_latency: Option<u32>,

    #[clap(long, env = "MIHOMO_API_PORT", help = "Control API port of the test engine.")]
    pub mihomo_api_port: Option<u16>,

    #[clap(long, env = "MIHOMO_API_SECRET", help = "Control API secret of the test engine.")]
    pub mihomo_api_secret: Option<String>,

    #[clap(long, env = "MIHOMO_PATH", help = "Path to the test engine binary.")]
    pub mihomo_path: Option<PathBuf>,

    #[clap(long, env = "DATA_DIR", help = "Working directory for the engine and its config.")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, env = "ACCUMULATE_VERIFIED", help = "Re-test previously verified nodes with each run.")]
    pub accumulate_verified: Option<bool>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            source_urls: other.source_urls.or(self.source_urls),
            socks5_proxy: other.socks5_proxy.or(self.socks5_proxy),
            fetch_policy: other.fetch_policy.or(self.fetch_policy),
            cron_interval: other.cron_interval.or(self.cron_interval),
            max_latency: other.max_latency.or(self.max_latency),
            mihomo_api_port: other.mihomo_api_port.or(self.mihomo_api_port),
            mihomo_api_secret: other.mihomo_api_secret.or(self.mihomo_api_secret),
            mihomo_path: other.mihomo_path.or(self.mihomo_path),
            data_dir: other.data_dir.or(self.data_dir),
            accumulate_verified: other.accumulate_verified.or(self.accumulate_verified),
        }
    }

    fn defaults() -> Config {
        let pipeline = PipelineSettings::default();
        Config {
            port: Some(8000),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            fetch_policy: Some(FetchPolicy::default().to_string()),
            cron_interval: Some(3600),
            max_latency: Some(pipeline.probe.max_latency_ms),
            mihomo_api_port: Some(pipeline.engine.api_port),
            mihomo_api_secret: Some(pipeline.engine.api_secret),
            mihomo_path: Some(pipeline.engine.binary_path),
            data_dir: Some(pipeline.engine.work_dir),
            accumulate_verified: Some(false),
            ..Default::default()
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(8000)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn cron_interval(&self) -> Duration {
        Duration::from_secs(self.cron_interval.unwrap_or(3600).max(1))
    }

    /// Translates the flat server config into pipeline settings.
    ///
    /// Unset fields keep the library defaults. The result is not
    /// validated here; `Pipeline::new` does that.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        let mut settings = PipelineSettings::default();

        if let Some(raw) = &self.source_urls {
            settings.sources.urls = split_source_list(raw);
        }
        settings.sources.outbound_proxy = self
            .socks5_proxy
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        if let Some(policy) = &self.fetch_policy {
            settings.sources.policy = policy.parse().context("Invalid FETCH_POLICY")?;
        }

        if let Some(port) = self.mihomo_api_port {
            settings.engine.api_port = port;
        }
        if let Some(secret) = &self.mihomo_api_secret {
            settings.engine.api_secret = secret.clone();
        }
        if let Some(path) = &self.mihomo_path {
            settings.engine.binary_path = path.clone();
        }
        if let Some(dir) = &self.data_dir {
            settings.engine.work_dir = dir.clone();
        }

        if let Some(ms) = self.max_latency {
            settings.probe.max_latency_ms = ms;
        }
        settings.accumulate_verified = self.accumulate_verified.unwrap_or(false);

        Ok(settings)
    }
}

/// Layers defaults, the optional JSON config file, then env/CLI values.
pub fn load_config() -> Config {
    load_config_from(Config::parse())
}

pub fn load_config_from(cli_args: Config) -> Config {
    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();

    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => current_config = current_config.merge(file_config),
                Err(e) => warn!(
                    "Failed to parse config file {}: {}. Falling back to other sources.",
                    config_file_path.display(),
                    e
                ),
            },
            Err(e) => warn!(
                "Failed to read config file {}: {}. Falling back to other sources.",
                config_file_path.display(),
                e
            ),
        }
    } else {
        info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        );
    }

    current_config.merge(cli_args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_cli(config_path: PathBuf) -> Config {
        Config { config_path: Some(config_path), ..Default::default() }
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(empty_cli(dir.path().join("absent.conf")));

        assert_eq!(config.port(), 8000);
        assert_eq!(config.cron_interval(), Duration::from_secs(3600));
        let settings = config.pipeline_settings().unwrap();
        assert_eq!(settings.probe.max_latency_ms, 1500);
        assert_eq!(settings.engine.api_port, 9090);
        assert!(settings.sources.urls.is_empty());
        assert!(!settings.accumulate_verified);
    }

    #[test]
    fn file_overrides_defaults_and_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cleaner.conf");
        fs::write(
            &path,
            r#"{"maxLatency": 800, "sourceUrls": "http://a/1, http://b/2", "port": 8100}"#,
        )
        .unwrap();

        let cli = Config { port: Some(9100), ..empty_cli(path) };
        let config = load_config_from(cli);

        assert_eq!(config.port(), 9100);
        let settings = config.pipeline_settings().unwrap();
        assert_eq!(settings.probe.max_latency_ms, 800);
        assert_eq!(settings.sources.urls, vec!["http://a/1", "http://b/2"]);
    }

    #[test]
    fn unparseable_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.conf");
        fs::write(&path, "{not json").unwrap();

        let config = load_config_from(empty_cli(path));
        assert_eq!(config.max_latency, Some(1500));
    }

    #[test]
    fn blank_proxy_means_direct_and_bad_policy_is_rejected() {
        let config = Config {
            socks5_proxy: Some("  ".into()),
            fetch_policy: Some("first-success".into()),
            ..Default::default()
        };
        let settings = config.pipeline_settings().unwrap();
        assert!(settings.sources.outbound_proxy.is_none());
        assert_eq!(settings.sources.policy, FetchPolicy::FirstSuccess);

        let bad = Config { fetch_policy: Some("sometimes".into()), ..Default::default() };
        assert!(bad.pipeline_settings().is_err());
    }
}
