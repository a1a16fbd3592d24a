//! # Engine Configuration
//!
//! The engine reads a YAML file at startup. The file enables the control
//! API on a known port behind a shared secret, forces `global` mode so
//! every delay query goes through exactly the proxy named in the request,
//! and lists the candidates as its proxies. Node fields are passed through
//! untouched; malformed entries surface as an engine start failure.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::configs::EngineSettings;
use crate::core::dedup::CandidateSet;
use crate::errors::EngineError;
use crate::model::NodeDescriptor;

/// Test mode: all traffic through the selected proxy.
pub const ENGINE_MODE: &str = "global";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(rename = "log-level")]
    pub log_level: String,
    #[serde(rename = "external-controller")]
    pub external_controller: String,
    pub secret: String,
    pub mode: String,
    pub proxies: Vec<NodeDescriptor>,
}

impl EngineConfig {
    pub fn build(settings: &EngineSettings, candidates: &CandidateSet) -> Self {
        Self {
            log_level: settings.log_level.clone(),
            external_controller: settings.bind_address(),
            secret: settings.api_secret.clone(),
            mode: ENGINE_MODE.to_string(),
            proxies: candidates.as_slice().to_vec(),
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yml::Error> {
        serde_yml::to_string(self)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(text)
    }

    /// Writes the config to `path`, replacing the previous run's file and
    /// creating the parent directory if needed.
    pub fn write(&self, path: &Path) -> Result<(), EngineError> {
        let yaml = self.to_yaml().map_err(EngineError::ConfigRender)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(EngineError::ConfigWrite)?;
        }
        std::fs::write(path, yaml).map_err(EngineError::ConfigWrite)?;
        info!(path = %path.display(), proxies = self.proxies.len(), "Engine config written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::core::dedup::deduplicate;

    fn candidates() -> CandidateSet {
        let raw: Vec<NodeDescriptor> = serde_yml::from_str(
            "- {name: a, type: ss, server: 1.2.3.4, port: 8388, cipher: chacha20-ietf-poly1305, password: p}\n\
             - {name: b, type: vmess, server: v.example, port: 443, uuid: u, ws-opts: {path: /ray}}\n\
             - {name: c, type: ss, server: 1.2.3.4, port: 8388}\n",
        )
        .unwrap();
        deduplicate(raw)
    }

    #[test]
    fn carries_control_parameters() {
        let settings = EngineSettings {
            api_port: 19090,
            api_secret: "s3cret".into(),
            ..EngineSettings::default()
        };
        let cfg = EngineConfig::build(&settings, &candidates());
        assert_eq!(cfg.mode, "global");
        assert_eq!(cfg.external_controller, "127.0.0.1:19090");
        assert_eq!(cfg.secret, "s3cret");
        assert_eq!(cfg.proxies.len(), 2);

        let yaml = cfg.to_yaml().unwrap();
        assert!(yaml.contains("external-controller"));
        assert!(yaml.contains("log-level"));
    }

    #[test]
    fn identity_set_survives_a_file_round_trip() {
        let set = candidates();
        let dir = tempfile::tempdir().unwrap();
        let cfg = EngineConfig::build(&EngineSettings::default(), &set);
        let path = dir.path().join("nested").join("test_config.yaml");
        cfg.write(&path).unwrap();

        let back = EngineConfig::from_yaml(&std::fs::read_to_string(path).unwrap()).unwrap();
        let before: BTreeSet<String> = set.identities().into_iter().collect();
        let after: BTreeSet<String> = back.proxies.iter().map(NodeDescriptor::identity).collect();
        assert_eq!(before, after);
        // Opaque transport options are passed through.
        assert_eq!(back.proxies, cfg.proxies);
    }

    #[test]
    fn unwritable_location_is_a_config_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("plain-file");
        std::fs::write(&blocker, "x").unwrap();

        let cfg = EngineConfig::build(&EngineSettings::default(), &candidates());
        let err = cfg.write(&blocker.join("test_config.yaml")).unwrap_err();
        assert!(matches!(err, EngineError::ConfigWrite(_)));
    }
}
