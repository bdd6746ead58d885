use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use voxtype_transcribe::EngineConfig;

/// Default config file next to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "voxtype-server.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub addr: String,
    pub port: u16,
    /// Engine selection and final-text format switches.
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0".to_string(),
            port: 6016,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerSettings {
    /// Loads settings from `path`, or from `voxtype-server.toml` when no
    /// path is given and that file exists. Otherwise the defaults apply.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxtype_transcribe::RecognizeModel;

    #[test]
    fn defaults_bind_all_interfaces() {
        let settings = ServerSettings::default();
        assert_eq!(settings.addr, "0.0.0.0");
        assert_eq!(settings.port, 6016);
        assert!(settings.engine.punc_model.is_none());
    }

    #[test]
    fn parses_flattened_engine_config() {
        let raw = r#"
            addr = "127.0.0.1"
            port = 7000
            format_punc = false

            [recognize_model]
            kind = "remote"
            endpoint = "http://10.0.0.5:6017"
        "#;
        let settings: ServerSettings = toml::from_str(raw).unwrap();
        assert_eq!(settings.port, 7000);
        assert!(!settings.engine.format_punc);
        match &settings.engine.recognize_model {
            RecognizeModel::Remote { endpoint } => {
                assert_eq!(endpoint, "http://10.0.0.5:6017");
            }
            other => panic!("unexpected engine: {other:?}"),
        }
    }
}
