use super::{AgentConfig, LogLevel, LoggingConfig, ProxyConfig};
use crate::agents::AgentId;
use crate::error::{Result, VibePodError};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SUPPORTED_VERSION: u64 = 1;

/// One sparse configuration layer: a config file or the environment.
///
/// Every key is optional; unset keys fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialConfig {
    pub default_agent: Option<AgentId>,
    pub auto_pull: Option<bool>,
    pub auto_remove: Option<bool>,
    pub network: Option<String>,
    pub log_level: Option<LogLevel>,
    pub no_color: Option<bool>,
    pub agents: BTreeMap<AgentId, PartialAgentConfig>,
    pub logging: PartialLoggingConfig,
    pub proxy: PartialProxyConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartialAgentConfig {
    pub enabled: Option<bool>,
    pub image: Option<String>,
    #[serde(deserialize_with = "scalar_env")]
    pub env: Option<BTreeMap<String, String>>,
    pub volumes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartialLoggingConfig {
    pub enabled: Option<bool>,
    pub image: Option<String>,
    pub db_path: Option<PathBuf>,
    pub ui_port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartialProxyConfig {
    pub enabled: Option<bool>,
    pub image: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    pub ca_dir: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
}

impl PartialConfig {
    /// Read a layer from disk. A missing file is not an error.
    pub fn load_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&path.display().to_string(), &content).map(Some)
    }

    /// Parse YAML text. `source` names the layer in error messages.
    pub fn parse(source: &str, content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| parse_error(source, e.to_string()))?;
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(map) => map,
            other => {
                return Err(parse_error(
                    source,
                    format!("expected a mapping at the top level, found {}", kind(&other)),
                ))
            }
        };

        check_version(source, map.get("version"))?;

        let default_agent = field::<String>(&map, "default_agent", source)?
            .map(|name| {
                name.parse::<AgentId>()
                    .map_err(|e| parse_error(source, format!("default_agent: {}", e)))
            })
            .transpose()?;

        Ok(Self {
            default_agent,
            auto_pull: field(&map, "auto_pull", source)?,
            auto_remove: field(&map, "auto_remove", source)?,
            network: field(&map, "network", source)?,
            log_level: field(&map, "log_level", source)?,
            no_color: field(&map, "no_color", source)?,
            agents: parse_agents(&map, source)?,
            logging: field(&map, "logging", source)?.unwrap_or_default(),
            proxy: field(&map, "proxy", source)?.unwrap_or_default(),
        })
    }
}

impl PartialAgentConfig {
    pub(super) fn apply_to(self, target: &mut AgentConfig) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(image) = self.image {
            target.image = image;
        }
        if let Some(env) = self.env {
            target.env.extend(env);
        }
        if let Some(volumes) = self.volumes {
            target.volumes = volumes;
        }
    }
}

impl PartialLoggingConfig {
    pub(super) fn apply_to(self, target: &mut LoggingConfig) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(image) = self.image {
            target.image = image;
        }
        if let Some(db_path) = self.db_path {
            target.db_path = db_path;
        }
        if let Some(ui_port) = self.ui_port {
            target.ui_port = ui_port;
        }
    }
}

impl PartialProxyConfig {
    pub(super) fn apply_to(self, target: &mut ProxyConfig) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(image) = self.image {
            target.image = image;
        }
        if let Some(port) = self.port {
            target.port = port;
        }
        if let Some(db_path) = self.db_path {
            target.db_path = db_path;
        }
        if let Some(ca_dir) = self.ca_dir {
            target.ca_dir = ca_dir;
        }
        if let Some(ca_path) = self.ca_path {
            target.ca_path = ca_path;
        }
    }
}

fn parse_error(source: &str, message: String) -> VibePodError {
    VibePodError::ConfigParse {
        path: source.to_string(),
        message,
    }
}

fn check_version(source: &str, version: Option<&Value>) -> Result<()> {
    match version {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Number(n)) if n.as_u64() == Some(SUPPORTED_VERSION) => Ok(()),
        Some(Value::String(s)) if s.trim() == SUPPORTED_VERSION.to_string() => Ok(()),
        Some(other) => Err(VibePodError::ConfigVersion {
            path: source.to_string(),
            found: serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| format!("{:?}", other)),
        }),
    }
}

/// Deserialize one top-level key, naming it in the error.
fn field<T: DeserializeOwned>(map: &Mapping, key: &str, source: &str) -> Result<Option<T>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_yaml::from_value(value.clone())
            .map(Some)
            .map_err(|e| parse_error(source, format!("{}: {}", key, e))),
    }
}

fn parse_agents(map: &Mapping, source: &str) -> Result<BTreeMap<AgentId, PartialAgentConfig>> {
    let mut agents = BTreeMap::new();
    let entries = match map.get("agents") {
        None | Some(Value::Null) => return Ok(agents),
        Some(Value::Mapping(entries)) => entries,
        Some(other) => {
            return Err(parse_error(
                source,
                format!("agents: expected a mapping, found {}", kind(other)),
            ))
        }
    };

    for (key, value) in entries {
        let name = key.as_str().unwrap_or_default();
        let id: AgentId = name
            .parse()
            .map_err(|e| parse_error(source, format!("agents: {}", e)))?;
        let partial = match value {
            Value::Null => PartialAgentConfig::default(),
            value => serde_yaml::from_value(value.clone())
                .map_err(|e| parse_error(source, format!("agents.{}: {}", id, e)))?,
        };
        agents.insert(id, partial);
    }

    Ok(agents)
}

/// Env values may be written as any YAML scalar; containers only see strings.
fn scalar_env<'de, D>(deserializer: D) -> std::result::Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Null => String::new(),
                other => {
                    return Err(D::Error::custom(format!(
                        "env value for '{}' must be a scalar, found {}",
                        key,
                        kind(&other)
                    )))
                }
            };
            Ok((key, value))
        })
        .collect::<std::result::Result<_, _>>()
        .map(Some)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
