//! Layered configuration.
//!
//! Precedence, lowest to highest:
//! 1. Built-in defaults
//! 2. Global config (`<config root>/config.yaml`)
//! 3. Project config (`<workspace>/.vibepod/config.yaml`)
//! 4. Environment variables (`VP_*`)
//!
//! Layers are sparse [`PartialConfig`]s folded onto the defaults by
//! [`resolve`]. Maps merge key by key; scalars and sequences are replaced.

pub mod env;
pub mod partial;
pub mod paths;

pub use partial::PartialConfig;
pub use paths::ConfigPaths;

use crate::agents::image::{default_image, default_sidecar_image};
use crate::agents::AgentId;
use crate::error::{Result, VibePodError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Snapshot of the process environment handed to the pure resolvers.
pub type EnvMap = BTreeMap<String, String>;

pub const DEFAULT_NETWORK: &str = "vibepod-network";
pub const DEFAULT_UI_PORT: u16 = 8001;
pub const DEFAULT_PROXY_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!(
                "unknown log level '{}' (expected debug, info, warning or error)",
                other
            )),
        }
    }
}

/// Fully defaulted configuration. Every supported agent has an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub version: u64,
    pub default_agent: AgentId,
    pub auto_pull: bool,
    pub auto_remove: bool,
    pub network: String,
    pub log_level: LogLevel,
    pub no_color: bool,
    pub agents: BTreeMap<AgentId, AgentConfig>,
    pub logging: LoggingConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentConfig {
    pub enabled: bool,
    pub image: String,
    pub env: BTreeMap<String, String>,
    /// Mount specs, `/host[:/container][:ro|rw]`.
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub image: String,
    pub db_path: PathBuf,
    pub ui_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub image: String,
    /// Port the proxy listens on inside the shared network.
    pub port: u16,
    pub db_path: PathBuf,
    pub ca_dir: PathBuf,
    pub ca_path: PathBuf,
}

impl ProxyConfig {
    /// Directory mounted at `/data` in the proxy container.
    pub fn data_dir(&self) -> PathBuf {
        self.db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.ca_dir.clone())
    }
}

/// Built-in defaults. `env` only shapes the image namespace.
pub fn defaults(paths: &ConfigPaths, env: &EnvMap) -> EffectiveConfig {
    let agents = AgentId::ALL
        .into_iter()
        .map(|id| {
            let config = AgentConfig {
                enabled: true,
                image: default_image(id, env),
                env: BTreeMap::new(),
                volumes: Vec::new(),
            };
            (id, config)
        })
        .collect();

    let proxy_dir = paths.proxy_dir();
    let ca_dir = proxy_dir.join("mitmproxy");

    EffectiveConfig {
        version: partial::SUPPORTED_VERSION,
        default_agent: AgentId::Claude,
        auto_pull: false,
        auto_remove: true,
        network: DEFAULT_NETWORK.to_string(),
        log_level: LogLevel::Info,
        no_color: false,
        agents,
        logging: LoggingConfig {
            enabled: true,
            image: default_sidecar_image("datasette:latest", env),
            db_path: paths.logs_db(),
            ui_port: DEFAULT_UI_PORT,
        },
        proxy: ProxyConfig {
            enabled: true,
            image: default_sidecar_image("proxy:latest", env),
            port: DEFAULT_PROXY_PORT,
            db_path: proxy_dir.join("proxy.db"),
            ca_path: ca_dir.join("mitmproxy-ca-cert.pem"),
            ca_dir,
        },
    }
}

/// Fold the layers onto `defaults`: global, then project, then environment.
pub fn resolve(
    defaults: EffectiveConfig,
    global: Option<PartialConfig>,
    project: Option<PartialConfig>,
    env: &EnvMap,
) -> Result<EffectiveConfig> {
    let env_layer = env::layer(env)?;

    let mut config = defaults;
    for layer in [global, project, Some(env_layer)].into_iter().flatten() {
        config.apply(layer);
    }
    Ok(config)
}

/// Read both config files and resolve them against the environment.
pub fn load(paths: &ConfigPaths, workspace: &Path, env: &EnvMap) -> Result<EffectiveConfig> {
    let global = PartialConfig::load_file(&paths.global_config())?;
    let project = PartialConfig::load_file(&ConfigPaths::project_config(workspace))?;
    tracing::debug!(
        global = global.is_some(),
        project = project.is_some(),
        "loaded config layers"
    );
    resolve(defaults(paths, env), global, project, env)
}

impl EffectiveConfig {
    fn apply(&mut self, layer: PartialConfig) {
        if let Some(agent) = layer.default_agent {
            self.default_agent = agent;
        }
        if let Some(auto_pull) = layer.auto_pull {
            self.auto_pull = auto_pull;
        }
        if let Some(auto_remove) = layer.auto_remove {
            self.auto_remove = auto_remove;
        }
        if let Some(network) = layer.network {
            self.network = network;
        }
        if let Some(level) = layer.log_level {
            self.log_level = level;
        }
        if let Some(no_color) = layer.no_color {
            self.no_color = no_color;
        }
        for (id, partial) in layer.agents {
            if let Some(agent) = self.agents.get_mut(&id) {
                partial.apply_to(agent);
            }
        }
        layer.logging.apply_to(&mut self.logging);
        layer.proxy.apply_to(&mut self.proxy);
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentConfig> {
        self.agents.get(&id)
    }

    /// Pick the agent to run.
    ///
    /// An explicit name is always honoured. Otherwise the default agent is
    /// used when enabled, falling back to the first enabled agent.
    pub fn select_agent(&self, requested: Option<&str>) -> Result<AgentId> {
        if let Some(name) = requested {
            return name.parse();
        }

        let enabled = |id: &AgentId| self.agents.get(id).map_or(true, |a| a.enabled);
        if enabled(&self.default_agent) {
            return Ok(self.default_agent);
        }

        let fallback = AgentId::ALL.into_iter().find(|id| enabled(id));
        match fallback {
            Some(id) => {
                tracing::info!(
                    default = %self.default_agent,
                    using = %id,
                    "default agent is disabled, using first enabled agent"
                );
                Ok(id)
            }
            None => Err(VibePodError::InvalidArgument(
                "All agents are disabled; set agents.<id>.enabled to true".to_string(),
            )),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| VibePodError::ConfigParse {
            path: "<effective config>".to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> ConfigPaths {
        ConfigPaths::new(PathBuf::from("/cfg"))
    }

    fn layer(yaml: &str) -> PartialConfig {
        PartialConfig::parse("test", yaml).unwrap()
    }

    #[test]
    fn test_defaults_are_fully_populated() {
        let config = defaults(&paths(), &EnvMap::new());
        assert_eq!(config.version, 1);
        assert_eq!(config.default_agent, AgentId::Claude);
        assert!(!config.auto_pull);
        assert!(config.auto_remove);
        assert_eq!(config.network, "vibepod-network");
        assert_eq!(config.agents.len(), AgentId::ALL.len());
        assert_eq!(config.logging.db_path, PathBuf::from("/cfg/logs.db"));
        assert_eq!(config.logging.image, "vibepod/datasette:latest");
        assert_eq!(
            config.proxy.ca_path,
            PathBuf::from("/cfg/proxy/mitmproxy/mitmproxy-ca-cert.pem")
        );
        assert_eq!(config.proxy.data_dir(), PathBuf::from("/cfg/proxy"));
    }

    #[test]
    fn test_project_beats_global() {
        let config = resolve(
            defaults(&paths(), &EnvMap::new()),
            Some(layer("default_agent: gemini\nauto_pull: true\n")),
            Some(layer("default_agent: codex\n")),
            &EnvMap::new(),
        )
        .unwrap();
        assert_eq!(config.default_agent, AgentId::Codex);
        // Unset in project, so the global value falls through.
        assert!(config.auto_pull);
    }

    #[test]
    fn test_env_beats_files() {
        let env: EnvMap = [("VP_DEFAULT_AGENT".to_string(), "opencode".to_string())].into();
        let config = resolve(
            defaults(&paths(), &env),
            Some(layer("default_agent: gemini\n")),
            Some(layer("default_agent: codex\n")),
            &env,
        )
        .unwrap();
        assert_eq!(config.default_agent, AgentId::Opencode);
    }

    #[test]
    fn test_agent_env_merges_key_wise() {
        let config = resolve(
            defaults(&paths(), &EnvMap::new()),
            Some(layer("agents:\n  claude:\n    env:\n      A: '1'\n      B: '2'\n")),
            Some(layer("agents:\n  claude:\n    env:\n      B: '3'\n      C: '4'\n")),
            &EnvMap::new(),
        )
        .unwrap();

        let env = &config.agents[&AgentId::Claude].env;
        let expected: BTreeMap<String, String> = [("A", "1"), ("B", "3"), ("C", "4")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(env, &expected);
    }

    #[test]
    fn test_volumes_replace_wholesale() {
        let config = resolve(
            defaults(&paths(), &EnvMap::new()),
            Some(layer("agents:\n  claude:\n    volumes: ['/a:/a', '/b:/b']\n")),
            Some(layer("agents:\n  claude:\n    volumes: ['/c:/c']\n")),
            &EnvMap::new(),
        )
        .unwrap();
        assert_eq!(config.agents[&AgentId::Claude].volumes, vec!["/c:/c".to_string()]);
    }

    #[test]
    fn test_auto_pull_from_env_without_files() {
        let env: EnvMap = [("VP_AUTO_PULL".to_string(), "true".to_string())].into();
        let config = resolve(defaults(&paths(), &env), None, None, &env).unwrap();
        assert!(config.auto_pull);
        let mut expected = defaults(&paths(), &env);
        expected.auto_pull = true;
        assert_eq!(config, expected);
    }

    #[test]
    fn test_show_round_trip() {
        let env = EnvMap::new();
        let original = resolve(
            defaults(&paths(), &env),
            Some(layer("auto_pull: true\nagents:\n  codex:\n    enabled: false\n    env: {X: 'y'}\n")),
            None,
            &env,
        )
        .unwrap();

        let shown = original.to_yaml().unwrap();
        let reparsed = resolve(
            defaults(&paths(), &env),
            None,
            Some(PartialConfig::parse("shown", &shown).unwrap()),
            &env,
        )
        .unwrap();
        assert_eq!(reparsed, original);
    }

    #[test]
    fn test_select_agent_skips_disabled_default() {
        let config = resolve(
            defaults(&paths(), &EnvMap::new()),
            Some(layer("agents:\n  claude:\n    enabled: false\n")),
            None,
            &EnvMap::new(),
        )
        .unwrap();
        assert_eq!(config.select_agent(None).unwrap(), AgentId::Gemini);
        // Explicit requests ignore `enabled`.
        assert_eq!(config.select_agent(Some("claude")).unwrap(), AgentId::Claude);
    }

    #[test]
    fn test_select_agent_all_disabled() {
        let mut config = defaults(&paths(), &EnvMap::new());
        for agent in config.agents.values_mut() {
            agent.enabled = false;
        }
        assert!(matches!(
            config.select_agent(None),
            Err(VibePodError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!(LogLevel::Warning.as_filter(), "warn");
        assert_eq!(LogLevel::Warning.to_string(), "warning");
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_load_reads_both_files() {
        let root = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(root.path().to_path_buf());

        std::fs::write(paths.global_config(), "version: 1\nnetwork: global-net\n").unwrap();
        let project = ConfigPaths::project_config(workspace.path());
        std::fs::create_dir_all(project.parent().unwrap()).unwrap();
        std::fs::write(&project, "log_level: error\n").unwrap();

        let config = load(&paths, workspace.path(), &EnvMap::new()).unwrap();
        assert_eq!(config.network, "global-net");
        assert_eq!(config.log_level, LogLevel::Error);
    }
}
