use super::definition::AgentId;
use super::registry::AgentRegistry;
use crate::config::{EffectiveConfig, EnvMap};
use std::fmt;

pub const AGENT_NAMESPACE: &str = "nezhar";
pub const SIDECAR_NAMESPACE: &str = "vibepod";
pub const NAMESPACE_ENV: &str = "VP_IMAGE_NAMESPACE";

/// A fully qualified image reference, e.g. `nezhar/claude-container:latest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Namespace for default images, honouring `VP_IMAGE_NAMESPACE`.
pub fn namespace(env: &EnvMap, fallback: &str) -> String {
    env.get(NAMESPACE_ENV)
        .map(|ns| ns.trim().trim_end_matches('/'))
        .filter(|ns| !ns.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

pub fn image_env_var(agent: AgentId) -> String {
    format!("VP_IMAGE_{}", agent.env_suffix())
}

/// Default image for an agent when nothing overrides it.
pub fn default_image(agent: AgentId, env: &EnvMap) -> String {
    format!(
        "{}/{}",
        namespace(env, AGENT_NAMESPACE),
        AgentRegistry::spec(agent).repository
    )
}

/// Default image for a sidecar repository such as `datasette:latest`.
pub fn default_sidecar_image(repository: &str, env: &EnvMap) -> String {
    format!("{}/{}", namespace(env, SIDECAR_NAMESPACE), repository)
}

/// Pick the image an agent container is created from.
///
/// Precedence: `VP_IMAGE_<AGENT>`, then `agents.<id>.image`, then the
/// namespaced default. Explicit references are used verbatim.
pub fn resolve_image(agent: AgentId, config: &EffectiveConfig, env: &EnvMap) -> ImageRef {
    if let Some(image) = env
        .get(&image_env_var(agent))
        .filter(|value| !value.trim().is_empty())
    {
        return ImageRef::new(image.trim());
    }

    match config.agents.get(&agent) {
        Some(agent_config) if !agent_config.image.trim().is_empty() => {
            ImageRef::new(agent_config.image.trim())
        }
        _ => ImageRef::new(default_image(agent, env)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, ConfigPaths};
    use std::path::PathBuf;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn defaults(env: &EnvMap) -> EffectiveConfig {
        config::defaults(&ConfigPaths::new(PathBuf::from("/cfg")), env)
    }

    #[test]
    fn test_default_image_uses_agent_namespace() {
        let env = EnvMap::new();
        let image = resolve_image(AgentId::Claude, &defaults(&env), &env);
        assert_eq!(image.as_str(), "nezhar/claude-container:latest");
    }

    #[test]
    fn test_namespace_override_applies_to_defaults() {
        let env = env(&[("VP_IMAGE_NAMESPACE", "myorg")]);
        let image = resolve_image(AgentId::Codex, &defaults(&env), &env);
        assert_eq!(image.as_str(), "myorg/codex-cli:latest");
    }

    #[test]
    fn test_config_image_beats_default() {
        let env = EnvMap::new();
        let mut config = defaults(&env);
        config.agents.get_mut(&AgentId::Claude).unwrap().image = "custom/claude:1".into();
        let image = resolve_image(AgentId::Claude, &config, &env);
        assert_eq!(image.as_str(), "custom/claude:1");
    }

    #[test]
    fn test_env_image_beats_config() {
        let env = env(&[("VP_IMAGE_CLAUDE", "mine/claude:dev")]);
        let mut config = defaults(&EnvMap::new());
        config.agents.get_mut(&AgentId::Claude).unwrap().image = "custom/claude:1".into();
        let image = resolve_image(AgentId::Claude, &config, &env);
        assert_eq!(image.as_str(), "mine/claude:dev");
    }

    #[test]
    fn test_namespace_never_rewrites_explicit_image() {
        let env = env(&[
            ("VP_IMAGE_NAMESPACE", "myorg"),
            ("VP_IMAGE_GEMINI", "ghcr.io/x/gemini:2"),
        ]);
        let image = resolve_image(AgentId::Gemini, &defaults(&env), &env);
        assert_eq!(image.as_str(), "ghcr.io/x/gemini:2");
    }

    #[test]
    fn test_sidecar_namespace() {
        assert_eq!(
            default_sidecar_image("proxy:latest", &EnvMap::new()),
            "vibepod/proxy:latest"
        );
        assert_eq!(
            default_sidecar_image("proxy:latest", &env(&[("VP_IMAGE_NAMESPACE", "acme/")])),
            "acme/proxy:latest"
        );
    }
}
