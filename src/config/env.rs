//! Environment variable layer (`VP_*`).

use super::partial::PartialConfig;
use super::{EnvMap, LogLevel};
use crate::agents::AgentId;
use crate::agents::image::image_env_var;
use crate::error::{Result, VibePodError};
use std::str::FromStr;

/// Capture the `VP_*` variables of the current process.
pub fn snapshot() -> EnvMap {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .filter(|(key, _)| key.starts_with("VP_"))
        .collect()
}

/// `true`, `1`, `yes` and `on` (any case) are true; everything else is false.
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_value<T>(var: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| VibePodError::ConfigParse {
        path: format!("environment variable {}", var),
        message: format!("invalid value '{}': {}", raw, e),
    })
}

/// Build the highest-precedence layer from the environment table.
/// Unrecognized variables are ignored.
pub fn layer(env: &EnvMap) -> Result<PartialConfig> {
    let mut layer = PartialConfig::default();

    if let Some(raw) = env.get("VP_DEFAULT_AGENT") {
        layer.default_agent = Some(raw.parse::<AgentId>()?);
    }
    if let Some(raw) = env.get("VP_AUTO_PULL") {
        layer.auto_pull = Some(parse_bool(raw));
    }
    if let Some(raw) = env.get("VP_LOG_LEVEL") {
        layer.log_level = Some(parse_value::<LogLevel>("VP_LOG_LEVEL", raw)?);
    }
    if let Some(raw) = env.get("VP_NO_COLOR") {
        layer.no_color = Some(parse_bool(raw));
    }
    if let Some(raw) = env.get("VP_DATASETTE_PORT") {
        layer.logging.ui_port = Some(parse_value("VP_DATASETTE_PORT", raw)?);
    }
    if let Some(raw) = env.get("VP_DATASETTE_IMAGE") {
        layer.logging.image = Some(raw.trim().to_string());
    }
    if let Some(raw) = env.get("VP_PROXY_ENABLED") {
        layer.proxy.enabled = Some(parse_bool(raw));
    }
    if let Some(raw) = env.get("VP_PROXY_PORT") {
        layer.proxy.port = Some(parse_value("VP_PROXY_PORT", raw)?);
    }
    if let Some(raw) = env.get("VP_PROXY_IMAGE") {
        layer.proxy.image = Some(raw.trim().to_string());
    }

    for agent in AgentId::ALL {
        if let Some(image) = env
            .get(&image_env_var(agent))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
        {
            layer.agents.entry(agent).or_default().image = Some(image.to_string());
        }
    }

    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_bool() {
        for truthy in ["true", "TRUE", "1", "yes", "On"] {
            assert!(parse_bool(truthy), "{truthy}");
        }
        for falsy in ["false", "0", "no", "off", "", "maybe"] {
            assert!(!parse_bool(falsy), "{falsy}");
        }
    }

    #[test]
    fn test_layer_maps_table() {
        let layer = layer(&env(&[
            ("VP_DEFAULT_AGENT", "codex"),
            ("VP_AUTO_PULL", "yes"),
            ("VP_LOG_LEVEL", "DEBUG"),
            ("VP_DATASETTE_PORT", "9100"),
            ("VP_PROXY_ENABLED", "false"),
            ("VP_PROXY_PORT", "3128"),
            ("VP_IMAGE_GEMINI", "me/gemini:dev"),
            ("VP_SOMETHING_ELSE", "ignored"),
        ]))
        .unwrap();

        assert_eq!(layer.default_agent, Some(AgentId::Codex));
        assert_eq!(layer.auto_pull, Some(true));
        assert_eq!(layer.log_level, Some(LogLevel::Debug));
        assert_eq!(layer.logging.ui_port, Some(9100));
        assert_eq!(layer.proxy.enabled, Some(false));
        assert_eq!(layer.proxy.port, Some(3128));
        assert_eq!(
            layer.agents[&AgentId::Gemini].image.as_deref(),
            Some("me/gemini:dev")
        );
        assert_eq!(layer.agents.len(), 1);
    }

    #[test]
    fn test_bad_port_names_variable() {
        let err = layer(&env(&[("VP_DATASETTE_PORT", "eighty")])).unwrap_err();
        match err {
            VibePodError::ConfigParse { path, .. } => {
                assert_eq!(path, "environment variable VP_DATASETTE_PORT")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bad_log_level() {
        assert!(layer(&env(&[("VP_LOG_LEVEL", "verbose")])).is_err());
    }

    #[test]
    fn test_unknown_default_agent() {
        let err = layer(&env(&[("VP_DEFAULT_AGENT", "cursor")])).unwrap_err();
        assert!(matches!(err, VibePodError::UnknownAgent { .. }));
    }

    #[test]
    #[serial_test::serial]
    fn test_snapshot_keeps_only_vp_vars() {
        std::env::set_var("VP_SNAPSHOT_PROBE", "1");
        let snap = snapshot();
        std::env::remove_var("VP_SNAPSHOT_PROBE");

        assert_eq!(snap.get("VP_SNAPSHOT_PROBE").map(String::as_str), Some("1"));
        assert!(snap.keys().all(|k| k.starts_with("VP_")));
    }
}
