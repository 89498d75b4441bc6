use super::EnvMap;
use crate::agents::AgentId;
use crate::error::{Result, VibePodError};
use crate::utils::path::expand_tilde;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_ENV: &str = "VP_CONFIG_DIR";
pub const CONFIG_FILE: &str = "config.yaml";
pub const PROJECT_DIR: &str = ".vibepod";

/// On-disk layout rooted at the VibePod config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    root: PathBuf,
}

impl ConfigPaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// `VP_CONFIG_DIR` when set (tilde-expanded, relative to `cwd`),
    /// otherwise `<user config dir>/vibepod`.
    pub fn from_env(env: &EnvMap, cwd: &Path) -> Result<Self> {
        if let Some(custom) = env.get(CONFIG_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            let expanded = expand_tilde(custom.trim()).ok_or_else(|| {
                VibePodError::InvalidArgument(format!(
                    "Cannot expand {}={}",
                    CONFIG_DIR_ENV, custom
                ))
            })?;
            let root = if expanded.is_absolute() {
                expanded
            } else {
                cwd.join(expanded)
            };
            return Ok(Self::new(root));
        }

        let base = dirs::config_dir().ok_or_else(|| {
            VibePodError::InvalidArgument(format!(
                "Cannot determine the user config directory; set {}",
                CONFIG_DIR_ENV
            ))
        })?;
        Ok(Self::new(base.join("vibepod")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn global_config(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn project_config(workspace: &Path) -> PathBuf {
        workspace.join(PROJECT_DIR).join(CONFIG_FILE)
    }

    /// Host directory holding an agent's credentials and settings.
    pub fn agent_dir(&self, agent: AgentId) -> PathBuf {
        self.root.join("agents").join(agent.as_str())
    }

    pub fn logs_db(&self) -> PathBuf {
        self.root.join("logs.db")
    }

    pub fn proxy_dir(&self) -> PathBuf {
        self.root.join("proxy")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.root.join("agents"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_dir() {
        let env: EnvMap = [(CONFIG_DIR_ENV.to_string(), "/tmp/vp".to_string())].into();
        let paths = ConfigPaths::from_env(&env, Path::new("/work")).unwrap();
        assert_eq!(paths.root(), Path::new("/tmp/vp"));
        assert_eq!(paths.global_config(), PathBuf::from("/tmp/vp/config.yaml"));
        assert_eq!(
            paths.agent_dir(AgentId::Claude),
            PathBuf::from("/tmp/vp/agents/claude")
        );
    }

    #[test]
    fn test_relative_config_dir_is_anchored_at_cwd() {
        let env: EnvMap = [(CONFIG_DIR_ENV.to_string(), "cfg".to_string())].into();
        let paths = ConfigPaths::from_env(&env, Path::new("/work")).unwrap();
        assert_eq!(paths.root(), Path::new("/work/cfg"));
    }

    #[test]
    fn test_project_config_location() {
        assert_eq!(
            ConfigPaths::project_config(Path::new("/repo")),
            PathBuf::from("/repo/.vibepod/config.yaml")
        );
    }
}
