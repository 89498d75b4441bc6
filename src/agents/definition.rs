//! Agent identifiers and their static launch descriptions.

use crate::error::{Result, VibePodError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of agents VibePod knows how to launch.
///
/// Declaration order is the canonical display order (`vp list`, error hints).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentId {
    Claude,
    Gemini,
    Opencode,
    Devstral,
    Auggie,
    Copilot,
    Codex,
}

impl AgentId {
    pub const ALL: [AgentId; 7] = [
        AgentId::Claude,
        AgentId::Gemini,
        AgentId::Opencode,
        AgentId::Devstral,
        AgentId::Auggie,
        AgentId::Copilot,
        AgentId::Codex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Claude => "claude",
            AgentId::Gemini => "gemini",
            AgentId::Opencode => "opencode",
            AgentId::Devstral => "devstral",
            AgentId::Auggie => "auggie",
            AgentId::Copilot => "copilot",
            AgentId::Codex => "codex",
        }
    }

    /// Suffix used by per-agent environment overrides, e.g. `VP_IMAGE_CLAUDE`.
    pub fn env_suffix(&self) -> String {
        self.as_str().to_ascii_uppercase()
    }

    /// All ids as owned strings, for error messages.
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|id| id.as_str().to_string()).collect()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = VibePodError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| VibePodError::UnknownAgent {
                agent: s.to_string(),
                valid: Self::names(),
            })
    }
}

/// Extra host directory mounted into the container, relative to the
/// agent's credential directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialMount {
    pub host_subdir: &'static str,
    pub container_path: &'static str,
}

/// Everything needed to turn an agent id into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub id: AgentId,
    pub name: &'static str,
    pub provider: &'static str,
    /// Repository and tag, without the namespace.
    pub repository: &'static str,
    /// Where the credential directory lands inside the container.
    pub config_mount_path: &'static str,
    /// `None` keeps the image's default entrypoint/command.
    pub command: Option<&'static [&'static str]>,
    pub extra_env: &'static [(&'static str, &'static str)],
    pub platform: Option<&'static str>,
    pub run_as_host_user: bool,
    pub credential_mounts: &'static [CredentialMount],
}

impl AgentSpec {
    pub fn command_vec(&self) -> Vec<String> {
        self.command
            .map(|parts| parts.iter().map(|p| p.to_string()).collect())
            .unwrap_or_default()
    }
}
