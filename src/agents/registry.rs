use super::definition::{AgentId, AgentSpec, CredentialMount};
use crate::error::Result;

const HOME_CONFIG: &[(&str, &str)] = &[("HOME", "/config")];

static AGENTS: [AgentSpec; 7] = [
    AgentSpec {
        id: AgentId::Claude,
        name: "Claude Code",
        provider: "anthropic",
        repository: "claude-container:latest",
        config_mount_path: "/claude",
        command: Some(&["claude"]),
        extra_env: &[("CLAUDE_CONFIG_DIR", "/claude")],
        platform: None,
        run_as_host_user: false,
        credential_mounts: &[],
    },
    AgentSpec {
        id: AgentId::Gemini,
        name: "Gemini CLI",
        provider: "google",
        repository: "gemini-container:latest",
        config_mount_path: "/config",
        command: Some(&["gemini"]),
        extra_env: HOME_CONFIG,
        platform: None,
        run_as_host_user: false,
        credential_mounts: &[],
    },
    AgentSpec {
        id: AgentId::Opencode,
        name: "OpenCode",
        provider: "openai",
        repository: "opencode-cli:latest",
        config_mount_path: "/config",
        command: Some(&["opencode"]),
        extra_env: &[("HOME", "/config"), ("OPENCODE_CONFIG_DIR", "/config")],
        platform: None,
        run_as_host_user: false,
        credential_mounts: &[],
    },
    AgentSpec {
        id: AgentId::Devstral,
        name: "Devstral (Mistral Vibe)",
        provider: "mistral",
        repository: "devstral-cli:latest",
        config_mount_path: "/config",
        command: None,
        extra_env: &[("HOME", "/config"), ("WORKSPACE_PATH", "/workspace")],
        platform: Some("linux/amd64"),
        run_as_host_user: true,
        credential_mounts: &[],
    },
    AgentSpec {
        id: AgentId::Auggie,
        name: "Auggie",
        provider: "augment",
        repository: "auggie-cli:latest",
        config_mount_path: "/config",
        command: Some(&["auggie"]),
        extra_env: HOME_CONFIG,
        platform: None,
        run_as_host_user: false,
        credential_mounts: &[
            CredentialMount {
                host_subdir: ".augment",
                container_path: "/root/.augment",
            },
            CredentialMount {
                host_subdir: ".augment",
                container_path: "/home/node/.augment",
            },
        ],
    },
    AgentSpec {
        id: AgentId::Copilot,
        name: "GitHub Copilot CLI",
        provider: "github",
        repository: "copilot-cli:latest",
        config_mount_path: "/config",
        command: Some(&["copilot"]),
        extra_env: HOME_CONFIG,
        platform: None,
        run_as_host_user: false,
        credential_mounts: &[],
    },
    AgentSpec {
        id: AgentId::Codex,
        name: "Codex",
        provider: "openai",
        repository: "codex-cli:latest",
        config_mount_path: "/config",
        command: Some(&["codex"]),
        extra_env: HOME_CONFIG,
        platform: None,
        run_as_host_user: false,
        credential_mounts: &[],
    },
];

/// Lookup over the built-in agent table.
pub struct AgentRegistry;

impl AgentRegistry {
    pub fn spec(id: AgentId) -> &'static AgentSpec {
        // The table is declared in `AgentId::ALL` order.
        &AGENTS[id as usize]
    }

    /// Resolve a user-supplied name to its spec.
    pub fn get(name: &str) -> Result<&'static AgentSpec> {
        let id: AgentId = name.parse()?;
        Ok(Self::spec(id))
    }

    pub fn all() -> &'static [AgentSpec] {
        &AGENTS
    }
}
