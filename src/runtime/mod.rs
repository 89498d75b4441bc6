//! Container runtime abstraction.
//!
//! The orchestrator only talks to [`ContainerRuntime`]; [`DockerCli`] is the
//! production backend and tests substitute a recording fake.

pub mod docker;
pub mod mount;

pub use docker::DockerCli;
pub use mount::Mount;

use crate::agents::AgentId;
use crate::error::Result;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const LABEL_MANAGED: &str = "vibepod.managed";
pub const LABEL_ROLE: &str = "vibepod.role";
pub const LABEL_AGENT: &str = "vibepod.agent";
pub const LABEL_WORKSPACE: &str = "vibepod.workspace";
pub const LABEL_VERSION: &str = "vibepod.version";
/// Port a sidecar serves, so a later start can tell what is already bound.
pub const LABEL_PORT: &str = "vibepod.port";

/// What a managed container is for, recorded in the `vibepod.role` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Agent,
    Proxy,
    Datasette,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Proxy => "proxy",
            Role::Datasette => "datasette",
        }
    }
}

/// A container addressed by name; `id` is filled in once the runtime has
/// reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub name: String,
    pub id: Option<String>,
}

impl ContainerHandle {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Kill,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Terminate => "TERM",
            Signal::Kill => "KILL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown(String),
}

impl ContainerState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            other => ContainerState::Unknown(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }

    /// Exited or dead: the container will not come back on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContainerState::Exited | ContainerState::Dead)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Unknown(raw) => raw,
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortBinding {
    pub host: u16,
    pub container: u16,
}

/// Everything `container_create` needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub mounts: Vec<Mount>,
    pub network: Option<String>,
    pub workdir: Option<String>,
    /// Empty keeps the image's default command.
    pub command: Vec<String>,
    pub platform: Option<String>,
    pub user: Option<String>,
    pub ports: Vec<PortBinding>,
    /// Allocate a TTY and keep stdin open.
    pub interactive: bool,
    pub auto_remove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub labels: BTreeMap<String, String>,
    pub created_at: Option<DateTime<FixedOffset>>,
}

impl ContainerSummary {
    pub fn agent(&self) -> Option<AgentId> {
        self.labels.get(LABEL_AGENT)?.parse().ok()
    }

    pub fn workspace(&self) -> Option<&str> {
        self.labels.get(LABEL_WORKSPACE).map(String::as_str)
    }

    /// Time since creation, only meaningful while running.
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        if !self.state.is_running() {
            return None;
        }
        let created = self.created_at?.with_timezone(&Utc);
        Some((now - created).max(chrono::Duration::zero()))
    }

    pub fn handle(&self) -> ContainerHandle {
        ContainerHandle {
            name: self.name.clone(),
            id: Some(self.id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRef {
    pub name: String,
}

/// Conjunction of `label=value` requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    labels: Vec<(String, String)>,
}

impl LabelFilter {
    /// Every container VibePod created.
    pub fn managed() -> Self {
        Self::default().with(LABEL_MANAGED, "true")
    }

    pub fn role(self, role: Role) -> Self {
        self.with(LABEL_ROLE, role.as_str())
    }

    pub fn agent(self, agent: AgentId) -> Self {
        self.with(LABEL_AGENT, agent.as_str())
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.labels.push((key.to_string(), value.to_string()));
        self
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.pairs()
            .all(|(key, value)| labels.get(key).map(String::as_str) == Some(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The attach session ended; carries its exit status.
    Exited(i32),
    /// The cancellation token fired while attached.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(i32),
    TimedOut,
}

/// Blocking operations the orchestrator needs from a container engine.
///
/// Conventions shared by every backend:
/// - `network_ensure` and `run_sidecar` tolerate the object already existing.
/// - `container_create` reports a name clash as `ContainerConflict`.
/// - `container_signal` on a stopped container is a no-op; on a missing one
///   it returns `ContainerNotFound`.
/// - `container_remove` on a missing container is a no-op.
/// - an unreachable daemon is always `RuntimeUnavailable`.
pub trait ContainerRuntime {
    fn ping(&self) -> Result<()>;
    fn server_version(&self) -> Result<String>;

    fn network_ensure(&self, name: &str) -> Result<()>;
    fn network_connect(&self, network: &str, container: &ContainerHandle) -> Result<()>;

    fn image_pull(&self, image: &str) -> Result<()>;
    fn image_exists_locally(&self, image: &str) -> Result<bool>;

    fn container_create(&self, spec: &ContainerSpec) -> Result<ContainerHandle>;
    fn container_start(&self, container: &ContainerHandle) -> Result<()>;
    fn container_attach(
        &self,
        container: &ContainerHandle,
        cancel: &CancellationToken,
    ) -> Result<AttachOutcome>;
    fn container_signal(&self, container: &ContainerHandle, signal: Signal) -> Result<()>;
    fn container_wait(&self, container: &ContainerHandle, timeout: Duration) -> Result<WaitOutcome>;
    fn container_remove(&self, container: &ContainerHandle) -> Result<()>;
    fn container_list(&self, filter: &LabelFilter) -> Result<Vec<ContainerSummary>>;
    fn container_state(&self, name: &str) -> Result<Option<ContainerState>>;
    fn container_ip(&self, container: &ContainerHandle, network: &str) -> Result<Option<String>>;

    fn compose_networks_for(&self, manifest: &Path) -> Result<Vec<NetworkRef>>;

    /// Create and start a detached container, or start the existing one.
    fn run_sidecar(&self, spec: &ContainerSpec) -> Result<ContainerHandle>;
}
