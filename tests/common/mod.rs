//! In-memory container runtime that records every call.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vibepod::error::{Result, VibePodError};
use vibepod::runtime::{
    AttachOutcome, ContainerHandle, ContainerRuntime, ContainerSpec, ContainerState,
    ContainerSummary, LabelFilter, NetworkRef, Signal, WaitOutcome,
};

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub spec: ContainerSpec,
    pub state: ContainerState,
    pub networks: Vec<String>,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Copy)]
pub enum AttachBehavior {
    /// The agent exits with this code.
    Exit(i32),
    /// The user detaches; the container keeps running.
    Detach,
    /// Ctrl-C arrives while attached.
    Interrupt,
}

#[derive(Debug)]
pub struct FakeState {
    pub calls: Vec<String>,
    pub networks: BTreeSet<String>,
    pub images: BTreeSet<String>,
    pub containers: BTreeMap<String, FakeContainer>,
    pub compose_networks: Vec<NetworkRef>,
    pub pull_fails: bool,
    pub start_fails: bool,
    pub ignore_term: bool,
    /// Containers exit right after start.
    pub crash_on_start: bool,
    pub attach: AttachBehavior,
    /// State sidecars settle in after `run_sidecar`; running when unset.
    pub sidecar_state: Option<ContainerState>,
    /// Every call after this many fails as if the daemon went away.
    pub daemon_down_after: Option<usize>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            networks: BTreeSet::new(),
            images: BTreeSet::new(),
            containers: BTreeMap::new(),
            compose_networks: Vec::new(),
            pull_fails: false,
            start_fails: false,
            ignore_term: false,
            crash_on_start: false,
            attach: AttachBehavior::Exit(0),
            sidecar_state: None,
            daemon_down_after: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Calls whose name starts with `prefix`.
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Seed an existing container.
    pub fn add_container(&self, name: &str, labels: &[(&str, &str)], state: ContainerState) {
        let spec = ContainerSpec {
            name: name.to_string(),
            image: "seeded:latest".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        };
        self.state().containers.insert(
            name.to_string(),
            FakeContainer {
                spec,
                state,
                networks: Vec::new(),
                exit_code: 0,
            },
        );
    }

    fn record(&self, call: String) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.state();
        state.calls.push(call);
        if state
            .daemon_down_after
            .is_some_and(|limit| state.calls.len() > limit)
        {
            return Err(VibePodError::RuntimeUnavailable(
                "Cannot connect to the Docker daemon".to_string(),
            ));
        }
        Ok(state)
    }
}

fn handle_for(name: &str) -> ContainerHandle {
    ContainerHandle {
        name: name.to_string(),
        id: Some(format!("id-{}", name)),
    }
}

impl ContainerRuntime for FakeRuntime {
    fn ping(&self) -> Result<()> {
        self.record("ping".to_string())?;
        Ok(())
    }

    fn server_version(&self) -> Result<String> {
        self.record("server_version".to_string())?;
        Ok("27.3.1".to_string())
    }

    fn network_ensure(&self, name: &str) -> Result<()> {
        let mut state = self.record(format!("network_ensure {}", name))?;
        state.networks.insert(name.to_string());
        Ok(())
    }

    fn network_connect(&self, network: &str, container: &ContainerHandle) -> Result<()> {
        let mut state = self.record(format!("network_connect {} {}", network, container.name))?;
        let entry = state
            .containers
            .get_mut(&container.name)
            .ok_or_else(|| VibePodError::ContainerNotFound(container.name.clone()))?;
        entry.networks.push(network.to_string());
        Ok(())
    }

    fn image_pull(&self, image: &str) -> Result<()> {
        let mut state = self.record(format!("image_pull {}", image))?;
        if state.pull_fails {
            return Err(VibePodError::ImagePull {
                image: image.to_string(),
                message: "registry unreachable".to_string(),
            });
        }
        state.images.insert(image.to_string());
        Ok(())
    }

    fn image_exists_locally(&self, image: &str) -> Result<bool> {
        let state = self.record(format!("image_exists {}", image))?;
        Ok(state.images.contains(image))
    }

    fn container_create(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let mut state = self.record(format!("container_create {}", spec.name))?;
        if state.containers.contains_key(&spec.name) {
            return Err(VibePodError::ContainerConflict(spec.name.clone()));
        }
        let networks = spec.network.iter().cloned().collect();
        state.containers.insert(
            spec.name.clone(),
            FakeContainer {
                spec: spec.clone(),
                state: ContainerState::Created,
                networks,
                exit_code: 0,
            },
        );
        Ok(handle_for(&spec.name))
    }

    fn container_start(&self, container: &ContainerHandle) -> Result<()> {
        let mut state = self.record(format!("container_start {}", container.name))?;
        if state.start_fails {
            return Err(VibePodError::Runtime("port is already allocated".to_string()));
        }
        let crash = state.crash_on_start;
        let entry = state
            .containers
            .get_mut(&container.name)
            .ok_or_else(|| VibePodError::ContainerNotFound(container.name.clone()))?;
        entry.state = if crash {
            ContainerState::Exited
        } else {
            ContainerState::Running
        };
        Ok(())
    }

    fn container_attach(
        &self,
        container: &ContainerHandle,
        cancel: &CancellationToken,
    ) -> Result<AttachOutcome> {
        let mut state = self.record(format!("container_attach {}", container.name))?;
        let behavior = state.attach;
        match behavior {
            AttachBehavior::Exit(code) => {
                if let Some(entry) = state.containers.get_mut(&container.name) {
                    entry.state = ContainerState::Exited;
                    entry.exit_code = code;
                }
                Ok(AttachOutcome::Exited(code))
            }
            AttachBehavior::Detach => Ok(AttachOutcome::Exited(0)),
            AttachBehavior::Interrupt => {
                cancel.cancel();
                Ok(AttachOutcome::Interrupted)
            }
        }
    }

    fn container_signal(&self, container: &ContainerHandle, signal: Signal) -> Result<()> {
        let mut state = self.record(format!("container_signal {} {}", container.name, signal.as_str()))?;
        let ignore_term = state.ignore_term;
        let entry = state
            .containers
            .get_mut(&container.name)
            .ok_or_else(|| VibePodError::ContainerNotFound(container.name.clone()))?;
        if !entry.state.is_running() {
            return Ok(());
        }
        match signal {
            Signal::Terminate if ignore_term => {}
            Signal::Terminate => {
                entry.state = ContainerState::Exited;
                entry.exit_code = 143;
            }
            Signal::Kill => {
                entry.state = ContainerState::Exited;
                entry.exit_code = 137;
            }
        }
        Ok(())
    }

    fn container_wait(&self, container: &ContainerHandle, timeout: Duration) -> Result<WaitOutcome> {
        let state = self.record(format!("container_wait {} {}", container.name, timeout.as_millis()))?;
        let entry = state
            .containers
            .get(&container.name)
            .ok_or_else(|| VibePodError::ContainerNotFound(container.name.clone()))?;
        if entry.state.is_terminal() {
            Ok(WaitOutcome::Exited(entry.exit_code))
        } else {
            Ok(WaitOutcome::TimedOut)
        }
    }

    fn container_remove(&self, container: &ContainerHandle) -> Result<()> {
        let mut state = self.record(format!("container_remove {}", container.name))?;
        state.containers.remove(&container.name);
        Ok(())
    }

    fn container_list(&self, filter: &LabelFilter) -> Result<Vec<ContainerSummary>> {
        let state = self.record("container_list".to_string())?;
        Ok(state
            .containers
            .values()
            .filter(|c| filter.matches(&c.spec.labels))
            .map(|c| ContainerSummary {
                id: format!("id-{}", c.spec.name),
                name: c.spec.name.clone(),
                image: c.spec.image.clone(),
                state: c.state.clone(),
                labels: c.spec.labels.clone(),
                created_at: None,
            })
            .collect())
    }

    fn container_state(&self, name: &str) -> Result<Option<ContainerState>> {
        let state = self.record(format!("container_state {}", name))?;
        Ok(state.containers.get(name).map(|c| c.state.clone()))
    }

    fn container_ip(&self, container: &ContainerHandle, network: &str) -> Result<Option<String>> {
        let state = self.record(format!("container_ip {} {}", container.name, network))?;
        Ok(state
            .containers
            .get(&container.name)
            .filter(|c| c.networks.iter().any(|n| n == network))
            .map(|_| "172.18.0.5".to_string()))
    }

    fn compose_networks_for(&self, manifest: &Path) -> Result<Vec<NetworkRef>> {
        let state = self.record(format!("compose_networks_for {}", manifest.display()))?;
        Ok(state.compose_networks.clone())
    }

    fn run_sidecar(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let mut state = self.record(format!("run_sidecar {}", spec.name))?;
        let settled = state.sidecar_state.clone().unwrap_or(ContainerState::Running);
        let entry = state
            .containers
            .entry(spec.name.clone())
            .or_insert_with(|| FakeContainer {
                spec: spec.clone(),
                state: ContainerState::Created,
                networks: spec.network.iter().cloned().collect(),
                exit_code: 0,
            });
        entry.state = settled;
        Ok(handle_for(&spec.name))
    }
}
