//! Container lifecycle for agent runs.
//!
//! A run moves through [`RunState`]s in order: the shared network is
//! ensured, the enabled sidecars started, the image made available, and
//! the agent container created, started and attached.
//! Shared resources are never rolled back; only a container this run
//! created and failed to start is removed.

pub mod guard;
pub mod proxy_map;
pub mod sidecar;

use crate::agents::{AgentId, AgentRegistry, ImageRef};
use crate::config::{ConfigPaths, EffectiveConfig};
use crate::console;
use crate::error::{Result, VibePodError};
use crate::runtime::mount::convert_volume_specs;
use crate::runtime::{
    AttachOutcome, ContainerHandle, ContainerRuntime, ContainerSpec, ContainerState,
    ContainerSummary, LabelFilter, Mount, Role, Signal, WaitOutcome, LABEL_AGENT, LABEL_MANAGED,
    LABEL_ROLE, LABEL_VERSION, LABEL_WORKSPACE,
};
use crate::session_log::{ExitReason, SessionLog, SessionRecord};
use crate::utils::path::HostUser;
use crate::version;
use crate::workspace::{Workspace, WORKSPACE_MOUNT};
use guard::ContainerGuard;
use sidecar::{Backoff, Sidecar, PROXY_CA_MOUNT};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Time a container gets between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(10);
const KILL_WAIT: Duration = Duration::from_secs(5);
const CA_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Planned,
    NetworkReady,
    ImageReady,
    Started,
    Attached,
    Detached,
    Stopping,
    Stopped,
    Removed,
}

/// Everything decided before the runtime is touched.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub agent: AgentId,
    pub image: ImageRef,
    pub workspace: Workspace,
    /// Compose network to join in addition to the shared one.
    pub compose_network: Option<String>,
    pub pull: bool,
    pub detach: bool,
    /// `--env` values; they win over every other env source.
    pub env: BTreeMap<String, String>,
    pub name: Option<String>,
    pub host_user: HostUser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub container: ContainerHandle,
    pub state: RunState,
    /// Exit status to propagate; 0 while the container keeps running.
    pub exit_code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTarget {
    Agent(AgentId),
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    pub stopped: Vec<String>,
    pub already_stopped: Vec<String>,
}

impl StopReport {
    pub fn is_empty(&self) -> bool {
        self.stopped.is_empty() && self.already_stopped.is_empty()
    }
}

pub struct Orchestrator<'a, R: ContainerRuntime + ?Sized> {
    runtime: &'a R,
    config: &'a EffectiveConfig,
    paths: &'a ConfigPaths,
    grace: Duration,
    backoff: Backoff,
    ca_wait: Duration,
}

impl<'a, R: ContainerRuntime + ?Sized> Orchestrator<'a, R> {
    pub fn new(runtime: &'a R, config: &'a EffectiveConfig, paths: &'a ConfigPaths) -> Self {
        Self {
            runtime,
            config,
            paths,
            grace: DEFAULT_GRACE,
            backoff: Backoff::default(),
            ca_wait: CA_WAIT,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_ca_wait(mut self, ca_wait: Duration) -> Self {
        self.ca_wait = ca_wait;
        self
    }

    fn advance(&self, state: &mut RunState, next: RunState) {
        tracing::debug!(from = ?*state, to = ?next, "run state");
        *state = next;
    }

    fn check_cancel(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            Err(VibePodError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Create the shared network; an existing one is fine.
    pub fn ensure_network(&self) -> Result<()> {
        self.runtime.network_ensure(&self.config.network)
    }

    /// Launch an agent and, unless detached, attach until it exits or the
    /// token is cancelled.
    pub fn run(&self, plan: &RunPlan, cancel: &CancellationToken) -> Result<RunOutcome> {
        let mut state = RunState::Planned;

        self.ensure_network()?;
        self.advance(&mut state, RunState::NetworkReady);
        self.check_cancel(cancel)?;

        if self.config.logging.enabled {
            self.ensure_datasette(self.config.logging.ui_port)?;
        }
        let proxy_port = if self.config.proxy.enabled {
            let port = self.ensure_proxy(plan.host_user)?;
            if !sidecar::wait_for_ca(&self.config.proxy.ca_path, self.ca_wait) {
                console::warning(format!(
                    "Proxy CA not found yet at {}",
                    self.config.proxy.ca_path.display()
                ));
            }
            Some(port)
        } else {
            None
        };
        self.check_cancel(cancel)?;

        self.ensure_image(&plan.image, plan.pull)?;
        self.advance(&mut state, RunState::ImageReady);
        self.check_cancel(cancel)?;

        let spec = self.agent_spec(plan, proxy_port)?;
        console::info(format!("Starting {} with image {}", plan.agent, plan.image));
        let handle = self.start_container(&spec, plan.compose_network.as_deref())?;
        self.advance(&mut state, RunState::Started);

        if self.config.proxy.enabled {
            self.record_proxy_mapping(&handle, plan.agent);
        }

        if plan.detach {
            // Auto-removed containers vanish instead of showing as exited
            match self.runtime.container_state(&handle.name)? {
                Some(current) if !current.is_terminal() => {}
                _ => {
                    return Err(VibePodError::Runtime(format!(
                        "Container {} exited immediately after start",
                        handle.name
                    )))
                }
            }
            self.advance(&mut state, RunState::Detached);
            return Ok(RunOutcome {
                container: handle,
                state,
                exit_code: 0,
            });
        }

        self.advance(&mut state, RunState::Attached);
        let session = self.open_session(plan, &handle);
        let attached = match self.runtime.container_attach(&handle, cancel) {
            Ok(outcome) => outcome,
            Err(e) => {
                close_session(session, ExitReason::Error);
                return Err(e);
            }
        };

        let exit_code = match attached {
            AttachOutcome::Interrupted => {
                close_session(session, ExitReason::Interrupted);
                console::info("Stopping container...");
                self.advance(&mut state, RunState::Stopping);
                self.terminate(&handle, self.grace)?;
                self.advance(&mut state, RunState::Stopped);
                crate::error::EXIT_INTERRUPTED
            }
            AttachOutcome::Exited(code) => {
                let current = self.runtime.container_state(&handle.name)?;
                if current.as_ref().is_some_and(ContainerState::is_running) {
                    // Detached with the escape sequence; leave it running.
                    close_session(session, ExitReason::Detached);
                    self.advance(&mut state, RunState::Detached);
                    return Ok(RunOutcome {
                        container: handle,
                        state,
                        exit_code: 0,
                    });
                }
                close_session(session, ExitReason::Normal);
                self.advance(&mut state, RunState::Stopped);
                code
            }
        };

        if self.config.auto_remove {
            self.runtime.container_remove(&handle)?;
            self.advance(&mut state, RunState::Removed);
        }

        Ok(RunOutcome {
            container: handle,
            state,
            exit_code,
        })
    }

    /// Pull when asked to or when the image is missing. A failed pull of an
    /// image that exists locally only warns.
    pub fn ensure_image(&self, image: &ImageRef, pull_requested: bool) -> Result<()> {
        let present = self.runtime.image_exists_locally(image.as_str())?;
        if present && !pull_requested && !self.config.auto_pull {
            return Ok(());
        }

        let spinner = console::spinner(format!("Pulling {}", image));
        let result = self.runtime.image_pull(image.as_str());
        spinner.finish_and_clear();

        match result {
            Ok(()) => Ok(()),
            Err(VibePodError::ImagePull { message, .. }) if present => {
                console::warning(format!(
                    "Could not pull {}, using the local image: {}",
                    image, message
                ));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Container description for an agent run. Creates the host-side
    /// credential directories it mounts.
    pub fn container_spec(&self, plan: &RunPlan) -> Result<ContainerSpec> {
        let proxy_port = self.config.proxy.enabled.then_some(self.config.proxy.port);
        self.agent_spec(plan, proxy_port)
    }

    /// `proxy_port` is the port the running proxy serves, `None` without
    /// a proxy.
    fn agent_spec(&self, plan: &RunPlan, proxy_port: Option<u16>) -> Result<ContainerSpec> {
        let spec = AgentRegistry::spec(plan.agent);
        let agent_config = self.config.agent(plan.agent);

        let credentials = self.paths.agent_dir(plan.agent);
        std::fs::create_dir_all(&credentials)?;

        let mut mounts = vec![
            Mount::rw(plan.workspace.root(), WORKSPACE_MOUNT),
            Mount::rw(&credentials, spec.config_mount_path),
        ];
        for extra in spec.credential_mounts {
            let host = credentials.join(extra.host_subdir);
            std::fs::create_dir_all(&host)?;
            mounts.push(Mount::rw(host, extra.container_path));
        }
        if let Some(agent_config) = agent_config {
            mounts.extend(convert_volume_specs(&agent_config.volumes)?);
        }

        let mut env = BTreeMap::from([
            ("USER_UID".to_string(), plan.host_user.uid.to_string()),
            ("USER_GID".to_string(), plan.host_user.gid.to_string()),
        ]);
        env.extend(
            spec.extra_env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        if let Some(agent_config) = agent_config {
            env.extend(agent_config.env.clone());
        }
        env.extend(plan.env.clone());

        if let Some(port) = proxy_port {
            sidecar::apply_proxy_env(&mut env, port);
            mounts.push(Mount::ro(&self.config.proxy.ca_dir, PROXY_CA_MOUNT));
        }

        let labels = [
            (LABEL_MANAGED, "true".to_string()),
            (LABEL_ROLE, Role::Agent.as_str().to_string()),
            (LABEL_AGENT, plan.agent.to_string()),
            (
                LABEL_WORKSPACE,
                plan.workspace.root().display().to_string(),
            ),
            (LABEL_VERSION, version::VERSION.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Ok(ContainerSpec {
            name: plan
                .name
                .clone()
                .unwrap_or_else(|| plan.workspace.container_name(plan.agent)),
            image: plan.image.to_string(),
            labels,
            env,
            mounts,
            network: Some(self.config.network.clone()),
            workdir: Some(WORKSPACE_MOUNT.to_string()),
            command: spec.command_vec(),
            platform: spec.platform.map(str::to_string),
            user: spec
                .run_as_host_user
                .then(|| plan.host_user.as_user_arg()),
            ports: Vec::new(),
            interactive: true,
            auto_remove: self.config.auto_remove,
        })
    }

    /// Create (replacing a stale stopped namesake), join the compose
    /// network and start. A failed start removes only this container.
    fn start_container(
        &self,
        spec: &ContainerSpec,
        compose_network: Option<&str>,
    ) -> Result<ContainerHandle> {
        let handle = match self.runtime.container_create(spec) {
            Err(VibePodError::ContainerConflict(name)) => {
                let existing = self.runtime.container_state(&name)?;
                if existing.as_ref().is_some_and(ContainerState::is_running) {
                    return Err(VibePodError::ContainerConflict(name));
                }
                tracing::info!(container = %name, "removing stale container");
                self.runtime.container_remove(&ContainerHandle::named(&name))?;
                self.runtime.container_create(spec)?
            }
            other => other?,
        };

        let guard = ContainerGuard::new(self.runtime, handle);
        if let Some(network) = compose_network {
            self.runtime.network_connect(network, guard.handle())?;
        }
        self.runtime.container_start(guard.handle())?;
        Ok(guard.disarm())
    }

    /// Session row for an attached run. Logging problems never block the
    /// agent.
    fn open_session(&self, plan: &RunPlan, handle: &ContainerHandle) -> Option<SessionLog> {
        if !self.config.logging.enabled {
            return None;
        }

        let record = SessionRecord {
            agent: plan.agent,
            image: plan.image.to_string(),
            workspace: plan.workspace.root().display().to_string(),
            container_id: handle.id.clone().unwrap_or_else(|| handle.name.clone()),
            container_name: handle.name.clone(),
        };
        match SessionLog::open(&self.config.logging.db_path, &record) {
            Ok(session) => Some(session),
            Err(e) => {
                console::warning(format!(
                    "Session logging disabled for this run: {} ({})",
                    self.config.logging.db_path.display(),
                    e
                ));
                None
            }
        }
    }

    fn record_proxy_mapping(&self, handle: &ContainerHandle, agent: AgentId) {
        let ip = match self.runtime.container_ip(handle, &self.config.network) {
            Ok(Some(ip)) => ip,
            Ok(None) => {
                tracing::debug!(container = %handle.name, "no IP on shared network");
                return;
            }
            Err(e) => {
                tracing::warn!(container = %handle.name, error = %e, "cannot read container IP");
                return;
            }
        };

        let path = proxy_map::mapping_path(&self.config.proxy.data_dir());
        let container_id = handle.id.as_deref().unwrap_or(&handle.name);
        if let Err(e) = proxy_map::record(&path, &ip, container_id, &handle.name, agent) {
            console::warning(format!(
                "Could not write proxy container mapping at {} ({}). Fix proxy directory permissions to restore container attribution.",
                path.display(),
                e
            ));
        }
    }

    /// SIGTERM, wait up to `grace`, then SIGKILL. A zero grace kills
    /// straight away. Returns the exit code, or `None` if the container
    /// disappeared (e.g. auto-removed) before it could be read.
    pub fn terminate(&self, handle: &ContainerHandle, grace: Duration) -> Result<Option<i32>> {
        if !grace.is_zero() {
            self.runtime.container_signal(handle, Signal::Terminate)?;
            match self.wait_gone(handle, grace)? {
                Some(WaitOutcome::Exited(code)) => return Ok(Some(code)),
                None => return Ok(None),
                Some(WaitOutcome::TimedOut) => {
                    tracing::warn!(container = %handle.name, ?grace, "grace period expired, killing");
                }
            }
        }

        self.runtime.container_signal(handle, Signal::Kill)?;
        match self.wait_gone(handle, KILL_WAIT)? {
            Some(WaitOutcome::Exited(code)) => Ok(Some(code)),
            None => Ok(None),
            Some(WaitOutcome::TimedOut) => Err(VibePodError::Runtime(format!(
                "Container {} did not stop after SIGKILL",
                handle.name
            ))),
        }
    }

    fn wait_gone(&self, handle: &ContainerHandle, timeout: Duration) -> Result<Option<WaitOutcome>> {
        match self.runtime.container_wait(handle, timeout) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(VibePodError::ContainerNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Stop agent containers. Sidecars are left alone.
    pub fn stop(&self, target: StopTarget, force: bool) -> Result<StopReport> {
        let filter = match target {
            StopTarget::Agent(agent) => LabelFilter::managed().role(Role::Agent).agent(agent),
            StopTarget::All => LabelFilter::managed().role(Role::Agent),
        };
        let grace = if force { Duration::ZERO } else { self.grace };

        let mut report = StopReport::default();
        for container in self.runtime.container_list(&filter)? {
            let handle = container.handle();

            if container.state.is_running() {
                match self.terminate(&handle, grace) {
                    Ok(_) => report.stopped.push(container.name.clone()),
                    Err(e) if e.is_benign() => report.already_stopped.push(container.name.clone()),
                    Err(e) => return Err(e),
                }
            } else {
                report.already_stopped.push(container.name.clone());
            }

            if self.config.auto_remove {
                self.runtime.container_remove(&handle)?;
            }
        }

        Ok(report)
    }

    /// Managed agent containers, running or not.
    pub fn list(&self) -> Result<Vec<ContainerSummary>> {
        self.runtime
            .container_list(&LabelFilter::managed().role(Role::Agent))
    }

    /// Start the log viewer; returns the host port it serves.
    pub fn ensure_datasette(&self, ui_port: u16) -> Result<u16> {
        let port = self.sidecar_port(Sidecar::Datasette, ui_port)?;
        let spec = sidecar::datasette_spec(self.config, port)?;
        sidecar::ensure(self.runtime, Sidecar::Datasette, &spec, self.backoff)?;
        Ok(port)
    }

    /// Start the proxy; returns the port it listens on. The proxy lives on
    /// the shared network, so the network comes first.
    pub fn ensure_proxy(&self, user: HostUser) -> Result<u16> {
        self.ensure_network()?;
        let port = self.sidecar_port(Sidecar::Proxy, self.config.proxy.port)?;
        let spec = sidecar::proxy_spec(self.config, user, port)?;
        sidecar::ensure(self.runtime, Sidecar::Proxy, &spec, self.backoff)?;
        Ok(port)
    }

    /// An existing sidecar keeps the port it was created with.
    fn sidecar_port(&self, sidecar: Sidecar, requested: u16) -> Result<u16> {
        match sidecar::bound_port(self.runtime, sidecar)? {
            Some(bound) if bound != requested => {
                console::warning(format!(
                    "{} already uses port {}; stop it first to switch to port {}",
                    sidecar.container_name(),
                    bound,
                    requested
                ));
                Ok(bound)
            }
            _ => Ok(requested),
        }
    }

    pub fn sidecar_state(&self, sidecar: Sidecar) -> Result<Option<ContainerState>> {
        self.runtime.container_state(sidecar.container_name())
    }

    /// Stop a sidecar; `false` when it was not running.
    pub fn stop_sidecar(&self, sidecar: Sidecar, force: bool) -> Result<bool> {
        match self.sidecar_state(sidecar)? {
            Some(state) if state.is_running() => {
                let grace = if force { Duration::ZERO } else { self.grace };
                self.terminate(&sidecar.handle(), grace)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn close_session(session: Option<SessionLog>, reason: ExitReason) {
    if let Some(session) = session {
        if let Err(e) = session.close(reason) {
            tracing::warn!(error = %e, "could not close session row");
        }
    }
}
