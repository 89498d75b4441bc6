//! Shared helper containers: the Datasette log viewer and the HTTP(S)
//! proxy. Both are named singletons that outlive any single agent run.

use crate::config::EffectiveConfig;
use crate::error::{Result, VibePodError};
use crate::runtime::{
    ContainerHandle, ContainerRuntime, ContainerSpec, LabelFilter, Mount, PortBinding, Role,
    LABEL_MANAGED, LABEL_PORT, LABEL_ROLE, LABEL_VERSION,
};
use crate::utils::path::HostUser;
use crate::version;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const DATASETTE_CONTAINER: &str = "vibepod-datasette";
pub const PROXY_CONTAINER: &str = "vibepod-proxy";
pub const DATASETTE_PORT: u16 = 8001;
pub const PROXY_CA_MOUNT: &str = "/etc/vibepod-proxy-ca";
pub const PROXY_CA_FILE: &str = "mitmproxy-ca-cert.pem";
pub const NO_PROXY: &str = "localhost,127.0.0.1,::1";

const CA_BUNDLE_VARS: &[&str] = &[
    "NODE_EXTRA_CA_CERTS",
    "REQUESTS_CA_BUNDLE",
    "SSL_CERT_FILE",
    "CURL_CA_BUNDLE",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sidecar {
    Datasette,
    Proxy,
}

impl Sidecar {
    pub fn container_name(&self) -> &'static str {
        match self {
            Sidecar::Datasette => DATASETTE_CONTAINER,
            Sidecar::Proxy => PROXY_CONTAINER,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Sidecar::Datasette => Role::Datasette,
            Sidecar::Proxy => Role::Proxy,
        }
    }

    pub fn handle(&self) -> ContainerHandle {
        ContainerHandle::named(self.container_name())
    }
}

/// Exponential backoff for readiness polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub factor: u32,
    pub max: Duration,
    pub attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            factor: 2,
            max: Duration::from_secs(2),
            attempts: 8,
        }
    }
}

impl Backoff {
    /// No sleeping between attempts; for tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            initial: Duration::ZERO,
            factor: 1,
            max: Duration::ZERO,
            attempts,
        }
    }

    /// Delay before each retry after the first attempt.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let factor = self.factor;
        let max = self.max;
        std::iter::successors(Some(self.initial.min(max)), move |delay| {
            Some(delay.saturating_mul(factor).min(max))
        })
        .take(self.attempts.saturating_sub(1) as usize)
    }
}

fn labels(sidecar: Sidecar, port: u16) -> BTreeMap<String, String> {
    [
        (LABEL_MANAGED, "true".to_string()),
        (LABEL_ROLE, sidecar.role().as_str().to_string()),
        (LABEL_VERSION, version::VERSION.to_string()),
        (LABEL_PORT, port.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn file_name(path: &Path, fallback: &str) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(fallback)
        .to_string()
}

/// Container for the log viewer. Creates the database file if missing.
pub fn datasette_spec(config: &EffectiveConfig, ui_port: u16) -> Result<ContainerSpec> {
    let db_path = &config.logging.db_path;
    let data_dir = db_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&data_dir)?;
    if !db_path.exists() {
        std::fs::File::create(db_path)?;
    }

    let db_in_container = format!("/data/{}", file_name(db_path, "logs.db"));
    let command = [
        "datasette",
        db_in_container.as_str(),
        "--host",
        "0.0.0.0",
        "--port",
        "8001",
        "--setting",
        "sql_time_limit_ms",
        "10000",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    Ok(ContainerSpec {
        name: DATASETTE_CONTAINER.to_string(),
        image: config.logging.image.clone(),
        labels: labels(Sidecar::Datasette, ui_port),
        mounts: vec![Mount::rw(data_dir, "/data")],
        command,
        ports: vec![PortBinding {
            host: ui_port,
            container: DATASETTE_PORT,
        }],
        ..Default::default()
    })
}

/// Container for the intercepting proxy, reachable only on the shared
/// network. It listens on `port`, the same port agents are pointed at.
pub fn proxy_spec(config: &EffectiveConfig, user: HostUser, port: u16) -> Result<ContainerSpec> {
    let data_dir = config.proxy.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    std::fs::create_dir_all(&config.proxy.ca_dir)?;

    let env = [
        (
            "VIBEPOD_PROXY_DB".to_string(),
            format!("/data/{}", file_name(&config.proxy.db_path, "proxy.db")),
        ),
        (
            "VIBEPOD_PROXY_CONFDIR".to_string(),
            "/data/mitmproxy".to_string(),
        ),
        ("VIBEPOD_PROXY_PORT".to_string(), port.to_string()),
    ]
    .into();

    Ok(ContainerSpec {
        name: PROXY_CONTAINER.to_string(),
        image: config.proxy.image.clone(),
        labels: labels(Sidecar::Proxy, port),
        env,
        mounts: vec![Mount::rw(data_dir, "/data")],
        network: Some(config.network.clone()),
        user: Some(user.as_user_arg()),
        ..Default::default()
    })
}

/// Port recorded on an existing sidecar container, running or not.
///
/// `run_sidecar` restarts an existing container as-is, so this is the port
/// that will actually be served.
pub fn bound_port<R: ContainerRuntime + ?Sized>(runtime: &R, sidecar: Sidecar) -> Result<Option<u16>> {
    let filter = LabelFilter::managed().role(sidecar.role());
    Ok(runtime
        .container_list(&filter)?
        .into_iter()
        .find(|c| c.name == sidecar.container_name())
        .and_then(|c| c.labels.get(LABEL_PORT)?.parse().ok()))
}

/// Start a sidecar if needed and wait until it reports running.
pub fn ensure<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    sidecar: Sidecar,
    spec: &ContainerSpec,
    backoff: Backoff,
) -> Result<ContainerHandle> {
    let handle = runtime
        .run_sidecar(spec)
        .map_err(|e| sidecar_error(sidecar, e))?;
    wait_ready(runtime, sidecar, backoff)?;
    Ok(handle)
}

fn sidecar_error(sidecar: Sidecar, err: VibePodError) -> VibePodError {
    match err {
        VibePodError::RuntimeUnavailable(_) | VibePodError::SidecarStart { .. } => err,
        other => VibePodError::SidecarStart {
            sidecar: sidecar.container_name().to_string(),
            message: other.to_string(),
        },
    }
}

/// Poll the container state until it is running.
pub fn wait_ready<R: ContainerRuntime + ?Sized>(
    runtime: &R,
    sidecar: Sidecar,
    backoff: Backoff,
) -> Result<()> {
    let name = sidecar.container_name();
    let mut delays = backoff.delays();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let state = runtime
            .container_state(name)
            .map_err(|e| sidecar_error(sidecar, e))?;

        match state {
            Some(state) if state.is_running() => {
                tracing::debug!(container = name, attempt, "sidecar ready");
                return Ok(());
            }
            Some(state) if state.is_terminal() => {
                return Err(VibePodError::SidecarStart {
                    sidecar: name.to_string(),
                    message: format!("container is {}", state),
                });
            }
            state => {
                tracing::debug!(container = name, attempt, ?state, "sidecar not ready yet");
            }
        }

        match delays.next() {
            Some(delay) => std::thread::sleep(delay),
            None => {
                return Err(VibePodError::SidecarStart {
                    sidecar: name.to_string(),
                    message: format!("not running after {} attempts", attempt),
                })
            }
        }
    }
}

/// Route an agent through the proxy without overriding values the user set.
pub fn apply_proxy_env(env: &mut BTreeMap<String, String>, port: u16) {
    let proxy_url = format!("http://{}:{}", PROXY_CONTAINER, port);
    let ca_path = format!("{}/{}", PROXY_CA_MOUNT, PROXY_CA_FILE);

    let mut defaults = vec![
        ("HTTP_PROXY", proxy_url.clone()),
        ("HTTPS_PROXY", proxy_url),
        ("NO_PROXY", NO_PROXY.to_string()),
    ];
    defaults.extend(CA_BUNDLE_VARS.iter().map(|var| (*var, ca_path.clone())));

    for (key, value) in defaults {
        env.entry(key.to_string()).or_insert(value);
    }
}

/// Wait for the proxy to generate its CA certificate.
pub fn wait_for_ca(path: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if path.is_file() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(250));
    }
}
