use super::{
    AttachOutcome, ContainerHandle, ContainerRuntime, ContainerSpec, ContainerState,
    ContainerSummary, LabelFilter, NetworkRef, Signal, WaitOutcome, LABEL_MANAGED,
};
use crate::error::{Result, VibePodError};
use crate::workspace::compose_project_name;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wait_timeout::ChildExt;

const ATTACH_POLL: Duration = Duration::from_millis(200);
const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// How a failed `docker` invocation should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    DaemonUnreachable,
    NameConflict,
    AlreadyExists,
    NotRunning,
    NotFound,
    Other,
}

/// Classify docker CLI stderr.
pub fn classify_failure(stderr: &str) -> FailureKind {
    let lower = stderr.to_lowercase();

    if lower.contains("cannot connect to the docker daemon")
        || lower.contains("is the docker daemon running")
        || lower.contains("failed to connect to the docker api")
        || lower.contains("error during connect")
    {
        FailureKind::DaemonUnreachable
    } else if lower.contains("is already in use by container")
        || (lower.contains("conflict") && lower.contains("already in use"))
    {
        FailureKind::NameConflict
    } else if lower.contains("already exists") {
        FailureKind::AlreadyExists
    } else if lower.contains("is not running") {
        FailureKind::NotRunning
    } else if lower.contains("no such container")
        || lower.contains("no such image")
        || lower.contains("no such object")
    {
        FailureKind::NotFound
    } else {
        FailureKind::Other
    }
}

/// [`ContainerRuntime`] backed by the `docker` command line client.
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    /// Locate `docker` on `PATH`.
    pub fn connect() -> Result<Self> {
        let binary = which::which("docker").map_err(|_| {
            VibePodError::RuntimeUnavailable("docker CLI not found on PATH".to_string())
        })?;
        Ok(Self::with_binary(binary))
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn exec(&self, args: &[String]) -> Result<Output> {
        tracing::debug!(command = %render(args), "docker");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                VibePodError::RuntimeUnavailable(format!("Failed to run {}: {}", render(args), e))
            })
    }

    /// Exact labels by container id. Containers removed since they were
    /// listed are skipped.
    fn inspect_labels(&self, ids: &[&str]) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
        let mut args = owned(&[
            "container",
            "inspect",
            "--format",
            "{{.Id}} {{json .Config.Labels}}",
        ]);
        args.extend(owned(ids));

        let output = self.exec(&args)?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            if classify_failure(&stderr) != FailureKind::NotFound {
                return Err(failure(&args, &stderr));
            }
        }
        Ok(stdout_of(&output)
            .lines()
            .filter_map(parse_inspect_labels)
            .collect())
    }

    /// Run and return trimmed stdout, turning any failure into an error.
    fn run(&self, args: &[String]) -> Result<String> {
        let output = self.exec(args)?;
        if output.status.success() {
            Ok(stdout_of(&output))
        } else {
            Err(failure(args, &stderr_of(&output)))
        }
    }
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

fn render(args: &[String]) -> String {
    format!("docker {}", args.join(" "))
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn failure(args: &[String], stderr: &str) -> VibePodError {
    match classify_failure(stderr) {
        FailureKind::DaemonUnreachable => VibePodError::RuntimeUnavailable(stderr.to_string()),
        _ => VibePodError::Runtime(format!("`{}` failed: {}", render(args), stderr)),
    }
}

/// Options shared by `docker create` and `docker run`, ending with the
/// image and command.
pub fn container_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = owned(&["--name", &spec.name]);

    for (key, value) in &spec.labels {
        args.push("--label".into());
        args.push(format!("{}={}", key, value));
    }
    for (key, value) in &spec.env {
        args.push("-e".into());
        args.push(format!("{}={}", key, value));
    }
    for mount in &spec.mounts {
        args.push("-v".into());
        args.push(mount.to_volume_arg());
    }
    if let Some(network) = &spec.network {
        args.extend(owned(&["--network", network]));
    }
    if let Some(workdir) = &spec.workdir {
        args.extend(owned(&["-w", workdir]));
    }
    if let Some(platform) = &spec.platform {
        args.extend(owned(&["--platform", platform]));
    }
    if let Some(user) = &spec.user {
        args.extend(owned(&["--user", user]));
    }
    for port in &spec.ports {
        args.push("-p".into());
        args.push(format!("{}:{}", port.host, port.container));
    }
    if spec.interactive {
        args.extend(owned(&["-i", "-t"]));
    }
    if spec.auto_remove {
        args.push("--rm".into());
    }

    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PsRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Labels")]
    labels: String,
    #[serde(rename = "CreatedAt")]
    created_at: String,
}

/// Parse one line of `docker ps --format '{{json .}}'`.
pub fn parse_ps_line(line: &str) -> Option<ContainerSummary> {
    let row: PsRow = serde_json::from_str(line.trim()).ok()?;
    let name = row.names.split(',').next()?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    Some(ContainerSummary {
        id: row.id,
        name,
        image: row.image,
        state: ContainerState::parse(&row.state),
        labels: parse_labels(&row.labels),
        created_at: parse_created_at(&row.created_at),
    })
}

/// The `docker ps` label column joins pairs with commas, so values that
/// contain one are cut short; `container_list` replaces these with
/// [`parse_inspect_labels`] output.
fn parse_labels(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// Parse one line of `docker container inspect --format
/// '{{.Id}} {{json .Config.Labels}}'`.
pub fn parse_inspect_labels(line: &str) -> Option<(String, BTreeMap<String, String>)> {
    let (id, raw) = line.trim().split_once(' ')?;
    let labels: Option<BTreeMap<String, String>> = serde_json::from_str(raw).ok()?;
    Some((id.to_string(), labels.unwrap_or_default()))
}

/// `2024-05-01 10:00:00 +0200 CEST`; the zone abbreviation is ignored.
pub fn parse_created_at(raw: &str) -> Option<DateTime<FixedOffset>> {
    let stamp = raw.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
    DateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S %z").ok()
}

impl ContainerRuntime for DockerCli {
    fn ping(&self) -> Result<()> {
        self.server_version().map(|_| ())
    }

    fn server_version(&self) -> Result<String> {
        let args = owned(&["version", "--format", "{{.Server.Version}}"]);
        let output = self.exec(&args)?;
        if output.status.success() {
            Ok(stdout_of(&output))
        } else {
            Err(VibePodError::RuntimeUnavailable(stderr_of(&output)))
        }
    }

    fn network_ensure(&self, name: &str) -> Result<()> {
        let label = format!("{}=true", LABEL_MANAGED);
        let args = owned(&["network", "create", "--driver", "bridge", "--label", &label, name]);
        let output = self.exec(&args)?;
        if output.status.success() {
            tracing::info!(network = name, "created network");
            return Ok(());
        }

        let stderr = stderr_of(&output);
        match classify_failure(&stderr) {
            FailureKind::AlreadyExists => Ok(()),
            _ => Err(failure(&args, &stderr)),
        }
    }

    fn network_connect(&self, network: &str, container: &ContainerHandle) -> Result<()> {
        let args = owned(&["network", "connect", network, &container.name]);
        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = stderr_of(&output);
        match classify_failure(&stderr) {
            FailureKind::AlreadyExists => Ok(()),
            _ => Err(failure(&args, &stderr)),
        }
    }

    fn image_pull(&self, image: &str) -> Result<()> {
        let args = owned(&["pull", "--quiet", image]);
        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = stderr_of(&output);
        match classify_failure(&stderr) {
            FailureKind::DaemonUnreachable => Err(VibePodError::RuntimeUnavailable(stderr)),
            _ => Err(VibePodError::ImagePull {
                image: image.to_string(),
                message: stderr,
            }),
        }
    }

    fn image_exists_locally(&self, image: &str) -> Result<bool> {
        let args = owned(&["image", "inspect", "--format", "{{.Id}}", image]);
        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(true);
        }

        let stderr = stderr_of(&output);
        match classify_failure(&stderr) {
            FailureKind::NotFound => Ok(false),
            _ => Err(failure(&args, &stderr)),
        }
    }

    fn container_create(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let mut args = owned(&["create"]);
        args.extend(container_args(spec));

        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(ContainerHandle {
                name: spec.name.clone(),
                id: Some(stdout_of(&output)),
            });
        }

        let stderr = stderr_of(&output);
        match classify_failure(&stderr) {
            FailureKind::NameConflict => Err(VibePodError::ContainerConflict(spec.name.clone())),
            _ => Err(failure(&args, &stderr)),
        }
    }

    fn container_start(&self, container: &ContainerHandle) -> Result<()> {
        let args = owned(&["start", &container.name]);
        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = stderr_of(&output);
        match classify_failure(&stderr) {
            FailureKind::NotFound => Err(VibePodError::ContainerNotFound(container.name.clone())),
            _ => Err(failure(&args, &stderr)),
        }
    }

    fn container_attach(
        &self,
        container: &ContainerHandle,
        cancel: &CancellationToken,
    ) -> Result<AttachOutcome> {
        let args = owned(&["attach", "--sig-proxy=false", &container.name]);
        tracing::debug!(command = %render(&args), "docker");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| VibePodError::Runtime(format!("Failed to attach: {}", e)))?;

        loop {
            if cancel.is_cancelled() {
                // The attach client is ours to reap; the container is handled
                // by the caller's terminate sequence.
                let _ = child.kill();
                let _ = child.wait();
                return Ok(AttachOutcome::Interrupted);
            }

            if let Some(status) = child.wait_timeout(ATTACH_POLL)? {
                return Ok(AttachOutcome::Exited(status.code().unwrap_or(1)));
            }
        }
    }

    fn container_signal(&self, container: &ContainerHandle, signal: Signal) -> Result<()> {
        let args = owned(&["kill", "--signal", signal.as_str(), &container.name]);
        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = stderr_of(&output);
        match classify_failure(&stderr) {
            FailureKind::NotRunning => Ok(()),
            FailureKind::NotFound => Err(VibePodError::ContainerNotFound(container.name.clone())),
            _ => Err(failure(&args, &stderr)),
        }
    }

    fn container_wait(&self, container: &ContainerHandle, timeout: Duration) -> Result<WaitOutcome> {
        let args = owned(&["wait", &container.name]);
        tracing::debug!(command = %render(&args), ?timeout, "docker");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VibePodError::Runtime(format!("Failed to run {}: {}", render(&args), e)))?;

        let Some(status) = child.wait_timeout(timeout)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(WaitOutcome::TimedOut);
        };

        let mut stdout = String::new();
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_string(&mut stdout)?;
        }
        if let Some(mut pipe) = child.stderr.take() {
            pipe.read_to_string(&mut stderr)?;
        }

        if status.success() {
            let code = stdout.trim().parse().unwrap_or(0);
            return Ok(WaitOutcome::Exited(code));
        }

        let stderr = stderr.trim();
        match classify_failure(stderr) {
            FailureKind::NotFound => Err(VibePodError::ContainerNotFound(container.name.clone())),
            _ => Err(failure(&args, stderr)),
        }
    }

    fn container_remove(&self, container: &ContainerHandle) -> Result<()> {
        let args = owned(&["rm", "--force", &container.name]);
        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = stderr_of(&output);
        if stderr.to_lowercase().contains("already in progress") {
            return Ok(());
        }
        match classify_failure(&stderr) {
            FailureKind::NotFound => Ok(()),
            _ => Err(failure(&args, &stderr)),
        }
    }

    fn container_list(&self, filter: &LabelFilter) -> Result<Vec<ContainerSummary>> {
        let mut args = owned(&["ps", "--all", "--no-trunc", "--format", "{{json .}}"]);
        for (key, value) in filter.pairs() {
            args.push("--filter".into());
            args.push(format!("label={}={}", key, value));
        }

        let stdout = self.run(&args)?;
        let mut containers: Vec<ContainerSummary> =
            stdout.lines().filter_map(parse_ps_line).collect();
        if containers.is_empty() {
            return Ok(containers);
        }

        let ids: Vec<&str> = containers.iter().map(|c| c.id.as_str()).collect();
        let mut labels = self.inspect_labels(&ids)?;
        for container in &mut containers {
            if let Some(full) = labels.remove(&container.id) {
                container.labels = full;
            }
        }
        Ok(containers)
    }

    fn container_state(&self, name: &str) -> Result<Option<ContainerState>> {
        let args = owned(&["container", "inspect", "--format", "{{.State.Status}}", name]);
        let output = self.exec(&args)?;
        if output.status.success() {
            return Ok(Some(ContainerState::parse(&stdout_of(&output))));
        }

        let stderr = stderr_of(&output);
        match classify_failure(&stderr) {
            FailureKind::NotFound => Ok(None),
            _ => Err(failure(&args, &stderr)),
        }
    }

    fn container_ip(&self, container: &ContainerHandle, network: &str) -> Result<Option<String>> {
        let args = owned(&[
            "container",
            "inspect",
            "--format",
            "{{json .NetworkSettings.Networks}}",
            &container.name,
        ]);
        let output = self.exec(&args)?;
        if !output.status.success() {
            let stderr = stderr_of(&output);
            return match classify_failure(&stderr) {
                FailureKind::NotFound => Ok(None),
                _ => Err(failure(&args, &stderr)),
            };
        }

        let networks: serde_json::Value = serde_json::from_str(&stdout_of(&output))?;
        Ok(networks
            .get(network)
            .and_then(|n| n.get("IPAddress"))
            .and_then(|ip| ip.as_str())
            .filter(|ip| !ip.is_empty())
            .map(str::to_string))
    }

    fn compose_networks_for(&self, manifest: &Path) -> Result<Vec<NetworkRef>> {
        let project = compose_project_name(manifest)?;
        let filter = format!("label={}={}", COMPOSE_PROJECT_LABEL, project);
        let args = owned(&["network", "ls", "--filter", &filter, "--format", "{{.Name}}"]);

        let stdout = self.run(&args)?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| NetworkRef {
                name: name.to_string(),
            })
            .collect())
    }

    fn run_sidecar(&self, spec: &ContainerSpec) -> Result<ContainerHandle> {
        let mut args = owned(&["run", "--detach"]);
        args.extend(container_args(spec));

        let output = self.exec(&args)?;
        if output.status.success() {
            tracing::info!(container = %spec.name, "started sidecar");
            return Ok(ContainerHandle {
                name: spec.name.clone(),
                id: Some(stdout_of(&output)),
            });
        }

        let stderr = stderr_of(&output);
        match classify_failure(&stderr) {
            FailureKind::NameConflict => {
                let handle = ContainerHandle::named(spec.name.clone());
                self.container_start(&handle)?;
                Ok(handle)
            }
            _ => Err(failure(&args, &stderr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Mount, PortBinding};

    #[test]
    fn test_classify_daemon_unreachable() {
        let stderr = "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?";
        assert_eq!(classify_failure(stderr), FailureKind::DaemonUnreachable);
        assert_eq!(
            classify_failure("error during connect: Get \"http://%2F%2F.%2Fpipe\""),
            FailureKind::DaemonUnreachable
        );
    }

    #[test]
    fn test_classify_name_conflict() {
        let stderr = "docker: Error response from daemon: Conflict. The container name \"/vibepod-proxy\" is already in use by container \"abc\".";
        assert_eq!(classify_failure(stderr), FailureKind::NameConflict);
    }

    #[test]
    fn test_classify_network_exists() {
        assert_eq!(
            classify_failure("Error response from daemon: network with name vibepod-network already exists"),
            FailureKind::AlreadyExists
        );
    }

    #[test]
    fn test_classify_missing_and_stopped() {
        assert_eq!(
            classify_failure("Error response from daemon: No such container: vibepod-claude"),
            FailureKind::NotFound
        );
        assert_eq!(
            classify_failure("Error response from daemon: cannot kill container: abc: container abc is not running"),
            FailureKind::NotRunning
        );
        assert_eq!(classify_failure("something else"), FailureKind::Other);
    }

    #[test]
    fn test_container_args_order() {
        let spec = ContainerSpec {
            name: "vibepod-claude-1234abcd".into(),
            image: "nezhar/claude-container:latest".into(),
            labels: [("vibepod.managed".to_string(), "true".to_string())].into(),
            env: [("A".to_string(), "1".to_string())].into(),
            mounts: vec![Mount::rw("/repo", "/workspace")],
            network: Some("vibepod-network".into()),
            workdir: Some("/workspace".into()),
            command: vec!["claude".into()],
            platform: Some("linux/amd64".into()),
            user: Some("1000:1000".into()),
            ports: vec![PortBinding {
                host: 8001,
                container: 8001,
            }],
            interactive: true,
            auto_remove: true,
        };

        let args = container_args(&spec);
        let expected: Vec<String> = [
            "--name",
            "vibepod-claude-1234abcd",
            "--label",
            "vibepod.managed=true",
            "-e",
            "A=1",
            "-v",
            "/repo:/workspace:rw",
            "--network",
            "vibepod-network",
            "-w",
            "/workspace",
            "--platform",
            "linux/amd64",
            "--user",
            "1000:1000",
            "-p",
            "8001:8001",
            "-i",
            "-t",
            "--rm",
            "nezhar/claude-container:latest",
            "claude",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn test_parse_ps_line() {
        let line = r#"{"ID":"f00d","Names":"vibepod-claude-1234abcd","Image":"nezhar/claude-container:latest","State":"running","Labels":"vibepod.agent=claude,vibepod.managed=true,vibepod.workspace=/repo","CreatedAt":"2024-05-01 10:00:00 +0200 CEST","Status":"Up 5 minutes"}"#;
        let summary = parse_ps_line(line).unwrap();
        assert_eq!(summary.name, "vibepod-claude-1234abcd");
        assert!(summary.state.is_running());
        assert_eq!(summary.agent(), Some(crate::agents::AgentId::Claude));
        assert_eq!(summary.workspace(), Some("/repo"));
        assert!(summary.created_at.is_some());
    }

    #[test]
    fn test_parse_inspect_labels_keeps_commas() {
        let line = r#"f00d {"vibepod.agent":"claude","vibepod.workspace":"/src/a,b"}"#;
        let (id, labels) = parse_inspect_labels(line).unwrap();
        assert_eq!(id, "f00d");
        assert_eq!(labels["vibepod.workspace"], "/src/a,b");

        let (_, empty) = parse_inspect_labels("beef null").unwrap();
        assert!(empty.is_empty());
        assert!(parse_inspect_labels("garbage").is_none());
    }

    #[test]
    fn test_parse_ps_line_rejects_garbage() {
        assert!(parse_ps_line("not json").is_none());
        assert!(parse_ps_line("{}").is_none());
    }

    #[test]
    fn test_parse_created_at() {
        let parsed = parse_created_at("2024-05-01 10:00:00 +0200 CEST").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T10:00:00+02:00");
        assert!(parse_created_at("yesterday").is_none());
    }
}
