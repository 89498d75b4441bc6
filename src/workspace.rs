use crate::agents::AgentId;
use crate::error::{Result, VibePodError};
use crate::runtime::{ContainerRuntime, NetworkRef};
use std::path::{Path, PathBuf};

/// Mount point of the workspace inside every agent container.
pub const WORKSPACE_MOUNT: &str = "/workspace";

/// Compose manifests recognised at the workspace root, in lookup order.
pub const COMPOSE_MANIFESTS: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// The host directory an agent works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    disambiguator: String,
}

impl Workspace {
    /// Resolve `--workspace` (or the current directory) to an existing,
    /// absolute directory. Touches only the filesystem.
    pub fn resolve(requested: Option<&Path>, cwd: &Path) -> Result<Self> {
        let candidate = match requested {
            Some(path) => {
                let expanded = crate::utils::path::expand_tilde(path)
                    .unwrap_or_else(|| path.to_path_buf());
                if expanded.is_absolute() {
                    expanded
                } else {
                    cwd.join(expanded)
                }
            }
            None => cwd.to_path_buf(),
        };

        if !candidate.is_dir() {
            return Err(VibePodError::WorkspaceNotFound(candidate));
        }

        let root = candidate
            .canonicalize()
            .map_err(|_| VibePodError::WorkspaceNotFound(candidate.clone()))?;
        Ok(Self::from_root(root))
    }

    fn from_root(root: PathBuf) -> Self {
        let disambiguator = Self::generate_disambiguator(&root);
        Self {
            root,
            disambiguator,
        }
    }

    /// First 8 hex digits of the MD5 of the absolute path.
    fn generate_disambiguator(root: &Path) -> String {
        let digest = md5::compute(root.to_string_lossy().as_bytes());
        format!("{:x}", digest)[..8].to_string()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic container name: `vibepod-<agent>-<hash>`.
    pub fn container_name(&self, agent: AgentId) -> String {
        format!("vibepod-{}-{}", agent, self.disambiguator)
    }

    /// The compose manifest at the workspace root, if any. Not recursive.
    pub fn compose_manifest(&self) -> Option<PathBuf> {
        COMPOSE_MANIFESTS
            .iter()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file())
    }
}

/// Compose project name: the manifest's top-level `name:`, else the
/// sanitized name of the directory holding it.
pub fn compose_project_name(manifest: &Path) -> Result<String> {
    let content = std::fs::read_to_string(manifest)?;

    if let Ok(serde_yaml::Value::Mapping(map)) = serde_yaml::from_str::<serde_yaml::Value>(&content)
    {
        if let Some(name) = map.get("name").and_then(|v| v.as_str()) {
            let sanitized = sanitize_project_name(name);
            if !sanitized.is_empty() {
                return Ok(sanitized);
            }
        }
    }

    let dir_name = manifest
        .parent()
        .and_then(|dir| dir.file_name())
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let sanitized = sanitize_project_name(dir_name);
    if sanitized.is_empty() {
        return Err(VibePodError::InvalidArgument(format!(
            "Cannot derive a compose project name for {}",
            manifest.display()
        )));
    }
    Ok(sanitized)
}

/// Normalize like compose: lowercase, keep `[a-z0-9_-]`, and start with a
/// letter or digit.
fn sanitize_project_name(name: &str) -> String {
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    kept.trim_start_matches(['-', '_']).to_string()
}

/// Prefer `<project>_default`, otherwise the first network by name.
pub fn pick_compose_network(project: &str, networks: &[NetworkRef]) -> Option<String> {
    let preferred = format!("{}_default", project);
    if networks.iter().any(|n| n.name == preferred) {
        return Some(preferred);
    }

    let mut names: Vec<&str> = networks.iter().map(|n| n.name.as_str()).collect();
    names.sort_unstable();
    names.first().map(|name| name.to_string())
}

/// Decide which compose network (if any) the agent should also join.
///
/// An explicit `--network` always wins and skips detection. Only reads from
/// the runtime.
pub fn detect_compose_network<R: ContainerRuntime + ?Sized>(
    workspace: &Workspace,
    runtime: &R,
    explicit: Option<&str>,
) -> Result<Option<String>> {
    if let Some(network) = explicit.map(str::trim).filter(|n| !n.is_empty()) {
        return Ok(Some(network.to_string()));
    }

    let Some(manifest) = workspace.compose_manifest() else {
        return Ok(None);
    };

    let project = compose_project_name(&manifest)?;
    let networks = runtime.compose_networks_for(&manifest)?;
    let chosen = pick_compose_network(&project, &networks);

    match &chosen {
        Some(network) => tracing::info!(%network, manifest = %manifest.display(), "joining compose network"),
        None => tracing::debug!(
            manifest = %manifest.display(),
            "compose manifest found but no networks exist yet"
        ),
    }
    Ok(chosen)
}
