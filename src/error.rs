use std::path::PathBuf;
use thiserror::Error;

pub const EXIT_ERROR: i32 = 1;
pub const EXIT_INVALID_ARGS: i32 = 2;
pub const EXIT_RUNTIME_UNAVAILABLE: i32 = 3;
pub const EXIT_IMAGE_ERROR: i32 = 4;
pub const EXIT_CONTAINER_ERROR: i32 = 7;
pub const EXIT_CONFIG_ERROR: i32 = 8;
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Error, Debug)]
pub enum VibePodError {
    #[error("Invalid config in {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("Unsupported config version {found} in {path} (supported: 1)")]
    ConfigVersion { path: String, found: String },

    #[error("Unknown agent '{agent}'. Supported: {}", .valid.join(", "))]
    UnknownAgent { agent: String, valid: Vec<String> },

    #[error("Workspace not found: {}", .0.display())]
    WorkspaceNotFound(PathBuf),

    #[error("Container runtime is not available: {0}")]
    RuntimeUnavailable(String),

    #[error("Failed to pull image {image}: {message}")]
    ImagePull { image: String, message: String },

    #[error("Sidecar {sidecar} failed to start: {message}")]
    SidecarStart { sidecar: String, message: String },

    #[error("No container found for {0}")]
    ContainerNotFound(String),

    #[error("Container {0} is already running")]
    ContainerConflict(String),

    #[error("Container runtime call failed: {0}")]
    Runtime(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Logs database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl VibePodError {
    /// Process exit status for this error category.
    pub fn exit_code(&self) -> i32 {
        match self {
            VibePodError::ConfigParse { .. } | VibePodError::ConfigVersion { .. } => {
                EXIT_CONFIG_ERROR
            }
            VibePodError::UnknownAgent { .. }
            | VibePodError::WorkspaceNotFound(_)
            | VibePodError::InvalidArgument(_) => EXIT_INVALID_ARGS,
            VibePodError::RuntimeUnavailable(_) => EXIT_RUNTIME_UNAVAILABLE,
            VibePodError::ImagePull { .. } => EXIT_IMAGE_ERROR,
            VibePodError::SidecarStart { .. }
            | VibePodError::ContainerNotFound(_)
            | VibePodError::ContainerConflict(_)
            | VibePodError::Runtime(_) => EXIT_CONTAINER_ERROR,
            VibePodError::Interrupted => EXIT_INTERRUPTED,
            VibePodError::Io(_) | VibePodError::Json(_) | VibePodError::Database(_) => EXIT_ERROR,
        }
    }

    /// Remediation hint printed under the error message.
    pub fn hint(&self) -> Option<String> {
        match self {
            VibePodError::ConfigParse { .. } => {
                Some("Fix the offending key or run 'vp config show' to inspect the merged config.".to_string())
            }
            VibePodError::ConfigVersion { .. } => Some("Set 'version: 1' in the config file.".to_string()),
            VibePodError::UnknownAgent { .. } => Some("Run 'vp list' to see supported agents.".to_string()),
            VibePodError::WorkspaceNotFound(_) => {
                Some("Pass an existing directory with --workspace.".to_string())
            }
            VibePodError::RuntimeUnavailable(_) => {
                Some("Is Docker running? Start Docker Desktop (or dockerd) and retry.".to_string())
            }
            VibePodError::ImagePull { image, .. } => Some(format!(
                "Check your network and registry credentials, or override the image with VP_IMAGE_<AGENT> (tried {}).",
                image
            )),
            VibePodError::SidecarStart { sidecar, .. } => Some(format!(
                "Inspect it with 'docker logs {}', or disable it in the config.",
                sidecar
            )),
            VibePodError::ContainerConflict(name) => Some(format!(
                "Attach with 'docker attach {}' or stop it with 'vp stop'.",
                name
            )),
            _ => None,
        }
    }

    /// Informational outcomes that should never fail a command.
    pub fn is_benign(&self) -> bool {
        matches!(self, VibePodError::ContainerNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, VibePodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_agent_lists_valid_ids() {
        let err = VibePodError::UnknownAgent {
            agent: "nope".to_string(),
            valid: vec!["claude".to_string(), "gemini".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown agent 'nope'. Supported: claude, gemini"
        );
        assert_eq!(err.exit_code(), EXIT_INVALID_ARGS);
    }

    #[test]
    fn test_runtime_unavailable_has_docker_hint() {
        let err = VibePodError::RuntimeUnavailable("connection refused".to_string());
        assert_eq!(err.exit_code(), EXIT_RUNTIME_UNAVAILABLE);
        assert!(err.hint().unwrap().contains("Is Docker running?"));
    }

    #[test]
    fn test_config_errors_share_exit_code() {
        let parse = VibePodError::ConfigParse {
            path: "/tmp/config.yaml".to_string(),
            message: "auto_pull: invalid type".to_string(),
        };
        let version = VibePodError::ConfigVersion {
            path: "/tmp/config.yaml".to_string(),
            found: "2".to_string(),
        };
        assert_eq!(parse.exit_code(), EXIT_CONFIG_ERROR);
        assert_eq!(version.exit_code(), EXIT_CONFIG_ERROR);
        assert!(parse.to_string().contains("/tmp/config.yaml"));
    }

    #[test]
    fn test_container_not_found_is_benign() {
        assert!(VibePodError::ContainerNotFound("claude".to_string()).is_benign());
        assert!(!VibePodError::Runtime("boom".to_string()).is_benign());
    }
}
