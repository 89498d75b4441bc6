use crate::error::{Result, VibePodError};
use crate::utils::path::expand_tilde;
use std::path::PathBuf;

/// A host directory bind-mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: PathBuf,
    pub target: PathBuf,
    pub writable: bool,
}

impl Mount {
    pub fn rw(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            writable: true,
        }
    }

    pub fn ro(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            writable: false,
            ..Self::rw(source, target)
        }
    }

    /// Parse a volume specification from `agents.<id>.volumes`.
    ///
    /// Formats:
    /// - `/host/path` - writable, same path in the container
    /// - `/host/path:ro` - read-only, same path in the container
    /// - `/host/path:/container/path` - writable, custom container path
    /// - `/host/path:/container/path:ro` - read-only, custom container path
    pub fn from_spec(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();

        let (source, target, mode) = match parts.as_slice() {
            [host] => (host_path(host, spec)?, None, None),
            [host, mode @ ("ro" | "rw")] => (host_path(host, spec)?, None, Some(*mode)),
            [host, target] => (host_path(host, spec)?, Some(container_path(target, spec)?), None),
            [host, target, mode] => (
                host_path(host, spec)?,
                Some(container_path(target, spec)?),
                Some(*mode),
            ),
            _ => {
                return Err(VibePodError::InvalidArgument(format!(
                    "Invalid volume '{}': too many colons",
                    spec
                )))
            }
        };

        let writable = match mode {
            None | Some("rw") => true,
            Some("ro") => false,
            Some(other) => {
                return Err(VibePodError::InvalidArgument(format!(
                    "Invalid volume mode '{}' in '{}': must be 'ro' or 'rw'",
                    other, spec
                )))
            }
        };

        Ok(Self {
            target: target.unwrap_or_else(|| source.clone()),
            source,
            writable,
        })
    }

    /// `-v` argument for `docker create`.
    pub fn to_volume_arg(&self) -> String {
        format!(
            "{}:{}:{}",
            self.source.display(),
            self.target.display(),
            if self.writable { "rw" } else { "ro" }
        )
    }
}

fn host_path(raw: &str, spec: &str) -> Result<PathBuf> {
    let expanded = expand_tilde(raw).ok_or_else(|| {
        VibePodError::InvalidArgument(format!("Cannot expand '{}' in volume '{}'", raw, spec))
    })?;
    if !expanded.is_absolute() {
        return Err(VibePodError::InvalidArgument(format!(
            "Volume host path must be absolute: '{}'",
            spec
        )));
    }
    Ok(expanded)
}

fn container_path(raw: &str, spec: &str) -> Result<PathBuf> {
    let path = PathBuf::from(raw);
    if !path.is_absolute() {
        return Err(VibePodError::InvalidArgument(format!(
            "Volume container path must be absolute: '{}'",
            spec
        )));
    }
    Ok(path)
}

/// Parse volume specs, skipping exact duplicates and rejecting two mounts
/// on the same container path.
pub fn convert_volume_specs(specs: &[String]) -> Result<Vec<Mount>> {
    let mut mounts: Vec<Mount> = Vec::new();

    for spec in specs {
        let mount = Mount::from_spec(spec)?;

        if !mount.source.exists() {
            tracing::warn!(path = %mount.source.display(), "volume source does not exist");
        }

        if mounts.contains(&mount) {
            continue;
        }
        if mounts.iter().any(|m| m.target == mount.target) {
            return Err(VibePodError::InvalidArgument(format!(
                "Volume conflict: {} is already mounted",
                mount.target.display()
            )));
        }

        mounts.push(mount);
    }

    Ok(mounts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_spec_same_path() {
        let mount = Mount::from_spec("/data").unwrap();
        assert_eq!(mount, Mount::rw("/data", "/data"));
    }

    #[test]
    fn test_from_spec_readonly_same_path() {
        let mount = Mount::from_spec("/data:ro").unwrap();
        assert_eq!(mount, Mount::ro("/data", "/data"));
    }

    #[test]
    fn test_from_spec_custom_target() {
        let mount = Mount::from_spec("/host/cache:/root/.cache").unwrap();
        assert_eq!(mount, Mount::rw("/host/cache", "/root/.cache"));
        assert_eq!(mount.to_volume_arg(), "/host/cache:/root/.cache:rw");
    }

    #[test]
    fn test_from_spec_custom_target_readonly() {
        let mount = Mount::from_spec("/etc/ssl:/etc/ssl:ro").unwrap();
        assert!(!mount.writable);
        assert_eq!(mount.to_volume_arg(), "/etc/ssl:/etc/ssl:ro");
    }

    #[test]
    fn test_from_spec_rejects_bad_input() {
        assert!(Mount::from_spec("relative/path").is_err());
        assert!(Mount::from_spec("/a:relative").is_err());
        assert!(Mount::from_spec("/a:/b:rx").is_err());
        assert!(Mount::from_spec("/a:/b:ro:extra").is_err());
    }

    #[test]
    fn test_convert_volume_specs_dedupes_and_detects_conflicts() {
        let specs = vec!["/a:/x".to_string(), "/a:/x".to_string()];
        assert_eq!(convert_volume_specs(&specs).unwrap().len(), 1);

        let conflicting = vec!["/a:/x".to_string(), "/b:/x".to_string()];
        assert!(convert_volume_specs(&conflicting).is_err());
    }
}
