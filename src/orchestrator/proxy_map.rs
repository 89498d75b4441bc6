//! `containers.json`: lets the proxy attribute traffic to the agent
//! container that sent it, keyed by the container's IP on the shared network.

use crate::agents::AgentId;
use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub const MAPPING_FILE: &str = "containers.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub container_id: String,
    pub container_name: String,
    pub agent: String,
    pub started_at: String,
}

pub fn mapping_path(proxy_dir: &Path) -> PathBuf {
    proxy_dir.join(MAPPING_FILE)
}

/// Merge one `ip -> container` entry into the mapping file.
///
/// Concurrent runs serialize on an exclusive lock held across the
/// read-modify-write. An unreadable or corrupt existing file is replaced.
/// The write goes to a temporary sibling first and is renamed into place.
pub fn record(
    path: &Path,
    ip: &str,
    container_id: &str,
    container_name: &str,
    agent: AgentId,
) -> Result<()> {
    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path.with_extension("lock"))?;
    lock.lock_exclusive()?;

    let mut mapping: BTreeMap<String, MappingEntry> = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default();

    mapping.insert(
        ip.to_string(),
        MappingEntry {
            container_id: container_id.to_string(),
            container_name: container_name.to_string(),
            agent: agent.to_string(),
            started_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        },
    );

    let tmp_path = path.with_extension(format!(
        "{}.{}.tmp",
        std::process::id(),
        Utc::now().timestamp_subsec_nanos()
    ));
    std::fs::write(&tmp_path, serde_json::to_string_pretty(&mapping)?)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> BTreeMap<String, MappingEntry> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_record_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = mapping_path(dir.path());

        record(&path, "172.18.0.5", "abc123", "vibepod-claude-1", AgentId::Claude).unwrap();

        let mapping = read(&path);
        let entry = &mapping["172.18.0.5"];
        assert_eq!(entry.container_id, "abc123");
        assert_eq!(entry.agent, "claude");
        assert!(entry.started_at.ends_with("+00:00"));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_record_merges_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = mapping_path(dir.path());

        record(&path, "172.18.0.5", "a", "one", AgentId::Claude).unwrap();
        record(&path, "172.18.0.6", "b", "two", AgentId::Codex).unwrap();
        record(&path, "172.18.0.5", "c", "three", AgentId::Gemini).unwrap();

        let mapping = read(&path);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping["172.18.0.5"].container_id, "c");
        assert_eq!(mapping["172.18.0.6"].agent, "codex");
    }

    #[test]
    fn test_concurrent_records_keep_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = mapping_path(dir.path());

        std::thread::scope(|scope| {
            for i in 0..8 {
                let path = &path;
                scope.spawn(move || {
                    let ip = format!("172.18.0.{}", 10 + i);
                    let name = format!("vibepod-claude-{}", i);
                    record(path, &ip, &name, &name, AgentId::Claude).unwrap();
                });
            }
        });

        let mapping = read(&path);
        assert_eq!(mapping.len(), 8);
        assert_eq!(mapping["172.18.0.10"].container_name, "vibepod-claude-0");
        assert_eq!(mapping["172.18.0.17"].container_name, "vibepod-claude-7");
    }

    #[test]
    fn test_record_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = mapping_path(dir.path());
        std::fs::write(&path, "{not json").unwrap();

        record(&path, "10.0.0.2", "a", "one", AgentId::Auggie).unwrap();
        assert_eq!(read(&path).len(), 1);
    }

    #[test]
    fn test_record_fails_when_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join(MAPPING_FILE);
        assert!(record(&path, "10.0.0.2", "a", "one", AgentId::Claude).is_err());
    }
}
