use crate::error::{Result, VibePodError};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Parse `--env KEY=VALUE` arguments. Later duplicates win.
pub fn parse_env_args(env_args: &[String]) -> Result<BTreeMap<String, String>> {
    let mut env_vars = BTreeMap::new();

    for arg in env_args {
        match arg.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                env_vars.insert(key.trim().to_string(), value.to_string());
            }
            _ => {
                return Err(VibePodError::InvalidArgument(format!(
                    "Invalid env format: {}. Expected KEY=VALUE",
                    arg
                )));
            }
        }
    }

    Ok(env_vars)
}

/// Load `KEY=VALUE` lines from a dotenv-style file.
pub fn load_env_file(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        VibePodError::InvalidArgument(format!("Failed to read env file {}: {}", path.display(), e))
    })?;

    let mut env_vars = BTreeMap::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        if let Some((key, value)) = line.split_once('=') {
            env_vars.insert(key.trim().to_string(), unquote(value.trim()).to_string());
        } else {
            return Err(VibePodError::InvalidArgument(format!(
                "Invalid env format at {}:{}: {}",
                path.display(),
                line_num + 1,
                line
            )));
        }
    }

    Ok(env_vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
