use super::Context;
use crate::config::{self, ConfigPaths, EnvMap};
use crate::console;
use crate::error::{Result, VibePodError};
use std::path::{Path, PathBuf};

const PROJECT_TEMPLATE: &str = "\
version: 1

# Agent used by 'vp run' without an argument
# default_agent: claude

# agents:
#   claude:
#     env:
#       ANTHROPIC_MODEL: claude-sonnet-4-5
#     volumes:
#       - ~/.gitconfig:/root/.gitconfig:ro

# proxy:
#   enabled: true
";

/// Print the merged configuration as YAML, or JSON with `--json`.
pub fn show(ctx: &Context, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    } else {
        print!("{}", ctx.config.to_yaml()?);
    }
    Ok(())
}

/// Print config file locations. Needs no valid config to work.
pub fn path(env: &EnvMap, cwd: &Path, global: bool, project: bool) -> Result<()> {
    let paths = ConfigPaths::from_env(env, cwd)?;
    let global_path = paths.global_config();
    let project_path = ConfigPaths::project_config(cwd);

    if global {
        println!("{}", global_path.display());
        return Ok(());
    }
    if project {
        println!("{}", project_path.display());
        return Ok(());
    }

    let logs_path = match config::load(&paths, cwd, env) {
        Ok(effective) => effective.logging.db_path,
        Err(e) => {
            tracing::debug!(error = %e, "config does not load, showing default logs path");
            paths.logs_db()
        }
    };

    println!("Global:  {}", global_path.display());
    println!("Project: {}", project_path.display());
    println!("Logs:    {}", logs_path.display());
    Ok(())
}

/// Write a starter project config under `<cwd>/.vibepod/`.
pub fn init(cwd: &Path, force: bool) -> Result<PathBuf> {
    let target = ConfigPaths::project_config(cwd);
    if target.exists() && !force {
        return Err(VibePodError::InvalidArgument(format!(
            "{} already exists; use --force to overwrite",
            target.display()
        )));
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, PROJECT_TEMPLATE)?;
    console::success(format!("Created {}", target.display()));
    Ok(target)
}
