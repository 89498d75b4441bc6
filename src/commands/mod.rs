pub mod config;
pub mod list;
pub mod logs;
pub mod proxy;
pub mod run;
pub mod stop;
pub mod version;

use crate::config::{ConfigPaths, EffectiveConfig, EnvMap};
use crate::error::Result;
use crate::runtime::{ContainerRuntime, DockerCli};
use crate::workspace::Workspace;
use std::path::Path;

/// Everything a command needs that is decided before the runtime is touched.
#[derive(Debug, Clone)]
pub struct Context {
    pub env: EnvMap,
    pub paths: ConfigPaths,
    pub workspace: Workspace,
    pub config: EffectiveConfig,
}

impl Context {
    /// Resolve the workspace, then load config layers for it. Fails on a
    /// missing workspace without contacting the runtime.
    pub fn load(workspace: Option<&Path>, cwd: &Path, env: EnvMap) -> Result<Self> {
        let workspace = Workspace::resolve(workspace, cwd)?;
        let paths = ConfigPaths::from_env(&env, cwd)?;
        let config = crate::config::load(&paths, workspace.root(), &env)?;
        Ok(Self {
            env,
            paths,
            workspace,
            config,
        })
    }
}

/// Locate the docker CLI and make sure the daemon answers.
pub fn connect() -> Result<DockerCli> {
    let docker = DockerCli::connect()?;
    docker.ping()?;
    Ok(docker)
}
