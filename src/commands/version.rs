use crate::error::Result;
use crate::runtime::{ContainerRuntime, DockerCli};
use crate::version;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct VersionInfo {
    vibepod: &'static str,
    platform: String,
    docker: String,
}

pub fn execute(json: bool) -> Result<()> {
    let info = VersionInfo {
        vibepod: version::VERSION,
        platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        docker: docker_version(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("VibePod CLI: {}", info.vibepod);
    println!("Platform:    {}", info.platform);
    println!("Docker:      {}", info.docker);
    Ok(())
}

fn docker_version() -> String {
    DockerCli::connect()
        .and_then(|docker| docker.server_version())
        .unwrap_or_else(|e| {
            tracing::debug!(error = %e, "docker version unavailable");
            "unavailable".to_string()
        })
}
