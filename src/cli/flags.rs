use clap::Parser;
use std::path::PathBuf;

/// Flags accepted by `run` and every agent alias.
#[derive(Parser, Debug, Clone, Default)]
pub struct RunFlags {
    /// Workspace directory to mount (default: current directory)
    #[arg(short = 'w', long)]
    pub workspace: Option<PathBuf>,

    /// Pull the image even if it exists locally
    #[arg(long)]
    pub pull: bool,

    /// Start the container in the background
    #[arg(short = 'd', long)]
    pub detach: bool,

    /// Set environment variable (KEY=VALUE)
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Load environment variables from file
    #[arg(long = "env-file")]
    pub env_file: Vec<PathBuf>,

    /// Container name (default: vibepod-<agent>-<hash>)
    #[arg(long)]
    pub name: Option<String>,

    /// Additional network to join, skipping compose detection
    #[arg(long)]
    pub network: Option<String>,
}

/// `--port` for the sidecar `start` commands.
#[derive(Parser, Debug, Clone, Default)]
pub struct PortFlag {
    /// Host port to publish
    #[arg(long)]
    pub port: Option<u16>,
}
