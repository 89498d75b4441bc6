use clap::{Parser, Subcommand};

pub mod flags;
pub mod router;
pub use flags::{PortFlag, RunFlags};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration after merging all sources
    Show {
        /// Print as JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Print config file locations
    Path {
        /// Only the global config file
        #[arg(long, conflicts_with = "project")]
        global: bool,

        /// Only the project config file
        #[arg(long)]
        project: bool,
    },

    /// Create a project config in the current workspace
    Init {
        /// Overwrite an existing project config
        #[arg(short = 'f', long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum LogsCommands {
    /// Start the log viewer and print its URL
    #[command(alias = "ui")]
    Start(PortFlag),

    /// Stop the log viewer
    Stop,
}

#[derive(Subcommand, Debug)]
pub enum ProxyCommands {
    /// Start the HTTP(S) proxy sidecar
    Start(PortFlag),

    /// Stop the proxy sidecar
    Stop {
        /// Kill without waiting for a graceful shutdown
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// Show whether the proxy is running
    Status,
}

#[derive(Parser, Debug)]
#[command(name = "vp")]
#[command(about = "One CLI for all AI coding agents, each in its own container", long_about = None)]
#[command(version = env!("VIBEPOD_VERSION"))]
#[command(after_help = "\
AGENT SHORTCUTS:
  Every agent name and its one-letter alias is shorthand for 'vp run <agent>':

  vp claude    vp c          Claude Code
  vp gemini    vp g          Gemini CLI
  vp opencode  vp o          OpenCode
  vp devstral  vp d          Devstral (Mistral Vibe)
  vp auggie    vp a          Auggie
  vp copilot   vp p          GitHub Copilot
  vp codex     vp x          Codex

  vp ui                      Shorthand for 'vp logs start'

For details about a specific command, use:
  vp <command> --help")]
pub struct Cli {
    /// Show debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an agent in a container attached to the workspace
    #[command(long_about = "Run an agent in a container attached to the workspace.\n\n\
        The workspace is mounted at /workspace. Without an agent argument the\n\
        configured default agent is used. Ctrl-C stops the container.")]
    Run(RunCmd),

    /// Stop running agent containers
    Stop {
        /// Agent whose container to stop
        agent: Option<String>,

        /// Stop every agent container
        #[arg(short = 'a', long, conflicts_with = "agent")]
        all: bool,

        /// Kill without waiting for a graceful shutdown
        #[arg(short = 'f', long)]
        force: bool,
    },

    /// List agents and their containers
    #[command(alias = "ls")]
    List {
        /// Only show running containers
        #[arg(short = 'r', long)]
        running: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Session log viewer
    Logs {
        #[command(subcommand)]
        command: LogsCommands,
    },

    /// HTTP(S) proxy sidecar
    Proxy {
        #[command(subcommand)]
        command: ProxyCommands,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show version information
    Version {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Agent to run (default: configured default agent)
    pub agent: Option<String>,

    #[command(flatten)]
    pub flags: RunFlags,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from([
            "vp", "run", "claude", "-w", "/tmp", "-d", "-e", "A=1", "-e", "B=2", "--pull",
        ]);
        let Some(Commands::Run(cmd)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(cmd.agent.as_deref(), Some("claude"));
        assert!(cmd.flags.detach);
        assert!(cmd.flags.pull);
        assert_eq!(cmd.flags.env, vec!["A=1", "B=2"]);
    }

    #[test]
    fn test_stop_all_conflicts_with_agent() {
        assert!(Cli::try_parse_from(["vp", "stop", "claude", "--all"]).is_err());
    }

    #[test]
    fn test_logs_ui_alias() {
        let cli = Cli::parse_from(["vp", "logs", "ui", "--port", "9000"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Logs {
                command: LogsCommands::Start(PortFlag { port: Some(9000) })
            })
        ));
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["vp", "list", "-v"]);
        assert!(cli.verbose);
    }
}
