#![forbid(unsafe_code)]

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::Path;

use vibepod::cli::{router, Cli, Commands, ConfigCommands};
use vibepod::commands::{self, Context};
use vibepod::config::{self, EnvMap, LogLevel};
use vibepod::console;
use vibepod::error::{VibePodError, EXIT_ERROR};
use vibepod::telemetry::{self, TelemetryConfig};

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(err) => report(&err),
    };
    std::process::exit(code);
}

/// Print `Error:`/`Hint:` lines and pick the exit code.
fn report(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<VibePodError>() {
        Some(VibePodError::Interrupted) => {
            console::info("Interrupted");
            VibePodError::Interrupted.exit_code()
        }
        Some(e) => {
            console::error(e.to_string());
            if let Some(hint) = e.hint() {
                console::hint(hint);
            }
            e.exit_code()
        }
        None => {
            console::error(format!("{:#}", err));
            EXIT_ERROR
        }
    }
}

fn init_logging(level: LogLevel, verbose: bool, no_color: bool) {
    console::set_color(!no_color);
    if let Err(e) = telemetry::init(&TelemetryConfig::new(level, verbose, no_color)) {
        eprintln!("Warning: logging unavailable: {}", e);
    }
}

/// Load workspace and config, then set up logging from the result.
fn context(workspace: Option<&Path>, cwd: &Path, env: EnvMap, verbose: bool) -> Result<Context> {
    let ctx = Context::load(workspace, cwd, env)?;
    init_logging(ctx.config.log_level, verbose, ctx.config.no_color);
    Ok(ctx)
}

fn run() -> Result<i32> {
    let routed_args = router::route_args(std::env::args_os());
    let cli = Cli::parse_from(routed_args);

    let Some(command) = &cli.command else {
        Cli::command().print_help()?;
        return Ok(0);
    };

    let env = config::env::snapshot();
    let cwd = std::env::current_dir()?;
    let verbose = cli.verbose;
    let no_color = env
        .get("VP_NO_COLOR")
        .is_some_and(|v| config::env::parse_bool(v));

    match command {
        // These work without a valid config
        Commands::Version { json } => {
            init_logging(LogLevel::default(), verbose, no_color);
            commands::version::execute(*json)?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path { global, project } => {
                init_logging(LogLevel::default(), verbose, no_color);
                commands::config::path(&env, &cwd, *global, *project)?;
            }
            ConfigCommands::Init { force } => {
                init_logging(LogLevel::default(), verbose, no_color);
                commands::config::init(&cwd, *force)?;
            }
            ConfigCommands::Show { json } => {
                let ctx = context(None, &cwd, env, verbose)?;
                commands::config::show(&ctx, *json)?;
            }
        },

        Commands::Run(cmd) => {
            // Workspace, config and agent are checked before Docker is contacted
            let ctx = context(cmd.flags.workspace.as_deref(), &cwd, env, verbose)?;
            let agent = ctx.config.select_agent(cmd.agent.as_deref())?;
            let docker = commands::connect()?;
            return Ok(commands::run::execute(&ctx, agent, &cmd.flags, &docker)?);
        }
        Commands::Stop { agent, all, force } => {
            let target = commands::stop::target(agent.as_deref(), *all)?;
            let ctx = context(None, &cwd, env, verbose)?;
            let docker = commands::connect()?;
            commands::stop::execute(&ctx, &docker, target, *force)?;
        }
        Commands::List { running, json } => {
            let ctx = context(None, &cwd, env, verbose)?;
            commands::list::execute(&ctx, commands::connect(), *running, *json)?;
        }
        Commands::Logs { command } => {
            let ctx = context(None, &cwd, env, verbose)?;
            let docker = commands::connect()?;
            commands::logs::execute(&ctx, &docker, command)?;
        }
        Commands::Proxy { command } => {
            let ctx = context(None, &cwd, env, verbose)?;
            let docker = commands::connect()?;
            commands::proxy::execute(&ctx, &docker, command)?;
        }
    }

    Ok(0)
}
