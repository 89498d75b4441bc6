use super::Context;
use crate::cli::LogsCommands;
use crate::console;
use crate::error::{Result, VibePodError};
use crate::orchestrator::sidecar::Sidecar;
use crate::orchestrator::Orchestrator;
use crate::runtime::ContainerRuntime;

pub fn execute<R: ContainerRuntime + ?Sized>(
    ctx: &Context,
    runtime: &R,
    command: &LogsCommands,
) -> Result<()> {
    let orchestrator = Orchestrator::new(runtime, &ctx.config, &ctx.paths);

    match command {
        LogsCommands::Start(flag) => {
            if !ctx.config.logging.enabled {
                return Err(VibePodError::InvalidArgument(
                    "Logging is disabled; set 'logging.enabled: true' to use the log viewer"
                        .to_string(),
                ));
            }

            let requested = flag.port.unwrap_or(ctx.config.logging.ui_port);
            console::info(format!("Starting Datasette on http://localhost:{}", requested));
            // A running viewer keeps its original port
            let port = orchestrator.ensure_datasette(requested)?;
            console::success("Datasette is ready");
            println!("http://localhost:{}", port);
        }
        LogsCommands::Stop => {
            if orchestrator.stop_sidecar(Sidecar::Datasette, false)? {
                console::success("Datasette stopped");
            } else {
                console::warning("Datasette is not running");
            }
        }
    }
    Ok(())
}
