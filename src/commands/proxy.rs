use super::Context;
use crate::cli::ProxyCommands;
use crate::console;
use crate::error::Result;
use crate::orchestrator::sidecar::Sidecar;
use crate::orchestrator::Orchestrator;
use crate::runtime::ContainerRuntime;
use crate::utils::path::HostUser;

pub fn execute<R: ContainerRuntime + ?Sized>(
    ctx: &Context,
    runtime: &R,
    command: &ProxyCommands,
) -> Result<()> {
    match command {
        ProxyCommands::Start(flag) => {
            // The port is where agents reach the proxy on the shared network
            let mut config = ctx.config.clone();
            if let Some(port) = flag.port {
                config.proxy.port = port;
            }
            let orchestrator = Orchestrator::new(runtime, &config, &ctx.paths);

            console::info(format!("Starting proxy on port {}", config.proxy.port));
            let port = orchestrator.ensure_proxy(HostUser::current())?;
            console::success(format!("Proxy is running on port {}", port));
        }
        ProxyCommands::Stop { force } => {
            let orchestrator = Orchestrator::new(runtime, &ctx.config, &ctx.paths);
            if orchestrator.stop_sidecar(Sidecar::Proxy, *force)? {
                console::success("Proxy stopped");
            } else {
                console::warning("Proxy is not running");
            }
        }
        ProxyCommands::Status => {
            let orchestrator = Orchestrator::new(runtime, &ctx.config, &ctx.paths);
            match orchestrator.sidecar_state(Sidecar::Proxy)? {
                Some(state) => console::info(format!(
                    "Proxy container: {} ({})",
                    Sidecar::Proxy.container_name(),
                    state
                )),
                None => console::info("Proxy is not running"),
            }
        }
    }
    Ok(())
}
