use super::Context;
use crate::agents::{resolve_image, AgentId};
use crate::cli::RunFlags;
use crate::console;
use crate::error::Result;
use crate::orchestrator::{Orchestrator, RunPlan, RunState};
use crate::runtime::ContainerRuntime;
use crate::signal;
use crate::utils::env::{load_env_file, parse_env_args};
use crate::utils::path::HostUser;
use crate::workspace::detect_compose_network;
use std::collections::BTreeMap;

/// Run an agent; returns the exit code to propagate.
pub fn execute<R: ContainerRuntime + ?Sized>(
    ctx: &Context,
    agent: AgentId,
    flags: &RunFlags,
    runtime: &R,
) -> Result<i32> {
    // Files first, in order, then --env flags on top
    let mut env = BTreeMap::new();
    for file in &flags.env_file {
        env.extend(load_env_file(file)?);
    }
    env.extend(parse_env_args(&flags.env)?);

    let image = resolve_image(agent, &ctx.config, &ctx.env);
    let compose_network =
        detect_compose_network(&ctx.workspace, runtime, flags.network.as_deref())?;
    ctx.paths.ensure_dirs()?;

    let plan = RunPlan {
        agent,
        image,
        workspace: ctx.workspace.clone(),
        compose_network,
        pull: flags.pull,
        detach: flags.detach,
        env,
        name: flags.name.clone(),
        host_user: HostUser::current(),
    };

    tracing::debug!(
        agent = %plan.agent,
        image = %plan.image,
        workspace = %plan.workspace.root().display(),
        "run plan"
    );

    let cancel = signal::interrupt_token();
    let outcome = Orchestrator::new(runtime, &ctx.config, &ctx.paths).run(&plan, &cancel)?;
    cancel.cancel();

    match outcome.state {
        RunState::Detached => {
            console::success(format!("{} is running in the background", outcome.container.name));
            console::info(format!("Attach with: docker attach {}", outcome.container.name));
            console::info(format!("Stop with:   vp stop {}", plan.agent));
        }
        _ if outcome.exit_code != 0 => {
            tracing::debug!(code = outcome.exit_code, "agent exited with non-zero status");
        }
        _ => {}
    }

    Ok(outcome.exit_code)
}
