use super::Context;
use crate::agents::AgentId;
use crate::console;
use crate::error::{Result, VibePodError};
use crate::orchestrator::{Orchestrator, StopTarget};
use crate::runtime::ContainerRuntime;

/// Validate `stop` arguments before any runtime is contacted.
pub fn target(agent: Option<&str>, all: bool) -> Result<StopTarget> {
    match (agent, all) {
        (_, true) => Ok(StopTarget::All),
        (Some(name), false) => Ok(StopTarget::Agent(name.parse::<AgentId>()?)),
        (None, false) => Err(VibePodError::InvalidArgument(
            "Provide an AGENT or use --all".to_string(),
        )),
    }
}

pub fn execute<R: ContainerRuntime + ?Sized>(
    ctx: &Context,
    runtime: &R,
    target: StopTarget,
    force: bool,
) -> Result<()> {
    let report = Orchestrator::new(runtime, &ctx.config, &ctx.paths).stop(target, force)?;

    if report.is_empty() {
        match target {
            StopTarget::Agent(agent) => console::info(format!("No {} containers to stop", agent)),
            StopTarget::All => console::info("No agent containers to stop"),
        }
        return Ok(());
    }

    for name in &report.already_stopped {
        tracing::debug!(container = %name, "already stopped");
    }
    console::success(format!("Stopped {} container(s)", report.stopped.len()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_requires_agent_or_all() {
        assert!(matches!(
            target(None, false),
            Err(VibePodError::InvalidArgument(_))
        ));
        assert_eq!(target(None, true).unwrap(), StopTarget::All);
        assert_eq!(
            target(Some("Codex"), false).unwrap(),
            StopTarget::Agent(AgentId::Codex)
        );
        assert!(matches!(
            target(Some("cursor"), false),
            Err(VibePodError::UnknownAgent { .. })
        ));
    }
}
