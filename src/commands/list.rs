use super::Context;
use crate::agents::{resolve_image, AgentId};
use crate::console;
use crate::error::{Result, VibePodError};
use crate::orchestrator::Orchestrator;
use crate::runtime::{ContainerRuntime, ContainerSummary};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRow {
    pub agent: String,
    pub image: String,
    pub status: String,
    pub uptime: Option<String>,
    pub workspace: String,
}

/// `connected` is the outcome of reaching the runtime. Without one every
/// agent shows as stopped, unless only running agents were asked for.
pub fn execute<R: ContainerRuntime>(
    ctx: &Context,
    connected: Result<R>,
    running_only: bool,
    json: bool,
) -> Result<()> {
    let containers = match connected {
        Ok(runtime) => Orchestrator::new(&runtime, &ctx.config, &ctx.paths).list()?,
        Err(e @ VibePodError::RuntimeUnavailable(_)) if !running_only => {
            tracing::debug!(error = %e, "runtime unavailable, listing agents as stopped");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let rows = rows(ctx, &containers, running_only);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        console::info("No running agents");
        return Ok(());
    }

    println!(
        "{:<10} {:<40} {:<10} {:>8}  {}",
        "AGENT", "IMAGE", "STATUS", "UPTIME", "WORKSPACE"
    );
    for row in rows {
        println!(
            "{:<10} {:<40} {:<10} {:>8}  {}",
            row.agent,
            row.image,
            row.status,
            row.uptime.as_deref().unwrap_or("-"),
            row.workspace
        );
    }
    Ok(())
}

/// One row per supported agent, in registry order. When an agent has
/// several containers a running one is preferred.
pub fn rows(ctx: &Context, containers: &[ContainerSummary], running_only: bool) -> Vec<AgentRow> {
    let mut by_agent: BTreeMap<AgentId, &ContainerSummary> = BTreeMap::new();
    for container in containers {
        let Some(agent) = container.agent() else {
            continue;
        };
        by_agent
            .entry(agent)
            .and_modify(|current| {
                if !current.state.is_running() && container.state.is_running() {
                    *current = container;
                }
            })
            .or_insert(container);
    }

    let now = Utc::now();
    AgentId::ALL
        .into_iter()
        .map(|agent| {
            let container = by_agent.get(&agent);
            AgentRow {
                agent: agent.to_string(),
                image: container
                    .map(|c| c.image.clone())
                    .unwrap_or_else(|| resolve_image(agent, &ctx.config, &ctx.env).to_string()),
                status: container
                    .map(|c| c.state.to_string())
                    .unwrap_or_else(|| "stopped".to_string()),
                uptime: container
                    .and_then(|c| c.uptime(now))
                    .map(format_uptime),
                workspace: container
                    .and_then(|c| c.workspace())
                    .unwrap_or("-")
                    .to_string(),
            }
        })
        .filter(|row| !running_only || row.status == "running")
        .collect()
}

fn format_uptime(uptime: chrono::Duration) -> String {
    let secs = uptime.num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86400 => format!("{}h{:02}m", s / 3600, (s % 3600) / 60),
        s => format!("{}d{}h", s / 86400, (s % 86400) / 3600),
    }
}
