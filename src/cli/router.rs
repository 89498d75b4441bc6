use crate::agents::AgentId;
use std::ffi::OsString;

/// One-letter shortcuts for `vp run <agent>`.
const AGENT_ALIASES: &[(&str, AgentId)] = &[
    ("c", AgentId::Claude),
    ("g", AgentId::Gemini),
    ("o", AgentId::Opencode),
    ("d", AgentId::Devstral),
    ("a", AgentId::Auggie),
    ("p", AgentId::Copilot),
    ("x", AgentId::Codex),
];

/// Rewrite agent shortcuts into explicit subcommands before clap sees them.
///
/// Only `args[1]` is inspected:
///
/// - an agent alias or full agent name becomes `run <agent>`
/// - `ui` becomes `logs start`
/// - anything else is left alone, so clap reports unknown commands itself
///
/// ```text
/// vp c                 -> vp run claude
/// vp codex -d -e A=1   -> vp run codex -d -e A=1
/// vp ui --port 9000    -> vp logs start --port 9000
/// vp run gemini        -> vp run gemini (unchanged)
/// ```
pub fn route_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.len() < 2 {
        return args;
    }

    let first_arg = args[1].to_string_lossy();
    let replacement: Vec<OsString> = if let Some(agent) = resolve_alias(&first_arg) {
        vec!["run".into(), agent.as_str().into()]
    } else if first_arg == "ui" {
        vec!["logs".into(), "start".into()]
    } else {
        return args;
    };

    let mut routed = Vec::with_capacity(args.len() + 1);
    routed.push(args[0].clone());
    routed.extend(replacement);
    routed.extend_from_slice(&args[2..]);
    routed
}

fn resolve_alias(arg: &str) -> Option<AgentId> {
    AGENT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == arg)
        .map(|(_, agent)| *agent)
        .or_else(|| AgentId::ALL.iter().copied().find(|a| a.as_str() == arg))
}
