#![forbid(unsafe_code)]

pub mod agents;
pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod orchestrator;
pub mod runtime;
pub mod session_log;
pub mod signal;
pub mod telemetry;
pub mod utils;
pub mod version;
pub mod workspace;
