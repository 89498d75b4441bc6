//! Built-in agent table and image resolution.
//!
//! Every agent VibePod can launch is described by a static [`AgentSpec`]:
//! which image repository it ships in, where its credentials are mounted,
//! which environment it expects and how its container should be started.
//! Users customize agents through the `agents.<id>` config section rather
//! than by adding new entries here.

pub mod definition;
pub mod image;
pub mod registry;

pub use definition::{AgentId, AgentSpec, CredentialMount};
pub use image::{resolve_image, ImageRef};
pub use registry::AgentRegistry;
