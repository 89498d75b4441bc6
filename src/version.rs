// Stamped by build.rs; dev builds carry the commit hash.
pub const VERSION: &str = env!("VIBEPOD_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const BINARY_NAME: &str = "vp";
