use std::env;
use std::process::Command;

fn main() {
    let version = env::var("CARGO_PKG_VERSION").unwrap();
    let profile = env::var("PROFILE").unwrap();

    // Release builds report the bare crate version; dev builds carry the
    // commit they were built from so bug reports can be traced.
    let stamped = match (profile.as_str(), short_commit()) {
        ("debug", Some(commit)) if worktree_dirty() => format!("{version}-dev+{commit}.dirty"),
        ("debug", Some(commit)) => format!("{version}-dev+{commit}"),
        ("debug", None) => format!("{version}-dev"),
        _ => version,
    };

    println!("cargo:rustc-env=VIBEPOD_VERSION={stamped}");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
}

fn short_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|hash| !hash.is_empty())
}

fn worktree_dirty() -> bool {
    Command::new("git")
        .args(["status", "--porcelain", "--untracked-files=no"])
        .output()
        .map(|out| out.status.success() && !out.stdout.is_empty())
        .unwrap_or(false)
}
