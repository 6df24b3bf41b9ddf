use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=UDP_MONITOR_BUILD_HASH");
    println!("cargo:rerun-if-changed=../../.git/HEAD");

    // Packagers building from a tarball have no .git; let them pin the hash.
    let hash = std::env::var("UDP_MONITOR_BUILD_HASH")
        .ok()
        .or_else(git_short_hash)
        .unwrap_or_default();

    println!("cargo:rustc-env=GIT_HASH={hash}");
}

fn git_short_hash() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8(out.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}
