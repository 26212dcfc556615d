use std::env;
use std::process::Command;

fn main() {
    // Set a build-time `GIT_HEAD` env var with the short commit id, reported
    // by `git-remote-ipfs --version`. Source tarballs can pass it in instead.
    let hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_owned())
        .or_else(|| env::var("GIT_HEAD").ok())
        .unwrap_or_else(|| "unknown".to_owned());

    println!("cargo:rustc-env=GIT_HEAD={hash}");
    println!("cargo:rerun-if-env-changed=GIT_HEAD");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
