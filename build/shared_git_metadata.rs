use std::process::Command;

fn git_output(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default()
}

/// Expose `GIT_COMMIT` and `RELEASE_VERSION` to the CLI crates for their `--version` banner.
pub fn emit_git_metadata() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../build/shared_git_metadata.rs");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/refs");

    let commit = git_output(&["rev-list", "-1", "HEAD"]);
    println!("cargo:rustc-env=GIT_COMMIT={commit}");

    // Empty unless HEAD is tagged.
    let release = git_output(&["tag", "--points-at", "HEAD"]);
    println!("cargo:rustc-env=RELEASE_VERSION={release}");
}
