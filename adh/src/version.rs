use std::fmt::Write;

/// Banner shown by `--version` in the CLI tools.
///
/// `release` and `commit` come from the build script and are empty when git
/// metadata was unavailable.
pub fn version_banner(tool_name: &str, version: &str, release: &str, commit: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{tool_name}");
    let _ = writeln!(out, "ADH stream tools (adh {})", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "License: GNU AGPL v3 (AGPL-3.0-only)");
    let _ = writeln!(out);

    let _ = writeln!(out, "\tVersion:     {version}");
    if !release.is_empty() {
        let _ = writeln!(out, "\tGit tag:     {release}");
    }
    if !commit.is_empty() {
        let _ = writeln!(out, "\tGit commit:  {commit}");
    }
    out
}

pub fn print_cli_version_banner(tool_name: &str, version: &str, release: &str, commit: &str) {
    print!("{}", version_banner(tool_name, version, release, commit));
}
