use std::process::Command;

/// Run git and return trimmed stdout, or `None` if git failed.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

/// Build tag appended to the version: empty on a release tag, otherwise the
/// short hash with `-dirty` for uncommitted changes.
fn build_tag() -> String {
    if git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some() {
        return String::new();
    }

    let hash = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let dirty = git(&["status", "--porcelain"]).is_some_and(|status| !status.is_empty());
    if dirty { format!("{hash}-dirty") } else { hash }
}

fn main() {
    for path in [".git/HEAD", ".git/refs/heads/", ".git/refs/tags/"] {
        println!("cargo:rerun-if-changed={path}");
    }
    println!("cargo:rustc-env=RAGCHAT_BUILD={}", build_tag());
}
