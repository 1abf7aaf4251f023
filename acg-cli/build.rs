//! Provides the rustc version and git revision at compile time, shown by the CLI in its
//! long version.

use std::process::Command;
use std::path::Path;
use std::fs;

fn main() {

    let git_dir = Path::new("..").join(".git");
    let head_file = git_dir.join("HEAD");

    println!("cargo::rerun-if-changed=build.rs");
    println!("cargo::rerun-if-changed={}", head_file.display());

    // Also track the branch file so that new commits update the revision.
    if let Ok(head_ref) = fs::read_to_string(&head_file)
    && let Some(head_ref) = head_ref.trim_end().strip_prefix("ref: ") {
        let ref_file = git_dir.join(head_ref);
        if ref_file.is_file() {
            println!("cargo::rerun-if-changed={}", ref_file.display());
        }
    }

    let rustc_version = rustc_version::version_meta()
        .map(|meta| format!("{} {}", meta.semver, meta.host))
        .unwrap_or_else(|_| "?".to_string());

    let git_revision = git_revision()
        .unwrap_or_else(|| "?".to_string());

    println!("cargo::rustc-env=ACG_RUSTC_VERSION={rustc_version}");
    println!("cargo::rustc-env=ACG_GIT_REVISION={git_revision}");

}

fn git_revision() -> Option<String> {
    Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output().ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|rev| rev.trim().to_string())
        .filter(|rev| !rev.is_empty())
}
