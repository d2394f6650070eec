//! Git hash / host fingerprint folded into `ingestion_runs.meta`, adapted
//! from the teacher's `mqk-cli` run-start helpers.

use std::process::Command;

/// Short git hash of the running checkout, or `"unknown"` if this isn't a
/// git checkout or the binary isn't available.
pub fn git_hash() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `hostname:pid` — enough to distinguish concurrent processes in logs and
/// `ingestion_runs.meta`, not a hardware identifier.
pub fn host_fingerprint() -> String {
    let hostname = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            hostname_from_uname().ok()
        })
        .unwrap_or_else(|| "unknown-host".to_string());
    format!("{hostname}:{}", std::process::id())
}

fn hostname_from_uname() -> Result<String, std::io::Error> {
    let out = Command::new("hostname").output()?;
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
