//! Policy rendering and persistence.

pub mod console;
pub mod json;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::policy::Policy;

/// Backup filename: the policy path with `.old` appended.
pub fn backup_path(policy_path: &Path) -> PathBuf {
    let mut name = policy_path.as_os_str().to_os_string();
    name.push(".old");
    PathBuf::from(name)
}

/// Load the stored policy, or `None` when no file exists yet.
pub fn load_policy(path: &Path) -> Result<Option<Policy>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let policy = serde_json::from_str(&text)?;
    Ok(Some(policy))
}

/// Write the policy as JSON, preserving the previous file as `<path>.old`
/// unless backups are suppressed.
pub fn save_policy(path: &Path, policy: &Policy, backup: bool) -> Result<()> {
    if backup && path.exists() {
        std::fs::copy(path, backup_path(path))?;
    }
    std::fs::write(path, json::render(policy)?)?;
    Ok(())
}
