//! Standard paths used by gitee-issue

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable that relocates the data directory
pub const HOME_ENV: &str = "GITEE_ISSUE_HOME";

/// Directory name under the user's home
const ROOT_DIR: &str = ".gitee-issue";

/// Standard gitee-issue paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Root directory (~/.gitee-issue)
    pub root: PathBuf,
    /// Credential database (~/.gitee-issue/config.db)
    pub database: PathBuf,
    /// User configuration (~/.gitee-issue/config.json)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    /// Resolve paths from `GITEE_ISSUE_HOME`, falling back to the home directory
    pub fn new() -> Self {
        Self::from_root(resolve_root(std::env::var_os(HOME_ENV)))
    }

    /// Build paths beneath an explicit root directory
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            database: root.join("config.db"),
            config: root.join("config.json"),
            root,
        }
    }
}

fn resolve_root(override_dir: Option<OsString>) -> PathBuf {
    match override_dir {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(ROOT_DIR),
    }
}
