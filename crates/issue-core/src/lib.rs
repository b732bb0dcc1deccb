//! issue-core - Shared functionality for gitee-issue
//!
//! Standard on-disk locations and the user configuration file.

pub mod config;
pub mod paths;

pub use config::Config;
pub use paths::Paths;
