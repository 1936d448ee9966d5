use std::path::PathBuf;

use thiserror::Error;

/// Where enemy defs are read from: the base set first, then each enabled
/// mod under `mods_dir/<id>`.
#[derive(Debug, Clone)]
pub struct ContentPaths {
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct ContentPlanRequest {
    pub enabled_mods: Vec<String>,
}

impl ContentPlanRequest {
    /// Parses a comma separated mod list, e.g. from an environment variable.
    /// Blank entries are kept so discovery can reject them.
    pub fn from_list(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        Self {
            enabled_mods: raw.split(',').map(|id| id.trim().to_string()).collect(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContentPlanError {
    #[error("enabled mod id cannot be empty")]
    EmptyEnabledMod,
    #[error("duplicate enabled mod id in request: {mod_id}")]
    DuplicateEnabledMod { mod_id: String },
    #[error("enabled mod does not exist on disk: {mod_id} at {expected_dir}")]
    EnabledModMissing {
        mod_id: String,
        expected_dir: PathBuf,
    },
}
