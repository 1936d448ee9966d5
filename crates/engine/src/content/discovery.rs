use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::types::{ContentPaths, ContentPlanError, ContentPlanRequest};

pub(crate) const BASE_MOD_ID: &str = "base";

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub load_index: u32,
    pub source_dir: PathBuf,
}

/// Base content first, then enabled mods in request order.
pub(crate) fn discover_mod_sources(
    paths: &ContentPaths,
    request: &ContentPlanRequest,
) -> Result<Vec<ModSource>, ContentPlanError> {
    let mut seen = HashSet::<&str>::new();
    let mut sources = vec![ModSource {
        mod_id: BASE_MOD_ID.to_string(),
        load_index: 0,
        source_dir: paths.base_content_dir.clone(),
    }];

    for (idx, mod_id) in request.enabled_mods.iter().enumerate() {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentPlanError::EmptyEnabledMod);
        }
        if trimmed == BASE_MOD_ID || !seen.insert(trimmed) {
            return Err(ContentPlanError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = paths.mods_dir.join(trimmed);
        ensure_dir_exists(trimmed, &mod_dir)?;
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            load_index: (idx + 1) as u32,
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}

fn ensure_dir_exists(mod_id: &str, path: &Path) -> Result<(), ContentPlanError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ContentPlanError::EnabledModMissing {
            mod_id: mod_id.to_string(),
            expected_dir: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn paths(root: &Path) -> ContentPaths {
        ContentPaths {
            base_content_dir: root.join("assets").join("base"),
            mods_dir: root.join("mods"),
        }
    }

    fn request(mods: &[&str]) -> ContentPlanRequest {
        ContentPlanRequest {
            enabled_mods: mods.iter().map(|id| id.to_string()).collect(),
        }
    }

    #[test]
    fn base_is_first_then_enabled_order() {
        let temp = TempDir::new().expect("tempdir");
        let paths = paths(temp.path());
        fs::create_dir_all(&paths.base_content_dir).expect("create base");
        fs::create_dir_all(paths.mods_dir.join("b")).expect("create mod b");
        fs::create_dir_all(paths.mods_dir.join("a")).expect("create mod a");

        let sources = discover_mod_sources(&paths, &request(&["b", "a"])).expect("discover");
        let ids = sources
            .iter()
            .map(|source| (source.mod_id.as_str(), source.load_index))
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![("base", 0), ("b", 1), ("a", 2)]);
    }

    #[test]
    fn rejects_empty_duplicate_and_missing_mods() {
        let temp = TempDir::new().expect("tempdir");
        let paths = paths(temp.path());
        fs::create_dir_all(paths.mods_dir.join("a")).expect("create mod a");

        assert!(matches!(
            discover_mod_sources(&paths, &request(&[" "])),
            Err(ContentPlanError::EmptyEnabledMod)
        ));
        assert!(matches!(
            discover_mod_sources(&paths, &request(&["a", "a "])),
            Err(ContentPlanError::DuplicateEnabledMod { .. })
        ));
        assert!(matches!(
            discover_mod_sources(&paths, &request(&["base"])),
            Err(ContentPlanError::DuplicateEnabledMod { .. })
        ));
        assert!(matches!(
            discover_mod_sources(&paths, &request(&["missing"])),
            Err(ContentPlanError::EnabledModMissing { .. })
        ));
    }
}
