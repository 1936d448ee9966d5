use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod ai;
pub mod boss;
pub mod collision;
pub mod config;
pub mod content;
mod context;
pub mod enemy;
pub mod entity;
pub mod intent;
pub mod math;
pub mod movement;
pub mod player;
pub mod scheduler;
pub mod skills;
pub mod status;
pub mod world;

pub use ai::{AiState, AiStateCounts};
pub use boss::{
    BackgroundFade, BossController, BossSpec, BossSpecError, DialogPurpose, DialogSpec,
    PhaseEntry, PhaseExit, PhaseSpec,
};
pub use collision::{CircleOverlapQuery, CollisionQuery, ContactPair};
pub use config::{ConfigError, EffectRules, EffectTable, SimConfig};
pub use content::{
    compile_def_database, ContentCompileError, ContentErrorCode, ContentPaths, ContentPlanError,
    ContentPlanRequest, DefDatabase, EnemyDef, EnemyDefId, SourceLocation,
};
pub use enemy::{AttackProfile, DamageOutcome, Enemy, EnemyArchetype, TargetPolicy};
pub use entity::{EntityId, Health};
pub use intent::{CombatEvent, CombatEventCounts, Intent, IntentKind, SpawnRequest};
pub use math::{ArenaBounds, Vec2};
pub use movement::MovementStrategy;
pub use player::PlayerBody;
pub use skills::{SkillKind, SkillSpec};
pub use status::{EffectOutcome, EffectSkipReason, OnContactEffect, StatusEffectKind};
pub use world::CombatWorld;

pub const ROOT_ENV_VAR: &str = "ARENA_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub base_content_dir: PathBuf,
    pub mods_dir: PathBuf,
}

impl AppPaths {
    pub fn content_paths(&self) -> ContentPaths {
        ContentPaths {
            base_content_dir: self.base_content_dir.clone(),
            mods_dir: self.mods_dir.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "ARENA_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
PowerShell: $env:{env_var}=\"C:\\path\\to\\arena\"\n\
Bash/zsh: export {env_var}=\"/path/to/arena\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let base_content_dir = root.join("assets").join("base");
    let mods_dir = root.join("mods");

    Ok(AppPaths {
        root,
        base_content_dir,
        mods_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_marker_requires_cargo_toml_and_assets_or_crates() {
        let temp = tempfile::TempDir::new().expect("temp");
        let root = temp.path();
        assert!(!is_repo_marker(root));
        fs::create_dir_all(root.join("assets")).expect("assets");
        assert!(!is_repo_marker(root));
        fs::write(root.join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        assert!(is_repo_marker(root));
    }

    #[test]
    fn content_paths_follow_app_paths() {
        let paths = AppPaths {
            root: PathBuf::from("/arena"),
            base_content_dir: PathBuf::from("/arena/assets/base"),
            mods_dir: PathBuf::from("/arena/mods"),
        };
        let content = paths.content_paths();
        assert_eq!(content.base_content_dir, paths.base_content_dir);
        assert_eq!(content.mods_dir, paths.mods_dir);
    }
}
