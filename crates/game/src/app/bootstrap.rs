use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use arena_engine::{
    compile_def_database, resolve_app_paths, ConfigError, ContentCompileError,
    ContentPlanRequest, SimConfig, StartupError,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::room::{EncounterKind, Room, RoomBuildError, RoomConfig};

const SIM_CONFIG_ENV_VAR: &str = "ARENA_SIM_CONFIG";
const ENCOUNTER_ENV_VAR: &str = "ARENA_ENCOUNTER";
const RUN_SECONDS_ENV_VAR: &str = "ARENA_RUN_SECONDS";
const ENABLED_MODS_ENV_VAR: &str = "ARENA_ENABLED_MODS";
const DEFAULT_ENCOUNTER: EncounterKind = EncounterKind::HamperKing;
const DEFAULT_RUN_SECONDS: u64 = 180;
pub(crate) const FIXED_STEP: Duration = Duration::from_millis(16);

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to read config file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path} at {json_path}: {source}")]
    ParseConfig {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid simulation config: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("content compile failed: {0}")]
    Content(#[from] ContentCompileError),
    #[error("unknown encounter '{name}'; available: {available}")]
    UnknownEncounter { name: String, available: String },
    #[error("{var} must be a positive whole number of seconds, got '{raw}'")]
    InvalidRunSeconds { var: &'static str, raw: String },
    #[error("failed to build room: {0}")]
    Room(#[from] RoomBuildError),
}

/// Contents of the optional JSON file named by `ARENA_SIM_CONFIG`. Missing
/// sections and fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ArenaConfigFile {
    pub(crate) sim: SimConfig,
    pub(crate) room: RoomConfig,
}

pub(crate) struct AppWiring {
    pub(crate) room: Room,
    pub(crate) step: Duration,
    pub(crate) run_limit: Duration,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Arena Startup ===");

    let paths = resolve_app_paths()?;
    let config = load_config_file(env_path(SIM_CONFIG_ENV_VAR))?;
    config.sim.validate()?;
    let encounter = parse_encounter(std::env::var(ENCOUNTER_ENV_VAR).ok().as_deref())?;
    let run_limit = parse_run_seconds(std::env::var(RUN_SECONDS_ENV_VAR).ok().as_deref())?;
    let request = ContentPlanRequest::from_list(
        &std::env::var(ENABLED_MODS_ENV_VAR).unwrap_or_default(),
    );

    let defs = compile_def_database(&paths.content_paths(), &request)?;
    info!(
        root = %paths.root.display(),
        enabled_mods = request.enabled_mods.len(),
        enemy_defs = defs.len(),
        encounter = encounter.name(),
        run_limit_s = run_limit.as_secs(),
        "startup_ready"
    );

    let room = Room::build(encounter, &defs, config.sim, config.room, true)?;
    Ok(AppWiring {
        room,
        step: FIXED_STEP,
        run_limit,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

fn load_config_file(path: Option<PathBuf>) -> Result<ArenaConfigFile, AppError> {
    let Some(path) = path else {
        return Ok(ArenaConfigFile::default());
    };
    let raw = fs::read_to_string(&path).map_err(|source| AppError::ReadConfig {
        path: path.clone(),
        source,
    })?;
    let config = parse_config(&raw).map_err(|(json_path, source)| AppError::ParseConfig {
        path: path.clone(),
        json_path,
        source,
    })?;
    info!(path = %path.display(), "config_file_loaded");
    Ok(config)
}

fn parse_config(raw: &str) -> Result<ArenaConfigFile, (String, serde_json::Error)> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, ArenaConfigFile>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        (path, error.into_inner())
    })
}

fn parse_encounter(raw: Option<&str>) -> Result<EncounterKind, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(DEFAULT_ENCOUNTER),
        Some(name) => EncounterKind::from_name(name).ok_or_else(|| AppError::UnknownEncounter {
            name: name.to_string(),
            available: EncounterKind::ALL
                .iter()
                .map(|kind| kind.name())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn parse_run_seconds(raw: Option<&str>) -> Result<Duration, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(Duration::from_secs(DEFAULT_RUN_SECONDS));
    };
    match raw.parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(AppError::InvalidRunSeconds {
            var: RUN_SECONDS_ENV_VAR,
            raw: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_file_uses_defaults() {
        let config = parse_config("{}").expect("config");
        assert_eq!(config, ArenaConfigFile::default());
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config = parse_config(
            r#"{ "sim": { "ai_tick_ms": 50, "effects": { "poison": { "tick_damage": 3 } } },
                 "room": { "summon_resume_delay_ms": 250 } }"#,
        )
        .expect("config");
        assert_eq!(config.sim.ai_tick_ms, 50);
        assert_eq!(config.sim.move_tick_ms, SimConfig::default().move_tick_ms);
        assert_eq!(config.room.summon_resume_delay_ms, 250);
        assert_eq!(config.room.arena_width, RoomConfig::default().arena_width);
    }

    #[test]
    fn parse_errors_name_the_json_path() {
        let (path, _) = parse_config(r#"{ "sim": { "move_tick_ms": "fast" } }"#).expect_err("err");
        assert_eq!(path, "sim.move_tick_ms");

        let (path, _) = parse_config(r#"{ "render": {} }"#).expect_err("err");
        assert_eq!(path, ".");
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let err = load_config_file(Some(PathBuf::from("/definitely/not/here.json")))
            .expect_err("err");
        assert!(matches!(err, AppError::ReadConfig { .. }));
        assert!(matches!(load_config_file(None), Ok(config) if config == ArenaConfigFile::default()));
    }

    #[test]
    fn encounter_selection() {
        assert_eq!(parse_encounter(None).expect("default"), DEFAULT_ENCOUNTER);
        assert_eq!(parse_encounter(Some("  ")).expect("blank"), DEFAULT_ENCOUNTER);
        assert_eq!(
            parse_encounter(Some("mold_matron")).expect("mold"),
            EncounterKind::MoldMatron
        );
        let err = parse_encounter(Some("dragon")).expect_err("err");
        assert!(err.to_string().contains("hamper_king, night_proctor, mold_matron, gauntlet"));
    }

    #[test]
    fn run_seconds_must_be_positive() {
        assert_eq!(
            parse_run_seconds(None).expect("default"),
            Duration::from_secs(DEFAULT_RUN_SECONDS)
        );
        assert_eq!(parse_run_seconds(Some("30")).expect("30"), Duration::from_secs(30));
        assert!(parse_run_seconds(Some("0")).is_err());
        assert!(parse_run_seconds(Some("soon")).is_err());
    }
}
