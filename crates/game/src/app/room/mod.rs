use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::f32::consts::TAU;
use std::fmt;
use std::time::Duration;

use arena_engine::{
    ArenaBounds, BackgroundFade, BossSpec, BossSpecError, CombatWorld, ConfigError, DefDatabase,
    DialogSpec, EnemyArchetype, EntityId, Intent, MovementStrategy, PhaseEntry, PhaseExit,
    PhaseSpec, SimConfig, SkillKind, SkillSpec, SpawnRequest, StatusEffectKind, TargetPolicy, Vec2,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

const PROJECTILE_RADIUS: f32 = 4.0;
const SUMMON_RING_GAP: f32 = 36.0;
const TRANSITION_TEXT_TTL: Duration = Duration::from_millis(2_500);
const PLAYER_SPAWN_OFFSET_Y: f32 = 180.0;

include!("types.rs");
include!("encounters.rs");
include!("scripted_player.rs");
include!("orchestrator.rs");

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
