use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::CombatContext;
use crate::enemy::{Enemy, TaskKey};
use crate::intent::{CombatEvent, Intent, SpawnRequest};
use crate::math::Vec2;
use crate::movement::MovementStrategy;
use crate::skills::SkillSpec;

/// Skill slots are task keys, so a phase can hold at most this many.
pub const MAX_SKILLS_PER_PHASE: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct DialogSpec {
    pub lines: Vec<String>,
    pub background: String,
}

impl DialogSpec {
    pub fn new(lines: &[&str], background: &str) -> Self {
        Self {
            lines: lines.iter().map(|line| line.to_string()).collect(),
            background: background.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundFade {
    pub path: String,
    pub duration: Duration,
}

/// Leaving a phase: the health fraction that ends it and the dialog shown
/// before the next phase may begin.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseExit {
    pub threshold_fraction: f32,
    pub dialog: DialogSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseEntry {
    pub background: Option<String>,
    pub fade: Option<BackgroundFade>,
    pub transition_text: Option<String>,
    pub speed_multiplier: f32,
    pub movement: Option<MovementStrategy>,
    pub summon: Vec<SpawnRequest>,
    /// Keeps the boss out of combat for a while after the phase starts.
    pub resume_delay: Option<Duration>,
}

impl Default for PhaseEntry {
    fn default() -> Self {
        Self {
            background: None,
            fade: None,
            transition_text: None,
            speed_multiplier: 1.0,
            movement: None,
            summon: Vec::new(),
            resume_delay: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSpec {
    pub skills: Vec<SkillSpec>,
    pub entry: PhaseEntry,
    /// `None` marks the final phase.
    pub exit: Option<PhaseExit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BossSpec {
    pub name: String,
    pub phases: Vec<PhaseSpec>,
    pub defeat_dialog: DialogSpec,
}

#[derive(Debug, Error, PartialEq)]
pub enum BossSpecError {
    #[error("boss '{name}' has no phases")]
    NoPhases { name: String },
    #[error("boss '{name}' has {count} phases; at most 255 are supported")]
    TooManyPhases { name: String, count: usize },
    #[error("boss '{name}' phase {phase} is not the last phase but has no exit")]
    MissingExit { name: String, phase: usize },
    #[error("boss '{name}' final phase {phase} must not have an exit")]
    FinalPhaseExit { name: String, phase: usize },
    #[error(
        "boss '{name}' phase {phase} exit threshold {fraction} must be in (0, 1) and below the previous phase's"
    )]
    ThresholdOrder {
        name: String,
        phase: usize,
        fraction: f32,
    },
    #[error("boss '{name}' phase {phase} has {count} skills; at most {max} are supported")]
    TooManySkills {
        name: String,
        phase: usize,
        count: usize,
        max: usize,
    },
    #[error("boss '{name}' phase {phase} speed multiplier must be finite and > 0")]
    InvalidSpeedMultiplier { name: String, phase: usize },
    #[error("boss '{name}' phase {phase} has no health left to lose with max health {max_health}")]
    PhaseFloorCollapsed {
        name: String,
        phase: usize,
        max_health: u32,
    },
}

impl BossSpec {
    pub fn validate(&self) -> Result<(), BossSpecError> {
        let name = self.name.clone();
        if self.phases.is_empty() {
            return Err(BossSpecError::NoPhases { name });
        }
        if self.phases.len() > u8::MAX as usize {
            return Err(BossSpecError::TooManyPhases {
                name,
                count: self.phases.len(),
            });
        }
        let last = self.phases.len() - 1;
        let mut previous_fraction = 1.0f32;
        for (index, phase) in self.phases.iter().enumerate() {
            let number = index + 1;
            if phase.skills.len() > MAX_SKILLS_PER_PHASE {
                return Err(BossSpecError::TooManySkills {
                    name,
                    phase: number,
                    count: phase.skills.len(),
                    max: MAX_SKILLS_PER_PHASE,
                });
            }
            let multiplier = phase.entry.speed_multiplier;
            if !multiplier.is_finite() || multiplier <= 0.0 {
                return Err(BossSpecError::InvalidSpeedMultiplier {
                    name,
                    phase: number,
                });
            }
            match (&phase.exit, index == last) {
                (Some(_), true) => {
                    return Err(BossSpecError::FinalPhaseExit {
                        name,
                        phase: number,
                    })
                }
                (None, false) => {
                    return Err(BossSpecError::MissingExit {
                        name,
                        phase: number,
                    })
                }
                (Some(exit), false) => {
                    let fraction = exit.threshold_fraction;
                    if !(fraction > 0.0 && fraction < previous_fraction) {
                        return Err(BossSpecError::ThresholdOrder {
                            name,
                            phase: number,
                            fraction,
                        });
                    }
                    previous_fraction = fraction;
                }
                (None, true) => {}
            }
        }
        Ok(())
    }

    /// [`validate`](Self::validate) plus the floors for a concrete body:
    /// every phase but the last must keep a floor above zero.
    pub fn validate_for_health(&self, max_health: u32) -> Result<(), BossSpecError> {
        self.validate()?;
        let floors = phase_thresholds(&self.phases, max_health);
        for (index, (phase, floor)) in self.phases.iter().zip(floors).enumerate() {
            if phase.exit.is_some() && floor == 0 {
                return Err(BossSpecError::PhaseFloorCollapsed {
                    name: self.name.clone(),
                    phase: index + 1,
                    max_health,
                });
            }
        }
        Ok(())
    }
}

/// Absolute health floors per phase, strictly decreasing, 0 for the last.
pub fn phase_thresholds(phases: &[PhaseSpec], max_health: u32) -> Vec<u32> {
    let mut previous = max_health;
    phases
        .iter()
        .map(|phase| {
            let floor = match &phase.exit {
                Some(exit) => {
                    let raw = (max_health as f32 * exit.threshold_fraction).round() as u32;
                    raw.min(previous.saturating_sub(1))
                }
                None => 0,
            };
            previous = floor;
            floor
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogPurpose {
    PhaseTransition,
    Defeat,
    Skill(u8),
}

/// Movement override while a multi-step skill is in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MovementLock {
    Free,
    Hold,
    Dash { direction: Vec2, speed: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ActiveCast {
    pub slot: u8,
    pub lock: MovementLock,
}

#[derive(Debug)]
pub struct BossController {
    pub(crate) spec: BossSpec,
    thresholds: Vec<u32>,
    phase: u8,
    pub(crate) transitioning: bool,
    pub(crate) waiting_for_dialog: bool,
    defeated: bool,
    pub(crate) pending_dialog: Option<DialogPurpose>,
    pub(crate) cast: Option<ActiveCast>,
    pub(crate) airborne: bool,
}

impl BossController {
    pub(crate) fn new(spec: BossSpec, max_health: u32) -> Self {
        let thresholds = phase_thresholds(&spec.phases, max_health);
        Self {
            spec,
            thresholds,
            phase: 1,
            transitioning: false,
            waiting_for_dialog: false,
            defeated: false,
            pending_dialog: None,
            cast: None,
            airborne: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn phase(&self) -> u8 {
        self.phase
    }

    pub fn phase_count(&self) -> usize {
        self.spec.phases.len()
    }

    pub fn thresholds(&self) -> &[u32] {
        &self.thresholds
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn is_waiting_for_dialog(&self) -> bool {
        self.waiting_for_dialog
    }

    pub fn is_defeated(&self) -> bool {
        self.defeated
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    pub fn pending_dialog(&self) -> Option<DialogPurpose> {
        self.pending_dialog
    }

    pub fn casting_slot(&self) -> Option<u8> {
        self.cast.map(|cast| cast.slot)
    }

    pub fn is_final_phase(&self) -> bool {
        self.phase as usize >= self.spec.phases.len()
    }

    /// Lowest health a hit may leave in the current phase.
    pub fn damage_floor(&self) -> u32 {
        self.thresholds
            .get(self.phase as usize - 1)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn current_phase_spec(&self) -> &PhaseSpec {
        &self.spec.phases[self.phase as usize - 1]
    }

    pub(crate) fn suspends_combat(&self) -> bool {
        self.transitioning || self.waiting_for_dialog || self.defeated || self.airborne
    }

    pub(crate) fn ignores_damage(&self) -> bool {
        self.suspends_combat()
    }

    pub(crate) fn movement_lock(&self) -> MovementLock {
        self.cast.map_or(MovementLock::Free, |cast| cast.lock)
    }

    pub(crate) fn start(&mut self, enemy: &mut Enemy, ctx: &mut CombatContext<'_>) {
        info!(
            boss = %self.spec.name,
            boss_id = enemy.id().0,
            phases = self.spec.phases.len(),
            max_health = enemy.health().max(),
            "boss_spawned"
        );
        self.enter_phase(0, enemy, ctx);
    }

    fn enter_phase(&self, index: usize, enemy: &mut Enemy, ctx: &mut CombatContext<'_>) {
        let Some(phase) = self.spec.phases.get(index) else {
            return;
        };
        let entry = &phase.entry;
        let boss_id = enemy.id();
        if let Some(path) = &entry.background {
            ctx.intents.emit(Intent::ChangeBackground { path: path.clone() });
        }
        if let Some(fade) = &entry.fade {
            ctx.intents.emit(Intent::FadeBackground {
                path: fade.path.clone(),
                duration_ms: fade.duration.as_millis() as u64,
            });
        }
        if let Some(text) = &entry.transition_text {
            ctx.intents.emit(Intent::ShowTransitionText { text: text.clone() });
        }
        if (entry.speed_multiplier - 1.0).abs() > f32::EPSILON {
            enemy.body.speed *= entry.speed_multiplier;
        }
        if let Some(movement) = &entry.movement {
            enemy.movement = movement.clone();
            enemy.movement_state.reset();
        }
        if !entry.summon.is_empty() {
            ctx.intents.emit(Intent::SpawnEnemies {
                summoner: boss_id,
                requests: entry.summon.clone(),
            });
        }
        for (slot, skill) in phase.skills.iter().enumerate() {
            enemy
                .scheduler
                .start_periodic(TaskKey::Skill(slot as u8), skill.period);
        }
    }

    fn stop_phase_skills(&mut self, enemy: &mut Enemy) {
        enemy
            .scheduler
            .stop_where(|key| key.is_skill() || matches!(key, TaskKey::RestoreCombat));
        self.cast = None;
        self.airborne = false;
    }

    /// Health just reached the current floor.
    pub(crate) fn begin_transition(&mut self, enemy: &mut Enemy, ctx: &mut CombatContext<'_>) {
        if self.transitioning || self.defeated {
            return;
        }
        let Some(exit) = self.current_phase_spec().exit.clone() else {
            return;
        };
        self.transitioning = true;
        self.stop_phase_skills(enemy);
        enemy.movement_state.reset();
        ctx.events.emit(CombatEvent::PhaseTransitionStarted {
            boss_id: enemy.id(),
            from_phase: self.phase,
        });
        info!(
            boss = %self.spec.name,
            boss_id = enemy.id().0,
            phase = self.phase,
            health = enemy.health().current(),
            "boss_phase_transition_started"
        );
        ctx.intents.emit(Intent::ShowDialog {
            boss_id: enemy.id(),
            lines: exit.dialog.lines,
            background: exit.dialog.background,
        });
        self.waiting_for_dialog = true;
        self.pending_dialog = Some(DialogPurpose::PhaseTransition);
    }

    /// Logical death. The boss stays in the world until the defeat dialog
    /// is acknowledged.
    pub(crate) fn begin_defeat(&mut self, enemy: &mut Enemy, ctx: &mut CombatContext<'_>) {
        if self.defeated {
            return;
        }
        enemy.scheduler.cancel_all();
        enemy.statuses.clear();
        self.cast = None;
        self.airborne = false;
        self.transitioning = false;
        for child in std::mem::take(&mut enemy.children) {
            ctx.kill_enemy(child);
        }
        ctx.events.emit(CombatEvent::BossDefeated {
            boss_id: enemy.id(),
        });
        info!(boss = %self.spec.name, boss_id = enemy.id().0, phase = self.phase, "boss_defeated");
        ctx.intents.emit(Intent::ShowDialog {
            boss_id: enemy.id(),
            lines: self.spec.defeat_dialog.lines.clone(),
            background: self.spec.defeat_dialog.background.clone(),
        });
        self.defeated = true;
        self.waiting_for_dialog = true;
        self.pending_dialog = Some(DialogPurpose::Defeat);
    }

    pub(crate) fn on_dialog_finished(&mut self, enemy: &mut Enemy, ctx: &mut CombatContext<'_>) -> bool {
        let Some(purpose) = self.pending_dialog.take() else {
            debug!(boss_id = enemy.id().0, "dialog_ack_without_pending_dialog");
            return false;
        };
        self.waiting_for_dialog = false;
        match purpose {
            DialogPurpose::PhaseTransition => self.finish_transition(enemy, ctx),
            DialogPurpose::Defeat => {
                info!(boss = %self.spec.name, boss_id = enemy.id().0, "boss_removed_after_dialog");
                enemy.die(ctx);
            }
            DialogPurpose::Skill(slot) => self.resume_after_skill_dialog(slot, enemy),
        }
        true
    }

    fn finish_transition(&mut self, enemy: &mut Enemy, ctx: &mut CombatContext<'_>) {
        let next_index = self.phase as usize;
        if next_index >= self.spec.phases.len() {
            warn!(boss_id = enemy.id().0, phase = self.phase, "transition_without_next_phase");
            self.transitioning = false;
            return;
        }
        self.enter_phase(next_index, enemy, ctx);
        self.phase += 1;
        ctx.intents.emit(Intent::PhaseChanged {
            boss_id: enemy.id(),
            phase: self.phase,
        });
        info!(
            boss = %self.spec.name,
            boss_id = enemy.id().0,
            phase = self.phase,
            floor = self.damage_floor(),
            "boss_phase_changed"
        );
        match self.current_phase_spec().entry.resume_delay {
            Some(delay) => enemy
                .scheduler
                .start_once_resumable(TaskKey::RestoreCombat, delay),
            None => self.transitioning = false,
        }
    }

    pub(crate) fn run_task(&mut self, key: TaskKey, enemy: &mut Enemy, ctx: &mut CombatContext<'_>) {
        match key {
            TaskKey::Skill(slot) => self.trigger_skill(slot, enemy, ctx),
            TaskKey::SkillStep(slot, step) => self.continue_skill(slot, step, enemy, ctx),
            TaskKey::RestoreCombat => {
                if self.transitioning && !self.waiting_for_dialog {
                    self.transitioning = false;
                    debug!(boss_id = enemy.id().0, phase = self.phase, "boss_combat_restored");
                }
            }
            TaskKey::AiTick | TaskKey::MoveTick | TaskKey::AttackTick => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::SkillKind;

    fn exit(fraction: f32) -> Option<PhaseExit> {
        Some(PhaseExit {
            threshold_fraction: fraction,
            dialog: DialogSpec::new(&["..."], "bg.png"),
        })
    }

    fn phase(exit: Option<PhaseExit>) -> PhaseSpec {
        PhaseSpec {
            skills: vec![SkillSpec::new(
                "rally",
                Duration::from_secs(4),
                SkillKind::Rally,
            )],
            entry: PhaseEntry::default(),
            exit,
        }
    }

    fn spec(phases: Vec<PhaseSpec>) -> BossSpec {
        BossSpec {
            name: "test".to_string(),
            phases,
            defeat_dialog: DialogSpec::new(&["bye"], "bg.png"),
        }
    }

    #[test]
    fn thresholds_are_absolute_and_end_at_zero() {
        let phases = vec![phase(exit(0.6)), phase(None)];
        assert_eq!(phase_thresholds(&phases, 500), vec![300, 0]);
        let phases = vec![phase(exit(0.66)), phase(exit(0.33)), phase(None)];
        assert_eq!(phase_thresholds(&phases, 900), vec![594, 297, 0]);
    }

    #[test]
    fn thresholds_stay_strictly_decreasing_for_tiny_health() {
        let phases = vec![phase(exit(0.9)), phase(exit(0.8)), phase(None)];
        let thresholds = phase_thresholds(&phases, 2);
        assert_eq!(thresholds, vec![1, 0, 0]);
    }

    #[test]
    fn validate_rejects_bad_layouts() {
        assert!(matches!(
            spec(vec![]).validate(),
            Err(BossSpecError::NoPhases { .. })
        ));
        assert!(matches!(
            spec(vec![phase(None), phase(None)]).validate(),
            Err(BossSpecError::MissingExit { phase: 1, .. })
        ));
        assert!(matches!(
            spec(vec![phase(exit(0.5))]).validate(),
            Err(BossSpecError::FinalPhaseExit { phase: 1, .. })
        ));
        assert!(matches!(
            spec(vec![phase(exit(0.3)), phase(exit(0.6)), phase(None)]).validate(),
            Err(BossSpecError::ThresholdOrder { phase: 2, .. })
        ));
        spec(vec![phase(exit(0.6)), phase(None)])
            .validate()
            .expect("valid");
    }

    #[test]
    fn validate_for_health_rejects_collapsed_phase_floors() {
        let three = spec(vec![phase(exit(0.9)), phase(exit(0.8)), phase(None)]);
        assert!(matches!(
            three.validate_for_health(2),
            Err(BossSpecError::PhaseFloorCollapsed {
                phase: 2,
                max_health: 2,
                ..
            })
        ));
        assert!(matches!(
            spec(vec![phase(exit(0.6)), phase(None)]).validate_for_health(1),
            Err(BossSpecError::PhaseFloorCollapsed { phase: 1, .. })
        ));
        three.validate_for_health(10).expect("floors 9 and 8");
    }

    #[test]
    fn new_controller_starts_in_phase_one_with_floor() {
        let controller = BossController::new(spec(vec![phase(exit(0.6)), phase(None)]), 500);
        assert_eq!(controller.phase(), 1);
        assert_eq!(controller.damage_floor(), 300);
        assert!(!controller.is_final_phase());
        assert!(!controller.suspends_combat());
    }
}
