use std::time::Duration;

use tracing::debug;

use crate::ai::sample_axis;
use crate::boss::{ActiveCast, BossController, DialogPurpose, DialogSpec, MovementLock};
use crate::context::CombatContext;
use crate::enemy::{Enemy, TaskKey};
use crate::entity::EntityId;
use crate::intent::{CombatEvent, Intent, SpawnRequest};
use crate::math::Vec2;
use crate::status::StatusEffectKind;

const STEP_RELEASE: u8 = 1;
const STEP_BURST_END: u8 = 2;
const STEP_SHOW_DIALOG: u8 = 1;
const STEP_LAND: u8 = 2;
const STEP_RESUME: u8 = 3;
const BLINK_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct SkillSpec {
    pub name: String,
    pub period: Duration,
    pub kind: SkillKind,
}

impl SkillSpec {
    pub fn new(name: impl Into<String>, period: Duration, kind: SkillKind) -> Self {
        Self {
            name: name.into(),
            period,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkillKind {
    /// Requests minions until `max_alive` of this boss's children are up.
    Summon {
        spawns: Vec<SpawnRequest>,
        max_alive: usize,
    },
    /// Stand still for `charge`, then fire a fan of projectiles at the target.
    Volley {
        charge: Duration,
        projectiles: u32,
        spread_degrees: f32,
        projectile_speed: f32,
        damage: u32,
    },
    /// Stand still for `charge`, then rush along the captured heading.
    /// `dash_speed` is per move tick.
    ChargeDash {
        charge: Duration,
        dash_speed: f32,
        burst: Duration,
    },
    Nova {
        radius: f32,
        damage: u32,
        effect: Option<StatusEffectKind>,
    },
    /// Fly out of reach, show a dialog, fly back in, then resume after an
    /// extra delay.
    Intermission {
        fly_out: Duration,
        dialog: DialogSpec,
        fly_in: Duration,
        resume_delay: Duration,
    },
    /// Encourage every live summoned child.
    Rally,
    Blink {
        margin: f32,
        min_distance_from_target: f32,
    },
}

impl BossController {
    fn skill(&self, slot: u8) -> Option<&SkillSpec> {
        self.current_phase_spec().skills.get(slot as usize)
    }

    pub(crate) fn trigger_skill(&mut self, slot: u8, enemy: &mut Enemy, ctx: &mut CombatContext<'_>) {
        if self.suspends_combat() || self.cast.is_some() || enemy.statuses.blocks_action() {
            return;
        }
        let Some(skill) = self.skill(slot).cloned() else {
            return;
        };
        let boss_id = enemy.id();
        let cast = match &skill.kind {
            SkillKind::Summon { spawns, max_alive } => {
                summon(boss_id, spawns, *max_alive, enemy, ctx)
            }
            SkillKind::Volley { charge, .. } => {
                if !has_target(enemy, ctx) {
                    return;
                }
                self.cast = Some(ActiveCast {
                    slot,
                    lock: MovementLock::Hold,
                });
                enemy
                    .scheduler
                    .start_once_resumable(TaskKey::SkillStep(slot, STEP_RELEASE), *charge);
                true
            }
            SkillKind::ChargeDash { charge, .. } => {
                if !has_target(enemy, ctx) {
                    return;
                }
                self.cast = Some(ActiveCast {
                    slot,
                    lock: MovementLock::Hold,
                });
                enemy
                    .scheduler
                    .start_once_resumable(TaskKey::SkillStep(slot, STEP_RELEASE), *charge);
                true
            }
            SkillKind::Nova {
                radius,
                damage,
                effect,
            } => {
                nova(enemy.position(), *radius, *damage, *effect, ctx);
                true
            }
            SkillKind::Intermission { fly_out, .. } => {
                self.cast = Some(ActiveCast {
                    slot,
                    lock: MovementLock::Hold,
                });
                self.airborne = true;
                enemy
                    .scheduler
                    .start_once_resumable(TaskKey::SkillStep(slot, STEP_SHOW_DIALOG), *fly_out);
                true
            }
            SkillKind::Rally => {
                let children = enemy.live_children(ctx);
                for child in &children {
                    ctx.apply_effect(*child, StatusEffectKind::Encourage);
                }
                !children.is_empty()
            }
            SkillKind::Blink {
                margin,
                min_distance_from_target,
            } => {
                blink(*margin, *min_distance_from_target, enemy, ctx);
                true
            }
        };
        if cast {
            debug!(
                boss = %self.spec.name,
                boss_id = boss_id.0,
                skill = %skill.name,
                phase = self.phase(),
                "boss_skill_cast"
            );
            ctx.events.emit(CombatEvent::SkillCast { boss_id, slot });
        }
    }

    pub(crate) fn continue_skill(
        &mut self,
        slot: u8,
        step: u8,
        enemy: &mut Enemy,
        ctx: &mut CombatContext<'_>,
    ) {
        let Some(cast) = self.cast else {
            return;
        };
        if cast.slot != slot || self.is_defeated() || self.transitioning {
            return;
        }
        let Some(skill) = self.skill(slot).cloned() else {
            self.cast = None;
            return;
        };
        match (&skill.kind, step) {
            (
                SkillKind::Volley {
                    projectiles,
                    spread_degrees,
                    projectile_speed,
                    damage,
                    ..
                },
                STEP_RELEASE,
            ) => {
                self.cast = None;
                let Some(target) = enemy.target.id().and_then(|id| ctx.resolve(id)) else {
                    return;
                };
                fire_fan(
                    enemy.id(),
                    enemy.position(),
                    target.position,
                    *projectiles,
                    *spread_degrees,
                    *projectile_speed,
                    *damage,
                    ctx,
                );
            }
            (
                SkillKind::ChargeDash {
                    dash_speed, burst, ..
                },
                STEP_RELEASE,
            ) => {
                let direction = enemy
                    .target
                    .id()
                    .and_then(|id| ctx.resolve(id))
                    .map(|target| (target.position - enemy.position()).normalize_or_zero())
                    .unwrap_or(Vec2::ZERO);
                if direction == Vec2::ZERO {
                    self.cast = None;
                    return;
                }
                self.cast = Some(ActiveCast {
                    slot,
                    lock: MovementLock::Dash {
                        direction,
                        speed: *dash_speed,
                    },
                });
                enemy
                    .scheduler
                    .start_once_resumable(TaskKey::SkillStep(slot, STEP_BURST_END), *burst);
            }
            (SkillKind::ChargeDash { .. }, STEP_BURST_END) => {
                self.cast = None;
            }
            (SkillKind::Intermission { dialog, .. }, STEP_SHOW_DIALOG) => {
                ctx.intents.emit(Intent::ShowDialog {
                    boss_id: enemy.id(),
                    lines: dialog.lines.clone(),
                    background: dialog.background.clone(),
                });
                self.waiting_for_dialog = true;
                self.pending_dialog = Some(DialogPurpose::Skill(slot));
            }
            (SkillKind::Intermission { resume_delay, .. }, STEP_LAND) => {
                self.airborne = false;
                enemy
                    .scheduler
                    .start_once_resumable(TaskKey::SkillStep(slot, STEP_RESUME), *resume_delay);
            }
            (SkillKind::Intermission { .. }, STEP_RESUME) => {
                self.cast = None;
            }
            _ => {
                self.cast = None;
            }
        }
    }

    pub(crate) fn resume_after_skill_dialog(&mut self, slot: u8, enemy: &mut Enemy) {
        let fly_in = match self.skill(slot).map(|skill| &skill.kind) {
            Some(SkillKind::Intermission { fly_in, .. }) => *fly_in,
            _ => {
                self.cast = None;
                self.airborne = false;
                return;
            }
        };
        enemy
            .scheduler
            .start_once_resumable(TaskKey::SkillStep(slot, STEP_LAND), fly_in);
    }
}

fn has_target(enemy: &Enemy, ctx: &CombatContext<'_>) -> bool {
    enemy
        .target
        .id()
        .is_some_and(|id| ctx.resolve(id).is_some())
}

fn summon(
    boss_id: EntityId,
    spawns: &[SpawnRequest],
    max_alive: usize,
    enemy: &mut Enemy,
    ctx: &mut CombatContext<'_>,
) -> bool {
    let live = enemy.live_children(ctx);
    enemy.children = live.clone();
    let mut budget = max_alive.saturating_sub(live.len()) as u32;
    if budget == 0 {
        return false;
    }
    let mut requests = Vec::new();
    for spawn in spawns {
        let count = spawn.count.min(budget);
        if count == 0 {
            continue;
        }
        budget -= count;
        requests.push(SpawnRequest::new(spawn.archetype.clone(), count));
    }
    if requests.is_empty() {
        return false;
    }
    ctx.intents.emit(Intent::SpawnEnemies {
        summoner: boss_id,
        requests,
    });
    true
}

#[allow(clippy::too_many_arguments)]
fn fire_fan(
    owner: EntityId,
    origin: Vec2,
    target: Vec2,
    projectiles: u32,
    spread_degrees: f32,
    projectile_speed: f32,
    damage: u32,
    ctx: &mut CombatContext<'_>,
) {
    let heading = (target - origin).normalize_or_zero();
    if heading == Vec2::ZERO || projectiles == 0 {
        return;
    }
    let base = heading.angle();
    let spread = spread_degrees.to_radians();
    for index in 0..projectiles {
        let offset = if projectiles == 1 {
            0.0
        } else {
            spread * (index as f32 / (projectiles - 1) as f32 - 0.5)
        };
        ctx.intents.emit(Intent::SpawnProjectile {
            owner,
            origin,
            velocity: Vec2::from_angle(base + offset) * projectile_speed,
            damage,
        });
    }
}

fn nova(
    center: Vec2,
    radius: f32,
    damage: u32,
    effect: Option<StatusEffectKind>,
    ctx: &mut CombatContext<'_>,
) {
    let hit = ctx
        .live_players()
        .filter(|player| player.position().distance(center) <= radius + player.body.radius)
        .map(|player| player.id())
        .collect::<Vec<_>>();
    for id in hit {
        if damage > 0 {
            ctx.damage_player(id, damage);
        }
        if let Some(kind) = effect {
            ctx.apply_effect(id, kind);
        }
    }
}

fn blink(margin: f32, min_distance: f32, enemy: &mut Enemy, ctx: &mut CombatContext<'_>) {
    let area = ctx.bounds.inset(margin.max(enemy.body.radius));
    let target = enemy
        .target
        .id()
        .and_then(|id| ctx.resolve(id))
        .map(|view| view.position);
    let mut destination = enemy.position();
    for _ in 0..BLINK_ATTEMPTS {
        let candidate = Vec2::new(
            sample_axis(&mut *ctx.rng, area.min.x, area.max.x),
            sample_axis(&mut *ctx.rng, area.min.y, area.max.y),
        );
        destination = candidate;
        if target.map_or(true, |target| candidate.distance(target) >= min_distance) {
            break;
        }
    }
    enemy.body.position = destination;
    enemy.movement_state.reset();
}
