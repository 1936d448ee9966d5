use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::ai::{decide_ai_state, AiState, WanderState};
use crate::boss::{BossController, MovementLock};
use crate::config::SimConfig;
use crate::context::CombatContext;
use crate::entity::{Body, EntityId, Health, TargetRef, TargetView};
use crate::intent::{CombatEvent, Intent};
use crate::math::Vec2;
use crate::movement::{
    flee_step, step_movement, wander_step, DashPhase, MoveContext, MovementState,
    MovementStrategy,
};
use crate::scheduler::TaskScheduler;
use crate::status::{OnContactEffect, StatusEffectKind, StatusSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    AiTick,
    MoveTick,
    AttackTick,
    Skill(u8),
    SkillStep(u8, u8),
    RestoreCombat,
}

impl TaskKey {
    pub fn is_skill(&self) -> bool {
        matches!(self, TaskKey::Skill(_) | TaskKey::SkillStep(..))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttackProfile {
    Melee { damage: u32 },
    Ranged { projectile_speed: f32, damage: u32 },
}

/// Who an enemy pursues once it is live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetPolicy {
    #[default]
    Player,
    Summoner,
}

/// Data template an enemy is built from, either compiled from defs or
/// assembled in code for boss bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemyArchetype {
    pub def_name: String,
    pub label: String,
    pub max_health: u32,
    pub speed: f32,
    pub contact_damage: u32,
    pub vision_range: f32,
    pub attack_range: f32,
    pub attack_cooldown: Duration,
    pub radius: f32,
    pub damage_scale: f32,
    pub movement: MovementStrategy,
    pub attack: AttackProfile,
    pub contact_effects: Vec<OnContactEffect>,
    pub target_policy: TargetPolicy,
}

impl Default for EnemyArchetype {
    fn default() -> Self {
        Self {
            def_name: String::new(),
            label: String::new(),
            max_health: 30,
            speed: 60.0,
            contact_damage: 5,
            vision_range: 250.0,
            attack_range: 40.0,
            attack_cooldown: Duration::from_millis(1_000),
            radius: 14.0,
            damage_scale: 1.0,
            movement: MovementStrategy::Direct,
            attack: AttackProfile::Melee { damage: 5 },
            contact_effects: Vec::new(),
            target_policy: TargetPolicy::Player,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Non-positive or non-finite amount. No state change, no hit flash.
    Rejected,
    /// Valid amount that the target is currently immune to.
    Ignored,
    Applied { dealt: u32, remaining: u32 },
    Killed { dealt: u32 },
}

impl DamageOutcome {
    pub fn dealt(&self) -> u32 {
        match self {
            DamageOutcome::Applied { dealt, .. } | DamageOutcome::Killed { dealt } => *dealt,
            DamageOutcome::Rejected | DamageOutcome::Ignored => 0,
        }
    }
}

/// `max(current - scaled, floor)` without underflow. A hit can drive health
/// down to `floor` but never through it.
pub fn clamp_phase_damage(current: u32, scaled: u32, floor: u32) -> u32 {
    current.saturating_sub(scaled).max(floor.min(current))
}

/// `amount * scale`, rounded, at least 1 for any positive amount.
pub fn scale_damage(amount: f32, damage_scale: f32) -> u32 {
    let scaled = amount * damage_scale.max(0.0);
    if !scaled.is_finite() {
        return u32::MAX;
    }
    (scaled.round() as u32).max(1)
}

#[derive(Debug)]
pub struct Enemy {
    id: EntityId,
    def_name: String,
    pub body: Body,
    health: Health,
    pub(crate) vision_range: f32,
    pub(crate) attack_range: f32,
    pub(crate) attack_cooldown: Duration,
    pub(crate) attack: AttackProfile,
    last_attack_at: Option<Duration>,
    state: AiState,
    pub(crate) wander: WanderState,
    pub(crate) target: TargetRef,
    target_policy: TargetPolicy,
    summoner: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) movement: MovementStrategy,
    pub(crate) movement_state: MovementState,
    contact_effects: Vec<OnContactEffect>,
    last_contact_at: HashMap<EntityId, Duration>,
    pub statuses: StatusSet,
    pub(crate) scheduler: TaskScheduler<TaskKey>,
    pub(crate) boss: Option<Box<BossController>>,
    dying: bool,
}

impl Enemy {
    pub(crate) fn new(
        id: EntityId,
        archetype: &EnemyArchetype,
        position: Vec2,
        summoner: Option<EntityId>,
        config: &SimConfig,
    ) -> Self {
        let mut scheduler = TaskScheduler::new();
        scheduler.start_periodic(TaskKey::AiTick, config.ai_tick());
        scheduler.start_periodic(TaskKey::MoveTick, config.move_tick());
        scheduler.start_periodic(TaskKey::AttackTick, config.attack_tick());
        if summoner.is_some() {
            scheduler.pause();
        }
        Self {
            id,
            def_name: archetype.def_name.clone(),
            body: Body {
                position,
                facing: Vec2::new(0.0, 1.0),
                speed: archetype.speed,
                hurt: archetype.contact_damage,
                damage_scale: archetype.damage_scale,
                invincible: false,
                radius: archetype.radius,
            },
            health: Health::full(archetype.max_health),
            vision_range: archetype.vision_range,
            attack_range: archetype.attack_range,
            attack_cooldown: archetype.attack_cooldown,
            attack: archetype.attack,
            last_attack_at: None,
            state: AiState::Idle,
            wander: WanderState::default(),
            target: TargetRef::NONE,
            target_policy: archetype.target_policy,
            summoner,
            children: Vec::new(),
            movement: archetype.movement.clone(),
            movement_state: MovementState::default(),
            contact_effects: archetype.contact_effects.clone(),
            last_contact_at: HashMap::new(),
            statuses: StatusSet::default(),
            scheduler,
            boss: None,
            dying: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn def_name(&self) -> &str {
        &self.def_name
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn state(&self) -> AiState {
        self.state
    }

    pub fn position(&self) -> Vec2 {
        self.body.position
    }

    pub fn target(&self) -> TargetRef {
        self.target
    }

    pub fn target_policy(&self) -> TargetPolicy {
        self.target_policy
    }

    pub fn summoner(&self) -> Option<EntityId> {
        self.summoner
    }

    pub fn is_summoned(&self) -> bool {
        self.summoner.is_some()
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn movement(&self) -> &MovementStrategy {
        &self.movement
    }

    pub fn movement_state(&self) -> &MovementState {
        &self.movement_state
    }

    pub fn boss(&self) -> Option<&BossController> {
        self.boss.as_deref()
    }

    pub fn is_boss(&self) -> bool {
        self.boss.is_some()
    }

    pub fn is_dying(&self) -> bool {
        self.dying
    }

    /// Live means targetable: not dying, not yet despawned.
    pub fn is_alive(&self) -> bool {
        !self.dying
    }

    pub fn is_paused(&self) -> bool {
        self.scheduler.is_paused()
    }

    pub fn clock(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn is_task_scheduled(&self, key: TaskKey) -> bool {
        self.scheduler.is_scheduled(key)
    }

    pub fn scheduled_task_count(&self) -> usize {
        self.scheduler.scheduled_count()
    }

    pub fn task_remaining(&self, key: TaskKey) -> Option<Duration> {
        self.scheduler.remaining(key)
    }

    fn combat_suspended(&self) -> bool {
        self.boss
            .as_ref()
            .is_some_and(|boss| boss.suspends_combat())
    }

    pub(crate) fn set_target(&mut self, target: TargetRef) {
        self.target = target;
    }

    /// Stops every task and flags the enemy as dying. False if it already was.
    pub(crate) fn mark_dying(&mut self) -> bool {
        if self.dying {
            return false;
        }
        self.dying = true;
        self.scheduler.cancel_all();
        self.statuses.clear();
        self.last_contact_at.clear();
        true
    }

    pub(crate) fn die(&mut self, ctx: &mut CombatContext<'_>) {
        if self.mark_dying() {
            debug!(enemy_id = self.id.0, def = %self.def_name, "enemy_dying");
            ctx.announce_death(self.id, self.is_summoned());
        }
    }

    pub(crate) fn pause_timers(&mut self) {
        self.scheduler.pause();
    }

    pub(crate) fn resume_timers(&mut self, one_shot_remainder: Duration) {
        if self.dying {
            return;
        }
        self.scheduler.resume(one_shot_remainder);
    }

    fn resolve_target(&mut self, ctx: &CombatContext<'_>) -> Option<TargetView> {
        let id = self.target.id()?;
        let view = ctx.resolve(id);
        if view.is_none() {
            self.target.clear();
        }
        view
    }

    pub(crate) fn run_task(&mut self, key: TaskKey, ctx: &mut CombatContext<'_>) {
        if self.dying {
            return;
        }
        match key {
            TaskKey::AiTick => self.ai_tick(ctx),
            TaskKey::MoveTick => self.move_tick(ctx),
            TaskKey::AttackTick => self.attack_tick(ctx),
            TaskKey::Skill(_) | TaskKey::SkillStep(..) | TaskKey::RestoreCombat => {
                if let Some(mut boss) = self.boss.take() {
                    boss.run_task(key, self, ctx);
                    self.boss = Some(boss);
                }
            }
        }
    }

    fn ai_tick(&mut self, ctx: &mut CombatContext<'_>) {
        if self.combat_suspended() {
            return;
        }
        let target = self.resolve_target(ctx);
        let distance = target.map(|view| view.position.distance(self.body.position));
        let next = decide_ai_state(distance, self.vision_range, self.attack_range);
        if next == self.state {
            return;
        }
        debug!(
            enemy_id = self.id.0,
            from = ?self.state,
            to = ?next,
            distance = distance.unwrap_or(-1.0),
            "ai_state_changed"
        );
        ctx.events.emit(CombatEvent::AiStateChanged {
            entity_id: self.id,
            from: self.state,
            to: next,
        });
        if matches!(next, AiState::Wander) {
            self.wander.reset();
            if matches!(self.movement_state.dash, DashPhase::Charging { .. }) {
                self.movement_state.dash = DashPhase::Ready;
            }
        }
        self.state = next;
    }

    fn move_tick(&mut self, ctx: &mut CombatContext<'_>) {
        if self.combat_suspended() || self.statuses.blocks_action() {
            return;
        }
        let config = ctx.config;
        let dt = config.move_tick();
        let speed = self.body.speed * self.statuses.speed_multiplier(&config.effects);
        let target = self.resolve_target(ctx);

        let lock = self.boss.as_ref().map(|boss| boss.movement_lock());
        let delta = match lock {
            Some(MovementLock::Hold) => Vec2::ZERO,
            Some(MovementLock::Dash { direction, speed }) => direction * speed,
            _ => {
                if let (true, Some(threat)) = (self.statuses.is_feared(), target) {
                    flee_step(self.body.position, threat.position, speed, dt)
                } else if self.movement.is_target_independent() {
                    self.strategy_step(None, speed, ctx)
                } else {
                    match self.state {
                        AiState::Idle => Vec2::ZERO,
                        AiState::Wander => self.wander_delta(speed, ctx),
                        AiState::Chase | AiState::Attack => match target {
                            Some(view) => self.strategy_step(Some(view.position), speed, ctx),
                            None => self.wander_delta(speed, ctx),
                        },
                    }
                }
            }
        };

        if delta == Vec2::ZERO || !delta.is_finite() {
            return;
        }
        let area = ctx.bounds.inset(self.body.radius);
        let next = area.clamp(self.body.position + delta);
        let moved = next - self.body.position;
        if moved != Vec2::ZERO {
            self.body.facing = moved.normalize_or_zero();
        }
        self.body.position = next;
    }

    fn strategy_step(&mut self, target: Option<Vec2>, speed: f32, ctx: &CombatContext<'_>) -> Vec2 {
        let move_ctx = MoveContext {
            position: self.body.position,
            target,
            speed,
            dt: ctx.config.move_tick(),
            now: self.scheduler.now(),
            bounds: ctx.bounds.inset(self.body.radius),
        };
        step_movement(&self.movement, &mut self.movement_state, &move_ctx)
    }

    fn wander_delta(&mut self, speed: f32, ctx: &mut CombatContext<'_>) -> Vec2 {
        let config = ctx.config;
        self.wander.since_pick += config.move_tick();
        if self.wander.needs_repick(config.wander_repick()) {
            self.wander.pick(&mut *ctx.rng, ctx.bounds, config.wander_margin);
        }
        let Some(point) = self.wander.point else {
            return Vec2::ZERO;
        };
        let (delta, arrived) = wander_step(
            self.body.position,
            point,
            speed * config.wander_speed_factor,
            config.move_tick(),
            config.wander_arrival_radius,
        );
        if arrived {
            self.wander.arrive();
        }
        delta
    }

    fn attack_tick(&mut self, ctx: &mut CombatContext<'_>) {
        if self.state != AiState::Attack || self.combat_suspended() || self.statuses.blocks_action() {
            return;
        }
        let now = self.scheduler.now();
        if let Some(last) = self.last_attack_at {
            if now.saturating_sub(last) < self.attack_cooldown {
                return;
            }
        }
        let Some(target) = self.resolve_target(ctx) else {
            return;
        };
        let multiplier = self.statuses.damage_multiplier(&ctx.config.effects);
        match self.attack {
            AttackProfile::Melee { damage } => {
                if target.position.distance(self.body.position) > self.attack_range {
                    return;
                }
                ctx.damage_player(target.id, scale_damage(damage as f32, multiplier));
            }
            AttackProfile::Ranged {
                projectile_speed,
                damage,
            } => {
                let direction = (target.position - self.body.position).normalize_or_zero();
                if direction == Vec2::ZERO {
                    return;
                }
                ctx.intents.emit(Intent::SpawnProjectile {
                    owner: self.id,
                    origin: self.body.position,
                    velocity: direction * projectile_speed,
                    damage: scale_damage(damage as f32, multiplier),
                });
            }
        }
        self.last_attack_at = Some(now);
        ctx.events.emit(CombatEvent::AttackPerformed {
            entity_id: self.id,
            target_id: target.id,
        });
    }

    /// Damage intake for every enemy, bosses included.
    pub(crate) fn take_damage(&mut self, amount: f32, ctx: &mut CombatContext<'_>) -> DamageOutcome {
        if !amount.is_finite() || amount <= 0.0 {
            return DamageOutcome::Rejected;
        }
        if self.dying || self.health.is_depleted() || self.body.invincible {
            return DamageOutcome::Ignored;
        }
        if self.boss.as_ref().is_some_and(|boss| boss.ignores_damage()) {
            return DamageOutcome::Ignored;
        }

        let scaled = scale_damage(amount, self.body.damage_scale);
        let floor = self.boss.as_ref().map_or(0, |boss| boss.damage_floor());
        let current = self.health.current();
        let next = clamp_phase_damage(current, scaled, floor);
        let dealt = current - next;
        if dealt == 0 {
            return DamageOutcome::Ignored;
        }
        self.health.set(next);
        ctx.events.emit(CombatEvent::EntityDamaged {
            entity_id: self.id,
            amount: dealt,
        });

        if let Some(mut boss) = self.boss.take() {
            if next == 0 {
                boss.begin_defeat(self, ctx);
            } else if next == floor {
                boss.begin_transition(self, ctx);
            }
            self.boss = Some(boss);
            return if next == 0 {
                DamageOutcome::Killed { dealt }
            } else {
                DamageOutcome::Applied {
                    dealt,
                    remaining: next,
                }
            };
        }

        if next == 0 {
            self.die(ctx);
            return DamageOutcome::Killed { dealt };
        }
        DamageOutcome::Applied {
            dealt,
            remaining: next,
        }
    }

    /// Contact with `other` this tick: contact damage once per cooldown
    /// window, then the secondary effects.
    pub(crate) fn touch(&mut self, other: EntityId, ctx: &mut CombatContext<'_>) {
        if self.dying || self.scheduler.is_paused() || self.combat_suspended() {
            return;
        }
        if self.statuses.blocks_action() {
            return;
        }
        let Some(player) = ctx.players.get(&other) else {
            return;
        };
        if !player.is_alive() {
            return;
        }
        let now = self.scheduler.now();
        let window = ctx.config.contact_cooldown();
        if let Some(last) = self.last_contact_at.get(&other) {
            if now.saturating_sub(*last) < window {
                return;
            }
        }
        self.last_contact_at.insert(other, now);

        let multiplier = self.statuses.damage_multiplier(&ctx.config.effects);
        if self.body.hurt > 0 {
            ctx.damage_player(other, scale_damage(self.body.hurt as f32, multiplier));
        }

        for effect in self.contact_effects.clone() {
            match effect {
                OnContactEffect::None => {}
                OnContactEffect::Apply(StatusEffectKind::Encourage) => self.encourage_pack(ctx),
                OnContactEffect::Apply(kind) => {
                    ctx.apply_effect(other, kind);
                }
            }
        }
    }

    /// Encourage on contact buffs the attacker and its siblings.
    fn encourage_pack(&mut self, ctx: &mut CombatContext<'_>) {
        ctx.apply_effect_to_self(self, StatusEffectKind::Encourage);
        let Some(summoner) = self.summoner else {
            return;
        };
        let siblings = ctx
            .enemies
            .iter()
            .filter(|(_, enemy)| enemy.summoner == Some(summoner) && enemy.is_alive())
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        for sibling in siblings {
            ctx.apply_effect(sibling, StatusEffectKind::Encourage);
        }
    }

    /// Counts statuses down with the enemy's own tasks, so a paused enemy's
    /// effects freeze too. Poison lands as ordinary damage.
    pub(crate) fn tick_statuses(&mut self, dt: Duration, ctx: &mut CombatContext<'_>) {
        if self.dying || self.scheduler.is_paused() || self.statuses.is_empty() {
            return;
        }
        let tick = self.statuses.tick(dt);
        for kind in tick.expired {
            ctx.events.emit(CombatEvent::StatusExpired {
                entity_id: self.id,
                kind,
            });
        }
        if tick.damage > 0 {
            self.take_damage(tick.damage as f32, ctx);
        }
    }

    pub(crate) fn on_dialog_finished(&mut self, ctx: &mut CombatContext<'_>) -> bool {
        let Some(mut boss) = self.boss.take() else {
            return false;
        };
        let handled = boss.on_dialog_finished(self, ctx);
        self.boss = Some(boss);
        handled
    }

    pub(crate) fn live_children(&self, ctx: &CombatContext<'_>) -> Vec<EntityId> {
        self.children
            .iter()
            .copied()
            .filter(|id| ctx.is_live_enemy(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_never_passes_floor_in_one_hit() {
        assert_eq!(clamp_phase_damage(500, 250, 300), 300);
        assert_eq!(clamp_phase_damage(320, 10, 300), 310);
        assert_eq!(clamp_phase_damage(300, 10_000, 0), 0);
        assert_eq!(clamp_phase_damage(10, 1, 300), 10);
    }

    #[test]
    fn scaled_damage_is_at_least_one() {
        assert_eq!(scale_damage(0.2, 1.0), 1);
        assert_eq!(scale_damage(10.0, 0.0), 1);
        assert_eq!(scale_damage(10.0, 1.5), 15);
        assert_eq!(scale_damage(f32::MAX, 4.0), u32::MAX);
    }

    #[test]
    fn summoned_enemy_starts_paused() {
        let config = SimConfig::default();
        let archetype = EnemyArchetype::default();
        let minion = Enemy::new(EntityId(2), &archetype, Vec2::ZERO, Some(EntityId(1)), &config);
        assert!(minion.is_paused());
        assert!(minion.is_summoned());
        let free = Enemy::new(EntityId(3), &archetype, Vec2::ZERO, None, &config);
        assert!(!free.is_paused());
        assert_eq!(free.scheduled_task_count(), 3);
    }

    #[test]
    fn mark_dying_only_succeeds_once_and_cancels_tasks() {
        let config = SimConfig::default();
        let mut enemy = Enemy::new(EntityId(4), &EnemyArchetype::default(), Vec2::ZERO, None, &config);
        assert!(enemy.mark_dying());
        assert_eq!(enemy.scheduled_task_count(), 0);
        assert!(!enemy.mark_dying());
    }
}
