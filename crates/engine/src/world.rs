use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::ai::AiStateCounts;
use crate::boss::{BossController, BossSpec, BossSpecError};
use crate::collision::{CircleOverlapQuery, CollisionQuery};
use crate::config::{ConfigError, SimConfig};
use crate::context::CombatContext;
use crate::enemy::{scale_damage, DamageOutcome, Enemy, EnemyArchetype};
use crate::entity::{EntityId, EntityIdAllocator, TargetRef};
use crate::intent::{CombatEvent, CombatEventBus, CombatEventCounts, Intent, IntentQueue};
use crate::math::{ArenaBounds, Vec2};
use crate::player::PlayerBody;
use crate::status::{EffectCooldowns, EffectOutcome, StatusEffectKind};

/// The simulation context every entity lives in. All inbound calls from the
/// room layer land here; the world hands each enemy a [`CombatContext`]
/// while one of its tasks runs.
#[derive(Debug)]
pub struct CombatWorld {
    config: SimConfig,
    bounds: ArenaBounds,
    clock: Duration,
    paused: bool,
    rng: StdRng,
    allocator: EntityIdAllocator,
    enemies: BTreeMap<EntityId, Enemy>,
    players: BTreeMap<EntityId, PlayerBody>,
    pending_despawns: Vec<EntityId>,
    paused_by_world: BTreeSet<EntityId>,
    /// Descendants paused along with their summoner by `pause_entity`.
    paused_with_summoner: BTreeSet<EntityId>,
    cooldowns: EffectCooldowns,
    events: CombatEventBus,
    intents: IntentQueue,
    collision: Box<dyn CollisionQuery>,
}

impl CombatWorld {
    pub fn new(config: SimConfig, bounds: ArenaBounds) -> Self {
        Self::with_collision(config, bounds, Box::new(CircleOverlapQuery))
    }

    pub fn try_new(config: SimConfig, bounds: ArenaBounds) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config, bounds))
    }

    pub fn with_collision(
        config: SimConfig,
        bounds: ArenaBounds,
        collision: Box<dyn CollisionQuery>,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.rng_seed);
        Self {
            config,
            bounds,
            clock: Duration::ZERO,
            paused: false,
            rng,
            allocator: EntityIdAllocator::default(),
            enemies: BTreeMap::new(),
            players: BTreeMap::new(),
            pending_despawns: Vec::new(),
            paused_by_world: BTreeSet::new(),
            paused_with_summoner: BTreeSet::new(),
            cooldowns: EffectCooldowns::default(),
            events: CombatEventBus::default(),
            intents: IntentQueue::default(),
            collision,
        }
    }

    fn context(&mut self) -> CombatContext<'_> {
        CombatContext {
            config: &self.config,
            bounds: self.bounds,
            clock: self.clock,
            rng: &mut self.rng,
            players: &mut self.players,
            enemies: &mut self.enemies,
            cooldowns: &mut self.cooldowns,
            events: &mut self.events,
            intents: &mut self.intents,
            despawns: &mut self.pending_despawns,
        }
    }

    /// Runs `f` with `id` taken out of the enemy table so it can mutate both
    /// itself and the rest of the world.
    fn with_detached<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Enemy, &mut CombatContext<'_>) -> R,
    ) -> Option<R> {
        let mut enemy = self.enemies.remove(&id)?;
        let result = {
            let mut ctx = self.context();
            f(&mut enemy, &mut ctx)
        };
        self.enemies.insert(id, enemy);
        Some(result)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn bounds(&self) -> ArenaBounds {
        self.bounds
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn spawn_player(&mut self, position: Vec2, max_health: u32, radius: f32) -> EntityId {
        let id = self.allocator.allocate();
        let position = self.bounds.clamp(position);
        self.players
            .insert(id, PlayerBody::new(id, position, max_health, radius));
        info!(player_id = id.0, max_health, "player_spawned");
        id
    }

    /// Summoned enemies start paused and stay inert until the room layer
    /// resumes them with [`resume_entity`](Self::resume_entity).
    pub fn spawn_enemy(
        &mut self,
        archetype: &EnemyArchetype,
        position: Vec2,
        summoner: Option<EntityId>,
    ) -> EntityId {
        let id = self.allocator.allocate();
        let position = self.bounds.inset(archetype.radius).clamp(position);
        let enemy = Enemy::new(id, archetype, position, summoner, &self.config);
        if let Some(parent) = summoner.and_then(|parent| self.enemies.get_mut(&parent)) {
            parent.children.push(id);
        }
        debug!(
            enemy_id = id.0,
            def = %archetype.def_name,
            summoner = summoner.map_or(-1, |parent| parent.0 as i64),
            "enemy_spawned"
        );
        self.enemies.insert(id, enemy);
        id
    }

    pub fn spawn_boss(
        &mut self,
        archetype: &EnemyArchetype,
        spec: BossSpec,
        position: Vec2,
    ) -> Result<EntityId, BossSpecError> {
        spec.validate_for_health(archetype.max_health)?;
        let id = self.allocator.allocate();
        let position = self.bounds.inset(archetype.radius).clamp(position);
        let mut enemy = Enemy::new(id, archetype, position, None, &self.config);
        let mut boss = BossController::new(spec, archetype.max_health);
        {
            let mut ctx = self.context();
            boss.start(&mut enemy, &mut ctx);
        }
        enemy.boss = Some(Box::new(boss));
        self.enemies.insert(id, enemy);
        Ok(id)
    }

    /// Points an enemy at `target`, or clears it. False for an unknown or
    /// dying enemy.
    pub fn set_target(&mut self, enemy_id: EntityId, target: Option<EntityId>) -> bool {
        match self.enemies.get_mut(&enemy_id) {
            Some(enemy) if enemy.is_alive() => {
                enemy.set_target(TargetRef::from(target));
                true
            }
            _ => false,
        }
    }

    pub fn set_player_position(&mut self, id: EntityId, position: Vec2) -> bool {
        let bounds = self.bounds;
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        player.body.position = bounds.inset(player.body.radius).clamp(position);
        true
    }

    pub fn set_player_invincible(&mut self, id: EntityId, invincible: bool) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        player.body.invincible = invincible;
        true
    }

    /// Damage intake for any entity. Stale ids are ignored.
    pub fn take_damage(&mut self, id: EntityId, amount: f32) -> DamageOutcome {
        if !amount.is_finite() || amount <= 0.0 {
            return DamageOutcome::Rejected;
        }
        if let Some(player) = self.players.get(&id) {
            if !player.is_alive() {
                return DamageOutcome::Ignored;
            }
            let scaled = scale_damage(amount, player.body.damage_scale);
            let dealt = self.context().damage_player(id, scaled);
            let remaining = self
                .players
                .get(&id)
                .map_or(0, |player| player.health().current());
            return match (dealt, remaining) {
                (0, _) => DamageOutcome::Ignored,
                (dealt, 0) => DamageOutcome::Killed { dealt },
                (dealt, remaining) => DamageOutcome::Applied { dealt, remaining },
            };
        }
        self.with_detached(id, |enemy, ctx| enemy.take_damage(amount, ctx))
            .unwrap_or(DamageOutcome::Ignored)
    }

    /// Contact reported by an outside spatial query.
    pub fn notify_contact(&mut self, enemy_id: EntityId, other: EntityId) {
        self.with_detached(enemy_id, |enemy, ctx| enemy.touch(other, ctx));
    }

    pub fn apply_effect(&mut self, target: EntityId, kind: StatusEffectKind) -> EffectOutcome {
        self.context().apply_effect(target, kind)
    }

    /// Acknowledges the dialog a boss asked for. False when the boss is gone
    /// or was not waiting on anything.
    pub fn on_dialog_finished(&mut self, boss_id: EntityId) -> bool {
        match self.with_detached(boss_id, |enemy, ctx| enemy.on_dialog_finished(ctx)) {
            Some(handled) => handled,
            None => {
                warn!(boss_id = boss_id.0, "dialog_ack_for_missing_boss");
                false
            }
        }
    }

    /// Menu-style pause of the whole simulation. Only enemies this call
    /// paused are resumed by [`resume_timers`](Self::resume_timers).
    pub fn pause_timers(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        for (id, enemy) in &mut self.enemies {
            if !enemy.is_paused() {
                enemy.pause_timers();
                self.paused_by_world.insert(*id);
            }
        }
        info!(enemies = self.paused_by_world.len(), "world_paused");
    }

    pub fn resume_timers(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        let remainder = self.config.one_shot_resume();
        for id in std::mem::take(&mut self.paused_by_world) {
            if let Some(enemy) = self.enemies.get_mut(&id) {
                enemy.resume_timers(remainder);
            }
        }
        info!("world_resumed");
    }

    /// Pauses one enemy and everything it summoned. Descendants that were
    /// already held for another reason, such as a summon still waiting to be
    /// released, are left to whoever holds them.
    pub fn pause_entity(&mut self, id: EntityId) -> bool {
        let targets = self.family_of(id);
        if targets.is_empty() {
            return false;
        }
        for target in targets {
            let Some(enemy) = self.enemies.get_mut(&target) else {
                continue;
            };
            let held_by_world = self.paused_by_world.remove(&target);
            if target != id && enemy.is_paused() && !held_by_world {
                continue;
            }
            enemy.pause_timers();
            if target != id {
                self.paused_with_summoner.insert(target);
            }
        }
        true
    }

    /// Resumes `id` itself and only those descendants that
    /// [`pause_entity`](Self::pause_entity) paused along with it.
    pub fn resume_entity(&mut self, id: EntityId) -> bool {
        let targets = self.family_of(id);
        if targets.is_empty() {
            return false;
        }
        let remainder = self.config.one_shot_resume();
        for target in targets {
            let was_cascaded = self.paused_with_summoner.remove(&target);
            if target != id && !was_cascaded {
                continue;
            }
            self.paused_by_world.remove(&target);
            if let Some(enemy) = self.enemies.get_mut(&target) {
                enemy.resume_timers(remainder);
            }
        }
        true
    }

    /// `id` followed by its live descendants, depth first.
    fn family_of(&self, id: EntityId) -> Vec<EntityId> {
        let mut family = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(enemy) = self.enemies.get(&next) else {
                continue;
            };
            if !enemy.is_alive() || family.contains(&next) {
                continue;
            }
            family.push(next);
            stack.extend(enemy.children().iter().rev().copied());
        }
        family
    }

    /// Removes an entity at the next safe point. Its tasks stop right away.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if let Some(enemy) = self.enemies.get_mut(&id) {
            enemy.mark_dying();
        } else if !self.players.contains_key(&id) {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    /// Applies queued removals. Runs at the start and end of every advance.
    pub fn apply_pending(&mut self) {
        if self.pending_despawns.is_empty() {
            return;
        }
        self.pending_despawns.sort_by_key(|id| id.0);
        self.pending_despawns.dedup();
        for id in std::mem::take(&mut self.pending_despawns) {
            if let Some(enemy) = self.enemies.remove(&id) {
                if let Some(parent) = enemy
                    .summoner()
                    .and_then(|parent| self.enemies.get_mut(&parent))
                {
                    parent.children.retain(|child| *child != id);
                }
                debug!(enemy_id = id.0, def = %enemy.def_name(), "enemy_despawned");
            } else if self.players.remove(&id).is_some() {
                debug!(player_id = id.0, "player_despawned");
            }
            self.paused_by_world.remove(&id);
            self.paused_with_summoner.remove(&id);
            self.cooldowns.evict(id);
        }
    }

    /// Moves the simulation forward by `dt`. Does nothing while paused.
    pub fn advance(&mut self, dt: Duration) {
        if self.paused {
            return;
        }
        self.events.finish_tick_rollover();
        self.apply_pending();
        self.clock += dt;

        let ids = self.enemies.keys().copied().collect::<Vec<_>>();
        for id in ids {
            self.with_detached(id, |enemy, ctx| {
                if !enemy.is_alive() {
                    return;
                }
                enemy.scheduler.begin_advance(dt);
                while let Some(key) = enemy.scheduler.next_due() {
                    enemy.run_task(key, ctx);
                }
                enemy.scheduler.finish_advance();
                enemy.tick_statuses(dt, ctx);
            });
        }

        self.tick_player_statuses(dt);
        self.resolve_contacts();
        self.apply_pending();
    }

    fn tick_player_statuses(&mut self, dt: Duration) {
        let mut damage = Vec::new();
        for (id, player) in &mut self.players {
            if !player.is_alive() || player.statuses.is_empty() {
                continue;
            }
            let tick = player.statuses.tick(dt);
            for kind in tick.expired {
                self.events.emit(CombatEvent::StatusExpired {
                    entity_id: *id,
                    kind,
                });
            }
            if tick.damage > 0 {
                damage.push((*id, tick.damage));
            }
        }
        let mut ctx = self.context();
        for (id, amount) in damage {
            ctx.damage_player(id, amount);
        }
    }

    fn resolve_contacts(&mut self) {
        let pairs = self.collision.contacts(&self.enemies, &self.players);
        for pair in pairs {
            self.with_detached(pair.enemy, |enemy, ctx| enemy.touch(pair.other, ctx));
        }
    }

    pub fn enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.get(&id)
    }

    pub fn player(&self, id: EntityId) -> Option<&PlayerBody> {
        self.players.get(&id)
    }

    pub fn enemies(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.values()
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerBody> {
        self.players.values()
    }

    pub fn enemy_ids(&self) -> Vec<EntityId> {
        self.enemies.keys().copied().collect()
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.enemies.get(&id).is_some_and(Enemy::is_alive)
            || self.players.get(&id).is_some_and(PlayerBody::is_alive)
    }

    pub fn live_enemy_count(&self) -> usize {
        self.enemies.values().filter(|enemy| enemy.is_alive()).count()
    }

    /// Events since the last advance started, including those raised by
    /// inbound calls made after it.
    pub fn events(&self) -> impl Iterator<Item = &CombatEvent> {
        self.events.iter_emitted_so_far()
    }

    pub fn last_tick_counts(&self) -> CombatEventCounts {
        self.events.last_tick_counts()
    }

    pub fn pending_intents(&self) -> &[Intent] {
        self.intents.pending()
    }

    pub fn drain_intents(&mut self) -> Vec<Intent> {
        self.intents.drain()
    }

    pub fn intents_emitted_total(&self) -> u64 {
        self.intents.emitted_total()
    }

    pub fn ai_state_counts(&self) -> AiStateCounts {
        let mut counts = AiStateCounts::default();
        for enemy in self.enemies.values().filter(|enemy| enemy.is_alive()) {
            counts.record(enemy.state());
        }
        counts
    }

    pub fn effect_cooldown_count(&self) -> usize {
        self.cooldowns.len()
    }
}
