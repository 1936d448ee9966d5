use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use tracing::debug;

use crate::config::SimConfig;
use crate::enemy::Enemy;
use crate::entity::{EntityId, TargetView};
use crate::intent::{CombatEvent, CombatEventBus, Intent, IntentQueue};
use crate::math::ArenaBounds;
use crate::player::PlayerBody;
use crate::status::{
    try_apply_effect, EffectCooldowns, EffectOutcome, EffectSkipReason, StatusEffectKind,
    StatusSet,
};

/// Everything an enemy may touch while one of its tasks runs. The enemy
/// itself is detached from `enemies` for the duration, so cross-entity
/// effects go through the methods here.
pub(crate) struct CombatContext<'a> {
    pub config: &'a SimConfig,
    pub bounds: ArenaBounds,
    /// World clock, used for effect cooldowns shared between entities.
    pub clock: Duration,
    pub rng: &'a mut StdRng,
    pub players: &'a mut BTreeMap<EntityId, PlayerBody>,
    pub enemies: &'a mut BTreeMap<EntityId, Enemy>,
    pub cooldowns: &'a mut EffectCooldowns,
    pub events: &'a mut CombatEventBus,
    pub intents: &'a mut IntentQueue,
    pub despawns: &'a mut Vec<EntityId>,
}

impl CombatContext<'_> {
    pub fn resolve(&self, id: EntityId) -> Option<TargetView> {
        if let Some(player) = self.players.get(&id) {
            return player.is_alive().then(|| TargetView {
                id,
                position: player.body.position,
                radius: player.body.radius,
            });
        }
        let enemy = self.enemies.get(&id)?;
        enemy.is_alive().then(|| TargetView {
            id,
            position: enemy.body.position,
            radius: enemy.body.radius,
        })
    }

    pub fn is_live_enemy(&self, id: EntityId) -> bool {
        self.enemies.get(&id).is_some_and(Enemy::is_alive)
    }

    pub fn live_players(&self) -> impl Iterator<Item = &PlayerBody> {
        self.players.values().filter(|player| player.is_alive())
    }

    /// Damages a player. Enemies never hurt each other, so any other id is a
    /// no-op. Returns the damage dealt.
    pub fn damage_player(&mut self, id: EntityId, amount: u32) -> u32 {
        let Some(player) = self.players.get_mut(&id) else {
            return 0;
        };
        if amount == 0 {
            return 0;
        }
        let dealt = player.reduce_health(amount);
        if dealt > 0 {
            self.events.emit(CombatEvent::EntityDamaged {
                entity_id: id,
                amount: dealt,
            });
        }
        if player.take_death_announcement() {
            self.events.emit(CombatEvent::EntityDied { entity_id: id });
            self.intents.emit(Intent::Dying {
                entity_id: id,
                summoned: false,
            });
        }
        dealt
    }

    /// Applies a status effect to a player or to an enemy other than the one
    /// currently ticking.
    pub fn apply_effect(&mut self, target: EntityId, kind: StatusEffectKind) -> EffectOutcome {
        let Self {
            config,
            clock,
            players,
            enemies,
            cooldowns,
            events,
            ..
        } = self;
        let (alive, statuses) = if let Some(player) = players.get_mut(&target) {
            (player.is_alive(), &mut player.statuses)
        } else if let Some(enemy) = enemies.get_mut(&target) {
            (enemy.is_alive(), &mut enemy.statuses)
        } else {
            let outcome = EffectOutcome::Skipped(EffectSkipReason::TargetGone);
            events.emit(CombatEvent::StatusSkipped {
                entity_id: target,
                kind,
                reason: EffectSkipReason::TargetGone,
            });
            return outcome;
        };
        apply_and_report(*config, *clock, cooldowns, events, target, alive, statuses, kind)
    }

    /// Same checks as [`apply_effect`](Self::apply_effect) for the detached
    /// enemy itself.
    pub fn apply_effect_to_self(&mut self, enemy: &mut Enemy, kind: StatusEffectKind) -> EffectOutcome {
        let alive = enemy.is_alive();
        apply_and_report(
            self.config,
            self.clock,
            self.cooldowns,
            self.events,
            enemy.id(),
            alive,
            &mut enemy.statuses,
            kind,
        )
    }

    pub fn announce_death(&mut self, id: EntityId, summoned: bool) {
        self.events.emit(CombatEvent::EntityDied { entity_id: id });
        self.intents.emit(Intent::Dying {
            entity_id: id,
            summoned,
        });
        self.despawns.push(id);
    }

    /// Kills another enemy outright, e.g. minions cleared on boss defeat.
    pub fn kill_enemy(&mut self, id: EntityId) {
        let Some(enemy) = self.enemies.get_mut(&id) else {
            return;
        };
        let summoned = enemy.is_summoned();
        if enemy.mark_dying() {
            self.announce_death(id, summoned);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_and_report(
    config: &SimConfig,
    clock: Duration,
    cooldowns: &mut EffectCooldowns,
    events: &mut CombatEventBus,
    target: EntityId,
    alive: bool,
    statuses: &mut StatusSet,
    kind: StatusEffectKind,
) -> EffectOutcome {
    let outcome = try_apply_effect(
        target,
        alive,
        statuses,
        cooldowns,
        kind,
        config.effects.rules(kind),
        clock,
    );
    match outcome {
        EffectOutcome::Applied => {
            debug!(entity_id = target.0, effect = ?kind, "status_applied");
            events.emit(CombatEvent::StatusApplied {
                entity_id: target,
                kind,
            });
        }
        EffectOutcome::Skipped(reason) => {
            debug!(entity_id = target.0, effect = ?kind, reason = ?reason, "status_skipped");
            events.emit(CombatEvent::StatusSkipped {
                entity_id: target,
                kind,
                reason,
            });
        }
    }
    outcome
}
