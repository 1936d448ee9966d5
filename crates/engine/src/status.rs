use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{EffectRules, EffectTable};
use crate::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusEffectKind {
    Sleep,
    Stun,
    Poison,
    Fear,
    Encourage,
}

impl StatusEffectKind {
    pub const ALL: [StatusEffectKind; 5] = [
        StatusEffectKind::Sleep,
        StatusEffectKind::Stun,
        StatusEffectKind::Poison,
        StatusEffectKind::Fear,
        StatusEffectKind::Encourage,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Sleep" => Some(Self::Sleep),
            "Stun" => Some(Self::Stun),
            "Poison" => Some(Self::Poison),
            "Fear" => Some(Self::Fear),
            "Encourage" => Some(Self::Encourage),
            _ => None,
        }
    }
}

/// Secondary behavior an enemy triggers when it lands a contact hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnContactEffect {
    Apply(StatusEffectKind),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveStatus {
    pub kind: StatusEffectKind,
    pub remaining: Duration,
    next_tick_in: Option<Duration>,
    tick_interval: Option<Duration>,
    tick_damage: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSet {
    pub active: Vec<ActiveStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTick {
    pub expired: Vec<StatusEffectKind>,
    pub damage: u32,
}

impl StatusSet {
    pub fn has(&self, kind: StatusEffectKind) -> bool {
        self.active.iter().any(|status| status.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn insert(&mut self, kind: StatusEffectKind, rules: &EffectRules) {
        let tick_interval = rules.tick_interval();
        self.active.push(ActiveStatus {
            kind,
            remaining: rules.duration(),
            next_tick_in: tick_interval,
            tick_interval,
            tick_damage: rules.tick_damage,
        });
    }

    pub fn remove(&mut self, kind: StatusEffectKind) -> bool {
        let before_len = self.active.len();
        self.active.retain(|status| status.kind != kind);
        before_len != self.active.len()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Counts down every status. Damage-over-time ticks that fall inside `dt`
    /// are summed; a tick landing exactly on expiry still counts.
    pub fn tick(&mut self, dt: Duration) -> StatusTick {
        let mut result = StatusTick::default();
        for status in &mut self.active {
            let elapsed = dt.min(status.remaining);
            if let (Some(interval), Some(next)) = (status.tick_interval, status.next_tick_in.as_mut()) {
                let mut budget = elapsed;
                while budget >= *next {
                    budget -= *next;
                    *next = interval;
                    result.damage = result.damage.saturating_add(status.tick_damage);
                }
                *next -= budget;
            }
            status.remaining = status.remaining.saturating_sub(dt);
        }
        self.active.retain(|status| {
            if status.remaining.is_zero() {
                result.expired.push(status.kind);
                false
            } else {
                true
            }
        });
        result
    }

    /// Sleep and stun stop movement and attacks outright.
    pub fn blocks_action(&self) -> bool {
        self.has(StatusEffectKind::Sleep) || self.has(StatusEffectKind::Stun)
    }

    pub fn is_feared(&self) -> bool {
        self.has(StatusEffectKind::Fear)
    }

    pub fn speed_multiplier(&self, table: &EffectTable) -> f32 {
        self.active
            .iter()
            .map(|status| table.rules(status.kind).speed_multiplier)
            .product()
    }

    pub fn damage_multiplier(&self, table: &EffectTable) -> f32 {
        self.active
            .iter()
            .map(|status| table.rules(status.kind).damage_multiplier)
            .product()
    }
}

/// Per-target effect cooldowns. Entries must be evicted when the keyed
/// entity leaves the world.
#[derive(Debug, Clone, Default)]
pub struct EffectCooldowns {
    ready_at: HashMap<(EntityId, StatusEffectKind), Duration>,
}

impl EffectCooldowns {
    pub fn is_ready(&self, target: EntityId, kind: StatusEffectKind, now: Duration) -> bool {
        self.ready_at
            .get(&(target, kind))
            .map_or(true, |ready_at| now >= *ready_at)
    }

    pub fn arm(&mut self, target: EntityId, kind: StatusEffectKind, ready_at: Duration) {
        self.ready_at.insert((target, kind), ready_at);
    }

    pub fn evict(&mut self, target: EntityId) {
        self.ready_at.retain(|(entity, _), _| *entity != target);
    }

    pub fn len(&self) -> usize {
        self.ready_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready_at.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSkipReason {
    TargetGone,
    AlreadyActive,
    OnCooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectOutcome {
    Applied,
    Skipped(EffectSkipReason),
}

impl EffectOutcome {
    pub fn applied(self) -> bool {
        matches!(self, EffectOutcome::Applied)
    }
}

/// Applies `kind` unless the target is gone, already affected or still on
/// cooldown. A skip leaves both the status set and the cooldown map alone.
pub fn try_apply_effect(
    target: EntityId,
    target_alive: bool,
    statuses: &mut StatusSet,
    cooldowns: &mut EffectCooldowns,
    kind: StatusEffectKind,
    rules: &EffectRules,
    now: Duration,
) -> EffectOutcome {
    if !target_alive {
        return EffectOutcome::Skipped(EffectSkipReason::TargetGone);
    }
    if statuses.has(kind) {
        return EffectOutcome::Skipped(EffectSkipReason::AlreadyActive);
    }
    if !cooldowns.is_ready(target, kind, now) {
        return EffectOutcome::Skipped(EffectSkipReason::OnCooldown);
    }
    statuses.insert(kind, rules);
    cooldowns.arm(target, kind, now + rules.cooldown());
    EffectOutcome::Applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn poison_on_cooldown_creates_no_timer() {
        let table = EffectTable::default();
        let target = EntityId(7);
        let mut statuses = StatusSet::default();
        let mut cooldowns = EffectCooldowns::default();
        cooldowns.arm(target, StatusEffectKind::Poison, ms(3_000));
        let snapshot = cooldowns.clone();

        let outcome = try_apply_effect(
            target,
            true,
            &mut statuses,
            &mut cooldowns,
            StatusEffectKind::Poison,
            table.rules(StatusEffectKind::Poison),
            ms(1_000),
        );

        assert_eq!(outcome, EffectOutcome::Skipped(EffectSkipReason::OnCooldown));
        assert!(statuses.is_empty());
        assert!(statuses.tick(ms(5_000)).damage == 0);
        assert_eq!(cooldowns.ready_at, snapshot.ready_at);
    }

    #[test]
    fn dead_target_is_checked_before_anything_else() {
        let table = EffectTable::default();
        let mut statuses = StatusSet::default();
        let mut cooldowns = EffectCooldowns::default();
        let outcome = try_apply_effect(
            EntityId(1),
            false,
            &mut statuses,
            &mut cooldowns,
            StatusEffectKind::Sleep,
            table.rules(StatusEffectKind::Sleep),
            ms(0),
        );
        assert_eq!(outcome, EffectOutcome::Skipped(EffectSkipReason::TargetGone));
        assert!(cooldowns.is_empty());
    }

    #[test]
    fn effects_do_not_stack() {
        let table = EffectTable::default();
        let mut statuses = StatusSet::default();
        let mut cooldowns = EffectCooldowns::default();
        let rules = table.rules(StatusEffectKind::Stun);
        assert!(try_apply_effect(
            EntityId(1),
            true,
            &mut statuses,
            &mut cooldowns,
            StatusEffectKind::Stun,
            rules,
            ms(0)
        )
        .applied());
        let second = try_apply_effect(
            EntityId(1),
            true,
            &mut statuses,
            &mut cooldowns,
            StatusEffectKind::Stun,
            rules,
            ms(10_000),
        );
        assert_eq!(second, EffectOutcome::Skipped(EffectSkipReason::AlreadyActive));
        assert_eq!(statuses.active.len(), 1);
    }

    #[test]
    fn poison_deals_damage_on_interval_until_expiry() {
        let table = EffectTable::default();
        let mut statuses = StatusSet::default();
        let mut cooldowns = EffectCooldowns::default();
        try_apply_effect(
            EntityId(3),
            true,
            &mut statuses,
            &mut cooldowns,
            StatusEffectKind::Poison,
            table.rules(StatusEffectKind::Poison),
            ms(0),
        );

        let mut total = 0;
        let mut expired = Vec::new();
        for _ in 0..40 {
            let tick = statuses.tick(ms(100));
            total += tick.damage;
            expired.extend(tick.expired);
        }
        // 3000ms at one tick per 500ms, 2 damage each.
        assert_eq!(total, 12);
        assert_eq!(expired, vec![StatusEffectKind::Poison]);
        assert!(statuses.is_empty());
    }

    #[test]
    fn eviction_drops_every_kind_for_the_entity() {
        let mut cooldowns = EffectCooldowns::default();
        cooldowns.arm(EntityId(1), StatusEffectKind::Poison, ms(10));
        cooldowns.arm(EntityId(1), StatusEffectKind::Fear, ms(10));
        cooldowns.arm(EntityId(2), StatusEffectKind::Fear, ms(10));
        cooldowns.evict(EntityId(1));
        assert_eq!(cooldowns.len(), 1);
        assert!(!cooldowns.is_ready(EntityId(2), StatusEffectKind::Fear, ms(5)));
    }

    #[test]
    fn encourage_multiplies_speed() {
        let table = EffectTable::default();
        let mut statuses = StatusSet::default();
        let mut cooldowns = EffectCooldowns::default();
        try_apply_effect(
            EntityId(9),
            true,
            &mut statuses,
            &mut cooldowns,
            StatusEffectKind::Encourage,
            table.rules(StatusEffectKind::Encourage),
            ms(0),
        );
        assert!((statuses.speed_multiplier(&table) - 1.5).abs() < 0.0001);
        assert!(!statuses.blocks_action());
    }
}
