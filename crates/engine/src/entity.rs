use serde::Serialize;

use crate::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityId(pub u64);

/// Hands out ids that are never reused within one world, so a stale id can
/// only ever resolve to nothing.
#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    current: u32,
    max: u32,
}

impl Health {
    pub fn full(max: u32) -> Self {
        let max = max.max(1);
        Self { current: max, max }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_depleted(&self) -> bool {
        self.current == 0
    }

    pub fn fraction(&self) -> f32 {
        self.current as f32 / self.max as f32
    }

    /// Sets health, keeping `0 <= current <= max`.
    pub fn set(&mut self, value: u32) {
        self.current = value.min(self.max);
    }

    pub fn reduce(&mut self, amount: u32) -> u32 {
        let before = self.current;
        self.current = self.current.saturating_sub(amount);
        before - self.current
    }
}

/// Physical and combat properties every simulated entity shares.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub facing: Vec2,
    pub speed: f32,
    /// Damage dealt on contact.
    pub hurt: u32,
    pub damage_scale: f32,
    pub invincible: bool,
    pub radius: f32,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            facing: Vec2::new(0.0, 1.0),
            speed: 0.0,
            hurt: 0,
            damage_scale: 1.0,
            invincible: false,
            radius: 12.0,
        }
    }
}

impl Body {
    pub fn overlaps(&self, other: &Body) -> bool {
        self.position.distance(other.position) <= self.radius + other.radius
    }
}

/// Weak handle from an enemy to whatever it pursues. Holding one says
/// nothing about liveness; it must be resolved through the world each time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetRef(Option<EntityId>);

impl TargetRef {
    pub const NONE: TargetRef = TargetRef(None);

    pub fn to(id: EntityId) -> Self {
        Self(Some(id))
    }

    pub fn id(&self) -> Option<EntityId> {
        self.0
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }
}

impl From<Option<EntityId>> for TargetRef {
    fn from(value: Option<EntityId>) -> Self {
        Self(value)
    }
}

/// Snapshot of a resolved target for the duration of one task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    pub id: EntityId,
    pub position: Vec2,
    pub radius: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = EntityIdAllocator::default();
        let a = allocator.allocate();
        let b = allocator.allocate();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn health_stays_within_bounds() {
        let mut health = Health::full(50);
        assert_eq!(health.reduce(80), 50);
        assert!(health.is_depleted());
        health.set(500);
        assert_eq!(health.current(), 50);
    }

    #[test]
    fn zero_max_health_is_lifted_to_one() {
        let health = Health::full(0);
        assert_eq!(health.max(), 1);
        assert!(!health.is_depleted());
    }
}
