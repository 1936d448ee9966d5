use crate::entity::{Body, EntityId, Health};
use crate::math::Vec2;
use crate::status::StatusSet;

/// The entity enemies pursue. Its movement is driven from outside the core;
/// the core only damages it and hangs status effects on it.
#[derive(Debug, Clone)]
pub struct PlayerBody {
    id: EntityId,
    pub body: Body,
    health: Health,
    pub statuses: StatusSet,
    death_announced: bool,
}

impl PlayerBody {
    pub(crate) fn new(id: EntityId, position: Vec2, max_health: u32, radius: f32) -> Self {
        Self {
            id,
            body: Body {
                position,
                radius,
                ..Body::default()
            },
            health: Health::full(max_health),
            statuses: StatusSet::default(),
            death_announced: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn position(&self) -> Vec2 {
        self.body.position
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn is_alive(&self) -> bool {
        !self.health.is_depleted()
    }

    /// Returns the damage actually dealt.
    pub(crate) fn reduce_health(&mut self, amount: u32) -> u32 {
        if !self.is_alive() || self.body.invincible {
            return 0;
        }
        self.health.reduce(amount)
    }

    /// True exactly once, the first time this is called after health ran out.
    pub(crate) fn take_death_announcement(&mut self) -> bool {
        if self.is_alive() || self.death_announced {
            return false;
        }
        self.death_announced = true;
        self.statuses.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn death_is_announced_once() {
        let mut player = PlayerBody::new(EntityId(1), Vec2::ZERO, 10, 12.0);
        assert!(!player.take_death_announcement());
        assert_eq!(player.reduce_health(25), 10);
        assert!(player.take_death_announcement());
        assert!(!player.take_death_announcement());
        assert_eq!(player.reduce_health(5), 0);
    }
}
