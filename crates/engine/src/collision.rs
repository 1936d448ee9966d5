use std::collections::BTreeMap;

use crate::enemy::Enemy;
use crate::entity::EntityId;
use crate::player::PlayerBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContactPair {
    pub enemy: EntityId,
    pub other: EntityId,
}

/// Finds enemy/player overlaps for the current tick. Results must come back
/// in a stable order so contact resolution is deterministic.
pub trait CollisionQuery: std::fmt::Debug {
    fn contacts(
        &self,
        enemies: &BTreeMap<EntityId, Enemy>,
        players: &BTreeMap<EntityId, PlayerBody>,
    ) -> Vec<ContactPair>;
}

/// Brute-force circle test. Arenas hold a few dozen bodies at most.
#[derive(Debug, Default, Clone, Copy)]
pub struct CircleOverlapQuery;

impl CollisionQuery for CircleOverlapQuery {
    fn contacts(
        &self,
        enemies: &BTreeMap<EntityId, Enemy>,
        players: &BTreeMap<EntityId, PlayerBody>,
    ) -> Vec<ContactPair> {
        let mut pairs = Vec::new();
        for (enemy_id, enemy) in enemies {
            if !enemy.is_alive() || enemy.is_paused() {
                continue;
            }
            for (player_id, player) in players {
                if player.is_alive() && enemy.body.overlaps(&player.body) {
                    pairs.push(ContactPair {
                        enemy: *enemy_id,
                        other: *player_id,
                    });
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::enemy::EnemyArchetype;
    use crate::math::Vec2;

    #[test]
    fn overlapping_bodies_pair_up_in_id_order() {
        let config = SimConfig::default();
        let archetype = EnemyArchetype::default();
        let mut enemies = BTreeMap::new();
        for (id, x) in [(3, 0.0), (2, 10.0), (4, 500.0)] {
            enemies.insert(
                EntityId(id),
                Enemy::new(EntityId(id), &archetype, Vec2::new(x, 0.0), None, &config),
            );
        }
        let mut players = BTreeMap::new();
        players.insert(
            EntityId(1),
            PlayerBody::new(EntityId(1), Vec2::new(5.0, 0.0), 100, 12.0),
        );

        let pairs = CircleOverlapQuery.contacts(&enemies, &players);
        assert_eq!(
            pairs,
            vec![
                ContactPair {
                    enemy: EntityId(2),
                    other: EntityId(1)
                },
                ContactPair {
                    enemy: EntityId(3),
                    other: EntityId(1)
                },
            ]
        );
    }

    #[test]
    fn paused_enemies_make_no_contact() {
        let config = SimConfig::default();
        let mut enemies = BTreeMap::new();
        let minion = Enemy::new(
            EntityId(2),
            &EnemyArchetype::default(),
            Vec2::ZERO,
            Some(EntityId(9)),
            &config,
        );
        enemies.insert(EntityId(2), minion);
        let mut players = BTreeMap::new();
        players.insert(EntityId(1), PlayerBody::new(EntityId(1), Vec2::ZERO, 100, 12.0));
        assert!(CircleOverlapQuery.contacts(&enemies, &players).is_empty());
    }
}
