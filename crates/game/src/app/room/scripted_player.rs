/// Stand-in for player input in headless runs: kites around the arena on a
/// circle and swings at the nearest enemy whenever the swing is ready.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedPlayer {
    angle: f32,
    strike_cooldown: Duration,
}

impl ScriptedPlayer {
    fn kite_radius(bounds: ArenaBounds) -> f32 {
        (bounds.width().min(bounds.height()) * 0.35).max(1.0)
    }

    pub(crate) fn next_position(&mut self, bounds: ArenaBounds, speed: f32, dt: Duration) -> Vec2 {
        let radius = Self::kite_radius(bounds);
        self.angle = (self.angle + speed * dt.as_secs_f32() / radius) % TAU;
        bounds.center() + Vec2::from_angle(self.angle) * radius
    }

    /// Nearest live enemy within `range` of the player's edge, ties broken
    /// by id.
    pub(crate) fn pick_target(
        world: &CombatWorld,
        position: Vec2,
        range: f32,
    ) -> Option<EntityId> {
        world
            .enemies()
            .filter(|enemy| enemy.is_alive())
            .map(|enemy| {
                let gap = enemy.position().distance(position) - enemy.body.radius;
                (enemy.id(), gap)
            })
            .filter(|(_, gap)| *gap <= range)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    pub(crate) fn cool_down(&mut self, dt: Duration) {
        self.strike_cooldown = self.strike_cooldown.saturating_sub(dt);
    }

    pub(crate) fn can_strike(&self) -> bool {
        self.strike_cooldown.is_zero()
    }

    pub(crate) fn start_strike_cooldown(&mut self, cooldown: Duration) {
        self.strike_cooldown = cooldown;
    }
}
