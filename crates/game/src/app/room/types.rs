/// Tunables of the room layer around the combat core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RoomConfig {
    pub(crate) arena_width: f32,
    pub(crate) arena_height: f32,
    /// How long freshly summoned minions stay inert.
    pub(crate) summon_resume_delay_ms: u64,
    /// Reading time the dialog director grants per line before it
    /// acknowledges on its own.
    pub(crate) dialog_ms_per_line: u64,
    pub(crate) player_max_health: u32,
    pub(crate) player_radius: f32,
    pub(crate) player_speed: f32,
    pub(crate) player_strike_damage: f32,
    pub(crate) player_strike_range: f32,
    pub(crate) player_strike_cooldown_ms: u64,
    pub(crate) reward_per_enemy: u32,
    pub(crate) projectile_lifetime_ms: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            arena_width: 800.0,
            arena_height: 600.0,
            summon_resume_delay_ms: 1_000,
            dialog_ms_per_line: 1_500,
            player_max_health: 100,
            player_radius: 12.0,
            player_speed: 140.0,
            player_strike_damage: 12.0,
            player_strike_range: 70.0,
            player_strike_cooldown_ms: 400,
            reward_per_enemy: 10,
            projectile_lifetime_ms: 4_000,
        }
    }
}

impl RoomConfig {
    pub(crate) fn bounds(&self) -> ArenaBounds {
        ArenaBounds::new(self.arena_width, self.arena_height)
    }

    pub(crate) fn validate(&self) -> Result<(), RoomBuildError> {
        for (field, value) in [
            ("arena_width", self.arena_width),
            ("arena_height", self.arena_height),
            ("player_radius", self.player_radius),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RoomBuildError::InvalidRoomConfig { field });
            }
        }
        for (field, value) in [
            ("player_speed", self.player_speed),
            ("player_strike_damage", self.player_strike_damage),
            ("player_strike_range", self.player_strike_range),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RoomBuildError::InvalidRoomConfig { field });
            }
        }
        if self.player_max_health == 0 {
            return Err(RoomBuildError::InvalidRoomConfig {
                field: "player_max_health",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub(crate) enum RoomBuildError {
    #[error("encounter '{encounter}' needs enemy def '{def_name}', which is not loaded")]
    UnknownArchetype {
        encounter: &'static str,
        def_name: String,
    },
    #[error(transparent)]
    InvalidBoss(#[from] BossSpecError),
    #[error(transparent)]
    InvalidSimConfig(#[from] ConfigError),
    #[error("room config field {field} must be finite and positive")]
    InvalidRoomConfig { field: &'static str },
}

/// What happened to the intents drained after one advance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct IntentApplyStats {
    pub(crate) applied: u32,
    pub(crate) invalid_target: u32,
    pub(crate) unknown_archetype: u32,
}

impl IntentApplyStats {
    fn merge(&mut self, other: IntentApplyStats) {
        self.applied = self.applied.saturating_add(other.applied);
        self.invalid_target = self.invalid_target.saturating_add(other.invalid_target);
        self.unknown_archetype = self
            .unknown_archetype
            .saturating_add(other.unknown_archetype);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Projectile {
    pub(crate) owner: EntityId,
    pub(crate) position: Vec2,
    /// Units per second.
    pub(crate) velocity: Vec2,
    pub(crate) damage: u32,
    pub(crate) age: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ShownDialog {
    pub(crate) boss_id: EntityId,
    pub(crate) lines: Vec<String>,
    pub(crate) background: String,
    remaining: Duration,
}

/// Shows one boss dialog at a time and acknowledges it once read. With
/// `auto_acknowledge` off it waits for [`Room::acknowledge_dialog`].
#[derive(Debug, Default)]
pub(crate) struct DialogDirector {
    ms_per_line: u64,
    auto_acknowledge: bool,
    current: Option<ShownDialog>,
    queued: VecDeque<ShownDialog>,
    shown_total: u32,
}

impl DialogDirector {
    pub(crate) fn new(ms_per_line: u64, auto_acknowledge: bool) -> Self {
        Self {
            ms_per_line,
            auto_acknowledge,
            ..Self::default()
        }
    }

    fn show(&mut self, boss_id: EntityId, lines: Vec<String>, background: String) {
        let remaining = Duration::from_millis(self.ms_per_line.saturating_mul(lines.len() as u64));
        let dialog = ShownDialog {
            boss_id,
            lines,
            background,
            remaining,
        };
        self.shown_total = self.shown_total.saturating_add(1);
        if self.current.is_none() {
            self.current = Some(dialog);
        } else {
            self.queued.push_back(dialog);
        }
    }

    /// Returns the boss whose dialog finished this step, if any.
    fn tick(&mut self, dt: Duration) -> Option<EntityId> {
        if !self.auto_acknowledge {
            return None;
        }
        let current = self.current.as_mut()?;
        current.remaining = current.remaining.saturating_sub(dt);
        if current.remaining.is_zero() {
            self.finish()
        } else {
            None
        }
    }

    fn finish(&mut self) -> Option<EntityId> {
        let finished = self.current.take()?;
        self.current = self.queued.pop_front();
        Some(finished.boss_id)
    }

    pub(crate) fn current(&self) -> Option<&ShownDialog> {
        self.current.as_ref()
    }

    pub(crate) fn is_showing(&self) -> bool {
        self.current.is_some()
    }

    pub(crate) fn shown_total(&self) -> u32 {
        self.shown_total
    }
}

/// Everything the room would hand to a renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RoomPresentation {
    pub(crate) background: Option<String>,
    pub(crate) fade: Option<BackgroundFade>,
    pub(crate) transition_text: Option<String>,
    transition_text_left: Duration,
    pub(crate) boss_phase: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoomOutcome {
    InProgress,
    Cleared,
    PlayerDefeated,
}

impl fmt::Display for RoomOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RoomOutcome::InProgress => "in_progress",
            RoomOutcome::Cleared => "cleared",
            RoomOutcome::PlayerDefeated => "player_defeated",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RoomSummary {
    pub(crate) encounter: &'static str,
    pub(crate) outcome: RoomOutcome,
    pub(crate) elapsed: Duration,
    pub(crate) reward: u32,
    pub(crate) player_health: u32,
    pub(crate) hostiles_left: usize,
    pub(crate) dialogs_shown: u32,
    pub(crate) intents: IntentApplyStats,
}
