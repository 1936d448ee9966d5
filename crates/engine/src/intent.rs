use serde::Serialize;

use crate::ai::AiState;
use crate::entity::EntityId;
use crate::math::Vec2;
use crate::status::{EffectSkipReason, StatusEffectKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnRequest {
    pub archetype: String,
    pub count: u32,
}

impl SpawnRequest {
    pub fn new(archetype: impl Into<String>, count: u32) -> Self {
        Self {
            archetype: archetype.into(),
            count,
        }
    }
}

/// Requests the combat core hands to the room layer. The core never
/// fulfils these itself; they are drained after each advance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    Dying {
        entity_id: EntityId,
        summoned: bool,
    },
    PhaseChanged {
        boss_id: EntityId,
        phase: u8,
    },
    ShowDialog {
        boss_id: EntityId,
        lines: Vec<String>,
        background: String,
    },
    SpawnEnemies {
        summoner: EntityId,
        requests: Vec<SpawnRequest>,
    },
    ChangeBackground {
        path: String,
    },
    FadeBackground {
        path: String,
        duration_ms: u64,
    },
    ShowTransitionText {
        text: String,
    },
    SpawnProjectile {
        owner: EntityId,
        origin: Vec2,
        velocity: Vec2,
        damage: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    Dying,
    PhaseChanged,
    ShowDialog,
    SpawnEnemies,
    ChangeBackground,
    FadeBackground,
    ShowTransitionText,
    SpawnProjectile,
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::Dying { .. } => IntentKind::Dying,
            Self::PhaseChanged { .. } => IntentKind::PhaseChanged,
            Self::ShowDialog { .. } => IntentKind::ShowDialog,
            Self::SpawnEnemies { .. } => IntentKind::SpawnEnemies,
            Self::ChangeBackground { .. } => IntentKind::ChangeBackground,
            Self::FadeBackground { .. } => IntentKind::FadeBackground,
            Self::ShowTransitionText { .. } => IntentKind::ShowTransitionText,
            Self::SpawnProjectile { .. } => IntentKind::SpawnProjectile,
        }
    }

    /// One-line JSON form for logs and recorded traces.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Default)]
pub struct IntentQueue {
    intents: Vec<Intent>,
    emitted_total: u64,
}

impl IntentQueue {
    pub fn emit(&mut self, intent: Intent) {
        self.emitted_total = self.emitted_total.saturating_add(1);
        self.intents.push(intent);
    }

    pub fn pending(&self) -> &[Intent] {
        &self.intents
    }

    pub fn drain(&mut self) -> Vec<Intent> {
        std::mem::take(&mut self.intents)
    }

    pub fn emitted_total(&self) -> u64 {
        self.emitted_total
    }
}

/// Internal notifications, counted per tick for diagnostics and asserted on
/// by tests. `EntityDamaged` doubles as the hit-flash trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombatEvent {
    EntityDamaged {
        entity_id: EntityId,
        amount: u32,
    },
    EntityDied {
        entity_id: EntityId,
    },
    StatusApplied {
        entity_id: EntityId,
        kind: StatusEffectKind,
    },
    StatusSkipped {
        entity_id: EntityId,
        kind: StatusEffectKind,
        reason: EffectSkipReason,
    },
    StatusExpired {
        entity_id: EntityId,
        kind: StatusEffectKind,
    },
    AiStateChanged {
        entity_id: EntityId,
        from: AiState,
        to: AiState,
    },
    AttackPerformed {
        entity_id: EntityId,
        target_id: EntityId,
    },
    SkillCast {
        boss_id: EntityId,
        slot: u8,
    },
    PhaseTransitionStarted {
        boss_id: EntityId,
        from_phase: u8,
    },
    BossDefeated {
        boss_id: EntityId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatEventKind {
    EntityDamaged,
    EntityDied,
    StatusApplied,
    StatusSkipped,
    StatusExpired,
    AiStateChanged,
    AttackPerformed,
    SkillCast,
    PhaseTransitionStarted,
    BossDefeated,
}

impl CombatEvent {
    pub fn kind(self) -> CombatEventKind {
        match self {
            Self::EntityDamaged { .. } => CombatEventKind::EntityDamaged,
            Self::EntityDied { .. } => CombatEventKind::EntityDied,
            Self::StatusApplied { .. } => CombatEventKind::StatusApplied,
            Self::StatusSkipped { .. } => CombatEventKind::StatusSkipped,
            Self::StatusExpired { .. } => CombatEventKind::StatusExpired,
            Self::AiStateChanged { .. } => CombatEventKind::AiStateChanged,
            Self::AttackPerformed { .. } => CombatEventKind::AttackPerformed,
            Self::SkillCast { .. } => CombatEventKind::SkillCast,
            Self::PhaseTransitionStarted { .. } => CombatEventKind::PhaseTransitionStarted,
            Self::BossDefeated { .. } => CombatEventKind::BossDefeated,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombatEventCounts {
    pub total: u32,
    pub entity_damaged: u32,
    pub entity_died: u32,
    pub status_applied: u32,
    pub status_skipped: u32,
    pub status_expired: u32,
    pub ai_state_changed: u32,
    pub attack_performed: u32,
    pub skill_cast: u32,
    pub phase_transition_started: u32,
    pub boss_defeated: u32,
}

impl CombatEventCounts {
    fn record(&mut self, kind: CombatEventKind) {
        self.total = self.total.saturating_add(1);
        let slot = match kind {
            CombatEventKind::EntityDamaged => &mut self.entity_damaged,
            CombatEventKind::EntityDied => &mut self.entity_died,
            CombatEventKind::StatusApplied => &mut self.status_applied,
            CombatEventKind::StatusSkipped => &mut self.status_skipped,
            CombatEventKind::StatusExpired => &mut self.status_expired,
            CombatEventKind::AiStateChanged => &mut self.ai_state_changed,
            CombatEventKind::AttackPerformed => &mut self.attack_performed,
            CombatEventKind::SkillCast => &mut self.skill_cast,
            CombatEventKind::PhaseTransitionStarted => &mut self.phase_transition_started,
            CombatEventKind::BossDefeated => &mut self.boss_defeated,
        };
        *slot = slot.saturating_add(1);
    }
}

#[derive(Debug, Default)]
pub struct CombatEventBus {
    current_tick_events: Vec<CombatEvent>,
    last_tick_counts: CombatEventCounts,
}

impl CombatEventBus {
    pub fn emit(&mut self, event: CombatEvent) {
        self.current_tick_events.push(event);
    }

    pub fn iter_emitted_so_far(&self) -> impl Iterator<Item = &CombatEvent> {
        self.current_tick_events.iter()
    }

    pub fn finish_tick_rollover(&mut self) {
        let mut counts = CombatEventCounts::default();
        for event in &self.current_tick_events {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.current_tick_events.clear();
    }

    pub fn last_tick_counts(&self) -> CombatEventCounts {
        self.last_tick_counts
    }
}
