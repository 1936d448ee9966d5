use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::math::{ArenaBounds, Vec2};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum AiState {
    #[default]
    Idle,
    Wander,
    Chase,
    Attack,
}

/// Distance rule evaluated on every AI tick. `None` means no live target.
pub fn decide_ai_state(distance: Option<f32>, vision_range: f32, attack_range: f32) -> AiState {
    match distance {
        None => AiState::Wander,
        Some(distance) if !distance.is_finite() => AiState::Wander,
        Some(distance) if distance <= attack_range => AiState::Attack,
        Some(distance) if distance <= vision_range => AiState::Chase,
        Some(_) => AiState::Wander,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WanderState {
    pub point: Option<Vec2>,
    pub since_pick: Duration,
}

impl WanderState {
    pub fn needs_repick(&self, repick_after: Duration) -> bool {
        self.point.is_none() || self.since_pick >= repick_after
    }

    pub fn pick(&mut self, rng: &mut impl Rng, bounds: ArenaBounds, margin: f32) -> Vec2 {
        let area = bounds.inset(margin);
        let point = Vec2::new(
            sample_axis(rng, area.min.x, area.max.x),
            sample_axis(rng, area.min.y, area.max.y),
        );
        self.point = Some(point);
        self.since_pick = Duration::ZERO;
        point
    }

    pub fn arrive(&mut self) {
        self.point = None;
    }

    pub fn reset(&mut self) {
        *self = WanderState::default();
    }
}

pub(crate) fn sample_axis(rng: &mut impl Rng, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AiStateCounts {
    pub idle: usize,
    pub wander: usize,
    pub chase: usize,
    pub attack: usize,
}

impl AiStateCounts {
    pub fn record(&mut self, state: AiState) {
        match state {
            AiState::Idle => self.idle = self.idle.saturating_add(1),
            AiState::Wander => self.wander = self.wander.saturating_add(1),
            AiState::Chase => self.chase = self.chase.saturating_add(1),
            AiState::Attack => self.attack = self.attack.saturating_add(1),
        }
    }

    pub fn total(&self) -> usize {
        self.idle + self.wander + self.chase + self.attack
    }
}
