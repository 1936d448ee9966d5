use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::StatusEffectKind;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    ZeroPeriod { field: &'static str },
    #[error("{field} must be finite and >= 0 (got {value})")]
    InvalidFactor { field: &'static str, value: f32 },
    #[error("effect {kind:?}: {reason}")]
    InvalidEffect {
        kind: StatusEffectKind,
        reason: &'static str,
    },
}

/// Tuning for one status effect kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectRules {
    pub duration_ms: u64,
    /// Measured from the moment the effect was applied.
    pub cooldown_ms: u64,
    pub tick_interval_ms: u64,
    pub tick_damage: u32,
    pub speed_multiplier: f32,
    pub damage_multiplier: f32,
}

impl Default for EffectRules {
    fn default() -> Self {
        Self {
            duration_ms: 2_000,
            cooldown_ms: 4_000,
            tick_interval_ms: 0,
            tick_damage: 0,
            speed_multiplier: 1.0,
            damage_multiplier: 1.0,
        }
    }
}

impl EffectRules {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_ms > 0 && self.tick_damage > 0)
            .then(|| Duration::from_millis(self.tick_interval_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectTable {
    pub sleep: EffectRules,
    pub stun: EffectRules,
    pub poison: EffectRules,
    pub fear: EffectRules,
    pub encourage: EffectRules,
}

impl Default for EffectTable {
    fn default() -> Self {
        Self {
            sleep: EffectRules {
                duration_ms: 2_000,
                cooldown_ms: 8_000,
                ..EffectRules::default()
            },
            stun: EffectRules {
                duration_ms: 1_000,
                cooldown_ms: 4_000,
                ..EffectRules::default()
            },
            poison: EffectRules {
                duration_ms: 3_000,
                cooldown_ms: 6_000,
                tick_interval_ms: 500,
                tick_damage: 2,
                ..EffectRules::default()
            },
            fear: EffectRules {
                duration_ms: 2_500,
                cooldown_ms: 6_000,
                ..EffectRules::default()
            },
            encourage: EffectRules {
                duration_ms: 5_000,
                cooldown_ms: 5_000,
                speed_multiplier: 1.5,
                damage_multiplier: 1.5,
                ..EffectRules::default()
            },
        }
    }
}

impl EffectTable {
    pub fn rules(&self, kind: StatusEffectKind) -> &EffectRules {
        match kind {
            StatusEffectKind::Sleep => &self.sleep,
            StatusEffectKind::Stun => &self.stun,
            StatusEffectKind::Poison => &self.poison,
            StatusEffectKind::Fear => &self.fear,
            StatusEffectKind::Encourage => &self.encourage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub ai_tick_ms: u64,
    pub move_tick_ms: u64,
    pub attack_tick_ms: u64,
    pub wander_repick_ms: u64,
    pub wander_margin: f32,
    pub wander_speed_factor: f32,
    pub wander_arrival_radius: f32,
    pub contact_cooldown_ms: u64,
    pub one_shot_resume_ms: u64,
    pub rng_seed: u64,
    pub effects: EffectTable,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ai_tick_ms: 100,
            move_tick_ms: 16,
            attack_tick_ms: 50,
            wander_repick_ms: 3_000,
            wander_margin: 40.0,
            wander_speed_factor: 0.5,
            wander_arrival_radius: 6.0,
            contact_cooldown_ms: 1_000,
            one_shot_resume_ms: 1_000,
            rng_seed: 0x5eed_a11e,
            effects: EffectTable::default(),
        }
    }
}

impl SimConfig {
    pub fn ai_tick(&self) -> Duration {
        Duration::from_millis(self.ai_tick_ms)
    }

    pub fn move_tick(&self) -> Duration {
        Duration::from_millis(self.move_tick_ms)
    }

    pub fn move_tick_seconds(&self) -> f32 {
        self.move_tick().as_secs_f32()
    }

    pub fn attack_tick(&self) -> Duration {
        Duration::from_millis(self.attack_tick_ms)
    }

    pub fn wander_repick(&self) -> Duration {
        Duration::from_millis(self.wander_repick_ms)
    }

    pub fn contact_cooldown(&self) -> Duration {
        Duration::from_millis(self.contact_cooldown_ms)
    }

    pub fn one_shot_resume(&self) -> Duration {
        Duration::from_millis(self.one_shot_resume_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("ai_tick_ms", self.ai_tick_ms),
            ("move_tick_ms", self.move_tick_ms),
            ("attack_tick_ms", self.attack_tick_ms),
            ("wander_repick_ms", self.wander_repick_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroPeriod { field });
            }
        }
        for (field, value) in [
            ("wander_margin", self.wander_margin),
            ("wander_speed_factor", self.wander_speed_factor),
            ("wander_arrival_radius", self.wander_arrival_radius),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidFactor { field, value });
            }
        }
        for kind in StatusEffectKind::ALL {
            let rules = self.effects.rules(kind);
            if rules.duration_ms == 0 {
                return Err(ConfigError::InvalidEffect {
                    kind,
                    reason: "duration_ms must be greater than zero",
                });
            }
            if !rules.speed_multiplier.is_finite() || rules.speed_multiplier < 0.0 {
                return Err(ConfigError::InvalidEffect {
                    kind,
                    reason: "speed_multiplier must be finite and >= 0",
                });
            }
            if !rules.damage_multiplier.is_finite() || rules.damage_multiplier < 0.0 {
                return Err(ConfigError::InvalidEffect {
                    kind,
                    reason: "damage_multiplier must be finite and >= 0",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SimConfig::default().validate().expect("valid");
    }

    #[test]
    fn zero_tick_period_is_rejected() {
        let config = SimConfig {
            move_tick_ms: 0,
            ..SimConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPeriod {
                field: "move_tick_ms"
            })
        );
    }

    #[test]
    fn negative_wander_factor_is_rejected() {
        let config = SimConfig {
            wander_speed_factor: -1.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFactor {
                field: "wander_speed_factor",
                ..
            })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SimConfig =
            serde_json::from_str(r#"{"ai_tick_ms": 80, "effects": {"poison": {"tick_damage": 5}}}"#)
                .expect("parse");
        assert_eq!(config.ai_tick_ms, 80);
        assert_eq!(config.move_tick_ms, 16);
        assert_eq!(config.effects.poison.tick_damage, 5);
        assert_eq!(config.effects.poison.duration_ms, 2_000);
        assert_eq!(config.effects.stun.duration_ms, 1_000);
    }

    #[test]
    fn poison_has_damage_over_time_by_default() {
        let table = EffectTable::default();
        assert_eq!(
            table.rules(StatusEffectKind::Poison).tick_interval(),
            Some(Duration::from_millis(500))
        );
        assert_eq!(table.rules(StatusEffectKind::Sleep).tick_interval(), None);
    }
}
