use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, TAU};
use std::time::Duration;

use crate::math::{ArenaBounds, Vec2};

/// How an enemy closes on (or circles, or avoids) its target while chasing
/// or attacking. Parameters are owned per enemy.
#[derive(Debug, Clone, PartialEq)]
pub enum MovementStrategy {
    Direct,
    Zigzag {
        amplitude: f32,
        frequency_hz: f32,
    },
    /// `dash_speed` is in units per move tick; everything else is per second.
    Dash {
        charge: Duration,
        burst: Duration,
        cooldown: Duration,
        dash_speed: f32,
    },
    Orbit {
        radius: f32,
        /// Radians per second; negative orbits clockwise.
        angular_speed: f32,
    },
    KeepDistance {
        preferred_distance: f32,
        tolerance: f32,
    },
    Diagonal,
    EdgePatrol {
        clockwise: bool,
    },
}

impl MovementStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            MovementStrategy::Direct => "Direct",
            MovementStrategy::Zigzag { .. } => "Zigzag",
            MovementStrategy::Dash { .. } => "Dash",
            MovementStrategy::Orbit { .. } => "Orbit",
            MovementStrategy::KeepDistance { .. } => "KeepDistance",
            MovementStrategy::Diagonal => "Diagonal",
            MovementStrategy::EdgePatrol { .. } => "EdgePatrol",
        }
    }

    /// Strategies that ignore the AI state and target entirely.
    pub fn is_target_independent(&self) -> bool {
        matches!(self, MovementStrategy::EdgePatrol { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DashPhase {
    #[default]
    Ready,
    Charging {
        until: Duration,
    },
    Bursting {
        direction: Vec2,
        until: Duration,
    },
    Cooling {
        until: Duration,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MovementState {
    pub dash: DashPhase,
    zigzag_elapsed: Duration,
    orbit_angle: Option<f32>,
    patrol_corner: Option<usize>,
}

impl MovementState {
    pub fn reset(&mut self) {
        *self = MovementState::default();
    }

    pub fn is_dash_charging(&self) -> bool {
        matches!(self.dash, DashPhase::Charging { .. })
    }
}

/// Inputs for one move tick.
#[derive(Debug, Clone, Copy)]
pub struct MoveContext {
    pub position: Vec2,
    pub target: Option<Vec2>,
    /// Units per second, status multipliers already applied.
    pub speed: f32,
    pub dt: Duration,
    /// Owning entity's clock at the time of the tick.
    pub now: Duration,
    /// Area the entity's center may occupy.
    pub bounds: ArenaBounds,
}

impl MoveContext {
    fn max_step(&self) -> f32 {
        (self.speed * self.dt.as_secs_f32()).max(0.0)
    }
}

/// Displacement for one move tick.
pub fn step_movement(
    strategy: &MovementStrategy,
    state: &mut MovementState,
    ctx: &MoveContext,
) -> Vec2 {
    match strategy {
        MovementStrategy::Direct => direct_step(ctx),
        MovementStrategy::Zigzag {
            amplitude,
            frequency_hz,
        } => zigzag_step(*amplitude, *frequency_hz, state, ctx),
        MovementStrategy::Dash {
            charge,
            burst,
            cooldown,
            dash_speed,
        } => dash_step(*charge, *burst, *cooldown, *dash_speed, state, ctx),
        MovementStrategy::Orbit {
            radius,
            angular_speed,
        } => orbit_step(*radius, *angular_speed, state, ctx),
        MovementStrategy::KeepDistance {
            preferred_distance,
            tolerance,
        } => keep_distance_step(*preferred_distance, *tolerance, ctx),
        MovementStrategy::Diagonal => diagonal_step(ctx),
        MovementStrategy::EdgePatrol { clockwise } => edge_patrol_step(*clockwise, state, ctx),
    }
}

fn direct_step(ctx: &MoveContext) -> Vec2 {
    let Some(target) = ctx.target else {
        return Vec2::ZERO;
    };
    let (delta, _) = step_toward(ctx.position, target, ctx.max_step(), 0.0);
    delta
}

fn zigzag_step(amplitude: f32, frequency_hz: f32, state: &mut MovementState, ctx: &MoveContext) -> Vec2 {
    let Some(target) = ctx.target else {
        return Vec2::ZERO;
    };
    let forward = (target - ctx.position).normalize_or_zero();
    if forward == Vec2::ZERO {
        return Vec2::ZERO;
    }
    let before = lateral_offset(amplitude, frequency_hz, state.zigzag_elapsed);
    state.zigzag_elapsed += ctx.dt;
    let after = lateral_offset(amplitude, frequency_hz, state.zigzag_elapsed);
    forward * ctx.max_step() + forward.perpendicular() * (after - before)
}

fn lateral_offset(amplitude: f32, frequency_hz: f32, elapsed: Duration) -> f32 {
    amplitude * (TAU * frequency_hz * elapsed.as_secs_f32()).sin()
}

fn dash_step(
    charge: Duration,
    burst: Duration,
    cooldown: Duration,
    dash_speed: f32,
    state: &mut MovementState,
    ctx: &MoveContext,
) -> Vec2 {
    match state.dash {
        DashPhase::Ready => {
            if ctx.target.is_none() {
                return Vec2::ZERO;
            }
            state.dash = DashPhase::Charging {
                until: ctx.now + charge,
            };
            Vec2::ZERO
        }
        DashPhase::Charging { until } => {
            if ctx.now < until {
                return Vec2::ZERO;
            }
            let Some(target) = ctx.target else {
                state.dash = DashPhase::Ready;
                return Vec2::ZERO;
            };
            let direction = (target - ctx.position).normalize_or_zero();
            state.dash = DashPhase::Bursting {
                direction,
                until: ctx.now + burst,
            };
            direction * dash_speed
        }
        DashPhase::Bursting { direction, until } => {
            if ctx.now < until {
                return direction * dash_speed;
            }
            state.dash = DashPhase::Cooling {
                until: ctx.now + cooldown,
            };
            direct_step(ctx)
        }
        DashPhase::Cooling { until } => {
            if ctx.now >= until {
                state.dash = DashPhase::Ready;
            }
            direct_step(ctx)
        }
    }
}

fn orbit_step(radius: f32, angular_speed: f32, state: &mut MovementState, ctx: &MoveContext) -> Vec2 {
    let Some(anchor) = ctx.target else {
        return Vec2::ZERO;
    };
    let angle = state
        .orbit_angle
        .unwrap_or_else(|| (ctx.position - anchor).angle());
    let next_angle = (angle + angular_speed * ctx.dt.as_secs_f32()).rem_euclid(TAU);
    state.orbit_angle = Some(next_angle);
    let desired = anchor + Vec2::from_angle(next_angle) * radius;
    // The orbit point moves faster than walking speed on wide circles.
    let orbit_step_len = radius * angular_speed.abs() * ctx.dt.as_secs_f32();
    let (delta, _) = step_toward(ctx.position, desired, ctx.max_step().max(orbit_step_len), 0.0);
    delta
}

fn keep_distance_step(preferred_distance: f32, tolerance: f32, ctx: &MoveContext) -> Vec2 {
    let Some(target) = ctx.target else {
        return Vec2::ZERO;
    };
    let offset = target - ctx.position;
    let distance = offset.length();
    let forward = offset.normalize_or_zero();
    let tolerance = tolerance.max(0.0);
    if distance < preferred_distance - tolerance {
        let shortfall = preferred_distance - distance;
        -forward * ctx.max_step().min(shortfall)
    } else if distance > preferred_distance + tolerance {
        let excess = distance - preferred_distance;
        forward * ctx.max_step().min(excess)
    } else {
        Vec2::ZERO
    }
}

fn diagonal_step(ctx: &MoveContext) -> Vec2 {
    let Some(target) = ctx.target else {
        return Vec2::ZERO;
    };
    let offset = target - ctx.position;
    let step = ctx.max_step();
    // Once lined up on an axis a diagonal would only jitter around it.
    if offset.x.abs().min(offset.y.abs()) < step {
        return direct_step(ctx);
    }
    let snapped = (offset.angle() / FRAC_PI_2).floor() * FRAC_PI_2 + FRAC_PI_4;
    Vec2::from_angle(snapped) * step
}

fn edge_patrol_step(clockwise: bool, state: &mut MovementState, ctx: &MoveContext) -> Vec2 {
    let corners = ctx.bounds.perimeter_corners();
    let mut corner = match state.patrol_corner {
        Some(corner) => corner,
        None => nearest_corner(&corners, ctx.position),
    };
    let mut position = ctx.position;
    let mut budget = ctx.max_step();
    // At most one full lap per tick, even for absurd speeds.
    for _ in 0..corners.len() {
        let (delta, arrived) = step_toward(position, corners[corner], budget, 0.0);
        position += delta;
        if !arrived {
            break;
        }
        budget -= delta.length();
        corner = if clockwise {
            (corner + 1) % corners.len()
        } else {
            (corner + corners.len() - 1) % corners.len()
        };
        if budget <= f32::EPSILON {
            break;
        }
    }
    state.patrol_corner = Some(corner);
    position - ctx.position
}

fn nearest_corner(corners: &[Vec2; 4], position: Vec2) -> usize {
    let mut best = 0;
    let mut best_distance = f32::MAX;
    for (index, corner) in corners.iter().enumerate() {
        let distance = corner.distance(position);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// Wander movement: reduced speed toward a picked point. Returns the
/// displacement and whether the point was reached.
pub fn wander_step(
    position: Vec2,
    point: Vec2,
    speed: f32,
    dt: Duration,
    arrival_radius: f32,
) -> (Vec2, bool) {
    step_toward(position, point, speed * dt.as_secs_f32(), arrival_radius)
}

/// Fear overrides the strategy: straight away from the threat.
pub fn flee_step(position: Vec2, threat: Vec2, speed: f32, dt: Duration) -> Vec2 {
    let away = (position - threat).normalize_or_zero();
    away * (speed * dt.as_secs_f32())
}

fn step_toward(current: Vec2, target: Vec2, max_step: f32, arrival_threshold: f32) -> (Vec2, bool) {
    let offset = target - current;
    let distance = offset.length();
    if distance <= arrival_threshold {
        return (Vec2::ZERO, true);
    }
    if max_step >= distance {
        return (offset, true);
    }
    (offset.normalize_or_zero() * max_step, false)
}
