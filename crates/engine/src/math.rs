use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_angle(radians: f32) -> Self {
        Self {
            x: radians.cos(),
            y: radians.sin(),
        }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Unit vector in the same direction, or zero for a degenerate input.
    pub fn normalize_or_zero(self) -> Vec2 {
        let length = self.length();
        if length <= f32::EPSILON || !length.is_finite() {
            return Vec2::ZERO;
        }
        Vec2 {
            x: self.x / length,
            y: self.y / length,
        }
    }

    /// Counter-clockwise perpendicular.
    pub fn perpendicular(self) -> Vec2 {
        Vec2 {
            x: -self.y,
            y: self.x,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2 {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2 {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Axis-aligned arena rectangle in world units. `min` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArenaBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl ArenaBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::new(width.max(0.0), height.max(0.0)),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    /// Shrinks every side by `margin`, collapsing to the center line when the
    /// margin exceeds half the extent.
    pub fn inset(&self, margin: f32) -> ArenaBounds {
        let margin = margin.max(0.0);
        let center = self.center();
        let half_w = (self.width() * 0.5 - margin).max(0.0);
        let half_h = (self.height() * 0.5 - margin).max(0.0);
        ArenaBounds {
            min: Vec2::new(center.x - half_w, center.y - half_h),
            max: Vec2::new(center.x + half_w, center.y + half_h),
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn clamp(&self, point: Vec2) -> Vec2 {
        Vec2 {
            x: point.x.clamp(self.min.x, self.max.x),
            y: point.y.clamp(self.min.y, self.max.y),
        }
    }

    /// Corners in clockwise screen order (y grows downward): top-left,
    /// top-right, bottom-right, bottom-left.
    pub fn perimeter_corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_or_zero_handles_degenerate_vectors() {
        assert_eq!(Vec2::ZERO.normalize_or_zero(), Vec2::ZERO);
        let unit = Vec2::new(3.0, 4.0).normalize_or_zero();
        assert!((unit.length() - 1.0).abs() < 0.0001);
        assert!((unit.x - 0.6).abs() < 0.0001);
    }

    #[test]
    fn perpendicular_is_orthogonal() {
        let v = Vec2::new(2.0, 1.0);
        let p = v.perpendicular();
        assert!((v.x * p.x + v.y * p.y).abs() < 0.0001);
    }

    #[test]
    fn inset_collapses_instead_of_inverting() {
        let bounds = ArenaBounds::new(100.0, 40.0);
        let inset = bounds.inset(30.0);
        assert!(inset.min.x <= inset.max.x);
        assert!((inset.min.y - 20.0).abs() < 0.0001);
        assert!((inset.max.y - 20.0).abs() < 0.0001);
        assert!((inset.min.x - 30.0).abs() < 0.0001);
    }

    #[test]
    fn clamp_keeps_points_inside() {
        let bounds = ArenaBounds::new(100.0, 100.0);
        let clamped = bounds.clamp(Vec2::new(-5.0, 140.0));
        assert_eq!(clamped, Vec2::new(0.0, 100.0));
        assert!(bounds.contains(clamped));
    }
}
