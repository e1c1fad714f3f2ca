//! 2D vector math for positions, velocities and directions.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// Magnitudes below this are treated as zero.
pub const EPSILON: f32 = 1e-6;

/// 2D vector in meters (positions) or meters per second (velocities).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn magnitude_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    pub fn magnitude(self) -> f32 {
        self.magnitude_squared().sqrt()
    }

    #[inline]
    pub fn distance_squared(self, other: Self) -> f32 {
        (other - self).magnitude_squared()
    }

    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector in the same direction, or ZERO for near-zero input.
    #[inline]
    pub fn normalize(self) -> Self {
        let mag = self.magnitude();
        if mag < EPSILON {
            return Self::ZERO;
        }
        Self::new(self.x / mag, self.y / mag)
    }

    /// Normalizes only vectors longer than one; shorter inputs keep their
    /// magnitude so analog sticks can express partial speed.
    #[inline]
    pub fn clamped_norm(self) -> Self {
        if self.magnitude_squared() > 1.0 {
            self.normalize()
        } else {
            self
        }
    }

    /// Linear interpolation; t = 0 keeps self, t = 1 lands on other.
    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    /// Reflects the vector about a unit normal, scaling the result by the
    /// restitution factor (1.0 keeps the full magnitude).
    #[inline]
    pub fn reflect(self, normal: Self, restitution: f32) -> Self {
        let d = self.dot(normal);
        (self - normal * (2.0 * d)) * restitution
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn add_sub_scale() {
        let a = Vec2::new(3.0, 4.0);
        let b = Vec2::new(1.0, 2.0);
        assert_eq!(a + b, Vec2::new(4.0, 6.0));
        assert_eq!(a - b, Vec2::new(2.0, 2.0));
        assert_eq!(a * 2.0, Vec2::new(6.0, 8.0));
    }

    #[test]
    fn magnitude_of_345_triangle() {
        let v = Vec2::new(3.0, 4.0);
        assert_approx_eq!(v.magnitude(), 5.0);
        assert_approx_eq!(v.magnitude_squared(), 25.0);
    }

    #[test]
    fn normalize_zero_is_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
        assert_eq!(Vec2::new(1e-9, -1e-9).normalize(), Vec2::ZERO);
    }

    #[test]
    fn normalize_unit_length() {
        let n = Vec2::new(3.0, 4.0).normalize();
        assert_approx_eq!(n.magnitude(), 1.0);
        assert_approx_eq!(n.x, 0.6);
        assert_approx_eq!(n.y, 0.8);
    }

    #[test]
    fn clamped_norm_keeps_short_inputs() {
        let short = Vec2::new(0.3, 0.4);
        assert_eq!(short.clamped_norm(), short);
        let long = Vec2::new(3.0, 4.0).clamped_norm();
        assert_approx_eq!(long.magnitude(), 1.0);
    }

    #[test]
    fn reflect_off_vertical_wall() {
        let v = Vec2::new(2.0, 1.0);
        let r = v.reflect(Vec2::new(-1.0, 0.0), 1.0);
        assert_approx_eq!(r.x, -2.0);
        assert_approx_eq!(r.y, 1.0);

        let damped = v.reflect(Vec2::new(-1.0, 0.0), 0.8);
        assert_approx_eq!(damped.x, -1.6);
        assert_approx_eq!(damped.y, 0.8);
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, -4.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        let mid = a.lerp(b, 0.5);
        assert_approx_eq!(mid.x, 5.0);
        assert_approx_eq!(mid.y, -2.0);
    }
}
