use core::f64;
use std::ops::{Add, Mul, Neg, Sub};

use cga2d::prelude::*;
use serde::{Deserialize, Serialize};

/// Corners closer than this are the same point.
pub const POINT_TOLERANCE: f64 = 1e-6;

/// Point or vector in the plane.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pos {
    pub x: f64,
    pub y: f64,
}
impl Pos {
    pub const ZERO: Pos = Pos { x: 0., y: 0. };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector at the given angle.
    pub fn polar(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { x: cos, y: sin }
    }

    pub fn length2(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dist(self, other: Pos) -> f64 {
        (self - other).length()
    }

    pub fn dot(self, other: Pos) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Polar angle in (-π, π].
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Mirror image at the line through the origin with the given angle.
    pub fn reflect_at_line(self, angle: f64) -> Self {
        let (sin, cos) = (2. * angle).sin_cos();
        Self {
            x: cos * self.x + sin * self.y,
            y: sin * self.x - cos * self.y,
        }
    }

    pub fn point(self) -> Blade1 {
        cga2d::point(self.x, self.y)
    }
}
impl Add for Pos {
    type Output = Pos;

    fn add(self, rhs: Pos) -> Pos {
        Pos::new(self.x + rhs.x, self.y + rhs.y)
    }
}
impl Sub for Pos {
    type Output = Pos;

    fn sub(self, rhs: Pos) -> Pos {
        Pos::new(self.x - rhs.x, self.y - rhs.y)
    }
}
impl Mul<Pos> for f64 {
    type Output = Pos;

    fn mul(self, rhs: Pos) -> Pos {
        Pos::new(self * rhs.x, self * rhs.y)
    }
}
impl Neg for Pos {
    type Output = Pos;

    fn neg(self) -> Pos {
        Pos::new(-self.x, -self.y)
    }
}
impl From<(f64, f64)> for Pos {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Angle reduced to [0, 2π).
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(f64::consts::TAU);
    // rem_euclid may round up to exactly TAU
    if a >= f64::consts::TAU {
        0.
    } else {
        a
    }
}

/// Inversion at a circle, together with the local magnification `r²/d²`.
pub fn invert(p: Pos, center: Pos, radius2: f64) -> (Pos, f64) {
    let d = p - center;
    let factor = radius2 / d.length2();
    (center + factor * d, factor)
}

/// Circle as a conformal blade, for drawing and exact incidence.
pub fn circle_blade(center: Pos, radius: f64) -> Blade3 {
    cga2d::circle(center.point(), radius)
}

/// Line through `point` with the given normal, as a conformal blade.
pub fn line_blade(point: Pos, normal: Pos) -> Blade3 {
    let direction = Pos::new(-normal.y, normal.x);
    point.point() ^ (point + direction).point() ^ NI
}

/// Line through the origin at the given angle.
pub fn origin_line_blade(angle: f64) -> Blade3 {
    NO ^ Pos::polar(angle).point() ^ NI
}

/// Intersection points of two circles: none, one (tangency) or two.
///
/// Tangency is decided with `POINT_TOLERANCE`; proper crossings come from the
/// meet of the two circles.
pub fn circle_intersections(c1: Pos, r1: f64, c2: Pos, r2: f64) -> Vec<Pos> {
    let d = c1.dist(c2);
    if d < POINT_TOLERANCE {
        // concentric: no isolated points
        return vec![];
    }
    let outer = r1 + r2;
    let inner = (r1 - r2).abs();
    if d > outer + POINT_TOLERANCE || d < inner - POINT_TOLERANCE {
        return vec![];
    }
    if (d - outer).abs() <= POINT_TOLERANCE || (d - inner).abs() <= POINT_TOLERANCE {
        // touching point lies on the line of centers
        let t = (d * d + r1 * r1 - r2 * r2) / (2. * d * d);
        return vec![c1 + t * (c2 - c1)];
    }

    let pp = circle_blade(c1, r1) & circle_blade(c2, r2);
    match pp.unpack_point_pair() {
        Some([a, b]) => vec![a.unpack_point().into(), b.unpack_point().into()],
        None => {
            log::warn!("circles at {c1:?} and {c2:?} should cross but their meet is imaginary");
            vec![]
        }
    }
}
