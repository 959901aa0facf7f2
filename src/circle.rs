use core::f64;

use cga2d::Blade3;
use serde::{Deserialize, Serialize};

use crate::{
    geom::{circle_blade, Pos, POINT_TOLERANCE},
    quadratic,
};

/// Keeps inside-out inversions finite at the circle center.
const CENTER_EPSILON2: f64 = 1e-8;

/// Stable circle handle, never reused within an arrangement.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CircleId(pub u32);

/// Stable intersection handle.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntersectionId(pub u32);

/// Which side of the circle its inversion maps onto.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingDirection {
    /// Points inside are mapped outside.
    InsideOut,
    /// Points outside are mapped inside.
    #[default]
    OutsideIn,
}

/// Mirror circle of an arrangement.
#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub id: CircleId,
    pub center: Pos,
    radius: f64,
    radius2: f64,
    pub mapping: MappingDirection,
    pub(crate) intersections: Vec<IntersectionId>,
    pub color: String,
}
impl Circle {
    pub fn new(
        id: CircleId,
        center: Pos,
        radius: f64,
        mapping: MappingDirection,
        color: String,
    ) -> Self {
        Self {
            id,
            center,
            radius,
            radius2: radius * radius,
            mapping,
            intersections: vec![],
            color,
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn radius2(&self) -> f64 {
        self.radius2
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
        self.radius2 = radius * radius;
    }

    pub fn intersections(&self) -> &[IntersectionId] {
        &self.intersections
    }

    pub fn blade(&self) -> Blade3 {
        circle_blade(self.center, self.radius)
    }

    /// Whether `p` already lies on the side this circle maps onto.
    pub fn is_in_target(&self, p: Pos) -> bool {
        let d2 = (p - self.center).length2();
        match self.mapping {
            MappingDirection::OutsideIn => d2 < self.radius2,
            MappingDirection::InsideOut => d2 > self.radius2,
        }
    }

    /// Inverts `p` if it lies outside the target side.
    ///
    /// Returns the image and the local magnification `r²/d²`.
    pub fn map(&self, p: Pos) -> Option<(Pos, f64)> {
        let d = p - self.center;
        let d2 = d.length2();
        let factor = match self.mapping {
            MappingDirection::OutsideIn if d2 < self.radius2 => return None,
            MappingDirection::OutsideIn => self.radius2 / d2,
            MappingDirection::InsideOut if d2 > self.radius2 => return None,
            MappingDirection::InsideOut => self.radius2 / d2.max(CENTER_EPSILON2),
        };
        Some((self.center + factor * d, factor))
    }

    /// Moves and resizes the circle so that every constraint holds.
    ///
    /// Infeasible systems are logged and patched with a surrogate radius,
    /// degenerate ones leave the circle unchanged.
    pub fn adjust_to(&mut self, constraints: &[Constraint]) {
        match constraints {
            [] => {}
            [only] => self.adjust_to_one(only),
            [first, second] => self.adjust_to_two(first, second),
            [first, second, third, rest @ ..] => {
                if !rest.is_empty() {
                    log::warn!(
                        "circle {:?} has {} constraints, only three are used",
                        self.id,
                        constraints.len()
                    );
                }
                self.adjust_to_three(first, second, third);
            }
        }
    }

    fn adjust_to_one(&mut self, other: &Constraint) {
        let distance = other.required_distance(self.radius);
        let offset = self.center - other.center;
        let length = offset.length();
        self.center = if length < POINT_TOLERANCE {
            other.center + Pos::new(distance, 0.)
        } else {
            other.center + (distance / length) * offset
        };
    }

    fn adjust_to_two(&mut self, first: &Constraint, second: &Constraint) {
        let between = second.center - first.center;
        let separation = between.length();
        if separation < POINT_TOLERANCE {
            log::warn!(
                "circle {:?} is constrained by two circles with the same center",
                self.id
            );
            return;
        }

        let mut d1 = first.required_distance(self.radius);
        let mut d2 = second.required_distance(self.radius);
        if separation > d1 + d2 {
            // grow until the two distances just span the separation
            let r1 = first.radius * first.radius;
            let r2 = second.radius * second.radius;
            let a0 = 0.5 * (separation + (r1 - r2) / separation);
            let a1 = 0.5 * (first.coeff - second.coeff) / separation;
            let radius = match quadratic::solve(1. - a1 * a1, first.coeff - 2. * a0 * a1, r1 - a0 * a0)
            {
                Some((_, larger)) if larger > 0. => larger,
                _ => {
                    log::error!(
                        "no radius lets circle {:?} reach both constrained circles",
                        self.id
                    );
                    1.
                }
            };
            self.set_radius(radius);
            d1 = first.required_distance(radius);
            d2 = second.required_distance(radius);
        }

        let along = 0.5 * (separation + (d1 * d1 - d2 * d2) / separation);
        let foot = first.center + (along / separation) * between;
        let across = (d1 * d1 - along * along).max(0.).sqrt() / separation;
        let normal = Pos::new(between.y, -between.x);
        let candidates = [foot + across * normal, foot - across * normal];
        self.center = if candidates[0].dist(self.center) < candidates[1].dist(self.center) {
            candidates[0]
        } else {
            candidates[1]
        };
    }

    fn adjust_to_three(&mut self, first: &Constraint, second: &Constraint, third: &Constraint) {
        // differences of the circle equations are linear in the center:
        // center · (c_j - c_1) = f_j + g_j r
        let power = |c: &Constraint| 0.5 * (c.center.length2() - c.radius * c.radius);
        let u = second.center - first.center;
        let v = third.center - first.center;
        let det = u.x * v.y - u.y * v.x;
        if det.abs() < 1e-12 {
            log::warn!(
                "circle {:?} is constrained by three circles with collinear centers",
                self.id
            );
            return;
        }
        let (f2, g2) = (power(second) - power(first), 0.5 * (first.coeff - second.coeff));
        let (f3, g3) = (power(third) - power(first), 0.5 * (first.coeff - third.coeff));
        let a0 = (f2 * v.y - f3 * u.y) / det;
        let a1 = (g2 * v.y - g3 * u.y) / det;
        let b0 = (u.x * f3 - v.x * f2) / det;
        let b1 = (u.x * g3 - v.x * g2) / det;

        let (ex, ey) = (a0 - first.center.x, b0 - first.center.y);
        let a = a1 * a1 + b1 * b1 - 1.;
        let b = 2. * (a1 * ex + b1 * ey) - first.coeff;
        let c = ex * ex + ey * ey - first.radius * first.radius;
        let radius = match quadratic::solve(a, b, c) {
            None => {
                log::error!("no real radius fits the three constraints of circle {:?}", self.id);
                1.
            }
            Some((_, larger)) if larger <= 0. => {
                log::error!(
                    "only negative radii fit the three constraints of circle {:?}",
                    self.id
                );
                1.
            }
            Some((smaller, larger)) if smaller <= 0. => larger,
            Some((smaller, larger)) => {
                if (smaller - self.radius).abs() < (larger - self.radius).abs() {
                    smaller
                } else {
                    larger
                }
            }
        };
        self.set_radius(radius);
        self.center = Pos::new(a0 + a1 * radius, b0 + b1 * radius);
    }
}

/// Dihedral constraint between two circles.
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    pub id: IntersectionId,
    pub circles: [CircleId; 2],
    pub order: u32,
}
impl Intersection {
    pub fn other(&self, id: CircleId) -> CircleId {
        if self.circles[0] == id {
            self.circles[1]
        } else {
            self.circles[0]
        }
    }

    pub fn involves(&self, id: CircleId) -> bool {
        self.circles.contains(&id)
    }

    /// Center distance at which the two circles meet at `π / order`.
    pub fn required_distance(&self, a: &Circle, b: &Circle) -> f64 {
        Constraint::new(a, b.mapping, self.order).required_distance(b.radius)
    }
}

/// What one incident intersection demands of a circle being adjusted.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Constraint {
    /// Center of the other circle.
    pub center: Pos,
    /// Radius of the other circle.
    pub radius: f64,
    /// `2 r_other sign cos(π/n)`
    pub coeff: f64,
}
impl Constraint {
    /// Constraint imposed by `other` on a circle with the given mapping.
    pub fn new(other: &Circle, mapping: MappingDirection, order: u32) -> Self {
        let sign = if other.mapping == mapping { 1. } else { -1. };
        let angle = f64::consts::PI / order as f64;
        Self {
            center: other.center,
            radius: other.radius,
            coeff: 2. * other.radius * sign * angle.cos(),
        }
    }

    pub fn required_distance(&self, radius: f64) -> f64 {
        (radius * radius + self.radius * self.radius + self.coeff * radius)
            .max(0.)
            .sqrt()
    }
}
