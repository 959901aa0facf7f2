use serde::{Deserialize, Serialize};

use crate::{
    geom::Pos,
    group::Dihedral,
    pixels::{PointMap, ReducedPoint},
    tiling::{Geometry, Mirror, Tiling},
};

/// Default iteration budget per point.
pub const MAX_ITERATIONS: u32 = 1000;

/// Semiregular tilings built on top of the triangle tiling.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    #[default]
    Regular,
    /// Adds the mirror perpendicular to the oblique line.
    Rectified,
    /// Adds the reflected third side and folds at the half-angle line.
    UniformTruncated,
}

/// Triangle kaleidoscope: reduces points to the Schwarz triangle between the
/// x-axis, the line at `π/k` and the canonical mirror.
#[derive(Debug, Clone)]
pub struct Kaleidoscope {
    tiling: Tiling,
    /// `None` for `k == 0`, the identity.
    dihedral: Option<Dihedral>,
    variant: Variant,
    secondary: Option<Mirror>,
    pub max_iterations: u32,
    /// Converged points needing no more iterations than this are invalid.
    pub min_iterations: u32,
}
impl Kaleidoscope {
    pub fn new(k: u32, m: u32, n: u32) -> Self {
        let mut kaleidoscope = Self {
            tiling: Tiling::new(k, m, n),
            dihedral: None,
            variant: Variant::Regular,
            secondary: None,
            max_iterations: MAX_ITERATIONS,
            min_iterations: 0,
        };
        kaleidoscope.set_triangle(k, m, n);
        kaleidoscope
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.set_variant(variant);
        self
    }

    pub fn tiling(&self) -> &Tiling {
        &self.tiling
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Rebuilds the mirror data and the rotation table.
    pub fn set_triangle(&mut self, k: u32, m: u32, n: u32) {
        self.tiling = Tiling::new(k, m, n);
        self.dihedral = (self.tiling.k > 0).then(|| Dihedral::new(self.tiling.k));
        self.update_secondary();
        log::debug!(
            "triangle ({}, {}, {}) is {:?}",
            self.tiling.k,
            m,
            n,
            self.tiling.geometry()
        );
    }

    pub fn set_variant(&mut self, variant: Variant) {
        self.variant = variant;
        self.update_secondary();
    }

    fn update_secondary(&mut self) {
        self.secondary = match self.variant {
            Variant::Regular => None,
            Variant::Rectified => self.tiling.rectifying_mirror(),
            Variant::UniformTruncated => self.tiling.truncating_mirror(),
        };
        if self.variant != Variant::Regular && self.secondary.is_none() {
            log::warn!(
                "{:?} variant has no extra mirror for ({}, {}, {})",
                self.variant,
                self.tiling.k,
                self.tiling.m,
                self.tiling.n
            );
        }
    }

    /// Reduces `p` to the fundamental triangle.
    pub fn reduce(&self, p: Pos, parity: bool) -> ReducedPoint {
        let mut reduced = ReducedPoint::start(p, parity);
        let Some(dihedral) = &self.dihedral else {
            return reduced;
        };
        let hyperbolic = self.tiling.geometry() == Some(Geometry::Hyperbolic);
        if hyperbolic && p.length2() >= 1. {
            reduced.converged = false;
            return reduced;
        }

        fold(dihedral, &mut reduced);
        let Some(mirror) = &self.tiling.mirror else {
            return reduced;
        };

        reduced.converged = false;
        while reduced.iterations < self.max_iterations {
            reduced.iterations += 1;
            let mirrored = mirror.apply(reduced.position);
            if let Some((q, factor)) = mirrored {
                reduced.reflect(q, factor);
            }
            fold(dihedral, &mut reduced);
            // once the mirror has nothing to do the point is in the triangle
            if mirrored.is_none() {
                reduced.converged = true;
                break;
            }
        }

        if reduced.iterations <= self.min_iterations
            || (hyperbolic && reduced.position.length2() >= 1.)
        {
            reduced.converged = false;
        }
        if reduced.converged {
            self.apply_variant(&mut reduced);
        }
        reduced
    }

    /// One pass of the extra mirrors, never iterated.
    fn apply_variant(&self, reduced: &mut ReducedPoint) {
        let Some(secondary) = &self.secondary else {
            return;
        };
        if let Some((q, factor)) = secondary.apply(reduced.position) {
            reduced.reflect(q, factor);
            reduced.region = 1;
        }
        if self.variant == Variant::UniformTruncated {
            let half = 0.5 * self.tiling.gamma();
            let (sin, cos) = half.sin_cos();
            let p = reduced.position;
            if p.y * cos - p.x * sin > 0. {
                reduced.reflect(p.reflect_at_line(half), 1.);
            }
        }
    }
}
impl PointMap for Kaleidoscope {
    fn map_point(&self, p: Pos, parity: bool) -> ReducedPoint {
        self.reduce(p, parity)
    }
}

fn fold(dihedral: &Dihedral, reduced: &mut ReducedPoint) {
    let folded = dihedral.fold(reduced.position);
    reduced.position = folded.position;
    if folded.reflected {
        reduced.parity = !reduced.parity;
    }
}
