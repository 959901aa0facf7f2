use core::f64;

use cga2d::Blade3;
use serde::{Deserialize, Serialize};

use crate::geom::{circle_blade, invert, line_blade, origin_line_blade, Pos};

/// Tolerance of the angle sum classification.
const ANGLE_SUM_EPSILON: f64 = 0.001;
/// Dihedral orders above this are clamped.
pub const MAX_ORDER: u32 = 100;

/// Curvature of the plane tiled by a Schwarz triangle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Geometry {
    Elliptic,
    Euclidean,
    Hyperbolic,
}

/// Geometry of the triangle with angles `π/k`, `π/m`, `π/n`.
pub fn classify(k: u32, m: u32, n: u32) -> Geometry {
    let angle_sum = 1. / k as f64 + 1. / m as f64 + 1. / n as f64;
    if angle_sum > 1. + ANGLE_SUM_EPSILON {
        Geometry::Elliptic
    } else if angle_sum > 1. - ANGLE_SUM_EPSILON {
        Geometry::Euclidean
    } else {
        Geometry::Hyperbolic
    }
}

/// Third side of the fundamental triangle, with the side it maps onto.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Mirror {
    /// Maps outside points inside.
    Elliptic { center: Pos, radius: f64 },
    /// Reflects points on the side `normal` points to.
    Euclidean { point: Pos, normal: Pos },
    /// Maps inside points outside.
    Hyperbolic { center: Pos, radius: f64 },
}
impl Mirror {
    pub fn geometry(&self) -> Geometry {
        match self {
            Mirror::Elliptic { .. } => Geometry::Elliptic,
            Mirror::Euclidean { .. } => Geometry::Euclidean,
            Mirror::Hyperbolic { .. } => Geometry::Hyperbolic,
        }
    }

    /// Image of `p` and the local magnification, if `p` is on the wrong side.
    pub fn apply(&self, p: Pos) -> Option<(Pos, f64)> {
        match *self {
            Mirror::Elliptic { center, radius } => {
                let r2 = radius * radius;
                ((p - center).length2() > r2).then(|| invert(p, center, r2))
            }
            Mirror::Hyperbolic { center, radius } => {
                let r2 = radius * radius;
                ((p - center).length2() < r2).then(|| invert(p, center, r2))
            }
            Mirror::Euclidean { point, normal } => {
                let d = (p - point).dot(normal);
                (d > 0.).then(|| (p - (2. * d) * normal, 1.))
            }
        }
    }

    /// Mirror image at the line through the origin with the given angle.
    pub fn reflect_at_line(&self, angle: f64) -> Mirror {
        match *self {
            Mirror::Elliptic { center, radius } => Mirror::Elliptic {
                center: center.reflect_at_line(angle),
                radius,
            },
            Mirror::Hyperbolic { center, radius } => Mirror::Hyperbolic {
                center: center.reflect_at_line(angle),
                radius,
            },
            Mirror::Euclidean { point, normal } => Mirror::Euclidean {
                point: point.reflect_at_line(angle),
                normal: normal.reflect_at_line(angle),
            },
        }
    }

    /// Where the mirror crosses the positive x-axis.
    fn x_axis_crossing(&self) -> f64 {
        match *self {
            Mirror::Elliptic { center, radius } => {
                center.x + (radius * radius - center.y * center.y).max(0.).sqrt()
            }
            Mirror::Hyperbolic { center, radius } => {
                center.x - (radius * radius - center.y * center.y).max(0.).sqrt()
            }
            Mirror::Euclidean { point, normal } => point.x + point.y * normal.y / normal.x,
        }
    }

    pub fn blade(&self) -> Blade3 {
        match *self {
            Mirror::Elliptic { center, radius } | Mirror::Hyperbolic { center, radius } => {
                circle_blade(center, radius)
            }
            Mirror::Euclidean { point, normal } => line_blade(point, normal),
        }
    }
}

/// Schwarz triangle between the x-axis, the line at `π/k` and a third mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct Tiling {
    pub k: u32,
    pub m: u32,
    pub n: u32,
    /// `None` if `m` or `n` give no triangle; only the dihedral group acts.
    pub mirror: Option<Mirror>,
}
impl Tiling {
    pub fn new(k: u32, m: u32, n: u32) -> Self {
        let k = k.min(MAX_ORDER);
        let mirror = (k >= 2 && m >= 2 && n >= 2).then(|| canonical_mirror(k, m, n));
        Self { k, m, n, mirror }
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.mirror.as_ref().map(Mirror::geometry)
    }

    /// Angle between the two straight mirrors.
    pub fn gamma(&self) -> f64 {
        f64::consts::PI / self.k as f64
    }

    /// Extra mirror of the rectified tiling, perpendicular to the oblique
    /// line through the point where the triangle's third side meets the x-axis.
    pub fn rectifying_mirror(&self) -> Option<Mirror> {
        let mirror = self.mirror?;
        let (sin, cos) = self.gamma().sin_cos();
        if cos.abs() < 1e-9 {
            return None;
        }
        let x0 = mirror.x_axis_crossing();
        if x0.abs() < 1e-12 {
            return None;
        }
        Some(match mirror {
            Mirror::Hyperbolic { .. } => {
                let d = (1. + x0 * x0) / (2. * x0 * cos);
                Mirror::Hyperbolic {
                    center: d * Pos::new(cos, sin),
                    radius: (d * d - 1.).max(0.).sqrt(),
                }
            }
            Mirror::Elliptic { .. } => {
                let d = (1. - x0 * x0) / (2. * x0 * cos);
                Mirror::Elliptic {
                    center: -d * Pos::new(cos, sin),
                    radius: d.hypot(1.),
                }
            }
            Mirror::Euclidean { .. } => Mirror::Euclidean {
                point: Pos::new(x0, 0.),
                normal: Pos::new(cos, sin),
            },
        })
    }

    /// Extra mirror of the uniformly truncated tiling: the third side
    /// reflected at the half-angle line.
    pub fn truncating_mirror(&self) -> Option<Mirror> {
        Some(self.mirror?.reflect_at_line(0.5 * self.gamma()))
    }

    /// The triangle's mirrors as conformal blades, straight ones first.
    pub fn mirrors(&self) -> Vec<Blade3> {
        if self.k == 0 {
            return vec![];
        }
        let mut mirrors = vec![origin_line_blade(0.), origin_line_blade(self.gamma())];
        mirrors.extend(self.mirror.map(|mirror| mirror.blade()));
        mirrors
    }
}

/// Third side for `k, m, n >= 2`: meets the x-axis at `π/n` and the oblique
/// line at `π/m`.
fn canonical_mirror(k: u32, m: u32, n: u32) -> Mirror {
    let gamma = f64::consts::PI / k as f64;
    let alpha = f64::consts::PI / n as f64;
    let beta = f64::consts::PI / m as f64;
    match classify(k, m, n) {
        Geometry::Hyperbolic => {
            // unit circle is the Poincaré disc boundary
            let cy = alpha.cos();
            let cx = cy / gamma.tan() + beta.cos() / gamma.sin();
            let factor = 1. / (cx * cx + cy * cy - 1.).sqrt();
            Mirror::Hyperbolic {
                center: factor * Pos::new(cx, cy),
                radius: factor,
            }
        }
        Geometry::Elliptic => {
            // unit circle is the projected equator; the center lies opposite
            // to the hyperbolic construction
            let cy = -alpha.cos();
            let cx = -(alpha.cos() / gamma.tan() + beta.cos() / gamma.sin());
            let factor = 1. / (1. - cx * cx - cy * cy).sqrt();
            Mirror::Elliptic {
                center: factor * Pos::new(cx, cy),
                radius: factor,
            }
        }
        Geometry::Euclidean => Mirror::Euclidean {
            point: Pos::new(0.5, 0.),
            normal: Pos::new(alpha.sin(), alpha.cos()),
        },
    }
}
