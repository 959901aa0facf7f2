use core::f64;
use std::fmt;

use crate::geom::Pos;

/// Result of folding a point into the first sector.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Folded {
    pub position: Pos,
    pub rotated: bool,
    /// Mirrored at the x-axis, flips parity.
    pub reflected: bool,
}
impl Folded {
    pub fn changed(&self) -> bool {
        self.rotated || self.reflected
    }
}

/// Dihedral group of order `2k` generated by the x-axis and the line at `π/k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dihedral {
    k: u32,
    /// Rotations by multiples of `2π/k`, `2k` entries.
    sines: Vec<f64>,
    cosines: Vec<f64>,
}
impl Dihedral {
    pub fn new(k: u32) -> Self {
        let k = k.max(1);
        let step = f64::consts::TAU / k as f64;
        let (sines, cosines) = (0..2 * k).map(|i| (i as f64 * step).sin_cos()).unzip();
        Self { k, sines, cosines }
    }

    pub fn order(&self) -> u32 {
        self.k
    }

    /// Rotates `p` into `|θ| <= π/k`, then mirrors it above the x-axis.
    pub fn fold(&self, p: Pos) -> Folded {
        let k = self.k as i64;
        let turns = (p.angle() * self.k as f64 / f64::consts::TAU + k as f64 + 0.5).floor() as i64;
        let mut position = p;
        let rotated = turns % k != 0;
        if rotated {
            let index = turns.rem_euclid(2 * k) as usize;
            let (sin, cos) = (self.sines[index], self.cosines[index]);
            position = Pos::new(cos * p.x + sin * p.y, -sin * p.x + cos * p.y);
        }
        let reflected = position.y < 0.;
        if reflected {
            position.y = -position.y;
        }
        Folded {
            position,
            rotated,
            reflected,
        }
    }
}
impl fmt::Display for Dihedral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dihedral order: {}", self.k)?;
        for (i, (sin, cos)) in self.sines.iter().zip(&self.cosines).enumerate() {
            writeln!(f, "R{i:_>2} {cos:>9.5} {sin:>9.5}")?;
        }
        Ok(())
    }
}
