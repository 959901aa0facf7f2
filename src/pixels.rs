//! One mapping pass over borrowed pixel buffers.

use std::{collections::BTreeMap, fmt};

use crate::geom::Pos;

/// Structure flag of pixels that did not reach the fundamental region.
pub const INVALID: u8 = 128;
/// Largest region id that fits the structure byte.
pub const MAX_REGION: u8 = 63;

/// Packs parity into bit 0 and the region into bits 1 to 6.
pub fn encode_structure(region: u8, parity: bool, valid: bool) -> u8 {
    let mut structure = (region.min(MAX_REGION) << 1) | parity as u8;
    if !valid {
        structure |= INVALID;
    }
    structure
}

/// Region, parity and validity of a structure byte.
pub fn decode_structure(structure: u8) -> (u8, bool, bool) {
    (
        (structure >> 1) & MAX_REGION,
        structure & 1 == 1,
        structure < INVALID,
    )
}

/// Where a point ended up after reduction.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReducedPoint {
    pub position: Pos,
    pub region: u8,
    pub parity: bool,
    pub iterations: u32,
    pub converged: bool,
    /// Local magnification of the map, scales the sampling footprint.
    pub scale: f64,
}
impl ReducedPoint {
    /// Unmapped start of a reduction.
    pub fn start(position: Pos, parity: bool) -> Self {
        Self {
            position,
            region: 0,
            parity,
            iterations: 0,
            converged: true,
            scale: 1.,
        }
    }

    /// Records one reflection or inversion.
    pub fn reflect(&mut self, position: Pos, factor: f64) {
        self.position = position;
        self.parity = !self.parity;
        self.scale *= factor;
    }

    pub fn structure(&self) -> u8 {
        encode_structure(self.region, self.parity, self.converged)
    }
}

/// Maps plane points to their representative in a fundamental region.
pub trait PointMap {
    fn map_point(&self, p: Pos, parity: bool) -> ReducedPoint;
}

/// Parallel flat buffers of one image, borrowed for a pass.
#[derive(Debug)]
pub struct PixelBuffers<'a> {
    pub x: &'a mut [f64],
    pub y: &'a mut [f64],
    pub structure: &'a mut [u8],
    pub scale: Option<&'a mut [f64]>,
}
impl<'a> PixelBuffers<'a> {
    pub fn new(x: &'a mut [f64], y: &'a mut [f64], structure: &'a mut [u8]) -> Self {
        if x.len() != y.len() || x.len() != structure.len() {
            log::warn!(
                "pixel buffers differ in length ({}, {}, {}), the shortest wins",
                x.len(),
                y.len(),
                structure.len()
            );
        }
        Self {
            x,
            y,
            structure,
            scale: None,
        }
    }

    pub fn with_scale(mut self, scale: &'a mut [f64]) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn len(&self) -> usize {
        self.x.len().min(self.y.len()).min(self.structure.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills a `width` wide grid of pixel centers spanning `±half_extent`
    /// along the shorter side, clearing the structure.
    ///
    /// Pixels past the last full row are blocked.
    pub fn fill_grid(&mut self, width: usize, half_extent: f64) {
        let len = self.len();
        if width == 0 || len == 0 {
            return;
        }
        let height = len / width;
        let pixel = 2. * half_extent / width.min(height.max(1)) as f64;
        let origin = Pos::new(
            -0.5 * pixel * (width as f64 - 1.),
            -0.5 * pixel * (height as f64 - 1.),
        );
        let grid = width * height;
        for i in 0..grid {
            self.x[i] = origin.x + pixel * (i % width) as f64;
            self.y[i] = origin.y + pixel * (i / width) as f64;
            self.structure[i] = 0;
        }
        if grid < len {
            log::warn!("{} pixels do not fill a row of {width}, blocked", len - grid);
            self.structure[grid..len].fill(INVALID);
        }
        if let Some(scale) = self.scale.as_deref_mut() {
            scale.fill(1.);
        }
    }
}

/// Outcome of a pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub pixels: usize,
    /// Invalid on entry, left untouched.
    pub blocked: usize,
    pub invalid: usize,
    pub iterations: u64,
    pub max_iterations: u32,
    /// Valid pixels per region id.
    pub regions: BTreeMap<u8, usize>,
}
impl PassStats {
    pub fn valid(&self) -> usize {
        self.pixels - self.blocked - self.invalid
    }
}
impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pixels: {}", self.pixels)?;
        writeln!(f, "Valid: {}", self.valid())?;
        writeln!(f, "Invalid: {}", self.invalid)?;
        writeln!(f, "Blocked: {}", self.blocked)?;
        let mapped = self.pixels - self.blocked;
        if mapped > 0 {
            writeln!(
                f,
                "Iterations: {:.2} mean, {} max",
                self.iterations as f64 / mapped as f64,
                self.max_iterations
            )?;
        }
        for (region, count) in &self.regions {
            writeln!(f, "Region {region:>2}: {count}")?;
        }
        Ok(())
    }
}

/// Maps every pixel that is valid on entry, in place.
pub fn run_pass(map: &impl PointMap, buffers: &mut PixelBuffers) -> PassStats {
    let mut stats = PassStats::default();
    for i in 0..buffers.len() {
        stats.pixels += 1;
        let structure = buffers.structure[i];
        if structure >= INVALID {
            stats.blocked += 1;
            continue;
        }
        let p = Pos::new(buffers.x[i], buffers.y[i]);
        let reduced = map.map_point(p, structure & 1 == 1);
        buffers.x[i] = reduced.position.x;
        buffers.y[i] = reduced.position.y;
        buffers.structure[i] = reduced.structure();
        if let Some(scale) = buffers.scale.as_deref_mut() {
            scale[i] *= reduced.scale;
        }

        stats.iterations += reduced.iterations as u64;
        stats.max_iterations = stats.max_iterations.max(reduced.iterations);
        if reduced.converged {
            *stats.regions.entry(reduced.region.min(MAX_REGION)).or_default() += 1;
        } else {
            stats.invalid += 1;
        }
    }
    log::debug!(
        "pass over {} pixels: {} invalid, {} blocked",
        stats.pixels,
        stats.invalid,
        stats.blocked
    );
    stats
}

/// Source of colors for reduced points.
pub trait ImageSampler {
    type Color;

    /// Color around `p`, averaged over a footprint of `size`.
    fn sample(&self, p: Pos, size: f64) -> Self::Color;
}

/// Samples every valid pixel, `None` for invalid ones.
pub fn sample_pass<S: ImageSampler>(
    sampler: &S,
    buffers: &PixelBuffers,
    pixel_size: f64,
) -> Vec<Option<S::Color>> {
    (0..buffers.len())
        .map(|i| {
            if buffers.structure[i] >= INVALID {
                return None;
            }
            let scale = buffers.scale.as_deref().map_or(1., |scale| scale[i]);
            Some(sampler.sample(
                Pos::new(buffers.x[i], buffers.y[i]),
                pixel_size * scale,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Folds everything into the right half plane.
    struct HalfPlane;
    impl PointMap for HalfPlane {
        fn map_point(&self, p: Pos, parity: bool) -> ReducedPoint {
            let mut reduced = ReducedPoint::start(p, parity);
            if p.x < 0. {
                reduced.reflect(Pos::new(-p.x, p.y), 2.);
                reduced.iterations = 1;
            }
            if p.y > 10. {
                reduced.converged = false;
            }
            reduced.region = (p.y > 0.) as u8;
            reduced
        }
    }

    struct Checkerboard;
    impl ImageSampler for Checkerboard {
        type Color = (bool, f64);

        fn sample(&self, p: Pos, size: f64) -> (bool, f64) {
            ((p.x.floor() + p.y.floor()) as i64 % 2 == 0, size)
        }
    }

    #[test]
    fn structure_byte_layout() {
        assert_eq!(encode_structure(0, false, true), 0);
        assert_eq!(encode_structure(3, true, true), 7);
        assert_eq!(encode_structure(3, true, false), 135);
        assert_eq!(encode_structure(200, false, true), MAX_REGION << 1);
        assert_eq!(decode_structure(135), (3, true, false));
        assert_eq!(decode_structure(6), (3, false, true));
    }

    #[test]
    fn pass_maps_and_blocks() {
        let mut x = [-1., 2., 3., -4.];
        let mut y = [1., -1., 20., 1.];
        let mut structure = [0, 1, 0, INVALID];
        let mut scale = [1.; 4];
        let mut buffers =
            PixelBuffers::new(&mut x, &mut y, &mut structure).with_scale(&mut scale);
        let stats = run_pass(&HalfPlane, &mut buffers);

        assert_eq!(stats.pixels, 4);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.valid(), 2);
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.regions.get(&1), Some(&1));
        assert_eq!(stats.regions.get(&0), Some(&1));

        assert_eq!(x, [1., 2., 3., -4.]);
        // reflected once: parity set, region 1
        assert_eq!(structure[0], 3);
        // parity kept from the input
        assert_eq!(structure[1], 1);
        assert!(structure[2] >= INVALID);
        assert_eq!(structure[3], INVALID);
        assert_eq!(scale, [2., 1., 1., 1.]);
    }

    #[test]
    fn sampling_skips_invalid_pixels() {
        let mut x = [0.5, 1.5];
        let mut y = [0.5, 0.5];
        let mut structure = [0, INVALID];
        let mut scale = [3., 1.];
        let buffers = PixelBuffers::new(&mut x, &mut y, &mut structure).with_scale(&mut scale);
        let colors = sample_pass(&Checkerboard, &buffers, 0.1);
        assert_eq!(colors.len(), 2);
        let (even, size) = colors[0].unwrap();
        assert!(even);
        assert!((size - 0.3).abs() < 1e-12);
        assert_eq!(colors[1], None);
    }

    #[test]
    fn grid_is_centered() {
        let mut x = [0.; 6];
        let mut y = [0.; 6];
        let mut structure = [INVALID; 6];
        let mut buffers = PixelBuffers::new(&mut x, &mut y, &mut structure);
        buffers.fill_grid(3, 1.);
        assert_eq!(buffers.len(), 6);
        assert!(structure.iter().all(|&s| s == 0));
        assert!((x[0] + x[2]).abs() < 1e-12);
        assert!((y[0] + y[5]).abs() < 1e-12);
        // two rows span the shorter side
        assert!((y[5] - y[0] - 1.).abs() < 1e-12);
    }

    #[test_log::test]
    fn partial_row_is_blocked() {
        let mut x = [0.; 7];
        let mut y = [0.; 7];
        let mut structure = [0; 7];
        let mut buffers = PixelBuffers::new(&mut x, &mut y, &mut structure);
        buffers.fill_grid(3, 1.);
        let stats = run_pass(&HalfPlane, &mut buffers);
        assert_eq!(stats.blocked, 1);
        assert_eq!(structure[6], INVALID);
        assert!(structure[..6].iter().all(|&s| s < INVALID));
        // the full rows stay centered
        assert!((y[0] + y[5]).abs() < 1e-12);
    }
}
