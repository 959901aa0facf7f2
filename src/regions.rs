//! Planar subdivision of a circle arrangement into corners, arcs and faces.
//!
//! Only bounded faces become polygons; the unbounded complement is left
//! implicit so callers can number it `polygons().len()`.

use core::f64;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::{
    circle::{Circle, CircleId},
    geom::{circle_intersections, normalize_angle, Pos, POINT_TOLERANCE},
};

/// Outgoing angles closer than this are tangent to each other.
const ANGLE_TOLERANCE: f64 = 1e-9;
/// Allowed error of the angle sum check, in radians.
const ANGLE_SUM_TOLERANCE: f64 = 0.01;

/// Point where two or more circles meet.
#[derive(Debug, Clone, PartialEq)]
pub struct Corner {
    pub position: Pos,
    pub circles: Vec<CircleId>,
    /// Incident line ends, counter-clockwise by outgoing angle.
    ends: Vec<LineEnd>,
}
impl Corner {
    fn new(position: Pos) -> Self {
        Self {
            position,
            circles: vec![],
            ends: vec![],
        }
    }

    /// Number of lines leaving this corner.
    pub fn degree(&self) -> usize {
        self.ends.len()
    }
}

/// A line leaving a corner.
#[derive(Debug, Copy, Clone, PartialEq)]
struct LineEnd {
    line: usize,
    /// Leaves along the counter-clockwise direction of its circle.
    forward: bool,
    angle: f64,
    /// Signed, positive when turning left.
    curvature: f64,
}

/// Counter-clockwise arc of one circle between two consecutive corners.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub circle: CircleId,
    pub center: Pos,
    pub radius: f64,
    pub start: usize,
    pub end: usize,
    /// Polar angle of the start corner around `center`.
    pub start_angle: f64,
    /// Counter-clockwise sweep to the end corner, in (0, 2π).
    pub sweep: f64,
    done_forward: bool,
    done_backward: bool,
}
impl Line {
    /// Outgoing tangent angle leaving the start corner.
    pub fn start_tangent(&self) -> f64 {
        normalize_angle(self.start_angle + FRAC_PI_2)
    }

    /// Outgoing tangent angle leaving the end corner backwards.
    pub fn end_tangent(&self) -> f64 {
        normalize_angle(self.start_angle + self.sweep - FRAC_PI_2)
    }

    fn done(&self, forward: bool) -> bool {
        if forward {
            self.done_forward
        } else {
            self.done_backward
        }
    }

    fn set_done(&mut self, forward: bool) {
        if forward {
            self.done_forward = true;
        } else {
            self.done_backward = true;
        }
    }

    fn arc(&self, forward: bool) -> Arc {
        if forward {
            Arc {
                center: self.center,
                radius: self.radius,
                start_angle: self.start_angle,
                sweep: self.sweep,
            }
        } else {
            Arc {
                center: self.center,
                radius: self.radius,
                start_angle: normalize_angle(self.start_angle + self.sweep),
                sweep: -self.sweep,
            }
        }
    }
}

/// Boundary piece of a polygon, traversed with the polygon on its left.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Arc {
    pub center: Pos,
    pub radius: f64,
    pub start_angle: f64,
    /// Signed sweep, negative for clockwise traversal.
    pub sweep: f64,
}
impl Arc {
    /// Whether the polar angle lies on the arc, start inclusive, end exclusive.
    fn covers(&self, angle: f64) -> bool {
        let t = if self.sweep >= 0. {
            normalize_angle(angle - self.start_angle)
        } else {
            normalize_angle(self.start_angle - angle)
        };
        t < self.sweep.abs()
    }

    fn point_at(&self, angle: f64) -> Pos {
        self.center + self.radius * Pos::polar(angle)
    }

    /// Crossings of the ray from `p` towards `+x`.
    fn ray_crossings(&self, p: Pos) -> usize {
        let dy = p.y - self.center.y;
        let h2 = self.radius * self.radius - dy * dy;
        if h2 <= 0. {
            return 0;
        }
        let h = h2.sqrt();
        [self.center.x - h, self.center.x + h]
            .into_iter()
            .filter(|&x| x > p.x)
            .filter(|&x| self.covers((p.y - self.center.y).atan2(x - self.center.x)))
            .count()
    }
}

/// Axis aligned bounding rectangle.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rect {
    pub min: Pos,
    pub max: Pos,
}
impl Rect {
    fn empty() -> Self {
        Self {
            min: Pos::new(f64::INFINITY, f64::INFINITY),
            max: Pos::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    fn include(&mut self, p: Pos) {
        self.min = Pos::new(self.min.x.min(p.x), self.min.y.min(p.y));
        self.max = Pos::new(self.max.x.max(p.x), self.max.y.max(p.y));
    }

    pub fn contains(&self, p: Pos) -> bool {
        self.min.x <= p.x && p.x <= self.max.x && self.min.y <= p.y && p.y <= self.max.y
    }

    pub fn area(&self) -> f64 {
        (self.max.x - self.min.x).max(0.) * (self.max.y - self.min.y).max(0.)
    }
}

/// Bounded face of the arrangement.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Corner indices in traversal order.
    pub corners: Vec<usize>,
    /// `arcs[i]` runs from `corners[i]` to the next corner.
    pub arcs: Vec<Arc>,
    pub bounds: Rect,
}
impl Polygon {
    fn new(corners: Vec<usize>, arcs: Vec<Arc>) -> Self {
        let mut bounds = Rect::empty();
        for arc in &arcs {
            bounds.include(arc.point_at(arc.start_angle));
            for extreme in [0., FRAC_PI_2, PI, 1.5 * PI] {
                if arc.covers(extreme) {
                    bounds.include(arc.point_at(extreme));
                }
            }
        }
        Self {
            corners,
            arcs,
            bounds,
        }
    }

    pub fn contains(&self, p: Pos) -> bool {
        if !self.bounds.contains(p) {
            return false;
        }
        let crossings: usize = self.arcs.iter().map(|arc| arc.ray_crossings(p)).sum();
        crossings % 2 == 1
    }
}

/// Corners, lines and bounded faces of a circle arrangement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Regions {
    corners: Vec<Corner>,
    lines: Vec<Line>,
    polygons: Vec<Polygon>,
}
impl Regions {
    /// Rebuilds the subdivision from scratch.
    pub fn extract<'a>(circles: impl IntoIterator<Item = &'a Circle>) -> Self {
        let circles: Vec<&Circle> = circles.into_iter().collect();
        let mut regions = Self {
            corners: find_corners(&circles),
            ..Default::default()
        };
        regions.connect(&circles);
        regions.remove_dead_ends();
        regions.sort_ends();
        regions.walk_faces();
        log::debug!(
            "extracted {} corners, {} lines and {} polygons from {} circles",
            regions.corners.len(),
            regions.lines.len(),
            regions.polygons.len(),
            circles.len()
        );
        regions
    }

    pub fn corners(&self) -> &[Corner] {
        &self.corners
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Index of the innermost polygon containing `p`.
    ///
    /// Faces carry no hole boundaries, so a component nested inside a face
    /// of another is also covered by that outer face.
    pub fn polygon_index(&self, p: Pos) -> Option<usize> {
        self.polygons
            .iter()
            .enumerate()
            .filter(|(_, polygon)| polygon.contains(p))
            .min_by(|(_, a), (_, b)| a.bounds.area().total_cmp(&b.bounds.area()))
            .map(|(i, _)| i)
    }

    /// Arcs between angularly consecutive corners of every circle.
    fn connect(&mut self, circles: &[&Circle]) {
        for circle in circles {
            let mut around: Vec<(f64, usize)> = self
                .corners
                .iter()
                .enumerate()
                .filter(|(_, corner)| corner.circles.contains(&circle.id))
                .map(|(i, corner)| (normalize_angle((corner.position - circle.center).angle()), i))
                .collect();
            if around.len() < 2 {
                continue;
            }
            around.sort_by(|a, b| a.0.total_cmp(&b.0));
            for (i, &(start_angle, start)) in around.iter().enumerate() {
                let (end_angle, end) = around[(i + 1) % around.len()];
                let mut sweep = normalize_angle(end_angle - start_angle);
                if sweep == 0. {
                    sweep = TAU;
                }
                self.lines.push(Line {
                    circle: circle.id,
                    center: circle.center,
                    radius: circle.radius(),
                    start,
                    end,
                    start_angle,
                    sweep,
                    done_forward: false,
                    done_backward: false,
                });
            }
        }
    }

    /// Drops lines ending in corners with fewer than two lines, then
    /// compacts the corner indices.
    fn remove_dead_ends(&mut self) {
        loop {
            let mut degree = vec![0usize; self.corners.len()];
            for line in &self.lines {
                degree[line.start] += 1;
                degree[line.end] += 1;
            }
            let before = self.lines.len();
            self.lines
                .retain(|line| degree[line.start] >= 2 && degree[line.end] >= 2);
            if self.lines.len() == before {
                break;
            }
        }

        let mut used = vec![false; self.corners.len()];
        for line in &self.lines {
            used[line.start] = true;
            used[line.end] = true;
        }
        let mut remap = vec![usize::MAX; self.corners.len()];
        let mut next = 0;
        for (i, &keep) in used.iter().enumerate() {
            if keep {
                remap[i] = next;
                next += 1;
            }
        }
        self.corners = std::mem::take(&mut self.corners)
            .into_iter()
            .zip(&used)
            .filter_map(|(corner, &keep)| keep.then_some(corner))
            .collect();
        for line in &mut self.lines {
            line.start = remap[line.start];
            line.end = remap[line.end];
        }
    }

    fn sort_ends(&mut self) {
        for (i, line) in self.lines.iter().enumerate() {
            self.corners[line.start].ends.push(LineEnd {
                line: i,
                forward: true,
                angle: line.start_tangent(),
                curvature: 1. / line.radius,
            });
            self.corners[line.end].ends.push(LineEnd {
                line: i,
                forward: false,
                angle: line.end_tangent(),
                curvature: -1. / line.radius,
            });
        }
        for corner in &mut self.corners {
            let ends = &mut corner.ends;
            ends.sort_by(|a, b| a.angle.total_cmp(&b.angle));
            // tangent lines: the one turning right lies clockwise
            let mut run = 0;
            while run < ends.len() {
                let mut stop = run + 1;
                while stop < ends.len() && ends[stop].angle - ends[stop - 1].angle < ANGLE_TOLERANCE
                {
                    stop += 1;
                }
                ends[run..stop].sort_by(|a, b| a.curvature.total_cmp(&b.curvature));
                run = stop;
            }
        }
    }

    fn walk_faces(&mut self) {
        for line in 0..self.lines.len() {
            for forward in [true, false] {
                if self.lines[line].done(forward) {
                    continue;
                }
                if let Some(polygon) = self.walk(line, forward) {
                    self.polygons.push(polygon);
                }
            }
        }
    }

    /// Follows the face left of the directed line, marking its lines done.
    fn walk(&mut self, first: usize, first_forward: bool) -> Option<Polygon> {
        let mut corners = vec![];
        let mut arcs = vec![];
        let mut interior_sum = 0.;
        let mut sweep_sum = 0.;
        let (mut line, mut forward) = (first, first_forward);

        for _ in 0..=2 * self.lines.len() {
            if self.lines[line].done(forward) {
                log::warn!("face walk from line {first} ran into finished line {line}, skipped");
                return None;
            }
            self.lines[line].set_done(forward);

            let current = &self.lines[line];
            let (from, to) = if forward {
                (current.start, current.end)
            } else {
                (current.end, current.start)
            };
            let arc = current.arc(forward);
            corners.push(from);
            sweep_sum += arc.sweep;
            arcs.push(arc);

            let ends = &self.corners[to].ends;
            let Some(back) = ends
                .iter()
                .position(|end| end.line == line && end.forward != forward)
            else {
                log::warn!("corner {to} does not know line {line}, face skipped");
                return None;
            };
            let next = ends[(back + ends.len() - 1) % ends.len()];
            let mut interior = normalize_angle(ends[back].angle - next.angle);
            if interior > TAU - ANGLE_TOLERANCE {
                interior = 0.;
            }
            interior_sum += interior;

            (line, forward) = (next.line, next.forward);
            if line == first && forward == first_forward {
                let expected = (corners.len() as f64 - 2.) * PI;
                let chord_sum = interior_sum - sweep_sum;
                if (chord_sum - expected).abs() < ANGLE_SUM_TOLERANCE {
                    return Some(Polygon::new(corners, arcs));
                }
                log::debug!(
                    "face with {} corners has angle sum {chord_sum:.4}, expected {expected:.4}; not a bounded polygon",
                    corners.len()
                );
                return None;
            }
        }
        log::warn!("face walk from line {first} did not close, skipped");
        None
    }
}

/// Pairwise circle intersections, merging points that coincide.
fn find_corners(circles: &[&Circle]) -> Vec<Corner> {
    let mut corners: Vec<Corner> = vec![];
    for (i, a) in circles.iter().enumerate() {
        for b in &circles[i + 1..] {
            for p in circle_intersections(a.center, a.radius(), b.center, b.radius()) {
                let index = match corners
                    .iter()
                    .position(|corner| corner.position.dist(p) < POINT_TOLERANCE)
                {
                    Some(index) => index,
                    None => {
                        corners.push(Corner::new(p));
                        corners.len() - 1
                    }
                };
                let corner = &mut corners[index];
                for id in [a.id, b.id] {
                    if !corner.circles.contains(&id) {
                        corner.circles.push(id);
                    }
                }
            }
        }
    }
    corners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circle::MappingDirection;

    fn circle(id: u32, x: f64, y: f64, r: f64) -> Circle {
        Circle::new(
            CircleId(id),
            Pos::new(x, y),
            r,
            MappingDirection::OutsideIn,
            "#000000".to_string(),
        )
    }

    /// Direction of travel along `arc` at polar angle `angle`.
    fn heading(arc: &Arc, angle: f64) -> f64 {
        angle + FRAC_PI_2.copysign(arc.sweep)
    }

    fn check_closed(regions: &Regions) {
        for polygon in regions.polygons() {
            let n = polygon.corners.len();
            assert_eq!(polygon.arcs.len(), n);
            // consecutive arcs meet at the listed corners
            for (i, arc) in polygon.arcs.iter().enumerate() {
                let end = arc.point_at(arc.start_angle + arc.sweep);
                let corner = regions.corners()[polygon.corners[(i + 1) % n]].position;
                assert!(end.dist(corner) < 1e-6);
            }

            // interior angles from the arc tangents, minus the total sweep
            let mut angle_sum = 0.;
            for (i, outgoing) in polygon.arcs.iter().enumerate() {
                let incoming = &polygon.arcs[(i + n - 1) % n];
                let arriving = heading(incoming, incoming.start_angle + incoming.sweep);
                let leaving = heading(outgoing, outgoing.start_angle);
                let turn = normalize_angle(leaving - arriving + PI) - PI;
                angle_sum += PI - turn - outgoing.sweep;
            }
            let expected = (n as f64 - 2.) * PI;
            assert!(
                (angle_sum - expected).abs() < ANGLE_SUM_TOLERANCE,
                "polygon with {n} corners has angle sum {angle_sum}, expected {expected}"
            );
        }
    }

    #[test_log::test]
    fn two_overlapping_circles() {
        let circles = [circle(0, -0.95, 0., 1.), circle(1, 0.95, 0., 1.)];
        let regions = Regions::extract(&circles);
        assert_eq!(regions.corners().len(), 2);
        assert_eq!(regions.lines().len(), 4);
        assert_eq!(regions.polygons().len(), 3);
        check_closed(&regions);

        let lens = regions.polygon_index(Pos::new(0., 0.)).unwrap();
        let left = regions.polygon_index(Pos::new(-1.5, 0.)).unwrap();
        let right = regions.polygon_index(Pos::new(1.5, 0.2)).unwrap();
        assert!(lens != left && lens != right && left != right);
        assert_eq!(regions.polygon_index(Pos::new(0., 3.)), None);
        assert_eq!(regions.polygon_index(Pos::new(-3., 0.)), None);
    }

    #[test]
    fn corner_tangents() {
        let circles = [circle(0, -0.95, 0., 1.), circle(1, 0.95, 0., 1.)];
        let regions = Regions::extract(&circles);
        for line in regions.lines() {
            let start = regions.corners()[line.start].position;
            let radial = (start - line.center).angle();
            let expected = normalize_angle(radial + FRAC_PI_2);
            assert!((line.start_tangent() - expected).abs() < 1e-9);
        }
        for corner in regions.corners() {
            assert_eq!(corner.degree(), 4);
            assert_eq!(corner.circles.len(), 2);
        }
    }

    #[test]
    fn separate_circles_have_no_polygons() {
        let circles = [circle(0, 0., 0., 1.), circle(1, 5., 0., 1.)];
        let regions = Regions::extract(&circles);
        assert!(regions.corners().is_empty());
        assert!(regions.lines().is_empty());
        assert!(regions.polygons().is_empty());
    }

    #[test]
    fn touching_circles_are_dead_ends() {
        let circles = [circle(0, 0., 0., 1.), circle(1, 2., 0., 1.)];
        let regions = Regions::extract(&circles);
        assert!(regions.lines().is_empty());
        assert!(regions.corners().is_empty());
        assert!(regions.polygons().is_empty());
    }

    #[test_log::test]
    fn three_circles_through_common_points() {
        // three unit circles around the origin, each pair crossing twice
        let circles: Vec<Circle> = (0..3u32)
            .map(|i| {
                let c = 0.8 * Pos::polar(i as f64 * TAU / 3.);
                circle(i, c.x, c.y, 1.)
            })
            .collect();
        let regions = Regions::extract(&circles);
        assert_eq!(regions.corners().len(), 6);
        // Venn diagram: seven bounded faces
        assert_eq!(regions.polygons().len(), 7);
        check_closed(&regions);
        assert!(regions.polygon_index(Pos::new(0.01, 0.03)).is_some());
    }

    #[test]
    fn nested_component_gets_its_own_regions() {
        // a crossing pair inside the left lune of a larger crossing pair
        let circles = [
            circle(0, 0., 0., 3.),
            circle(1, 4., 0., 3.),
            circle(2, -1.5, 0., 0.5),
            circle(3, -1., 0., 0.5),
        ];
        let regions = Regions::extract(&circles);
        assert_eq!(regions.polygons().len(), 6);
        check_closed(&regions);

        let outer_lune = regions.polygon_index(Pos::new(-2.5, 1.)).unwrap();
        let inner_lens = regions.polygon_index(Pos::new(-1.25, 0.)).unwrap();
        let inner_lune = regions.polygon_index(Pos::new(-1.7, 0.)).unwrap();
        let outer_lens = regions.polygon_index(Pos::new(2., 0.)).unwrap();
        let indices = [outer_lune, inner_lens, inner_lune, outer_lens];
        for (i, a) in indices.iter().enumerate() {
            for b in &indices[i + 1..] {
                assert_ne!(a, b);
            }
        }
        // the outer lune still covers the nested faces
        assert!(regions.polygons()[outer_lune].contains(Pos::new(-1.25, 0.)));
    }

    #[test]
    fn shared_vertex_is_one_corner() {
        // three circles through the origin
        let circles: Vec<Circle> = (0..3u32)
            .map(|i| {
                let c = Pos::polar(i as f64 * TAU / 3.);
                circle(i, c.x, c.y, 1.)
            })
            .collect();
        let regions = Regions::extract(&circles);
        let origin: Vec<&Corner> = regions
            .corners()
            .iter()
            .filter(|corner| corner.position.dist(Pos::ZERO) < 1e-6)
            .collect();
        assert_eq!(origin.len(), 1);
        assert_eq!(origin[0].circles.len(), 3);
        check_closed(&regions);
    }
}
