//! Editable set of mirror circles and the intersections constraining them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    circle::{Circle, CircleId, Constraint, Intersection, IntersectionId, MappingDirection},
    geom::Pos,
    kaleidoscope::MAX_ITERATIONS,
    pixels::{PointMap, ReducedPoint, MAX_REGION},
    regions::Regions,
};

/// Most intersections a single circle can be solved for.
pub const MAX_INTERSECTIONS: usize = 3;

/// Colors handed out to new circles, in order.
pub const PALETTE: [&str; 5] = ["#ee0000", "#0000ff", "#00dd00", "#aa9900", "#000000"];

#[derive(Debug, Error)]
pub enum ArrangementError {
    #[error("no circle with id {0:?}")]
    UnknownCircle(CircleId),
    #[error("no intersection with id {0:?}")]
    UnknownIntersection(IntersectionId),
    #[error("circle {0:?} already has three intersections")]
    TooManyIntersections(CircleId),
    #[error("circles {0:?} and {1:?} already intersect")]
    DuplicateIntersection(CircleId, CircleId),
    #[error("circle {0:?} cannot intersect itself")]
    SelfIntersection(CircleId),
    #[error("intersection order must be at least 2, got {0}")]
    InvalidOrder(u32),
    #[error("radius must be positive and finite, got {0}")]
    InvalidRadius(f64),
    #[error("circle id {0:?} is used twice")]
    DuplicateCircle(CircleId),
    #[error("malformed preset: {0}")]
    Json(#[from] serde_json::Error),
}

/// Hands out ids and palette colors.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArrangementBuilder {
    next_circle: u32,
    next_intersection: u32,
    next_color: usize,
}
impl ArrangementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn circle_id(&mut self) -> CircleId {
        let id = CircleId(self.next_circle);
        self.next_circle += 1;
        id
    }

    pub fn intersection_id(&mut self) -> IntersectionId {
        let id = IntersectionId(self.next_intersection);
        self.next_intersection += 1;
        id
    }

    pub fn color(&mut self) -> String {
        let color = PALETTE[self.next_color % PALETTE.len()];
        self.next_color += 1;
        color.to_string()
    }

    /// Makes sure `id` is never handed out again.
    pub fn reserve(&mut self, id: CircleId) {
        self.next_circle = self.next_circle.max(id.0 + 1);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleRecord {
    pub radius: f64,
    pub center_x: f64,
    pub center_y: f64,
    #[serde(default)]
    pub mapping_direction: MappingDirection,
    pub id: CircleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}
impl From<&Circle> for CircleRecord {
    fn from(circle: &Circle) -> Self {
        Self {
            radius: circle.radius(),
            center_x: circle.center.x,
            center_y: circle.center.y,
            mapping_direction: circle.mapping,
            id: circle.id,
            color: Some(circle.color.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntersectionRecord {
    pub id_circle1: CircleId,
    pub id_circle2: CircleId,
    pub order: u32,
}

/// Saved arrangement. Ids are the only cross references.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub circles: Vec<CircleRecord>,
    #[serde(default)]
    pub intersections: Vec<IntersectionRecord>,
}

/// Circles, intersections and the regions they bound.
///
/// Every edit re-solves the affected circle and rebuilds the regions, so
/// the arrangement is always consistent between edits.
#[derive(Debug, Clone)]
pub struct Arrangement {
    circles: BTreeMap<CircleId, Circle>,
    intersections: BTreeMap<IntersectionId, Intersection>,
    builder: ArrangementBuilder,
    regions: Regions,
    pub max_iterations: u32,
}
impl Arrangement {
    pub fn new() -> Self {
        Self {
            circles: BTreeMap::new(),
            intersections: BTreeMap::new(),
            builder: ArrangementBuilder::new(),
            regions: Regions::default(),
            max_iterations: MAX_ITERATIONS,
        }
    }

    pub fn circles(&self) -> impl Iterator<Item = &Circle> {
        self.circles.values()
    }

    pub fn circle(&self, id: CircleId) -> Option<&Circle> {
        self.circles.get(&id)
    }

    pub fn intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.intersections.values()
    }

    pub fn intersection(&self, id: IntersectionId) -> Option<&Intersection> {
        self.intersections.get(&id)
    }

    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    pub fn add_circle(
        &mut self,
        center: Pos,
        radius: f64,
        mapping: MappingDirection,
    ) -> Result<CircleId, ArrangementError> {
        check_radius(radius)?;
        let id = self.builder.circle_id();
        let color = self.builder.color();
        self.circles
            .insert(id, Circle::new(id, center, radius, mapping, color));
        log::trace!("added circle {id:?}");
        self.rebuild();
        Ok(id)
    }

    /// Removes the circle together with its intersections.
    pub fn remove_circle(&mut self, id: CircleId) -> Result<Circle, ArrangementError> {
        let circle = self
            .circles
            .remove(&id)
            .ok_or(ArrangementError::UnknownCircle(id))?;
        for intersection in circle.intersections() {
            self.unlink(*intersection);
        }
        log::trace!("removed circle {id:?}");
        self.rebuild();
        Ok(circle)
    }

    /// Constrains `a` and `b` to meet at `π / order`, moving `b`.
    pub fn add_intersection(
        &mut self,
        a: CircleId,
        b: CircleId,
        order: u32,
    ) -> Result<IntersectionId, ArrangementError> {
        let id = self.link(a, b, order)?;
        log::trace!("added intersection {id:?} between {a:?} and {b:?}");
        self.adjust(b);
        self.rebuild();
        Ok(id)
    }

    pub fn remove_intersection(
        &mut self,
        id: IntersectionId,
    ) -> Result<Intersection, ArrangementError> {
        let intersection = self
            .unlink(id)
            .ok_or(ArrangementError::UnknownIntersection(id))?;
        log::trace!("removed intersection {id:?}");
        self.rebuild();
        Ok(intersection)
    }

    pub fn set_radius(&mut self, id: CircleId, radius: f64) -> Result<(), ArrangementError> {
        check_radius(radius)?;
        self.circle_mut(id)?.set_radius(radius);
        log::trace!("circle {id:?} radius set to {radius}");
        self.adjust(id);
        self.rebuild();
        Ok(())
    }

    pub fn set_center(&mut self, id: CircleId, center: Pos) -> Result<(), ArrangementError> {
        self.circle_mut(id)?.center = center;
        log::trace!("circle {id:?} moved to {center:?}");
        self.adjust(id);
        self.rebuild();
        Ok(())
    }

    pub fn set_mapping(
        &mut self,
        id: CircleId,
        mapping: MappingDirection,
    ) -> Result<(), ArrangementError> {
        self.circle_mut(id)?.mapping = mapping;
        log::trace!("circle {id:?} now maps {mapping:?}");
        self.adjust(id);
        self.rebuild();
        Ok(())
    }

    /// Changes the order of an intersection, moving its second circle.
    pub fn set_order(&mut self, id: IntersectionId, order: u32) -> Result<(), ArrangementError> {
        check_order(order)?;
        let intersection = self
            .intersections
            .get_mut(&id)
            .ok_or(ArrangementError::UnknownIntersection(id))?;
        intersection.order = order;
        let moved = intersection.circles[1];
        log::trace!("intersection {id:?} order set to {order}");
        self.adjust(moved);
        self.rebuild();
        Ok(())
    }

    pub fn from_preset(preset: Preset) -> Result<Self, ArrangementError> {
        let mut arrangement = Self::new();
        for record in preset.circles {
            check_radius(record.radius)?;
            if arrangement.circles.contains_key(&record.id) {
                return Err(ArrangementError::DuplicateCircle(record.id));
            }
            arrangement.builder.reserve(record.id);
            let color = match record.color {
                Some(color) => color,
                None => arrangement.builder.color(),
            };
            let center = Pos::new(record.center_x, record.center_y);
            arrangement.circles.insert(
                record.id,
                Circle::new(record.id, center, record.radius, record.mapping_direction, color),
            );
        }
        for record in preset.intersections {
            arrangement.link(record.id_circle1, record.id_circle2, record.order)?;
            arrangement.adjust(record.id_circle2);
        }
        arrangement.rebuild();
        log::debug!(
            "loaded {} circles and {} intersections",
            arrangement.circles.len(),
            arrangement.intersections.len()
        );
        Ok(arrangement)
    }

    pub fn to_preset(&self) -> Preset {
        Preset {
            circles: self.circles.values().map(CircleRecord::from).collect(),
            intersections: self
                .intersections
                .values()
                .map(|intersection| IntersectionRecord {
                    id_circle1: intersection.circles[0],
                    id_circle2: intersection.circles[1],
                    order: intersection.order,
                })
                .collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ArrangementError> {
        Self::from_preset(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ArrangementError> {
        Ok(serde_json::to_string_pretty(&self.to_preset())?)
    }

    fn circle_mut(&mut self, id: CircleId) -> Result<&mut Circle, ArrangementError> {
        self.circles
            .get_mut(&id)
            .ok_or(ArrangementError::UnknownCircle(id))
    }

    /// Validates and records a new intersection without solving.
    fn link(
        &mut self,
        a: CircleId,
        b: CircleId,
        order: u32,
    ) -> Result<IntersectionId, ArrangementError> {
        check_order(order)?;
        if a == b {
            return Err(ArrangementError::SelfIntersection(a));
        }
        for id in [a, b] {
            let circle = self.circles.get(&id).ok_or(ArrangementError::UnknownCircle(id))?;
            if circle.intersections().len() >= MAX_INTERSECTIONS {
                return Err(ArrangementError::TooManyIntersections(id));
            }
        }
        if self
            .intersections
            .values()
            .any(|intersection| intersection.involves(a) && intersection.involves(b))
        {
            return Err(ArrangementError::DuplicateIntersection(a, b));
        }

        let id = self.builder.intersection_id();
        self.intersections.insert(
            id,
            Intersection {
                id,
                circles: [a, b],
                order,
            },
        );
        for circle in [a, b] {
            if let Some(circle) = self.circles.get_mut(&circle) {
                circle.intersections.push(id);
            }
        }
        Ok(id)
    }

    fn unlink(&mut self, id: IntersectionId) -> Option<Intersection> {
        let intersection = self.intersections.remove(&id)?;
        for circle in intersection.circles {
            if let Some(circle) = self.circles.get_mut(&circle) {
                circle.intersections.retain(|&other| other != id);
            }
        }
        Some(intersection)
    }

    /// Re-solves one circle against all of its intersections.
    fn adjust(&mut self, id: CircleId) {
        let Some(circle) = self.circles.get(&id) else {
            return;
        };
        let constraints: Vec<Constraint> = circle
            .intersections()
            .iter()
            .filter_map(|i| self.intersections.get(i))
            .filter_map(|intersection| {
                let other = self.circles.get(&intersection.other(id))?;
                Some(Constraint::new(other, circle.mapping, intersection.order))
            })
            .collect();
        if let Some(circle) = self.circles.get_mut(&id) {
            circle.adjust_to(&constraints);
        }
    }

    fn rebuild(&mut self) {
        self.regions = Regions::extract(self.circles.values());
    }
}
impl Default for Arrangement {
    fn default() -> Self {
        Self::new()
    }
}
impl PointMap for Arrangement {
    /// Inverts at every circle in turn until none acts.
    fn map_point(&self, p: Pos, parity: bool) -> ReducedPoint {
        let mut reduced = ReducedPoint::start(p, parity);
        loop {
            let mut acted = false;
            for circle in self.circles.values() {
                if reduced.iterations >= self.max_iterations {
                    reduced.converged = false;
                    return reduced;
                }
                if let Some((q, factor)) = circle.map(reduced.position) {
                    reduced.reflect(q, factor);
                    reduced.iterations += 1;
                    acted = true;
                }
            }
            if !acted {
                break;
            }
        }
        let outside = self.regions.polygons().len();
        let region = self.regions.polygon_index(reduced.position).unwrap_or(outside);
        reduced.region = region.min(MAX_REGION as usize) as u8;
        reduced
    }
}

fn check_radius(radius: f64) -> Result<(), ArrangementError> {
    if radius.is_finite() && radius > 0. {
        Ok(())
    } else {
        Err(ArrangementError::InvalidRadius(radius))
    }
}

fn check_order(order: u32) -> Result<(), ArrangementError> {
    if order >= 2 {
        Ok(())
    } else {
        Err(ArrangementError::InvalidOrder(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn fixture() -> (Arrangement, CircleId, CircleId, IntersectionId) {
        let mut arrangement = Arrangement::new();
        let a = arrangement
            .add_circle(Pos::new(-1.036, 0.), 1., MappingDirection::OutsideIn)
            .unwrap();
        let b = arrangement
            .add_circle(Pos::new(0.866, 0.), 1., MappingDirection::OutsideIn)
            .unwrap();
        let i = arrangement.add_intersection(a, b, 5).unwrap();
        (arrangement, a, b, i)
    }

    fn distance(arrangement: &Arrangement, a: CircleId, b: CircleId) -> f64 {
        let a = arrangement.circle(a).unwrap();
        let b = arrangement.circle(b).unwrap();
        a.center.dist(b.center)
    }

    #[test]
    fn two_circle_fixture() {
        let (arrangement, a, b, i) = fixture();
        let d = distance(&arrangement, a, b);
        assert!((d - 1.902).abs() < 1e-3);
        let expected = (2. + 2. * (PI / 5.).cos()).sqrt();
        assert!((d - expected).abs() < 1e-9);
        let intersection = arrangement.intersection(i).unwrap();
        let (ca, cb) = (arrangement.circle(a).unwrap(), arrangement.circle(b).unwrap());
        assert!((intersection.required_distance(ca, cb) - d).abs() < 1e-9);

        // the lens and two lunes, the outside stays implicit
        assert_eq!(arrangement.regions().corners().len(), 2);
        assert_eq!(arrangement.regions().polygons().len(), 3);
        assert_eq!(arrangement.circle(a).unwrap().intersections(), &[i]);
        assert_eq!(arrangement.circle(b).unwrap().intersections(), &[i]);
    }

    #[test]
    fn points_map_into_the_lens() {
        let (arrangement, a, b, _) = fixture();
        let ca = arrangement.circle(a).unwrap().center;
        let cb = arrangement.circle(b).unwrap().center;
        let lens = arrangement
            .regions()
            .polygon_index(0.5 * (ca + cb))
            .unwrap();

        for p in [
            Pos::new(3., 0.5),
            Pos::new(-4., 1.3),
            Pos::new(0.2, 2.1),
            Pos::new(-1.5, -0.2),
        ] {
            let reduced = arrangement.map_point(p, false);
            assert!(reduced.converged, "{p:?}");
            assert!(reduced.iterations > 0);
            assert_eq!(reduced.region as usize, lens);
            assert_eq!(reduced.parity, reduced.iterations % 2 == 1);
            for circle in arrangement.circles() {
                assert!(circle.is_in_target(reduced.position));
            }
        }

        // already inside both circles
        let inside = arrangement.map_point(0.5 * (ca + cb), true);
        assert!(inside.converged && inside.parity);
        assert_eq!(inside.iterations, 0);
    }

    #[test]
    fn empty_arrangement_is_all_outside() {
        let arrangement = Arrangement::new();
        let reduced = arrangement.map_point(Pos::new(0.3, 0.4), false);
        assert!(reduced.converged);
        assert_eq!(reduced.region, 0);
    }

    #[test]
    fn exhausted_budget_is_invalid() {
        let (mut arrangement, ..) = fixture();
        arrangement.max_iterations = 0;
        let reduced = arrangement.map_point(Pos::new(5., 5.), false);
        assert!(!reduced.converged);
        assert!(reduced.structure() >= crate::pixels::INVALID);
    }

    #[test]
    fn edits_re_solve_the_constraints() {
        let (mut arrangement, a, b, i) = fixture();

        arrangement.set_order(i, 3).unwrap();
        assert!((distance(&arrangement, a, b) - 3f64.sqrt()).abs() < 1e-9);

        arrangement.set_radius(a, 0.5).unwrap();
        let expected = Constraint::new(arrangement.circle(b).unwrap(), MappingDirection::OutsideIn, 3)
            .required_distance(0.5);
        assert!((distance(&arrangement, a, b) - expected).abs() < 1e-9);

        // dragged straight above `a`, then pulled back to the required distance
        let above = arrangement.circle(a).unwrap().center + Pos::new(0., 4.);
        arrangement.set_center(b, above).unwrap();
        let moved = arrangement.circle(b).unwrap().center;
        assert!((distance(&arrangement, a, b) - expected).abs() < 1e-9);
        assert!((moved.x - above.x).abs() < 1e-9 && moved.y > 0.);

        arrangement.set_mapping(b, MappingDirection::InsideOut).unwrap();
        let expected = (1.25 - 2. * 0.5 * (PI / 3.).cos()).sqrt();
        assert!((distance(&arrangement, a, b) - expected).abs() < 1e-9);
    }

    #[test]
    fn invalid_edits_are_rejected() {
        let (mut arrangement, a, b, i) = fixture();
        let missing = CircleId(42);
        assert!(matches!(
            arrangement.add_intersection(a, missing, 3),
            Err(ArrangementError::UnknownCircle(id)) if id == missing
        ));
        assert!(matches!(
            arrangement.add_intersection(a, a, 3),
            Err(ArrangementError::SelfIntersection(_))
        ));
        assert!(matches!(
            arrangement.add_intersection(b, a, 4),
            Err(ArrangementError::DuplicateIntersection(..))
        ));
        assert!(matches!(
            arrangement.set_order(i, 1),
            Err(ArrangementError::InvalidOrder(1))
        ));
        assert!(matches!(
            arrangement.set_radius(a, 0.),
            Err(ArrangementError::InvalidRadius(_))
        ));
        assert!(matches!(
            arrangement.add_circle(Pos::ZERO, f64::NAN, MappingDirection::OutsideIn),
            Err(ArrangementError::InvalidRadius(_))
        ));
        assert!(matches!(
            arrangement.remove_intersection(IntersectionId(9)),
            Err(ArrangementError::UnknownIntersection(_))
        ));
        // nothing changed
        assert_eq!(arrangement.intersections().count(), 1);
        assert_eq!(arrangement.intersection(i).unwrap().order, 5);
    }

    #[test]
    fn fourth_intersection_is_rejected() {
        let mut arrangement = Arrangement::new();
        let hub = arrangement
            .add_circle(Pos::ZERO, 1., MappingDirection::OutsideIn)
            .unwrap();
        let spokes: Vec<CircleId> = (0..4)
            .map(|i| {
                let center = 3. * Pos::polar(i as f64 * PI / 2.);
                arrangement
                    .add_circle(center, 0.5, MappingDirection::OutsideIn)
                    .unwrap()
            })
            .collect();
        for spoke in &spokes[..3] {
            arrangement.add_intersection(hub, *spoke, 4).unwrap();
        }
        assert!(matches!(
            arrangement.add_intersection(hub, spokes[3], 4),
            Err(ArrangementError::TooManyIntersections(id)) if id == hub
        ));
        assert_eq!(arrangement.circle(hub).unwrap().intersections().len(), 3);
    }

    #[test]
    fn removing_a_circle_drops_its_intersections() {
        let (mut arrangement, a, b, _) = fixture();
        let removed = arrangement.remove_circle(a).unwrap();
        assert_eq!(removed.id, a);
        assert_eq!(arrangement.intersections().count(), 0);
        assert!(arrangement.circle(b).unwrap().intersections().is_empty());
        assert!(arrangement.regions().polygons().is_empty());
        assert!(matches!(
            arrangement.remove_circle(a),
            Err(ArrangementError::UnknownCircle(_))
        ));
    }

    #[test]
    fn ids_and_colors_are_not_reused() {
        let mut arrangement = Arrangement::new();
        let first = arrangement
            .add_circle(Pos::ZERO, 1., MappingDirection::OutsideIn)
            .unwrap();
        arrangement.remove_circle(first).unwrap();
        let second = arrangement
            .add_circle(Pos::ZERO, 1., MappingDirection::OutsideIn)
            .unwrap();
        assert_eq!(first, CircleId(0));
        assert_eq!(second, CircleId(1));
        assert_eq!(arrangement.circle(second).unwrap().color, PALETTE[1]);
    }

    #[test]
    fn preset_json_round_trip() {
        let json = r#"{
            "circles": [
                { "radius": 1, "centerX": -1.036, "centerY": 0, "mappingDirection": "outside-in", "id": 3 },
                { "radius": 1, "centerX": 0.866, "centerY": 0, "mappingDirection": "outside-in", "id": 7 }
            ],
            "intersections": [ { "idCircle1": 3, "idCircle2": 7, "order": 5 } ]
        }"#;
        let mut arrangement = Arrangement::from_json(json).unwrap();
        assert!((distance(&arrangement, CircleId(3), CircleId(7)) - 1.902).abs() < 1e-3);
        assert_eq!(arrangement.regions().polygons().len(), 3);
        assert_eq!(arrangement.circle(CircleId(3)).unwrap().color, PALETTE[0]);

        let saved = arrangement.to_json().unwrap();
        assert!(saved.contains("\"centerX\""));
        assert!(saved.contains("\"mappingDirection\": \"outside-in\""));
        assert!(saved.contains("\"idCircle1\": 3"));
        let reloaded = Arrangement::from_json(&saved).unwrap().to_preset();
        let original = arrangement.to_preset();
        assert_eq!(reloaded.intersections, original.intersections);
        for (again, before) in reloaded.circles.iter().zip(&original.circles) {
            assert_eq!((again.id, again.mapping_direction), (before.id, before.mapping_direction));
            assert_eq!(again.color, before.color);
            assert!((again.center_x - before.center_x).abs() < 1e-12);
            assert!((again.center_y - before.center_y).abs() < 1e-12);
            assert_eq!(again.radius, before.radius);
        }

        // new circles continue after the largest loaded id
        let next = arrangement
            .add_circle(Pos::new(5., 5.), 1., MappingDirection::InsideOut)
            .unwrap();
        assert_eq!(next, CircleId(8));
    }

    #[test_log::test]
    fn malformed_presets_are_errors() {
        let duplicate = Preset {
            circles: vec![
                CircleRecord {
                    radius: 1.,
                    center_x: 0.,
                    center_y: 0.,
                    mapping_direction: MappingDirection::OutsideIn,
                    id: CircleId(1),
                    color: None,
                };
                2
            ],
            intersections: vec![],
        };
        assert!(matches!(
            Arrangement::from_preset(duplicate),
            Err(ArrangementError::DuplicateCircle(CircleId(1)))
        ));

        let dangling = r#"{ "circles": [], "intersections": [ { "idCircle1": 0, "idCircle2": 1, "order": 3 } ] }"#;
        assert!(matches!(
            Arrangement::from_json(dangling),
            Err(ArrangementError::UnknownCircle(_))
        ));
        assert!(matches!(
            Arrangement::from_json("{ \"circles\": 3 }"),
            Err(ArrangementError::Json(_))
        ));
    }
}
