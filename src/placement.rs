//! Manually placed panels and their grouping into strings.
//!
//! This is the free-form counterpart of the [`layout`](crate::layout) engine: panels are dropped
//! one by one (or seeded from a coarse grid) with no pitch or azimuth optimisation, and strings
//! are formed by chaining nearby panels together.
use crate::equipment::{EquipmentID, PanelSpec};
use crate::footprint::Footprint;
use crate::geo::{self, GeoPoint, GeometryError};
use crate::layout::PanelLayout;
use crate::stringing::StringConfiguration;
use anyhow::{Result, ensure};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Fractional allowance for gaps between panels when seeding a grid from the roof area
pub const GRID_FILL_SPACING: f64 = 0.1;

/// Identifies a panel within a [`PlacementSet`]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
pub struct PlacementID(pub u32);

/// A single panel on the roof
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelPlacement {
    /// Unique within the owning set
    pub id: PlacementID,
    /// Where the panel's centre is
    pub position: GeoPoint,
    /// Clockwise rotation in degrees, in [0, 360)
    pub rotation: f64,
    /// The panel model
    pub panel_id: EquipmentID,
}

/// An ordered collection of placed panels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementSet {
    placements: Vec<PanelPlacement>,
    next_id: u32,
}

impl PlacementSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a panel, returning its new ID
    pub fn add(&mut self, position: GeoPoint, rotation: f64, panel_id: EquipmentID) -> PlacementID {
        let id = PlacementID(self.next_id);
        self.next_id += 1;
        self.placements.push(PanelPlacement {
            id,
            position,
            rotation: geo::normalise_degrees(rotation),
            panel_id,
        });

        id
    }

    /// Place a panel only if its position is on the roof.
    ///
    /// Returns `None` if the position lies outside the footprint.
    pub fn add_within(
        &mut self,
        footprint: &Footprint,
        position: GeoPoint,
        rotation: f64,
        panel_id: EquipmentID,
    ) -> Result<Option<PlacementID>, GeometryError> {
        if footprint.contains(position)? {
            Ok(Some(self.add(position, rotation, panel_id)))
        } else {
            Ok(None)
        }
    }

    /// Remove a panel, returning it if it was present
    pub fn remove(&mut self, id: PlacementID) -> Option<PanelPlacement> {
        let index = self.placements.iter().position(|p| p.id == id)?;
        Some(self.placements.remove(index))
    }

    /// Remove every panel. IDs are not reused afterwards.
    pub fn clear(&mut self) {
        self.placements.clear();
    }

    /// Number of placed panels
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Whether no panels have been placed
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// The panels, in the order they were placed
    pub fn placements(&self) -> &[PanelPlacement] {
        &self.placements
    }

    /// Iterate over the panels in the order they were placed
    pub fn iter(&self) -> impl Iterator<Item = &PanelPlacement> {
        self.placements.iter()
    }

    /// Create a set holding one panel at the centre of each position in a computed layout
    pub fn from_layout(layout: &PanelLayout, panel_id: &EquipmentID) -> Self {
        let mut set = Self::new();
        for position in &layout.positions {
            set.add(position.center, layout.rotation, panel_id.clone());
        }

        set
    }

    /// Replace the contents of the set with a coarse grid sized from the roof area.
    ///
    /// The number of panels is estimated as the roof area over the panel area plus a spacing
    /// allowance. A square-ish grid with at least that many cells is spread over the footprint's
    /// bounds and a panel is placed at the centre of every cell lying on the roof.
    ///
    /// # Returns
    ///
    /// The number of panels placed.
    pub fn fill_grid(
        &mut self,
        footprint: &Footprint,
        panel: &PanelSpec,
        rotation: f64,
        panel_id: &EquipmentID,
    ) -> Result<usize, GeometryError> {
        let roof_area = footprint.area()?;
        let max_panels = (roof_area / (panel.area() * (1.0 + GRID_FILL_SPACING))).floor() as u32;

        self.clear();
        if max_panels == 0 {
            return Ok(0);
        }

        let rows = f64::from(max_panels).sqrt().ceil() as u32;
        let cols = max_panels.div_ceil(rows);
        let bounds = footprint.bounds();
        let lat_span = bounds.north - bounds.south;
        let lon_span = bounds.east - bounds.west;
        for row in 0..rows {
            for col in 0..cols {
                let position = GeoPoint::new(
                    bounds.south + lat_span * (f64::from(row) + 0.5) / f64::from(rows),
                    bounds.west + lon_span * (f64::from(col) + 0.5) / f64::from(cols),
                );
                self.add_within(footprint, position, rotation, panel_id.clone())?;
            }
        }

        Ok(self.len())
    }
}

/// Thresholds for chaining panels into a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Panels must be closer than this to the previous panel in the string, in metres
    pub max_distance: f64,
    /// Panels must differ in rotation from the previous panel by less than this, in degrees
    pub max_rotation_difference: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            max_distance: 1.0,
            max_rotation_difference: 5.0,
        }
    }
}

impl GroupingConfig {
    /// Check that both thresholds are positive
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.max_distance.is_finite() && self.max_distance > 0.0,
            "Grouping max_distance must be positive"
        );
        ensure!(
            self.max_rotation_difference.is_finite() && self.max_rotation_difference > 0.0,
            "Grouping max_rotation_difference must be positive"
        );

        Ok(())
    }
}

/// Chain placed panels into strings by proximity.
///
/// The first unassigned panel seeds a string. The remaining panels are then scanned once, in
/// order, and each is appended if it is within `max_distance` of the panel most recently added to
/// the string and its rotation differs from that panel's by less than `max_rotation_difference`
/// (rotations are compared directly, so 359 and 1 degree are far apart). This repeats until all
/// panels are assigned.
///
/// This is nearest-neighbour chaining rather than true clustering: it is O(n²) in the worst case,
/// and the result depends on the order the panels were placed in. Every string is non-empty.
pub fn group_into_strings(
    placements: &[PanelPlacement],
    inverter_id: &EquipmentID,
    config: &GroupingConfig,
) -> Vec<StringConfiguration> {
    let mut remaining: Vec<&PanelPlacement> = placements.iter().collect();
    let mut strings = Vec::new();

    while !remaining.is_empty() {
        let mut chain = vec![remaining.remove(0)];
        let mut i = 0;
        while i < remaining.len() {
            let last = chain[chain.len() - 1];
            let candidate = remaining[i];
            if geo::distance(last.position, candidate.position) < config.max_distance
                && (last.rotation - candidate.rotation).abs() < config.max_rotation_difference
            {
                chain.push(remaining.remove(i));
            } else {
                i += 1;
            }
        }

        strings.push(StringConfiguration {
            placements: chain.into_iter().cloned().collect(),
            inverter_id: inverter_id.clone(),
        });
    }

    strings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{panel_spec, polygon_footprint, rectangle_footprint};
    use crate::geo::offset;
    use rstest::rstest;

    fn ids(string: &StringConfiguration) -> Vec<u32> {
        string.placements.iter().map(|p| p.id.0).collect()
    }

    #[test]
    fn test_add_remove_clear() {
        let mut set = PlacementSet::new();
        let a = set.add(GeoPoint::new(0.0, 0.0), -90.0, "panel".into());
        let b = set.add(GeoPoint::new(0.0, 0.0), 0.0, "panel".into());
        assert_ne!(a, b);
        assert_eq!(set.placements()[0].rotation, 270.0);

        assert_eq!(set.remove(a).unwrap().id, a);
        assert!(set.remove(a).is_none());
        assert_eq!(set.len(), 1);

        set.clear();
        assert!(set.is_empty());
        let c = set.add(GeoPoint::new(0.0, 0.0), 0.0, "panel".into());
        assert!(c != a && c != b);
    }

    #[rstest]
    fn test_add_within(rectangle_footprint: Footprint) {
        let mut set = PlacementSet::new();
        let inside = rectangle_footprint.center();
        let outside = offset(inside, 1000.0, 0.0);
        assert!(
            set.add_within(&rectangle_footprint, inside, 0.0, "panel".into())
                .unwrap()
                .is_some()
        );
        assert!(
            set.add_within(&rectangle_footprint, outside, 0.0, "panel".into())
                .unwrap()
                .is_none()
        );
        assert_eq!(set.len(), 1);
    }

    #[rstest]
    fn test_fill_grid(rectangle_footprint: Footprint, panel_spec: PanelSpec) {
        let mut set = PlacementSet::new();
        set.add(GeoPoint::new(0.0, 0.0), 0.0, "old".into());

        let count = set
            .fill_grid(&rectangle_footprint, &panel_spec, 0.0, &"panel".into())
            .unwrap();
        let area = rectangle_footprint.area().unwrap();
        let max_panels = (area / (panel_spec.area() * 1.1)).floor() as u32;
        let rows = f64::from(max_panels).sqrt().ceil() as u32;
        let cols = max_panels.div_ceil(rows);

        // Every cell centre of a rectangle is on the roof
        assert_eq!(count, (rows * cols) as usize);
        assert!(set.iter().all(|p| p.panel_id.to_string() == "panel"));
    }

    #[rstest]
    fn test_fill_grid_polygon(polygon_footprint: Footprint, panel_spec: PanelSpec) {
        let mut set = PlacementSet::new();
        set.fill_grid(&polygon_footprint, &panel_spec, 0.0, &"panel".into())
            .unwrap();
        assert!(!set.is_empty());
        for placement in set.iter() {
            assert!(polygon_footprint.contains(placement.position).unwrap());
        }
    }

    #[test]
    fn test_group_chains_through_neighbours() {
        // Panels 0.8 m apart in a line: each is close to the last one added
        let origin = GeoPoint::new(37.0, -122.0);
        let mut set = PlacementSet::new();
        for i in 0..4 {
            set.add(offset(origin, 0.8 * f64::from(i), 0.0), 0.0, "p".into());
        }
        let strings = group_into_strings(set.placements(), &"inv".into(), &GroupingConfig::default());
        assert_eq!(strings.len(), 1);
        assert_eq!(ids(&strings[0]), [0, 1, 2, 3]);
        assert_eq!(strings[0].inverter_id.to_string(), "inv");
    }

    #[test]
    fn test_group_rotation_threshold() {
        let origin = GeoPoint::new(37.0, -122.0);
        let mut set = PlacementSet::new();
        set.add(origin, 0.0, "p".into());
        set.add(offset(origin, 0.5, 0.0), 4.0, "p".into());
        set.add(offset(origin, 1.0, 0.0), 10.0, "p".into());
        set.add(offset(origin, 0.0, 0.5), 359.0, "p".into());

        let strings = group_into_strings(set.placements(), &"inv".into(), &GroupingConfig::default());
        let groups: Vec<_> = strings.iter().map(ids).collect();
        // No wrap-around: 359 degrees is not close to 0
        assert_eq!(groups, [vec![0, 1], vec![2], vec![3]]);
    }

    #[test]
    fn test_group_order_dependent() {
        // A and C are both within reach of B, but not of each other
        let origin = GeoPoint::new(37.0, -122.0);
        let a = origin;
        let b = offset(origin, 0.9, 0.0);
        let c = offset(origin, 1.8, 0.0);
        let config = GroupingConfig::default();

        let mut forward = PlacementSet::new();
        for p in [a, c, b] {
            forward.add(p, 0.0, "p".into());
        }
        // A seeds; C is too far from A so is skipped; B is absorbed; C is not revisited
        let groups: Vec<_> = group_into_strings(forward.placements(), &"inv".into(), &config)
            .iter()
            .map(ids)
            .collect();
        assert_eq!(groups, [vec![0, 2], vec![1]]);

        let mut reordered = PlacementSet::new();
        for p in [a, b, c] {
            reordered.add(p, 0.0, "p".into());
        }
        let groups: Vec<_> = group_into_strings(reordered.placements(), &"inv".into(), &config)
            .iter()
            .map(ids)
            .collect();
        assert_eq!(groups, [vec![0, 1, 2]]);
    }

    #[test]
    fn test_group_empty() {
        assert!(group_into_strings(&[], &"inv".into(), &GroupingConfig::default()).is_empty());
    }
}
