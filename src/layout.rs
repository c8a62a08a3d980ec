//! Automatic tiling of a roof footprint with panels.
//!
//! The footprint's bounds are measured in metres and reduced by the edge setback. The remaining
//! rectangle is filled with a regular grid of panels, with rows separated far enough that one row
//! does not shade the next on the winter solstice. The grid is centred on the footprint and turned
//! to face the roof azimuth. A panel is kept only if it lies wholly on the roof and every one of its
//! sides keeps the setback distance from every roof edge.
use crate::equipment::PanelSpec;
use crate::footprint::Footprint;
use crate::geo::{self, GeoPoint, GeometryError};
use anyhow::{Result, ensure};
use log::debug;
use serde::{Deserialize, Serialize};

/// Approximate solar declination at the winter solstice, in degrees
pub const WINTER_SOLSTICE_DECLINATION: f64 = -23.45;

/// Multiplier applied to the solstice shadow length when spacing rows
pub const ROW_SPACING_BUFFER: f64 = 1.1;

/// Slack allowed when comparing a panel's clearance with the edge setback, in metres
const SETBACK_TOLERANCE: f64 = 1e-3;

/// A point in a flat east/north frame centred on the roof, in metres
type LocalPoint = (f64, f64);

/// Tunable parameters for the layout engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Gap between adjacent panels in a row, in metres
    pub panel_spacing: f64,
    /// Clearance from each roof edge, in metres
    pub edge_setback: f64,
    /// Minimum gap between rows, in metres
    pub row_spacing: f64,
    /// If set, used as the gap between rows instead of the solstice calculation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_spacing_override: Option<f64>,
    /// Rows with fewer panels than this are left empty
    pub min_row_length: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            panel_spacing: 0.025,
            edge_setback: 0.5,
            row_spacing: 0.4,
            row_spacing_override: None,
            min_row_length: 2,
        }
    }
}

impl LayoutConfig {
    /// Check that all distances are finite and non-negative
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("panel_spacing", Some(self.panel_spacing)),
            ("edge_setback", Some(self.edge_setback)),
            ("row_spacing", Some(self.row_spacing)),
            ("row_spacing_override", self.row_spacing_override),
        ] {
            if let Some(value) = value {
                ensure!(
                    value.is_finite() && value >= 0.0,
                    "Layout parameter {name} must be a non-negative number"
                );
            }
        }

        Ok(())
    }
}

/// The tilt and facing of a roof plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoofOrientation {
    /// Tilt from horizontal, in degrees
    pub pitch: f64,
    /// Compass direction the roof faces, in degrees (180 = due south)
    pub azimuth: f64,
}

impl RoofOrientation {
    /// Check the pitch is in [0, 90) and the azimuth in [0, 360]
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..90.0).contains(&self.pitch),
            "Roof pitch must be at least 0 and less than 90 degrees"
        );
        ensure!(
            (0.0..=360.0).contains(&self.azimuth),
            "Roof azimuth must be between 0 and 360 degrees"
        );

        Ok(())
    }
}

/// A panel accepted by the layout engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutPosition {
    /// Grid row, counted from the back of the roof
    pub row: u32,
    /// Grid column, counted from the left when facing the roof
    pub column: u32,
    /// The panel's upper-left corner
    pub anchor: GeoPoint,
    /// The panel's centre
    pub center: GeoPoint,
}

/// The result of tiling a footprint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelLayout {
    /// Number of panels placed
    pub total_panels: usize,
    /// Columns in the grid
    pub panels_per_row: u32,
    /// Rows in the grid
    pub number_of_rows: u32,
    /// The accepted panels, in row-major order
    pub positions: Vec<LayoutPosition>,
    /// Gap between rows, in metres
    pub row_spacing: f64,
    /// Gap between panels in a row, in metres
    pub panel_spacing: f64,
    /// Angle the grid was turned clockwise from due south, in degrees
    pub rotation: f64,
    /// Plan-view panel area divided by footprint area
    pub coverage: f64,
    /// Footprint width after setbacks, in metres
    pub usable_width: f64,
    /// Footprint length after setbacks, in metres
    pub usable_length: f64,
}

/// Minimum solar elevation at noon on the winter solstice, in degrees.
///
/// This is the simplified `90 - latitude - declination`, without a full solar position model.
/// The absolute latitude is used so that southern sites behave like their northern mirror.
pub fn winter_solstice_elevation(latitude: f64) -> f64 {
    90.0 - latitude.abs() - WINTER_SOLSTICE_DECLINATION
}

/// Gap needed between rows so the front row's shadow clears the next.
///
/// # Arguments
///
/// * `panel_height` - Panel length up the roof slope, in metres
/// * `pitch` - Roof pitch in degrees
/// * `latitude` - Site latitude in degrees
/// * `config` - Layout parameters
///
/// # Returns
///
/// The override from `config` if present, otherwise the solstice shadow length plus a buffer,
/// never less than the configured minimum.
pub fn row_spacing(panel_height: f64, pitch: f64, latitude: f64, config: &LayoutConfig) -> f64 {
    if let Some(spacing) = config.row_spacing_override {
        return spacing;
    }

    let elevation = winter_solstice_elevation(latitude).to_radians();
    let shadow = panel_height * pitch.to_radians().sin() / elevation.tan();
    let spacing = shadow * ROW_SPACING_BUFFER;
    if spacing.is_finite() && spacing > config.row_spacing {
        spacing
    } else {
        config.row_spacing
    }
}

/// Rotate a local east/north offset clockwise by `angle` degrees
fn rotate(east: f64, north: f64, angle: f64) -> (f64, f64) {
    let (sin, cos) = angle.to_radians().sin_cos();
    (east * cos + north * sin, north * cos - east * sin)
}

fn cross(origin: LocalPoint, a: LocalPoint, b: LocalPoint) -> f64 {
    (a.0 - origin.0) * (b.1 - origin.1) - (a.1 - origin.1) * (b.0 - origin.0)
}

fn point_segment_distance(point: LocalPoint, start: LocalPoint, end: LocalPoint) -> f64 {
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length_squared = dx * dx + dy * dy;
    let along = if length_squared > 0.0 {
        (((point.0 - start.0) * dx + (point.1 - start.1) * dy) / length_squared).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (point.0 - start.0 - along * dx).hypot(point.1 - start.1 - along * dy)
}

/// Shortest distance between two segments, zero if they cross
fn segment_distance(first: (LocalPoint, LocalPoint), second: (LocalPoint, LocalPoint)) -> f64 {
    let (a, b) = first;
    let (c, d) = second;
    let crosses = cross(a, b, c) * cross(a, b, d) < 0.0 && cross(c, d, a) * cross(c, d, b) < 0.0;
    if crosses {
        return 0.0;
    }

    point_segment_distance(a, c, d)
        .min(point_segment_distance(b, c, d))
        .min(point_segment_distance(c, a, b))
        .min(point_segment_distance(d, a, b))
}

/// Smallest distance from the outline of a panel to any edge of the roof
fn edge_clearance(corners: &[LocalPoint; 4], ring: &[LocalPoint]) -> f64 {
    let mut clearance = f64::INFINITY;
    for (i, &corner) in corners.iter().enumerate() {
        let next = corners[(i + 1) % corners.len()];
        for (j, &vertex) in ring.iter().enumerate() {
            let following = ring[(j + 1) % ring.len()];
            clearance = clearance.min(segment_distance((corner, next), (vertex, following)));
        }
    }

    clearance
}

/// Fill a footprint with as many panels as fit.
///
/// # Arguments
///
/// * `footprint` - The roof outline
/// * `panel` - The panel to place
/// * `orientation` - Roof pitch and azimuth
/// * `latitude` - Site latitude, used for row spacing
/// * `config` - Layout parameters
///
/// # Returns
///
/// The layout, which is empty if the setbacks leave no usable space, or an error if the footprint
/// is malformed.
pub fn calculate_optimal_layout(
    footprint: &Footprint,
    panel: &PanelSpec,
    orientation: RoofOrientation,
    latitude: f64,
    config: &LayoutConfig,
) -> Result<PanelLayout, GeometryError> {
    footprint.validate()?;

    let bounds = footprint.bounds();
    let usable_width = bounds.width() - 2.0 * config.edge_setback;
    let usable_length = bounds.length() - 2.0 * config.edge_setback;
    let effective_height = panel.height * orientation.pitch.to_radians().cos();
    let row_spacing = row_spacing(panel.height, orientation.pitch, latitude, config);
    let rotation = orientation.azimuth - 180.0;

    let column_step = panel.width + config.panel_spacing;
    let row_step = effective_height + row_spacing;
    let (panels_per_row, number_of_rows) = if usable_width > 0.0 && usable_length > 0.0 {
        (
            (usable_width / column_step).floor() as u32,
            (usable_length / row_step).floor() as u32,
        )
    } else {
        (0, 0)
    };

    // Upper-left corner of the grid, relative to the centre of the bounds
    let grid_width = f64::from(panels_per_row) * column_step - config.panel_spacing;
    let grid_length = f64::from(number_of_rows) * row_step - row_spacing;
    let origin = (-grid_width / 2.0, grid_length / 2.0);
    let center = bounds.center();
    let to_local = |east: f64, north: f64| rotate(east, north, rotation);
    let to_geo = |east: f64, north: f64| {
        let (east, north) = to_local(east, north);
        geo::offset(center, east, north)
    };

    let ring = footprint.ring();
    let local_ring: Vec<LocalPoint> = ring
        .iter()
        .map(|&vertex| geo::local_offset(center, vertex))
        .collect();
    let mut positions = Vec::new();
    let mut row_counts = vec![0u32; number_of_rows as usize];
    for row in 0..number_of_rows {
        for column in 0..panels_per_row {
            let left = origin.0 + f64::from(column) * column_step;
            let top = origin.1 - f64::from(row) * row_step;
            let outline = [
                (left, top),
                (left + panel.width, top),
                (left + panel.width, top - effective_height),
                (left, top - effective_height),
            ];
            let corners = outline.map(|(east, north)| to_geo(east, north));

            let mut on_roof = true;
            for corner in corners {
                if !geo::point_in_polygon(corner, &ring)? {
                    on_roof = false;
                    break;
                }
            }
            if !on_roof {
                continue;
            }

            let local_outline = outline.map(|(east, north)| to_local(east, north));
            let clearance = edge_clearance(&local_outline, &local_ring);
            if clearance + SETBACK_TOLERANCE < config.edge_setback {
                continue;
            }

            row_counts[row as usize] += 1;
            positions.push(LayoutPosition {
                row,
                column,
                anchor: corners[0],
                center: to_geo(
                    left + panel.width / 2.0,
                    top - effective_height / 2.0,
                ),
            });
        }
    }

    // Drop rows too short to be worth racking
    positions.retain(|p| row_counts[p.row as usize] >= config.min_row_length);

    let footprint_area = footprint.area()?;
    let coverage = positions.len() as f64 * panel.width * effective_height / footprint_area;
    debug!(
        "Layout: {} panels in a {number_of_rows}x{panels_per_row} grid, row spacing {row_spacing:.3} m",
        positions.len()
    );

    Ok(PanelLayout {
        total_panels: positions.len(),
        panels_per_row,
        number_of_rows,
        positions,
        row_spacing,
        panel_spacing: config.panel_spacing,
        rotation,
        coverage,
        usable_width: usable_width.max(0.0),
        usable_length: usable_length.max(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{panel_spec, polygon_footprint, rectangle_footprint};
    use crate::footprint::Bounds;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    const SOUTH: RoofOrientation = RoofOrientation {
        pitch: 30.0,
        azimuth: 180.0,
    };

    fn layout(footprint: &Footprint, panel: &PanelSpec, orientation: RoofOrientation) -> PanelLayout {
        let latitude = footprint.center().lat;
        calculate_optimal_layout(
            footprint,
            panel,
            orientation,
            latitude,
            &LayoutConfig::default(),
        )
        .unwrap()
    }

    /// Every corner of every panel must be on the roof and clear of each edge by the setback
    fn assert_all_on_roof(
        footprint: &Footprint,
        panel: &PanelSpec,
        orientation: RoofOrientation,
        layout: &PanelLayout,
    ) {
        let ring = footprint.ring();
        let center = footprint.center();
        let local_ring: Vec<LocalPoint> = ring
            .iter()
            .map(|&vertex| geo::local_offset(center, vertex))
            .collect();
        let height = panel.height * orientation.pitch.to_radians().cos();
        let setback = LayoutConfig::default().edge_setback;

        for position in &layout.positions {
            let anchor = geo::local_offset(center, position.anchor);
            let corners = [(0.0, 0.0), (panel.width, 0.0), (panel.width, -height), (0.0, -height)]
                .map(|(east, north)| {
                    let (east, north) = rotate(east, north, layout.rotation);
                    (anchor.0 + east, anchor.1 + north)
                });

            for &(east, north) in &corners {
                let corner = geo::offset(center, east, north);
                assert!(geo::point_in_polygon(corner, &ring).unwrap());
                for (j, &vertex) in local_ring.iter().enumerate() {
                    let following = local_ring[(j + 1) % local_ring.len()];
                    let distance = point_segment_distance((east, north), vertex, following);
                    assert!(
                        distance > setback - 0.01,
                        "panel ({}, {}) corner is {distance:.3} m from the roof edge",
                        position.row,
                        position.column
                    );
                }
            }
            assert!(edge_clearance(&corners, &local_ring) > setback - 0.01);
        }
        assert!((0.0..=1.0).contains(&layout.coverage));
        let footprint_area = footprint.area().unwrap();
        assert!(layout.total_panels as f64 * panel.area() <= footprint_area);
    }

    #[rstest]
    fn test_layout_rectangle(rectangle_footprint: Footprint, panel_spec: PanelSpec) {
        let layout = layout(&rectangle_footprint, &panel_spec, SOUTH);
        assert_eq!(layout.panels_per_row, 9);
        assert_eq!(layout.number_of_rows, 9);
        assert_eq!(layout.total_panels, 81);
        assert_eq!(layout.row_spacing, 0.4);
        assert_eq!(layout.rotation, 0.0);
        assert_all_on_roof(&rectangle_footprint, &panel_spec, SOUTH, &layout);
    }

    #[rstest]
    fn test_layout_deterministic(polygon_footprint: Footprint, panel_spec: PanelSpec) {
        let orientation = RoofOrientation {
            pitch: 25.0,
            azimuth: 200.0,
        };
        assert_eq!(
            layout(&polygon_footprint, &panel_spec, orientation),
            layout(&polygon_footprint, &panel_spec, orientation)
        );
    }

    #[rstest]
    fn test_layout_polygon(polygon_footprint: Footprint, panel_spec: PanelSpec) {
        let layout = layout(&polygon_footprint, &panel_spec, SOUTH);
        assert!(layout.total_panels > 0);
        assert!(layout.total_panels < (layout.panels_per_row * layout.number_of_rows) as usize);
        assert_all_on_roof(&polygon_footprint, &panel_spec, SOUTH, &layout);
    }

    #[rstest]
    #[case(90.0)]
    #[case(135.0)]
    #[case(225.0)]
    #[case(300.0)]
    fn test_layout_rotated(
        rectangle_footprint: Footprint,
        panel_spec: PanelSpec,
        #[case] azimuth: f64,
    ) {
        let orientation = RoofOrientation {
            pitch: 30.0,
            azimuth,
        };
        let rotated = layout(&rectangle_footprint, &panel_spec, orientation);
        assert_approx_eq!(f64, rotated.rotation, azimuth - 180.0);
        assert!(rotated.total_panels <= layout(&rectangle_footprint, &panel_spec, SOUTH).total_panels);
        assert_all_on_roof(&rectangle_footprint, &panel_spec, orientation, &rotated);
    }

    #[rstest]
    #[case(160.0)]
    #[case(200.0)]
    #[case(225.0)]
    fn test_layout_polygon_rotated_keeps_setback(
        polygon_footprint: Footprint,
        panel_spec: PanelSpec,
        #[case] azimuth: f64,
    ) {
        let orientation = RoofOrientation {
            pitch: 25.0,
            azimuth,
        };
        let layout = layout(&polygon_footprint, &panel_spec, orientation);
        assert!(layout.total_panels > 0);
        assert_all_on_roof(&polygon_footprint, &panel_spec, orientation, &layout);
    }

    #[test]
    fn test_edge_clearance() {
        let square = [(0.0, 0.0), (1.0, 0.0), (1.0, -1.0), (0.0, -1.0)];
        let ring = [(-2.0, 2.0), (4.0, 2.0), (4.0, -3.0), (-2.0, -3.0)];
        assert_approx_eq!(f64, edge_clearance(&square, &ring), 2.0);

        // A notch whose tip pokes between the panel's corners
        let notched = [
            (-2.0, 2.0),
            (0.5, 2.0),
            (0.5, -0.5),
            (0.6, 2.0),
            (4.0, 2.0),
            (4.0, -3.0),
            (-2.0, -3.0),
        ];
        assert_eq!(edge_clearance(&square, &notched), 0.0);
    }

    #[rstest]
    fn test_layout_setback_too_large(rectangle_footprint: Footprint, panel_spec: PanelSpec) {
        let config = LayoutConfig {
            edge_setback: 10.0,
            ..LayoutConfig::default()
        };
        let layout =
            calculate_optimal_layout(&rectangle_footprint, &panel_spec, SOUTH, 37.0, &config)
                .unwrap();
        assert_eq!(layout.total_panels, 0);
        assert!(layout.positions.is_empty());
        assert_eq!(layout.coverage, 0.0);
        assert_eq!(layout.usable_length, 0.0);
    }

    #[rstest]
    fn test_layout_short_rows_dropped(panel_spec: PanelSpec) {
        // About 3 m wide, so only one panel fits per row
        let footprint = Footprint::Rectangle(Bounds {
            north: 37.0001,
            south: 37.0,
            east: -121.999_966,
            west: -122.0,
        });
        let layout = layout(&footprint, &panel_spec, SOUTH);
        assert_eq!(layout.panels_per_row, 1);
        assert!(layout.number_of_rows > 0);
        assert_eq!(layout.total_panels, 0);
    }

    #[rstest]
    fn test_layout_invalid_footprint(panel_spec: PanelSpec) {
        let footprint = Footprint::Polygon {
            vertices: vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0)],
        };
        assert_eq!(
            calculate_optimal_layout(&footprint, &panel_spec, SOUTH, 0.0, &LayoutConfig::default()),
            Err(GeometryError::TooFewVertices(2))
        );
    }

    #[rstest]
    #[case(0.0, 40.0, 0.4)] // Flat roof falls back to the minimum
    #[case(30.0, 30.0, 0.4)] // High sun: shadow shorter than the minimum
    #[case(30.0, 60.0, 0.407_721_838_423_934_2)]
    #[case(30.0, 70.0, 0.580_592_946_027_941_2)]
    #[case(30.0, -70.0, 0.580_592_946_027_941_2)]
    #[case(45.0, 0.0, 0.4)] // Elevation above 90 degrees gives a negative shadow
    fn test_row_spacing(#[case] pitch: f64, #[case] latitude: f64, #[case] expected: f64) {
        let spacing = row_spacing(1.0, pitch, latitude, &LayoutConfig::default());
        assert_approx_eq!(f64, spacing, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_row_spacing_override() {
        let config = LayoutConfig {
            row_spacing_override: Some(0.1),
            ..LayoutConfig::default()
        };
        assert_eq!(row_spacing(1.0, 30.0, 60.0, &config), 0.1);
    }

    #[test]
    fn test_winter_solstice_elevation_is_simplified() {
        // The noon elevation approximation, not a full solar position calculation
        assert_approx_eq!(f64, winter_solstice_elevation(40.0), 73.45);
        assert_approx_eq!(f64, winter_solstice_elevation(-40.0), 73.45);
    }

    #[test]
    fn test_config_validate() {
        LayoutConfig::default().validate().unwrap();
        let config = LayoutConfig {
            row_spacing_override: Some(f64::NAN),
            ..LayoutConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
