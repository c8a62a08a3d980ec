//! Roof footprints drawn by the user, either as axis-aligned bounds or as free polygons.
use crate::geo::{self, GeoPoint, GeometryError};
use serde::{Deserialize, Serialize};

/// Footprints enclosing less than this many square metres are treated as degenerate
const MIN_AREA: f64 = 1e-2;

/// The latitude/longitude bounds of a rectangular roof
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Latitude of the northern edge
    pub north: f64,
    /// Latitude of the southern edge
    pub south: f64,
    /// Longitude of the eastern edge
    pub east: f64,
    /// Longitude of the western edge
    pub west: f64,
}

impl Bounds {
    /// The four corners, anticlockwise from the south-west
    pub fn corners(&self) -> [GeoPoint; 4] {
        [
            GeoPoint::new(self.south, self.west),
            GeoPoint::new(self.south, self.east),
            GeoPoint::new(self.north, self.east),
            GeoPoint::new(self.north, self.west),
        ]
    }

    /// The midpoint of the bounds
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }

    /// East-west extent in metres, measured along the central latitude
    pub fn width(&self) -> f64 {
        let lat = self.center().lat;
        geo::distance(GeoPoint::new(lat, self.west), GeoPoint::new(lat, self.east))
    }

    /// North-south extent in metres
    pub fn length(&self) -> f64 {
        let lon = self.center().lon;
        geo::distance(
            GeoPoint::new(self.south, lon),
            GeoPoint::new(self.north, lon),
        )
    }
}

/// A snapshot of a roof outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Footprint {
    /// An axis-aligned rectangle
    Rectangle(Bounds),
    /// An arbitrary simple polygon
    Polygon {
        /// The vertices of the ring, in order. A repeated closing vertex is allowed.
        vertices: Vec<GeoPoint>,
    },
}

impl Footprint {
    /// The outline of the footprint as a ring of points
    pub fn ring(&self) -> Vec<GeoPoint> {
        match self {
            Self::Rectangle(bounds) => bounds.corners().to_vec(),
            Self::Polygon { vertices } => vertices.clone(),
        }
    }

    /// The smallest bounds enclosing the footprint
    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Rectangle(bounds) => *bounds,
            Self::Polygon { vertices } => vertices.iter().fold(
                Bounds {
                    north: f64::NEG_INFINITY,
                    south: f64::INFINITY,
                    east: f64::NEG_INFINITY,
                    west: f64::INFINITY,
                },
                |b, p| Bounds {
                    north: b.north.max(p.lat),
                    south: b.south.min(p.lat),
                    east: b.east.max(p.lon),
                    west: b.west.min(p.lon),
                },
            ),
        }
    }

    /// The centre of the footprint's bounds
    pub fn center(&self) -> GeoPoint {
        self.bounds().center()
    }

    /// Area enclosed by the footprint in square metres
    pub fn area(&self) -> Result<f64, GeometryError> {
        geo::area(&self.ring())
    }

    /// Whether a point lies on the roof
    pub fn contains(&self, point: GeoPoint) -> Result<bool, GeometryError> {
        geo::point_in_polygon(point, &self.ring())
    }

    /// Check that the footprint is well formed and encloses some area
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Self::Rectangle(b) if b.north < b.south || b.east < b.west => {
                return Err(GeometryError::InvertedBounds {
                    north: b.north,
                    south: b.south,
                    east: b.east,
                    west: b.west,
                });
            }
            _ => {}
        }

        let ring = self.ring();
        for point in &ring {
            point.validate()?;
        }
        if geo::area(&ring)? < MIN_AREA {
            return Err(GeometryError::ZeroArea);
        }

        Ok(())
    }

    /// The longest edge of the outline, as its start and end points
    pub fn dominant_edge(&self) -> Result<(GeoPoint, GeoPoint), GeometryError> {
        let ring = self.ring();
        if ring.len() < 3 {
            return Err(GeometryError::TooFewVertices(ring.len()));
        }

        let edges = ring.iter().zip(ring.iter().cycle().skip(1));
        let mut longest = (ring[0], ring[1]);
        let mut longest_len = f64::NEG_INFINITY;
        for (a, b) in edges {
            let len = geo::distance(*a, *b);
            if len > longest_len {
                longest = (*a, *b);
                longest_len = len;
            }
        }

        Ok(longest)
    }

    /// Guess the direction the roof faces from the outline.
    ///
    /// The roof is assumed to face perpendicular to its longest edge. Of the two perpendiculars,
    /// the one facing the equator is chosen (south in the northern hemisphere, north in the
    /// southern).
    pub fn infer_azimuth(&self) -> Result<f64, GeometryError> {
        let (a, b) = self.dominant_edge()?;
        let heading = geo::bearing(a, b);
        let candidates = [
            geo::normalise_degrees(heading + 90.0),
            geo::normalise_degrees(heading - 90.0),
        ];
        let target = if self.center().lat >= 0.0 { 180.0 } else { 0.0 };

        let azimuth = if angular_difference(candidates[0], target)
            <= angular_difference(candidates[1], target)
        {
            candidates[0]
        } else {
            candidates[1]
        };

        Ok(azimuth)
    }
}

/// The smallest absolute difference between two compass headings, in degrees
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs().rem_euclid(360.0);
    diff.min(360.0 - diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{polygon_footprint, rectangle_footprint};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_rectangle_ring_and_bounds(rectangle_footprint: Footprint) {
        let ring = rectangle_footprint.ring();
        assert_eq!(ring.len(), 4);
        let Footprint::Rectangle(bounds) = &rectangle_footprint else {
            panic!("Expected a rectangle");
        };
        assert_eq!(rectangle_footprint.bounds(), *bounds);
        assert!(rectangle_footprint.contains(bounds.center()).unwrap());
    }

    #[rstest]
    fn test_polygon_bounds(polygon_footprint: Footprint) {
        let bounds = polygon_footprint.bounds();
        for p in polygon_footprint.ring() {
            assert!(p.lat <= bounds.north && p.lat >= bounds.south);
            assert!(p.lon <= bounds.east && p.lon >= bounds.west);
        }
    }

    #[rstest]
    fn test_rectangle_dimensions(rectangle_footprint: Footprint) {
        let bounds = rectangle_footprint.bounds();
        let area = rectangle_footprint.area().unwrap();
        assert_approx_eq!(f64, area, bounds.width() * bounds.length(), epsilon = 0.5);
    }

    #[test]
    fn test_validate_inverted_bounds() {
        let footprint = Footprint::Rectangle(Bounds {
            north: 10.0,
            south: 10.001,
            east: 20.001,
            west: 20.0,
        });
        assert!(matches!(
            footprint.validate(),
            Err(GeometryError::InvertedBounds { .. })
        ));
    }

    #[test]
    fn test_validate_zero_area() {
        let footprint = Footprint::Polygon {
            vertices: vec![
                GeoPoint::new(10.0, 20.0),
                GeoPoint::new(10.0001, 20.0),
                GeoPoint::new(10.0002, 20.0),
            ],
        };
        assert_eq!(footprint.validate(), Err(GeometryError::ZeroArea));

        let flat = Footprint::Rectangle(Bounds {
            north: 10.0,
            south: 10.0,
            east: 20.001,
            west: 20.0,
        });
        assert_eq!(flat.validate(), Err(GeometryError::ZeroArea));
    }

    #[test]
    fn test_validate_too_few_vertices() {
        let footprint = Footprint::Polygon {
            vertices: vec![GeoPoint::new(10.0, 20.0), GeoPoint::new(10.1, 20.0)],
        };
        assert_eq!(footprint.validate(), Err(GeometryError::TooFewVertices(2)));
    }

    #[rstest]
    fn test_validate_ok(rectangle_footprint: Footprint, polygon_footprint: Footprint) {
        rectangle_footprint.validate().unwrap();
        polygon_footprint.validate().unwrap();
    }

    #[rstest]
    #[case(37.0, 180.0)]
    #[case(-33.0, 0.0)]
    fn test_infer_azimuth_wide_rectangle(#[case] lat: f64, #[case] expected: f64) {
        // Wider east-west than north-south, so the long edges run east-west
        let footprint = Footprint::Rectangle(Bounds {
            north: lat + 0.00005,
            south: lat,
            east: 0.0002,
            west: 0.0,
        });
        assert_approx_eq!(
            f64,
            angular_difference(footprint.infer_azimuth().unwrap(), expected),
            0.0,
            epsilon = 0.01
        );
    }

    #[test]
    fn test_infer_azimuth_tall_rectangle() {
        // Long edges run north-south, so the roof faces east or west (tie goes to the first)
        let footprint = Footprint::Rectangle(Bounds {
            north: 37.0002,
            south: 37.0,
            east: 0.00005,
            west: 0.0,
        });
        let azimuth = footprint.infer_azimuth().unwrap();
        assert!(
            angular_difference(azimuth, 90.0) < 0.1 || angular_difference(azimuth, 270.0) < 0.1
        );
    }

    #[rstest]
    #[case(350.0, 10.0, 20.0)]
    #[case(10.0, 350.0, 20.0)]
    #[case(90.0, 270.0, 180.0)]
    #[case(45.0, 45.0, 0.0)]
    fn test_angular_difference(#[case] a: f64, #[case] b: f64, #[case] expected: f64) {
        assert_approx_eq!(f64, angular_difference(a, b), expected);
    }
}
