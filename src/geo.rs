//! Geodesy on a spherical earth.
//!
//! Provides great-circle distances, spherical polygon areas, initial bearings, point-in-polygon
//! tests and a flat-earth offset used for placing panels on a single roof. Coordinates are
//! latitude/longitude pairs in degrees with no datum correction.
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use thiserror::Error;

/// Radius of the spherical earth model, in metres
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Metres spanned by one degree of latitude on the spherical earth model
pub const METRES_PER_DEGREE: f64 = EARTH_RADIUS * PI / 180.0;

/// A point on the earth's surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lon: f64,
}

impl GeoPoint {
    /// Create a new point from latitude and longitude in degrees
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check that the coordinates are finite and within range
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
        {
            Ok(())
        } else {
            Err(GeometryError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            })
        }
    }
}

/// A malformed or degenerate roof footprint
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// Polygon rings need at least three distinct vertices
    #[error("A polygon needs at least 3 vertices, but {0} were given")]
    TooFewVertices(usize),
    /// The footprint encloses no area
    #[error("The footprint has zero area")]
    ZeroArea,
    /// Rectangle bounds with north below south or east below west
    #[error(
        "Rectangle bounds are inverted (north {north}, south {south}, east {east}, west {west})"
    )]
    InvertedBounds {
        /// Northern edge latitude
        north: f64,
        /// Southern edge latitude
        south: f64,
        /// Eastern edge longitude
        east: f64,
        /// Western edge longitude
        west: f64,
    },
    /// A coordinate outside the valid latitude/longitude range
    #[error("Invalid coordinate: latitude {lat}, longitude {lon}")]
    InvalidCoordinate {
        /// Latitude in degrees
        lat: f64,
        /// Longitude in degrees
        lon: f64,
    },
}

/// Strip a duplicated closing vertex from a ring and check there are enough vertices left
fn open_ring(ring: &[GeoPoint]) -> Result<&[GeoPoint], GeometryError> {
    let ring = match ring {
        [first, .., last] if ring.len() > 3 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    };
    if ring.len() < 3 {
        return Err(GeometryError::TooFewVertices(ring.len()));
    }

    Ok(ring)
}

/// Great-circle distance between two points in metres, using the haversine formula.
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = (b.lon - a.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Initial compass heading from `a` to `b`, in degrees within [0, 360).
pub fn bearing(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    normalise_degrees(y.atan2(x).to_degrees())
}

/// Wrap an angle in degrees into [0, 360)
pub fn normalise_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed area of the polar triangle formed by an edge and the north pole
fn polar_triangle_area(tan1: f64, lon1: f64, tan2: f64, lon2: f64) -> f64 {
    let d_lon = lon1 - lon2;
    let t = tan1 * tan2;
    2.0 * (t * d_lon.sin()).atan2(1.0 + t * d_lon.cos())
}

/// Area enclosed by a ring on the sphere, in square metres.
///
/// Computed as the sum of the spherical excesses of the polar triangles spanned by each edge, so
/// the result does not depend on the ring's winding direction.
pub fn area(ring: &[GeoPoint]) -> Result<f64, GeometryError> {
    let ring = open_ring(ring)?;

    let tan_lat = |p: &GeoPoint| ((FRAC_PI_2 - p.lat.to_radians()) / 2.0).tan();
    let prev = ring[ring.len() - 1];
    let mut prev_tan = tan_lat(&prev);
    let mut prev_lon = prev.lon.to_radians();
    let mut total = 0.0;
    for point in ring {
        let tan = tan_lat(point);
        let lon = point.lon.to_radians();
        total += polar_triangle_area(tan, lon, prev_tan, prev_lon);
        prev_tan = tan;
        prev_lon = lon;
    }

    Ok((total * EARTH_RADIUS * EARTH_RADIUS).abs())
}

/// Whether `point` lies inside `ring`, using ray casting in latitude/longitude space.
///
/// Points exactly on an edge may be reported either way.
pub fn point_in_polygon(point: GeoPoint, ring: &[GeoPoint]) -> Result<bool, GeometryError> {
    let ring = open_ring(ring)?;

    let mut inside = false;
    let mut j = ring.len() - 1;
    for (i, pi) in ring.iter().enumerate() {
        let pj = ring[j];
        if (pi.lat > point.lat) != (pj.lat > point.lat) {
            let crossing = (pj.lon - pi.lon) * (point.lat - pi.lat) / (pj.lat - pi.lat) + pi.lon;
            if point.lon < crossing {
                inside = !inside;
            }
        }
        j = i;
    }

    Ok(inside)
}

/// Move a point by a small east/north displacement in metres.
///
/// Uses a flat-earth approximation which is only valid at the scale of a single roof.
pub fn offset(origin: GeoPoint, east: f64, north: f64) -> GeoPoint {
    GeoPoint {
        lat: origin.lat + north / METRES_PER_DEGREE,
        lon: origin.lon + east / (METRES_PER_DEGREE * origin.lat.to_radians().cos()),
    }
}

/// The east/north displacement in metres from `origin` to `point`, the inverse of [`offset`]
pub fn local_offset(origin: GeoPoint, point: GeoPoint) -> (f64, f64) {
    (
        (point.lon - origin.lon) * METRES_PER_DEGREE * origin.lat.to_radians().cos(),
        (point.lat - origin.lat) * METRES_PER_DEGREE,
    )
}
