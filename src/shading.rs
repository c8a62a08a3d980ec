//! Shading analysis.
//!
//! Sun positions use a simplified declination and hour-angle model. Obstacle occlusion is not
//! modelled yet: [`obstacle_shading`] always reports an unshaded panel.
use crate::geo::GeoPoint;
use serde::Serialize;

/// Axial tilt used for the solar declination, in degrees
const MAX_DECLINATION: f64 = 23.45;

/// Day of the year on which the declination crosses zero (spring equinox)
const EQUINOX_DAY: f64 = 81.0;

/// Degrees the sun moves per hour
const DEGREES_PER_HOUR: f64 = 15.0;

/// Hours per day of analysis
pub const HOURS_PER_DAY: u32 = 24;

/// Position of the sun in the sky
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SunPosition {
    /// Compass direction in degrees, clockwise from north
    pub azimuth: f64,
    /// Height above the horizon in degrees
    pub elevation: f64,
}

/// Approximate sun position at `point` for the given day of year (1-366) and hour of day (0-23)
pub fn sun_position(point: GeoPoint, day_of_year: u32, hour: u32) -> SunPosition {
    let latitude = point.lat.to_radians();
    let declination = (MAX_DECLINATION
        * (360.0 / 365.0 * (f64::from(day_of_year) - EQUINOX_DAY))
            .to_radians()
            .sin())
    .to_radians();
    let hour_angle = ((f64::from(hour) - 12.0) * DEGREES_PER_HOUR).to_radians();

    let elevation = (latitude.sin() * declination.sin()
        + latitude.cos() * declination.cos() * hour_angle.cos())
    .asin();
    let azimuth = hour_angle
        .sin()
        .atan2(hour_angle.cos() * latitude.sin() - declination.tan() * latitude.cos());

    SunPosition {
        azimuth: azimuth.to_degrees() + 180.0,
        elevation: elevation.to_degrees(),
    }
}

/// Fraction (0-1) of a panel at `position` shaded by `obstacles` with the sun at `sun`.
///
/// Always zero: occlusion is not modelled.
pub fn obstacle_shading(_position: GeoPoint, _sun: SunPosition, _obstacles: &[Vec<GeoPoint>]) -> f64 {
    0.0
}

/// Shading of a single panel over a day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelShading {
    /// Where the panel is
    pub position: GeoPoint,
    /// Shaded fraction for each hour of the day
    pub hourly: Vec<f64>,
    /// Mean of the hourly values
    pub average: f64,
}

/// Shading of all panels in a design
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadingAnalysis {
    /// Per-panel results, in input order
    pub panels: Vec<PanelShading>,
    /// Mean shaded fraction across all panels, zero if there are none
    pub total_shading_loss: f64,
}

/// Compute hourly shading for each panel position on the given day of the year
pub fn analyse_shading(
    positions: &[GeoPoint],
    obstacles: &[Vec<GeoPoint>],
    day_of_year: u32,
) -> ShadingAnalysis {
    let panels: Vec<_> = positions
        .iter()
        .map(|&position| {
            let hourly: Vec<_> = (0..HOURS_PER_DAY)
                .map(|hour| {
                    let sun = sun_position(position, day_of_year, hour);
                    obstacle_shading(position, sun, obstacles)
                })
                .collect();
            let average = hourly.iter().sum::<f64>() / f64::from(HOURS_PER_DAY);

            PanelShading {
                position,
                hourly,
                average,
            }
        })
        .collect();

    let total_shading_loss = if panels.is_empty() {
        0.0
    } else {
        panels.iter().map(|panel| panel.average).sum::<f64>() / panels.len() as f64
    };

    ShadingAnalysis {
        panels,
        total_shading_loss,
    }
}
