//! A flat peak-sun-hours production heuristic.
use super::{ProductionModel, ProductionOutput, ProductionRequest, ProductionServiceError};
use crate::units::{Energy, Power};

/// Days in each month of a non-leap year
pub const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Default average peak sun hours per day
pub const DEFAULT_SUN_HOURS: f64 = 4.5;

/// First hour of the day which produces power
const FIRST_SUN_HOUR: usize = 6;

/// Hour of the day after the last producing one
const LAST_SUN_HOUR: usize = 18;

/// Production as `capacity x sun hours` every day of the year.
///
/// Losses and orientation are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunHoursModel {
    /// Average peak sun hours per day
    pub sun_hours: f64,
}

impl Default for SunHoursModel {
    fn default() -> Self {
        Self::new(DEFAULT_SUN_HOURS)
    }
}

impl SunHoursModel {
    /// Create a model with the given average sun hours
    pub fn new(sun_hours: f64) -> Self {
        Self { sun_hours }
    }

    /// The production profile for a system of the given capacity
    pub fn output(&self, capacity: Power) -> ProductionOutput {
        let daily = Energy(capacity.value() * self.sun_hours);
        let hourly_while_sunny = daily.value() / (LAST_SUN_HOUR - FIRST_SUN_HOUR) as f64;

        let monthly = DAYS_IN_MONTH
            .iter()
            .map(|days| Energy(daily.value() * f64::from(*days)))
            .collect();
        let hourly = DAYS_IN_MONTH
            .iter()
            .flat_map(|days| 0..*days)
            .flat_map(|_| 0..24)
            .map(|hour| {
                if (FIRST_SUN_HOUR..LAST_SUN_HOUR).contains(&hour) {
                    Energy(hourly_while_sunny)
                } else {
                    Energy(0.0)
                }
            })
            .collect();

        ProductionOutput {
            annual: Energy(daily.value() * 365.0),
            monthly,
            hourly,
        }
    }
}

impl ProductionModel for SunHoursModel {
    async fn estimate(
        &self,
        request: &ProductionRequest,
    ) -> Result<ProductionOutput, ProductionServiceError> {
        Ok(self.output(request.system_capacity))
    }
}
