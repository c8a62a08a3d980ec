//! Headline figures describing a design.
use crate::cost::system_size;
use crate::units::{Energy, Money, Power};
use serde::Serialize;

/// Summary metrics for a design, always derived from its inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DesignMetrics {
    /// Nameplate capacity
    pub system_size: Power,
    /// Expected output in the first year
    pub annual_production: Energy,
    /// Installed cost before incentives
    pub estimated_cost: Money,
    /// Footprint area in square metres
    pub roof_area: f64,
    /// Number of panels
    pub panel_count: u32,
}

impl DesignMetrics {
    /// Derive metrics for `panel_count` panels of the given wattage
    pub fn new(
        panel_count: u32,
        watts: f64,
        annual_production: Energy,
        estimated_cost: Money,
        roof_area: f64,
    ) -> Self {
        Self {
            system_size: system_size(panel_count, watts),
            annual_production,
            estimated_cost,
            roof_area,
            panel_count,
        }
    }
}
