//! Panels, inverters and batteries available for a design.
//!
//! Catalog entries carry an open map of specifications, as supplied by equipment vendors. The
//! typed views ([`PanelSpec`], [`InverterSpec`] and [`BatterySpec`]) pull out and check the keys
//! that the rest of the program relies on.
use crate::id::{define_id_getter, define_id_type, get_by_str};
use crate::units::{Energy, Money, Power};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

define_id_type! {EquipmentID}

/// A map of equipment, keyed by equipment ID
pub type EquipmentMap = IndexMap<EquipmentID, Equipment>;

/// A single value in an equipment's specification sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    /// A numeric value
    Number(f64),
    /// A free-text value
    Text(String),
}

impl fmt::Display for SpecValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

/// Physical dimensions of a piece of equipment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in metres
    pub width: f64,
    /// Height in metres
    pub height: f64,
    /// Depth in metres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    /// Weight in kilograms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// An entry in the equipment catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    /// Unique identifier
    pub id: EquipmentID,
    /// The manufacturer's name
    pub manufacturer: String,
    /// The model name
    pub model: String,
    /// The specification sheet
    pub specifications: IndexMap<String, SpecValue>,
    /// Physical dimensions
    pub dimensions: Dimensions,
}
define_id_getter! {Equipment, EquipmentID}

impl Equipment {
    /// Look up a numeric specification
    pub fn number(&self, key: &str) -> Result<f64> {
        match self.specifications.get(key) {
            Some(SpecValue::Number(value)) => Ok(*value),
            Some(SpecValue::Text(value)) => Err(anyhow::anyhow!(
                "Specification {key} of {} should be a number, but is \"{value}\"",
                self.id
            )),
            None => Err(anyhow::anyhow!(
                "{} is missing required specification {key}",
                self.id
            )),
        }
    }

    /// Look up a numeric specification which must be greater than zero
    fn positive(&self, key: &str) -> Result<f64> {
        let value = self.number(key)?;
        ensure!(
            value.is_finite() && value > 0.0,
            "Specification {key} of {} must be positive",
            self.id
        );

        Ok(value)
    }

    /// Look up a cost, which may be zero but not negative
    fn cost(&self) -> Result<Money> {
        let cost = self.number("cost")?;
        ensure!(
            cost.is_finite() && cost >= 0.0,
            "Cost of {} cannot be negative",
            self.id
        );

        Ok(Money(cost))
    }

    /// Look up a text specification
    pub fn text(&self, key: &str) -> Result<&str> {
        match self.specifications.get(key) {
            Some(SpecValue::Text(value)) => Ok(value),
            Some(SpecValue::Number(value)) => Err(anyhow::anyhow!(
                "Specification {key} of {} should be text, but is {value}",
                self.id
            )),
            None => Err(anyhow::anyhow!(
                "{} is missing required specification {key}",
                self.id
            )),
        }
    }

    /// Interpret this entry as a solar panel
    pub fn panel_spec(&self) -> Result<PanelSpec> {
        ensure!(
            self.dimensions.width > 0.0 && self.dimensions.height > 0.0,
            "Panel {} must have a positive width and height",
            self.id
        );

        Ok(PanelSpec {
            watts: self.positive("watts")?,
            efficiency: self.number("efficiency")?,
            voltage: self.positive("voltage")?,
            current: self.positive("current")?,
            cost: self.cost()?,
            width: self.dimensions.width,
            height: self.dimensions.height,
        })
    }

    /// Interpret this entry as an inverter
    pub fn inverter_spec(&self) -> Result<InverterSpec> {
        let kind = self.text("type")?;
        let kind = InverterType::from_str(kind)
            .with_context(|| format!("Unknown inverter type {kind} for {}", self.id))?;

        Ok(InverterSpec {
            power_rating: self.positive("powerRating")?,
            max_voltage: self.positive("maxVoltage")?,
            kind,
            cost: self.cost()?,
        })
    }

    /// Interpret this entry as a battery
    pub fn battery_spec(&self) -> Result<BatterySpec> {
        Ok(BatterySpec {
            capacity: Energy(self.positive("capacity")?),
            power_output: Power(self.positive("powerOutput")?),
            cost: self.cost()?,
        })
    }
}

/// The electrical and commercial properties of a panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelSpec {
    /// Rated power in watts
    pub watts: f64,
    /// Conversion efficiency in percent
    pub efficiency: f64,
    /// Operating voltage in volts
    pub voltage: f64,
    /// Operating current in amps
    pub current: f64,
    /// Price per panel
    pub cost: Money,
    /// Width in metres
    pub width: f64,
    /// Height in metres
    pub height: f64,
}

impl PanelSpec {
    /// Surface area of one panel in square metres
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// How an inverter is connected to the panels
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum InverterType {
    /// A single inverter fed by series strings of panels
    String,
    /// One small inverter per panel
    Microinverter,
}

/// The properties of an inverter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverterSpec {
    /// Rated AC output in watts
    pub power_rating: f64,
    /// Maximum DC input voltage in volts
    pub max_voltage: f64,
    /// Topology
    pub kind: InverterType,
    /// Price per inverter
    pub cost: Money,
}

/// The properties of a battery
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatterySpec {
    /// Usable storage
    pub capacity: Energy,
    /// Continuous output
    pub power_output: Power,
    /// Price per battery
    pub cost: Money,
}

/// The equipment available to choose from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquipmentCatalog {
    /// Solar panels
    pub panels: EquipmentMap,
    /// Inverters
    pub inverters: EquipmentMap,
    /// Batteries
    pub batteries: EquipmentMap,
}

impl EquipmentCatalog {
    /// Check that every entry has the specifications required for its role
    pub fn validate(&self) -> Result<()> {
        for panel in self.panels.values() {
            panel.panel_spec()?;
        }
        for inverter in self.inverters.values() {
            inverter.inverter_spec()?;
        }
        for battery in self.batteries.values() {
            battery.battery_spec()?;
        }

        Ok(())
    }

    /// Look up a panel by ID
    pub fn panel(&self, id: &str) -> Result<&Equipment> {
        get_by_str(&self.panels, id).context("Invalid panel ID")
    }

    /// Look up an inverter by ID
    pub fn inverter(&self, id: &str) -> Result<&Equipment> {
        get_by_str(&self.inverters, id).context("Invalid inverter ID")
    }

    /// Look up a battery by ID
    pub fn battery(&self, id: &str) -> Result<&Equipment> {
        get_by_str(&self.batteries, id).context("Invalid battery ID")
    }
}
