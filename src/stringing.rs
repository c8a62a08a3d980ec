//! Electrical matching of panels to inverters.
use crate::equipment::{Equipment, EquipmentID, EquipmentMap, InverterSpec, InverterType, PanelSpec};
use crate::placement::PanelPlacement;
use crate::units::Power;
use anyhow::Result;
use serde::Serialize;
use thiserror::Error;

/// Why an inverter cannot serve a set of panels.
///
/// This is reported inside a [`StringValidation`] rather than returned as a failure, so that the
/// caller can offer different equipment.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum EquipmentIncompatibilityError {
    /// There is nothing to connect
    #[error("There are no panels to connect to the inverter")]
    NoPanels,
    /// A single panel already exceeds the inverter's input voltage
    #[error("The panel voltage exceeds the inverter's maximum input voltage")]
    PanelVoltageTooHigh,
    /// Strings short enough for the voltage limit cannot reach the power rating
    #[error(
        "At most {max_panels_per_string} panels fit in a string, but {min_panels_for_power} are \
         needed to reach the inverter's power rating"
    )]
    InsufficientStringLength {
        /// Longest string allowed by the voltage limit
        max_panels_per_string: u32,
        /// Shortest string that reaches the power rating
        min_panels_for_power: u32,
    },
    /// Splitting the panels evenly gives strings which are too short
    #[error(
        "{panels_per_string} panels per string is fewer than the {min_panels_for_power} needed to \
         reach the inverter's power rating"
    )]
    StringTooShort {
        /// Panels in each string
        panels_per_string: u32,
        /// Shortest string that reaches the power rating
        min_panels_for_power: u32,
    },
}

/// How the panels should be divided into strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuggestedConfiguration {
    /// Number of strings
    pub strings_count: u32,
    /// Panels in each string
    pub panels_per_string: u32,
    /// Panels left over after dividing evenly
    pub unused_panels: u32,
}

/// Electrical characteristics of the suggested configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElectricalParameters {
    /// Voltage across one string, in volts
    pub string_voltage: f64,
    /// Current through one string, in amps
    pub string_current: f64,
    /// Nameplate power of all panels, in watts
    pub total_power: f64,
}

/// The outcome of checking a panel count against an inverter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringValidation {
    /// Whether the inverter can serve the panels
    pub is_valid: bool,
    /// Longest string allowed by the inverter's voltage limit
    pub max_panels_per_string: u32,
    /// Shortest string that reaches the inverter's power rating
    pub min_panels_for_power: u32,
    /// The suggested split into strings
    pub suggested_configuration: SuggestedConfiguration,
    /// Electrical characteristics of the suggested split
    pub electrical_parameters: ElectricalParameters,
    /// Why the configuration is invalid, if it is
    pub incompatibility: Option<EquipmentIncompatibilityError>,
}

/// Check whether `total_panels` panels can be wired to an inverter.
///
/// A string inverter needs the panels split into equal series strings, each short enough to stay
/// within the inverter's input voltage and long enough to reach its power rating. Panels which
/// don't divide evenly are reported as unused. With microinverters, every panel is its own string
/// and any count above zero is valid.
pub fn validate_string_configuration(
    total_panels: u32,
    panel: &PanelSpec,
    inverter: &InverterSpec,
) -> StringValidation {
    let max_panels_per_string = (inverter.max_voltage / panel.voltage).floor() as u32;
    let min_panels_for_power = (inverter.power_rating / panel.watts).ceil() as u32;
    let total_power = f64::from(total_panels) * panel.watts;

    let invalid = |error, unused_panels| StringValidation {
        is_valid: false,
        max_panels_per_string,
        min_panels_for_power,
        suggested_configuration: SuggestedConfiguration {
            strings_count: 0,
            panels_per_string: 0,
            unused_panels,
        },
        electrical_parameters: ElectricalParameters {
            string_voltage: 0.0,
            string_current: 0.0,
            total_power,
        },
        incompatibility: Some(error),
    };

    if total_panels == 0 {
        return invalid(EquipmentIncompatibilityError::NoPanels, 0);
    }

    if inverter.kind == InverterType::Microinverter {
        return StringValidation {
            is_valid: true,
            max_panels_per_string,
            min_panels_for_power,
            suggested_configuration: SuggestedConfiguration {
                strings_count: total_panels,
                panels_per_string: 1,
                unused_panels: 0,
            },
            electrical_parameters: ElectricalParameters {
                string_voltage: panel.voltage,
                string_current: panel.current,
                total_power,
            },
            incompatibility: None,
        };
    }

    if max_panels_per_string == 0 {
        return invalid(
            EquipmentIncompatibilityError::PanelVoltageTooHigh,
            total_panels,
        );
    }

    let strings_count = total_panels.div_ceil(max_panels_per_string);
    let panels_per_string = total_panels / strings_count;
    let incompatibility = if max_panels_per_string < min_panels_for_power {
        Some(EquipmentIncompatibilityError::InsufficientStringLength {
            max_panels_per_string,
            min_panels_for_power,
        })
    } else if panels_per_string < min_panels_for_power {
        Some(EquipmentIncompatibilityError::StringTooShort {
            panels_per_string,
            min_panels_for_power,
        })
    } else {
        None
    };

    StringValidation {
        is_valid: incompatibility.is_none(),
        max_panels_per_string,
        min_panels_for_power,
        suggested_configuration: SuggestedConfiguration {
            strings_count,
            panels_per_string,
            unused_panels: total_panels - strings_count * panels_per_string,
        },
        electrical_parameters: ElectricalParameters {
            string_voltage: f64::from(panels_per_string) * panel.voltage,
            string_current: panel.current,
            total_power,
        },
        incompatibility,
    }
}

/// Inverters suitable for a system before one has been chosen.
///
/// String inverters must be rated within 90% to 120% of the total panel wattage. Microinverters
/// must be rated for at least 90% of a single panel's wattage.
pub fn compatible_inverters<'a>(
    inverters: &'a EquipmentMap,
    panel: &PanelSpec,
    total_panels: u32,
) -> Result<Vec<&'a Equipment>> {
    let target = f64::from(total_panels) * panel.watts;
    let mut compatible = Vec::new();
    for inverter in inverters.values() {
        let spec = inverter.inverter_spec()?;
        let suitable = match spec.kind {
            InverterType::String => {
                spec.power_rating >= target * 0.9 && spec.power_rating <= target * 1.2
            }
            InverterType::Microinverter => spec.power_rating >= panel.watts * 0.9,
        };
        if suitable {
            compatible.push(inverter);
        }
    }

    Ok(compatible)
}

/// Batteries whose capacity (in kWh) is between two and four times the system size (in kW)
pub fn compatible_batteries(
    batteries: &EquipmentMap,
    system_size: Power,
) -> Result<Vec<&Equipment>> {
    let min_capacity = system_size.value() * 2.0;
    let max_capacity = system_size.value() * 4.0;
    let mut compatible = Vec::new();
    for battery in batteries.values() {
        let capacity = battery.battery_spec()?.capacity.value();
        if capacity >= min_capacity && capacity <= max_capacity {
            compatible.push(battery);
        }
    }

    Ok(compatible)
}

/// A group of panels wired to one inverter input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StringConfiguration {
    /// The panels, in wiring order. Never empty.
    pub placements: Vec<PanelPlacement>,
    /// The inverter the string feeds
    pub inverter_id: EquipmentID,
}

/// Electrical characteristics of one [`StringConfiguration`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StringCheck {
    /// Voltage presented to the inverter input, in volts
    pub voltage: f64,
    /// Current through the string, in amps
    pub current: f64,
    /// Nameplate power of the string, in watts
    pub power: f64,
    /// Whether the voltage is within the inverter's limit
    pub within_voltage_limit: bool,
}

impl StringConfiguration {
    /// Number of panels in the string
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    /// Always false, as strings hold at least one panel
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Check the string against its inverter's limits.
    ///
    /// With microinverters each panel has its own input, so only one panel's voltage is seen.
    pub fn check(&self, panel: &PanelSpec, inverter: &InverterSpec) -> StringCheck {
        let count = self.len() as f64;
        let voltage = match inverter.kind {
            InverterType::String => count * panel.voltage,
            InverterType::Microinverter => panel.voltage,
        };

        StringCheck {
            voltage,
            current: panel.current,
            power: count * panel.watts,
            within_voltage_limit: voltage <= inverter.max_voltage,
        }
    }
}

impl SuggestedConfiguration {
    /// Wire `placements` into strings in order, leaving the unused panels at the end unassigned
    pub fn split(
        &self,
        placements: &[PanelPlacement],
        inverter_id: &EquipmentID,
    ) -> Vec<StringConfiguration> {
        if self.panels_per_string == 0 {
            return Vec::new();
        }

        placements
            .chunks_exact(self.panels_per_string as usize)
            .take(self.strings_count as usize)
            .map(|chunk| StringConfiguration {
                placements: chunk.to_vec(),
                inverter_id: inverter_id.clone(),
            })
            .collect()
    }
}
