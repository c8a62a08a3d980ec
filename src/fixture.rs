//! Fixtures for tests

use crate::equipment::{BatterySpec, Dimensions, Equipment, InverterSpec, PanelSpec, SpecValue};
use crate::footprint::{Bounds, Footprint};
use crate::geo::GeoPoint;
use crate::production::{ArrayType, LossBreakdown, ModuleType, ProductionRequest};
use crate::units::{Energy, Money, Power};
use indexmap::IndexMap;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

fn specifications<const N: usize>(values: [(&str, SpecValue); N]) -> IndexMap<String, SpecValue> {
    values
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn equipment<const N: usize>(
    id: &str,
    manufacturer: &str,
    model: &str,
    values: [(&str, SpecValue); N],
    width: f64,
    height: f64,
) -> Equipment {
    Equipment {
        id: id.into(),
        manufacturer: manufacturer.into(),
        model: model.into(),
        specifications: specifications(values),
        dimensions: Dimensions {
            width,
            height,
            depth: None,
            weight: None,
        },
    }
}

/// A rectangular roof about 17.8 m east-west by 13.4 m north-south
#[fixture]
pub fn rectangle_footprint() -> Footprint {
    Footprint::Rectangle(Bounds {
        north: 37.000_12,
        south: 37.0,
        east: -121.999_8,
        west: -122.0,
    })
}

/// An L-shaped roof: a 20 m x 8 m wing with an 8 m x 8 m wing on its western end
#[fixture]
pub fn polygon_footprint() -> Footprint {
    Footprint::Polygon {
        vertices: vec![
            GeoPoint::new(37.0, -122.0),
            GeoPoint::new(37.0, -121.999_775),
            GeoPoint::new(37.000_071_9, -121.999_775),
            GeoPoint::new(37.000_071_9, -121.999_91),
            GeoPoint::new(37.000_143_7, -121.999_91),
            GeoPoint::new(37.000_143_7, -122.0),
        ],
    }
}

#[fixture]
pub fn panel() -> Equipment {
    use SpecValue::{Number, Text};
    equipment(
        "rec400aa",
        "REC",
        "Alpha 400W",
        [
            ("watts", Number(400.0)),
            ("efficiency", Number(21.7)),
            ("voltage", Number(40.5)),
            ("current", Number(9.9)),
            ("type", Text("Monocrystalline".into())),
            ("cost", Number(400.0)),
        ],
        1.7,
        1.0,
    )
}

#[fixture]
pub fn panel_spec(panel: Equipment) -> PanelSpec {
    panel.panel_spec().unwrap()
}

#[fixture]
pub fn string_inverter() -> Equipment {
    use SpecValue::{Number, Text};
    equipment(
        "se7600h",
        "SolarEdge",
        "SE7600H-US",
        [
            ("powerRating", Number(7600.0)),
            ("efficiency", Number(99.0)),
            ("maxVoltage", Number(480.0)),
            ("type", Text("String".into())),
            ("cost", Number(1800.0)),
        ],
        0.54,
        0.32,
    )
}

#[fixture]
pub fn string_inverter_spec(string_inverter: Equipment) -> InverterSpec {
    string_inverter.inverter_spec().unwrap()
}

#[fixture]
pub fn micro_inverter() -> Equipment {
    use SpecValue::{Number, Text};
    equipment(
        "iq8plus",
        "Enphase",
        "IQ8+",
        [
            ("powerRating", Number(290.0)),
            ("efficiency", Number(97.0)),
            ("maxVoltage", Number(48.0)),
            ("type", Text("Microinverter".into())),
            ("cost", Number(215.0)),
        ],
        0.21,
        0.17,
    )
}

#[fixture]
pub fn micro_inverter_spec(micro_inverter: Equipment) -> InverterSpec {
    micro_inverter.inverter_spec().unwrap()
}

#[fixture]
pub fn battery_spec() -> BatterySpec {
    BatterySpec {
        capacity: Energy(13.5),
        power_output: Power(5.0),
        cost: Money(8500.0),
    }
}

/// A 19.2 kW south-facing system near San Francisco
#[fixture]
pub fn production_request() -> ProductionRequest {
    ProductionRequest {
        system_capacity: Power(19.2),
        latitude: 37.0,
        longitude: -122.0,
        azimuth: 180.0,
        tilt: 30.0,
        array_type: ArrayType::default(),
        module_type: ModuleType::default(),
        total_loss_percent: LossBreakdown::default().total(),
    }
}
