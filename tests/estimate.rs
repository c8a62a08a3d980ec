//! Integration tests for the `estimate` command and the example designs.
use solar_designer::cli::handle_estimate_command;
use solar_designer::design::{Design, EvaluationOptions};
use solar_designer::settings::Settings;
use std::path::PathBuf;
use std::time::Duration;

fn offline() -> EvaluationOptions {
    EvaluationOptions {
        api_key: None,
        offline: true,
        timeout: Duration::from_secs(5),
    }
}

#[test]
fn test_handle_estimate_command() {
    unsafe { std::env::set_var("SOLAR_DESIGNER_LOG_LEVEL", "off") };

    handle_estimate_command(&PathBuf::from("demos/bungalow"), Some(Settings::default())).unwrap();
}

#[test]
fn test_bungalow() {
    let design = Design::from_path("demos/bungalow").unwrap();
    let outcome = design.evaluate_blocking(&offline()).unwrap();

    assert!(outcome.layout.is_some());
    assert!(outcome.validation.unwrap().is_valid);
    assert_eq!(outcome.strings.len(), outcome.placements.len());

    // $200 for 900 kWh
    let rate = outcome.savings.current_rate.value();
    assert!((rate - 200.0 / 900.0).abs() < 1e-12);
    assert!(outcome.savings.loan_amount.value() > 0.0);
    assert!(outcome.simple_payback.is_some());
}

#[test]
fn test_hand_placed() {
    let design = Design::from_path("demos/hand_placed").unwrap();
    let outcome = design.evaluate_blocking(&offline()).unwrap();

    // Two rows of four, each chained into one string
    assert!(outcome.layout.is_none());
    assert_eq!(outcome.placements.len(), 8);
    assert_eq!(outcome.strings.len(), 2);
    assert!(outcome.strings.iter().all(|string| string.len() == 4));

    // Bought outright with a battery
    assert_eq!(outcome.savings.loan_amount.value(), 0.0);
    assert_eq!(outcome.cost.battery.value(), 8500.0);
    assert_eq!(outcome.shading.panels.len(), 8);
}
