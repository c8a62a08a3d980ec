//! Multi-year savings projections for a financed system.
use crate::units::{Dimensionless, Energy, Money, MoneyPerEnergy};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Years over which the simple payback summary counts savings
pub const SYSTEM_LIFESPAN_YEARS: u32 = 25;

/// Inputs which would make a projection meaningless
#[derive(Debug, Error, PartialEq)]
pub enum InvalidFinancialInputError {
    /// Usage must be strictly positive
    #[error("Monthly usage must be positive, but is {0}")]
    NonPositiveUsage(f64),
    /// Bill must be strictly positive
    #[error("Monthly bill must be positive, but is {0}")]
    NonPositiveBill(f64),
    /// Installed cost must be strictly positive
    #[error("Installed cost must be positive, but is {0}")]
    NonPositiveCost(f64),
    /// Production must not be negative
    #[error("Annual production cannot be negative, but is {0}")]
    NegativeProduction(f64),
    /// Cost after incentives must be strictly positive
    #[error("Net cost after incentives must be positive, but is {0}")]
    NonPositiveNetCost(f64),
    /// First-year savings must be strictly positive for a payback period
    #[error("Annual savings must be positive, but are {0}")]
    NonPositiveSavings(f64),
    /// A parameter is out of range
    #[error("Invalid finance parameter {name}: {reason}")]
    InvalidParameter {
        /// The parameter's name
        name: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Loan, incentive and market assumptions for a projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceParameters {
    /// Loan term in years; zero for a cash purchase
    pub loan_term_years: u32,
    /// Annual percentage rate of the loan
    pub apr: f64,
    /// Fraction of the installed cost refunded as a federal tax credit
    pub federal_tax_credit: Dimensionless,
    /// Number of years to project
    pub horizon_years: u32,
    /// Annual loss of panel output, in percent
    pub degradation_rate: f64,
    /// Annual increase in electricity price, in percent
    pub escalation_rate: f64,
    /// Electricity price assumed when no bill is supplied
    pub default_rate: MoneyPerEnergy,
}

impl Default for FinanceParameters {
    fn default() -> Self {
        Self {
            loan_term_years: 25,
            apr: 5.99,
            federal_tax_credit: Dimensionless(0.30),
            horizon_years: 25,
            degradation_rate: 0.5,
            escalation_rate: 5.0,
            default_rate: MoneyPerEnergy(0.15),
        }
    }
}

impl FinanceParameters {
    /// Check all parameters are in range
    pub fn validate(&self) -> Result<(), InvalidFinancialInputError> {
        let invalid =
            |name, reason| Err(InvalidFinancialInputError::InvalidParameter { name, reason });

        if !(self.apr.is_finite() && self.apr >= 0.0) {
            return invalid("apr", "must be a non-negative number");
        }
        if !(0.0..=1.0).contains(&self.federal_tax_credit.value()) {
            return invalid("federal_tax_credit", "must be between 0 and 1");
        }
        if self.horizon_years == 0 {
            return invalid("horizon_years", "must be at least one year");
        }
        if !(0.0..100.0).contains(&self.degradation_rate) {
            return invalid("degradation_rate", "must be at least 0 and below 100");
        }
        if !(self.escalation_rate.is_finite() && self.escalation_rate > -100.0) {
            return invalid("escalation_rate", "must be above -100");
        }
        if !(self.default_rate.is_finite() && self.default_rate > MoneyPerEnergy(0.0)) {
            return invalid("default_rate", "must be positive");
        }

        Ok(())
    }
}

/// What the customer currently uses and pays, if known
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageProfile {
    /// Electricity used per month
    pub monthly_usage: Option<Energy>,
    /// Electricity bill per month
    pub monthly_bill: Option<Money>,
}

impl UsageProfile {
    /// Resolve annual usage and the starting electricity price.
    ///
    /// Missing values are filled in from `default_rate`; with neither value, usage is assumed to
    /// match `annual_production`.
    fn resolve(
        &self,
        annual_production: Energy,
        default_rate: MoneyPerEnergy,
    ) -> Result<(Energy, MoneyPerEnergy), InvalidFinancialInputError> {
        if let Some(usage) = self
            .monthly_usage
            .filter(|usage| !(usage.is_finite() && *usage > Energy(0.0)))
        {
            return Err(InvalidFinancialInputError::NonPositiveUsage(usage.value()));
        }
        if let Some(bill) = self
            .monthly_bill
            .filter(|bill| !(bill.is_finite() && *bill > Money(0.0)))
        {
            return Err(InvalidFinancialInputError::NonPositiveBill(bill.value()));
        }

        let (monthly_usage, rate) = match (self.monthly_usage, self.monthly_bill) {
            (Some(usage), Some(bill)) => (usage, bill / usage),
            (Some(usage), None) => (usage, default_rate),
            (None, Some(bill)) => (bill / default_rate, default_rate),
            (None, None) => (annual_production / Dimensionless(12.0), default_rate),
        };
        if monthly_usage <= Energy(0.0) {
            return Err(InvalidFinancialInputError::NonPositiveUsage(
                monthly_usage.value(),
            ));
        }

        Ok((monthly_usage * Dimensionless(12.0), rate))
    }
}

/// One year of a projection
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearlyProjection {
    /// Year number, starting at 1
    pub year: u32,
    /// What the customer would pay without solar
    pub traditional_bill: Money,
    /// Loan repayments this year
    pub solar_cost: Money,
    /// Value of solar output less loan repayments
    pub annual_savings: Money,
    /// Running total of `annual_savings`
    pub cumulative_savings: Money,
    /// Electricity price this year
    pub electricity_rate: MoneyPerEnergy,
    /// Panel output this year
    pub production: Energy,
}

/// A complete savings projection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavingsResult {
    /// One entry per year, in order
    pub projections: Vec<YearlyProjection>,
    /// Savings in year 1
    pub first_year_savings: Money,
    /// Amount borrowed
    pub loan_amount: Money,
    /// Monthly loan repayment
    pub monthly_payment: Money,
    /// First year in which cumulative savings exceed the installed cost, zero if never
    pub payback_period: u32,
    /// Cumulative savings as a percentage of installed cost
    pub roi: f64,
    /// Starting electricity price
    pub current_rate: MoneyPerEnergy,
    /// Production as a percentage of usage, capped at 100
    pub offset_percentage: f64,
}

/// Monthly repayment on an amortising loan.
///
/// A zero-year term is a cash purchase and needs no repayments.
pub fn monthly_loan_payment(principal: Money, years: u32, apr: f64) -> Money {
    if years == 0 {
        return Money(0.0);
    }

    let payments = f64::from(years * 12);
    let monthly_rate = apr / 12.0 / 100.0;
    if monthly_rate == 0.0 {
        return principal / Dimensionless(payments);
    }

    let factor = (1.0 + monthly_rate).powf(payments);
    principal * Dimensionless(monthly_rate * factor / (factor - 1.0))
}

/// Project savings year by year over the horizon in `params`.
///
/// Production degrades and the electricity price escalates once per year, after that year's
/// figures are recorded. The payback year is the first in which cumulative savings exceed
/// `installed_cost` and is not revised if savings later fall back.
pub fn simulate_savings(
    installed_cost: Money,
    annual_production: Energy,
    usage: &UsageProfile,
    params: &FinanceParameters,
) -> Result<SavingsResult, InvalidFinancialInputError> {
    params.validate()?;
    if !(installed_cost.is_finite() && installed_cost > Money(0.0)) {
        return Err(InvalidFinancialInputError::NonPositiveCost(
            installed_cost.value(),
        ));
    }
    if !(annual_production.is_finite() && annual_production >= Energy(0.0)) {
        return Err(InvalidFinancialInputError::NegativeProduction(
            annual_production.value(),
        ));
    }

    let (annual_usage, current_rate) = usage.resolve(annual_production, params.default_rate)?;
    let offset_percentage = ((annual_production / annual_usage).value() * 100.0).min(100.0);

    let loan_amount = if params.loan_term_years == 0 {
        Money(0.0)
    } else {
        installed_cost * (Dimensionless(1.0) - params.federal_tax_credit)
    };
    let monthly_payment = monthly_loan_payment(loan_amount, params.loan_term_years, params.apr);
    let annual_loan_payment = monthly_payment * Dimensionless(12.0);
    let degradation = Dimensionless(1.0 - params.degradation_rate / 100.0);
    let escalation = Dimensionless(1.0 + params.escalation_rate / 100.0);

    let mut projections = Vec::with_capacity(params.horizon_years as usize);
    let mut rate = current_rate;
    let mut production = annual_production;
    let mut cumulative_savings = Money(0.0);
    let mut payback_period = 0;
    for year in 1..=params.horizon_years {
        let traditional_bill = annual_usage * rate;
        let solar_cost = if year <= params.loan_term_years {
            annual_loan_payment
        } else {
            Money(0.0)
        };
        let annual_savings = production * rate - solar_cost;
        cumulative_savings += annual_savings;

        if payback_period == 0 && cumulative_savings > installed_cost {
            payback_period = year;
        }

        projections.push(YearlyProjection {
            year,
            traditional_bill,
            solar_cost,
            annual_savings,
            cumulative_savings,
            electricity_rate: rate,
            production,
        });

        production = production * degradation;
        rate = rate * escalation;
    }

    let roi = (cumulative_savings / installed_cost).value() * 100.0;
    debug!(
        "Projected {} years: payback in year {payback_period}, ROI {roi:.1}%",
        params.horizon_years
    );

    Ok(SavingsResult {
        first_year_savings: projections[0].annual_savings,
        projections,
        loan_amount,
        monthly_payment,
        payback_period,
        roi,
        current_rate,
        offset_percentage,
    })
}

/// One-off incentives reducing the cost of a system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Incentives {
    /// Federal credit as a fraction of the installed cost
    pub federal: Dimensionless,
    /// Flat state rebate
    pub state: Money,
    /// Flat utility rebate
    pub utility: Money,
}

impl Default for Incentives {
    fn default() -> Self {
        Self {
            federal: Dimensionless(0.30),
            state: Money(0.0),
            utility: Money(0.0),
        }
    }
}

/// Payback figures ignoring financing, degradation and escalation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimplePayback {
    /// Federal credit
    pub federal_incentive: Money,
    /// State rebate
    pub state_incentive: Money,
    /// Utility rebate
    pub utility_incentive: Money,
    /// Sum of all incentives
    pub total_incentives: Money,
    /// Installed cost less incentives
    pub net_cost: Money,
    /// Value of one year's production
    pub annual_savings: Money,
    /// Years until savings repay the net cost
    pub payback_years: f64,
    /// Net return over the system lifespan, as a percentage of net cost
    pub roi: f64,
    /// Savings over the system lifespan
    pub lifetime_savings: Money,
}

/// Flat-rate payback summary for a system
pub fn simple_payback(
    system_cost: Money,
    annual_production: Energy,
    rate: MoneyPerEnergy,
    incentives: &Incentives,
) -> Result<SimplePayback, InvalidFinancialInputError> {
    let federal_incentive = system_cost * incentives.federal;
    let total_incentives = federal_incentive + incentives.state + incentives.utility;
    let net_cost = system_cost - total_incentives;
    if !(net_cost.is_finite() && net_cost > Money(0.0)) {
        return Err(InvalidFinancialInputError::NonPositiveNetCost(
            net_cost.value(),
        ));
    }

    let annual_savings = annual_production * rate;
    if !(annual_savings.is_finite() && annual_savings > Money(0.0)) {
        return Err(InvalidFinancialInputError::NonPositiveSavings(
            annual_savings.value(),
        ));
    }

    let lifetime_savings = annual_savings * Dimensionless(f64::from(SYSTEM_LIFESPAN_YEARS));
    Ok(SimplePayback {
        federal_incentive,
        state_incentive: incentives.state,
        utility_incentive: incentives.utility,
        total_incentives,
        net_cost,
        annual_savings,
        payback_years: (net_cost / annual_savings).value(),
        roi: ((lifetime_savings - net_cost) / net_cost).value() * 100.0,
        lifetime_savings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn usage() -> UsageProfile {
        UsageProfile {
            monthly_usage: Some(Energy(1000.0)),
            monthly_bill: Some(Money(150.0)),
        }
    }

    #[rstest]
    #[case(Money(37_632.0), 25, 5.99, Money(242.233_518_431_026_6))]
    #[case(Money(1200.0), 1, 0.0, Money(100.0))]
    #[case(Money(1200.0), 0, 5.99, Money(0.0))]
    fn test_monthly_loan_payment(
        #[case] principal: Money,
        #[case] years: u32,
        #[case] apr: f64,
        #[case] expected: Money,
    ) {
        assert_approx_eq!(
            Money,
            monthly_loan_payment(principal, years, apr),
            expected,
            epsilon = 1e-9
        );
    }

    #[rstest]
    fn test_simulate_savings(usage: UsageProfile) {
        let result = simulate_savings(
            Money(53_760.0),
            Energy(31_536.0),
            &usage,
            &FinanceParameters::default(),
        )
        .unwrap();

        assert_approx_eq!(MoneyPerEnergy, result.current_rate, MoneyPerEnergy(0.15));
        assert_approx_eq!(Money, result.loan_amount, Money(37_632.0), epsilon = 1e-9);
        assert_approx_eq!(
            Money,
            result.monthly_payment,
            Money(242.233_518_431_026_6),
            epsilon = 1e-9
        );
        assert_approx_eq!(
            Money,
            result.first_year_savings,
            Money(1_823.597_778_827_68),
            epsilon = 1e-6
        );
        assert_eq!(result.payback_period, 15);
        assert_approx_eq!(f64, result.roi, 255.625_518_569_158_4, epsilon = 1e-6);
        assert_eq!(result.offset_percentage, 100.0);
        assert_eq!(result.projections.len(), 25);

        let first = &result.projections[0];
        assert_eq!(first.year, 1);
        assert_approx_eq!(Money, first.traditional_bill, Money(1800.0), epsilon = 1e-9);
        assert_eq!(first.cumulative_savings, first.annual_savings);
    }

    #[rstest]
    fn test_cumulative_recurrence(usage: UsageProfile) {
        let result = simulate_savings(
            Money(20_000.0),
            Energy(9000.0),
            &usage,
            &FinanceParameters::default(),
        )
        .unwrap();
        for pair in result.projections.windows(2) {
            assert_eq!(
                pair[1].cumulative_savings,
                pair[0].cumulative_savings + pair[1].annual_savings
            );
            assert_eq!(pair[1].year, pair[0].year + 1);
            assert!(pair[1].electricity_rate > pair[0].electricity_rate);
            assert!(pair[1].production < pair[0].production);
        }
    }

    #[test]
    fn test_payback_latched_when_savings_fall() {
        // Falling prices push savings below the loan repayments after the first year
        let params = FinanceParameters {
            loan_term_years: 10,
            apr: 0.0,
            federal_tax_credit: Dimensionless(0.0),
            escalation_rate: -90.0,
            ..FinanceParameters::default()
        };
        let usage = UsageProfile {
            monthly_usage: Some(Energy(1000.0)),
            monthly_bill: None,
        };
        let cost = Money(10_000.0);
        let result = simulate_savings(cost, Energy(100_000.0), &usage, &params).unwrap();

        assert_eq!(result.payback_period, 1);
        assert!(result.projections[9].cumulative_savings < cost);
    }

    #[test]
    fn test_payback_never_reached() {
        let result = simulate_savings(
            Money(1_000_000.0),
            Energy(1000.0),
            &UsageProfile::default(),
            &FinanceParameters::default(),
        )
        .unwrap();
        assert_eq!(result.payback_period, 0);
    }

    #[test]
    fn test_cash_purchase() {
        let params = FinanceParameters {
            loan_term_years: 0,
            ..FinanceParameters::default()
        };
        let result = simulate_savings(
            Money(10_000.0),
            Energy(6000.0),
            &UsageProfile::default(),
            &params,
        )
        .unwrap();
        assert_eq!(result.monthly_payment, Money(0.0));
        assert!(result.projections.iter().all(|p| p.solar_cost == Money(0.0)));
        // Usage defaults to production
        assert_eq!(result.offset_percentage, 100.0);
    }

    #[rstest]
    #[case(
        UsageProfile { monthly_usage: Some(Energy(2000.0)), monthly_bill: None },
        MoneyPerEnergy(0.15),
        50.0
    )]
    #[case(
        UsageProfile { monthly_usage: None, monthly_bill: Some(Money(300.0)) },
        MoneyPerEnergy(0.15),
        50.0
    )]
    fn test_partial_usage(
        #[case] usage: UsageProfile,
        #[case] rate: MoneyPerEnergy,
        #[case] offset: f64,
    ) {
        let result = simulate_savings(
            Money(10_000.0),
            Energy(12_000.0),
            &usage,
            &FinanceParameters::default(),
        )
        .unwrap();
        assert_approx_eq!(MoneyPerEnergy, result.current_rate, rate);
        assert_approx_eq!(f64, result.offset_percentage, offset, epsilon = 1e-9);
    }

    #[rstest]
    #[case(
        UsageProfile { monthly_usage: Some(Energy(0.0)), monthly_bill: Some(Money(150.0)) },
        InvalidFinancialInputError::NonPositiveUsage(0.0)
    )]
    #[case(
        UsageProfile { monthly_usage: Some(Energy(1000.0)), monthly_bill: Some(Money(-1.0)) },
        InvalidFinancialInputError::NonPositiveBill(-1.0)
    )]
    fn test_invalid_usage(#[case] usage: UsageProfile, #[case] expected: InvalidFinancialInputError) {
        let result = simulate_savings(
            Money(10_000.0),
            Energy(12_000.0),
            &usage,
            &FinanceParameters::default(),
        );
        assert_eq!(result.unwrap_err(), expected);
    }

    #[rstest]
    fn test_invalid_inputs(usage: UsageProfile) {
        let params = FinanceParameters::default();
        assert_eq!(
            simulate_savings(Money(0.0), Energy(1.0), &usage, &params).unwrap_err(),
            InvalidFinancialInputError::NonPositiveCost(0.0)
        );
        assert_eq!(
            simulate_savings(Money(1.0), Energy(-1.0), &usage, &params).unwrap_err(),
            InvalidFinancialInputError::NegativeProduction(-1.0)
        );

        let params = FinanceParameters {
            horizon_years: 0,
            ..FinanceParameters::default()
        };
        assert!(matches!(
            simulate_savings(Money(1.0), Energy(1.0), &usage, &params),
            Err(InvalidFinancialInputError::InvalidParameter {
                name: "horizon_years",
                ..
            })
        ));
    }

    #[test]
    fn test_simple_payback() {
        let incentives = Incentives {
            state: Money(1000.0),
            utility: Money(500.0),
            ..Incentives::default()
        };
        let summary = simple_payback(
            Money(20_000.0),
            Energy(10_000.0),
            MoneyPerEnergy(0.15),
            &incentives,
        )
        .unwrap();
        assert_approx_eq!(Money, summary.federal_incentive, Money(6000.0), epsilon = 1e-9);
        assert_approx_eq!(Money, summary.net_cost, Money(12_500.0), epsilon = 1e-9);
        assert_approx_eq!(Money, summary.annual_savings, Money(1500.0), epsilon = 1e-9);
        assert_approx_eq!(f64, summary.payback_years, 12.5 / 1.5, epsilon = 1e-9);
        assert_approx_eq!(Money, summary.lifetime_savings, Money(37_500.0), epsilon = 1e-9);
        assert_approx_eq!(f64, summary.roi, 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_simple_payback_invalid() {
        let incentives = Incentives {
            federal: Dimensionless(1.0),
            ..Incentives::default()
        };
        assert!(matches!(
            simple_payback(Money(100.0), Energy(1.0), MoneyPerEnergy(0.1), &incentives),
            Err(InvalidFinancialInputError::NonPositiveNetCost(_))
        ));
        assert!(matches!(
            simple_payback(
                Money(100.0),
                Energy(0.0),
                MoneyPerEnergy(0.1),
                &Incentives::default()
            ),
            Err(InvalidFinancialInputError::NonPositiveSavings(_))
        ));
    }
}
