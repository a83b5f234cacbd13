use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::ValidationError;
use super::types::{MONEY_DP, PERCENT_DP, SavingsForecast, WhatIfScenarios, quantize};

const PROJECTION_MONTHS: [u32; 5] = [1, 2, 3, 6, 12];
const ANNUAL_INTEREST_RATE: Decimal = dec!(0.04);
const CONTRIBUTION_BOOST: Decimal = dec!(0.1);
/// Reported instead of a month count when nothing is being saved.
pub const UNREACHABLE_MONTHS: Decimal = dec!(999);

pub fn forecast(
    monthly_savings: Decimal,
    emergency_fund: Decimal,
    goal: Decimal,
) -> Result<SavingsForecast, ValidationError> {
    if monthly_savings <= Decimal::ZERO {
        return Err(ValidationError::NotPositive {
            field: "monthly_savings",
        });
    }
    if emergency_fund < Decimal::ZERO {
        return Err(ValidationError::Negative {
            field: "emergency_fund",
        });
    }
    if goal <= Decimal::ZERO {
        return Err(ValidationError::NotPositive {
            field: "current_goal",
        });
    }

    let monthly_projections = PROJECTION_MONTHS
        .iter()
        .map(|months| {
            monthly_savings
                .checked_mul(Decimal::from(*months))
                .map(|total| quantize(total, MONEY_DP))
                .ok_or(ValidationError::Overflow {
                    field: "monthly_savings",
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SavingsForecast {
        monthly_projections,
        emergency_fund_progress: goal_progress(emergency_fund, goal),
        what_if_scenarios: what_if(monthly_savings, emergency_fund, goal)?,
    })
}

/// Percentage of the goal already covered, capped at 100.
pub fn goal_progress(fund: Decimal, goal: Decimal) -> Decimal {
    if goal.is_zero() {
        return quantize(Decimal::ZERO, PERCENT_DP);
    }
    // a ratio too large to represent is far past the cap
    let raw = fund
        .checked_div(goal)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ONE_HUNDRED);
    quantize(raw.min(Decimal::ONE_HUNDRED), PERCENT_DP)
}

/// Whole months needed to cover `remaining` at `monthly_rate`, or `None`
/// when the count does not fit in a `Decimal`.
pub fn months_to_reach(remaining: Decimal, monthly_rate: Decimal) -> Option<Decimal> {
    if monthly_rate <= Decimal::ZERO {
        return Some(UNREACHABLE_MONTHS);
    }
    let mut months = remaining.max(Decimal::ZERO).checked_div(monthly_rate)?.ceil();
    months.rescale(0);
    Some(months)
}

fn what_if(
    monthly_savings: Decimal,
    emergency_fund: Decimal,
    goal: Decimal,
) -> Result<WhatIfScenarios, ValidationError> {
    let savings_overflow = ValidationError::Overflow {
        field: "monthly_savings",
    };
    let goal_overflow = ValidationError::Overflow {
        field: "current_goal",
    };

    let monthly_10pct_more = quantize(monthly_savings * CONTRIBUTION_BOOST, MONEY_DP);
    let yearly_10pct_more = monthly_10pct_more
        .checked_mul(dec!(12))
        .ok_or_else(|| savings_overflow.clone())?;

    let monthly_rate = ANNUAL_INTEREST_RATE / dec!(12);
    let with_interest = monthly_savings
        .checked_mul(Decimal::ONE + monthly_rate)
        .ok_or_else(|| savings_overflow.clone())?;
    let monthly_interest_gain = quantize(with_interest - monthly_savings, MONEY_DP);

    let boosted_savings = monthly_savings
        .checked_mul(Decimal::ONE + CONTRIBUTION_BOOST)
        .ok_or(savings_overflow)?;
    let remaining = goal - emergency_fund;
    let months_to_goal =
        months_to_reach(remaining, monthly_savings).ok_or_else(|| goal_overflow.clone())?;
    let months_with_increase =
        months_to_reach(remaining, boosted_savings).ok_or(goal_overflow)?;
    let mut months_saved = (months_to_goal - months_with_increase).max(Decimal::ZERO);
    months_saved.rescale(0);

    Ok(WhatIfScenarios {
        monthly_10pct_more,
        yearly_10pct_more: quantize(yearly_10pct_more, MONEY_DP),
        monthly_interest_gain,
        months_to_goal,
        months_with_increase,
        months_saved,
    })
}

/// Human-readable meaning and formula of every what-if scenario.
pub fn what_if_help() -> serde_json::Value {
    serde_json::json!({
        "scenarios": {
            "monthly_10pct_more": "Additional amount saved per month by increasing your savings rate by 10%",
            "yearly_10pct_more": "Additional amount saved per year by increasing your savings rate by 10%",
            "monthly_interest_gain": "Extra money earned in the first month from a 4% annual interest rate",
            "months_to_goal": "Estimated months to reach your emergency fund goal at current savings rate",
            "months_with_increase": "Estimated months to reach your goal with 10% increased savings rate",
            "months_saved": "Number of months saved by increasing your savings rate by 10%"
        },
        "formula_explanations": {
            "monthly_10pct_more": "monthly_savings * 0.1",
            "yearly_10pct_more": "monthly_10pct_more * 12",
            "monthly_interest_gain": "monthly_savings * (annual_interest_rate / 12)",
            "months_to_goal": "ceil((goal_amount - current_amount) / monthly_savings)",
            "months_with_increase": "ceil((goal_amount - current_amount) / (monthly_savings * 1.1))",
            "months_saved": "months_to_goal - months_with_increase"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    #[test]
    fn reference_forecast_matches_expected_values() {
        let result = forecast(dec!(2000), dec!(5000), dec!(50000)).expect("valid inputs");

        assert_eq!(result.emergency_fund_progress.to_string(), "10.0");
        let projections: Vec<String> = result
            .monthly_projections
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(
            projections,
            ["2000.00", "4000.00", "6000.00", "12000.00", "24000.00"]
        );

        let scenarios = &result.what_if_scenarios;
        assert_eq!(scenarios.months_to_goal.to_string(), "23");
        // 45000 / 2200 = 20.45 -> 21
        assert_eq!(scenarios.months_with_increase.to_string(), "21");
        assert_eq!(scenarios.months_saved.to_string(), "2");
        assert_eq!(scenarios.monthly_10pct_more.to_string(), "200.00");
        assert_eq!(scenarios.yearly_10pct_more.to_string(), "2400.00");
        // 2000 * (1 + 0.04 / 12) = 2006.666... -> 2006.67
        assert_eq!(scenarios.monthly_interest_gain.to_string(), "6.67");
    }

    #[test]
    fn progress_caps_at_one_hundred() {
        let result = forecast(dec!(500), dec!(80000), dec!(50000)).expect("valid inputs");
        assert_eq!(result.emergency_fund_progress.to_string(), "100.0");
        assert_eq!(result.what_if_scenarios.months_to_goal.to_string(), "0");
        assert_eq!(result.what_if_scenarios.months_saved.to_string(), "0");
    }

    #[test]
    fn zero_goal_reports_zero_progress() {
        assert_eq!(goal_progress(dec!(100), Decimal::ZERO).to_string(), "0.0");
    }

    #[test]
    fn zero_rate_reports_sentinel_months() {
        assert_eq!(months_to_reach(dec!(1000), Decimal::ZERO), Some(UNREACHABLE_MONTHS));
    }

    #[test]
    fn sub_cent_inputs_are_not_rounded_before_use() {
        let result = forecast(dec!(100.005), Decimal::ZERO, dec!(50000)).expect("valid inputs");
        // 100.005 * 12 = 1200.06, not 100.01 * 12
        assert_eq!(result.monthly_projections[4].to_string(), "1200.06");

        let result = forecast(Decimal::ONE, dec!(0.004), dec!(0.01)).expect("valid inputs");
        assert_eq!(result.emergency_fund_progress.to_string(), "40.0");

        let result = forecast(dec!(0.001), Decimal::ZERO, dec!(10)).expect("valid inputs");
        assert_eq!(result.what_if_scenarios.months_to_goal.to_string(), "10000");
        // 10 / 0.0011 = 9090.9 -> 9091
        assert_eq!(result.what_if_scenarios.months_with_increase.to_string(), "9091");
    }

    #[test]
    fn huge_inputs_are_rejected_instead_of_overflowing() {
        assert_eq!(
            forecast(dec!(0.5), Decimal::ZERO, Decimal::MAX),
            Err(ValidationError::Overflow {
                field: "current_goal"
            })
        );
        assert_eq!(
            forecast(Decimal::MAX, Decimal::ZERO, dec!(50000)),
            Err(ValidationError::Overflow {
                field: "monthly_savings"
            })
        );
        assert_eq!(months_to_reach(Decimal::MAX, dec!(0.0001)), None);
    }

    #[test]
    fn tiny_goal_with_huge_fund_caps_progress() {
        assert_eq!(
            goal_progress(Decimal::MAX, dec!(0.0000001)).to_string(),
            "100.0"
        );
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert_eq!(
            forecast(Decimal::ZERO, dec!(5000), dec!(50000)),
            Err(ValidationError::NotPositive {
                field: "monthly_savings"
            })
        );
        assert_eq!(
            forecast(dec!(100), dec!(-1), dec!(50000)),
            Err(ValidationError::Negative {
                field: "emergency_fund"
            })
        );
        assert_eq!(
            forecast(dec!(100), dec!(0), Decimal::ZERO),
            Err(ValidationError::NotPositive {
                field: "current_goal"
            })
        );
    }

    #[test]
    fn forecast_is_idempotent() {
        let a = forecast(dec!(1234.56), dec!(789.01), dec!(25000)).unwrap();
        let b = forecast(dec!(1234.56), dec!(789.01), dec!(25000)).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn what_if_help_lists_every_scenario() {
        let help = what_if_help();
        for key in [
            "monthly_10pct_more",
            "yearly_10pct_more",
            "monthly_interest_gain",
            "months_to_goal",
            "months_with_increase",
            "months_saved",
        ] {
            assert!(help["scenarios"][key].is_string(), "missing {key}");
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_forecast_outputs_are_bounded(
            savings_cents in 1i64..=5_000_000,
            fund_cents in 0i64..=10_000_000,
            goal_cents in 1i64..=10_000_000,
        ) {
            let result = forecast(
                Decimal::new(savings_cents, 2),
                Decimal::new(fund_cents, 2),
                Decimal::new(goal_cents, 2),
            ).expect("valid inputs");

            prop_assert!(result.emergency_fund_progress >= Decimal::ZERO);
            prop_assert!(result.emergency_fund_progress <= Decimal::ONE_HUNDRED);
            prop_assert!(result.monthly_projections.windows(2).all(|w| w[0] <= w[1]));

            let scenarios = &result.what_if_scenarios;
            prop_assert!(scenarios.months_with_increase <= scenarios.months_to_goal);
            prop_assert!(
                scenarios.months_saved == scenarios.months_to_goal - scenarios.months_with_increase
            );
        }
    }
}
