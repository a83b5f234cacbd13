use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::ValidationError;
use super::types::{
    BudgetBreakdown, BudgetInsights, HealthStatus, Insight, InsightKind, PERCENT_DP,
    SavingsForecast, quantize,
};

const SAVINGS_RATE_WEIGHT: Decimal = dec!(0.6);
const EMERGENCY_WEIGHT: Decimal = dec!(0.4);
const STRONG_EMERGENCY_FUND: Decimal = dec!(75);
const BUILDING_EMERGENCY_FUND: Decimal = dec!(25);
const HEALTHY_SAVINGS_RATE: Decimal = dec!(20);

/// Share of the categorized budget that goes to savings, in percent.
pub fn savings_rate(breakdown: &BudgetBreakdown) -> Result<Decimal, ValidationError> {
    let overflow = || ValidationError::Overflow {
        field: "budget_breakdown",
    };
    let total_budget = breakdown.categories.checked_total().ok_or_else(overflow)?;
    if total_budget.is_zero() {
        return Ok(quantize(Decimal::ZERO, PERCENT_DP));
    }
    let rate = breakdown
        .total_savings
        .checked_div(total_budget)
        .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(overflow)?;
    Ok(quantize(rate, PERCENT_DP))
}

/// Rule-based budget health assessment.
///
/// The score blends savings rate (60%) with emergency fund progress (40%)
/// and is clamped to 0..=100. Insights come in a fixed order: emergency fund
/// first, savings rate second. Thresholds compare the progress as posted;
/// rounding only applies to what is reported.
pub fn score(
    breakdown: &BudgetBreakdown,
    forecast: &SavingsForecast,
) -> Result<BudgetInsights, ValidationError> {
    let savings_rate = savings_rate(breakdown)?;
    let raw_progress = forecast.emergency_fund_progress;
    let progress = quantize(raw_progress, PERCENT_DP);

    let raw_score = (savings_rate * SAVINGS_RATE_WEIGHT)
        .checked_add(progress * EMERGENCY_WEIGHT)
        .ok_or(ValidationError::Overflow {
            field: "savings_data",
        })?;
    let health_score = quantize(
        raw_score.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED),
        PERCENT_DP,
    );

    let mut insights = Vec::with_capacity(2);
    let mut recommendations = Vec::with_capacity(2);

    if raw_progress >= STRONG_EMERGENCY_FUND {
        insights.push(insight(
            InsightKind::Success,
            format!("Strong emergency fund at {progress}% of goal"),
        ));
        recommendations.push("Consider investing additional savings for long-term growth".to_string());
    } else if raw_progress >= BUILDING_EMERGENCY_FUND {
        insights.push(insight(
            InsightKind::Info,
            format!("Building emergency fund: {progress}% of goal"),
        ));
        recommendations.push("Stay consistent with emergency fund contributions".to_string());
    } else {
        insights.push(insight(
            InsightKind::Warning,
            format!("Low emergency fund: {progress}% of goal"),
        ));
        recommendations.push("Prioritize building your emergency fund".to_string());
    }

    if savings_rate >= HEALTHY_SAVINGS_RATE {
        insights.push(insight(
            InsightKind::Success,
            format!("Healthy savings rate: {savings_rate}% of income"),
        ));
    } else {
        insights.push(insight(
            InsightKind::Warning,
            format!("Low savings rate: {savings_rate}% of income"),
        ));
        recommendations
            .push("Look for ways to increase your savings rate to 20% or more".to_string());
    }

    Ok(BudgetInsights {
        health_score,
        status: HealthStatus::from_score(health_score),
        insights,
        recommendations,
    })
}

fn insight(kind: InsightKind, message: String) -> Insight {
    Insight { kind, message }
}
