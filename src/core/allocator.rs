use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::ValidationError;
use super::types::{BudgetBreakdown, BudgetPeriod, Category, CategoryAmounts, MONEY_DP, quantize};

pub const MAX_BUDGET_AMOUNT: Decimal = dec!(1000000);

/// Splits a budget across the fixed category table.
///
/// The amount is read as a monthly figure and divided down to the requested
/// period before the split. Categories are rounded independently, so their sum
/// can drift from the adjusted amount by a few minor units.
pub fn allocate(amount: Decimal, period: BudgetPeriod) -> Result<BudgetBreakdown, ValidationError> {
    let adjusted = adjusted_amount(validate_amount(amount)?, period);
    let share = |category: Category| quantize(adjusted * category.share(), MONEY_DP);

    let categories = CategoryAmounts {
        food: share(Category::Food),
        transportation: share(Category::Transportation),
        utilities: share(Category::Utilities),
        emergency_fund: share(Category::EmergencyFund),
        discretionary: share(Category::Discretionary),
    };

    let total_essential = Category::ALL
        .iter()
        .filter(|c| c.is_essential())
        .map(|c| categories.get(*c))
        .sum::<Decimal>();
    let total_savings = categories.emergency_fund + categories.discretionary;

    Ok(BudgetBreakdown {
        total_essential: quantize(total_essential, MONEY_DP),
        total_savings: quantize(total_savings, MONEY_DP),
        categories,
    })
}

pub fn adjusted_amount(amount: Decimal, period: BudgetPeriod) -> Decimal {
    quantize(amount / period.divisor(), MONEY_DP)
}

fn validate_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NotPositive { field: "amount" });
    }
    if amount > MAX_BUDGET_AMOUNT {
        return Err(ValidationError::TooLarge {
            field: "amount",
            max: MAX_BUDGET_AMOUNT,
        });
    }
    Ok(quantize(amount, MONEY_DP))
}
