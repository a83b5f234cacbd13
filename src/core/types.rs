use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fractional digits for currency amounts.
pub const MONEY_DP: u32 = 2;
/// Fractional digits for percentages and scores.
pub const PERCENT_DP: u32 = 1;

pub const DEFAULT_EMERGENCY_GOAL: Decimal = dec!(50000);

/// Rounds half-up (away from zero) and pins the scale so the value always
/// renders with exactly `dp` fractional digits.
pub fn quantize(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl BudgetPeriod {
    /// Divisor applied to a monthly figure to express it at this cadence.
    pub fn divisor(self) -> Decimal {
        match self {
            BudgetPeriod::Daily => dec!(30),
            BudgetPeriod::Weekly => dec!(4.33),
            BudgetPeriod::Monthly => Decimal::ONE,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Category {
    Food,
    Transportation,
    Utilities,
    EmergencyFund,
    Discretionary,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Food,
        Category::Transportation,
        Category::Utilities,
        Category::EmergencyFund,
        Category::Discretionary,
    ];

    pub fn share(self) -> Decimal {
        match self {
            Category::Food => dec!(0.30),
            Category::Transportation => dec!(0.15),
            Category::Utilities => dec!(0.20),
            Category::EmergencyFund => dec!(0.20),
            Category::Discretionary => dec!(0.15),
        }
    }

    pub fn is_essential(self) -> bool {
        matches!(
            self,
            Category::Food | Category::Transportation | Category::Utilities
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAmounts {
    pub food: Decimal,
    pub transportation: Decimal,
    pub utilities: Decimal,
    pub emergency_fund: Decimal,
    pub discretionary: Decimal,
}

impl CategoryAmounts {
    pub fn get(&self, category: Category) -> Decimal {
        match category {
            Category::Food => self.food,
            Category::Transportation => self.transportation,
            Category::Utilities => self.utilities,
            Category::EmergencyFund => self.emergency_fund,
            Category::Discretionary => self.discretionary,
        }
    }

    /// Sum of every category, or `None` if it does not fit in a `Decimal`.
    pub fn checked_total(&self) -> Option<Decimal> {
        Category::ALL
            .iter()
            .try_fold(Decimal::ZERO, |acc, c| acc.checked_add(self.get(*c)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetBreakdown {
    pub categories: CategoryAmounts,
    pub total_essential: Decimal,
    pub total_savings: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatIfScenarios {
    pub monthly_10pct_more: Decimal,
    pub yearly_10pct_more: Decimal,
    pub monthly_interest_gain: Decimal,
    pub months_to_goal: Decimal,
    pub months_with_increase: Decimal,
    pub months_saved: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsForecast {
    /// Cumulative savings after 1, 2, 3, 6 and 12 months.
    pub monthly_projections: Vec<Decimal>,
    pub emergency_fund_progress: Decimal,
    pub what_if_scenarios: WhatIfScenarios,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Success,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub message: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Excellent,
    OnTrack,
    NeedsImprovement,
}

impl HealthStatus {
    pub fn from_score(score: Decimal) -> Self {
        if score >= dec!(80) {
            HealthStatus::Excellent
        } else if score >= dec!(60) {
            HealthStatus::OnTrack
        } else {
            HealthStatus::NeedsImprovement
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetInsights {
    pub health_score: Decimal,
    pub status: HealthStatus,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub amount: Decimal,
    pub duration: BudgetPeriod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub monthly_savings: Decimal,
    pub emergency_fund: Decimal,
    #[serde(default = "default_goal")]
    pub current_goal: Decimal,
}

fn default_goal() -> Decimal {
    DEFAULT_EMERGENCY_GOAL
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsRequest {
    pub budget_breakdown: BudgetBreakdown,
    pub savings_data: SavingsForecast,
}
