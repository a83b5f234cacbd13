mod allocator;
mod error;
mod forecaster;
mod insights;
mod types;

pub use allocator::{MAX_BUDGET_AMOUNT, adjusted_amount, allocate};
pub use error::ValidationError;
pub use forecaster::{UNREACHABLE_MONTHS, forecast, goal_progress, months_to_reach, what_if_help};
pub use insights::{savings_rate, score};
pub use types::{
    AllocationRequest, BudgetBreakdown, BudgetInsights, BudgetPeriod, Category, CategoryAmounts,
    DEFAULT_EMERGENCY_GOAL, ForecastRequest, HealthStatus, Insight, InsightKind, InsightsRequest,
    MONEY_DP, PERCENT_DP, SavingsForecast, WhatIfScenarios, quantize,
};
