//! Language-model budget advice with a deterministic rule-based fallback.

mod chat;

pub use chat::{ChatAdvisor, DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::{BudgetBreakdown, BudgetInsights, SavingsForecast, ValidationError, score};
use crate::resilience::BreakerFailure;

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor request failed: {0}")]
    Request(String),

    #[error("advisor returned status {status}")]
    Status { status: u16 },

    #[error("advisor reply could not be parsed: {0}")]
    Parse(String),

    #[error("advisor health score {0} is outside 0..=100")]
    ScoreOutOfRange(String),

    #[error("advisor is temporarily disabled")]
    CircuitOpen,
}

impl BreakerFailure for AdvisorError {
    fn trips_breaker(&self) -> bool {
        !matches!(self, AdvisorError::CircuitOpen)
    }
}

/// Where a set of insights came from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightsSource {
    Ai,
    Rules,
}

#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(
        &self,
        breakdown: &BudgetBreakdown,
        forecast: &SavingsForecast,
    ) -> Result<BudgetInsights, AdvisorError>;
}

/// Asks `advisor` when one is configured, otherwise (or on any advisor
/// failure) scores with the built-in rules.
pub async fn advise_or_score(
    advisor: Option<&dyn Advisor>,
    breakdown: &BudgetBreakdown,
    forecast: &SavingsForecast,
) -> Result<(BudgetInsights, InsightsSource), ValidationError> {
    if let Some(advisor) = advisor {
        match advisor.advise(breakdown, forecast).await {
            Ok(insights) => return Ok((insights, InsightsSource::Ai)),
            Err(err) => warn!(error = %err, "advisor failed, using rule-based insights"),
        }
    }
    Ok((score(breakdown, forecast)?, InsightsSource::Rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BudgetPeriod, HealthStatus, allocate, forecast};
    use rust_decimal_macros::dec;

    struct FixedAdvisor(Result<BudgetInsights, ()>);

    #[async_trait]
    impl Advisor for FixedAdvisor {
        async fn advise(
            &self,
            _breakdown: &BudgetBreakdown,
            _forecast: &SavingsForecast,
        ) -> Result<BudgetInsights, AdvisorError> {
            self.0
                .clone()
                .map_err(|_| AdvisorError::Request("connection reset".to_string()))
        }
    }

    fn plan() -> (BudgetBreakdown, SavingsForecast) {
        (
            allocate(dec!(30000), BudgetPeriod::Monthly).unwrap(),
            forecast(dec!(2000), dec!(5000), dec!(50000)).unwrap(),
        )
    }

    #[tokio::test]
    async fn without_advisor_uses_rules() {
        let (breakdown, savings) = plan();
        let (insights, source) = advise_or_score(None, &breakdown, &savings).await.unwrap();
        assert_eq!(source, InsightsSource::Rules);
        assert_eq!(insights, score(&breakdown, &savings).unwrap());
    }

    #[tokio::test]
    async fn advisor_success_is_reported_as_ai() {
        let (breakdown, savings) = plan();
        let canned = BudgetInsights {
            health_score: dec!(88.0),
            status: HealthStatus::Excellent,
            insights: vec![],
            recommendations: vec!["Keep going".to_string()],
        };
        let advisor = FixedAdvisor(Ok(canned.clone()));

        let (insights, source) = advise_or_score(Some(&advisor as &dyn Advisor), &breakdown, &savings)
            .await
            .unwrap();
        assert_eq!(source, InsightsSource::Ai);
        assert_eq!(insights, canned);
    }

    #[tokio::test]
    async fn advisor_failure_falls_back_to_rules() {
        let (breakdown, savings) = plan();
        let advisor = FixedAdvisor(Err(()));

        let (insights, source) = advise_or_score(Some(&advisor as &dyn Advisor), &breakdown, &savings)
            .await
            .unwrap();
        assert_eq!(source, InsightsSource::Rules);
        assert_eq!(insights.health_score, dec!(25.0));
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&InsightsSource::Ai).unwrap(), "\"ai\"");
        assert_eq!(serde_json::to_string(&InsightsSource::Rules).unwrap(), "\"rules\"");
    }
}
