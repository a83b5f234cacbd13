use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Advisor, AdvisorError};
use crate::core::{BudgetBreakdown, BudgetInsights, SavingsForecast};
use crate::resilience::{BreakerError, CircuitBreaker, CircuitBreakerConfig};

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "llama3-8b-8192";

const TEMPERATURE: f64 = 0.2;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const SYSTEM_PROMPT: &str = "You are a personal finance assistant. Reply with a single JSON object \
with the keys health_score (number 0-100), status (excellent, on_track or needs_improvement), \
insights (array of {type: success|warning|info, message}) and recommendations (array of strings). \
No prose outside the JSON.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Advisor backed by an OpenAI-compatible chat-completions endpoint.
pub struct ChatAdvisor {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    breaker: CircuitBreaker,
}

impl ChatAdvisor {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_LLM_MODEL.to_string(),
            breaker: CircuitBreaker::new("advisor", CircuitBreakerConfig::default()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = CircuitBreaker::new("advisor", config);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: String) -> Result<String, AdvisorError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| AdvisorError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdvisorError::Status {
                status: status.as_u16(),
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| AdvisorError::Parse(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AdvisorError::Parse("reply has no content".to_string()))
    }
}

#[async_trait]
impl Advisor for ChatAdvisor {
    async fn advise(
        &self,
        breakdown: &BudgetBreakdown,
        forecast: &SavingsForecast,
    ) -> Result<BudgetInsights, AdvisorError> {
        let prompt = build_prompt(breakdown, forecast)?;
        debug!(model = %self.model, "requesting advisor insights");

        let content = self
            .breaker
            .call(|| self.complete(prompt))
            .await
            .map_err(|err| match err {
                BreakerError::Open { .. } => AdvisorError::CircuitOpen,
                BreakerError::Inner(err) => err,
            })?;

        let insights = parse_insights(&content)?;
        info!(health_score = %insights.health_score, "advisor insights received");
        Ok(insights)
    }
}

fn build_prompt(
    breakdown: &BudgetBreakdown,
    forecast: &SavingsForecast,
) -> Result<String, AdvisorError> {
    let data = serde_json::json!({
        "budget_breakdown": breakdown,
        "savings_data": forecast,
    });
    let data =
        serde_json::to_string_pretty(&data).map_err(|e| AdvisorError::Parse(e.to_string()))?;
    Ok(format!(
        "Assess the financial health of this monthly plan and suggest concrete next steps.\n{data}"
    ))
}

/// Reads a `BudgetInsights` object out of an assistant message, tolerating
/// a surrounding markdown code fence.
fn parse_insights(content: &str) -> Result<BudgetInsights, AdvisorError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let insights: BudgetInsights =
        serde_json::from_str(body).map_err(|e| AdvisorError::Parse(e.to_string()))?;
    if insights.health_score < Decimal::ZERO || insights.health_score > Decimal::ONE_HUNDRED {
        return Err(AdvisorError::ScoreOutOfRange(
            insights.health_score.to_string(),
        ));
    }
    Ok(insights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BudgetPeriod, HealthStatus, InsightKind, allocate, forecast};
    use crate::resilience::CircuitState;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use rust_decimal_macros::dec;
    use tokio::net::TcpListener;

    const REPLY: &str = r#"{"health_score": 72.5, "status": "on_track",
        "insights": [{"type": "info", "message": "Savings are steady"}],
        "recommendations": ["Automate transfers"]}"#;

    async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("test server");
        });
        format!("http://{addr}")
    }

    fn plan() -> (BudgetBreakdown, SavingsForecast) {
        (
            allocate(dec!(30000), BudgetPeriod::Monthly).unwrap(),
            forecast(dec!(2000), dec!(5000), dec!(50000)).unwrap(),
        )
    }

    #[test]
    fn parses_plain_and_fenced_replies() {
        let plain = parse_insights(REPLY).expect("plain json");
        assert_eq!(plain.health_score, dec!(72.5));
        assert_eq!(plain.status, HealthStatus::OnTrack);
        assert_eq!(plain.insights[0].kind, InsightKind::Info);

        let fenced = parse_insights(&format!("```json\n{REPLY}\n```")).expect("fenced json");
        assert_eq!(fenced, plain);
    }

    #[test]
    fn rejects_out_of_range_scores_and_prose() {
        let err = parse_insights(
            r#"{"health_score": 140, "status": "excellent", "insights": [], "recommendations": []}"#,
        )
        .expect_err("score too high");
        assert!(matches!(err, AdvisorError::ScoreOutOfRange(_)));

        let err = parse_insights("Your budget looks great!").expect_err("not json");
        assert!(matches!(err, AdvisorError::Parse(_)));
    }

    #[tokio::test]
    async fn advises_through_chat_completions() {
        let app = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer test-key")
                );
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["messages"][1]["role"], "user");
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": REPLY}}]
                }))
            }),
        );
        let base = spawn(app).await;
        let advisor = ChatAdvisor::new("test-key")
            .with_base_url(base)
            .with_model("test-model");

        let (breakdown, savings) = plan();
        let insights = advisor.advise(&breakdown, &savings).await.expect("advice");
        assert_eq!(insights.recommendations, vec!["Automate transfers".to_string()]);
    }

    #[tokio::test]
    async fn repeated_failures_open_the_advisor_breaker() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = spawn(app).await;
        let advisor = ChatAdvisor::new("key")
            .with_base_url(base)
            .with_breaker(CircuitBreakerConfig {
                failure_threshold: 2,
                recovery_timeout: Duration::from_secs(60),
            });
        let (breakdown, savings) = plan();

        for _ in 0..2 {
            let err = advisor.advise(&breakdown, &savings).await.expect_err("503");
            assert!(matches!(err, AdvisorError::Status { status: 503 }));
        }
        assert_eq!(advisor.breaker.state(), CircuitState::Open);
        let err = advisor.advise(&breakdown, &savings).await.expect_err("open");
        assert!(matches!(err, AdvisorError::CircuitOpen));
    }
}
