use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;

use crate::api::ServiceKind;
use crate::advisor::{DEFAULT_LLM_BASE_URL, DEFAULT_LLM_MODEL};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "budget-assistant",
    version,
    about = "Budget allocation, savings forecast and insights services behind a resilient gateway"
)]
pub struct Cli {
    #[command(flatten)]
    pub log: LogConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway in front of already running services.
    Gateway(GatewayConfig),
    /// Run a single calculator service.
    Service(ServiceArgs),
    /// Run all three services and the gateway in one process.
    ServeAll(GatewayConfig),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Args, Debug, Clone)]
pub struct LogConfig {
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json, global = true)]
    pub log_format: LogFormat,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum Environment {
    #[default]
    #[value(alias = "dev")]
    Development,
    #[value(alias = "prod")]
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn app_title(self) -> &'static str {
        match self {
            Environment::Development => "Smart Budget Assistant - Demo",
            Environment::Production => "Smart Budget Assistant",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    #[arg(value_enum)]
    pub kind: ServiceKind,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Defaults to the service's conventional port.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,
}

impl ServiceArgs {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(self.kind.default_port())
    }
}

#[derive(Args, Debug, Clone)]
pub struct GatewayConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "ENVIRONMENT", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    #[arg(long, env = "BUDGET_SERVICE_URL", default_value = "http://localhost:8001")]
    pub budget_service_url: String,

    #[arg(long, env = "SAVINGS_SERVICE_URL", default_value = "http://localhost:8002")]
    pub savings_service_url: String,

    #[arg(long, env = "INSIGHTS_SERVICE_URL", default_value = "http://localhost:8003")]
    pub insights_service_url: String,

    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://localhost:8000"
    )]
    pub allowed_origins: Vec<String>,

    #[arg(long, env = "RATE_LIMIT_REQUESTS", default_value_t = 100)]
    pub rate_limit_requests: u32,

    /// Rate limit window in seconds.
    #[arg(long, env = "RATE_LIMIT_WINDOW", default_value_t = 3600)]
    pub rate_limit_window: u64,

    #[arg(long, env = "SERVICE_TIMEOUT_SECS", default_value_t = 10)]
    pub service_timeout_secs: u64,

    #[arg(long, env = "BREAKER_FAILURE_THRESHOLD", default_value_t = 3)]
    pub breaker_failure_threshold: u32,

    #[arg(long, env = "BREAKER_RECOVERY_SECS", default_value_t = 30)]
    pub breaker_recovery_secs: u64,

    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub retry_max_attempts: u32,

    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value_t = 1000)]
    pub retry_base_delay_ms: u64,

    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value_t = 60_000)]
    pub retry_max_delay_ms: u64,

    /// Enables language-model insights when set.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: Option<String>,

    #[arg(long, env = "LLM_BASE_URL", default_value = DEFAULT_LLM_BASE_URL)]
    pub llm_base_url: String,

    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_LLM_MODEL)]
    pub llm_model: String,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_requests == 0 {
            return invalid("--rate-limit-requests must be > 0");
        }
        if self.rate_limit_window == 0 {
            return invalid("--rate-limit-window must be > 0");
        }
        if self.service_timeout_secs == 0 {
            return invalid("--service-timeout-secs must be > 0");
        }
        if self.breaker_failure_threshold == 0 {
            return invalid("--breaker-failure-threshold must be > 0");
        }
        if self.retry_max_attempts == 0 {
            return invalid("--retry-max-attempts must be > 0");
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return invalid("--retry-base-delay-ms must be <= --retry-max-delay-ms");
        }

        for (flag, url) in [
            ("--budget-service-url", &self.budget_service_url),
            ("--savings-service-url", &self.savings_service_url),
            ("--insights-service-url", &self.insights_service_url),
            ("--llm-base-url", &self.llm_base_url),
        ] {
            let is_http = reqwest::Url::parse(url)
                .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !is_http {
                return Err(ConfigError::Invalid(format!(
                    "{flag} must be an absolute http(s) URL, got '{url}'"
                )));
            }
        }

        if self.environment.is_production() && self.origins().is_empty() {
            return invalid("--allowed-origins must list at least one origin in production");
        }
        Ok(())
    }

    pub fn service_url(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::Budget => &self.budget_service_url,
            ServiceKind::Savings => &self.savings_service_url,
            ServiceKind::Insights => &self.insights_service_url,
        }
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window)
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(self.service_timeout_secs)
    }

    pub fn breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            recovery_timeout: Duration::from_secs(self.breaker_recovery_secs),
        }
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            ..RetryConfig::default()
        }
    }

    /// The API key, if one was given and is not blank.
    pub fn llm_api_key(&self) -> Option<&str> {
        self.groq_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }
}

fn invalid(msg: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["budget-assistant"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("valid arguments")
    }

    fn gateway(args: &[&str]) -> GatewayConfig {
        let mut argv = vec!["gateway"];
        argv.extend_from_slice(args);
        match parse(&argv).command {
            Command::Gateway(config) => config,
            other => panic!("expected gateway command, got {other:?}"),
        }
    }

    #[test]
    fn gateway_defaults_are_valid() {
        let config = gateway(&[]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.rate_limit_requests, 100);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(3600));
        assert_eq!(config.breaker().failure_threshold, 3);
        assert_eq!(config.breaker().recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.retry().max_attempts, 3);
        assert_eq!(config.service_url(ServiceKind::Insights), "http://localhost:8003");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_origins_and_environment_aliases() {
        let config = gateway(&[
            "--environment",
            "prod",
            "--allowed-origins",
            "https://budget.example.com, https://www.budget.example.com",
        ]);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(
            config.origins(),
            vec![
                "https://budget.example.com".to_string(),
                "https://www.budget.example.com".to_string()
            ]
        );
        assert_eq!(config.environment.app_title(), "Smart Budget Assistant");
    }

    #[test]
    fn validate_names_the_offending_flag() {
        let err = gateway(&["--rate-limit-requests", "0"]).validate().unwrap_err();
        assert_eq!(err.to_string(), "--rate-limit-requests must be > 0");

        let err = gateway(&["--retry-base-delay-ms", "5000", "--retry-max-delay-ms", "100"])
            .validate()
            .unwrap_err();
        assert!(err.to_string().starts_with("--retry-base-delay-ms"));

        let err = gateway(&["--savings-service-url", "savings:8002"])
            .validate()
            .unwrap_err();
        assert!(err.to_string().starts_with("--savings-service-url"));
    }

    #[test]
    fn blank_api_key_disables_advisor() {
        assert_eq!(gateway(&["--groq-api-key", "  "]).llm_api_key(), None);
        assert_eq!(gateway(&["--groq-api-key", "gsk_test"]).llm_api_key(), Some("gsk_test"));
    }

    #[test]
    fn service_subcommand_uses_conventional_port() {
        match parse(&["--log-format", "pretty", "service", "savings"]) {
            Cli {
                log,
                command: Command::Service(args),
            } => {
                assert_eq!(log.log_format, LogFormat::Pretty);
                assert_eq!(args.kind, ServiceKind::Savings);
                assert_eq!(args.port(), 8002);
            }
            other => panic!("unexpected parse {other:?}"),
        }
    }
}
