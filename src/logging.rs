use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogConfig, LogFormat};

/// Installs the global subscriber. `RUST_LOG` wins over `--log-level`.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(&config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(true),
            )
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn default_directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    format!("budget_assistant={level},tower_http=info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_scope_our_crate() {
        assert_eq!(
            default_directives(" DEBUG "),
            "budget_assistant=debug,tower_http=info"
        );
        assert!(EnvFilter::try_new(default_directives("warn")).is_ok());
    }
}
