use crate::config::LogConfig;
use crate::errors::AgentflowError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `config.filter` when set. With `config.json` the output is
/// one JSON object per line.
///
/// # Errors
///
/// Returns [`AgentflowError::Config`] if the filter does not parse or a global
/// subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), AgentflowError> {
    let registry = tracing_subscriber::registry().with(build_filter(config)?);
    let installed = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    installed.map_err(|e| AgentflowError::Config(format!("tracing already initialised: {e}")))
}

/// Resolves the level filter, preferring `RUST_LOG` over `config.filter`.
fn build_filter(config: &LogConfig) -> Result<EnvFilter, AgentflowError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            AgentflowError::Config(format!("invalid log filter '{}': {e}", config.filter))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    fn config(filter: &str) -> LogConfig {
        LogConfig {
            filter: filter.into(),
            json: false,
        }
    }

    #[test]
    fn test_filter_applies_to_scoped_subscriber() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = build_filter(&config("agentflow=warn")).unwrap();
        let subscriber = tracing_subscriber::registry().with(filter);

        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "agentflow::runner", Level::WARN));
            assert!(!tracing::enabled!(target: "agentflow::runner", Level::INFO));
        });
    }

    #[test]
    fn test_invalid_filter_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = build_filter(&config("agentflow=notalevel")).unwrap_err();
        assert!(matches!(err, AgentflowError::Config(message) if message.contains("notalevel")));
    }
}
