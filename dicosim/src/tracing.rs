use miette::{IntoDiagnostic, WrapErr};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::TracingConfig;

/// Initializes the tracing subscriber: an `EnvFilter` honoring `RUST_LOG`,
/// and either a human-readable or a JSON stdout layer.
///
/// # Errors
///
/// Fails when a global subscriber has already been installed.
pub fn try_init(config: &TracingConfig) -> miette::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dicosim=debug,lerobert=debug,info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let initialized = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    initialized
        .into_diagnostic()
        .wrap_err("could not init registry")?;

    Ok(())
}
