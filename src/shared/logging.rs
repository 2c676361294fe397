use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Installs the global tracing subscriber. Safe to call more than once.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "workforce_sync=debug,info".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init();
    });
}
