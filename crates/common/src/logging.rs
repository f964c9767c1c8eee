use crate::config::Environment;
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt,
};

/// Initialize the tracing subscriber: pretty output for development, JSON for
/// production.
///
/// Uses RUST_LOG for filtering (defaults to "info"). An OpenTelemetry layer is
/// attached so spans are exported once a global tracer provider exists.
pub fn setup_logging(environment: Environment) {
    init_with_layer(environment, tracing_opentelemetry::layer());
}

pub(crate) fn init_with_layer<L>(environment: Environment, otel_layer: L)
where
    L: Layer<tracing_subscriber::layer::Layered<EnvFilter, tracing_subscriber::Registry>>
        + Send
        + Sync
        + 'static,
{
    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(otel_layer);

    match environment {
        Environment::Production => registry.with(json_layer()).init(),
        Environment::Development => registry.with(pretty_layer()).init(),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn json_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer().json().with_level(true)
}

fn pretty_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer().pretty().with_ansi(true)
}
