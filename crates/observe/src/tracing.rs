use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Sets up the global tracing subscriber with an env-filter style directive
/// string, e.g. `info,filler=debug`.
///
/// Must be called at most once per process; later calls are ignored so tests
/// can initialize logging without coordinating.
pub fn initialize(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?}: {err}; falling back to \"info\"");
        EnvFilter::new("info")
    });
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
