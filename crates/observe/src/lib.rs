pub mod metrics;
pub mod panic_hook;
pub mod tracing;
