use {
    prometheus::Registry,
    prometheus_metric_storage::StorageRegistry,
    std::sync::OnceLock,
};

static REGISTRY: OnceLock<StorageRegistry> = OnceLock::new();

/// Configures the global metrics registry. The optional prefix is prepended
/// to every metric name registered through this registry.
///
/// Calling this more than once is a programming error.
pub fn setup_registry(prefix: Option<String>) {
    let registry = Registry::new_custom(prefix, None).expect("invalid metrics prefix");
    REGISTRY
        .set(StorageRegistry::new(registry))
        .expect("metrics registry already initialized");
}

/// The global metric storage registry. Initializes an unprefixed registry on
/// first use if `setup_registry` was never called, which keeps unit tests
/// independent of process setup.
pub fn get_storage_registry() -> &'static StorageRegistry {
    REGISTRY.get_or_init(|| StorageRegistry::new(Registry::new()))
}

pub fn get_registry() -> &'static Registry {
    get_storage_registry().registry()
}
