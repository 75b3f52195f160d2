use {
    crate::{
        arguments::Arguments,
        domain::{IntentFiller, strategy},
        infra::{
            blockchain::Registry,
            cache::Cache,
            config,
            estimator::GasEstimator,
            monitor::{EventMonitor, LogSource},
            pricing::{Api, Pricing},
        },
    },
    alloy::signers::local::PrivateKeySigner,
    anyhow::{Context, Result},
    clap::Parser,
    std::sync::Arc,
};

/// Entry point: parses arguments, sets up observability, and runs the filler
/// until a shutdown signal arrives.
pub async fn start(args: impl Iterator<Item = String>) {
    let args = Arguments::parse_from(args);
    observe::tracing::initialize(&args.log_filter);
    observe::panic_hook::install();
    observe::metrics::setup_registry(Some("intent_filler".into()));
    tracing::info!("running intent filler with arguments:\n{args}");

    if let Err(err) = run(args).await {
        tracing::error!(?err, "intent filler exited with error");
        std::process::exit(1);
    }
}

pub async fn run(args: Arguments) -> Result<()> {
    let config = config::load(&args.config)?;

    let signer: PrivateKeySigner = config
        .private_key
        .expose()
        .parse()
        .context("invalid filler private key")?;
    tracing::info!(filler = %signer.address(), chains = config.chains.len(), "starting");

    let registry = Arc::new(Registry::new(&config.chains, signer).await?);
    let policies = config.confirmation_policies()?;
    let stables = Arc::new(config.stable_registry());
    let pricing = Arc::new(Pricing::new(
        Arc::new(Api::new(config.price_api.clone())),
        registry.clone(),
    ));
    let cache = Arc::new(Cache::default());
    let estimator = Arc::new(GasEstimator::new(
        registry.clone(),
        pricing.clone(),
        cache.clone(),
    ));

    let strategies: Vec<Arc<dyn strategy::Strategy>> = vec![
        Arc::new(strategy::BasicFiller::new(
            registry.clone(),
            pricing.clone(),
            estimator.clone(),
            stables.clone(),
        )),
        Arc::new(strategy::StableSwapFiller::new(
            registry.clone(),
            pricing.clone(),
            estimator.clone(),
            stables.clone(),
            cache.clone(),
        )),
    ];

    let sources: Vec<Arc<dyn LogSource>> = registry
        .chains()
        .map(|eth| eth.clone() as Arc<dyn LogSource>)
        .collect();
    let (monitor, orders) = EventMonitor::spawn(sources);

    let filler = IntentFiller::new(
        registry,
        policies,
        pricing,
        strategies,
        config.max_concurrent_orders,
    );

    tokio::select! {
        _ = filler.run(orders) => {
            tracing::warn!("order channel closed");
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    // Stop discovering new work, then let in-flight work finish.
    monitor.shutdown().await;
    filler.shutdown().await;
    tracing::info!("shut down cleanly");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    let mut interrupt =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("failed to register SIGINT handler");
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
    tokio::select! {
        _ = interrupt.recv() => (),
        _ = terminate.recv() => (),
    }
}

#[cfg(windows)]
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to register ctrl-c handler");
}
