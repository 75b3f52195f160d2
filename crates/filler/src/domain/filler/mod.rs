use {
    crate::{
        domain::{
            confirmation,
            eth::TxId,
            order::{Order, OrderId},
            strategy::{Outcome, Strategy},
        },
        infra::{
            blockchain::Registry,
            observe,
            pool::{AnalysisPool, ChainPools},
            pricing::Pricing,
        },
    },
    futures::future::join_all,
    std::{sync::Arc, time::Duration},
    tokio::sync::{broadcast, mpsc},
    tracing::Instrument,
};

/// How often the source chain is polled while waiting for confirmations.
const CONFIRMATION_POLL: Duration = Duration::from_millis(300);

/// Lifecycle notifications for operators and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    OrderFilled { id: OrderId, tx: TxId },
}

/// The orchestrator: takes orders off the monitor channel, waits out the
/// confirmation policy, lets every strategy bid, and hands the best bid to
/// the destination chain's serial execution queue.
#[derive(Clone)]
pub struct IntentFiller(Arc<Inner>);

struct Inner {
    registry: Arc<Registry>,
    policies: confirmation::Policies,
    pricing: Arc<Pricing>,
    strategies: Vec<Arc<dyn Strategy>>,
    analysis: AnalysisPool,
    execution: ChainPools,
    events: broadcast::Sender<Event>,
}

impl IntentFiller {
    pub fn new(
        registry: Arc<Registry>,
        policies: confirmation::Policies,
        pricing: Arc<Pricing>,
        strategies: Vec<Arc<dyn Strategy>>,
        max_concurrent_orders: usize,
    ) -> Self {
        let chains = registry.chains().map(|eth| eth.chain().clone()).collect::<Vec<_>>();
        let (events, _) = broadcast::channel(1024);
        Self(Arc::new(Inner {
            registry,
            policies,
            pricing,
            strategies,
            analysis: AnalysisPool::new(max_concurrent_orders),
            execution: ChainPools::new(chains),
            events,
        }))
    }

    /// Subscribes to order lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.0.events.subscribe()
    }

    /// Consumes the order channel until it closes. Each order is processed
    /// on the bounded analysis pool; a single order failing never takes the
    /// loop down.
    pub async fn run(&self, mut orders: mpsc::UnboundedReceiver<Order>) {
        while let Some(order) = orders.recv().await {
            let inner = self.0.clone();
            let span = tracing::info_span!(
                "order",
                id = %order.id,
                source = %order.source_chain,
                dest = %order.dest_chain,
            );
            self.0
                .analysis
                .spawn(async move { inner.process(order).await }.instrument(span));
        }
    }

    /// Waits until analysis and execution queues are empty.
    pub async fn shutdown(self) {
        let inner = self.0;
        inner.analysis.drain().await;
        // Nobody submits anymore; drain the serial execution workers.
        match Arc::try_unwrap(inner) {
            Ok(inner) => inner.execution.drain().await,
            Err(_) => tracing::warn!("execution pools still referenced at shutdown"),
        }
    }
}

impl Inner {
    /// Phase one of an order's life: valuation and the confirmation wait.
    /// Bidding runs as a separate pool task so a slow confirmation wait
    /// doesn't starve profitability analysis of other orders.
    async fn process(self: Arc<Self>, order: Order) {
        let value = match self.pricing.value_of(&order).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%err, "failed to value order, dropping");
                return;
            }
        };
        let required = match self
            .policies
            .required_confirmations(&order.source_chain, value.input_usd)
        {
            Ok(required) => required,
            Err(err) => {
                tracing::warn!(%err, "no confirmation policy, dropping order");
                return;
            }
        };
        self.await_confirmations(&order, required).await;

        let inner = self.clone();
        let span = tracing::Span::current();
        self.analysis
            .spawn(async move { inner.bid(order).await }.instrument(span));
    }

    /// Polls the placement transaction until it has the required depth.
    /// Transient RPC failures only log; the deadline check at fill time is
    /// what bounds this loop's lifetime.
    async fn await_confirmations(&self, order: &Order, required: u64) {
        let source = match self.registry.get(&order.source_chain) {
            Ok(source) => source.clone(),
            Err(err) => {
                tracing::warn!(%err, "source chain unavailable");
                return;
            }
        };
        tracing::debug!(required, "waiting for confirmations");
        loop {
            match source.confirmations(order.placement.tx).await {
                Ok(confirmations) if confirmations >= required => {
                    tracing::debug!(confirmations, "order confirmed");
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%err, "confirmation poll failed, retrying");
                }
            }
            tokio::time::sleep(CONFIRMATION_POLL).await;
        }
    }

    /// Phase two: every strategy bids in parallel, the most profitable one
    /// wins the order and is enqueued on the destination chain's serial
    /// execution queue.
    async fn bid(&self, order: Order) {
        let bids = join_all(self.strategies.iter().map(|strategy| {
            let order = &order;
            async move {
                if !strategy.can_fill(order).await {
                    return None;
                }
                let profit = strategy.calculate_profitability(order).await;
                tracing::debug!(strategy = strategy.name(), %profit, "strategy bid");
                (!profit.is_zero()).then(|| (strategy.clone(), profit))
            }
        }))
        .await;

        let mut bids: Vec<_> = bids.into_iter().flatten().collect();
        bids.sort_by(|a, b| b.1.cmp(&a.1));
        let Some((strategy, profit)) = bids.into_iter().next() else {
            observe::no_profitable_strategy(&order);
            return;
        };
        tracing::info!(
            strategy = strategy.name(),
            %profit,
            "strategy selected, queueing execution",
        );

        let dest = order.dest_chain.clone();
        let span = tracing::Span::current();
        let events = self.events.clone();
        let submission = self.execution.submit(
            &dest,
            async move {
                let result = strategy.execute_order(&order).await;
                observe::order_executed(&order, &result);
                if let Outcome::Filled(receipt) = &result.outcome {
                    let _ = events.send(Event::OrderFilled {
                        id: order.id,
                        tx: receipt.tx,
                    });
                }
            }
            .instrument(span),
        );
        if let Err(err) = submission {
            tracing::warn!(%err, "failed to queue execution");
        }
    }
}
