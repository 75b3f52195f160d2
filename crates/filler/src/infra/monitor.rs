use {
    crate::{
        domain::order::Order,
        infra::{blockchain::retry::RpcExhausted, observe},
    },
    async_trait::async_trait,
    chain::StateMachine,
    std::{sync::Arc, time::Duration},
    tokio::{
        sync::{Mutex, mpsc, watch},
        task::JoinHandle,
    },
};

/// How often each chain is polled for new orders.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);
/// Upper bound on blocks scanned per tick; the rest is caught up on later
/// ticks.
pub const MAX_BLOCKS_PER_TICK: u64 = 1000;

/// Where the monitor reads order placements from. One per source chain;
/// implemented by the blockchain layer and mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogSource: Send + Sync {
    fn chain(&self) -> &StateMachine;
    async fn latest_block(&self) -> Result<u64, RpcExhausted>;
    /// Decoded orders placed in the inclusive block range, in
    /// `(block_number, log_index)` order. Undecodable logs are skipped.
    async fn order_logs(&self, from: u64, to: u64) -> Result<Vec<Order>, RpcExhausted>;
}

/// Polls every source chain for `OrderPlaced` logs and emits decoded orders,
/// in block order per chain, on the order channel.
pub struct EventMonitor {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    locks: Vec<Arc<Mutex<()>>>,
}

impl EventMonitor {
    /// Spawns one scan loop per source. Returns the monitor handle and the
    /// channel new orders arrive on.
    pub fn spawn(sources: Vec<Arc<dyn LogSource>>) -> (Self, mpsc::UnboundedReceiver<Order>) {
        let (orders, receiver) = mpsc::unbounded_channel();
        let (stop, _) = watch::channel(false);
        let mut tasks = Vec::with_capacity(sources.len());
        let mut locks = Vec::with_capacity(sources.len());
        for source in sources {
            let lock = Arc::new(Mutex::new(()));
            locks.push(lock.clone());
            tasks.push(tokio::spawn(scan_loop(
                source,
                lock,
                orders.clone(),
                stop.subscribe(),
            )));
        }
        (Self { stop, tasks, locks }, receiver)
    }

    /// Stops the tickers, then takes every scan lock once so in-flight scans
    /// have drained before resources are released.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        for lock in &self.locks {
            drop(lock.lock().await);
        }
    }
}

async fn scan_loop(
    source: Arc<dyn LogSource>,
    lock: Arc<Mutex<()>>,
    orders: mpsc::UnboundedSender<Order>,
    mut stop: watch::Receiver<bool>,
) {
    let chain = source.chain().clone();
    let mut interval = tokio::time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // `None` until the first successful head fetch establishes `head - 1`.
    let mut last_scanned: Option<u64> = None;
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {
                // A scan still running from an earlier tick wins; this tick
                // is dropped, not queued.
                let Ok(_guard) = lock.try_lock() else {
                    continue;
                };
                scan_tick(source.as_ref(), &chain, &mut last_scanned, &orders).await;
            }
        }
    }
    tracing::debug!(%chain, "scan loop stopped");
}

/// One scan tick: fetch the head, scan at most [`MAX_BLOCKS_PER_TICK`]
/// blocks past the cursor, emit decoded orders, and advance the cursor only
/// when the whole range was fetched.
async fn scan_tick(
    source: &dyn LogSource,
    chain: &StateMachine,
    last_scanned: &mut Option<u64>,
    orders: &mpsc::UnboundedSender<Order>,
) {
    let head = match source.latest_block().await {
        Ok(head) => head,
        Err(err) => {
            tracing::warn!(%chain, %err, "failed to fetch chain head");
            observe::scan_error(chain);
            return;
        }
    };
    let last = *last_scanned.get_or_insert_with(|| head.saturating_sub(1));
    let Some((from, to)) = scan_range(last, head, MAX_BLOCKS_PER_TICK) else {
        return;
    };

    match source.order_logs(from, to).await {
        Ok(batch) => {
            for order in batch {
                tracing::info!(
                    id = %order.id,
                    source = %order.source_chain,
                    dest = %order.dest_chain,
                    tx = %order.placement.tx,
                    "order placed",
                );
                observe::order_seen(chain);
                if orders.send(order).is_err() {
                    // The orchestrator is gone; nothing left to do.
                    return;
                }
            }
            *last_scanned = Some(to);
        }
        Err(err) => {
            // The cursor stays put so the same range is retried next tick.
            tracing::warn!(%chain, from, to, %err, "log query failed");
            observe::scan_error(chain);
        }
    }
}

/// The next inclusive block range to scan, or `None` when the cursor has
/// caught up to the head.
fn scan_range(last_scanned: u64, head: u64, max_blocks: u64) -> Option<(u64, u64)> {
    if head <= last_scanned {
        return None;
    }
    let from = last_scanned + 1;
    let to = head.min(from + max_blocks);
    Some((from, to))
}
