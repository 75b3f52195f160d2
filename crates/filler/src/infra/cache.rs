use {
    crate::domain::{
        eth::GasEstimate,
        order::OrderId,
        swap::{self, SwapPlan},
    },
    std::{future::Future, sync::Arc},
};

/// Bound on memoized entries; old entries are evicted least-recently-used.
const CAPACITY: u64 = 10_000;

/// Per-order memoization of the expensive derived artifacts: gas estimates
/// and swap plans. Entries are written once per order id and read by every
/// strategy; they never need to survive a restart.
pub struct Cache {
    gas: moka::future::Cache<OrderId, GasEstimate>,
    plans: moka::future::Cache<OrderId, SwapPlan>,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            gas: moka::future::Cache::new(CAPACITY),
            plans: moka::future::Cache::new(CAPACITY),
        }
    }
}

impl Cache {
    /// The memoized gas estimate for an order, computing it on first use.
    /// Concurrent callers for the same id share one computation.
    pub async fn gas_estimate(
        &self,
        id: OrderId,
        init: impl Future<Output = GasEstimate>,
    ) -> GasEstimate {
        self.gas.get_with(id, init).await
    }

    /// The memoized swap plan for an order. Planning failures are not
    /// cached; a later call retries with fresh balances.
    pub async fn swap_plan(
        &self,
        id: OrderId,
        init: impl Future<Output = Result<SwapPlan, swap::Error>>,
    ) -> Result<SwapPlan, Arc<swap::Error>> {
        self.plans.try_get_with(id, init).await
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::domain::{eth::Gas, order::testing},
        std::sync::atomic::{AtomicU32, Ordering},
    };

    fn estimate(fill: u64) -> GasEstimate {
        GasEstimate {
            fill_gas: Gas::from(fill),
            post_gas: Gas::from(270_000u64),
            relayer_fee: Default::default(),
        }
    }

    #[tokio::test]
    async fn gas_estimate_is_computed_once() {
        let cache = Cache::default();
        let id = testing::order().id;
        let calls = AtomicU32::new(0);

        let first = cache
            .gas_estimate(id, async {
                calls.fetch_add(1, Ordering::SeqCst);
                estimate(100)
            })
            .await;
        // The second init closure must never run.
        let second = cache
            .gas_estimate(id, async {
                calls.fetch_add(1, Ordering::SeqCst);
                estimate(999)
            })
            .await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_plans_are_retried() {
        let cache = Cache::default();
        let id = testing::order().id;

        let first = cache
            .swap_plan(id, async {
                Err(swap::Error::Other(anyhow::anyhow!("quote backend down")))
            })
            .await;
        assert!(first.is_err());

        let second = cache.swap_plan(id, async { Ok(SwapPlan::default()) }).await;
        assert_eq!(second.unwrap(), SwapPlan::default());
    }
}
