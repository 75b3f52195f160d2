use {
    super::{ExecutionResult, Receipt, Strategy, ensure_approvals, order_open},
    crate::{
        domain::{
            eth::{Call, TxId, U256},
            order::Order,
            stable,
            swap::{self, SwapContext, SwapPlan},
        },
        infra::{
            blockchain::{Ethereum, Registry},
            cache::Cache,
            estimator::GasEstimator,
            pricing::Pricing,
        },
    },
    alloy::{
        eips::eip7702::Authorization,
        network::TransactionBuilder7702,
        rpc::types::TransactionRequest,
        signers::SignerSync,
        sol_types::SolCall,
    },
    anyhow::{Context as _, Result, bail},
    async_trait::async_trait,
    std::{sync::Arc, time::Instant},
};

/// Window the router execution stays valid for once planned.
const SWAP_DEADLINE_SECS: u64 = 120;

/// Fills orders the filler cannot pay directly by rebalancing its stable
/// holdings on the fly: the swap plan and the fill run as one atomic batch
/// through a delegated batch executor.
pub struct StableSwapFiller {
    registry: Arc<Registry>,
    pricing: Arc<Pricing>,
    estimator: Arc<GasEstimator>,
    stables: Arc<stable::Registry>,
    cache: Arc<Cache>,
}

impl StableSwapFiller {
    pub fn new(
        registry: Arc<Registry>,
        pricing: Arc<Pricing>,
        estimator: Arc<GasEstimator>,
        stables: Arc<stable::Registry>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            registry,
            pricing,
            estimator,
            stables,
            cache,
        }
    }

    async fn can_fill_inner(&self, order: &Order) -> Result<bool> {
        let dest = self.registry.get(&order.dest_chain)?;
        if !order_open(dest, order).await? {
            return Ok(false);
        }
        // Every output must be a stable asset the planner can source.
        if order.outputs.iter().any(|output| {
            self.stables
                .classify(&order.dest_chain, &output.token)
                .is_none()
        }) {
            return Ok(false);
        }
        // The filler's combined stable holdings must be worth at least the
        // order's output side.
        let balances = dest.stable_balances().await?;
        let holdings = self
            .pricing
            .value_of_balances(&order.dest_chain, &balances)
            .await?;
        let value = self.pricing.value_of(order).await?;
        Ok(holdings >= value.output_usd)
    }

    async fn profitability_inner(&self, order: &Order) -> Result<U256> {
        let plan = match self.plan(order).await {
            Ok(plan) => plan,
            Err(err) => {
                tracing::debug!(id = %order.id, %err, "swap planning failed");
                return Ok(U256::ZERO);
            }
        };

        let source = self.registry.get(&order.source_chain)?;
        let dest = self.registry.get(&order.dest_chain)?;
        let estimate = self.estimator.estimate(order).await;
        let source_decimals = {
            let fee_token = source.fee_token().await?;
            source.decimals(Some(fee_token)).await?
        };
        let dest_decimals = {
            let fee_token = dest.fee_token().await?;
            dest.decimals(Some(fee_token)).await?
        };

        let fees_adjusted =
            crate::domain::eth::rescale(order.fees, source_decimals, dest_decimals);
        let fill_cost = self
            .pricing
            .convert_gas_to_fee_token(estimate.fill_gas, &order.dest_chain, dest_decimals)
            .await?;
        let swap_cost = self
            .pricing
            .convert_gas_to_fee_token(plan.gas, &order.dest_chain, dest_decimals)
            .await?;
        let protocol_fee = self.estimator.post_fee(order).await?;

        Ok(fees_adjusted
            .saturating_sub(fill_cost + swap_cost + protocol_fee + estimate.relayer_fee))
    }

    /// The memoized swap plan covering the order's output shortfalls from
    /// the filler's current destination balances.
    async fn plan(&self, order: &Order) -> Result<SwapPlan> {
        let dest = self.registry.get(&order.dest_chain)?;
        let context = self.plan_context(dest).await?;
        self.cache
            .swap_plan(order.id, async {
                swap::plan(dest.as_ref(), &context, order).await
            })
            .await
            .map_err(|err| anyhow::anyhow!("{err}"))
    }

    async fn plan_context(&self, dest: &Arc<Ethereum>) -> Result<swap::PlanContext> {
        let assets = dest.assets();
        Ok(swap::PlanContext {
            assets,
            decimals: dest.stable_decimals().await?,
            balances: dest.stable_balances().await?,
            swap: SwapContext {
                filler: dest.filler(),
                router: dest.config().universal_router,
                weth: assets.wrapped_native,
                deadline: U256::from(dest.block_timestamp().await? + SWAP_DEADLINE_SECS),
            },
        })
    }

    async fn execute_inner(&self, order: &Order) -> Result<Receipt> {
        let started = Instant::now();
        let dest = self.registry.get(&order.dest_chain)?;
        let estimate = self.estimator.estimate(order).await;
        let plan = self.plan(order).await?;

        ensure_approvals(dest, order).await?;

        // The batch: rebalancing swaps, then the fill itself.
        let mut fill_value = order.eth_value().0;
        if !estimate.relayer_fee.is_zero() {
            fill_value += self
                .pricing
                .fee_token_to_native(estimate.relayer_fee, &order.dest_chain)
                .await?;
        }
        let fill_call = Call {
            to: dest.config().intent_gateway,
            value: fill_value,
            data: contracts::IntentGateway::fillOrderCall {
                order: order.to_gateway(),
                options: contracts::IntentGateway::FillOptions {
                    relayerFee: estimate.relayer_fee,
                },
            }
            .abi_encode()
            .into(),
        };
        let calls: Vec<contracts::BatchExecutor::Call> = plan
            .calls
            .into_iter()
            .chain([fill_call])
            .map(Into::into)
            .collect();

        // Delegate the EOA to the batch executor for exactly this
        // transaction. The authorization nonce is the account nonce + 1
        // because the transaction itself consumes the current one.
        let nonce = dest.nonce().await?;
        let authorization = Authorization {
            chain_id: U256::from(dest.chain_id()),
            address: dest.config().batch_executor,
            nonce: nonce + 1,
        };
        let signature = dest
            .signer()
            .sign_hash_sync(&authorization.signature_hash())
            .context("failed to sign batch authorization")?;
        let authorization = authorization.into_signed(signature);

        let gas_limit = (estimate.fill_gas + plan.gas).scale_pct(125);
        let tx = TransactionRequest::default()
            .from(dest.filler())
            .to(dest.filler())
            .input(
                contracts::BatchExecutor::executeCall { calls }
                    .abi_encode()
                    .into(),
            )
            .gas_limit(u64::try_from(gas_limit.0).unwrap_or(u64::MAX))
            .with_authorization_list(vec![authorization]);

        let receipt = dest.send(tx).await.context("batch submission failed")?;
        if !receipt.status() {
            bail!("batched fill reverted in {}", receipt.transaction_hash);
        }
        Ok(Receipt {
            tx: TxId(receipt.transaction_hash),
            gas_used: receipt.gas_used,
            effective_gas_price: receipt.effective_gas_price,
            block_number: receipt.block_number.unwrap_or_default(),
            wall_time: started.elapsed(),
        })
    }
}

#[async_trait]
impl Strategy for StableSwapFiller {
    fn name(&self) -> &'static str {
        "stable-swap"
    }

    async fn can_fill(&self, order: &Order) -> bool {
        self.can_fill_inner(order).await.unwrap_or_else(|err| {
            tracing::debug!(id = %order.id, %err, "stable-swap can_fill errored");
            false
        })
    }

    async fn calculate_profitability(&self, order: &Order) -> U256 {
        self.profitability_inner(order).await.unwrap_or_else(|err| {
            tracing::debug!(id = %order.id, %err, "stable-swap profitability errored");
            U256::ZERO
        })
    }

    async fn execute_order(&self, order: &Order) -> ExecutionResult {
        match self.execute_inner(order).await {
            Ok(receipt) => ExecutionResult::filled(self.name(), receipt),
            Err(err) => ExecutionResult::failed(self.name(), format!("{err:#}")),
        }
    }
}
