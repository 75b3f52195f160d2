use {
    super::{ExecutionResult, Receipt, Strategy, order_open},
    crate::{
        domain::{
            eth::{self, Address, TxId, U256},
            order::Order,
            stable,
        },
        infra::{blockchain::Registry, estimator::GasEstimator, pricing::Pricing},
    },
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    std::{collections::HashMap, sync::Arc, time::Instant},
};

/// Fills orders whose inputs and outputs are the same stable asset on both
/// chains, so no swapping is needed; the filler just pays out of its
/// existing destination balances.
pub struct BasicFiller {
    registry: Arc<Registry>,
    pricing: Arc<Pricing>,
    estimator: Arc<GasEstimator>,
    stables: Arc<stable::Registry>,
}

impl BasicFiller {
    pub fn new(
        registry: Arc<Registry>,
        pricing: Arc<Pricing>,
        estimator: Arc<GasEstimator>,
        stables: Arc<stable::Registry>,
    ) -> Self {
        Self {
            registry,
            pricing,
            estimator,
            stables,
        }
    }

    async fn can_fill_inner(&self, order: &Order) -> Result<bool> {
        if order.inputs.is_empty() || order.inputs.len() != order.outputs.len() {
            return Ok(false);
        }
        let source = self.registry.get(&order.source_chain)?;
        let dest = self.registry.get(&order.dest_chain)?;
        if !order_open(dest, order).await? {
            return Ok(false);
        }

        // Every pair must be the same stable asset and the same
        // decimal-normalized amount on both sides.
        for (input, output) in order.inputs.iter().zip(&order.outputs) {
            let Some(input_class) = self.stables.classify(&order.source_chain, &input.token)
            else {
                return Ok(false);
            };
            let Some(output_class) = self.stables.classify(&order.dest_chain, &output.token)
            else {
                return Ok(false);
            };
            if input_class != output_class {
                return Ok(false);
            }
            let input_decimals = source
                .decimals(eth::token_of(&input.token).map(|token| token.0))
                .await?;
            let output_decimals = dest
                .decimals(eth::token_of(&output.token).map(|token| token.0))
                .await?;
            if !amounts_match(input.amount, input_decimals, output.amount, output_decimals) {
                return Ok(false);
            }
        }

        // The filler must already hold every output in full.
        let mut erc20_totals: HashMap<Address, U256> = HashMap::new();
        let mut native_total = U256::ZERO;
        for output in &order.outputs {
            match eth::token_of(&output.token) {
                Some(token) => {
                    *erc20_totals.entry(token.0).or_default() += output.amount;
                }
                None => native_total += output.amount,
            }
        }
        for (token, required) in erc20_totals {
            let balance = dest.erc20(token).balanceOf(dest.filler()).call().await?;
            if balance < required {
                return Ok(false);
            }
        }
        if !native_total.is_zero() && dest.balance(dest.filler()).await? < native_total {
            return Ok(false);
        }
        Ok(true)
    }

    async fn profitability_inner(&self, order: &Order) -> Result<U256> {
        let source = self.registry.get(&order.source_chain)?;
        let dest = self.registry.get(&order.dest_chain)?;

        let estimate = self.estimator.estimate(order).await;
        let source_fee_token = source.fee_token().await?;
        let source_decimals = source.decimals(Some(source_fee_token)).await?;
        let dest_fee_token = dest.fee_token().await?;
        let dest_decimals = dest.decimals(Some(dest_fee_token)).await?;

        let fees_adjusted = eth::rescale(order.fees, source_decimals, dest_decimals);
        let fill_cost = self
            .pricing
            .convert_gas_to_fee_token(estimate.fill_gas, &order.dest_chain, dest_decimals)
            .await?;
        let protocol_fee = self.estimator.post_fee(order).await?;

        Ok(residual(
            fees_adjusted,
            fill_cost,
            protocol_fee,
            estimate.relayer_fee,
        ))
    }

    async fn execute_inner(&self, order: &Order) -> Result<Receipt> {
        let started = Instant::now();
        let dest = self.registry.get(&order.dest_chain)?;
        let estimate = self.estimator.estimate(order).await;

        super::ensure_approvals(dest, order).await?;

        let mut value = order.eth_value().0;
        if !estimate.relayer_fee.is_zero() {
            value += self
                .pricing
                .fee_token_to_native(estimate.relayer_fee, &order.dest_chain)
                .await?;
        }
        let gas_limit = estimate.fill_gas.scale_pct(125);

        let receipt = dest
            .gateway_write()
            .fillOrder(
                order.to_gateway(),
                contracts::IntentGateway::FillOptions {
                    relayerFee: estimate.relayer_fee,
                },
            )
            .value(value)
            .gas(u64::try_from(gas_limit.0).unwrap_or(u64::MAX))
            .send()
            .await
            .context("fillOrder submission failed")?
            .get_receipt()
            .await
            .context("fillOrder receipt unavailable")?;
        if !receipt.status() {
            bail!("fillOrder reverted in {}", receipt.transaction_hash);
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
impl Strategy for BasicFiller {
    fn name(&self) -> &'static str {
        "basic"
    }

    async fn can_fill(&self, order: &Order) -> bool {
        self.can_fill_inner(order).await.unwrap_or_else(|err| {
            tracing::debug!(id = %order.id, %err, "basic can_fill errored");
            false
        })
    }

    async fn calculate_profitability(&self, order: &Order) -> U256 {
        self.profitability_inner(order).await.unwrap_or_else(|err| {
            tracing::debug!(id = %order.id, %err, "basic profitability errored");
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

/// Whether two amounts are equal once normalized to a common decimal base.
/// Cross-multiplying keeps the comparison exact.
fn amounts_match(
    input_amount: U256,
    input_decimals: u8,
    output_amount: U256,
    output_decimals: u8,
) -> bool {
    let ten = U256::from(10);
    input_amount * ten.pow(U256::from(output_decimals))
        == output_amount * ten.pow(U256::from(input_decimals))
}

/// The surplus left of the order fees after every cost, all in destination
/// fee-token base units. Saturates at zero.
fn residual(fees_adjusted: U256, fill_cost: U256, protocol_fee: U256, relayer_fee: U256) -> U256 {
    fees_adjusted.saturating_sub(fill_cost + protocol_fee + relayer_fee)
}
