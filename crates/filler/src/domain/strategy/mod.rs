use {
    crate::{
        domain::{
            eth::{self, Address, B256, TxId, U256},
            order::Order,
        },
        infra::blockchain::Ethereum,
    },
    anyhow::ensure,
    async_trait::async_trait,
    std::time::Duration,
};

pub mod basic;
pub mod stable_swap;

pub use {basic::BasicFiller, stable_swap::StableSwapFiller};

/// A successful fill submission.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx: TxId,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub block_number: u64,
    pub wall_time: Duration,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Filled(Receipt),
    Failed { error: String },
}

/// What came out of `execute_order`. Execution errors are data, not panics;
/// the orchestrator logs them and moves on, never retrying automatically.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub strategy: &'static str,
    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn filled(strategy: &'static str, receipt: Receipt) -> Self {
        Self {
            strategy,
            outcome: Outcome::Filled(receipt),
        }
    }

    pub fn failed(strategy: &'static str, error: impl std::fmt::Display) -> Self {
        Self {
            strategy,
            outcome: Outcome::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Filled(_))
    }
}

/// A way to fill orders. Strategies bid against each other per order: every
/// strategy that `can_fill` quotes its expected profit, and the best bid
/// executes.
///
/// Internal failures never escape: `can_fill` degrades to `false`,
/// `calculate_profitability` to zero, and `execute_order` reports through
/// [`ExecutionResult`].
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this strategy is able to fill the order right now.
    async fn can_fill(&self, order: &Order) -> bool;

    /// Expected surplus in destination fee-token base units; zero means
    /// "don't bother".
    async fn calculate_profitability(&self, order: &Order) -> U256;

    /// Submits the destination-chain fill.
    async fn execute_order(&self, order: &Order) -> ExecutionResult;
}

/// Grants the gateway unlimited allowances for every ERC20 the fill will
/// pull: the output tokens plus the fee token. Already-unlimited allowances
/// are left alone.
pub(crate) async fn ensure_approvals(dest: &Ethereum, order: &Order) -> anyhow::Result<()> {
    let gateway = dest.config().intent_gateway;
    let fee_token = dest.fee_token().await?;
    let mut tokens: Vec<Address> = order
        .outputs
        .iter()
        .filter_map(|output| eth::token_of(&output.token))
        .map(|token| token.0)
        .collect();
    tokens.push(fee_token);
    tokens.sort();
    tokens.dedup();

    for token in tokens {
        let allowance = dest
            .erc20(token)
            .allowance(dest.filler(), gateway)
            .call()
            .await?;
        if allowance < U256::MAX {
            let receipt = dest
                .erc20_write(token)
                .approve(gateway, U256::MAX)
                .send()
                .await?
                .get_receipt()
                .await?;
            ensure!(receipt.status(), "approval for {token} reverted");
        }
    }
    Ok(())
}

/// The gate every strategy applies before anything else: the order's
/// deadline must not have passed on the destination chain, and nobody may
/// have filled it already.
pub(crate) async fn order_open(dest: &Ethereum, order: &Order) -> anyhow::Result<bool> {
    let height = dest.block_number().await?;
    if U256::from(height) >= order.deadline {
        tracing::debug!(id = %order.id, height, "order deadline passed");
        return Ok(false);
    }
    let filled = dest
        .storage_at(dest.config().intent_gateway, order.filled_slot())
        .await?;
    if filled != B256::ZERO {
        tracing::debug!(id = %order.id, "order already filled");
        return Ok(false);
    }
    Ok(true)
}
