use {
    crate::{
        domain::{
            eth::{self, Address, B256, Gas, GasEstimate, U256},
            order::Order,
        },
        infra::{
            blockchain::{Ethereum, Registry, overrides},
            cache::Cache,
            pricing::Pricing,
        },
    },
    alloy::{
        rpc::types::{TransactionRequest, state::{AccountOverride, StateOverride}},
        sol_types::{SolCall, SolValue},
    },
    anyhow::Result,
    std::{collections::HashMap, sync::Arc},
};

/// Fallbacks when estimation fails: generous enough to never underprice a
/// fill.
pub const DEFAULT_FILL_GAS: u64 = 3_000_000;
pub const DEFAULT_POST_GAS: u64 = 270_000;
pub const DEFAULT_RELAYER_FEE: u64 = 10_000_000;

pub fn conservative_default() -> GasEstimate {
    GasEstimate {
        fill_gas: Gas::from(DEFAULT_FILL_GAS),
        post_gas: Gas::from(DEFAULT_POST_GAS),
        relayer_fee: U256::from(DEFAULT_RELAYER_FEE),
    }
}

/// Prices fills without the filler actually holding the tokens: balances and
/// allowances are synthesized through state overrides, so the estimate
/// reflects the real call path.
pub struct GasEstimator {
    registry: Arc<Registry>,
    pricing: Arc<Pricing>,
    cache: Arc<Cache>,
}

impl GasEstimator {
    pub fn new(registry: Arc<Registry>, pricing: Arc<Pricing>, cache: Arc<Cache>) -> Self {
        Self {
            registry,
            pricing,
            cache,
        }
    }

    /// The order's gas profile, memoized per order id. Falls back to the
    /// conservative defaults on any estimation error.
    pub async fn estimate(&self, order: &Order) -> GasEstimate {
        self.cache
            .gas_estimate(order.id, async {
                match self.estimate_inner(order).await {
                    Ok(estimate) => estimate,
                    Err(err) => {
                        tracing::warn!(
                            id = %order.id,
                            %err,
                            "gas estimation failed, using conservative defaults",
                        );
                        conservative_default()
                    }
                }
            })
            .await
    }

    async fn estimate_inner(&self, order: &Order) -> Result<GasEstimate> {
        let source = self.registry.get(&order.source_chain)?;
        let dest = self.registry.get(&order.dest_chain)?;
        let filler = dest.filler();

        // Delivery gas of the redeem-escrow message on the source chain,
        // with a 2% markup.
        let body = post_body(order, filler);
        let post_tx = TransactionRequest::default()
            .from(filler)
            .to(source.config().ismp_host)
            .input(body.into());
        let post_gas = match source.estimate_gas(post_tx, None).await {
            Ok(gas) => gas,
            Err(err) => {
                tracing::debug!(%err, "post delivery estimation failed, using default");
                Gas::from(DEFAULT_POST_GAS)
            }
        }
        .scale_pct(102);

        let fee_token = dest.fee_token().await?;
        let fee_decimals = dest.decimals(Some(fee_token)).await?;
        let relayer_fee = self
            .pricing
            .convert_gas_to_fee_token(post_gas, &order.source_chain, fee_decimals)
            .await?;

        let overrides = self.fill_overrides(dest, order, fee_token).await;
        let call = contracts::IntentGateway::fillOrderCall {
            order: order.to_gateway(),
            options: contracts::IntentGateway::FillOptions {
                relayerFee: relayer_fee,
            },
        };
        let fill_tx = TransactionRequest::default()
            .from(filler)
            .to(dest.config().intent_gateway)
            .value(order.eth_value().0)
            .input(call.abi_encode().into());
        let fill_gas = dest.estimate_gas(fill_tx, Some(overrides)).await?;

        Ok(GasEstimate {
            fill_gas,
            post_gas,
            relayer_fee,
        })
    }

    /// Synthetic state for the fill estimate: for every output token and the
    /// fee token, the filler holds `U256::MAX / 2` and the gateway is
    /// approved for as much; the filler's native balance is topped up the
    /// same way.
    async fn fill_overrides(
        &self,
        dest: &Ethereum,
        order: &Order,
        fee_token: Address,
    ) -> StateOverride {
        let filler = dest.filler();
        let gateway = dest.config().intent_gateway;
        let amount = U256::MAX / U256::from(2);

        let mut tokens: Vec<Address> = order
            .outputs
            .iter()
            .filter_map(|output| eth::token_of(&output.token))
            .map(|token| token.0)
            .collect();
        tokens.push(fee_token);
        tokens.sort();
        tokens.dedup();

        let mut state: StateOverride = Default::default();
        for token in tokens {
            let mut diff = HashMap::new();
            if let Some(base) = dest.find_balance_slot(token, filler).await {
                diff.insert(overrides::balance_slot(filler, base), B256::from(amount));
            }
            if let Some(base) = dest.find_allowance_slot(token, filler, gateway).await {
                diff.insert(
                    overrides::allowance_slot(filler, gateway, base),
                    B256::from(amount),
                );
            }
            if diff.is_empty() {
                tracing::debug!(%token, "no storage slots found, estimate may revert");
                continue;
            }
            let mut account = AccountOverride::default();
            account.state_diff = Some(diff.into_iter().collect());
            state.insert(token, account);
        }

        let mut account = AccountOverride::default();
        account.balance = Some(amount);
        state.insert(filler, account);
        state
    }

    /// The protocol's per-byte fee for posting the redeem-escrow message,
    /// quoted on the destination host against the source chain's rate.
    pub async fn post_fee(&self, order: &Order) -> Result<U256> {
        let dest = self.registry.get(&order.dest_chain)?;
        let per_byte = dest
            .host()
            .perByteFee(order.source_chain.to_wire().into())
            .call()
            .await?;
        let body_len = post_body(order, dest.filler()).len() as u64;
        Ok(per_byte * U256::from(body_len.div_ceil(2).max(32)))
    }
}

/// The ISMP post body redeeming the order's escrow back on the source chain:
/// a request-kind tag followed by the ABI-encoded redeem request.
pub fn post_body(order: &Order, beneficiary: Address) -> Vec<u8> {
    let tokens: Vec<(B256, U256)> = order
        .inputs
        .iter()
        .map(|input| (input.token, input.amount))
        .collect();
    let request = (order.id.0, eth::token_id(beneficiary), tokens);
    let mut body = Vec::with_capacity(1 + 32 * 4 + order.inputs.len() * 64);
    body.push(0x00);
    body.extend_from_slice(&request.abi_encode());
    body
}

#[cfg(test)]
mod test {
    use {super::*, crate::domain::order::testing};

    #[test]
    fn post_body_is_deterministic_and_tagged() {
        let order = testing::order();
        let beneficiary = Address::repeat_byte(0xf1);
        let a = post_body(&order, beneficiary);
        let b = post_body(&order, beneficiary);
        assert_eq!(a, b);
        assert_eq!(a[0], 0x00);
        // tag + offset + (commitment, beneficiary, tokens offset) words at
        // minimum
        assert!(a.len() > 1 + 32 * 3);

        let different = post_body(&order, Address::repeat_byte(0xf2));
        assert_ne!(a, different);
    }

    #[test]
    fn post_fee_floor_matches_small_bodies() {
        // ceil(len / 2) with a floor of 32 units
        let len: u64 = 10;
        assert_eq!(len.div_ceil(2).max(32), 32);
        let len: u64 = 100;
        assert_eq!(len.div_ceil(2).max(32), 50);
        let len: u64 = 101;
        assert_eq!(len.div_ceil(2).max(32), 51);
    }

    #[test]
    fn conservative_default_is_nonzero() {
        let default = conservative_default();
        assert_eq!(default.fill_gas, Gas::from(3_000_000u64));
        assert_eq!(default.post_gas, Gas::from(270_000u64));
        assert_eq!(default.relayer_fee, U256::from(10_000_000u64));
    }
}
