use {
    crate::domain::{
        eth::{self, Call, Gas, U256},
        order::Order,
        stable::{ChainAssets, Decimals, StableAsset, TokenBalances},
    },
    itertools::Itertools,
    thiserror::Error,
};

pub mod encode;
pub mod protocol;

pub use {
    encode::SwapContext,
    protocol::{BestProtocol, Liquidity, Protocol, SwapLeg, find_best_protocol},
};

/// An executable rebalancing plan: the calls that, run in order from the
/// filler account, leave it holding every output token the order requires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwapPlan {
    pub calls: Vec<Call>,
    /// Sum of the simulated gas of every call.
    pub gas: Gas,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot cover {token} shortfall, still missing {short}")]
    InsufficientBalance { token: StableAsset, short: U256 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What the planner needs to know about the destination chain.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext {
    pub assets: ChainAssets,
    pub decimals: Decimals,
    pub balances: TokenBalances,
    pub swap: SwapContext,
}

impl PlanContext {
    fn leg(&self, asset: StableAsset) -> SwapLeg {
        SwapLeg {
            asset,
            erc20: self.assets.erc20(asset),
        }
    }
}

/// Plans the swaps needed to cover the order's stable outputs from the
/// filler's current balances.
///
/// Shortfalls are covered greedily: donors are tried richest first (by
/// decimal-normalized remaining balance, alphabet order breaking ties), each
/// contributing as much as its spare balance allows. Swaps that find no
/// liquidity or fail simulation are skipped, falling through to the next
/// donor.
pub async fn plan(
    liquidity: &dyn Liquidity,
    ctx: &PlanContext,
    order: &Order,
) -> Result<SwapPlan, Error> {
    let mut requirement = TokenBalances::default();
    for output in &order.outputs {
        // Tokens outside the stable alphabet are not the planner's problem.
        let Some(asset) = ctx.assets.classify(&output.token) else {
            continue;
        };
        requirement.set(asset, requirement.get(asset) + output.amount);
    }

    let mut remaining = TokenBalances::default();
    for asset in StableAsset::ALL {
        remaining.set(
            asset,
            ctx.balances.get(asset).saturating_sub(requirement.get(asset)),
        );
    }

    let mut plan = SwapPlan::default();
    for target in StableAsset::ALL {
        let shortfall = requirement
            .get(target)
            .saturating_sub(ctx.balances.get(target));
        if shortfall.is_zero() {
            continue;
        }
        cover_shortfall(liquidity, ctx, &mut remaining, target, shortfall, &mut plan).await?;
    }
    Ok(plan)
}

async fn cover_shortfall(
    liquidity: &dyn Liquidity,
    ctx: &PlanContext,
    remaining: &mut TokenBalances,
    target: StableAsset,
    shortfall: U256,
    plan: &mut SwapPlan,
) -> Result<(), Error> {
    let mut needed = shortfall;
    for donor in donors_by_spare_balance(ctx, remaining, target) {
        if needed.is_zero() {
            break;
        }
        let spare = remaining.get(donor);
        if spare.is_zero() {
            continue;
        }
        // The donor's capacity expressed in target units; stables trade at
        // par so the decimal rescale is the exchange estimate.
        let capacity = eth::rescale(
            spare,
            ctx.decimals.get(donor),
            ctx.decimals.get(target),
        );
        let max_out = needed.min(capacity);
        if max_out.is_zero() {
            continue;
        }

        let donor_leg = ctx.leg(donor);
        let target_leg = ctx.leg(target);
        let Some(best) = find_best_protocol(liquidity, donor_leg, target_leg, max_out).await?
        else {
            tracing::debug!(%donor, %target, "no liquidity for swap, skipping donor");
            continue;
        };
        let calls = encode::synthesize(&ctx.swap, donor_leg, target_leg, &best, max_out);
        let Some(gas) = liquidity.simulate(&calls).await? else {
            tracing::debug!(%donor, %target, "swap simulation reverted, skipping donor");
            continue;
        };

        plan.calls.extend(calls);
        plan.gas = plan.gas + gas;
        needed -= max_out;
        remaining.set(donor, spare.saturating_sub(best.amount_in));
    }

    if !needed.is_zero() {
        return Err(Error::InsufficientBalance {
            token: target,
            short: needed,
        });
    }
    Ok(())
}

/// The other three assets, richest spare balance first. Balances are
/// compared normalized to 18 decimals; ties resolve in alphabet order (the
/// sort is stable).
fn donors_by_spare_balance(
    ctx: &PlanContext,
    remaining: &TokenBalances,
    target: StableAsset,
) -> Vec<StableAsset> {
    StableAsset::ALL
        .into_iter()
        .filter(|asset| *asset != target)
        .sorted_by_key(|asset| {
            std::cmp::Reverse(eth::rescale(
                remaining.get(*asset),
                ctx.decimals.get(*asset),
                18,
            ))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use {
        super::{protocol::MockLiquidity, *},
        crate::domain::{
            eth::{Address, B256},
            order::testing,
            stable,
        },
        mockall::predicate::*,
    };

    fn ctx(balances: TokenBalances) -> PlanContext {
        PlanContext {
            assets: stable::testing::assets(),
            decimals: stable::testing::decimals(),
            balances,
            swap: SwapContext {
                filler: Address::repeat_byte(0xf1),
                router: Address::repeat_byte(0x66),
                weth: Address::repeat_byte(0x44),
                deadline: U256::from(1_700_000_120u64),
            },
        }
    }

    /// An order with a single DAI output of the given amount against the
    /// testing asset addresses.
    fn dai_order(amount: U256) -> Order {
        let mut order = testing::order();
        order.outputs = vec![crate::domain::order::TokenInfo {
            token: eth::token_id(stable::testing::assets().dai),
            amount,
            beneficiary: B256::repeat_byte(0xbb),
        }];
        order
    }

    fn e18(value: u64) -> U256 {
        U256::from(value) * U256::from(10).pow(U256::from(18))
    }

    fn e6(value: u64) -> U256 {
        U256::from(value) * U256::from(10).pow(U256::from(6))
    }

    #[tokio::test]
    async fn no_shortfall_no_calls() {
        let mock = MockLiquidity::new();
        let ctx = ctx(TokenBalances {
            dai: e18(1000),
            ..Default::default()
        });
        let plan = plan(&mock, &ctx, &dai_order(e18(200))).await.unwrap();
        assert!(plan.calls.is_empty());
        assert_eq!(plan.gas, Gas::default());
    }

    #[tokio::test]
    async fn covers_shortfall_from_richest_donor() {
        // USDC (600) outranks USDT (500) normalized, so it is asked first
        // and can cover the whole 200 DAI shortfall.
        let mut mock = MockLiquidity::new();
        let assets = stable::testing::assets();
        mock.expect_v2_pair().returning(|_, _| Ok(None));
        mock.expect_v3_pool().returning(|_, _, _| Ok(None));
        mock.expect_v4_amount_in()
            .withf(move |key, _, amount_out| {
                key.fee == 500
                    && *amount_out == e18(200)
                    && key.currency1 == assets.usdc
            })
            .returning(|_, _, _| Ok(Some(e6(201))));
        mock.expect_v4_amount_in().returning(|_, _, _| Ok(None));
        mock.expect_simulate()
            .returning(|_| Ok(Some(Gas::from(150_000u64))));

        let ctx = ctx(TokenBalances {
            usdt: e6(500),
            usdc: e6(600),
            ..Default::default()
        });
        let plan = plan(&mock, &ctx, &dai_order(e18(200))).await.unwrap();

        assert!(!plan.calls.is_empty());
        assert_eq!(plan.gas, Gas::from(150_000u64));
        // ERC20 donor through v4: transfer + execute
        assert_eq!(plan.calls.len(), 2);
        assert_eq!(plan.calls[0].to, assets.usdc);
    }

    #[tokio::test]
    async fn splits_across_donors_when_first_runs_dry() {
        // USDC (150) is the richest donor but can only supply 150 of the 200
        // DAI shortfall; USDT (80) covers the rest.
        let mut mock = MockLiquidity::new();
        mock.expect_v2_pair().returning(|_, _| Ok(None));
        mock.expect_v3_pool().returning(|_, _, _| Ok(None));
        mock.expect_v4_amount_in().returning(|key, _, amount_out| {
            if key.fee != 500 {
                return Ok(None);
            }
            // both donors quote at par
            Ok(Some(eth::rescale(amount_out, 18, 6)))
        });
        mock.expect_simulate()
            .returning(|_| Ok(Some(Gas::from(100_000u64))));

        let ctx = ctx(TokenBalances {
            usdt: e6(80),
            usdc: e6(150),
            ..Default::default()
        });
        let plan = plan(&mock, &ctx, &dai_order(e18(200))).await.unwrap();

        // two swaps, four calls, summed gas
        assert_eq!(plan.calls.len(), 4);
        assert_eq!(plan.gas, Gas::from(200_000u64));
    }

    #[tokio::test]
    async fn native_shortfall_swaps_and_unwraps() {
        // A native output with no native balance: USDC buys WETH on v3,
        // which is unwrapped for the payout.
        let mut mock = MockLiquidity::new();
        let assets = stable::testing::assets();
        mock.expect_v2_pair().returning(|_, _| Ok(None));
        mock.expect_v3_pool()
            .returning(|_, _, fee| Ok((fee == 500).then(|| Address::repeat_byte(0x77))));
        mock.expect_v3_liquidity().returning(|_| Ok(1_000_000));
        mock.expect_v3_amount_in()
            .returning(|_, _, _, _| Ok(Some(e6(3100))));
        mock.expect_v4_amount_in().returning(|_, _, _| Ok(None));
        mock.expect_simulate()
            .returning(|_| Ok(Some(Gas::from(180_000u64))));

        let mut order = testing::order();
        order.outputs = vec![crate::domain::order::TokenInfo {
            token: eth::NATIVE_TOKEN,
            amount: e18(1),
            beneficiary: B256::repeat_byte(0xbb),
        }];
        let ctx = ctx(TokenBalances {
            usdc: e6(5000),
            ..Default::default()
        });
        let plan = plan(&mock, &ctx, &order).await.unwrap();

        // transfer USDC to router, execute v3 swap, unwrap WETH
        assert_eq!(plan.calls.len(), 3);
        assert_eq!(plan.calls[0].to, assets.usdc);
        assert_eq!(plan.calls[1].to, ctx.swap.router);
        assert_eq!(plan.calls[2].to, ctx.swap.weth);
    }

    #[tokio::test]
    async fn exotic_outputs_are_ignored() {
        // An output token outside the stable alphabet imposes no
        // requirement on the planner.
        let mock = MockLiquidity::new();
        let mut order = testing::order();
        order.outputs = vec![crate::domain::order::TokenInfo {
            token: eth::token_id(Address::repeat_byte(0x99)),
            amount: e18(1_000_000),
            beneficiary: B256::repeat_byte(0xbb),
        }];
        let ctx = ctx(TokenBalances::default());
        let plan = plan(&mock, &ctx, &order).await.unwrap();
        assert!(plan.calls.is_empty());
    }

    #[tokio::test]
    async fn reports_uncoverable_shortfall() {
        let mut mock = MockLiquidity::new();
        mock.expect_v2_pair().returning(|_, _| Ok(None));
        mock.expect_v3_pool().returning(|_, _, _| Ok(None));
        mock.expect_v4_amount_in().returning(|_, _, _| Ok(None));

        let ctx = ctx(TokenBalances {
            usdc: e6(50),
            ..Default::default()
        });
        let result = plan(&mock, &ctx, &dai_order(e18(200))).await;
        match result {
            Err(Error::InsufficientBalance { token, short }) => {
                assert_eq!(token, StableAsset::Dai);
                assert_eq!(short, e18(200));
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_simulation_falls_through_to_next_donor() {
        let mut mock = MockLiquidity::new();
        let assets = stable::testing::assets();
        mock.expect_v2_pair().returning(|_, _| Ok(None));
        mock.expect_v3_pool().returning(|_, _, _| Ok(None));
        mock.expect_v4_amount_in()
            .returning(|key, _, amount_out| {
                Ok((key.fee == 500).then(|| eth::rescale(amount_out, 18, 6)))
            });
        // USDC swap reverts in simulation, USDT succeeds.
        mock.expect_simulate().returning(move |calls| {
            Ok(if calls[0].to == assets.usdc {
                None
            } else {
                Some(Gas::from(120_000u64))
            })
        });

        let ctx = ctx(TokenBalances {
            usdt: e6(500),
            usdc: e6(600),
            ..Default::default()
        });
        let plan = plan(&mock, &ctx, &dai_order(e18(200))).await.unwrap();

        assert_eq!(plan.calls.len(), 2);
        assert_eq!(plan.calls[0].to, assets.usdt);
        assert_eq!(plan.gas, Gas::from(120_000u64));
    }
}
