use {
    crate::domain::{
        eth::{Address, Call, Gas, U256},
        stable::StableAsset,
    },
    anyhow::Result,
    async_trait::async_trait,
};

/// The fee tiers probed on v3 and v4.
pub const FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

/// The canonical tick spacing for a v4 fee tier.
pub fn tick_spacing(fee: u32) -> i32 {
    match fee {
        100 => 1,
        500 => 10,
        3000 => 60,
        10000 => 200,
        _ => 60,
    }
}

/// One side of a swap. `erc20` is the wrapped deployment when the asset is
/// native, which is what v2/v3 routing operates on; v4 addresses the native
/// currency as the zero address directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapLeg {
    pub asset: StableAsset,
    pub erc20: Address,
}

impl SwapLeg {
    pub fn is_native(&self) -> bool {
        self.asset.is_native()
    }

    /// The v4 currency id: zero for native, the ERC20 address otherwise.
    pub fn currency(&self) -> Address {
        if self.is_native() {
            Address::ZERO
        } else {
            self.erc20
        }
    }
}

/// A v4 pool identifier with canonical currency ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolKey {
    pub currency0: Address,
    pub currency1: Address,
    pub fee: u32,
    pub tick_spacing: i32,
}

impl PoolKey {
    pub fn new(a: Address, b: Address, fee: u32) -> Self {
        let (currency0, currency1) = if a < b { (a, b) } else { (b, a) };
        Self {
            currency0,
            currency1,
            fee,
            tick_spacing: tick_spacing(fee),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    V2,
    V3,
    V4,
}

/// The cheapest way found to buy an exact output amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestProtocol {
    pub protocol: Protocol,
    pub amount_in: U256,
    /// Fee tier, for v3 and v4.
    pub fee: Option<u32>,
}

/// The AMM read primitives the selection logic runs on. Implemented over live
/// contracts by the blockchain layer; mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Liquidity: Send + Sync {
    /// The v2 pair address, if the factory knows one.
    async fn v2_pair(&self, token_a: Address, token_b: Address) -> Result<Option<Address>>;
    /// `getAmountsIn` on the v2 router; `None` when the router reverts
    /// (typically an empty pool).
    async fn v2_amount_in(
        &self,
        token_in: Address,
        token_out: Address,
        amount_out: U256,
    ) -> Result<Option<U256>>;
    /// The v3 pool for a fee tier, if deployed.
    async fn v3_pool(&self, token_a: Address, token_b: Address, fee: u32)
    -> Result<Option<Address>>;
    /// In-range liquidity of a v3 pool.
    async fn v3_liquidity(&self, pool: Address) -> Result<u128>;
    /// `quoteExactOutputSingle` through call simulation; `None` on revert.
    async fn v3_amount_in(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_out: U256,
    ) -> Result<Option<U256>>;
    /// The v4 quoter's exact-output quote; `None` when the pool is missing
    /// or reverts.
    async fn v4_amount_in(
        &self,
        key: PoolKey,
        zero_for_one: bool,
        amount_out: U256,
    ) -> Result<Option<U256>>;
    /// Simulates the call list sequentially from the filler account and
    /// returns the summed gas, or `None` if any call reverts.
    async fn simulate(&self, calls: &[Call]) -> Result<Option<Gas>>;
}

/// Finds the protocol requiring the least input to buy `amount_out` of
/// `token_out` with `token_in`.
///
/// v4 wins ties generously: if it is within 1% of the best v2/v3 quote it is
/// preferred, since it needs no wrapping and fewer calls.
pub async fn find_best_protocol(
    liquidity: &dyn Liquidity,
    token_in: SwapLeg,
    token_out: SwapLeg,
    amount_out: U256,
) -> Result<Option<BestProtocol>> {
    let v2 = quote_v2(liquidity, token_in, token_out, amount_out).await?;
    let v3 = quote_v3(liquidity, token_in, token_out, amount_out).await?;
    let v4 = quote_v4(liquidity, token_in, token_out, amount_out).await?;

    let best23 = match (v2, v3) {
        (Some(v2), Some(v3)) => Some(if v3.amount_in < v2.amount_in { v3 } else { v2 }),
        (v2, v3) => v2.or(v3),
    };
    Ok(match (best23, v4) {
        (Some(best23), Some(v4)) => {
            // within 100 bps of the best v2/v3 quote
            if v4.amount_in <= best23.amount_in * U256::from(10_100) / U256::from(10_000) {
                Some(v4)
            } else {
                Some(best23)
            }
        }
        (best23, v4) => best23.or(v4),
    })
}

async fn quote_v2(
    liquidity: &dyn Liquidity,
    token_in: SwapLeg,
    token_out: SwapLeg,
    amount_out: U256,
) -> Result<Option<BestProtocol>> {
    if liquidity.v2_pair(token_in.erc20, token_out.erc20).await?.is_none() {
        return Ok(None);
    }
    let amount_in = liquidity
        .v2_amount_in(token_in.erc20, token_out.erc20, amount_out)
        .await?;
    Ok(amount_in.map(|amount_in| BestProtocol {
        protocol: Protocol::V2,
        amount_in,
        fee: None,
    }))
}

async fn quote_v3(
    liquidity: &dyn Liquidity,
    token_in: SwapLeg,
    token_out: SwapLeg,
    amount_out: U256,
) -> Result<Option<BestProtocol>> {
    let mut best: Option<BestProtocol> = None;
    for fee in FEE_TIERS {
        let Some(pool) = liquidity.v3_pool(token_in.erc20, token_out.erc20, fee).await? else {
            continue;
        };
        if liquidity.v3_liquidity(pool).await? == 0 {
            continue;
        }
        let Some(amount_in) = liquidity
            .v3_amount_in(token_in.erc20, token_out.erc20, fee, amount_out)
            .await?
        else {
            continue;
        };
        if best.is_none_or(|best| amount_in < best.amount_in) {
            best = Some(BestProtocol {
                protocol: Protocol::V3,
                amount_in,
                fee: Some(fee),
            });
        }
    }
    Ok(best)
}

async fn quote_v4(
    liquidity: &dyn Liquidity,
    token_in: SwapLeg,
    token_out: SwapLeg,
    amount_out: U256,
) -> Result<Option<BestProtocol>> {
    let mut best: Option<BestProtocol> = None;
    for fee in FEE_TIERS {
        let key = PoolKey::new(token_in.currency(), token_out.currency(), fee);
        let zero_for_one = token_in.currency() == key.currency0;
        let Some(amount_in) = liquidity.v4_amount_in(key, zero_for_one, amount_out).await? else {
            continue;
        };
        if best.is_none_or(|best| amount_in < best.amount_in) {
            best = Some(BestProtocol {
                protocol: Protocol::V4,
                amount_in,
                fee: Some(fee),
            });
        }
    }
    Ok(best)
}

#[cfg(test)]
mod test {
    use super::*;

    fn leg(asset: StableAsset, byte: u8) -> SwapLeg {
        SwapLeg {
            asset,
            erc20: Address::repeat_byte(byte),
        }
    }

    fn no_v2(mock: &mut MockLiquidity) {
        mock.expect_v2_pair().returning(|_, _| Ok(None));
    }

    fn no_v3(mock: &mut MockLiquidity) {
        mock.expect_v3_pool().returning(|_, _, _| Ok(None));
    }

    fn no_v4(mock: &mut MockLiquidity) {
        mock.expect_v4_amount_in().returning(|_, _, _| Ok(None));
    }

    #[tokio::test]
    async fn no_liquidity_anywhere_is_none() {
        let mut mock = MockLiquidity::new();
        no_v2(&mut mock);
        no_v3(&mut mock);
        no_v4(&mut mock);
        let best = find_best_protocol(
            &mock,
            leg(StableAsset::Usdc, 0x33),
            leg(StableAsset::Dai, 0x11),
            U256::from(100),
        )
        .await
        .unwrap();
        assert_eq!(best, None);
    }

    #[tokio::test]
    async fn v3_picks_cheapest_fee_tier() {
        let mut mock = MockLiquidity::new();
        no_v2(&mut mock);
        no_v4(&mut mock);
        mock.expect_v3_pool()
            .returning(|_, _, fee| match fee {
                500 | 3000 => Ok(Some(Address::repeat_byte(fee as u8))),
                _ => Ok(None),
            });
        mock.expect_v3_liquidity().returning(|_| Ok(1));
        mock.expect_v3_amount_in().returning(|_, _, fee, _| {
            Ok(Some(match fee {
                500 => U256::from(990),
                _ => U256::from(1010),
            }))
        });
        let best = find_best_protocol(
            &mock,
            leg(StableAsset::Usdc, 0x33),
            leg(StableAsset::Dai, 0x11),
            U256::from(1000),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(best.protocol, Protocol::V3);
        assert_eq!(best.fee, Some(500));
        assert_eq!(best.amount_in, U256::from(990));
    }

    #[tokio::test]
    async fn v4_preferred_within_one_percent() {
        let mut mock = MockLiquidity::new();
        no_v3(&mut mock);
        mock.expect_v2_pair()
            .returning(|_, _| Ok(Some(Address::repeat_byte(0x77))));
        mock.expect_v2_amount_in()
            .returning(|_, _, _| Ok(Some(U256::from(1000))));
        // 0.9% worse than v2: still preferred.
        mock.expect_v4_amount_in().returning(|key, _, _| {
            Ok((key.fee == 500).then(|| U256::from(1009)))
        });
        let best = find_best_protocol(
            &mock,
            leg(StableAsset::Usdc, 0x33),
            leg(StableAsset::Dai, 0x11),
            U256::from(1000),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(best.protocol, Protocol::V4);
        assert_eq!(best.fee, Some(500));
    }

    #[tokio::test]
    async fn v4_not_preferred_beyond_one_percent() {
        let mut mock = MockLiquidity::new();
        no_v3(&mut mock);
        mock.expect_v2_pair()
            .returning(|_, _| Ok(Some(Address::repeat_byte(0x77))));
        mock.expect_v2_amount_in()
            .returning(|_, _, _| Ok(Some(U256::from(1000))));
        mock.expect_v4_amount_in()
            .returning(|key, _, _| Ok((key.fee == 500).then(|| U256::from(1011))));
        let best = find_best_protocol(
            &mock,
            leg(StableAsset::Usdc, 0x33),
            leg(StableAsset::Dai, 0x11),
            U256::from(1000),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(best.protocol, Protocol::V2);
    }

    #[test]
    fn pool_key_orders_currencies() {
        let low = Address::repeat_byte(0x01);
        let high = Address::repeat_byte(0x02);
        assert_eq!(PoolKey::new(high, low, 500), PoolKey::new(low, high, 500));
        assert_eq!(PoolKey::new(high, low, 500).currency0, low);
        assert_eq!(PoolKey::new(low, high, 100).tick_spacing, 1);
        assert_eq!(PoolKey::new(low, high, 12345).tick_spacing, 60);
    }
}
