use {
    crate::{
        domain::{
            eth::{self, Address, Gas, U256, UsdAmount},
            order::{Order, OrderValue},
            stable::{StableAsset, TokenBalances},
        },
        infra::blockchain::{Ethereum, Registry},
    },
    anyhow::{Context, Result, ensure},
    async_trait::async_trait,
    chain::StateMachine,
    std::{sync::Arc, time::Duration},
    url::Url,
};

/// What an asset is keyed by at the price source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PriceKey {
    Erc20 { chain: StateMachine, address: Address },
    Native { symbol: String },
}

/// An external spot price source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// The asset's USD price.
    async fn usd_price(&self, key: &PriceKey) -> Result<f64>;
}

/// HTTP price source with a short-lived in-process cache so bursts of orders
/// do not hammer the API.
pub struct Api {
    client: reqwest::Client,
    base: Url,
    cache: moka::future::Cache<PriceKey, f64>,
}

impl Api {
    pub fn new(base: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
            cache: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(60))
                .build(),
        }
    }

    async fn fetch(&self, key: &PriceKey) -> Result<f64> {
        let mut url = self.base.join("v1/price").context("bad price api url")?;
        match key {
            PriceKey::Erc20 { chain, address } => {
                url.query_pairs_mut()
                    .append_pair("chain", &chain.to_string())
                    .append_pair("token", &address.to_string());
            }
            PriceKey::Native { symbol } => {
                url.query_pairs_mut().append_pair("symbol", symbol);
            }
        }
        #[derive(serde::Deserialize)]
        struct Response {
            usd: f64,
        }
        let response: Response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        ensure!(
            response.usd.is_finite() && response.usd > 0.0,
            "price source returned unusable price {}",
            response.usd
        );
        Ok(response.usd)
    }
}

#[async_trait]
impl PriceSource for Api {
    async fn usd_price(&self, key: &PriceKey) -> Result<f64> {
        self.cache
            .try_get_with(key.clone(), self.fetch(key))
            .await
            .map_err(|err: Arc<anyhow::Error>| anyhow::anyhow!("{err}"))
    }
}

/// USD valuation of orders, balances and gas.
pub struct Pricing {
    source: Arc<dyn PriceSource>,
    registry: Arc<Registry>,
}

impl Pricing {
    pub fn new(source: Arc<dyn PriceSource>, registry: Arc<Registry>) -> Self {
        Self { source, registry }
    }

    /// The asset's USD price as a fixed-point integer with `decimals`
    /// fractional digits, rounded down.
    pub async fn price_usd(&self, key: &PriceKey, decimals: u8) -> Result<U256> {
        let price = self.source.usd_price(key).await?;
        to_fixed_point(price, decimals)
    }

    /// Sums the order's outputs (destination chain) and inputs (source
    /// chain) into 18-decimal USD.
    pub async fn value_of(&self, order: &Order) -> Result<OrderValue> {
        let source = self.registry.get(&order.source_chain)?;
        let dest = self.registry.get(&order.dest_chain)?;

        let mut input_usd = UsdAmount::default();
        for input in &order.inputs {
            input_usd = input_usd + self.token_value(source, &input.token, input.amount).await?;
        }
        let mut output_usd = UsdAmount::default();
        for output in &order.outputs {
            output_usd =
                output_usd + self.token_value(dest, &output.token, output.amount).await?;
        }
        Ok(OrderValue {
            input_usd,
            output_usd,
        })
    }

    /// Total USD value of the filler's stable balances on a chain.
    pub async fn value_of_balances(
        &self,
        chain: &StateMachine,
        balances: &TokenBalances,
    ) -> Result<UsdAmount> {
        let eth = self.registry.get(chain)?;
        let assets = eth.assets();
        let mut total = UsdAmount::default();
        for asset in StableAsset::ALL {
            let amount = balances.get(asset);
            if amount.is_zero() {
                continue;
            }
            let (key, decimals) = match asset {
                StableAsset::Native => (self.native_key(eth), eth.config().native_decimals),
                _ => {
                    let address = assets.erc20(asset);
                    (
                        PriceKey::Erc20 {
                            chain: chain.clone(),
                            address,
                        },
                        eth.decimals(Some(address)).await?,
                    )
                }
            };
            let price = self.price_usd(&key, UsdAmount::DECIMALS).await?;
            total = total + usd_value(amount, decimals, price);
        }
        Ok(total)
    }

    /// Converts a gas amount on `chain` into the chain's fee-token base
    /// units, scaled to `target_decimals`.
    pub async fn convert_gas_to_fee_token(
        &self,
        gas: Gas,
        chain: &StateMachine,
        target_decimals: u8,
    ) -> Result<U256> {
        let eth = self.registry.get(chain)?;
        let gas_price = eth.gas_price().await?;
        let cost_wei = gas.0 * U256::from(gas_price);

        let native_price = self
            .price_usd(&self.native_key(eth), UsdAmount::DECIMALS)
            .await?;
        let cost_usd = usd_value(cost_wei, eth.config().native_decimals, native_price);

        let fee_token = eth.fee_token().await?;
        let fee_token_price = self
            .price_usd(
                &PriceKey::Erc20 {
                    chain: chain.clone(),
                    address: fee_token,
                },
                UsdAmount::DECIMALS,
            )
            .await?;
        ensure!(!fee_token_price.is_zero(), "fee token has no price");

        // usd(18) * 10^target / price(18) = fee token units at target scale
        Ok(cost_usd.0 * U256::from(10).pow(U256::from(target_decimals)) / fee_token_price)
    }

    /// Converts an amount of fee-token base units into native wei on the
    /// same chain.
    pub async fn fee_token_to_native(
        &self,
        amount: U256,
        chain: &StateMachine,
    ) -> Result<U256> {
        let eth = self.registry.get(chain)?;
        let fee_token = eth.fee_token().await?;
        let fee_decimals = eth.decimals(Some(fee_token)).await?;
        let fee_price = self
            .price_usd(
                &PriceKey::Erc20 {
                    chain: chain.clone(),
                    address: fee_token,
                },
                UsdAmount::DECIMALS,
            )
            .await?;
        let native_price = self
            .price_usd(&self.native_key(eth), UsdAmount::DECIMALS)
            .await?;
        ensure!(!native_price.is_zero(), "native token has no price");

        let usd = usd_value(amount, fee_decimals, fee_price);
        Ok(usd.0 * U256::from(10).pow(U256::from(eth.config().native_decimals)) / native_price)
    }

    async fn token_value(
        &self,
        eth: &Ethereum,
        token: &eth::B256,
        amount: U256,
    ) -> Result<UsdAmount> {
        let (key, decimals) = match eth::token_of(token) {
            None => (self.native_key(eth), eth.config().native_decimals),
            Some(address) => (
                PriceKey::Erc20 {
                    chain: eth.chain().clone(),
                    address: address.0,
                },
                eth.decimals(Some(address.0)).await?,
            ),
        };
        let price = self.price_usd(&key, UsdAmount::DECIMALS).await?;
        Ok(usd_value(amount, decimals, price))
    }

    fn native_key(&self, eth: &Ethereum) -> PriceKey {
        PriceKey::Native {
            symbol: eth.config().native_symbol.clone(),
        }
    }
}

/// `amount` (in `decimals` base units) times an 18-decimal USD price,
/// normalized to 18-decimal USD.
fn usd_value(amount: U256, decimals: u8, price_usd: U256) -> UsdAmount {
    UsdAmount(amount * price_usd / U256::from(10).pow(U256::from(decimals)))
}

/// `floor(value * 10^decimals)` as an integer, rejecting non-finite input.
fn to_fixed_point(value: f64, decimals: u8) -> Result<U256> {
    ensure!(value.is_finite() && value >= 0.0, "bad price {value}");
    let scaled = value * 10f64.powi(i32::from(decimals));
    ensure!(scaled < u128::MAX as f64, "price overflows fixed point");
    Ok(U256::from(scaled.floor() as u128))
}

#[cfg(test)]
mod test {
    use super::*;

    fn e18(value: u64) -> U256 {
        U256::from(value) * U256::from(10).pow(U256::from(18))
    }

    #[test]
    fn fixed_point_floors() {
        assert_eq!(
            to_fixed_point(1.0, 18).unwrap(),
            U256::from(10).pow(U256::from(18))
        );
        assert_eq!(to_fixed_point(0.9997, 6).unwrap(), U256::from(999_700));
        assert_eq!(to_fixed_point(0.0, 18).unwrap(), U256::ZERO);
        assert!(to_fixed_point(f64::NAN, 18).is_err());
        assert!(to_fixed_point(-1.0, 18).is_err());
    }

    #[test]
    fn usd_value_normalizes_decimals() {
        // 100 USDT (6 decimals) at $1.00
        assert_eq!(
            usd_value(U256::from(100_000_000u64), 6, e18(1)),
            UsdAmount(e18(100))
        );
        // 2 tokens (18 decimals) at $0.50
        assert_eq!(
            usd_value(e18(2), 18, e18(1) / U256::from(2)),
            UsdAmount(e18(1))
        );
    }
}
