use {
    crate::{
        domain::{
            eth::{Address, B256, Bytes, Call, Gas, TxId, U256},
            order::{Order, Placement},
            stable,
            swap::protocol::{Liquidity, PoolKey},
        },
        infra::{config::ChainConfig, monitor::LogSource},
    },
    alloy::{
        eips::BlockNumberOrTag,
        network::EthereumWallet,
        providers::{DynProvider, Provider, ProviderBuilder},
        rpc::types::{
            Filter, TransactionReceipt, TransactionRequest,
            state::{AccountOverride, StateOverride},
        },
        signers::local::PrivateKeySigner,
        sol_types::{SolCall, SolEvent},
    },
    anyhow::{Context, Result, anyhow},
    async_trait::async_trait,
    chain::StateMachine,
    std::{collections::HashMap, sync::Arc},
    thiserror::Error,
    tokio::sync::OnceCell,
};

pub mod overrides;
pub mod retry;

#[derive(Debug, Error)]
pub enum Error {
    #[error("chain {0} is not configured")]
    MissingChain(StateMachine),
    #[error(transparent)]
    Rpc(#[from] retry::RpcExhausted),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Resolves state machine identifiers to their chain clients.
pub struct Registry(HashMap<StateMachine, Arc<Ethereum>>);

impl Registry {
    pub async fn new(configs: &[ChainConfig], signer: PrivateKeySigner) -> Result<Self> {
        let mut chains = HashMap::new();
        for config in configs {
            let ethereum = Ethereum::new(config.clone(), signer.clone())?;
            chains.insert(config.state_machine.clone(), Arc::new(ethereum));
        }
        Ok(Self(chains))
    }

    pub fn get(&self, chain: &StateMachine) -> Result<&Arc<Ethereum>, Error> {
        self.0
            .get(chain)
            .ok_or_else(|| Error::MissingChain(chain.clone()))
    }

    pub fn chains(&self) -> impl Iterator<Item = &Arc<Ethereum>> {
        self.0.values()
    }
}

/// One configured chain: a read client, a write client bound to the filler
/// key, and the chain's contract deployments.
pub struct Ethereum {
    config: ChainConfig,
    signer: PrivateKeySigner,
    /// Read path, no signing middleware.
    provider: DynProvider,
    /// Write path: fills nonce/gas/chain id and signs with the filler key.
    wallet: DynProvider,
    fee_token: OnceCell<Address>,
    decimals: moka::future::Cache<Address, u8>,
}

impl Ethereum {
    pub fn new(config: ChainConfig, signer: PrivateKeySigner) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .connect_http(config.rpc_url.clone())
            .erased();
        let wallet = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.clone()))
            .connect_http(config.rpc_url.clone())
            .erased();
        Ok(Self {
            config,
            signer,
            provider,
            wallet,
            fee_token: OnceCell::new(),
            decimals: moka::future::Cache::new(1000),
        })
    }

    pub fn chain(&self) -> &StateMachine {
        &self.config.state_machine
    }

    pub fn chain_id(&self) -> u64 {
        u64::from(
            self.config
                .state_machine
                .evm_chain_id()
                .expect("configured chains are EVM"),
        )
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// The filler EOA on this chain.
    pub fn filler(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn assets(&self) -> stable::ChainAssets {
        self.config.stable_assets()
    }

    // Contract instances. Read instances answer calls; write instances
    // carry the signing middleware for submissions.

    pub fn gateway(&self) -> contracts::instances::IntentGatewayInstance {
        contracts::IntentGateway::new(self.config.intent_gateway, self.provider.clone())
    }

    pub fn gateway_write(&self) -> contracts::instances::IntentGatewayInstance {
        contracts::IntentGateway::new(self.config.intent_gateway, self.wallet.clone())
    }

    pub fn host(&self) -> contracts::instances::IsmpHostInstance {
        contracts::IsmpHost::new(self.config.ismp_host, self.provider.clone())
    }

    pub fn erc20(&self, token: Address) -> contracts::instances::Erc20Instance {
        contracts::ERC20::new(token, self.provider.clone())
    }

    pub fn erc20_write(&self, token: Address) -> contracts::instances::Erc20Instance {
        contracts::ERC20::new(token, self.wallet.clone())
    }

    fn v2_factory(&self) -> contracts::instances::UniswapV2FactoryInstance {
        contracts::IUniswapV2Factory::new(self.config.uniswap_v2_factory, self.provider.clone())
    }

    fn v2_router(&self) -> contracts::instances::UniswapV2RouterInstance {
        contracts::IUniswapV2Router02::new(self.config.uniswap_v2_router, self.provider.clone())
    }

    fn v3_factory(&self) -> contracts::instances::UniswapV3FactoryInstance {
        contracts::IUniswapV3Factory::new(self.config.uniswap_v3_factory, self.provider.clone())
    }

    fn v3_quoter(&self) -> contracts::instances::QuoterV2Instance {
        contracts::IQuoterV2::new(self.config.uniswap_v3_quoter, self.provider.clone())
    }

    fn v4_quoter(&self) -> contracts::instances::V4QuoterInstance {
        contracts::IV4Quoter::new(self.config.uniswap_v4_quoter, self.provider.clone())
    }

    // Chain state reads. The ones on the monitor's and orchestrator's hot
    // paths go through the bounded retry wrapper.

    pub async fn block_number(&self) -> Result<u64, Error> {
        Ok(retry::rpc("eth_blockNumber", || async {
            self.provider.get_block_number().await
        })
        .await?)
    }

    pub async fn block_timestamp(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .context("no latest block")?;
        Ok(block.header.timestamp)
    }

    pub async fn gas_price(&self) -> Result<u128> {
        Ok(self.provider.get_gas_price().await?)
    }

    /// Confirmations accumulated by a transaction: 0 while pending, else
    /// `head - inclusion_block + 1`.
    pub async fn confirmations(&self, tx: TxId) -> Result<u64, Error> {
        let receipt = retry::rpc("eth_getTransactionReceipt", || async {
            self.provider.get_transaction_receipt(tx.0).await
        })
        .await?;
        let Some(receipt) = receipt else {
            return Ok(0);
        };
        let Some(included) = receipt.block_number else {
            return Ok(0);
        };
        let head = self.block_number().await?;
        Ok(head.saturating_sub(included) + 1)
    }

    pub async fn storage_at(&self, address: Address, slot: B256) -> Result<B256, Error> {
        let value = retry::rpc("eth_getStorageAt", || async {
            self.provider.get_storage_at(address, slot.into()).await
        })
        .await?;
        Ok(B256::from(value))
    }

    pub async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address).await?)
    }

    /// The filler account's next transaction nonce.
    pub async fn nonce(&self) -> Result<u64> {
        Ok(self
            .provider
            .get_transaction_count(self.filler())
            .await?)
    }

    /// The fee token designated by this chain's ISMP host, fetched once.
    pub async fn fee_token(&self) -> Result<Address> {
        self.fee_token
            .get_or_try_init(|| async {
                let params = self.host().hostParams().call().await?;
                Ok::<_, anyhow::Error>(params.feeToken)
            })
            .await
            .copied()
    }

    /// ERC20 decimals, memoized per token. `None` is the native token.
    pub async fn decimals(&self, token: Option<Address>) -> Result<u8> {
        let Some(token) = token else {
            return Ok(self.config.native_decimals);
        };
        self.decimals
            .try_get_with(token, async {
                self.erc20(token)
                    .decimals()
                    .call()
                    .await
                    .map_err(|err| anyhow!("decimals({token}): {err}"))
            })
            .await
            .map_err(|err: Arc<anyhow::Error>| anyhow!("{err}"))
    }

    pub async fn stable_decimals(&self) -> Result<stable::Decimals> {
        let assets = self.assets();
        Ok(stable::Decimals {
            dai: self.decimals(Some(assets.dai)).await?,
            usdt: self.decimals(Some(assets.usdt)).await?,
            usdc: self.decimals(Some(assets.usdc)).await?,
            native: self.config.native_decimals,
        })
    }

    /// The filler's balances across the stable alphabet.
    pub async fn stable_balances(&self) -> Result<stable::TokenBalances> {
        let assets = self.assets();
        let filler = self.filler();
        let (dai, usdt, usdc, native) = tokio::try_join!(
            async { Ok::<_, anyhow::Error>(self.erc20(assets.dai).balanceOf(filler).call().await?) },
            async { Ok(self.erc20(assets.usdt).balanceOf(filler).call().await?) },
            async { Ok(self.erc20(assets.usdc).balanceOf(filler).call().await?) },
            async { Ok(self.balance(filler).await?) },
        )?;
        Ok(stable::TokenBalances {
            dai,
            usdt,
            usdc,
            native,
        })
    }

    /// Gas estimation with optional synthetic state.
    pub async fn estimate_gas(
        &self,
        tx: TransactionRequest,
        overrides: Option<StateOverride>,
    ) -> Result<Gas> {
        let estimate = match overrides {
            Some(overrides) => {
                self.provider
                    .estimate_gas(tx)
                    .overrides(overrides)
                    .await?
            }
            None => self.provider.estimate_gas(tx).await?,
        };
        Ok(Gas::from(estimate))
    }

    pub async fn call(
        &self,
        tx: TransactionRequest,
        overrides: Option<StateOverride>,
    ) -> Result<Bytes> {
        let output = match overrides {
            Some(overrides) => self.provider.call(tx).overrides(overrides).await?,
            None => self.provider.call(tx).await?,
        };
        Ok(output)
    }

    /// Submits a prepared transaction through the write client and waits for
    /// its receipt.
    pub async fn send(&self, tx: TransactionRequest) -> Result<TransactionReceipt> {
        let pending = self.wallet.send_transaction(tx).await?;
        Ok(pending.get_receipt().await?)
    }

    /// Discovers the storage slot base of a token's balance mapping by
    /// probing candidates with an overridden `balanceOf` call.
    pub async fn find_balance_slot(&self, token: Address, holder: Address) -> Option<u64> {
        let marker = U256::from(0x00c0ffeeu64);
        let call = contracts::ERC20::balanceOfCall { owner: holder };
        for base in 0..=overrides::MAX_PROBED_SLOTS {
            let slot = overrides::balance_slot(holder, base);
            let result = self
                .call(
                    TransactionRequest::default()
                        .to(token)
                        .input(call.abi_encode().into()),
                    Some(storage_override(token, slot, marker)),
                )
                .await;
            let Ok(output) = result else { continue };
            if contracts::ERC20::balanceOfCall::abi_decode_returns(&output)
                .is_ok_and(|balance| balance == marker)
            {
                return Some(base);
            }
        }
        None
    }

    /// Discovers the allowance mapping base the same way.
    pub async fn find_allowance_slot(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Option<u64> {
        let marker = U256::from(0x00c0ffeeu64);
        let call = contracts::ERC20::allowanceCall { owner, spender };
        for base in 0..=overrides::MAX_PROBED_SLOTS {
            let slot = overrides::allowance_slot(owner, spender, base);
            let result = self
                .call(
                    TransactionRequest::default()
                        .to(token)
                        .input(call.abi_encode().into()),
                    Some(storage_override(token, slot, marker)),
                )
                .await;
            let Ok(output) = result else { continue };
            if contracts::ERC20::allowanceCall::abi_decode_returns(&output)
                .is_ok_and(|allowance| allowance == marker)
            {
                return Some(base);
            }
        }
        None
    }
}

/// A single-slot storage override for one account.
pub fn storage_override(address: Address, slot: B256, value: U256) -> StateOverride {
    let mut account = AccountOverride::default();
    account.state_diff = Some([(slot, B256::from(value))].into_iter().collect());
    [(address, account)].into_iter().collect()
}

#[async_trait]
impl LogSource for Ethereum {
    fn chain(&self) -> &StateMachine {
        &self.config.state_machine
    }

    async fn latest_block(&self) -> Result<u64, retry::RpcExhausted> {
        retry::rpc("eth_blockNumber", || async {
            self.provider.get_block_number().await
        })
        .await
    }

    async fn order_logs(&self, from: u64, to: u64) -> Result<Vec<Order>, retry::RpcExhausted> {
        let filter = Filter::new()
            .address(self.config.intent_gateway)
            .event_signature(contracts::IntentGateway::OrderPlaced::SIGNATURE_HASH)
            .from_block(from)
            .to_block(to);
        let logs =
            retry::rpc("eth_getLogs", || async { self.provider.get_logs(&filter).await }).await?;

        let mut orders = Vec::with_capacity(logs.len());
        for log in logs {
            let placement = Placement {
                block_number: log.block_number.unwrap_or_default(),
                log_index: log.log_index.unwrap_or_default(),
                tx: TxId(log.transaction_hash.unwrap_or_default()),
            };
            let decoded = match contracts::IntentGateway::OrderPlaced::decode_log(&log.inner) {
                Ok(decoded) => decoded,
                Err(err) => {
                    tracing::warn!(?placement, %err, "skipping undecodable OrderPlaced log");
                    continue;
                }
            };
            match Order::from_event(decoded.data, placement) {
                Ok(order) => orders.push(order),
                Err(err) => {
                    tracing::warn!(?placement, %err, "skipping malformed order");
                }
            }
        }
        orders.sort_by_key(|order| (order.placement.block_number, order.placement.log_index));
        Ok(orders)
    }
}

#[async_trait]
impl Liquidity for Ethereum {
    async fn v2_pair(&self, token_a: Address, token_b: Address) -> Result<Option<Address>> {
        let pair = self.v2_factory().getPair(token_a, token_b).call().await?;
        Ok((!pair.is_zero()).then_some(pair))
    }

    async fn v2_amount_in(
        &self,
        token_in: Address,
        token_out: Address,
        amount_out: U256,
    ) -> Result<Option<U256>> {
        // Reverts on missing or empty pools; that is "no liquidity", not an
        // error.
        let amounts = self
            .v2_router()
            .getAmountsIn(amount_out, vec![token_in, token_out])
            .call()
            .await;
        Ok(amounts.ok().and_then(|amounts| amounts.first().copied()))
    }

    async fn v3_pool(
        &self,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Option<Address>> {
        let pool = self
            .v3_factory()
            .getPool(token_a, token_b, fee.try_into().context("fee fits uint24")?)
            .call()
            .await?;
        Ok((!pool.is_zero()).then_some(pool))
    }

    async fn v3_liquidity(&self, pool: Address) -> Result<u128> {
        let pool = contracts::IUniswapV3Pool::new(pool, self.provider.clone());
        Ok(pool.liquidity().call().await?)
    }

    async fn v3_amount_in(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_out: U256,
    ) -> Result<Option<U256>> {
        let params = contracts::IQuoterV2::QuoteExactOutputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amount: amount_out,
            fee: fee.try_into().context("fee fits uint24")?,
            sqrtPriceLimitX96: alloy::primitives::Uint::ZERO,
        };
        let quote = self.v3_quoter().quoteExactOutputSingle(params).call().await;
        Ok(quote.ok().map(|quote| quote.amountIn))
    }

    async fn v4_amount_in(
        &self,
        key: PoolKey,
        zero_for_one: bool,
        amount_out: U256,
    ) -> Result<Option<U256>> {
        let params = contracts::IV4Quoter::QuoteExactSingleParams {
            poolKey: contracts::IV4Quoter::PoolKey {
                currency0: key.currency0,
                currency1: key.currency1,
                fee: key.fee.try_into().context("fee fits uint24")?,
                tickSpacing: key
                    .tick_spacing
                    .try_into()
                    .context("tick spacing fits int24")?,
                hooks: Address::ZERO,
            },
            zeroForOne: zero_for_one,
            exactAmount: u128::try_from(amount_out).unwrap_or(u128::MAX),
            hookData: Bytes::new(),
        };
        let quote = self.v4_quoter().quoteExactOutputSingle(params).call().await;
        Ok(quote.ok().map(|quote| quote.amountIn))
    }

    async fn simulate(&self, calls: &[Call]) -> Result<Option<Gas>> {
        let mut total = Gas::default();
        for call in calls {
            let tx = TransactionRequest::default()
                .from(self.filler())
                .to(call.to)
                .value(call.value)
                .input(call.data.clone().into());
            match self.estimate_gas(tx, None).await {
                Ok(gas) => total = total + gas,
                Err(err) => {
                    tracing::debug!(to = %call.to, %err, "call simulation failed");
                    return Ok(None);
                }
            }
        }
        Ok(Some(total))
    }
}
