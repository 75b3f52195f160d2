use {
    crate::domain::{confirmation, eth::Address, eth::UsdAmount, stable},
    anyhow::{Context, Result, ensure},
    chain::StateMachine,
    serde::{Deserialize, Deserializer},
    std::{collections::HashMap, path::Path},
    url::Url,
};

/// The process configuration, deserialized from a TOML file. Secret-bearing
/// fields support `%ENV_VAR` indirection so the file itself can be committed.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Bound on concurrently analyzed orders.
    #[serde(default = "default_max_concurrent_orders")]
    pub max_concurrent_orders: usize,
    /// The filler EOA's signing key.
    pub private_key: Secret,
    /// Base URL of the external USD price source.
    pub price_api: Url,
    pub chains: Vec<ChainConfig>,
}

fn default_max_concurrent_orders() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    pub state_machine: StateMachine,
    #[serde(deserialize_with = "url_from_env")]
    pub rpc_url: Url,
    pub intent_gateway: Address,
    pub ismp_host: Address,
    pub batch_executor: Address,
    pub universal_router: Address,
    pub uniswap_v2_factory: Address,
    pub uniswap_v2_router: Address,
    pub uniswap_v3_factory: Address,
    pub uniswap_v3_quoter: Address,
    pub uniswap_v4_quoter: Address,
    pub wrapped_native: Address,
    pub dai: Address,
    pub usdt: Address,
    pub usdc: Address,
    /// The native currency's symbol at the price source, e.g. "BNB".
    pub native_symbol: String,
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u8,
    pub confirmation_policy: PolicyConfig,
}

fn default_native_decimals() -> u8 {
    18
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    pub min_usd: u64,
    pub max_usd: u64,
    pub min_confs: u64,
    pub max_confs: u64,
}

impl PolicyConfig {
    pub fn to_policy(self) -> Result<confirmation::Policy, confirmation::Error> {
        confirmation::Policy::new(
            UsdAmount::from_dollars(self.min_usd),
            UsdAmount::from_dollars(self.max_usd),
            self.min_confs,
            self.max_confs,
        )
    }
}

impl ChainConfig {
    pub fn stable_assets(&self) -> stable::ChainAssets {
        stable::ChainAssets {
            dai: self.dai,
            usdt: self.usdt,
            usdc: self.usdc,
            wrapped_native: self.wrapped_native,
        }
    }
}

impl Config {
    /// The per-chain confirmation policies, validated.
    pub fn confirmation_policies(&self) -> Result<confirmation::Policies> {
        let mut policies = HashMap::new();
        for chain in &self.chains {
            let policy = chain.confirmation_policy.to_policy().with_context(|| {
                format!("invalid confirmation policy for {}", chain.state_machine)
            })?;
            policies.insert(chain.state_machine.clone(), policy);
        }
        Ok(confirmation::Policies::new(policies))
    }

    pub fn stable_registry(&self) -> stable::Registry {
        stable::Registry::new(
            self.chains
                .iter()
                .map(|chain| (chain.state_machine.clone(), chain.stable_assets()))
                .collect(),
        )
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.chains.is_empty(), "no chains configured");
        let mut seen = std::collections::HashSet::new();
        for chain in &self.chains {
            ensure!(
                chain.state_machine.is_evm(),
                "{} is not an EVM chain; only EVM deployments are supported",
                chain.state_machine
            );
            ensure!(
                seen.insert(chain.state_machine.clone()),
                "duplicate chain entry for {}",
                chain.state_machine
            );
            chain.confirmation_policy.to_policy().with_context(|| {
                format!("invalid confirmation policy for {}", chain.state_machine)
            })?;
        }
        ensure!(
            self.max_concurrent_orders > 0,
            "max_concurrent_orders must be positive"
        );
        Ok(())
    }
}

/// Loads and validates the configuration file.
pub fn load(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: Config = toml::from_str(&raw).context("failed to parse config")?;
    config.validate()?;
    Ok(config)
}

/// A string whose value never appears in logs. Supports `%ENV_VAR`
/// indirection on deserialization.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SECRET")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self(resolve_env(String::deserialize(deserializer)?).map_err(
            serde::de::Error::custom,
        )?))
    }
}

const ENV_VAR_PREFIX: char = '%';

/// Resolves the `%ENV_VAR` convention: a value starting with `%` names an
/// environment variable holding the real value.
fn resolve_env(value: String) -> Result<String> {
    match value.strip_prefix(ENV_VAR_PREFIX) {
        Some(name) => std::env::var(name)
            .with_context(|| format!("environment variable {name} is not set")),
        None => Ok(value),
    }
}

fn url_from_env<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = resolve_env(String::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)?;
    raw.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// A chain config pointing at nothing in particular; enough to build
    /// clients that are never dialed.
    pub fn chain_config(state_machine: StateMachine) -> ChainConfig {
        ChainConfig {
            state_machine,
            rpc_url: "http://localhost:8545".parse().unwrap(),
            intent_gateway: Address::repeat_byte(0x01),
            ismp_host: Address::repeat_byte(0x02),
            batch_executor: Address::repeat_byte(0x03),
            universal_router: Address::repeat_byte(0x04),
            uniswap_v2_factory: Address::repeat_byte(0x05),
            uniswap_v2_router: Address::repeat_byte(0x06),
            uniswap_v3_factory: Address::repeat_byte(0x07),
            uniswap_v3_quoter: Address::repeat_byte(0x08),
            uniswap_v4_quoter: Address::repeat_byte(0x09),
            wrapped_native: Address::repeat_byte(0x44),
            dai: Address::repeat_byte(0x11),
            usdt: Address::repeat_byte(0x22),
            usdc: Address::repeat_byte(0x33),
            native_symbol: "ETH".to_string(),
            native_decimals: 18,
            confirmation_policy: PolicyConfig {
                min_usd: 100,
                max_usd: 10_000,
                min_confs: 1,
                max_confs: 12,
            },
        }
    }
}
