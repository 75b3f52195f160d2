use {
    crate::domain::eth::{self, Address, B256, U256},
    chain::StateMachine,
    std::collections::HashMap,
};

/// The closed alphabet of assets the stable-swap machinery operates over.
/// Everything else is opaque to the planner and only fillable by exact match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StableAsset {
    Dai,
    Usdt,
    Usdc,
    Native,
}

impl StableAsset {
    /// Alphabet order, which doubles as the planner's tie-break order.
    pub const ALL: [Self; 4] = [Self::Dai, Self::Usdt, Self::Usdc, Self::Native];

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Dai => "DAI",
            Self::Usdt => "USDT",
            Self::Usdc => "USDC",
            Self::Native => "NATIVE",
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }
}

impl std::fmt::Display for StableAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The stable asset deployments for one chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainAssets {
    pub dai: Address,
    pub usdt: Address,
    pub usdc: Address,
    pub wrapped_native: Address,
}

impl ChainAssets {
    /// The ERC20 address backing an asset. Native maps to the wrapped
    /// deployment, which is what v2/v3 routing operates on.
    pub fn erc20(&self, asset: StableAsset) -> Address {
        match asset {
            StableAsset::Dai => self.dai,
            StableAsset::Usdt => self.usdt,
            StableAsset::Usdc => self.usdc,
            StableAsset::Native => self.wrapped_native,
        }
    }

    /// Classifies a 32-byte order token id against these deployments. The
    /// all-zero id is the native token; unknown ERC20s are `None`.
    pub fn classify(&self, token: &B256) -> Option<StableAsset> {
        let Some(address) = eth::token_of(token) else {
            return Some(StableAsset::Native);
        };
        if address.0 == self.dai {
            Some(StableAsset::Dai)
        } else if address.0 == self.usdt {
            Some(StableAsset::Usdt)
        } else if address.0 == self.usdc {
            Some(StableAsset::Usdc)
        } else {
            None
        }
    }
}

/// Chain-indexed view of the stable asset deployments.
#[derive(Debug, Clone, Default)]
pub struct Registry(HashMap<StateMachine, ChainAssets>);

impl Registry {
    pub fn new(assets: HashMap<StateMachine, ChainAssets>) -> Self {
        Self(assets)
    }

    pub fn assets(&self, chain: &StateMachine) -> Option<&ChainAssets> {
        self.0.get(chain)
    }

    /// Classifies a 32-byte order token id on the given chain. The all-zero
    /// id is the native token; unknown ERC20s are `None`.
    pub fn classify(&self, chain: &StateMachine, token: &B256) -> Option<StableAsset> {
        if *token == eth::NATIVE_TOKEN {
            return Some(StableAsset::Native);
        }
        self.0.get(chain)?.classify(token)
    }
}

/// The filler's holdings across the stable alphabet, in each token's own base
/// units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenBalances {
    pub dai: U256,
    pub usdt: U256,
    pub usdc: U256,
    pub native: U256,
}

impl TokenBalances {
    pub fn get(&self, asset: StableAsset) -> U256 {
        match asset {
            StableAsset::Dai => self.dai,
            StableAsset::Usdt => self.usdt,
            StableAsset::Usdc => self.usdc,
            StableAsset::Native => self.native,
        }
    }

    pub fn set(&mut self, asset: StableAsset, amount: U256) {
        match asset {
            StableAsset::Dai => self.dai = amount,
            StableAsset::Usdt => self.usdt = amount,
            StableAsset::Usdc => self.usdc = amount,
            StableAsset::Native => self.native = amount,
        }
    }
}

/// Per-asset decimals on one chain, looked up onchain once and carried into
/// the pure planning code.
#[derive(Debug, Clone, Copy)]
pub struct Decimals {
    pub dai: u8,
    pub usdt: u8,
    pub usdc: u8,
    pub native: u8,
}

impl Decimals {
    pub fn get(&self, asset: StableAsset) -> u8 {
        match asset {
            StableAsset::Dai => self.dai,
            StableAsset::Usdt => self.usdt,
            StableAsset::Usdc => self.usdc,
            StableAsset::Native => self.native,
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    pub fn assets() -> ChainAssets {
        ChainAssets {
            dai: Address::repeat_byte(0x11),
            usdt: Address::repeat_byte(0x22),
            usdc: Address::repeat_byte(0x33),
            wrapped_native: Address::repeat_byte(0x44),
        }
    }

    /// Mainnet-style decimals: 18 for DAI and the native token, 6 for the
    /// rest.
    pub fn decimals() -> Decimals {
        Decimals {
            dai: 18,
            usdt: 6,
            usdc: 6,
            native: 18,
        }
    }
}
