use derive_more::{Display, From, Into};

pub use alloy::primitives::{Address, B256, Bytes, U256, keccak256};

/// The all-zero 32-byte token id denoting the chain's native currency.
pub const NATIVE_TOKEN: B256 = B256::ZERO;

/// An ERC20 token address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into)]
pub struct TokenAddress(pub Address);

/// An amount of native currency denominated in wei.
#[derive(Debug, Default, Clone, Copy, Eq, Ord, PartialEq, PartialOrd, From, Into)]
pub struct Ether(pub U256);

impl std::ops::Add for Ether {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Ether {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self(U256::ZERO), std::ops::Add::add)
    }
}

/// Gas amount in gas units.
#[derive(Debug, Default, Display, Clone, Copy, Ord, Eq, PartialOrd, PartialEq, From, Into)]
pub struct Gas(pub U256);

impl From<u64> for Gas {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl std::ops::Add for Gas {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Gas {
    /// Applies a percentage markup, rounding down.
    pub fn scale_pct(self, pct: u64) -> Self {
        Self(self.0 * U256::from(pct) / U256::from(100))
    }
}

/// A USD value as an 18-decimal fixed-point integer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, From, Into)]
pub struct UsdAmount(pub U256);

impl UsdAmount {
    pub const DECIMALS: u8 = 18;

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whole-dollar constructor, used by the confirmation policy bounds.
    pub fn from_dollars(dollars: u64) -> Self {
        Self(U256::from(dollars) * U256::from(10).pow(U256::from(Self::DECIMALS)))
    }
}

impl std::ops::Add for UsdAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for UsdAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), std::ops::Add::add)
    }
}

/// The cost profile of filling one order, memoized per order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    /// Gas for the destination `fillOrder` call.
    pub fill_gas: Gas,
    /// Gas for delivering the redeem-escrow message on the source chain.
    pub post_gas: Gas,
    /// The relayer fee in destination fee-token base units.
    pub relayer_fee: U256,
}

/// A transaction hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, From, Into)]
pub struct TxId(pub B256);

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A concrete onchain call: the unit the swap planner emits and the batch
/// executor consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl From<Call> for contracts::BatchExecutor::Call {
    fn from(call: Call) -> Self {
        Self {
            to: call.to,
            value: call.value,
            data: call.data,
        }
    }
}

/// Interprets a 32-byte order token id. `None` is the native token, otherwise
/// the trailing 20 bytes are the ERC20 address (left padding must be zero for
/// the id to be well formed, which the gateway guarantees).
pub fn token_of(id: &B256) -> Option<TokenAddress> {
    if *id == NATIVE_TOKEN {
        return None;
    }
    Some(TokenAddress(Address::from_slice(&id.as_slice()[12..])))
}

/// The 32-byte order encoding of an ERC20 address.
pub fn token_id(address: Address) -> B256 {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address.as_slice());
    B256::from(out)
}

/// Rescales an integer amount between decimal bases, truncating when scaling
/// down.
pub fn rescale(amount: U256, from_decimals: u8, to_decimals: u8) -> U256 {
    match from_decimals.cmp(&to_decimals) {
        std::cmp::Ordering::Equal => amount,
        std::cmp::Ordering::Less => {
            amount * U256::from(10).pow(U256::from(to_decimals - from_decimals))
        }
        std::cmp::Ordering::Greater => {
            amount / U256::from(10).pow(U256::from(from_decimals - to_decimals))
        }
    }
}
