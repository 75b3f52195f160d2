use crate::domain::eth::{Address, B256, U256, keccak256};

/// How many candidate mapping base slots are probed before giving up on a
/// token. Covers every mainstream ERC20 layout observed in the wild.
pub const MAX_PROBED_SLOTS: u64 = 24;

/// The Solidity storage slot of `mapping(address => ...)[key]` rooted at
/// `base`: `keccak256(pad32(key) ++ uint256(base))`.
pub fn mapping_slot(key: Address, base: u64) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[12..32].copy_from_slice(key.as_slice());
    preimage[32..].copy_from_slice(&U256::from(base).to_be_bytes::<32>());
    keccak256(preimage)
}

/// The slot of `balances[holder]` for a balance mapping rooted at `base`.
pub fn balance_slot(holder: Address, base: u64) -> B256 {
    mapping_slot(holder, base)
}

/// The slot of `allowance[owner][spender]` for an allowance mapping rooted
/// at `base`: the outer mapping keyed by owner, the inner one by spender.
pub fn allowance_slot(owner: Address, spender: Address, base: u64) -> B256 {
    let inner = mapping_slot(owner, base);
    let mut preimage = [0u8; 64];
    preimage[12..32].copy_from_slice(spender.as_slice());
    preimage[32..].copy_from_slice(inner.as_slice());
    keccak256(preimage)
}
