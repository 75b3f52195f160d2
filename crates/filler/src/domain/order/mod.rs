use {
    crate::domain::eth::{self, B256, Bytes, TxId, U256, keccak256},
    chain::StateMachine,
    derive_more::{From, Into},
    thiserror::Error,
};

/// The storage slot of the gateway's `filled` mapping.
pub const FILLED_MAPPING_SLOT: u64 = 5;

/// The 32-byte order commitment, doubling as the order id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into)]
pub struct OrderId(pub B256);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An input escrowed on the source chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInfo {
    pub token: B256,
    pub amount: U256,
}

/// An output owed to a beneficiary on the destination chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub token: B256,
    pub amount: U256,
    pub beneficiary: B256,
}

/// An order's two sides valued in 18-decimal USD.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderValue {
    /// What the user escrowed on the source chain.
    pub input_usd: crate::domain::eth::UsdAmount,
    /// What the filler must deliver on the destination chain.
    pub output_usd: crate::domain::eth::UsdAmount,
}

/// Where an order placement was observed onchain.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub block_number: u64,
    pub log_index: u64,
    pub tx: TxId,
}

/// A user's cross-chain intent, decoded from an `OrderPlaced` log. Immutable
/// once constructed; the id is always recomputed locally rather than trusted
/// from the wire.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub user: B256,
    pub source_chain: StateMachine,
    pub dest_chain: StateMachine,
    /// Destination chain block height after which the order can no longer be
    /// filled. Not a wall-clock timestamp.
    pub deadline: U256,
    pub nonce: U256,
    pub fees: U256,
    pub inputs: Vec<PaymentInfo>,
    pub outputs: Vec<TokenInfo>,
    pub call_data: Bytes,
    pub placement: Placement,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("bad state machine id: {0}")]
    StateMachine(#[from] chain::Error),
}

impl Order {
    /// Builds an order from a decoded gateway event, recomputing the
    /// commitment id from the fields.
    pub fn from_event(
        event: contracts::IntentGateway::OrderPlaced,
        placement: Placement,
    ) -> Result<Self, DecodeError> {
        let mut order = Self {
            id: OrderId(B256::ZERO),
            user: event.user,
            source_chain: StateMachine::from_wire(&event.sourceChain)?,
            dest_chain: StateMachine::from_wire(&event.destChain)?,
            deadline: event.deadline,
            nonce: event.nonce,
            fees: event.fees,
            inputs: event
                .inputs
                .into_iter()
                .map(|input| PaymentInfo {
                    token: input.token,
                    amount: input.amount,
                })
                .collect(),
            outputs: event
                .outputs
                .into_iter()
                .map(|output| TokenInfo {
                    token: output.token,
                    amount: output.amount,
                    beneficiary: output.beneficiary,
                })
                .collect(),
            call_data: event.callData,
            placement,
        };
        order.id = order.commitment();
        Ok(order)
    }

    /// The deterministic hash identifying this order: keccak-256 over the
    /// packed concatenation of every field except the id itself. Must match
    /// the gateway's onchain computation byte for byte.
    pub fn commitment(&self) -> OrderId {
        let mut preimage = Vec::with_capacity(
            32 * 4 + self.outputs.len() * 96 + self.inputs.len() * 64 + self.call_data.len(),
        );
        preimage.extend_from_slice(self.user.as_slice());
        preimage.extend_from_slice(&self.source_chain.to_wire());
        preimage.extend_from_slice(&self.dest_chain.to_wire());
        preimage.extend_from_slice(&self.deadline.to_be_bytes::<32>());
        preimage.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        preimage.extend_from_slice(&self.fees.to_be_bytes::<32>());
        for output in &self.outputs {
            preimage.extend_from_slice(output.token.as_slice());
            preimage.extend_from_slice(&output.amount.to_be_bytes::<32>());
            preimage.extend_from_slice(output.beneficiary.as_slice());
        }
        for input in &self.inputs {
            preimage.extend_from_slice(input.token.as_slice());
            preimage.extend_from_slice(&input.amount.to_be_bytes::<32>());
        }
        preimage.extend_from_slice(&self.call_data);
        OrderId(keccak256(&preimage))
    }

    /// The storage slot holding this order's fill marker in the gateway:
    /// `keccak256(commitment ++ uint256(FILLED_MAPPING_SLOT))`.
    pub fn filled_slot(&self) -> B256 {
        let mut preimage = [0u8; 64];
        preimage[..32].copy_from_slice(self.id.0.as_slice());
        preimage[32..].copy_from_slice(&U256::from(FILLED_MAPPING_SLOT).to_be_bytes::<32>());
        keccak256(preimage)
    }

    /// Native value the fill transaction must carry: the sum of all native
    /// token outputs.
    pub fn eth_value(&self) -> eth::Ether {
        self.outputs
            .iter()
            .filter(|output| output.token == eth::NATIVE_TOKEN)
            .map(|output| eth::Ether(output.amount))
            .sum()
    }

    /// The ABI form submitted to `fillOrder`.
    pub fn to_gateway(&self) -> contracts::IntentGateway::Order {
        contracts::IntentGateway::Order {
            user: self.user,
            sourceChain: self.source_chain.to_wire().into(),
            destChain: self.dest_chain.to_wire().into(),
            deadline: self.deadline,
            nonce: self.nonce,
            fees: self.fees,
            outputs: self
                .outputs
                .iter()
                .map(|output| contracts::IntentGateway::TokenInfo {
                    token: output.token,
                    amount: output.amount,
                    beneficiary: output.beneficiary,
                })
                .collect(),
            inputs: self
                .inputs
                .iter()
                .map(|input| contracts::IntentGateway::PaymentInfo {
                    token: input.token,
                    amount: input.amount,
                })
                .collect(),
            callData: self.call_data.clone(),
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn commitment_is_deterministic() {
        let a = testing::order();
        let b = testing::order();
        assert_eq!(a.commitment(), b.commitment());
    }

    #[test]
    fn commitment_covers_every_field() {
        let base = testing::order();
        let mut changed = base.clone();
        changed.nonce = U256::from(8u64);
        assert_ne!(base.commitment(), changed.commitment());

        let mut changed = base.clone();
        changed.fees += U256::from(1u64);
        assert_ne!(base.commitment(), changed.commitment());

        let mut changed = base.clone();
        changed.dest_chain = StateMachine::Evm(10201);
        assert_ne!(base.commitment(), changed.commitment());

        let mut changed = base.clone();
        changed.call_data = Bytes::from(vec![1u8]);
        assert_ne!(base.commitment(), changed.commitment());

        let mut changed = base.clone();
        changed.outputs[0].beneficiary = B256::repeat_byte(0xbc);
        assert_ne!(base.commitment(), changed.commitment());
    }

    #[test]
    fn commitment_ignores_placement() {
        // The placement is observation metadata, not part of the order.
        let base = testing::order();
        let mut moved = base.clone();
        moved.placement.block_number += 1;
        assert_eq!(base.commitment(), moved.commitment());
    }

    #[test]
    fn filled_slot_binds_commitment_and_base_slot() {
        let order = testing::order();
        let mut preimage = Vec::new();
        preimage.extend_from_slice(order.id.0.as_slice());
        preimage.extend_from_slice(&U256::from(5u64).to_be_bytes::<32>());
        assert_eq!(order.filled_slot(), keccak256(&preimage));
    }

    #[test]
    fn eth_value_sums_native_outputs() {
        let mut order = testing::order();
        assert_eq!(order.eth_value(), eth::Ether(U256::ZERO));

        order.outputs.push(TokenInfo {
            token: eth::NATIVE_TOKEN,
            amount: U256::from(3u64),
            beneficiary: B256::repeat_byte(0xbb),
        });
        order.outputs.push(TokenInfo {
            token: eth::NATIVE_TOKEN,
            amount: U256::from(4u64),
            beneficiary: B256::repeat_byte(0xbd),
        });
        assert_eq!(order.eth_value(), eth::Ether(U256::from(7u64)));
    }

    #[test]
    fn decodes_from_raw_log_data() {
        // Encode the event the way the gateway would emit it, then walk the
        // same decode path the monitor uses.
        use alloy::sol_types::SolEvent;

        let reference = testing::order();
        let event = contracts::IntentGateway::OrderPlaced {
            user: reference.user,
            sourceChain: reference.source_chain.to_wire().into(),
            destChain: reference.dest_chain.to_wire().into(),
            deadline: reference.deadline,
            nonce: reference.nonce,
            fees: reference.fees,
            outputs: reference.to_gateway().outputs,
            inputs: reference.to_gateway().inputs,
            callData: reference.call_data.clone(),
        };
        let log = alloy::primitives::Log {
            address: eth::Address::repeat_byte(0x01),
            data: alloy::primitives::LogData::new_unchecked(
                vec![contracts::IntentGateway::OrderPlaced::SIGNATURE_HASH],
                event.encode_data().into(),
            ),
        };

        let decoded = contracts::IntentGateway::OrderPlaced::decode_log(&log).unwrap();
        let order = Order::from_event(decoded.data, reference.placement).unwrap();
        assert_eq!(order.id, reference.id);
        assert_eq!(order.outputs, reference.outputs);
        assert_eq!(order.inputs, reference.inputs);
    }

    #[test]
    fn from_event_recomputes_id() {
        let reference = testing::order();
        let event = contracts::IntentGateway::OrderPlaced {
            user: reference.user,
            sourceChain: reference.source_chain.to_wire().into(),
            destChain: reference.dest_chain.to_wire().into(),
            deadline: reference.deadline,
            nonce: reference.nonce,
            fees: reference.fees,
            outputs: reference
                .outputs
                .iter()
                .map(|output| contracts::IntentGateway::TokenInfo {
                    token: output.token,
                    amount: output.amount,
                    beneficiary: output.beneficiary,
                })
                .collect(),
            inputs: reference
                .inputs
                .iter()
                .map(|input| contracts::IntentGateway::PaymentInfo {
                    token: input.token,
                    amount: input.amount,
                })
                .collect(),
            callData: reference.call_data.clone(),
        };
        let decoded = Order::from_event(event, reference.placement).unwrap();
        assert_eq!(decoded.id, reference.id);
    }
}
