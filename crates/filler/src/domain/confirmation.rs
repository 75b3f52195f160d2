use {
    crate::domain::eth::{U256, UsdAmount},
    chain::StateMachine,
    std::collections::HashMap,
    thiserror::Error,
};

/// Per-chain finality requirements: how many source-chain confirmations an
/// order must accumulate before the filler acts on it, scaled by the order's
/// USD value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    pub min_usd: UsdAmount,
    pub max_usd: UsdAmount,
    pub min_confs: u64,
    pub max_confs: u64,
}

impl Policy {
    pub fn new(
        min_usd: UsdAmount,
        max_usd: UsdAmount,
        min_confs: u64,
        max_confs: u64,
    ) -> Result<Self, Error> {
        if min_usd > max_usd || min_confs > max_confs {
            return Err(Error::InvalidBounds);
        }
        Ok(Self {
            min_usd,
            max_usd,
            min_confs,
            max_confs,
        })
    }

    /// Linear interpolation between the bounds, rounding half up. Values at
    /// or outside the bounds clamp to the respective end.
    fn required(&self, value: UsdAmount) -> u64 {
        if value <= self.min_usd {
            return self.min_confs;
        }
        if value >= self.max_usd {
            return self.max_confs;
        }
        let position = value.0 - self.min_usd.0;
        let span = U256::from(self.max_confs - self.min_confs);
        let range = self.max_usd.0 - self.min_usd.0;
        // round-half-up of (position * span) / range
        let interpolated =
            (position * span * U256::from(2) + range) / (range * U256::from(2));
        self.min_confs + u64::try_from(interpolated).unwrap_or(self.max_confs - self.min_confs)
    }
}

/// The configured confirmation policies, one per source chain.
#[derive(Debug, Clone, Default)]
pub struct Policies(HashMap<StateMachine, Policy>);

impl Policies {
    pub fn new(policies: HashMap<StateMachine, Policy>) -> Self {
        Self(policies)
    }

    pub fn required_confirmations(
        &self,
        chain: &StateMachine,
        value: UsdAmount,
    ) -> Result<u64, Error> {
        let policy = self
            .0
            .get(chain)
            .ok_or_else(|| Error::MissingChain(chain.clone()))?;
        Ok(policy.required(value))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("no confirmation policy configured for chain {0}")]
    MissingChain(StateMachine),
    #[error("policy bounds must satisfy min <= max")]
    InvalidBounds,
}

#[cfg(test)]
mod test {
    use {super::*, maplit::hashmap};

    fn policy() -> Policy {
        Policy::new(
            UsdAmount::from_dollars(100),
            UsdAmount::from_dollars(10_000),
            1,
            12,
        )
        .unwrap()
    }

    #[test]
    fn clamps_at_bounds() {
        let policy = policy();
        assert_eq!(policy.required(UsdAmount::from_dollars(0)), 1);
        assert_eq!(policy.required(UsdAmount::from_dollars(100)), 1);
        assert_eq!(policy.required(UsdAmount::from_dollars(10_000)), 12);
        assert_eq!(policy.required(UsdAmount::from_dollars(1_000_000)), 12);
    }

    #[test]
    fn interpolates_half_up() {
        // (5050 - 100) * 11 / 9900 = 5.5, which rounds up to 6.
        assert_eq!(policy().required(UsdAmount::from_dollars(5_050)), 7);
    }

    #[test]
    fn is_monotone() {
        let policy = policy();
        let mut last = 0;
        for dollars in (0..12_000).step_by(50) {
            let confs = policy.required(UsdAmount::from_dollars(dollars));
            assert!(confs >= last, "policy regressed at {dollars} USD");
            last = confs;
        }
    }

    #[test]
    fn degenerate_policy_is_constant() {
        // A single-band policy acts as a fixed confirmation count.
        let policy = Policy::new(
            UsdAmount::from_dollars(0),
            UsdAmount::from_dollars(1_000_000),
            6,
            6,
        )
        .unwrap();
        for dollars in [0, 1, 500_000, 2_000_000] {
            assert_eq!(policy.required(UsdAmount::from_dollars(dollars)), 6);
        }
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert_eq!(
            Policy::new(
                UsdAmount::from_dollars(100),
                UsdAmount::from_dollars(10),
                1,
                12
            ),
            Err(Error::InvalidBounds)
        );
        assert_eq!(
            Policy::new(
                UsdAmount::from_dollars(10),
                UsdAmount::from_dollars(100),
                12,
                1
            ),
            Err(Error::InvalidBounds)
        );
    }

    #[test]
    fn unknown_chain_is_an_error() {
        let policies = Policies::new(hashmap! {
            StateMachine::Evm(97) => policy(),
        });
        assert_eq!(
            policies.required_confirmations(&StateMachine::Evm(97), UsdAmount::from_dollars(100)),
            Ok(1)
        );
        assert_eq!(
            policies
                .required_confirmations(&StateMachine::Evm(1), UsdAmount::from_dollars(100)),
            Err(Error::MissingChain(StateMachine::Evm(1)))
        );
    }
}
