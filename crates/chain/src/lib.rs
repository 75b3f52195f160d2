use {
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    std::{fmt, str::FromStr},
    thiserror::Error,
};

/// A consensus state machine addressable over ISMP.
///
/// Orders reference their source and destination by these identifiers, which
/// travel on the wire as ASCII strings of the form `EVM-97` or
/// `SUBSTRATE-cere`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateMachine {
    /// An EVM chain, identified by its chain id.
    Evm(u32),
    /// A Polkadot parachain, identified by its para id.
    Polkadot(u32),
    /// A Kusama parachain, identified by its para id.
    Kusama(u32),
    /// A standalone substrate chain, identified by a 4-byte ASCII tag.
    Substrate([u8; 4]),
    /// A tendermint chain, identified by a 4-byte ASCII tag.
    Tendermint([u8; 4]),
}

impl StateMachine {
    /// Returns the chain's EVM chain id, if it is an EVM chain.
    pub fn evm_chain_id(&self) -> Option<u32> {
        match self {
            Self::Evm(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_evm(&self) -> bool {
        matches!(self, Self::Evm(_))
    }

    /// The wire representation, e.g. `EVM-10200`.
    pub fn to_wire(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    /// Parses the wire representation emitted in gateway logs.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let s = std::str::from_utf8(bytes).map_err(|_| Error::NotAscii)?;
        s.parse()
    }
}

impl fmt::Display for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Evm(id) => write!(f, "EVM-{id}"),
            Self::Polkadot(id) => write!(f, "POLKADOT-{id}"),
            Self::Kusama(id) => write!(f, "KUSAMA-{id}"),
            Self::Substrate(tag) => {
                write!(f, "SUBSTRATE-{}", String::from_utf8_lossy(tag.as_slice()))
            }
            Self::Tendermint(tag) => {
                write!(f, "TENDERMINT-{}", String::from_utf8_lossy(tag.as_slice()))
            }
        }
    }
}

impl FromStr for StateMachine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once('-')
            .ok_or_else(|| Error::MissingSeparator(s.to_string()))?;
        let numeric = |id: &str| {
            id.parse::<u32>()
                .map_err(|_| Error::InvalidId(s.to_string()))
        };
        let tag = |id: &str| -> Result<[u8; 4], Error> {
            let bytes = id.as_bytes();
            if bytes.len() != 4 || !bytes.is_ascii() {
                return Err(Error::InvalidId(s.to_string()));
            }
            let mut out = [0u8; 4];
            out.copy_from_slice(bytes);
            Ok(out)
        };
        match kind {
            "EVM" => Ok(Self::Evm(numeric(id)?)),
            "POLKADOT" => Ok(Self::Polkadot(numeric(id)?)),
            "KUSAMA" => Ok(Self::Kusama(numeric(id)?)),
            "SUBSTRATE" => Ok(Self::Substrate(tag(id)?)),
            "TENDERMINT" => Ok(Self::Tendermint(tag(id)?)),
            other => Err(Error::UnknownKind(other.to_string())),
        }
    }
}

impl Serialize for StateMachine {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StateMachine {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("state machine id is not ascii")]
    NotAscii,
    #[error("state machine id has no kind separator: {0:?}")]
    MissingSeparator(String),
    #[error("unknown state machine kind: {0:?}")]
    UnknownKind(String),
    #[error("invalid state machine id: {0:?}")]
    InvalidId(String),
}
