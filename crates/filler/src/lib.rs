//! Cross-chain intent filler.
//!
//! Watches IntentGateway deployments for `OrderPlaced` events, waits out a
//! value-scaled confirmation policy on the source chain, has every fill
//! strategy bid its expected profit, and submits the winning fill on the
//! destination chain. Escrowed inputs are redeemed back on the source chain
//! through the ISMP host once the gateway observes the fill.
//!
//! The crate is split the usual way: `domain` holds the order model,
//! strategies, swap planning and the orchestrator; `infra` holds chain
//! clients, configuration, pricing, caching and the event monitor.

pub mod arguments;
pub mod domain;
pub mod infra;
mod run;

pub use run::{run, start};
