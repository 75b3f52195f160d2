pub mod confirmation;
pub mod eth;
pub mod filler;
pub mod order;
pub mod stable;
pub mod strategy;
pub mod swap;

pub use {filler::IntentFiller, order::Order};
