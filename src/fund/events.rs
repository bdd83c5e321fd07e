//! Events recorded by the fund, in transaction order.
//!
//! They live in `FundState` and are discarded together with every other
//! effect when a transaction rolls back.

use alloy_primitives::{Address, U256};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum FundEvent {
    TokenAdded {
        token: Address,
        symbol: String,
        position: usize,
    },
    TokenRemoved {
        token: Address,
        residual: U256,
        timestamp: u64,
    },
    /// A removed asset's claim pool has been fully sold.
    RemovedTokenSettled { token: Address },
    TokensMinted { to: Address, amount: U256 },
    TokensBurned { from: Address, amount: U256 },
    Bought {
        buyer: Address,
        token: Address,
        native_in: U256,
        fee: U256,
        token_out: U256,
        shares: U256,
    },
    Sold {
        seller: Address,
        token: Address,
        token_in: U256,
        native_out: U256,
        fee: U256,
        shares: U256,
    },
    Reinvested {
        token: Address,
        native_in: U256,
        token_out: U256,
    },
    RemovedTokenSold {
        caller: Address,
        token: Address,
        token_in: U256,
        native_out: U256,
    },
}

impl FundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FundEvent::TokenAdded { .. } => "TokenAdded",
            FundEvent::TokenRemoved { .. } => "TokenRemoved",
            FundEvent::RemovedTokenSettled { .. } => "RemovedTokenSettled",
            FundEvent::TokensMinted { .. } => "TokensMinted",
            FundEvent::TokensBurned { .. } => "TokensBurned",
            FundEvent::Bought { .. } => "Bought",
            FundEvent::Sold { .. } => "Sold",
            FundEvent::Reinvested { .. } => "Reinvested",
            FundEvent::RemovedTokenSold { .. } => "RemovedTokenSold",
        }
    }
}
