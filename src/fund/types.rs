use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Caller identity, attached native value and trusted time for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub value: U256,
    pub timestamp: u64,
}

impl CallContext {
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self {
            caller,
            value: U256::ZERO,
            timestamp,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// One routed asset as produced by the valuation engine and attested off-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_address: Address,
    /// Buy floor for the routed input; zero on sell routing.
    pub min_token_output: U256,
    pub token_price: U256,
    pub token_amount: U256,
    pub token_value: U256,
}

/// Result of a (possibly windowed) min/max valuation pass.
///
/// `target` is `None` when no asset in the window qualified; the aggregate is
/// still meaningful and is summed when windows are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Valuation {
    pub target: Option<TokenInfo>,
    pub aggregate_value: U256,
}

/// Page of the registry as returned by `list_active`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveTokens {
    pub tokens: Vec<Address>,
    pub symbols: Vec<B256>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnQuote {
    /// Native proceeds expected before the venue and fee.
    pub expected_output: U256,
    pub shares_to_burn: U256,
    pub tokens_to_sell: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningValue {
    pub values: Vec<U256>,
    pub total: U256,
}
