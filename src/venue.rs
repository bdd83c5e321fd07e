//! Swap venue seam and a constant-product simulation of it.
//!
//! The fund never prices anything itself: it asks a [`SwapVenue`] for quotes
//! and hands it exact-input swaps with an output floor. [`PoolVenue`] is an
//! in-memory venue made of x·y=k pools, each pairing one basket token with the
//! wrapped native token.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FundError;

pub trait SwapVenue {
    /// Output the venue would give for `amount_in`, or zero when no route exists.
    fn quote(&self, token_in: Address, token_out: Address, amount_in: U256) -> U256;

    /// Executes an exact-input swap. Fails with `TooLittleReceived` when the
    /// output would fall below `min_out`.
    fn swap_exact_input(
        &mut self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        min_out: U256,
    ) -> Result<U256, FundError>;
}

/// Token metadata lookup.
pub trait TokenDirectory {
    fn symbol(&self, token: Address) -> Option<String>;
}

// ─────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub native: TokenConfig,
    pub tokens: Vec<TokenConfig>,
    pub pools: Vec<PoolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: Address,
}

/// One token/native pool. Reserves are raw 18-decimal amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub token: Address,
    pub token_reserve: U256,
    pub native_reserve: U256,
}

// ─────────────────────────────────────────────────────────
// Pool math
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserves {
    pub token: U256,
    pub native: U256,
}

impl Reserves {
    /// Standard xy=k output with a 0.3% pool fee. `None` when a reserve is
    /// empty or the arithmetic would overflow.
    fn amount_out(reserve_in: U256, reserve_out: U256, amount_in: U256) -> Option<U256> {
        if reserve_in.is_zero() || reserve_out.is_zero() || amount_in.is_zero() {
            return None;
        }
        let amount_in_with_fee = amount_in.checked_mul(U256::from(997u64))?;
        let numerator = amount_in_with_fee.checked_mul(reserve_out)?;
        let denominator = reserve_in
            .checked_mul(U256::from(1000u64))?
            .checked_add(amount_in_with_fee)?;
        Some(numerator / denominator)
    }

    /// Simulates a swap and returns `(amount_out, reserves_after)`.
    fn simulate(&self, amount_in: U256, token_is_input: bool) -> Option<(U256, Reserves)> {
        let (reserve_in, reserve_out) = if token_is_input {
            (self.token, self.native)
        } else {
            (self.native, self.token)
        };
        let amount_out = Self::amount_out(reserve_in, reserve_out, amount_in)?;
        let new_in = reserve_in.checked_add(amount_in)?;
        let new_out = reserve_out.checked_sub(amount_out)?;
        let updated = if token_is_input {
            Reserves { token: new_in, native: new_out }
        } else {
            Reserves { token: new_out, native: new_in }
        };
        Some((amount_out, updated))
    }
}

// ─────────────────────────────────────────────────────────
// Venue
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PoolVenue {
    native: Address,
    symbols: HashMap<Address, String>,
    pools: HashMap<Address, Reserves>,
}

impl PoolVenue {
    pub fn new(native: Address) -> Self {
        Self {
            native,
            symbols: HashMap::new(),
            pools: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &VenueConfig) -> Self {
        let mut venue = Self::new(cfg.native.address);
        venue.list_token(cfg.native.address, &cfg.native.symbol);
        for t in &cfg.tokens {
            venue.list_token(t.address, &t.symbol);
        }
        for p in &cfg.pools {
            venue.set_pool(p.token, p.token_reserve, p.native_reserve);
        }
        venue
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let cfg: VenueConfig = serde_json::from_str(raw)?;
        Ok(Self::from_config(&cfg))
    }

    pub fn native(&self) -> Address {
        self.native
    }

    pub fn list_token(&mut self, token: Address, symbol: &str) {
        self.symbols.insert(token, symbol.to_string());
    }

    pub fn set_pool(&mut self, token: Address, token_reserve: U256, native_reserve: U256) {
        self.pools.insert(
            token,
            Reserves {
                token: token_reserve,
                native: native_reserve,
            },
        );
    }

    /// Tokens with a pool, in address order.
    pub fn pooled_tokens(&self) -> Vec<Address> {
        let mut tokens: Vec<Address> = self.pools.keys().copied().collect();
        tokens.sort();
        tokens
    }

    pub fn reserves(&self, token: Address) -> Option<Reserves> {
        self.pools.get(&token).copied()
    }

    /// Resolves a pair to `(pool token, token_is_input)`. Only token/native
    /// pairs route.
    fn route(&self, token_in: Address, token_out: Address) -> Option<(Address, bool)> {
        if token_in == self.native && token_out != self.native {
            Some((token_out, false))
        } else if token_out == self.native && token_in != self.native {
            Some((token_in, true))
        } else {
            None
        }
    }

    fn simulate(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Option<(Address, U256, Reserves)> {
        let (pool_token, token_is_input) = self.route(token_in, token_out)?;
        let reserves = self.pools.get(&pool_token)?;
        let (out, updated) = reserves.simulate(amount_in, token_is_input)?;
        Some((pool_token, out, updated))
    }
}

impl SwapVenue for PoolVenue {
    fn quote(&self, token_in: Address, token_out: Address, amount_in: U256) -> U256 {
        self.simulate(token_in, token_out, amount_in)
            .map(|(_, out, _)| out)
            .unwrap_or(U256::ZERO)
    }

    fn swap_exact_input(
        &mut self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        min_out: U256,
    ) -> Result<U256, FundError> {
        let Some((pool_token, out, updated)) = self.simulate(token_in, token_out, amount_in) else {
            return Err(FundError::TooLittleReceived {
                received: U256::ZERO,
                minimum: min_out,
            });
        };
        if out.is_zero() || out < min_out {
            return Err(FundError::TooLittleReceived {
                received: out,
                minimum: min_out,
            });
        }
        self.pools.insert(pool_token, updated);
        debug!(%token_in, %token_out, %amount_in, %out, "venue swap filled");
        Ok(out)
    }
}

impl TokenDirectory for PoolVenue {
    fn symbol(&self, token: Address) -> Option<String> {
        self.symbols.get(&token).cloned()
    }
}
