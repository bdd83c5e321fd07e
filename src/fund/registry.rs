//! Asset registry.
//!
//! Slots are append-only and addressed by a stable position, so pagination
//! offsets handed out earlier stay valid after removals. Activity lives in a
//! parallel bitmap; a slot is never compacted or reused for another token.

use std::collections::HashMap;

use alloy_primitives::{Address, B256, U256};
use tracing::{debug, info};

use super::types::ActiveTokens;
use crate::error::FundError;
use crate::math::{pack_short_string, unpack_short_string};
use crate::venue::{SwapVenue, TokenDirectory};

// ─────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RegistryLimits {
    /// Ceiling on simultaneously active tokens. Default: 100.
    pub max_tokens: usize,
    /// Removals may not take the active count below this. Default: 1.
    pub min_tokens: usize,
    /// Minimum spacing between any two removals. Default: one week.
    pub removal_cooldown_secs: u64,
    /// Native amount quoted when checking a token is tradable. Default: 1e15.
    pub quote_probe: U256,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            min_tokens: 1,
            removal_cooldown_secs: 7 * 24 * 60 * 60,
            quote_probe: U256::from(1_000_000_000_000_000u64),
        }
    }
}

impl RegistryLimits {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        if let Ok(v) = std::env::var("FUND_MAX_TOKENS")            { if let Ok(n) = v.parse() { c.max_tokens = n; } }
        if let Ok(v) = std::env::var("FUND_MIN_TOKENS")            { if let Ok(n) = v.parse() { c.min_tokens = n; } }
        if let Ok(v) = std::env::var("FUND_REMOVAL_COOLDOWN_SECS") { if let Ok(n) = v.parse() { c.removal_cooldown_secs = n; } }
        if let Ok(v) = std::env::var("FUND_QUOTE_PROBE_WEI")       { if let Ok(n) = v.parse() { c.quote_probe = n; } }
        c
    }
}

// ─────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetStatus {
    Active,
    /// Out of the basket with a residual claim pool still to settle.
    Removed,
    /// Out of the basket with nothing left to settle.
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub address: Address,
    pub symbol: B256,
    pub held_amount: U256,
    pub last_removed_at: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Registry {
    limits: RegistryLimits,
    slots: Vec<AssetRecord>,
    active: Vec<bool>,
    index: HashMap<Address, usize>,
    num_active: usize,
    last_removal_at: Option<u64>,
}

impl Registry {
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            limits,
            slots: Vec::new(),
            active: Vec::new(),
            index: HashMap::new(),
            num_active: 0,
            last_removal_at: None,
        }
    }

    pub fn limits(&self) -> &RegistryLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn num_active(&self) -> usize {
        self.num_active
    }

    pub fn last_removal_at(&self) -> Option<u64> {
        self.last_removal_at
    }

    pub fn position(&self, token: Address) -> Option<usize> {
        self.index.get(&token).copied()
    }

    pub fn record(&self, token: Address) -> Option<&AssetRecord> {
        self.position(token).map(|i| &self.slots[i])
    }

    /// `None` for tokens that were never listed.
    pub fn status(&self, token: Address) -> Option<AssetStatus> {
        let i = self.position(token)?;
        Some(if self.active[i] {
            AssetStatus::Active
        } else if self.slots[i].held_amount.is_zero() {
            AssetStatus::Inactive
        } else {
            AssetStatus::Removed
        })
    }

    pub fn is_active(&self, token: Address) -> bool {
        self.status(token) == Some(AssetStatus::Active)
    }

    pub fn held_amount(&self, token: Address) -> U256 {
        self.record(token)
            .map(|r| r.held_amount)
            .unwrap_or_default()
    }

    pub fn symbol(&self, token: Address) -> Option<String> {
        self.record(token).map(|r| unpack_short_string(&r.symbol))
    }

    /// Lists (or re-lists) `token`. Returns its stable position.
    pub fn add<V>(&mut self, token: Address, venue: &V, native: Address) -> Result<usize, FundError>
    where
        V: SwapVenue + TokenDirectory,
    {
        match self.status(token) {
            Some(AssetStatus::Active) | Some(AssetStatus::Removed) => {
                return Err(FundError::TokenAlreadyAdded(token));
            }
            Some(AssetStatus::Inactive) | None => {}
        }

        let symbol = venue
            .symbol(token)
            .filter(|s| !s.is_empty())
            .ok_or(FundError::InvalidTokenSymbol(token))?;
        let symbol_word = pack_short_string(&symbol)?;

        if venue.quote(native, token, self.limits.quote_probe).is_zero() {
            return Err(FundError::InvalidUniswapQuote(token));
        }

        if self.num_active >= self.limits.max_tokens {
            return Err(FundError::MaximumTokenQuantity(self.limits.max_tokens));
        }

        let position = match self.position(token) {
            Some(i) => {
                self.slots[i].symbol = symbol_word;
                self.active[i] = true;
                i
            }
            None => {
                let i = self.slots.len();
                self.slots.push(AssetRecord {
                    address: token,
                    symbol: symbol_word,
                    held_amount: U256::ZERO,
                    last_removed_at: None,
                });
                self.active.push(true);
                self.index.insert(token, i);
                i
            }
        };
        self.num_active += 1;
        info!("➕ token {} ({}) listed at position {}", token, symbol, position);
        Ok(position)
    }

    /// Takes `token` out of the basket. Its residual holdings stay in the slot
    /// as a claim pool.
    pub fn remove(&mut self, token: Address, now: u64) -> Result<U256, FundError> {
        let i = match self.status(token) {
            Some(AssetStatus::Active) => self.index[&token],
            Some(AssetStatus::Removed) => return Err(FundError::TokenAlreadyRemoved(token)),
            Some(AssetStatus::Inactive) | None => {
                return Err(FundError::TokenAlreadyInactive(token))
            }
        };

        if self.num_active <= self.limits.min_tokens {
            return Err(FundError::MinimumTokenQuantity(self.limits.min_tokens));
        }

        if let Some(last) = self.last_removal_at {
            let next_allowed = last.saturating_add(self.limits.removal_cooldown_secs);
            if now < next_allowed {
                return Err(FundError::RemovalLimitReached { last, next_allowed });
            }
        }

        self.active[i] = false;
        self.num_active -= 1;
        self.last_removal_at = Some(now);
        self.slots[i].last_removed_at = Some(now);
        let residual = self.slots[i].held_amount;
        info!("➖ token {} removed at {} (residual {})", token, now, residual);
        Ok(residual)
    }

    /// Active tokens in positions `[start, end)`. `end` is clamped to the
    /// registry length.
    pub fn list_active(&self, start: usize, end: usize) -> ActiveTokens {
        let end = end.min(self.slots.len());
        let mut page = ActiveTokens::default();
        if start >= end {
            return page;
        }
        for i in start..end {
            if self.active[i] {
                page.tokens.push(self.slots[i].address);
                page.symbols.push(self.slots[i].symbol);
            }
        }
        page.count = page.tokens.len();
        page
    }

    pub fn credit_held(&mut self, token: Address, amount: U256) -> Result<U256, FundError> {
        let i = self.position(token).ok_or(FundError::TokenNotActive(token))?;
        let slot = &mut self.slots[i];
        slot.held_amount = slot
            .held_amount
            .checked_add(amount)
            .ok_or(FundError::ArithmeticOverflow)?;
        let held = slot.held_amount;
        debug!(%token, %amount, %held, "held credited");
        Ok(held)
    }

    pub fn debit_held(&mut self, token: Address, amount: U256) -> Result<U256, FundError> {
        let i = self.position(token).ok_or(FundError::TokenNotActive(token))?;
        let slot = &mut self.slots[i];
        if slot.held_amount < amount {
            return Err(FundError::InsufficientTokenBalance {
                token,
                held: slot.held_amount,
                requested: amount,
            });
        }
        slot.held_amount -= amount;
        let held = slot.held_amount;
        debug!(%token, %amount, %held, "held debited");
        Ok(held)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::PoolVenue;

    const WEEK: u64 = 7 * 24 * 60 * 60;

    fn native() -> Address {
        Address::repeat_byte(0xee)
    }

    fn token(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn make_venue(n: u8) -> PoolVenue {
        let mut v = PoolVenue::new(native());
        let reserve = U256::from(10u64).pow(U256::from(24u64));
        for i in 1..=n {
            v.list_token(token(i), &format!("TK{i}"));
            v.set_pool(token(i), reserve, reserve);
        }
        v
    }

    fn make_registry(n: u8, limits: RegistryLimits) -> (Registry, PoolVenue) {
        let venue = make_venue(n);
        let mut reg = Registry::new(limits);
        for i in 1..=n {
            reg.add(token(i), &venue, native()).unwrap();
        }
        (reg, venue)
    }

    #[test]
    fn test_add_checks_in_order() {
        let (mut reg, mut venue) = make_registry(1, RegistryLimits::default());
        assert_eq!(
            reg.add(token(1), &venue, native()),
            Err(FundError::TokenAlreadyAdded(token(1)))
        );

        venue.set_pool(token(9), U256::from(1000u64), U256::from(1000u64));
        assert_eq!(
            reg.add(token(9), &venue, native()),
            Err(FundError::InvalidTokenSymbol(token(9)))
        );

        venue.list_token(token(8), "NOPOOL");
        assert_eq!(
            reg.add(token(8), &venue, native()),
            Err(FundError::InvalidUniswapQuote(token(8)))
        );

        venue.list_token(token(9), "");
        assert_eq!(
            reg.add(token(9), &venue, native()),
            Err(FundError::InvalidTokenSymbol(token(9)))
        );
    }

    #[test]
    fn test_add_respects_ceiling() {
        let limits = RegistryLimits {
            max_tokens: 2,
            ..Default::default()
        };
        let (mut reg, _) = make_registry(2, limits);
        let venue = make_venue(3);
        assert_eq!(
            reg.add(token(3), &venue, native()),
            Err(FundError::MaximumTokenQuantity(2))
        );
        assert_eq!(reg.num_active(), 2);
    }

    #[test]
    fn test_remove_floor_and_status_errors() {
        let (mut reg, _) = make_registry(2, RegistryLimits::default());
        reg.credit_held(token(1), U256::from(5u64)).unwrap();

        reg.remove(token(1), 1_000).unwrap();
        assert_eq!(reg.status(token(1)), Some(AssetStatus::Removed));
        assert_eq!(
            reg.remove(token(1), 1_000 + WEEK),
            Err(FundError::TokenAlreadyRemoved(token(1)))
        );
        assert_eq!(
            reg.remove(token(2), 1_000 + WEEK),
            Err(FundError::MinimumTokenQuantity(1))
        );
        assert_eq!(
            reg.remove(token(7), 1_000),
            Err(FundError::TokenAlreadyInactive(token(7)))
        );
    }

    #[test]
    fn test_removal_cooldown_is_registry_wide() {
        let (mut reg, _) = make_registry(3, RegistryLimits::default());
        let t0 = 1_700_000_000;
        reg.remove(token(1), t0).unwrap();
        assert_eq!(
            reg.remove(token(2), t0 + WEEK - 1),
            Err(FundError::RemovalLimitReached {
                last: t0,
                next_allowed: t0 + WEEK
            })
        );
        assert!(reg.is_active(token(2)));
        reg.remove(token(2), t0 + WEEK).unwrap();
        assert_eq!(reg.last_removal_at(), Some(t0 + WEEK));
        assert_eq!(reg.record(token(2)).unwrap().last_removed_at, Some(t0 + WEEK));
    }

    #[test]
    fn test_positions_are_stable_and_readd_reuses_slot() {
        let (mut reg, venue) = make_registry(3, RegistryLimits::default());
        reg.remove(token(2), 10).unwrap();
        assert_eq!(reg.status(token(2)), Some(AssetStatus::Inactive));

        let page = reg.list_active(0, 10);
        assert_eq!(page.tokens, vec![token(1), token(3)]);
        assert_eq!(page.count, 2);
        assert_eq!(reg.list_active(2, 3).tokens, vec![token(3)]);
        assert_eq!(reg.list_active(3, 1).count, 0);

        assert_eq!(reg.add(token(2), &venue, native()).unwrap(), 1);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.list_active(0, 3).count, 3);
    }

    #[test]
    fn test_removed_pool_blocks_readd_until_settled() {
        let (mut reg, venue) = make_registry(2, RegistryLimits::default());
        reg.credit_held(token(1), U256::from(7u64)).unwrap();
        reg.remove(token(1), 10).unwrap();
        assert_eq!(
            reg.add(token(1), &venue, native()),
            Err(FundError::TokenAlreadyAdded(token(1)))
        );
        reg.debit_held(token(1), U256::from(7u64)).unwrap();
        assert_eq!(reg.status(token(1)), Some(AssetStatus::Inactive));
        reg.add(token(1), &venue, native()).unwrap();
        assert!(reg.is_active(token(1)));
    }

    #[test]
    fn test_active_count_matches_bitmap() {
        let limits = RegistryLimits {
            removal_cooldown_secs: 0,
            ..Default::default()
        };
        let (mut reg, venue) = make_registry(5, limits);
        let min = Err(FundError::MinimumTokenQuantity(1));
        let steps: Vec<(bool, u8, Result<(), FundError>)> = vec![
            (false, 1, Ok(())),
            (false, 1, Err(FundError::TokenAlreadyInactive(token(1)))),
            (true, 1, Ok(())),
            (true, 1, Err(FundError::TokenAlreadyAdded(token(1)))),
            (false, 2, Ok(())),
            (false, 3, Ok(())),
            (false, 4, Ok(())),
            (false, 5, Ok(())),
            (false, 1, min.clone()),
            (true, 3, Ok(())),
            (false, 1, Ok(())),
            (false, 3, min),
        ];
        for (now, (is_add, t, expected)) in steps.into_iter().enumerate() {
            let got = if is_add {
                reg.add(token(t), &venue, native()).map(|_| ())
            } else {
                reg.remove(token(t), now as u64).map(|_| ())
            };
            assert_eq!(got, expected, "step {now}");
            let counted = (1..=5).filter(|i| reg.is_active(token(*i))).count();
            assert_eq!(reg.num_active(), counted);
            assert!(reg.num_active() >= 1);
        }
        assert_eq!(reg.num_active(), 1);
        assert!(reg.is_active(token(3)));
    }

    #[test]
    fn test_symbol_round_trip() {
        let (reg, _) = make_registry(1, RegistryLimits::default());
        assert_eq!(reg.symbol(token(1)).as_deref(), Some("TK1"));
        assert_eq!(reg.symbol(token(5)), None);
    }
}
