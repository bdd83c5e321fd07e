//! Valuation engine.
//!
//! Values every active token in a window at externally supplied prices, sums
//! the basket and picks the routing target: the least valued tradable token
//! for buys, the most valued held token for sells. A window with no qualifying
//! token yields `target: None` rather than an error so that callers scanning
//! the registry in several windows can keep going and merge.

use alloy_primitives::{Address, U256};
use tracing::debug;

use super::registry::Registry;
use super::types::{RunningValue, TokenInfo, Valuation};
use crate::error::FundError;
use crate::math::{divide, floor_by_bps, multiply};
use crate::venue::SwapVenue;

pub struct ValuationEngine<'a, V> {
    registry: &'a Registry,
    venue: &'a V,
    native: Address,
    slippage_bps: u16,
}

impl<'a, V: SwapVenue> ValuationEngine<'a, V> {
    pub fn new(registry: &'a Registry, venue: &'a V, native: Address, slippage_bps: u16) -> Self {
        Self {
            registry,
            venue,
            native,
            slippage_bps,
        }
    }

    /// Held value of `token` at `price`. A zero holding or zero price is worth
    /// zero and never reaches `multiply`.
    fn value_of(&self, token: Address, price: U256) -> Result<(U256, U256), FundError> {
        let held = self.registry.held_amount(token);
        if held.is_zero() || price.is_zero() {
            return Ok((held, U256::ZERO));
        }
        Ok((held, multiply(held, price)?))
    }

    /// Buy routing. The target's `min_token_output` is the slippage-reduced
    /// amount `input` should buy at the supplied price; a token whose venue
    /// quote cannot meet that floor is not a candidate.
    pub fn min_valued(
        &self,
        tokens: &[Address],
        prices: &[U256],
        count: usize,
        input: U256,
    ) -> Result<Valuation, FundError> {
        let mut result = Valuation::default();
        for (token, price) in window(tokens, prices, count)? {
            if !self.registry.is_active(token) {
                continue;
            }
            let (held, value) = self.value_of(token, price)?;
            result.aggregate_value = result
                .aggregate_value
                .checked_add(value)
                .ok_or(FundError::ArithmeticOverflow)?;

            if price.is_zero() {
                continue;
            }
            if let Some(best) = &result.target {
                if value >= best.token_value {
                    continue;
                }
            }
            let expected = divide(input, price)?;
            let floor = floor_by_bps(expected, self.slippage_bps)?;
            if floor.is_zero() {
                continue;
            }
            let quoted = self.venue.quote(self.native, token, input);
            if quoted < floor {
                debug!(%token, %quoted, %floor, "skipping buy candidate below floor");
                continue;
            }
            result.target = Some(TokenInfo {
                token_address: token,
                min_token_output: floor,
                token_price: price,
                token_amount: held,
                token_value: value,
            });
        }
        Ok(result)
    }

    /// Sell routing: the most valued active token with a holding.
    pub fn max_valued(
        &self,
        tokens: &[Address],
        prices: &[U256],
        count: usize,
    ) -> Result<Valuation, FundError> {
        let mut result = Valuation::default();
        for (token, price) in window(tokens, prices, count)? {
            if !self.registry.is_active(token) {
                continue;
            }
            let (held, value) = self.value_of(token, price)?;
            result.aggregate_value = result
                .aggregate_value
                .checked_add(value)
                .ok_or(FundError::ArithmeticOverflow)?;

            if held.is_zero() || price.is_zero() {
                continue;
            }
            if let Some(best) = &result.target {
                if value <= best.token_value {
                    continue;
                }
            }
            result.target = Some(TokenInfo {
                token_address: token,
                min_token_output: U256::ZERO,
                token_price: price,
                token_amount: held,
                token_value: value,
            });
        }
        Ok(result)
    }

    /// Per-token held values and their sum, for every listed token given.
    pub fn running_value_total(
        &self,
        tokens: &[Address],
        prices: &[U256],
        count: usize,
    ) -> Result<RunningValue, FundError> {
        let mut out = RunningValue {
            values: Vec::with_capacity(count),
            total: U256::ZERO,
        };
        for (token, price) in window(tokens, prices, count)? {
            let (_, value) = self.value_of(token, price)?;
            out.total = out
                .total
                .checked_add(value)
                .ok_or(FundError::ArithmeticOverflow)?;
            out.values.push(value);
        }
        Ok(out)
    }
}

/// First `count` token/price pairs.
fn window<'t>(
    tokens: &'t [Address],
    prices: &'t [U256],
    count: usize,
) -> Result<impl Iterator<Item = (Address, U256)> + 't, FundError> {
    if tokens.len() < count || prices.len() < count {
        return Err(FundError::PriceCountMismatch {
            tokens: tokens.len().min(count),
            prices: prices.len(),
        });
    }
    Ok(tokens[..count].iter().copied().zip(prices[..count].iter().copied()))
}

/// NAV per share.
pub fn current_price(aggregate_value: U256, total_supply: U256) -> Result<U256, FundError> {
    divide(aggregate_value, total_supply)
}

impl Valuation {
    fn merge_by(
        self,
        later: Valuation,
        prefer_later: impl Fn(&TokenInfo, &TokenInfo) -> bool,
    ) -> Result<Valuation, FundError> {
        let aggregate_value = self
            .aggregate_value
            .checked_add(later.aggregate_value)
            .ok_or(FundError::ArithmeticOverflow)?;
        let target = match (self.target, later.target) {
            (Some(a), Some(b)) if prefer_later(&a, &b) => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        };
        Ok(Valuation {
            target,
            aggregate_value,
        })
    }

    /// Combines this window's buy routing with the next window's.
    pub fn merge_min(self, later: Valuation) -> Result<Valuation, FundError> {
        self.merge_by(later, |a, b| b.token_value < a.token_value)
    }

    pub fn merge_max(self, later: Valuation) -> Result<Valuation, FundError> {
        self.merge_by(later, |a, b| b.token_value > a.token_value)
    }
}
