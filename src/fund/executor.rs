//! Trade executor: buy, sell, reinvest and removed-token settlement.
//!
//! Each operation authorizes first, checks and books its effects next, and
//! calls the venue last. The only write after the venue returns is crediting
//! the actual output. Callers run these inside `Fund::transact` so a failure
//! anywhere discards everything, including the consumed signature.

use std::str::FromStr;

use alloy_primitives::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use super::auth::{OrderPayload, SignatureGuard, SignedOrder};
use super::events::FundEvent;
use super::ledger::ShareLedger;
use super::registry::AssetStatus;
use super::types::{BurnQuote, CallContext, TokenInfo};
use super::FundState;
use crate::error::FundError;
use crate::math::{apply_bps, divide, floor_by_bps, multiply, percent_of};
use crate::venue::SwapVenue;

// ─────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TradeConfig {
    /// Fee on buy input and sell proceeds, in basis points. Default: 150 (1.5%).
    pub fee_bps: u16,
    /// Tolerance below the expected venue output. Default: 200 (2%).
    pub slippage_bps: u16,
    /// Smallest native amount accepted by `buy`. Default: 1e15.
    pub min_input: U256,
    /// Shares minted by the first buy into an empty fund. Default: 1000e18.
    pub initial_mint: U256,
    pub fee_receiver: Address,
    /// Wrapped native token the venue prices against.
    pub native: Address,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            fee_bps: 150,
            slippage_bps: 200,
            min_input: U256::from(1_000_000_000_000_000u64),
            initial_mint: U256::from(1_000u64) * U256::from(1_000_000_000_000_000_000u64),
            fee_receiver: Address::ZERO,
            native: Address::ZERO,
        }
    }
}

impl TradeConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        if let Ok(v) = std::env::var("FUND_FEE_PERCENT")      { if let Some(b) = percent_to_bps(&v) { c.fee_bps = b; } }
        if let Ok(v) = std::env::var("FUND_SLIPPAGE_PERCENT") { if let Some(b) = percent_to_bps(&v) { c.slippage_bps = b; } }
        if let Ok(v) = std::env::var("FUND_MIN_INPUT_WEI")    { if let Ok(n) = v.parse() { c.min_input = n; } }
        if let Ok(v) = std::env::var("FUND_INITIAL_MINT")     { if let Ok(n) = v.parse() { c.initial_mint = n; } }
        if let Ok(v) = std::env::var("FUND_FEE_RECEIVER")     { if let Ok(a) = v.parse() { c.fee_receiver = a; } }
        if let Ok(v) = std::env::var("FUND_NATIVE_TOKEN")     { if let Ok(a) = v.parse() { c.native = a; } }
        c
    }
}

/// "1.5" → 150. `None` unless the value lies in `0..=100`.
pub fn percent_to_bps(raw: &str) -> Option<u16> {
    let pct = Decimal::from_str(raw.trim()).ok()?;
    if pct < Decimal::ZERO || pct > dec!(100) {
        return None;
    }
    (pct * dec!(100)).round().to_u16()
}

// ─────────────────────────────────────────────────────────
// Preview math
// ─────────────────────────────────────────────────────────

/// Shares minted for a gross native contribution, and the fee taken from it.
pub fn mint_user_contribution(
    cfg: &TradeConfig,
    value: U256,
    aggregate_value: U256,
    total_supply: U256,
) -> Result<(U256, U256), FundError> {
    let fee = apply_bps(value, cfg.fee_bps)?;
    let net = value.checked_sub(fee).ok_or(FundError::ArithmeticOverflow)?;
    if total_supply.is_zero() {
        return Ok((cfg.initial_mint, fee));
    }
    let nav = divide(aggregate_value, total_supply)?;
    Ok((divide(net, nav)?, fee))
}

/// What burning `shares` against the routed `info` token yields. A claim
/// larger than the token's whole value is capped at that value and only the
/// shares covering it are burned.
pub fn burn_user_contribution(
    shares: U256,
    info: &TokenInfo,
    aggregate_value: U256,
    total_supply: U256,
) -> Result<BurnQuote, FundError> {
    let nav = divide(aggregate_value, total_supply)?;
    let claim = multiply(shares, nav)?;
    if claim >= info.token_value {
        Ok(BurnQuote {
            expected_output: info.token_value,
            shares_to_burn: divide(info.token_value, nav)?,
            tokens_to_sell: info.token_amount,
        })
    } else {
        Ok(BurnQuote {
            expected_output: claim,
            shares_to_burn: shares,
            tokens_to_sell: divide(claim, info.token_price)?,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Executor
// ─────────────────────────────────────────────────────────

/// Mutable view of one transaction's working copies.
pub struct Executor<'a, L, V> {
    pub cfg: &'a TradeConfig,
    pub guard: &'a SignatureGuard,
    pub fund_address: Address,
    pub state: &'a mut FundState,
    pub ledger: &'a mut L,
    pub venue: &'a mut V,
}

impl<'a, L: ShareLedger, V: SwapVenue> Executor<'a, L, V> {
    fn authorize(
        &mut self,
        ctx: &CallContext,
        payload: &OrderPayload,
        order: &SignedOrder,
    ) -> Result<(), FundError> {
        self.guard.authorize(
            &mut self.state.consumed,
            ctx.caller,
            payload,
            order,
            ctx.timestamp,
        )?;
        Ok(())
    }

    fn require_active(&self, token: Address) -> Result<(), FundError> {
        if !self.state.registry.is_active(token) {
            return Err(FundError::TokenNotActive(token));
        }
        Ok(())
    }

    fn credit(&mut self, to: Address, amount: U256) -> Result<(), FundError> {
        if amount.is_zero() {
            return Ok(());
        }
        let bal = self.state.credits.entry(to).or_default();
        *bal = bal.checked_add(amount).ok_or(FundError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Mints shares for `ctx.value` and swaps the net input into the routed token.
    pub fn buy(
        &mut self,
        ctx: &CallContext,
        info: TokenInfo,
        aggregate_value: U256,
        order: &SignedOrder,
    ) -> Result<U256, FundError> {
        let payload = OrderPayload::Buy {
            info,
            aggregate_value,
        };
        self.authorize(ctx, &payload, order)?;

        if ctx.value.is_zero() || ctx.value < self.cfg.min_input {
            return Err(FundError::InsufficientInputAmount);
        }
        let token = info.token_address;
        self.require_active(token)?;

        let supply = self.ledger.total_supply();
        let (shares, fee) = mint_user_contribution(self.cfg, ctx.value, aggregate_value, supply)?;
        let net = ctx
            .value
            .checked_sub(fee)
            .ok_or(FundError::ArithmeticOverflow)?;

        self.ledger.mint(ctx.caller, shares)?;
        self.state.events.push(FundEvent::TokensMinted {
            to: ctx.caller,
            amount: shares,
        });
        self.credit(self.cfg.fee_receiver, fee)?;

        let out = self
            .venue
            .swap_exact_input(self.cfg.native, token, net, info.min_token_output)?;
        self.state.registry.credit_held(token, out)?;

        self.state.events.push(FundEvent::Bought {
            buyer: ctx.caller,
            token,
            native_in: ctx.value,
            fee,
            token_out: out,
            shares,
        });
        info!(
            "🟢 buy by {}: {} native → {} of {} ({} shares, fee {})",
            ctx.caller, ctx.value, out, token, shares, fee
        );
        Ok(shares)
    }

    /// Burns the caller's shares against the routed token and pays out the
    /// native proceeds less the fee. Returns the caller's payout.
    pub fn sell(
        &mut self,
        ctx: &CallContext,
        shares: U256,
        info: TokenInfo,
        aggregate_value: U256,
        order: &SignedOrder,
    ) -> Result<U256, FundError> {
        let payload = OrderPayload::Sell {
            shares,
            info,
            aggregate_value,
        };
        self.authorize(ctx, &payload, order)?;

        if shares.is_zero() {
            return Err(FundError::InsufficientInputAmount);
        }
        let token = info.token_address;
        self.require_active(token)?;

        let quote = burn_user_contribution(shares, &info, aggregate_value, self.ledger.total_supply())?;
        self.ledger
            .burn_from(ctx.caller, self.fund_address, quote.shares_to_burn)?;
        self.state.events.push(FundEvent::TokensBurned {
            from: ctx.caller,
            amount: quote.shares_to_burn,
        });
        self.state.registry.debit_held(token, quote.tokens_to_sell)?;

        let floor = floor_by_bps(quote.expected_output, self.cfg.slippage_bps)?;
        let out = self
            .venue
            .swap_exact_input(token, self.cfg.native, quote.tokens_to_sell, floor)?;

        let fee = apply_bps(out, self.cfg.fee_bps)?;
        let payout = out.checked_sub(fee).ok_or(FundError::ArithmeticOverflow)?;
        self.credit(self.cfg.fee_receiver, fee)?;
        self.credit(ctx.caller, payout)?;

        self.state.events.push(FundEvent::Sold {
            seller: ctx.caller,
            token,
            token_in: quote.tokens_to_sell,
            native_out: out,
            fee,
            shares: quote.shares_to_burn,
        });
        info!(
            "🔴 sell by {}: {} shares → {} of {} sold for {} (fee {})",
            ctx.caller, quote.shares_to_burn, quote.tokens_to_sell, token, out, fee
        );
        Ok(payout)
    }

    /// Puts `percentage`% of the idle native balance into the routed token
    /// without minting.
    pub fn reinvest(
        &mut self,
        ctx: &CallContext,
        percentage: u8,
        info: TokenInfo,
        order: &SignedOrder,
    ) -> Result<U256, FundError> {
        let payload = OrderPayload::Reinvest { percentage, info };
        self.authorize(ctx, &payload, order)?;

        if self.state.idle_balance.is_zero() {
            return Err(FundError::NoContractBalance);
        }
        let amount = percent_of(self.state.idle_balance, percentage)?;
        if amount.is_zero() {
            return Err(FundError::InsufficientInputAmount);
        }
        let token = info.token_address;
        self.require_active(token)?;

        self.state.idle_balance -= amount;
        let out = self
            .venue
            .swap_exact_input(self.cfg.native, token, amount, info.min_token_output)?;
        self.state.registry.credit_held(token, out)?;

        self.state.events.push(FundEvent::Reinvested {
            token,
            native_in: amount,
            token_out: out,
        });
        info!("♻️ reinvested {} idle native into {} of {}", amount, out, token);
        Ok(out)
    }

    /// Sells `percentage`% of a removed token's claim pool into idle native.
    pub fn sell_removed_token(
        &mut self,
        ctx: &CallContext,
        token: Address,
        percentage: u8,
        price: U256,
        order: &SignedOrder,
    ) -> Result<U256, FundError> {
        let payload = OrderPayload::SellRemoved {
            token,
            percentage,
            price,
        };
        self.authorize(ctx, &payload, order)?;

        if self.state.registry.status(token) != Some(AssetStatus::Removed) {
            return Err(FundError::TokenNotRemoved(token));
        }
        let held = self.state.registry.held_amount(token);
        let amount = percent_of(held, percentage)?;
        if amount.is_zero() {
            return Err(FundError::InsufficientInputAmount);
        }
        let floor = floor_by_bps(multiply(amount, price)?, self.cfg.slippage_bps)?;
        let remaining = self.state.registry.debit_held(token, amount)?;

        let out = self
            .venue
            .swap_exact_input(token, self.cfg.native, amount, floor)?;
        self.state.idle_balance = self
            .state
            .idle_balance
            .checked_add(out)
            .ok_or(FundError::ArithmeticOverflow)?;

        self.state.events.push(FundEvent::RemovedTokenSold {
            caller: ctx.caller,
            token,
            token_in: amount,
            native_out: out,
        });
        if remaining.is_zero() {
            self.state
                .events
                .push(FundEvent::RemovedTokenSettled { token });
            info!("✅ removed token {} fully settled", token);
        }
        info!(
            "💱 sold {} of removed {} for {} native ({} left)",
            amount, token, out, remaining
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::SCALE;

    fn ether(n: u64) -> U256 {
        U256::from(n) * SCALE
    }

    fn make_info(amount: u64, price: u64) -> TokenInfo {
        TokenInfo {
            token_address: Address::repeat_byte(1),
            min_token_output: U256::ZERO,
            token_price: ether(price),
            token_amount: ether(amount),
            token_value: ether(amount * price),
        }
    }

    #[test]
    fn test_percent_to_bps() {
        assert_eq!(percent_to_bps("1.5"), Some(150));
        assert_eq!(percent_to_bps(" 2 "), Some(200));
        assert_eq!(percent_to_bps("0.015"), Some(2));
        assert_eq!(percent_to_bps("100"), Some(10_000));
        assert_eq!(percent_to_bps("101"), None);
        assert_eq!(percent_to_bps("-1"), None);
        assert_eq!(percent_to_bps("abc"), None);
    }

    #[test]
    fn test_first_mint_bootstraps_supply() {
        let cfg = TradeConfig::default();
        let (shares, fee) = mint_user_contribution(&cfg, ether(1), U256::ZERO, U256::ZERO).unwrap();
        assert_eq!(shares, cfg.initial_mint);
        assert_eq!(fee, ether(15) / U256::from(1000u64));
    }

    #[test]
    fn test_fee_above_whole_input_is_an_error() {
        let cfg = TradeConfig {
            fee_bps: 20_000,
            ..Default::default()
        };
        assert_eq!(
            mint_user_contribution(&cfg, ether(1), ether(10), ether(10)),
            Err(FundError::ArithmeticOverflow)
        );
    }

    #[test]
    fn test_mint_at_nav() {
        let cfg = TradeConfig {
            fee_bps: 0,
            ..Default::default()
        };
        // NAV 2: 10 native buys 5 shares.
        let (shares, fee) = mint_user_contribution(&cfg, ether(10), ether(200), ether(100)).unwrap();
        assert_eq!(shares, ether(5));
        assert!(fee.is_zero());
    }

    #[test]
    fn test_burn_within_token_value() {
        // NAV 2, 3 shares claim 6 native of a token worth 40 at price 4.
        let q = burn_user_contribution(ether(3), &make_info(10, 4), ether(200), ether(100)).unwrap();
        assert_eq!(q.expected_output, ether(6));
        assert_eq!(q.shares_to_burn, ether(3));
        assert_eq!(
            q.tokens_to_sell,
            ether(6) * SCALE / ether(4)
        );
    }

    #[test]
    fn test_burn_capped_at_token_value() {
        // NAV 2, 50 shares claim 100 but the token is worth only 40.
        let q = burn_user_contribution(ether(50), &make_info(10, 4), ether(200), ether(100)).unwrap();
        assert_eq!(q.expected_output, ether(40));
        assert_eq!(q.shares_to_burn, ether(20));
        assert_eq!(q.tokens_to_sell, ether(10));
    }
}
