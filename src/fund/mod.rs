//! Basket fund core.
//!
//! [`Fund`] owns the registry, the consumed-signature set, native accounting
//! and the event log, and drives a share ledger and a swap venue. Every
//! mutating call runs through [`Fund::transact`]: work happens on copies that
//! replace the live state only when the call succeeds.

pub mod auth;
pub mod events;
pub mod executor;
pub mod ledger;
pub mod registry;
pub mod types;
pub mod valuation;

use std::collections::{HashMap, HashSet};

use alloy_primitives::{keccak256, Address, B256, U256};
use tracing::{info, warn};

use crate::error::FundError;
use crate::governance::{self, Proposal, RegistryAction};
use crate::math::floor_by_bps;
use crate::venue::{SwapVenue, TokenDirectory};

use auth::{ConsumedSignatures, GuardConfig, SignatureGuard, SignedOrder};
use events::FundEvent;
use executor::{Executor, TradeConfig};
use ledger::ShareLedger;
use registry::{Registry, RegistryLimits};
use types::{ActiveTokens, BurnQuote, CallContext, RunningValue, TokenInfo, Valuation};
use valuation::ValuationEngine;

pub fn governance_role() -> B256 {
    keccak256("GOVERNANCE_ROLE")
}

// ─────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FundConfig {
    pub registry: RegistryLimits,
    pub guard: GuardConfig,
    pub trade: TradeConfig,
    /// Address shares are approved to for burning.
    pub fund_address: Address,
    /// Holders of the governance role: the governance controller and the
    /// deploying operator. Fixed after construction.
    pub governors: Vec<Address>,
}

impl FundConfig {
    pub fn from_env() -> Self {
        let mut c = Self {
            registry: RegistryLimits::from_env(),
            guard: GuardConfig::from_env(),
            trade: TradeConfig::from_env(),
            ..Default::default()
        };
        if let Ok(v) = std::env::var("FUND_ADDRESS") { if let Ok(a) = v.parse() { c.fund_address = a; } }
        if let Ok(v) = std::env::var("FUND_GOVERNORS") {
            c.governors = v
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
        }
        c
    }
}

// ─────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────

/// Everything a transaction may change apart from the share ledger and venue.
#[derive(Debug, Clone)]
pub struct FundState {
    pub registry: Registry,
    pub consumed: ConsumedSignatures,
    /// Native balance owned by the fund itself and not yet reinvested.
    pub idle_balance: U256,
    /// Native owed to fee receiver and sellers.
    pub credits: HashMap<Address, U256>,
    pub events: Vec<FundEvent>,
    governors: HashSet<Address>,
}

impl FundState {
    fn new(limits: RegistryLimits, governors: &[Address]) -> Self {
        Self {
            registry: Registry::new(limits),
            consumed: ConsumedSignatures::default(),
            idle_balance: U256::ZERO,
            credits: HashMap::new(),
            events: Vec::new(),
            governors: governors.iter().copied().collect(),
        }
    }

    fn require_governance(&self, account: Address) -> Result<(), FundError> {
        if !self.governors.contains(&account) {
            return Err(FundError::MissingRole {
                account,
                role: governance_role(),
            });
        }
        Ok(())
    }
}

pub struct Fund<L, V> {
    cfg: FundConfig,
    guard: SignatureGuard,
    state: FundState,
    ledger: L,
    venue: V,
}

impl<L, V> Fund<L, V>
where
    L: ShareLedger + Clone,
    V: SwapVenue + TokenDirectory + Clone,
{
    pub fn new(cfg: FundConfig, ledger: L, venue: V) -> Self {
        let guard = SignatureGuard::new(cfg.guard.clone());
        let state = FundState::new(cfg.registry.clone(), &cfg.governors);
        info!(
            "🏦 fund {} ready (attester {}, {} governors)",
            cfg.fund_address,
            cfg.guard.attester,
            cfg.governors.len()
        );
        Self {
            cfg,
            guard,
            state,
            ledger,
            venue,
        }
    }

    /// Runs `op` against copies of state, ledger and venue. The copies
    /// replace the live values only if `op` succeeds.
    pub fn transact<T>(
        &mut self,
        label: &str,
        op: impl FnOnce(&mut Executor<'_, L, V>) -> Result<T, FundError>,
    ) -> Result<T, FundError> {
        let mut state = self.state.clone();
        let mut ledger = self.ledger.clone();
        let mut venue = self.venue.clone();
        let result = {
            let mut exec = Executor {
                cfg: &self.cfg.trade,
                guard: &self.guard,
                fund_address: self.cfg.fund_address,
                state: &mut state,
                ledger: &mut ledger,
                venue: &mut venue,
            };
            op(&mut exec)
        };
        match result {
            Ok(v) => {
                self.state = state;
                self.ledger = ledger;
                self.venue = venue;
                Ok(v)
            }
            Err(e) => {
                warn!("↩️ {} rolled back: {}", label, e);
                Err(e)
            }
        }
    }

    // ── Registry mutation ──

    pub fn add_token(&mut self, ctx: &CallContext, token: Address) -> Result<usize, FundError> {
        self.transact("add_token", |x| {
            x.state.require_governance(ctx.caller)?;
            let position = x.state.registry.add(token, &*x.venue, x.cfg.native)?;
            let symbol = x.state.registry.symbol(token).unwrap_or_default();
            x.state.events.push(FundEvent::TokenAdded {
                token,
                symbol,
                position,
            });
            Ok(position)
        })
    }

    pub fn remove_token(&mut self, ctx: &CallContext, token: Address) -> Result<U256, FundError> {
        self.transact("remove_token", |x| {
            x.state.require_governance(ctx.caller)?;
            let residual = x.state.registry.remove(token, ctx.timestamp)?;
            x.state.events.push(FundEvent::TokenRemoved {
                token,
                residual,
                timestamp: ctx.timestamp,
            });
            Ok(residual)
        })
    }

    /// Pre-checks a governance proposal and dispatches it to the registry.
    pub fn execute_proposal(
        &mut self,
        ctx: &CallContext,
        proposal: &Proposal,
    ) -> Result<RegistryAction, FundError> {
        let action = governance::precheck(
            proposal,
            self.cfg.fund_address,
            &self.venue,
            self.cfg.trade.native,
            self.cfg.registry.quote_probe,
        )?;
        match action {
            RegistryAction::Add(token) => {
                self.add_token(ctx, token)?;
            }
            RegistryAction::Remove(token) => {
                self.remove_token(ctx, token)?;
            }
        }
        Ok(action)
    }

    // ── Trades ──

    pub fn buy(
        &mut self,
        ctx: &CallContext,
        info: TokenInfo,
        aggregate_value: U256,
        order: &SignedOrder,
    ) -> Result<U256, FundError> {
        self.transact("buy", |x| x.buy(ctx, info, aggregate_value, order))
    }

    pub fn sell(
        &mut self,
        ctx: &CallContext,
        shares: U256,
        info: TokenInfo,
        aggregate_value: U256,
        order: &SignedOrder,
    ) -> Result<U256, FundError> {
        self.transact("sell", |x| x.sell(ctx, shares, info, aggregate_value, order))
    }

    pub fn reinvest_fund_ether(
        &mut self,
        ctx: &CallContext,
        percentage: u8,
        info: TokenInfo,
        order: &SignedOrder,
    ) -> Result<U256, FundError> {
        self.transact("reinvest", |x| x.reinvest(ctx, percentage, info, order))
    }

    pub fn sell_removed_token(
        &mut self,
        ctx: &CallContext,
        token: Address,
        percentage: u8,
        price: U256,
        order: &SignedOrder,
    ) -> Result<U256, FundError> {
        self.transact("sell_removed_token", |x| {
            x.sell_removed_token(ctx, token, percentage, price, order)
        })
    }

    /// Share holders approve the fund before selling.
    pub fn approve_shares(&mut self, owner: Address, amount: U256) {
        self.ledger.approve(owner, self.cfg.fund_address, amount);
    }

    // ── Read surface ──

    pub fn config(&self) -> &FundConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &Registry {
        &self.state.registry
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    pub fn events(&self) -> &[FundEvent] {
        &self.state.events
    }

    pub fn idle_balance(&self) -> U256 {
        self.state.idle_balance
    }

    pub fn credit_of(&self, account: Address) -> U256 {
        self.state
            .credits
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    pub fn consumed_signatures(&self) -> usize {
        self.state.consumed.len()
    }

    pub fn has_role(&self, role: B256, account: Address) -> bool {
        role == governance_role() && self.state.governors.contains(&account)
    }

    pub fn get_active_tokens(&self, start: usize, end: usize) -> ActiveTokens {
        self.state.registry.list_active(start, end)
    }

    pub fn get_token_symbol(&self, token: Address) -> Option<String> {
        self.state.registry.symbol(token)
    }

    pub fn get_uniswap_quote(&self, token_in: Address, token_out: Address, amount: U256) -> U256 {
        self.venue.quote(token_in, token_out, amount)
    }

    pub fn get_current_price(&self, aggregate_value: U256) -> Result<U256, FundError> {
        valuation::current_price(aggregate_value, self.ledger.total_supply())
    }

    pub fn valuation(&self) -> ValuationEngine<'_, V> {
        ValuationEngine::new(
            &self.state.registry,
            &self.venue,
            self.cfg.trade.native,
            self.cfg.trade.slippage_bps,
        )
    }

    pub fn get_running_value_total(
        &self,
        tokens: &[Address],
        prices: &[U256],
        count: usize,
    ) -> Result<RunningValue, FundError> {
        self.valuation().running_value_total(tokens, prices, count)
    }

    /// Buy routing for a gross native input: the fee comes off before sizing.
    pub fn get_min_valued(
        &self,
        tokens: &[Address],
        prices: &[U256],
        count: usize,
        gross_input: U256,
    ) -> Result<Valuation, FundError> {
        let net = floor_by_bps(gross_input, self.cfg.trade.fee_bps)?;
        self.valuation().min_valued(tokens, prices, count, net)
    }

    pub fn get_max_valued(
        &self,
        tokens: &[Address],
        prices: &[U256],
        count: usize,
    ) -> Result<Valuation, FundError> {
        self.valuation().max_valued(tokens, prices, count)
    }

    /// Shares `buy` would mint for `value`, and its fee.
    pub fn mint_user_contribution(
        &self,
        value: U256,
        aggregate_value: U256,
    ) -> Result<(U256, U256), FundError> {
        executor::mint_user_contribution(
            &self.cfg.trade,
            value,
            aggregate_value,
            self.ledger.total_supply(),
        )
    }

    pub fn burn_user_contribution(
        &self,
        shares: U256,
        info: &TokenInfo,
        aggregate_value: U256,
    ) -> Result<BurnQuote, FundError> {
        executor::burn_user_contribution(shares, info, aggregate_value, self.ledger.total_supply())
    }
}
