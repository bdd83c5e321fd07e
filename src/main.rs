//! Scripted session against a simulated venue.
//!
//! Lists tokens through governance proposals, routes and executes buys and a
//! sell, removes a token, settles its claim pool and reinvests the proceeds,
//! then prints the event log.

use std::env;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use basket_fund::attester::Attester;
use basket_fund::fund::auth::OrderPayload;
use basket_fund::fund::ledger::{ShareBook, ShareLedger};
use basket_fund::fund::types::{CallContext, Valuation};
use basket_fund::fund::{Fund, FundConfig};
use basket_fund::governance::Proposal;
use basket_fund::math::{divide, SCALE};
use basket_fund::venue::{PoolVenue, TokenDirectory};

type DemoFund = Fund<ShareBook, PoolVenue>;

/// Registry positions scanned per valuation call.
const WINDOW: usize = 2;

struct Settings {
    attester_key: Option<SecretString>,
    venue_json: Option<String>,
    log_dir: Option<String>,
}

impl Settings {
    fn from_env() -> Self {
        Self {
            attester_key: env::var("FUND_ATTESTER_KEY").ok().map(SecretString::from),
            venue_json: env::var("FUND_VENUE_JSON").ok(),
            log_dir: env::var("FUND_LOG_DIR").ok(),
        }
    }
}

fn init_logging(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "basket_fund.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();
    guard
}

fn ether(n: u64) -> U256 {
    U256::from(n) * SCALE
}

fn demo_venue() -> PoolVenue {
    let weth = Address::repeat_byte(0xee);
    let mut venue = PoolVenue::new(weth);
    venue.list_token(weth, "WETH");
    let listings = [("LINK", 0x11u8, 400_000u64), ("UNI", 0x22, 250_000), ("AAVE", 0x33, 10_000)];
    for (symbol, byte, token_reserve) in listings {
        let token = Address::repeat_byte(byte);
        venue.list_token(token, symbol);
        venue.set_pool(token, ether(token_reserve), ether(2_000));
    }
    venue
}

/// Spot price in native of every token, read off the venue's pools.
fn spot_prices(fund: &DemoFund, tokens: &[Address]) -> Result<Vec<U256>> {
    tokens
        .iter()
        .map(|t| -> Result<U256> {
            let r = fund
                .venue()
                .reserves(*t)
                .with_context(|| format!("no pool for {t}"))?;
            Ok(divide(r.native, r.token)?)
        })
        .collect()
}

/// Scans the registry window by window and merges the results.
fn route(fund: &DemoFund, buy_input: Option<U256>) -> Result<Valuation> {
    let mut merged = Valuation::default();
    let mut start = 0;
    while start < fund.registry().len() {
        let page = fund.get_active_tokens(start, start + WINDOW);
        let prices = spot_prices(fund, &page.tokens)?;
        merged = match buy_input {
            Some(input) => {
                let v = fund.get_min_valued(&page.tokens, &prices, page.count, input)?;
                merged.merge_min(v)?
            }
            None => {
                let v = fund.get_max_valued(&page.tokens, &prices, page.count)?;
                merged.merge_max(v)?
            }
        };
        start += WINDOW;
    }
    Ok(merged)
}

async fn buy(fund: &mut DemoFund, attester: &Attester, buyer: Address, value: U256, now: u64) -> Result<()> {
    let routed = route(fund, Some(value))?;
    let info = routed.target.context("no tradable token for this buy size")?;
    let payload = OrderPayload::Buy {
        info,
        aggregate_value: routed.aggregate_value,
    };
    let order = attester.sign(buyer, &payload, now).await?;
    let ctx = CallContext::new(buyer, now).with_value(value);
    let shares = fund.buy(&ctx, info, routed.aggregate_value, &order)?;
    info!(
        "{} bought {} shares routed to {}",
        buyer,
        shares,
        fund.get_token_symbol(info.token_address).unwrap_or_default()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let settings = Settings::from_env();
    let _guard = init_logging(settings.log_dir.as_deref());

    info!("═══════════════════════════════════════════════════");
    info!("  Basket Fund: scripted session");
    info!("═══════════════════════════════════════════════════");

    let attester = match &settings.attester_key {
        Some(key) => Attester::from_secret(key)?,
        None => {
            warn!("⚠️ FUND_ATTESTER_KEY not set, using a throwaway attester key");
            Attester::random()
        }
    };
    let venue = match &settings.venue_json {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
            PoolVenue::from_json(&raw).with_context(|| format!("parsing {path}"))?
        }
        None => demo_venue(),
    };

    let operator = Address::repeat_byte(0x01);
    let mut cfg = FundConfig::from_env();
    if cfg.guard.attester.is_zero() {
        cfg.guard.attester = attester.address();
    } else if cfg.guard.attester != attester.address() {
        anyhow::bail!(
            "FUND_ATTESTER {} does not match the attester key ({})",
            cfg.guard.attester,
            attester.address()
        );
    }
    cfg.trade.native = venue.native();
    if cfg.fund_address.is_zero() {
        cfg.fund_address = Address::repeat_byte(0xf0);
    }
    if cfg.trade.fee_receiver.is_zero() {
        cfg.trade.fee_receiver = Address::repeat_byte(0xfe);
    }
    if cfg.governors.is_empty() {
        cfg.governors.push(operator);
    }
    info!(
        "📊 Config: fee={}bps slippage={}bps min_input={} window={}s cooldown={}s",
        cfg.trade.fee_bps,
        cfg.trade.slippage_bps,
        cfg.trade.min_input,
        cfg.guard.window_secs,
        cfg.registry.removal_cooldown_secs
    );

    let fund_address = cfg.fund_address;
    let cooldown = cfg.registry.removal_cooldown_secs;
    let mut fund = Fund::new(cfg, ShareBook::new(), venue);
    let mut now = chrono::Utc::now().timestamp().max(0) as u64;

    // ═══ Listing ═══
    let gov = CallContext::new(operator, now);
    let mut candidates = fund.venue().pooled_tokens();
    candidates.retain(|t| fund.venue().symbol(*t).is_some());
    for token in &candidates {
        fund.execute_proposal(&gov, &Proposal::add_token(fund_address, *token))?;
    }
    let page = fund.get_active_tokens(0, usize::MAX);
    info!("📋 {} active tokens", page.count);

    // ═══ Buys ═══
    let alice = Address::repeat_byte(0xa1);
    let bob = Address::repeat_byte(0xb0);
    buy(&mut fund, &attester, alice, ether(5), now).await?;
    now += 30;
    buy(&mut fund, &attester, bob, ether(3), now).await?;
    now += 30;
    buy(&mut fund, &attester, alice, ether(2), now).await?;

    // ═══ Sell ═══
    now += 30;
    let routed = route(&fund, None)?;
    if let Some(info) = routed.target {
        let shares = fund.ledger().balance_of(bob) / U256::from(2u64);
        fund.approve_shares(bob, shares);
        let payload = OrderPayload::Sell {
            shares,
            info,
            aggregate_value: routed.aggregate_value,
        };
        let order = attester.sign(bob, &payload, now).await?;
        let payout = fund.sell(&CallContext::new(bob, now), shares, info, routed.aggregate_value, &order)?;
        info!("{} sold {} shares for {} native", bob, shares, payout);
    }

    // ═══ Removal and settlement ═══
    now += cooldown;
    let Some(&removed) = candidates.first() else {
        anyhow::bail!("venue lists no tokens");
    };
    fund.execute_proposal(
        &CallContext::new(operator, now),
        &Proposal::remove_token(fund_address, removed),
    )?;
    if !fund.registry().held_amount(removed).is_zero() {
        let price = spot_prices(&fund, &[removed])?[0];
        let order = attester
            .sign(
                alice,
                &OrderPayload::SellRemoved {
                    token: removed,
                    percentage: 100,
                    price,
                },
                now,
            )
            .await?;
        fund.sell_removed_token(&CallContext::new(alice, now), removed, 100, price, &order)?;
    }

    // ═══ Reinvest ═══
    now += 30;
    if !fund.idle_balance().is_zero() {
        let amount = fund.idle_balance() / U256::from(2u64);
        let page = fund.get_active_tokens(0, usize::MAX);
        let prices = spot_prices(&fund, &page.tokens)?;
        let routed = fund
            .valuation()
            .min_valued(&page.tokens, &prices, page.count, amount)?;
        if let Some(info) = routed.target {
            let order = attester
                .sign(alice, &OrderPayload::Reinvest { percentage: 50, info }, now)
                .await?;
            fund.reinvest_fund_ether(&CallContext::new(alice, now), 50, info, &order)?;
        }
    }

    // ═══ Summary ═══
    let page = fund.get_active_tokens(0, usize::MAX);
    let prices = spot_prices(&fund, &page.tokens)?;
    let running = fund.get_running_value_total(&page.tokens, &prices, page.count)?;
    info!(
        "🏁 basket value {} native, NAV/share {}, supply {}",
        running.total,
        fund.get_current_price(running.total)?,
        fund.ledger().total_supply()
    );
    let native = fund.config().trade.native;
    for (token, value) in page.tokens.iter().zip(&running.values) {
        info!(
            "   {:>6}: held {} value {} quote(1 native) {}",
            fund.get_token_symbol(*token).unwrap_or_default(),
            fund.registry().held_amount(*token),
            value,
            fund.get_uniswap_quote(native, *token, ether(1))
        );
    }

    println!("{}", serde_json::to_string_pretty(fund.events())?);
    Ok(())
}
