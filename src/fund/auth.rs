//! Order authorization.
//!
//! Every trade carries a signature from the fund's attester over the routing
//! result it was computed with, bound to the caller and an issue time. The
//! guard checks authenticity, then freshness, then single use. Each check is
//! callable on its own; [`SignatureGuard::authorize`] runs them in order.

use std::collections::HashSet;

use alloy_primitives::{keccak256, uint, Address, Bytes, Signature, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::types::TokenInfo;
use crate::error::FundError;
use crate::math::encode_word;

pub const SIGNATURE_LEN: usize = 65;

/// secp256k1n / 2. Canonical signatures keep `s` at or below it.
pub const HALF_CURVE_ORDER: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

// ─────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Only signatures recovering to this address authorize trades.
    pub attester: Address,
    /// Allowed distance between `issued_at` and the current time. Default: 600s.
    pub window_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            attester: Address::ZERO,
            window_secs: 600,
        }
    }
}

impl GuardConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        if let Ok(v) = std::env::var("FUND_ATTESTER")              { if let Ok(a) = v.parse() { c.attester = a; } }
        if let Ok(v) = std::env::var("FUND_SIGNATURE_WINDOW_SECS") { if let Ok(n) = v.parse() { c.window_secs = n; } }
        c
    }
}

// ─────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────

/// What an attestation vouches for. The kind tag keeps an attestation for one
/// operation from authorizing another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderPayload {
    Buy {
        info: TokenInfo,
        aggregate_value: U256,
    },
    Sell {
        shares: U256,
        info: TokenInfo,
        aggregate_value: U256,
    },
    Reinvest {
        percentage: u8,
        info: TokenInfo,
    },
    SellRemoved {
        token: Address,
        percentage: u8,
        price: U256,
    },
}

impl OrderPayload {
    fn kind(&self) -> u8 {
        match self {
            OrderPayload::Buy { .. } => 1,
            OrderPayload::Sell { .. } => 2,
            OrderPayload::Reinvest { .. } => 3,
            OrderPayload::SellRemoved { .. } => 4,
        }
    }

    /// `keccak256(kind ‖ caller ‖ issued_at ‖ fields)`, fixed-width big-endian.
    pub fn digest(&self, caller: Address, issued_at: u64) -> B256 {
        let mut buf = Vec::with_capacity(1 + 20 + 32 * 8);
        buf.push(self.kind());
        buf.extend_from_slice(caller.as_slice());
        buf.extend_from_slice(&encode_word(U256::from(issued_at)));

        let push_info = |buf: &mut Vec<u8>, info: &TokenInfo| {
            buf.extend_from_slice(info.token_address.as_slice());
            buf.extend_from_slice(&encode_word(info.min_token_output));
            buf.extend_from_slice(&encode_word(info.token_price));
            buf.extend_from_slice(&encode_word(info.token_amount));
            buf.extend_from_slice(&encode_word(info.token_value));
        };

        match self {
            OrderPayload::Buy {
                info,
                aggregate_value,
            } => {
                push_info(&mut buf, info);
                buf.extend_from_slice(&encode_word(*aggregate_value));
            }
            OrderPayload::Sell {
                shares,
                info,
                aggregate_value,
            } => {
                buf.extend_from_slice(&encode_word(*shares));
                push_info(&mut buf, info);
                buf.extend_from_slice(&encode_word(*aggregate_value));
            }
            OrderPayload::Reinvest { percentage, info } => {
                buf.push(*percentage);
                push_info(&mut buf, info);
            }
            OrderPayload::SellRemoved {
                token,
                percentage,
                price,
            } => {
                buf.extend_from_slice(token.as_slice());
                buf.push(*percentage);
                buf.extend_from_slice(&encode_word(*price));
            }
        }
        keccak256(&buf)
    }
}

/// Attestation as submitted with a trade: 65-byte `r ‖ s ‖ v` plus issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
    pub signature: Bytes,
    pub issued_at: u64,
}

/// Hashes of every signature that has authorized a trade. Never shrinks.
#[derive(Debug, Clone, Default)]
pub struct ConsumedSignatures {
    seen: HashSet<B256>,
}

impl ConsumedSignatures {
    pub fn contains(&self, hash: &B256) -> bool {
        self.seen.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

// ─────────────────────────────────────────────────────────
// Guard
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SignatureGuard {
    cfg: GuardConfig,
}

impl SignatureGuard {
    pub fn new(cfg: GuardConfig) -> Self {
        Self { cfg }
    }

    pub fn attester(&self) -> Address {
        self.cfg.attester
    }

    /// Checks encoding and recovers the EIP-191 signer of `digest`, which must
    /// be the attester.
    pub fn verify_authenticity(&self, digest: B256, signature: &[u8]) -> Result<Address, FundError> {
        if signature.len() != SIGNATURE_LEN {
            return Err(FundError::InvalidSignatureLength(signature.len()));
        }
        let r = U256::from_be_slice(&signature[..32]);
        let s = U256::from_be_slice(&signature[32..64]);
        if s > HALF_CURVE_ORDER {
            return Err(FundError::InvalidValueS);
        }
        let v = signature[64];
        if v != 27 && v != 28 {
            return Err(FundError::InvalidValueV(v));
        }

        let sig = Signature::new(r, s, v == 28);
        let signer = sig
            .recover_address_from_msg(digest.as_slice())
            .map_err(|_| FundError::InvalidSignature)?;
        if signer != self.cfg.attester {
            return Err(FundError::InvalidSignature);
        }
        Ok(signer)
    }

    pub fn verify_freshness(&self, issued_at: u64, now: u64) -> Result<(), FundError> {
        if issued_at.abs_diff(now) > self.cfg.window_secs {
            return Err(FundError::SignatureExpired { issued_at, now });
        }
        Ok(())
    }

    /// Marks `signature` consumed. Fails if it already was.
    pub fn consume(
        &self,
        consumed: &mut ConsumedSignatures,
        signature: &[u8],
    ) -> Result<B256, FundError> {
        let hash = keccak256(signature);
        if !consumed.seen.insert(hash) {
            return Err(FundError::SignatureUsedBefore(hash));
        }
        Ok(hash)
    }

    /// Full check for `caller` submitting `payload`. Consumption is part of
    /// the caller's transaction and rolls back with it.
    pub fn authorize(
        &self,
        consumed: &mut ConsumedSignatures,
        caller: Address,
        payload: &OrderPayload,
        order: &SignedOrder,
        now: u64,
    ) -> Result<Address, FundError> {
        let digest = payload.digest(caller, order.issued_at);
        let result = self
            .verify_authenticity(digest, &order.signature)
            .and_then(|signer| {
                self.verify_freshness(order.issued_at, now)?;
                self.consume(consumed, &order.signature)?;
                Ok(signer)
            });
        if let Err(e) = &result {
            warn!("⛔ attestation rejected for {}: {}", caller, e);
        }
        result
    }
}
