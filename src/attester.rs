//! Off-chain attester.
//!
//! Computes nothing itself: it signs routing results produced by the
//! valuation engine so the fund accepts them for one caller within the
//! freshness window.

use std::str::FromStr;

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signer, SignerSync};
use alloy_primitives::{Address, Bytes, Signature};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::fund::auth::{OrderPayload, SignedOrder, SIGNATURE_LEN};

#[derive(Debug, Clone)]
pub struct Attester {
    signer: PrivateKeySigner,
}

impl Attester {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Fresh throwaway key, for demos and tests.
    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    pub fn from_secret(key: &SecretString) -> Result<Self> {
        let raw = key.expose_secret().trim();
        let signer = PrivateKeySigner::from_str(raw.strip_prefix("0x").unwrap_or(raw))
            .context("FUND_ATTESTER_KEY is not a valid secp256k1 private key")?;
        Ok(Self::new(signer))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub async fn sign(
        &self,
        caller: Address,
        payload: &OrderPayload,
        issued_at: u64,
    ) -> Result<SignedOrder> {
        let digest = payload.digest(caller, issued_at);
        let sig = self
            .signer
            .sign_message(digest.as_slice())
            .await
            .context("attestation signing failed")?;
        debug!(%caller, issued_at, "attestation signed");
        Ok(Self::encode(&sig, issued_at))
    }

    pub fn sign_sync(
        &self,
        caller: Address,
        payload: &OrderPayload,
        issued_at: u64,
    ) -> Result<SignedOrder> {
        let digest = payload.digest(caller, issued_at);
        let sig = self
            .signer
            .sign_message_sync(digest.as_slice())
            .context("attestation signing failed")?;
        Ok(Self::encode(&sig, issued_at))
    }

    /// `r ‖ s ‖ v` with `v` in {27, 28}.
    fn encode(sig: &Signature, issued_at: u64) -> SignedOrder {
        let mut raw = Vec::with_capacity(SIGNATURE_LEN);
        raw.extend_from_slice(&sig.r().to_be_bytes::<32>());
        raw.extend_from_slice(&sig.s().to_be_bytes::<32>());
        raw.push(27 + sig.v() as u8);
        SignedOrder {
            signature: Bytes::from(raw),
            issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fund::auth::{GuardConfig, SignatureGuard};
    use crate::fund::types::TokenInfo;

    fn make_payload() -> OrderPayload {
        OrderPayload::Reinvest {
            percentage: 25,
            info: TokenInfo::default(),
        }
    }

    #[tokio::test]
    async fn test_async_and_sync_signatures_verify() {
        let attester = Attester::random();
        let guard = SignatureGuard::new(GuardConfig {
            attester: attester.address(),
            window_secs: 600,
        });
        let caller = Address::repeat_byte(0xca);
        let payload = make_payload();

        let a = attester.sign(caller, &payload, 42).await.unwrap();
        let b = attester.sign_sync(caller, &payload, 42).unwrap();
        assert_eq!(a.signature.len(), SIGNATURE_LEN);
        assert_eq!(a, b);

        let digest = payload.digest(caller, 42);
        assert_eq!(
            guard.verify_authenticity(digest, &a.signature).unwrap(),
            attester.address()
        );
    }

    #[test]
    fn test_from_secret() {
        let key = SecretString::from(
            "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".to_string(),
        );
        let attester = Attester::from_secret(&key).unwrap();
        assert_eq!(
            attester.address(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
                .parse::<Address>()
                .unwrap()
        );
        assert!(Attester::from_secret(&SecretString::from("nope".to_string())).is_err());
    }
}
