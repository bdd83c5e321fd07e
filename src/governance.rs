//! Governance proposal pre-checks.
//!
//! Voting happens elsewhere. What lands here is the executable payload of a
//! passed proposal, which must be a single call to the fund's own
//! `addTokenToIndex` or `removeTokenFromIndex` naming a plausible token.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FundError;
use crate::venue::{SwapVenue, TokenDirectory};

sol! {
    function addTokenToIndex(address token);
    function removeTokenFromIndex(address token);
}

/// Executable part of a proposal: parallel target/value/calldata lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub targets: Vec<Address>,
    pub values: Vec<U256>,
    pub calldatas: Vec<Bytes>,
}

impl Proposal {
    pub fn add_token(fund: Address, token: Address) -> Self {
        Self::single(fund, addTokenToIndexCall { token }.abi_encode().into())
    }

    pub fn remove_token(fund: Address, token: Address) -> Self {
        Self::single(fund, removeTokenFromIndexCall { token }.abi_encode().into())
    }

    fn single(fund: Address, calldata: Bytes) -> Self {
        Self {
            targets: vec![fund],
            values: vec![U256::ZERO],
            calldatas: vec![calldata],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegistryAction {
    Add(Address),
    Remove(Address),
}

/// Validates the proposal shape and returns the registry mutation it encodes.
pub fn precheck<V>(
    proposal: &Proposal,
    fund: Address,
    venue: &V,
    native: Address,
    quote_probe: U256,
) -> Result<RegistryAction, FundError>
where
    V: SwapVenue + TokenDirectory,
{
    if proposal.targets.len() != 1 || proposal.values.len() != 1 || proposal.calldatas.len() != 1
    {
        return Err(FundError::ProposalQuantity);
    }
    if proposal.targets[0] != fund {
        return Err(FundError::ProposalTarget(proposal.targets[0]));
    }

    let data = &proposal.calldatas[0];
    if data.len() < 4 {
        return Err(FundError::FunctionSelector(hex::encode(data)));
    }
    let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];

    let action = if selector == addTokenToIndexCall::SELECTOR {
        let call = addTokenToIndexCall::abi_decode(data).map_err(|_| FundError::InvalidToken)?;
        RegistryAction::Add(call.token)
    } else if selector == removeTokenFromIndexCall::SELECTOR {
        let call =
            removeTokenFromIndexCall::abi_decode(data).map_err(|_| FundError::InvalidToken)?;
        RegistryAction::Remove(call.token)
    } else {
        return Err(FundError::FunctionSelector(hex::encode(selector)));
    };

    match action {
        RegistryAction::Add(token) => {
            if token.is_zero() {
                return Err(FundError::InvalidToken);
            }
            if venue.symbol(token).map_or(true, |s| s.is_empty()) {
                return Err(FundError::InvalidTokenSymbol(token));
            }
            if venue.quote(native, token, quote_probe).is_zero() {
                return Err(FundError::InvalidUniswapQuote(token));
            }
        }
        RegistryAction::Remove(token) => {
            if token.is_zero() {
                return Err(FundError::InvalidToken);
            }
        }
    }
    debug!(?action, "proposal passed pre-checks");
    Ok(action)
}
