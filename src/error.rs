use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

/// Coarse grouping used by callers deciding how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    Registry,
    Authorization,
    Arithmetic,
    Trade,
    Access,
    Governance,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FundError {
    // ── Registry ──
    #[error("token {0} is already in the index")]
    TokenAlreadyAdded(Address),

    #[error("token {0} is already inactive")]
    TokenAlreadyInactive(Address),

    #[error("token {0} was already removed and is awaiting settlement")]
    TokenAlreadyRemoved(Address),

    #[error("token {0} has no symbol")]
    InvalidTokenSymbol(Address),

    #[error("venue returned no quote for token {0}")]
    InvalidUniswapQuote(Address),

    #[error("index already holds the maximum of {0} tokens")]
    MaximumTokenQuantity(usize),

    #[error("index cannot drop below {0} tokens")]
    MinimumTokenQuantity(usize),

    #[error("last removal was at {last}, next allowed at {next_allowed}")]
    RemovalLimitReached { last: u64, next_allowed: u64 },

    #[error("token {0} was never removed from the index")]
    TokenNotRemoved(Address),

    #[error("token {0} is not active in the index")]
    TokenNotActive(Address),

    // ── Authorization ──
    #[error("signature must be 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    #[error("signature s value is in the upper half of the curve order")]
    InvalidValueS,

    #[error("signature v value {0} is not 27 or 28")]
    InvalidValueV(u8),

    #[error("signature was not produced by the attester for this caller")]
    InvalidSignature,

    #[error("signature issued at {issued_at} is outside the window at {now}")]
    SignatureExpired { issued_at: u64, now: u64 },

    #[error("signature {0} was already used")]
    SignatureUsedBefore(B256),

    // ── Arithmetic ──
    #[error("zero is not a valid operand")]
    InvalidZeroInput,

    #[error("expected a 32-byte word, got {0} bytes")]
    ReadOutOfBounds(usize),

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    // ── Trade ──
    #[error("input amount is below the minimum trade size")]
    InsufficientInputAmount,

    #[error("fund holds no idle native balance")]
    NoContractBalance,

    #[error("percentage {0} must be between 1 and 100")]
    InvalidPercentage(u8),

    #[error("Too little received: got {received}, wanted at least {minimum}")]
    TooLittleReceived { received: U256, minimum: U256 },

    #[error("token {token} holds {held}, cannot release {requested}")]
    InsufficientTokenBalance {
        token: Address,
        held: U256,
        requested: U256,
    },

    #[error("share allowance {allowance} is below {requested}")]
    InsufficientAllowance {
        allowance: U256,
        requested: U256,
    },

    #[error("share balance {balance} is below {requested}")]
    InsufficientBalance {
        balance: U256,
        requested: U256,
    },

    #[error("{tokens} tokens but only {prices} prices")]
    PriceCountMismatch { tokens: usize, prices: usize },

    // ── Access ──
    #[error("account {account} is missing role {role}")]
    MissingRole { account: Address, role: B256 },

    // ── Governance pre-checks ──
    #[error("proposal must contain exactly one call")]
    ProposalQuantity,

    #[error("proposal target {0} is not the fund")]
    ProposalTarget(Address),

    #[error("unrecognised function selector 0x{0}")]
    FunctionSelector(String),

    #[error("proposal does not name a valid token")]
    InvalidToken,
}

impl FundError {
    pub fn family(&self) -> ErrorFamily {
        use FundError::*;
        match self {
            TokenAlreadyAdded(_)
            | TokenAlreadyInactive(_)
            | TokenAlreadyRemoved(_)
            | InvalidTokenSymbol(_)
            | InvalidUniswapQuote(_)
            | MaximumTokenQuantity(_)
            | MinimumTokenQuantity(_)
            | RemovalLimitReached { .. }
            | TokenNotRemoved(_)
            | TokenNotActive(_) => ErrorFamily::Registry,

            InvalidSignatureLength(_)
            | InvalidValueS
            | InvalidValueV(_)
            | InvalidSignature
            | SignatureExpired { .. }
            | SignatureUsedBefore(_) => ErrorFamily::Authorization,

            InvalidZeroInput | ReadOutOfBounds(_) | ArithmeticOverflow => ErrorFamily::Arithmetic,

            InsufficientInputAmount
            | NoContractBalance
            | InvalidPercentage(_)
            | TooLittleReceived { .. }
            | InsufficientTokenBalance { .. }
            | InsufficientAllowance { .. }
            | InsufficientBalance { .. }
            | PriceCountMismatch { .. } => ErrorFamily::Trade,

            MissingRole { .. } => ErrorFamily::Access,

            ProposalQuantity | ProposalTarget(_) | FunctionSelector(_) | InvalidToken => {
                ErrorFamily::Governance
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families() {
        assert_eq!(FundError::InvalidValueS.family(), ErrorFamily::Authorization);
        assert_eq!(FundError::InvalidZeroInput.family(), ErrorFamily::Arithmetic);
        assert_eq!(FundError::NoContractBalance.family(), ErrorFamily::Trade);
        assert_eq!(
            FundError::TokenNotRemoved(Address::ZERO).family(),
            ErrorFamily::Registry
        );
        assert_eq!(FundError::ProposalQuantity.family(), ErrorFamily::Governance);
    }

    #[test]
    fn test_slippage_message_matches_venue_wording() {
        let e = FundError::TooLittleReceived {
            received: U256::from(1u64),
            minimum: U256::from(2u64),
        };
        assert!(e.to_string().starts_with("Too little received"));
    }
}
