//! Fund share ledger.
//!
//! The fund only needs supply, balances, allowances, minting and burning on
//! behalf of a holder. [`ShareBook`] keeps all of it in memory.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::error::FundError;

pub trait ShareLedger {
    fn total_supply(&self) -> U256;
    fn balance_of(&self, owner: Address) -> U256;
    fn allowance(&self, owner: Address, spender: Address) -> U256;
    fn approve(&mut self, owner: Address, spender: Address, amount: U256);
    fn mint(&mut self, to: Address, amount: U256) -> Result<(), FundError>;
    /// Burns `amount` of `owner`'s shares, spending `spender`'s allowance.
    fn burn_from(&mut self, owner: Address, spender: Address, amount: U256)
        -> Result<(), FundError>;
}

#[derive(Debug, Clone, Default)]
pub struct ShareBook {
    supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl ShareBook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShareLedger for ShareBook {
    fn total_supply(&self) -> U256 {
        self.supply
    }

    fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((owner, spender), amount);
    }

    fn mint(&mut self, to: Address, amount: U256) -> Result<(), FundError> {
        self.supply = self
            .supply
            .checked_add(amount)
            .ok_or(FundError::ArithmeticOverflow)?;
        let bal = self.balances.entry(to).or_default();
        *bal += amount;
        Ok(())
    }

    fn burn_from(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), FundError> {
        let allowance = self.allowance(owner, spender);
        if allowance < amount {
            return Err(FundError::InsufficientAllowance {
                allowance,
                requested: amount,
            });
        }
        let balance = self.balance_of(owner);
        if balance < amount {
            return Err(FundError::InsufficientBalance {
                balance,
                requested: amount,
            });
        }
        if allowance != U256::MAX {
            self.allowances.insert((owner, spender), allowance - amount);
        }
        self.balances.insert(owner, balance - amount);
        self.supply -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder() -> Address {
        Address::repeat_byte(0x11)
    }

    fn fund() -> Address {
        Address::repeat_byte(0xf0)
    }

    fn make_book() -> ShareBook {
        let mut book = ShareBook::new();
        book.mint(holder(), U256::from(100u64)).unwrap();
        book
    }

    #[test]
    fn test_mint_tracks_supply() {
        let mut book = make_book();
        book.mint(fund(), U256::from(5u64)).unwrap();
        assert_eq!(book.total_supply(), U256::from(105u64));
        assert_eq!(book.balance_of(holder()), U256::from(100u64));
    }

    #[test]
    fn test_burn_requires_allowance() {
        let mut book = make_book();
        let err = book.burn_from(holder(), fund(), U256::from(10u64)).unwrap_err();
        assert_eq!(
            err,
            FundError::InsufficientAllowance {
                allowance: U256::ZERO,
                requested: U256::from(10u64)
            }
        );
    }

    #[test]
    fn test_burn_requires_balance() {
        let mut book = make_book();
        book.approve(holder(), fund(), U256::from(500u64));
        let err = book.burn_from(holder(), fund(), U256::from(200u64)).unwrap_err();
        assert!(matches!(err, FundError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_burn_spends_allowance() {
        let mut book = make_book();
        book.approve(holder(), fund(), U256::from(30u64));
        book.burn_from(holder(), fund(), U256::from(10u64)).unwrap();
        assert_eq!(book.allowance(holder(), fund()), U256::from(20u64));
        assert_eq!(book.balance_of(holder()), U256::from(90u64));
        assert_eq!(book.total_supply(), U256::from(90u64));

        book.approve(holder(), fund(), U256::MAX);
        book.burn_from(holder(), fund(), U256::from(10u64)).unwrap();
        assert_eq!(book.allowance(holder(), fund()), U256::MAX);
    }
}
