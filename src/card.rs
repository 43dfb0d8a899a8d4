// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Card records and their status.
//!
//! Implemented State Machine
//!
//! ```text
//!  issue ──► ACTIVE ◄──activate (not yet expired)── BLOCKED
//!              │  ▲                                   ▲
//!              │  └───────────activate────────────────┤
//!              └──────────────block───────────────────┘
//!
//!  ACTIVE | BLOCKED ──sweep / activate (expired)──► EXPIRED
//!  EXPIRED ──block──► BLOCKED   (administrative override)
//! ```
//!
//! # Example
//!
//! ```
//! use bankcards_ledger::{Card, CardNumber, CardStatus, UserId, YearMonth};
//! use rust_decimal_macros::dec;
//!
//! let number = CardNumber::parse("1234567812345678").unwrap();
//! let card = Card::new(number, YearMonth::new(2030, 1).unwrap(), UserId(1));
//! assert_eq!(card.status(), CardStatus::Active);
//! assert_eq!(card.balance(), dec!(0.00));
//! ```

use crate::base::{CardNumber, UserId, YearMonth};
use crate::error::{BankError, TransferRejection};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardStatus {
    Active,
    Blocked,
    Expired,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Blocked => "BLOCKED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "BLOCKED" => Ok(Self::Blocked),
            "EXPIRED" => Ok(Self::Expired),
            _ => Err(BankError::InvalidStatus(s.to_owned())),
        }
    }
}

/// A balance-bearing card owned by exactly one holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    number: CardNumber,
    expiration: YearMonth,
    status: CardStatus,
    balance: Decimal,
    owner: UserId,
}

impl Card {
    /// Fraction digits carried by balances and amounts.
    pub const SCALE: u32 = 2;

    /// A freshly issued card: active with a zero balance.
    pub fn new(number: CardNumber, expiration: YearMonth, owner: UserId) -> Self {
        Self {
            number,
            expiration,
            status: CardStatus::Active,
            balance: Decimal::new(0, Self::SCALE),
            owner,
        }
    }

    /// Checks that `balance` is a valid stored balance: non-negative, with at
    /// most two fraction digits.
    ///
    /// # Errors
    ///
    /// [`BankError::InvalidBalance`] otherwise.
    pub fn check_balance(balance: Decimal) -> Result<(), BankError> {
        if balance < Decimal::ZERO || !has_money_scale(balance) {
            return Err(BankError::InvalidBalance(balance));
        }
        Ok(())
    }

    /// Rebuilds a card from persisted state.
    ///
    /// # Errors
    ///
    /// [`BankError::InvalidBalance`] for a negative balance or one with more
    /// than two fraction digits.
    pub fn restore(
        number: CardNumber,
        expiration: YearMonth,
        owner: UserId,
        status: CardStatus,
        balance: Decimal,
    ) -> Result<Self, BankError> {
        Self::check_balance(balance)?;
        Ok(Self {
            number,
            expiration,
            status,
            balance,
            owner,
        })
    }

    pub fn number(&self) -> &CardNumber {
        &self.number
    }

    pub fn expiration(&self) -> YearMonth {
        self.expiration
    }

    pub fn status(&self) -> CardStatus {
        self.status
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// True once the expiration month lies before `current`.
    pub fn is_expired_at(&self, current: YearMonth) -> bool {
        self.expiration < current
    }

    pub(crate) fn set_status(&mut self, status: CardStatus) {
        self.status = status;
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: card {} balance went negative: {}",
            self.number,
            self.balance
        );
    }

    /// Decreases the balance.
    pub(crate) fn debit(&mut self, amount: Decimal) -> Result<(), TransferRejection> {
        if amount <= Decimal::ZERO {
            return Err(TransferRejection::NonPositiveAmount);
        }
        if self.balance < amount {
            return Err(TransferRejection::InsufficientFunds);
        }
        self.balance -= amount;
        self.assert_invariants();
        Ok(())
    }

    /// Increases the balance.
    pub(crate) fn credit(&mut self, amount: Decimal) -> Result<(), TransferRejection> {
        if amount <= Decimal::ZERO {
            return Err(TransferRejection::NonPositiveAmount);
        }
        self.balance += amount;
        self.assert_invariants();
        Ok(())
    }
}

/// True when `amount` needs at most [`Card::SCALE`] fraction digits.
pub(crate) fn has_money_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= Card::SCALE
}

/// Balance with exactly two fraction digits, for display and export.
fn money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp(Card::SCALE);
    rounded.rescale(Card::SCALE);
    rounded
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Card", 5)?;
        state.serialize_field("number", &self.number)?;
        state.serialize_field("owner", &self.owner)?;
        state.serialize_field("expiration", &self.expiration)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("balance", &money(self.balance))?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn card() -> Card {
        Card::new(
            CardNumber::parse("1234567812345678").unwrap(),
            YearMonth::new(2030, 6).unwrap(),
            UserId(1),
        )
    }

    #[test]
    fn debit_and_credit_move_balance() {
        let mut card = card();
        card.credit(dec!(100.00)).unwrap();
        card.debit(dec!(30.50)).unwrap();
        assert_eq!(card.balance(), dec!(69.50));
    }

    #[test]
    fn debit_beyond_balance_is_rejected() {
        let mut card = card();
        card.credit(dec!(10.00)).unwrap();
        assert_eq!(
            card.debit(dec!(10.01)),
            Err(TransferRejection::InsufficientFunds)
        );
        assert_eq!(card.balance(), dec!(10.00));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut card = card();
        assert_eq!(card.credit(dec!(0)), Err(TransferRejection::NonPositiveAmount));
        assert_eq!(card.debit(dec!(-1)), Err(TransferRejection::NonPositiveAmount));
    }

    #[test]
    fn restore_rejects_negative_or_fine_grained_balances() {
        let number = CardNumber::parse("1234567812345678").unwrap();
        let month = YearMonth::new(2030, 1).unwrap();
        assert!(
            Card::restore(number.clone(), month, UserId(1), CardStatus::Active, dec!(-0.01))
                .is_err()
        );
        assert!(
            Card::restore(number.clone(), month, UserId(1), CardStatus::Active, dec!(1.001))
                .is_err()
        );
        // Trailing zeros beyond the scale are harmless.
        assert!(Card::restore(number, month, UserId(1), CardStatus::Active, dec!(1.500)).is_ok());
    }

    #[test]
    fn expiration_is_month_granular() {
        let card = card();
        assert!(!card.is_expired_at(YearMonth::new(2030, 6).unwrap()));
        assert!(card.is_expired_at(YearMonth::new(2030, 7).unwrap()));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("blocked".parse::<CardStatus>().unwrap(), CardStatus::Blocked);
        assert_eq!(" Active ".parse::<CardStatus>().unwrap(), CardStatus::Active);
        assert!("frozen".parse::<CardStatus>().is_err());
    }

    #[test]
    fn serializer_renders_two_fraction_digits() {
        let mut card = card();
        card.credit(dec!(150)).unwrap();

        let json = serde_json::to_string(&card).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["number"], "1234567812345678");
        assert_eq!(parsed["owner"], 1);
        assert_eq!(parsed["expiration"], "2030-06");
        assert_eq!(parsed["status"], "ACTIVE");
        assert_eq!(parsed["balance"].as_str().unwrap(), "150.00");
    }
}
