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

//! Card lifecycle: issue, block, activate, delete.

use crate::base::{CardNumber, PageRequest, UserId, YearMonth};
use crate::card::{Card, CardStatus};
use crate::clock::Clock;
use crate::error::BankError;
use crate::store::{AccountHolderStore, CardStore};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Applies administrative status transitions to single cards.
#[derive(Debug, Clone)]
pub struct CardLifecycle {
    cards: Arc<CardStore>,
    holders: Arc<AccountHolderStore>,
    clock: Arc<dyn Clock>,
}

impl CardLifecycle {
    pub fn new(
        cards: Arc<CardStore>,
        holders: Arc<AccountHolderStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cards,
            holders,
            clock,
        }
    }

    /// Issues an active card with a zero balance.
    ///
    /// # Errors
    ///
    /// - [`BankError::UserNotFound`] - owner is not registered.
    /// - [`BankError::InvalidExpiration`] - expiration is not after the current month.
    /// - [`BankError::DuplicateCard`] - number already issued.
    pub fn issue(
        &self,
        number: CardNumber,
        expiration: YearMonth,
        owner: UserId,
    ) -> Result<Card, BankError> {
        if !self.holders.exists(owner) {
            return Err(BankError::UserNotFound(owner));
        }
        if expiration <= self.clock.current_month() {
            return Err(BankError::InvalidExpiration(expiration));
        }

        let card = Card::new(number, expiration, owner);
        self.cards.insert(card.clone())?;
        tracing::info!(card = %card.number(), owner = %owner, %expiration, "card issued");
        Ok(card)
    }

    /// Forces the card to BLOCKED. Blocking a blocked card succeeds without
    /// change.
    ///
    /// # Errors
    ///
    /// [`BankError::CardNotFound`] if absent.
    pub fn block(&self, number: &CardNumber) -> Result<CardStatus, BankError> {
        let previous = self.cards.transaction(&[number], |unit| {
            let card = unit.card_mut(number)?;
            let previous = card.status();
            card.set_status(CardStatus::Blocked);
            Ok(previous)
        })?;

        if previous != CardStatus::Blocked {
            tracing::info!(card = %number, from = %previous, "card blocked");
        }
        Ok(CardStatus::Blocked)
    }

    /// Re-activates a card, unless its expiration month has passed, in which
    /// case it becomes EXPIRED instead.
    ///
    /// # Errors
    ///
    /// [`BankError::CardNotFound`] if absent.
    pub fn activate(&self, number: &CardNumber) -> Result<CardStatus, BankError> {
        let current = self.clock.current_month();
        let (previous, next) = self.cards.transaction(&[number], |unit| {
            let card = unit.card_mut(number)?;
            let previous = card.status();
            let next = if card.is_expired_at(current) {
                CardStatus::Expired
            } else {
                CardStatus::Active
            };
            card.set_status(next);
            Ok((previous, next))
        })?;

        tracing::info!(card = %number, from = %previous, to = %next, "card activation applied");
        Ok(next)
    }

    /// Deletes a card. A remaining balance does not prevent deletion.
    ///
    /// # Errors
    ///
    /// [`BankError::CardNotFound`] if absent.
    pub fn delete(&self, number: &CardNumber) -> Result<Card, BankError> {
        let card = self.cards.remove(number)?;
        if card.balance() > Decimal::ZERO {
            tracing::warn!(
                card = %number,
                balance = %card.balance(),
                "deleted card still held funds"
            );
        } else {
            tracing::info!(card = %number, "card deleted");
        }
        Ok(card)
    }

    /// # Errors
    ///
    /// [`BankError::CardNotFound`] if absent.
    pub fn get(&self, number: &CardNumber) -> Result<Card, BankError> {
        self.cards
            .get(number)
            .ok_or_else(|| BankError::CardNotFound(number.clone()))
    }

    /// # Errors
    ///
    /// [`BankError::CardNotFound`] if absent.
    pub fn balance(&self, number: &CardNumber) -> Result<Decimal, BankError> {
        self.get(number).map(|card| card.balance())
    }

    pub fn list(&self, page: PageRequest) -> Vec<Card> {
        self.cards.page(page)
    }
}
