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

//! Balance transfers between two cards of the same holder.
//!
//! # Preconditions
//!
//! Checked in this order, the first failure wins and nothing is written:
//!
//! | Check | Failure |
//! |-------|---------|
//! | distinct cards | [`TransferRejection::SameCard`] |
//! | both cards exist | [`BankError::CardNotFound`] (source first) |
//! | same owner | [`TransferRejection::CrossOwner`] |
//! | source ACTIVE | [`TransferRejection::SourceInactive`] |
//! | destination ACTIVE | [`TransferRejection::DestinationInactive`] |
//! | amount positive, two fraction digits at most | [`TransferRejection::NonPositiveAmount`], [`TransferRejection::AmountScale`] |
//! | source balance covers amount | [`TransferRejection::InsufficientFunds`] |

use crate::base::CardNumber;
use crate::card::{CardStatus, has_money_scale};
use crate::error::{BankError, TransferRejection};
use crate::store::CardStore;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Balances of both cards right after a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub from: CardNumber,
    pub to: CardNumber,
    pub amount: Decimal,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

#[derive(Debug, Clone)]
pub struct TransferEngine {
    cards: Arc<CardStore>,
}

impl TransferEngine {
    pub fn new(cards: Arc<CardStore>) -> Self {
        Self { cards }
    }

    /// Moves `amount` from one card to another atomically.
    ///
    /// Both cards stay locked from the first read to the final write, so the
    /// sum of their balances is the same before and after.
    ///
    /// # Errors
    ///
    /// [`BankError::CardNotFound`] or [`BankError::TransferRejected`], see
    /// the module documentation for the order of checks.
    pub fn transfer(
        &self,
        from: &CardNumber,
        to: &CardNumber,
        amount: Decimal,
    ) -> Result<TransferReceipt, BankError> {
        if from == to {
            return Err(TransferRejection::SameCard.into());
        }

        let result = self.cards.transaction(&[from, to], |unit| {
            let source = unit.card(from)?;
            let destination = unit.card(to)?;

            if source.owner() != destination.owner() {
                return Err(TransferRejection::CrossOwner.into());
            }
            if source.status() != CardStatus::Active {
                return Err(TransferRejection::SourceInactive(source.status()).into());
            }
            if destination.status() != CardStatus::Active {
                return Err(TransferRejection::DestinationInactive(destination.status()).into());
            }
            if amount <= Decimal::ZERO {
                return Err(TransferRejection::NonPositiveAmount.into());
            }
            if !has_money_scale(amount) {
                return Err(TransferRejection::AmountScale.into());
            }
            if source.balance() < amount {
                return Err(TransferRejection::InsufficientFunds.into());
            }

            unit.card_mut(from)?.debit(amount)?;
            unit.card_mut(to)?.credit(amount)?;

            Ok(TransferReceipt {
                from: from.clone(),
                to: to.clone(),
                amount,
                from_balance: unit.card(from)?.balance(),
                to_balance: unit.card(to)?.balance(),
            })
        });

        match &result {
            Ok(receipt) => tracing::info!(
                from = %from,
                to = %to,
                %amount,
                from_balance = %receipt.from_balance,
                to_balance = %receipt.to_balance,
                "transfer committed"
            ),
            Err(error) => {
                tracing::debug!(from = %from, to = %to, %amount, %error, "transfer refused")
            }
        }
        result
    }
}
