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

//! Error types for card, transfer and block-request operations.

use crate::base::{CardNumber, RequestId, UserId, YearMonth};
use crate::block_request::BlockRequestStatus;
use crate::card::CardStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Why a transfer was refused. Checked in declaration order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRejection {
    /// Source and destination are the same card
    #[error("same card")]
    SameCard,

    /// Cards belong to different holders
    #[error("cross-owner")]
    CrossOwner,

    #[error("source inactive, status={0}")]
    SourceInactive(CardStatus),

    #[error("destination inactive, status={0}")]
    DestinationInactive(CardStatus),

    /// Amount is zero or negative
    #[error("non-positive amount")]
    NonPositiveAmount,

    /// Amount carries more than two fraction digits
    #[error("amount has more than 2 fraction digits")]
    AmountScale,

    /// Source balance is below the amount
    #[error("insufficient funds")]
    InsufficientFunds,
}

/// Coarse classification of [`BankError`], for mapping onto a request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    TransferRejected,
    InvalidStatus,
    Validation,
    Forbidden,
    Conflict,
}

/// Errors raised by the ledger core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("card not found: {0}")]
    CardNotFound(CardNumber),

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("block request not found: {0}")]
    BlockRequestNotFound(RequestId),

    #[error("card already exists: {0}")]
    DuplicateCard(CardNumber),

    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    #[error("transfer rejected: {0}")]
    TransferRejected(#[from] TransferRejection),

    /// Status filter text names no known block-request status
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid card number: {0:?} (must be 16 digits)")]
    InvalidCardNumber(String),

    #[error("invalid month: {0:?} (expected YYYY-MM)")]
    InvalidMonth(String),

    /// Expiration is not strictly after the current month
    #[error("expiration {0} is not in the future")]
    InvalidExpiration(YearMonth),

    #[error("invalid login: {0:?} (must be 3 to 50 characters)")]
    InvalidLogin(String),

    #[error("block request reason must be non-blank and at most 1000 characters")]
    InvalidReason,

    #[error("invalid balance {0} (must be non-negative with at most 2 fraction digits)")]
    InvalidBalance(Decimal),

    /// Requester does not own the card
    #[error("user {user} does not own card {card}")]
    Forbidden { user: UserId, card: CardNumber },

    /// Request already carries the opposite decision
    #[error("block request {id} already {status}")]
    RequestAlreadyProcessed {
        id: RequestId,
        status: BlockRequestStatus,
    },
}

impl BankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CardNotFound(_) | Self::UserNotFound(_) | Self::BlockRequestNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::DuplicateCard(_) | Self::UserAlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::TransferRejected(_) => ErrorKind::TransferRejected,
            Self::InvalidStatus(_) => ErrorKind::InvalidStatus,
            Self::InvalidCardNumber(_)
            | Self::InvalidMonth(_)
            | Self::InvalidExpiration(_)
            | Self::InvalidLogin(_)
            | Self::InvalidReason
            | Self::InvalidBalance(_) => ErrorKind::Validation,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::RequestAlreadyProcessed { .. } => ErrorKind::Conflict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number() -> CardNumber {
        CardNumber::parse("1234567812345678").unwrap()
    }

    #[test]
    fn transfer_rejection_messages() {
        assert_eq!(TransferRejection::CrossOwner.to_string(), "cross-owner");
        assert_eq!(
            TransferRejection::SourceInactive(CardStatus::Blocked).to_string(),
            "source inactive, status=BLOCKED"
        );
        assert_eq!(
            TransferRejection::DestinationInactive(CardStatus::Expired).to_string(),
            "destination inactive, status=EXPIRED"
        );
        assert_eq!(
            TransferRejection::NonPositiveAmount.to_string(),
            "non-positive amount"
        );
        assert_eq!(
            TransferRejection::InsufficientFunds.to_string(),
            "insufficient funds"
        );
    }

    #[test]
    fn error_display_messages() {
        assert_eq!(
            BankError::CardNotFound(number()).to_string(),
            "card not found: 1234567812345678"
        );
        assert_eq!(
            BankError::from(TransferRejection::InsufficientFunds).to_string(),
            "transfer rejected: insufficient funds"
        );
        assert_eq!(
            BankError::RequestAlreadyProcessed {
                id: RequestId(7),
                status: BlockRequestStatus::Rejected,
            }
            .to_string(),
            "block request 7 already REJECTED"
        );
        assert_eq!(
            BankError::Forbidden {
                user: UserId(3),
                card: number(),
            }
            .to_string(),
            "user 3 does not own card 1234567812345678"
        );
    }

    #[test]
    fn every_error_maps_to_one_kind() {
        assert_eq!(BankError::CardNotFound(number()).kind(), ErrorKind::NotFound);
        assert_eq!(BankError::UserNotFound(UserId(1)).kind(), ErrorKind::NotFound);
        assert_eq!(
            BankError::BlockRequestNotFound(RequestId(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(BankError::DuplicateCard(number()).kind(), ErrorKind::AlreadyExists);
        assert_eq!(
            BankError::UserAlreadyExists("alice".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(
            BankError::from(TransferRejection::CrossOwner).kind(),
            ErrorKind::TransferRejected
        );
        assert_eq!(
            BankError::InvalidStatus("DONE".into()).kind(),
            ErrorKind::InvalidStatus
        );
        assert_eq!(BankError::InvalidReason.kind(), ErrorKind::Validation);
        assert_eq!(
            BankError::RequestAlreadyProcessed {
                id: RequestId(1),
                status: BlockRequestStatus::Approved,
            }
            .kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = BankError::from(TransferRejection::InsufficientFunds);
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
