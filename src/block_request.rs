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

//! Block requests and their adjudication.
//!
//! ```text
//!  submit ──► PENDING ──approve──► APPROVED
//!                │
//!                └────reject────► REJECTED
//! ```
//!
//! Approval records the administrator's decision only; blocking the card is
//! a separate lifecycle operation.

use crate::base::{CardNumber, RequestId, UserId};
use crate::error::BankError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl BlockRequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for BlockRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockRequestStatus {
    type Err = BankError;

    /// Case-insensitive, as status filters arrive as free text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(BankError::InvalidStatus(s.to_owned())),
        }
    }
}

/// A holder's request to have one of their cards blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRequest {
    id: RequestId,
    card_number: CardNumber,
    requester: UserId,
    status: BlockRequestStatus,
    requested_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    reason: String,
}

impl BlockRequest {
    pub const REASON_MAX: usize = 1000;

    pub(crate) fn new(
        id: RequestId,
        card_number: CardNumber,
        requester: UserId,
        reason: String,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            card_number,
            requester,
            status: BlockRequestStatus::Pending,
            requested_at,
            processed_at: None,
            reason,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn card_number(&self) -> &CardNumber {
        &self.card_number
    }

    pub fn requester(&self) -> UserId {
        self.requester
    }

    pub fn status(&self) -> BlockRequestStatus {
        self.status
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// Set exactly when the status is terminal.
    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Applies an administrator decision.
    ///
    /// Returns `false` when the request already carries `decision`; the
    /// original `processed_at` is kept.
    pub(crate) fn decide(
        &mut self,
        decision: BlockRequestStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, BankError> {
        debug_assert!(decision.is_terminal(), "decision must be terminal");
        match self.status {
            BlockRequestStatus::Pending => {
                self.status = decision;
                self.processed_at = Some(at);
                Ok(true)
            }
            current if current == decision => Ok(false),
            current => Err(BankError::RequestAlreadyProcessed {
                id: self.id,
                status: current,
            }),
        }
    }
}

/// Checks the non-blank, at most 1000 character rule.
pub(crate) fn validate_reason(reason: &str) -> Result<(), BankError> {
    if reason.trim().is_empty() || reason.chars().count() > BlockRequest::REASON_MAX {
        return Err(BankError::InvalidReason);
    }
    Ok(())
}
