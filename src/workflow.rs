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

//! Submission and adjudication of block requests.

use crate::base::{CardNumber, PageRequest, RequestId, UserId};
use crate::block_request::{BlockRequest, BlockRequestStatus, validate_reason};
use crate::clock::Clock;
use crate::error::BankError;
use crate::store::{AccountHolderStore, BlockRequestStore, CardStore};
use std::sync::Arc;

/// Holders submit block requests; administrators approve or reject them.
///
/// # Invariants
///
/// - `processed_at` is set exactly when the status is APPROVED or REJECTED.
/// - A decided request never changes its decision.
/// - Neither submission nor approval changes the card itself.
#[derive(Debug, Clone)]
pub struct BlockRequestWorkflow {
    requests: Arc<BlockRequestStore>,
    cards: Arc<CardStore>,
    holders: Arc<AccountHolderStore>,
    clock: Arc<dyn Clock>,
}

impl BlockRequestWorkflow {
    pub fn new(
        requests: Arc<BlockRequestStore>,
        cards: Arc<CardStore>,
        holders: Arc<AccountHolderStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            requests,
            cards,
            holders,
            clock,
        }
    }

    /// Files a pending request for `card_number`.
    ///
    /// # Errors
    ///
    /// - [`BankError::CardNotFound`] - card absent.
    /// - [`BankError::UserNotFound`] - requester not registered.
    /// - [`BankError::Forbidden`] - requester does not own the card.
    /// - [`BankError::InvalidReason`] - reason blank or longer than 1000 characters.
    pub fn submit(
        &self,
        card_number: &CardNumber,
        requester: UserId,
        reason: &str,
    ) -> Result<BlockRequest, BankError> {
        let card = self
            .cards
            .get(card_number)
            .ok_or_else(|| BankError::CardNotFound(card_number.clone()))?;
        if !self.holders.exists(requester) {
            return Err(BankError::UserNotFound(requester));
        }
        if card.owner() != requester {
            return Err(BankError::Forbidden {
                user: requester,
                card: card_number.clone(),
            });
        }
        validate_reason(reason)?;

        let request = self.requests.create(
            card_number.clone(),
            requester,
            reason.to_owned(),
            self.clock.now(),
        );
        tracing::info!(
            request = %request.id(),
            card = %card_number,
            requester = %requester,
            "block request submitted"
        );
        Ok(request)
    }

    /// Approves a pending request. Approving an approved request is a no-op.
    ///
    /// # Errors
    ///
    /// - [`BankError::BlockRequestNotFound`] - unknown id.
    /// - [`BankError::RequestAlreadyProcessed`] - request was rejected.
    pub fn approve(&self, id: RequestId) -> Result<BlockRequest, BankError> {
        self.decide(id, BlockRequestStatus::Approved)
    }

    /// Rejects a pending request. Rejecting a rejected request is a no-op.
    ///
    /// # Errors
    ///
    /// - [`BankError::BlockRequestNotFound`] - unknown id.
    /// - [`BankError::RequestAlreadyProcessed`] - request was approved.
    pub fn reject(&self, id: RequestId) -> Result<BlockRequest, BankError> {
        self.decide(id, BlockRequestStatus::Rejected)
    }

    fn decide(
        &self,
        id: RequestId,
        decision: BlockRequestStatus,
    ) -> Result<BlockRequest, BankError> {
        let now = self.clock.now();
        let (request, changed) = self.requests.update(id, |request| {
            let changed = request.decide(decision, now)?;
            Ok((request.clone(), changed))
        })?;

        if changed {
            tracing::info!(
                request = %id,
                card = %request.card_number(),
                status = %decision,
                "block request decided"
            );
        } else {
            tracing::debug!(request = %id, status = %decision, "block request already decided");
        }
        Ok(request)
    }

    /// # Errors
    ///
    /// [`BankError::BlockRequestNotFound`] for an unknown id.
    pub fn get(&self, id: RequestId) -> Result<BlockRequest, BankError> {
        self.requests
            .get(id)
            .ok_or(BankError::BlockRequestNotFound(id))
    }

    /// All requests, newest first.
    pub fn list(&self, page: PageRequest) -> Vec<BlockRequest> {
        self.requests.page(None, page)
    }

    /// Requests in one status, newest first. `status` is matched
    /// case-insensitively.
    ///
    /// # Errors
    ///
    /// [`BankError::InvalidStatus`] if `status` names no known status.
    pub fn list_by_status(
        &self,
        status: &str,
        page: PageRequest,
    ) -> Result<Vec<BlockRequest>, BankError> {
        let status: BlockRequestStatus = status.parse()?;
        Ok(self.requests.page(Some(status), page))
    }
}
