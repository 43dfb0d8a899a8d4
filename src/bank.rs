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

//! Composition root.
//!
//! The [`Bank`] owns the three stores and hands out the components that
//! operate on them. Every component receives its stores explicitly, so any
//! of them can also be built on its own.
//!
//! # Thread Safety
//!
//! All components are `Send + Sync` and cheap to clone. Operations on
//! different cards proceed in parallel; operations touching the same card
//! are serialized by that card's lock.

use crate::clock::{Clock, SystemClock};
use crate::lifecycle::CardLifecycle;
use crate::scheduler::{Cadence, SweepScheduler};
use crate::store::{AccountHolderStore, BlockRequestStore, CardStore};
use crate::sweeper::ExpirationSweeper;
use crate::transfer::TransferEngine;
use crate::workflow::BlockRequestWorkflow;
use std::sync::Arc;

/// Card ledger with its holders and block requests.
///
/// # Invariants
///
/// - Card balances never go negative.
/// - A transfer changes both balances or neither.
/// - EXPIRED is only left through an administrative block.
/// - A decided block request keeps its decision.
#[derive(Debug, Clone)]
pub struct Bank {
    cards: Arc<CardStore>,
    holders: Arc<AccountHolderStore>,
    requests: Arc<BlockRequestStore>,
    lifecycle: CardLifecycle,
    transfers: TransferEngine,
    workflow: BlockRequestWorkflow,
    sweeper: ExpirationSweeper,
}

impl Bank {
    /// Creates an empty bank on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty bank reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let cards = Arc::new(CardStore::new());
        let holders = Arc::new(AccountHolderStore::new());
        let requests = Arc::new(BlockRequestStore::new());

        Bank {
            lifecycle: CardLifecycle::new(
                Arc::clone(&cards),
                Arc::clone(&holders),
                Arc::clone(&clock),
            ),
            transfers: TransferEngine::new(Arc::clone(&cards)),
            workflow: BlockRequestWorkflow::new(
                Arc::clone(&requests),
                Arc::clone(&cards),
                Arc::clone(&holders),
                Arc::clone(&clock),
            ),
            sweeper: ExpirationSweeper::new(Arc::clone(&cards), clock),
            cards,
            holders,
            requests,
        }
    }

    pub fn cards(&self) -> &CardStore {
        &self.cards
    }

    pub fn holders(&self) -> &AccountHolderStore {
        &self.holders
    }

    pub fn requests(&self) -> &BlockRequestStore {
        &self.requests
    }

    pub fn lifecycle(&self) -> &CardLifecycle {
        &self.lifecycle
    }

    pub fn transfers(&self) -> &TransferEngine {
        &self.transfers
    }

    pub fn workflow(&self) -> &BlockRequestWorkflow {
        &self.workflow
    }

    pub fn sweeper(&self) -> &ExpirationSweeper {
        &self.sweeper
    }

    /// Runs the expiration sweep on `cadence` until the returned handle is
    /// shut down or dropped.
    pub fn start_sweeper(&self, cadence: Cadence) -> SweepScheduler {
        SweepScheduler::start(self.sweeper.clone(), cadence)
    }
}

impl Default for Bank {
    fn default() -> Self {
        Self::new()
    }
}
