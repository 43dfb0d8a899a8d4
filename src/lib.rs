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

//! # Bankcards Ledger
//!
//! This library provides the consistency core of a card-account system:
//! card issuance and lifecycle, balance-preserving transfers between cards of
//! one holder, and a block-request workflow adjudicated by administrators.
//!
//! ## Core Components
//!
//! - [`Bank`]: Composition root wiring stores into components
//! - [`TransferEngine`]: Atomic transfers between two cards
//! - [`CardLifecycle`]: Issue, block, activate and delete cards
//! - [`BlockRequestWorkflow`]: PENDING → APPROVED / REJECTED requests
//! - [`ExpirationSweeper`] and [`SweepScheduler`]: Periodic expiration of cards
//! - [`BankError`]: Error types for every operation
//!
//! ## Example
//!
//! ```
//! use bankcards_ledger::{Bank, Card, CardNumber, CardStatus, YearMonth};
//! use rust_decimal_macros::dec;
//!
//! let bank = Bank::new();
//! let owner = bank.holders().register("alice", "hash", &[]).unwrap();
//!
//! let a = CardNumber::parse("1111222233334444").unwrap();
//! let b = CardNumber::parse("5555666677778888").unwrap();
//! let expiration = YearMonth::new(2999, 12).unwrap();
//! bank.cards()
//!     .insert(
//!         Card::restore(a.clone(), expiration, owner, CardStatus::Active, dec!(200.00)).unwrap(),
//!     )
//!     .unwrap();
//! bank.lifecycle().issue(b.clone(), expiration, owner).unwrap();
//!
//! bank.transfers().transfer(&a, &b, dec!(50.00)).unwrap();
//! assert_eq!(bank.lifecycle().balance(&a).unwrap(), dec!(150.00));
//! assert_eq!(bank.lifecycle().balance(&b).unwrap(), dec!(50.00));
//! ```
//!
//! ## Thread Safety
//!
//! Every card sits behind its own lock. Multi-card operations lock cards in
//! ascending number order, so concurrent transfers over the same pair in
//! opposite directions cannot deadlock.

mod bank;
mod base;
pub mod block_request;
pub mod card;
pub mod clock;
pub mod config;
pub mod error;
mod holder;
mod lifecycle;
pub mod scheduler;
pub mod store;
mod sweeper;
mod transfer;
mod workflow;

pub use bank::Bank;
pub use base::{CardNumber, PageRequest, RequestId, UserId, YearMonth};
pub use block_request::{BlockRequest, BlockRequestStatus};
pub use card::{Card, CardStatus};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Settings;
pub use error::{BankError, ErrorKind, TransferRejection};
pub use holder::{Role, User};
pub use lifecycle::CardLifecycle;
pub use scheduler::{Cadence, SweepScheduler};
pub use store::{AccountHolderStore, BlockRequestStore, CardStore, UnitOfWork};
pub use sweeper::{ExpirationSweeper, SweepReport};
pub use transfer::{TransferEngine, TransferReceipt};
pub use workflow::BlockRequestWorkflow;
