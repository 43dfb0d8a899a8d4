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

//! Keyed in-memory stores.
//!
//! Records refer to each other by id only; each store owns its records and
//! exposes atomic read-validate-write entry points.

mod cards;
mod holders;
mod requests;

pub use cards::{CardStore, UnitOfWork};
pub use holders::AccountHolderStore;
pub use requests::BlockRequestStore;
