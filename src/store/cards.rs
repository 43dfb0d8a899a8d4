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

//! Card store with ordered, all-or-nothing units of work.
//!
//! # Locking
//!
//! Every card lives behind its own [`parking_lot::Mutex`], shared through an
//! [`Arc`] held in a [`DashMap`]. Two rules keep the lock graph acyclic:
//!
//! - a shard guard of the map is never held while acquiring a card mutex
//!   (slots are cloned out of the map first);
//! - a unit of work acquires card mutexes in ascending [`CardNumber`] order,
//!   whichever order the caller names them in.

use crate::base::{CardNumber, PageRequest, YearMonth};
use crate::card::{Card, CardStatus};
use crate::error::BankError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// A card cell. `None` once deleted, so holders of a stale [`Arc`] see the
/// card as gone.
#[derive(Debug)]
struct CardSlot {
    card: Option<Card>,
}

type SharedSlot = Arc<Mutex<CardSlot>>;

/// Staged copies of the cards locked by one unit of work.
///
/// Changes made here reach the store only if the closure passed to
/// [`CardStore::transaction`] returns `Ok`.
#[derive(Debug)]
pub struct UnitOfWork {
    staged: Vec<Card>,
}

impl UnitOfWork {
    fn position(&self, number: &CardNumber) -> Result<usize, BankError> {
        self.staged
            .iter()
            .position(|card| card.number() == number)
            .ok_or_else(|| BankError::CardNotFound(number.clone()))
    }

    /// A card locked by this unit of work.
    ///
    /// # Errors
    ///
    /// [`BankError::CardNotFound`] if `number` was not part of the unit.
    pub fn card(&self, number: &CardNumber) -> Result<&Card, BankError> {
        let index = self.position(number)?;
        Ok(&self.staged[index])
    }

    pub fn card_mut(&mut self, number: &CardNumber) -> Result<&mut Card, BankError> {
        let index = self.position(number)?;
        Ok(&mut self.staged[index])
    }
}

/// Keyed collection of cards.
#[derive(Debug, Default)]
pub struct CardStore {
    cards: DashMap<CardNumber, SharedSlot>,
}

impl CardStore {
    pub fn new() -> Self {
        Self {
            cards: DashMap::new(),
        }
    }

    fn slot(&self, number: &CardNumber) -> Option<SharedSlot> {
        self.cards.get(number).map(|slot| Arc::clone(slot.value()))
    }

    fn slots(&self) -> Vec<SharedSlot> {
        self.cards.iter().map(|slot| Arc::clone(slot.value())).collect()
    }

    /// Adds a card.
    ///
    /// # Errors
    ///
    /// [`BankError::DuplicateCard`] if the number is taken.
    pub fn insert(&self, card: Card) -> Result<(), BankError> {
        // Entry holds the shard lock, so check-and-insert is atomic.
        match self.cards.entry(card.number().clone()) {
            Entry::Occupied(entry) => Err(BankError::DuplicateCard(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(CardSlot { card: Some(card) })));
                Ok(())
            }
        }
    }

    /// Snapshot of one card.
    pub fn get(&self, number: &CardNumber) -> Option<Card> {
        self.slot(number)?.lock().card.clone()
    }

    pub fn contains(&self, number: &CardNumber) -> bool {
        self.get(number).is_some()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Numbers of cards whose expiration precedes `month` and that are not
    /// yet marked expired.
    pub fn expiring_before(&self, month: YearMonth) -> Vec<CardNumber> {
        let mut numbers: Vec<CardNumber> = self
            .slots()
            .iter()
            .filter_map(|slot| {
                let slot = slot.lock();
                let card = slot.card.as_ref()?;
                if card.is_expired_at(month) && card.status() != CardStatus::Expired {
                    Some(card.number().clone())
                } else {
                    None
                }
            })
            .collect();
        numbers.sort();
        numbers
    }

    /// All cards ordered by number, one page at a time.
    pub fn page(&self, page: PageRequest) -> Vec<Card> {
        page.apply(self.all())
    }

    /// Every card ordered by number, as one consistent snapshot.
    ///
    /// All cards are locked in ascending number order before any is copied,
    /// so a transfer is seen either entirely or not at all.
    pub fn all(&self) -> Vec<Card> {
        let mut slots: Vec<(CardNumber, SharedSlot)> = self
            .cards
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));

        let guards: Vec<MutexGuard<'_, CardSlot>> =
            slots.iter().map(|(_, slot)| slot.lock()).collect();
        guards.iter().filter_map(|guard| guard.card.clone()).collect()
    }

    /// Deletes a card and returns its final state.
    ///
    /// # Errors
    ///
    /// [`BankError::CardNotFound`] if absent.
    pub fn remove(&self, number: &CardNumber) -> Result<Card, BankError> {
        let slot = self
            .slot(number)
            .ok_or_else(|| BankError::CardNotFound(number.clone()))?;
        let mut guard = slot.lock();
        let card = guard
            .card
            .take()
            .ok_or_else(|| BankError::CardNotFound(number.clone()))?;
        self.cards
            .remove_if(number, |_, current| Arc::ptr_eq(current, &slot));
        Ok(card)
    }

    /// Runs `work` with exclusive access to the named cards.
    ///
    /// Cards are locked in ascending number order and stay locked until
    /// `work` returns. Staged changes are written back only when `work`
    /// returns `Ok`; on `Err` nothing is applied.
    ///
    /// # Errors
    ///
    /// [`BankError::CardNotFound`] for the first missing card in the order
    /// given by the caller, or whatever `work` returns.
    pub fn transaction<T, F>(&self, numbers: &[&CardNumber], work: F) -> Result<T, BankError>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<T, BankError>,
    {
        let mut resolved: Vec<(&CardNumber, SharedSlot)> = Vec::with_capacity(numbers.len());
        for &number in numbers {
            if resolved.iter().any(|(seen, _)| *seen == number) {
                continue;
            }
            let slot = self
                .slot(number)
                .ok_or_else(|| BankError::CardNotFound(number.clone()))?;
            resolved.push((number, slot));
        }
        let caller_order: Vec<&CardNumber> = resolved.iter().map(|(number, _)| *number).collect();

        resolved.sort_by(|a, b| a.0.cmp(b.0));
        let mut guards: Vec<MutexGuard<'_, CardSlot>> =
            resolved.iter().map(|(_, slot)| slot.lock()).collect();

        // A slot may have been deleted between lookup and lock.
        for number in caller_order {
            let live = resolved
                .iter()
                .zip(&guards)
                .any(|((locked, _), guard)| *locked == number && guard.card.is_some());
            if !live {
                return Err(BankError::CardNotFound(number.clone()));
            }
        }

        let mut unit = UnitOfWork {
            staged: guards
                .iter()
                .filter_map(|guard| guard.card.clone())
                .collect(),
        };
        let outcome = work(&mut unit)?;

        for (guard, card) in guards.iter_mut().zip(unit.staged) {
            guard.card = Some(card);
        }
        Ok(outcome)
    }
}
