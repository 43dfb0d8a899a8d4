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

//! Expiration sweep.
//!
//! [`ExpirationSweeper::sweep`] is a plain function of the card store and
//! the clock; scheduling lives in [`crate::scheduler`].

use crate::base::{CardNumber, YearMonth};
use crate::card::CardStatus;
use crate::clock::Clock;
use crate::error::BankError;
use crate::store::CardStore;
use serde::Serialize;
use std::sync::Arc;

/// Counters from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Cards found past expiration when the sweep started
    pub scanned: usize,
    /// Cards moved to EXPIRED
    pub expired: usize,
    /// Cards that failed to update and were left alone
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct ExpirationSweeper {
    cards: Arc<CardStore>,
    clock: Arc<dyn Clock>,
}

impl ExpirationSweeper {
    pub fn new(cards: Arc<CardStore>, clock: Arc<dyn Clock>) -> Self {
        Self { cards, clock }
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Marks every card whose expiration month precedes the current month
    /// as EXPIRED.
    ///
    /// Each card is updated in its own unit of work. A failure on one card
    /// is logged and counted in [`SweepReport::skipped`]; the sweep goes on.
    pub fn sweep(&self) -> SweepReport {
        let current = self.clock.current_month();
        let candidates = self.cards.expiring_before(current);
        tracing::info!(
            month = %current,
            candidates = candidates.len(),
            "starting expiration sweep"
        );

        let report = self.expire_all(&candidates, current);
        tracing::info!(?report, "expiration sweep completed");
        report
    }

    fn expire_all(&self, candidates: &[CardNumber], current: YearMonth) -> SweepReport {
        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };
        for number in candidates {
            match self.expire(number, current) {
                Ok(true) => report.expired += 1,
                // Changed concurrently, e.g. already expired by activate().
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(card = %number, %error, "skipping card during expiration sweep");
                    report.skipped += 1;
                }
            }
        }
        report
    }

    fn expire(&self, number: &CardNumber, current: YearMonth) -> Result<bool, BankError> {
        self.cards.transaction(&[number], |unit| {
            let card = unit.card_mut(number)?;
            if !card.is_expired_at(current) || card.status() == CardStatus::Expired {
                return Ok(false);
            }
            card.set_status(CardStatus::Expired);
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::UserId;
    use crate::card::Card;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn sweeper_at(cards: &Arc<CardStore>, year: i32, month: u32) -> ExpirationSweeper {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(year, month, 1, 2, 0, 0).unwrap());
        ExpirationSweeper::new(Arc::clone(cards), Arc::new(clock))
    }

    fn card(number: &str, expiration: YearMonth) -> Card {
        Card::restore(
            CardNumber::parse(number).unwrap(),
            expiration,
            UserId(1),
            CardStatus::Active,
            dec!(0),
        )
        .unwrap()
    }

    #[test]
    fn card_deleted_after_scan_is_skipped() {
        let cards = Arc::new(CardStore::new());
        let old = YearMonth::new(2025, 1).unwrap();
        cards.insert(card("1111111111111111", old)).unwrap();
        cards.insert(card("2222222222222222", old)).unwrap();
        let sweeper = sweeper_at(&cards, 2025, 3);
        let current = sweeper.clock().current_month();

        let candidates = cards.expiring_before(current);
        cards
            .remove(&CardNumber::parse("1111111111111111").unwrap())
            .unwrap();

        let report = sweeper.expire_all(&candidates, current);
        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                expired: 1,
                skipped: 1,
            }
        );
        let survivor = cards
            .get(&CardNumber::parse("2222222222222222").unwrap())
            .unwrap();
        assert_eq!(survivor.status(), CardStatus::Expired);
    }

    #[test]
    fn card_expired_concurrently_is_not_counted() {
        let cards = Arc::new(CardStore::new());
        let old = YearMonth::new(2025, 1).unwrap();
        cards.insert(card("1111111111111111", old)).unwrap();
        let sweeper = sweeper_at(&cards, 2025, 3);
        let current = sweeper.clock().current_month();

        let candidates = cards.expiring_before(current);
        sweeper.expire_all(&candidates, current);
        let again = sweeper.expire_all(&candidates, current);

        assert_eq!(again.expired, 0);
        assert_eq!(again.skipped, 0);
    }
}
