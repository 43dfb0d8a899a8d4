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

//! Recurring expiration sweeps on a background thread.
//!
//! # Example
//!
//! ```
//! use bankcards_ledger::{Bank, Cadence};
//! use std::time::Duration;
//!
//! let bank = Bank::new();
//! let scheduler = bank.start_sweeper(Cadence::Every(Duration::from_secs(3600)));
//! scheduler.shutdown();
//! ```

use crate::base::YearMonth;
use crate::sweeper::ExpirationSweeper;
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// When sweeps run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// On `day` of every month at `hour:00` UTC.
    Monthly { day: u32, hour: u32 },
    /// At a fixed interval after the previous run, never shorter than
    /// [`Cadence::MIN_INTERVAL`].
    Every(Duration),
}

impl Cadence {
    /// Day 1 of every month at 02:00 UTC.
    pub const MONTHLY_DEFAULT: Self = Self::Monthly { day: 1, hour: 2 };

    /// Shortest gap between two interval sweeps.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

    /// Monthly cadence with `day` clamped to 1..=28 (present in every month)
    /// and `hour` clamped to 0..=23.
    pub fn monthly(day: u32, hour: u32) -> Self {
        Self::Monthly {
            day: day.clamp(1, 28),
            hour: hour.min(23),
        }
    }

    /// First run strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Self::Every(interval) => chrono::Duration::from_std(interval.max(Self::MIN_INTERVAL))
                .ok()
                .and_then(|interval| now.checked_add_signed(interval))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            Self::Monthly { day, hour } => {
                let month = YearMonth::from(now);
                month
                    .at(day, hour)
                    .filter(|candidate| *candidate > now)
                    .or_else(|| month.next().at(day, hour))
                    .unwrap_or_else(|| now + chrono::Duration::days(1))
            }
        }
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::MONTHLY_DEFAULT
    }
}

/// Handle to a running sweep thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct SweepScheduler {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SweepScheduler {
    /// Spawns the sweep thread. The first sweep runs at the first cadence
    /// point after now, as reported by the sweeper's clock.
    pub fn start(sweeper: ExpirationSweeper, cadence: Cadence) -> Self {
        let (shutdown, stop) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("expiration-sweeper".into())
            .spawn(move || {
                tracing::info!(?cadence, "expiration sweeper scheduled");
                loop {
                    let now = sweeper.clock().now();
                    let delay = (cadence.next_after(now) - now)
                        .to_std()
                        .unwrap_or(Duration::ZERO);

                    channel::select! {
                        // Fires on an explicit stop or when the handle is dropped.
                        recv(stop) -> _ => break,
                        recv(channel::after(delay)) -> _ => {
                            sweeper.sweep();
                        }
                    }
                }
                tracing::info!("expiration sweeper stopped");
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(error) => {
                tracing::error!(%error, "failed to spawn expiration sweeper thread");
                None
            }
        };

        Self {
            shutdown: Some(shutdown),
            handle,
        }
    }

    /// True while the sweep thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the thread and waits for an in-flight sweep to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("expiration sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweepScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn monthly_cadence_picks_this_month_when_still_ahead() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0).unwrap();
        assert_eq!(
            Cadence::MONTHLY_DEFAULT.next_after(now),
            Utc.with_ymd_and_hms(2025, 3, 1, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn monthly_cadence_rolls_into_next_month() {
        let now = Utc.with_ymd_and_hms(2025, 12, 1, 2, 0, 0).unwrap();
        assert_eq!(
            Cadence::MONTHLY_DEFAULT.next_after(now),
            Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn monthly_constructor_clamps() {
        assert_eq!(Cadence::monthly(31, 30), Cadence::Monthly { day: 28, hour: 23 });
        assert_eq!(Cadence::monthly(0, 0), Cadence::Monthly { day: 1, hour: 0 });
    }

    #[test]
    fn interval_cadence_adds_interval() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Cadence::Every(Duration::from_secs(90)).next_after(now),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 1, 30).unwrap()
        );
    }

    #[test]
    fn interval_cadence_never_fires_immediately() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let minimum = now + chrono::Duration::milliseconds(10);
        assert_eq!(Cadence::Every(Duration::ZERO).next_after(now), minimum);
        assert_eq!(
            Cadence::Every(Duration::from_millis(1)).next_after(now),
            minimum
        );
    }
}
