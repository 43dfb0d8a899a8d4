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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! The card store locks every card with a `parking_lot::Mutex`; with the
//! `deadlock_detection` feature enabled for tests, the detector thread sees
//! those locks directly. Each scenario drives the real components from many
//! threads and checks that money is conserved afterwards.

use bankcards_ledger::{Bank, Card, CardNumber, CardStatus, PageRequest, UserId, YearMonth};
use parking_lot::deadlock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Background checker started by [`start_deadlock_detector`].
struct DeadlockDetector {
    running: Arc<AtomicBool>,
    detected: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> DeadlockDetector {
    let running = Arc::new(AtomicBool::new(true));
    let detected = Arc::new(AtomicBool::new(false));
    let running_clone = running.clone();
    let detected_clone = detected.clone();

    let handle = thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                detected_clone.store(true, Ordering::SeqCst);
                return;
            }
        }
    });

    DeadlockDetector {
        running,
        detected,
        handle,
    }
}

/// Stops the detector and fails the test if it saw a deadlock.
fn stop_deadlock_detector(detector: DeadlockDetector) {
    detector.running.store(false, Ordering::SeqCst);
    detector.handle.join().expect("Detector thread panicked");
    assert!(
        !detector.detected.load(Ordering::SeqCst),
        "Deadlock detected! See output above for details."
    );
}

// === Fixtures ===

fn card_number(i: usize) -> CardNumber {
    CardNumber::parse(&format!("{:016}", 4000_0000_0000_0000u64 + i as u64)).unwrap()
}

/// One holder with `count` active cards, each funded with `balance`.
fn funded_bank(count: usize, balance: Decimal) -> (Arc<Bank>, UserId, Vec<CardNumber>) {
    let bank = Bank::new();
    let owner = bank.holders().register("alice", "hash", &[]).unwrap();
    let expiration = YearMonth::new(2999, 12).unwrap();
    let numbers: Vec<CardNumber> = (0..count).map(card_number).collect();
    for number in &numbers {
        let card =
            Card::restore(number.clone(), expiration, owner, CardStatus::Active, balance).unwrap();
        bank.cards().insert(card).unwrap();
    }
    (Arc::new(bank), owner, numbers)
}

fn total(bank: &Bank) -> Decimal {
    bank.cards().all().iter().map(|card| card.balance()).sum()
}

// === Tests ===

/// Two threads hammer the same pair in opposite directions. Without a global
/// lock order each would hold one card and wait for the other.
#[test]
fn no_deadlock_opposite_direction_transfers() {
    let detector = start_deadlock_detector();
    let (bank, _, numbers) = funded_bank(2, dec!(1000.00));
    let (a, b) = (numbers[0].clone(), numbers[1].clone());

    let mut handles = vec![];
    for t in 0..8 {
        let bank = Arc::clone(&bank);
        let (from, to) = if t % 2 == 0 {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        handles.push(thread::spawn(move || {
            for _ in 0..500 {
                let _ = bank.transfers().transfer(&from, &to, dec!(1.00));
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(total(&bank), dec!(2000.00));
    for card in bank.cards().all() {
        assert!(card.balance() >= Decimal::ZERO);
    }
}

/// Transfers around a ring of cards form lock cycles unless locks are
/// ordered.
#[test]
fn no_deadlock_ring_transfers() {
    let detector = start_deadlock_detector();
    const CARDS: usize = 6;
    let (bank, _, numbers) = funded_bank(CARDS, dec!(100.00));
    let numbers = Arc::new(numbers);
    let successes = Arc::new(AtomicU32::new(0));

    let mut handles = vec![];
    for t in 0..CARDS {
        let bank = Arc::clone(&bank);
        let numbers = Arc::clone(&numbers);
        let successes = Arc::clone(&successes);
        handles.push(thread::spawn(move || {
            for i in 0..300 {
                let from = &numbers[(t + i) % CARDS];
                let to = &numbers[(t + i + 1) % CARDS];
                if bank.transfers().transfer(from, to, dec!(3.50)).is_ok() {
                    successes.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert!(successes.load(Ordering::Relaxed) > 0);
    assert_eq!(total(&bank), dec!(600.00));
}

/// Lifecycle changes, sweeps and reads interleave with transfers on the
/// same cards.
#[test]
fn no_deadlock_mixed_operations() {
    let detector = start_deadlock_detector();
    const CARDS: usize = 4;
    let (bank, _, numbers) = funded_bank(CARDS, dec!(500.00));
    let numbers = Arc::new(numbers);

    let mut handles = vec![];
    for t in 0..4 {
        let bank = Arc::clone(&bank);
        let numbers = Arc::clone(&numbers);
        handles.push(thread::spawn(move || {
            for i in 0..300 {
                let from = &numbers[(t + i) % CARDS];
                let to = &numbers[(t * 3 + i + 1) % CARDS];
                let _ = bank.transfers().transfer(from, to, dec!(0.25));
            }
        }));
    }
    {
        let bank = Arc::clone(&bank);
        let numbers = Arc::clone(&numbers);
        handles.push(thread::spawn(move || {
            for i in 0..200 {
                let number = &numbers[i % CARDS];
                if i % 2 == 0 {
                    let _ = bank.lifecycle().block(number);
                } else {
                    let _ = bank.lifecycle().activate(number);
                }
            }
        }));
    }
    {
        let bank = Arc::clone(&bank);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                bank.sweeper().sweep();
                let _ = bank.cards().all();
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(total(&bank), dec!(2000.00));
}

/// Deleting a card while transfers target it must neither deadlock nor
/// lose money on the surviving cards.
#[test]
fn no_deadlock_delete_during_transfers() {
    let detector = start_deadlock_detector();
    let (bank, _, numbers) = funded_bank(3, dec!(100.00));
    let numbers = Arc::new(numbers);

    let mut handles = vec![];
    for t in 0..4 {
        let bank = Arc::clone(&bank);
        let numbers = Arc::clone(&numbers);
        handles.push(thread::spawn(move || {
            for i in 0..300 {
                let from = &numbers[(t + i) % 3];
                let to = &numbers[(t + i + 1) % 3];
                let _ = bank.transfers().transfer(from, to, dec!(1.00));
            }
        }));
    }
    let deleted = {
        let bank = Arc::clone(&bank);
        let number = numbers[2].clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(1));
            bank.lifecycle().delete(&number).unwrap()
        })
    };

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    let deleted = deleted.join().expect("Thread panicked");

    stop_deadlock_detector(detector);

    assert_eq!(bank.cards().len(), 2);
    assert_eq!(total(&bank) + deleted.balance(), dec!(300.00));
}

/// Listings taken while transfers run in both directions always see the
/// full total: a transfer is never visible on one card only.
#[test]
fn listing_never_sees_half_applied_transfer() {
    let detector = start_deadlock_detector();
    let (bank, _, numbers) = funded_bank(2, dec!(1000.00));
    let (a, b) = (numbers[0].clone(), numbers[1].clone());
    let done = Arc::new(AtomicBool::new(false));

    let mut handles = vec![];
    for t in 0..4 {
        let bank = Arc::clone(&bank);
        let done = Arc::clone(&done);
        let (from, to) = if t % 2 == 0 {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        };
        handles.push(thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                let _ = bank.transfers().transfer(&from, &to, dec!(1.00));
            }
        }));
    }

    let mut inconsistent = 0;
    for _ in 0..20_000 {
        let listed: Decimal = bank
            .lifecycle()
            .list(PageRequest::default())
            .iter()
            .map(|card| card.balance())
            .sum();
        if listed != dec!(2000.00) {
            inconsistent += 1;
        }
    }
    done.store(true, Ordering::Relaxed);

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(inconsistent, 0, "listings observed a partial transfer");
    assert_eq!(total(&bank), dec!(2000.00));
}
