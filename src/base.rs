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

//! Core identifier and value types for cards, holders and block requests.

use crate::error::BankError;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primary key of a card: exactly 16 ASCII digits.
///
/// Numbers are fixed-length, so the derived lexical ordering is also the
/// numeric ordering. Unit-of-work lock acquisition relies on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardNumber(String);

impl CardNumber {
    pub const LEN: usize = 16;

    /// Validates and wraps a card number.
    ///
    /// # Errors
    ///
    /// [`BankError::InvalidCardNumber`] unless the input is exactly 16 digits.
    pub fn parse(number: &str) -> Result<Self, BankError> {
        if number.len() == Self::LEN && number.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(number.to_owned()))
        } else {
            Err(BankError::InvalidCardNumber(number.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CardNumber {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CardNumber {
    type Error = BankError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CardNumber> for String {
    fn from(number: CardNumber) -> Self {
        number.0
    }
}

impl fmt::Display for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Surrogate identifier of an account holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Surrogate identifier of a block request.
///
/// Allocated monotonically by the request store, so a larger id was
/// submitted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calendar month, the granularity of card expiration.
///
/// Parsed from and displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Shifts by a signed number of months.
    pub fn plus_months(self, months: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + months;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn next(self) -> Self {
        self.plus_months(1)
    }

    pub fn previous(self) -> Self {
        self.plus_months(-1)
    }

    /// The instant `day` of this month at `hour:00` UTC, if that day exists.
    pub fn at(self, day: u32, hour: u32) -> Option<DateTime<Utc>> {
        let naive = chrono::NaiveDate::from_ymd_opt(self.year, self.month, day)?
            .and_hms_opt(hour, 0, 0)?;
        Some(Utc.from_utc_datetime(&naive))
    }
}

impl From<DateTime<Utc>> for YearMonth {
    fn from(instant: DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }
}

impl FromStr for YearMonth {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BankError::InvalidMonth(s.to_owned());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month).ok_or_else(invalid)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = BankError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(month: YearMonth) -> Self {
        month.to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Zero-based page selector for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    pub const DEFAULT_SIZE: usize = 10;

    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    /// Number of leading items to skip.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    /// Slices an already ordered listing down to this page.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset()).take(self.size).collect()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_number_requires_sixteen_digits() {
        assert!(CardNumber::parse("1234567812345678").is_ok());
        assert_eq!(
            CardNumber::parse("123456781234567"),
            Err(BankError::InvalidCardNumber("123456781234567".into()))
        );
        assert!(CardNumber::parse("12345678123456789").is_err());
        assert!(CardNumber::parse("12345678abcd5678").is_err());
        assert!(CardNumber::parse("").is_err());
    }

    #[test]
    fn card_number_rejects_non_ascii_digits() {
        // Arabic-Indic digits are numeric but not ASCII.
        assert!(CardNumber::parse("١٢٣٤٥٦٧٨١٢٣٤٥٦٧٨").is_err());
    }

    #[test]
    fn card_numbers_order_numerically() {
        let low = CardNumber::parse("0000000000000009").unwrap();
        let high = CardNumber::parse("0000000000000010").unwrap();
        assert!(low < high);
    }

    #[test]
    fn card_number_deserialization_validates() {
        let ok: Result<CardNumber, _> = serde_json::from_str("\"1111222233334444\"");
        assert!(ok.is_ok());
        let bad: Result<CardNumber, _> = serde_json::from_str("\"1111\"");
        assert!(bad.is_err());
    }

    #[test]
    fn year_month_parses_and_displays() {
        let month: YearMonth = "2025-03".parse().unwrap();
        assert_eq!(month, YearMonth::new(2025, 3).unwrap());
        assert_eq!(month.to_string(), "2025-03");
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("2025-3".parse::<YearMonth>().is_err());
        assert!("202503".parse::<YearMonth>().is_err());
    }

    #[test]
    fn year_month_arithmetic_wraps_years() {
        let december = YearMonth::new(2024, 12).unwrap();
        assert_eq!(december.next(), YearMonth::new(2025, 1).unwrap());
        assert_eq!(december.next().previous(), december);
        assert_eq!(december.plus_months(-12), YearMonth::new(2023, 12).unwrap());
        assert_eq!(december.plus_months(25), YearMonth::new(2027, 1).unwrap());
    }

    #[test]
    fn year_month_orders_chronologically() {
        assert!(YearMonth::new(2024, 12).unwrap() < YearMonth::new(2025, 1).unwrap());
        assert!(YearMonth::new(2025, 2).unwrap() > YearMonth::new(2025, 1).unwrap());
    }

    #[test]
    fn year_month_at_rejects_missing_days() {
        let february = YearMonth::new(2025, 2).unwrap();
        assert!(february.at(28, 2).is_some());
        assert!(february.at(30, 2).is_none());
    }

    #[test]
    fn page_request_slices() {
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(PageRequest::new(0, 10).apply(items.clone()), (0..10).collect::<Vec<_>>());
        assert_eq!(PageRequest::new(2, 10).apply(items.clone()), (20..25).collect::<Vec<_>>());
        assert!(PageRequest::new(3, 10).apply(items).is_empty());
    }
}
