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

//! Runtime settings.
//!
//! Read from `BANKCARDS__`-prefixed environment variables, with a `.env`
//! file honoured for local runs:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BANKCARDS__SWEEPER__ENABLED` | `false` |
//! | `BANKCARDS__SWEEPER__DAY` | `1` |
//! | `BANKCARDS__SWEEPER__HOUR` | `2` |
//! | `BANKCARDS__PAGE_SIZE` | `10` |

use crate::base::PageRequest;
use crate::scheduler::Cadence;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SweeperSettings {
    pub enabled: bool,
    pub day: u32,
    pub hour: u32,
}

impl SweeperSettings {
    pub fn cadence(&self) -> Cadence {
        Cadence::monthly(self.day, self.hour)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub sweeper: SweeperSettings,
    pub page_size: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();
        Self::from_source(
            config::Environment::with_prefix("BANKCARDS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .set_default("sweeper.enabled", false)?
            .set_default("sweeper.day", 1)?
            .set_default("sweeper.hour", 2)?
            .set_default("page_size", PageRequest::DEFAULT_SIZE as u64)?
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}
