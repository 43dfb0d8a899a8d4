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

//! Account holders.

use crate::base::UserId;
use crate::error::BankError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("ROLE_USER"),
            Self::Admin => f.write_str("ROLE_ADMIN"),
        }
    }
}

/// A registered holder. Cards and block requests refer to it by [`UserId`].
///
/// The password hash is produced and checked by the authentication layer;
/// the ledger only stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    id: UserId,
    login: String,
    #[serde(skip_serializing)]
    password_hash: String,
    roles: BTreeSet<Role>,
}

impl User {
    pub const LOGIN_MIN: usize = 3;
    pub const LOGIN_MAX: usize = 50;

    pub(crate) fn new(
        id: UserId,
        login: String,
        password_hash: String,
        roles: BTreeSet<Role>,
    ) -> Self {
        Self {
            id,
            login,
            password_hash,
            roles,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub(crate) fn set_password_hash(&mut self, password_hash: String) {
        self.password_hash = password_hash;
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn roles(&self) -> &BTreeSet<Role> {
        &self.roles
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Checks the 3 to 50 character login rule (counted in characters, not bytes).
pub(crate) fn validate_login(login: &str) -> Result<(), BankError> {
    let length = login.chars().count();
    if login.trim().is_empty() || !(User::LOGIN_MIN..=User::LOGIN_MAX).contains(&length) {
        return Err(BankError::InvalidLogin(login.to_owned()));
    }
    Ok(())
}
