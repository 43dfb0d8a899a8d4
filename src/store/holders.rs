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

//! Account holder store.

use crate::base::{PageRequest, UserId};
use crate::error::BankError;
use crate::holder::{Role, User, validate_login};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Keyed collection of users with a unique login index.
#[derive(Debug)]
pub struct AccountHolderStore {
    users: DashMap<UserId, User>,
    logins: DashMap<String, UserId>,
    next_id: AtomicU64,
}

impl AccountHolderStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            logins: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a holder. [`Role::User`] is always granted.
    ///
    /// # Errors
    ///
    /// - [`BankError::InvalidLogin`] - login outside 3 to 50 characters.
    /// - [`BankError::UserAlreadyExists`] - login taken.
    pub fn register(
        &self,
        login: &str,
        password_hash: &str,
        roles: &[Role],
    ) -> Result<UserId, BankError> {
        validate_login(login)?;

        // Reserve the login first; the entry guard makes the check atomic.
        let id = match self.logins.entry(login.to_owned()) {
            Entry::Occupied(_) => return Err(BankError::UserAlreadyExists(login.to_owned())),
            Entry::Vacant(entry) => {
                let id = UserId(self.next_id.fetch_add(1, Ordering::Relaxed));
                entry.insert(id);
                id
            }
        };

        let mut roles: BTreeSet<Role> = roles.iter().copied().collect();
        roles.insert(Role::User);
        self.users.insert(
            id,
            User::new(id, login.to_owned(), password_hash.to_owned(), roles),
        );
        tracing::info!(user = %id, login, "holder registered");
        Ok(id)
    }

    pub fn get(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|user| user.clone())
    }

    pub fn exists(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    pub fn find_by_login(&self, login: &str) -> Option<User> {
        let id = *self.logins.get(login)?;
        self.get(id)
    }

    /// Replaces a holder's password hash.
    ///
    /// # Errors
    ///
    /// [`BankError::UserNotFound`] if absent.
    pub fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), BankError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or(BankError::UserNotFound(id))?;
        user.set_password_hash(password_hash.to_owned());
        tracing::info!(user = %id, "holder password changed");
        Ok(())
    }

    /// Users ordered by id, one page at a time.
    pub fn page(&self, page: PageRequest) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|user| user.clone()).collect();
        users.sort_by_key(|user| user.id());
        page.apply(users)
    }

    /// Removes a holder. Cards and requests referring to it are left to the
    /// caller's retention policy.
    ///
    /// # Errors
    ///
    /// [`BankError::UserNotFound`] if absent.
    pub fn delete(&self, id: UserId) -> Result<User, BankError> {
        let (_, user) = self
            .users
            .remove(&id)
            .ok_or(BankError::UserNotFound(id))?;
        self.logins
            .remove_if(user.login(), |_, owner| *owner == id);
        tracing::info!(user = %id, login = user.login(), "holder deleted");
        Ok(user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for AccountHolderStore {
    fn default() -> Self {
        Self::new()
    }
}
