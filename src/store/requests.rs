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

//! Block request store.

use crate::base::{CardNumber, PageRequest, RequestId, UserId};
use crate::block_request::{BlockRequest, BlockRequestStatus};
use crate::error::BankError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct BlockRequestStore {
    requests: DashMap<RequestId, BlockRequest>,
    next_id: AtomicU64,
}

impl BlockRequestStore {
    pub fn new() -> Self {
        Self {
            requests: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates an id and stores a new pending request.
    pub(crate) fn create(
        &self,
        card_number: CardNumber,
        requester: UserId,
        reason: String,
        requested_at: DateTime<Utc>,
    ) -> BlockRequest {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = BlockRequest::new(id, card_number, requester, reason, requested_at);
        self.requests.insert(id, request.clone());
        request
    }

    pub fn get(&self, id: RequestId) -> Option<BlockRequest> {
        self.requests.get(&id).map(|request| request.clone())
    }

    /// Read-validate-write on one request while its shard is locked.
    ///
    /// # Errors
    ///
    /// [`BankError::BlockRequestNotFound`] if absent, or whatever `update`
    /// returns.
    pub(crate) fn update<T, F>(&self, id: RequestId, update: F) -> Result<T, BankError>
    where
        F: FnOnce(&mut BlockRequest) -> Result<T, BankError>,
    {
        let mut request = self
            .requests
            .get_mut(&id)
            .ok_or(BankError::BlockRequestNotFound(id))?;
        update(&mut *request)
    }

    /// Requests newest first, optionally filtered by status.
    ///
    /// Ordered by request time, then by id, both descending.
    pub fn page(
        &self,
        status: Option<BlockRequestStatus>,
        page: PageRequest,
    ) -> Vec<BlockRequest> {
        let mut requests: Vec<BlockRequest> = self
            .requests
            .iter()
            .filter(|request| status.is_none_or(|status| request.status() == status))
            .map(|request| request.clone())
            .collect();
        requests.sort_by_key(|request| Reverse((request.requested_at(), request.id())));
        page.apply(requests)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl Default for BlockRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn card() -> CardNumber {
        CardNumber::parse("1234567812345678").unwrap()
    }

    #[test]
    fn ids_are_monotonic() {
        let store = BlockRequestStore::new();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let first = store.create(card(), UserId(1), "lost".into(), at);
        let second = store.create(card(), UserId(1), "stolen".into(), at);
        assert!(second.id() > first.id());
    }

    #[test]
    fn page_is_newest_first_with_id_tiebreak() {
        let store = BlockRequestStore::new();
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let a = store.create(card(), UserId(1), "a".into(), early);
        let b = store.create(card(), UserId(1), "b".into(), late);
        let c = store.create(card(), UserId(1), "c".into(), early);

        let ids: Vec<RequestId> = store
            .page(None, PageRequest::default())
            .iter()
            .map(BlockRequest::id)
            .collect();
        assert_eq!(ids, [b.id(), c.id(), a.id()]);
    }

    #[test]
    fn update_on_missing_request_fails() {
        let store = BlockRequestStore::new();
        let result = store.update(RequestId(42), |_| Ok(()));
        assert_eq!(result, Err(BankError::BlockRequestNotFound(RequestId(42))));
    }
}
