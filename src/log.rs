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

//! Insertion-ordered transaction log with duplicate detection.
//!
//! Combines a [`DashMap`] for O(1) lookup and per-entry locking with a
//! separate order record preserving insertion order for listings.

use crate::base::TransactionId;
use crate::transaction::Transaction;
use crate::PaymentError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

/// The gateway's transaction log.
///
/// Entries are owned by the log once inserted. Mutation happens through the
/// per-entry lock, so concurrent operations on one transaction serialize
/// while different transactions proceed independently.
#[derive(Debug, Default)]
pub struct TransactionLog {
    /// Transactions indexed by ID.
    transactions: DashMap<TransactionId, Transaction>,

    /// Transaction IDs in insertion order.
    order: Mutex<Vec<TransactionId>>,
}

impl TransactionLog {
    /// Creates a new empty log.
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Takes ownership of a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::DuplicateTransaction`] if a transaction with
    /// the same ID already exists.
    pub fn insert(&self, transaction: Transaction) -> Result<(), PaymentError> {
        let transaction_id = transaction.id().clone();

        // Entry API for atomic check-and-insert.
        match self.transactions.entry(transaction_id.clone()) {
            Entry::Occupied(_) => Err(PaymentError::DuplicateTransaction),
            Entry::Vacant(entry) => {
                entry.insert(transaction);
                self.order.lock().push(transaction_id);
                Ok(())
            }
        }
    }

    /// Snapshot of a transaction by ID.
    pub fn get(&self, id: &TransactionId) -> Option<Transaction> {
        self.transactions.get(id).map(|entry| entry.clone())
    }

    /// Runs `mutate` on a transaction under its entry lock.
    ///
    /// The lock is held for the duration of the closure, serializing
    /// concurrent mutations of the same transaction.
    ///
    /// # Errors
    ///
    /// [`PaymentError::TransactionNotFound`] for an unknown ID; otherwise
    /// whatever `mutate` returns.
    pub fn with_mut<T>(
        &self,
        id: &TransactionId,
        mutate: impl FnOnce(&mut Transaction) -> Result<T, PaymentError>,
    ) -> Result<T, PaymentError> {
        let mut entry = self
            .transactions
            .get_mut(id)
            .ok_or(PaymentError::TransactionNotFound)?;
        mutate(entry.value_mut())
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.transactions.contains_key(id)
    }

    /// Transaction IDs in insertion order.
    pub fn ids(&self) -> Vec<TransactionId> {
        self.order.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
