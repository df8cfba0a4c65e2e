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

//! Refund commands and the refund manager.
//!
//! A refund command is a function from a transaction to a [`Refund`] record:
//! [`full_refund`] consumes the remaining amount, [`partial_refund`] a caller
//! amount. Both delegate legality to [`Transaction::refund`] and only build a
//! record on success.
//!
//! The [`RefundManager`] runs commands against the gateway's transaction log
//! and wires the cross-boundary side effect: the refunded amount is credited
//! back onto the customer's ledger balance for the transaction's payment
//! method type.

use crate::base::{RefundId, TransactionId};
use crate::customer::Ledger;
use crate::gateway::PaymentGateway;
use crate::store::RefundRecord;
use crate::transaction::Transaction;
use crate::PaymentError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Record of a completed refund. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Refund {
    pub id: RefundId,
    /// The refunded transaction, referenced by ID.
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    fn new(transaction_id: TransactionId, amount: Decimal, reason: &str) -> Self {
        Self {
            id: RefundId::generate(),
            transaction_id,
            amount,
            reason: reason.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Restores a refund from persisted parts.
    pub(crate) fn from_parts(
        id: RefundId,
        transaction_id: TransactionId,
        amount: Decimal,
        reason: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            transaction_id,
            amount,
            reason,
            created_at,
        }
    }
}

/// Refunds the transaction's entire remaining amount.
///
/// # Errors
///
/// Whatever [`Transaction::refund`] rejects; the transaction is left
/// unchanged and no record is created.
pub fn full_refund(transaction: &mut Transaction, reason: &str) -> Result<Refund, PaymentError> {
    let amount = transaction.remaining_amount();
    transaction.refund(amount)?;
    Ok(Refund::new(transaction.id().clone(), amount, reason))
}

/// Refunds a caller-supplied amount.
///
/// # Errors
///
/// Whatever [`Transaction::refund`] rejects; the transaction is left
/// unchanged and no record is created.
pub fn partial_refund(
    transaction: &mut Transaction,
    amount: Decimal,
    reason: &str,
) -> Result<Refund, PaymentError> {
    transaction.refund(amount)?;
    Ok(Refund::new(transaction.id().clone(), amount, reason))
}

/// Executes refund commands against the gateway log and keeps the refund book.
///
/// Commands run under the log's per-entry lock, so concurrent refunds of one
/// transaction serialize and the remaining-amount check stays atomic with the
/// refund write.
pub struct RefundManager {
    ledger: Arc<Ledger>,
    refunds: Mutex<Vec<Refund>>,
}

impl RefundManager {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            refunds: Mutex::new(Vec::new()),
        }
    }

    /// Refunds the full remaining amount of a stored transaction.
    ///
    /// # Errors
    ///
    /// [`PaymentError::TransactionNotFound`] for an unknown ID, otherwise
    /// whatever the state machine rejects. On failure nothing changes:
    /// not the transaction, not the ledger, not the refund book.
    pub fn process_full_refund(
        &self,
        gateway: &PaymentGateway,
        id: &TransactionId,
        reason: &str,
    ) -> Result<Refund, PaymentError> {
        self.execute(gateway, id, |tx| full_refund(tx, reason))
    }

    /// Refunds `amount` of a stored transaction.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`RefundManager::process_full_refund`], plus
    /// amount-bound rejections from the state machine.
    pub fn process_partial_refund(
        &self,
        gateway: &PaymentGateway,
        id: &TransactionId,
        amount: Decimal,
        reason: &str,
    ) -> Result<Refund, PaymentError> {
        self.execute(gateway, id, |tx| partial_refund(tx, amount, reason))
    }

    fn execute(
        &self,
        gateway: &PaymentGateway,
        id: &TransactionId,
        command: impl FnOnce(&mut Transaction) -> Result<Refund, PaymentError>,
    ) -> Result<Refund, PaymentError> {
        // The command and the snapshot for the credit happen under one
        // entry lock, so a concurrent refund cannot slip between the
        // remaining-amount check and the write.
        let (refund, customer, kind) = gateway.log().with_mut(id, |tx| {
            let refund = command(tx)?;
            Ok((refund, tx.customer().clone(), tx.method().kind()))
        })?;

        // Credit back to the customer's balance for the payment method type.
        // The ledger upserts the account, so this cannot fail after the
        // state transition has already been applied.
        self.ledger.credit(&customer, kind, refund.amount)?;
        self.refunds.lock().push(refund.clone());
        info!(
            transaction_id = %refund.transaction_id,
            refund_id = %refund.id,
            amount = %refund.amount,
            "refund applied"
        );

        if let Some(snapshot) = gateway.log().get(id) {
            gateway.notify_observers(&snapshot);
            gateway.persist_transaction(&snapshot);
        }
        if let Some(store) = gateway.store() {
            if let Err(error) = store.save_refund(&RefundRecord::from(&refund)) {
                warn!(refund_id = %refund.id, %error, "failed to persist refund");
            }
        }

        Ok(refund)
    }

    /// Snapshot of all stored refunds, in execution order.
    pub fn refunds(&self) -> Vec<Refund> {
        self.refunds.lock().clone()
    }

    /// Cumulative refunded total recorded for one transaction.
    pub fn refunded_total(&self, id: &TransactionId) -> Decimal {
        self.refunds
            .lock()
            .iter()
            .filter(|refund| &refund.transaction_id == id)
            .map(|refund| refund.amount)
            .sum()
    }

    /// Restores persisted refunds into the book.
    pub fn install_refunds(&self, refunds: Vec<Refund>) {
        self.refunds.lock().extend(refunds);
    }
}
