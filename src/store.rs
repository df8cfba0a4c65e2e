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

//! Storage boundary: flat records and the [`PaymentStore`] trait.
//!
//! The core hands these records to whatever backend implements
//! [`PaymentStore`] and can be rebuilt purely from loaded records, without
//! knowledge of SQL or any particular engine. Storage failures are
//! reporting-only: they never roll back an applied state transition.

use crate::base::{AlertId, CustomerId, MerchantId, RefundId, TransactionId};
use crate::customer::{Customer, Merchant};
use crate::fraud::{FraudAlert, RiskLevel};
use crate::log::TransactionLog;
use crate::payment_method::{PaymentMethod, PaymentMethodKind};
use crate::refund::Refund;
use crate::transaction::{Transaction, TransactionState};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Storage boundary errors. These propagate upward as reporting-only
/// failures; in-memory transaction state is never corrupted by them.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend-specific failure (I/O, serialization, connectivity)
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Record carries an unrecognized transaction status code
    #[error("unknown status code: {0}")]
    UnknownStatus(String),

    /// Record carries an unrecognized risk level code
    #[error("unknown risk level: {0}")]
    UnknownRiskLevel(String),

    /// Record carries an unrecognized payment method type
    #[error("unknown payment method type: {0}")]
    UnknownMethodKind(String),

    /// Record's method detail fields do not fit the method type
    #[error("invalid method details for {0}")]
    InvalidMethodDetails(String),

    /// Transaction record references a customer that was not loaded
    #[error("record references missing customer: {0}")]
    MissingCustomer(String),

    /// Transaction record references a merchant that was not loaded
    #[error("record references missing merchant: {0}")]
    MissingMerchant(String),

    /// Refund or alert record references a transaction that was not loaded
    #[error("record references missing transaction: {0}")]
    MissingTransaction(String),
}

/// Flat transaction snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub customer_id: CustomerId,
    pub merchant_id: MerchantId,
    pub amount: Decimal,
    pub refunded: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub method_kind: String,
    /// Positional method details with instrument numbers masked.
    pub method_details: Vec<String>,
    pub idempotency_key: Option<String>,
}

impl From<&Transaction> for TransactionRecord {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id().clone(),
            customer_id: tx.customer().id.clone(),
            merchant_id: tx.merchant().id.clone(),
            amount: tx.amount(),
            refunded: tx.refunded_amount(),
            status: tx.state().as_code().to_string(),
            created_at: tx.created_at(),
            method_kind: tx.method().kind().as_str().to_string(),
            method_details: tx.method().masked_parts(),
            idempotency_key: tx.idempotency_key().map(str::to_string),
        }
    }
}

/// Flat refund snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub id: RefundId,
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Refund> for RefundRecord {
    fn from(refund: &Refund) -> Self {
        Self {
            id: refund.id.clone(),
            transaction_id: refund.transaction_id.clone(),
            amount: refund.amount,
            reason: refund.reason.clone(),
            created_at: refund.created_at,
        }
    }
}

/// Flat fraud alert snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAlertRecord {
    pub id: AlertId,
    pub transaction_id: TransactionId,
    pub level: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub reviewed: bool,
}

impl From<&FraudAlert> for FraudAlertRecord {
    fn from(alert: &FraudAlert) -> Self {
        Self {
            id: alert.id.clone(),
            transaction_id: alert.transaction_id.clone(),
            level: alert.level.as_str().to_string(),
            description: alert.description.clone(),
            created_at: alert.created_at,
            reviewed: alert.reviewed,
        }
    }
}

/// Flat customer snapshot, balances keyed by payment method type string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub billing_address: String,
    pub username: String,
    pub auth_secret: String,
    pub balances: HashMap<String, Decimal>,
}

impl From<&Customer> for CustomerRecord {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id.clone(),
            name: customer.name.clone(),
            email: customer.email.clone(),
            billing_address: customer.billing_address.clone(),
            username: customer.username.clone(),
            auth_secret: customer.auth_secret.clone(),
            balances: customer
                .balances
                .iter()
                .map(|(kind, balance)| (kind.as_str().to_string(), *balance))
                .collect(),
        }
    }
}

/// Pluggable storage backend. Implementations live outside the core.
pub trait PaymentStore: Send + Sync {
    fn save_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError>;
    fn load_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError>;

    fn save_refund(&self, record: &RefundRecord) -> Result<(), StoreError>;
    fn load_refunds(&self) -> Result<Vec<RefundRecord>, StoreError>;

    fn save_fraud_alert(&self, record: &FraudAlertRecord) -> Result<(), StoreError>;
    fn load_fraud_alerts(&self) -> Result<Vec<FraudAlertRecord>, StoreError>;

    fn save_customer(&self, record: &CustomerRecord) -> Result<(), StoreError>;
    fn load_customers(&self) -> Result<Vec<CustomerRecord>, StoreError>;
}

/// Rebuilds a customer from a record.
pub fn restore_customer(record: &CustomerRecord) -> Result<Customer, StoreError> {
    let mut balances = HashMap::new();
    for (kind, balance) in &record.balances {
        let kind: PaymentMethodKind = kind
            .parse()
            .map_err(|_| StoreError::UnknownMethodKind(kind.clone()))?;
        balances.insert(kind, *balance);
    }
    Ok(Customer {
        id: record.id.clone(),
        name: record.name.clone(),
        email: record.email.clone(),
        billing_address: record.billing_address.clone(),
        username: record.username.clone(),
        auth_secret: record.auth_secret.clone(),
        balances,
    })
}

/// Rebuilds a transaction from a record, resolving customer and merchant
/// snapshots from the loaded registries.
pub fn restore_transaction(
    record: &TransactionRecord,
    customers: &HashMap<CustomerId, Customer>,
    merchants: &HashMap<MerchantId, Merchant>,
) -> Result<Transaction, StoreError> {
    let customer = customers
        .get(&record.customer_id)
        .cloned()
        .ok_or_else(|| StoreError::MissingCustomer(record.customer_id.0.clone()))?;
    let merchant = merchants
        .get(&record.merchant_id)
        .cloned()
        .ok_or_else(|| StoreError::MissingMerchant(record.merchant_id.0.clone()))?;
    let state = TransactionState::from_code(&record.status)
        .ok_or_else(|| StoreError::UnknownStatus(record.status.clone()))?;

    let details: Vec<&str> = record.method_details.iter().map(String::as_str).collect();
    let method =
        PaymentMethod::from_parts(&record.method_kind, &details).map_err(|error| match error {
            crate::PaymentError::UnknownPaymentMethod(kind) => StoreError::UnknownMethodKind(kind),
            _ => StoreError::InvalidMethodDetails(record.method_kind.clone()),
        })?;

    Ok(Transaction::from_parts(
        record.id.clone(),
        customer,
        merchant,
        method,
        record.amount,
        record.refunded,
        state,
        record.created_at,
        record.idempotency_key.clone(),
    ))
}

/// Rebuilds all transactions from records.
pub fn restore_transactions(
    records: &[TransactionRecord],
    customers: &HashMap<CustomerId, Customer>,
    merchants: &HashMap<MerchantId, Merchant>,
) -> Result<Vec<Transaction>, StoreError> {
    records
        .iter()
        .map(|record| restore_transaction(record, customers, merchants))
        .collect()
}

/// Rebuilds refunds from records, validating each against the loaded log.
pub fn restore_refunds(
    records: &[RefundRecord],
    transactions: &TransactionLog,
) -> Result<Vec<Refund>, StoreError> {
    records
        .iter()
        .map(|record| {
            if !transactions.contains(&record.transaction_id) {
                return Err(StoreError::MissingTransaction(
                    record.transaction_id.0.clone(),
                ));
            }
            Ok(Refund::from_parts(
                record.id.clone(),
                record.transaction_id.clone(),
                record.amount,
                record.reason.clone(),
                record.created_at,
            ))
        })
        .collect()
}

/// Rebuilds fraud alerts from records, validating each against the loaded log.
pub fn restore_fraud_alerts(
    records: &[FraudAlertRecord],
    transactions: &TransactionLog,
) -> Result<Vec<FraudAlert>, StoreError> {
    records
        .iter()
        .map(|record| {
            if !transactions.contains(&record.transaction_id) {
                return Err(StoreError::MissingTransaction(
                    record.transaction_id.0.clone(),
                ));
            }
            let level = RiskLevel::from_str_code(&record.level)
                .ok_or_else(|| StoreError::UnknownRiskLevel(record.level.clone()))?;
            Ok(FraudAlert {
                id: record.id.clone(),
                transaction_id: record.transaction_id.clone(),
                level,
                description: record.description.clone(),
                created_at: record.created_at,
                reviewed: record.reviewed,
            })
        })
        .collect()
}

/// Reference in-memory backend. Saves are upserts keyed by record ID so
/// re-saving after a state change replaces the previous snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    transactions: Mutex<Vec<TransactionRecord>>,
    refunds: Mutex<Vec<RefundRecord>>,
    alerts: Mutex<Vec<FraudAlertRecord>>,
    customers: Mutex<Vec<CustomerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert<T: Clone>(records: &mut Vec<T>, record: &T, same: impl Fn(&T, &T) -> bool) {
    match records.iter_mut().find(|existing| same(existing, record)) {
        Some(existing) => *existing = record.clone(),
        None => records.push(record.clone()),
    }
}

impl PaymentStore for MemoryStore {
    fn save_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        upsert(&mut self.transactions.lock(), record, |a, b| a.id == b.id);
        Ok(())
    }

    fn load_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self.transactions.lock().clone())
    }

    fn save_refund(&self, record: &RefundRecord) -> Result<(), StoreError> {
        upsert(&mut self.refunds.lock(), record, |a, b| a.id == b.id);
        Ok(())
    }

    fn load_refunds(&self) -> Result<Vec<RefundRecord>, StoreError> {
        Ok(self.refunds.lock().clone())
    }

    fn save_fraud_alert(&self, record: &FraudAlertRecord) -> Result<(), StoreError> {
        upsert(&mut self.alerts.lock(), record, |a, b| a.id == b.id);
        Ok(())
    }

    fn load_fraud_alerts(&self) -> Result<Vec<FraudAlertRecord>, StoreError> {
        Ok(self.alerts.lock().clone())
    }

    fn save_customer(&self, record: &CustomerRecord) -> Result<(), StoreError> {
        upsert(&mut self.customers.lock(), record, |a, b| a.id == b.id);
        Ok(())
    }

    fn load_customers(&self) -> Result<Vec<CustomerRecord>, StoreError> {
        Ok(self.customers.lock().clone())
    }
}
