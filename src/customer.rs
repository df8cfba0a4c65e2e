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

//! Customer and merchant identities, and the customer balance ledger.
//!
//! A [`Customer`] is a value snapshot: transactions embed a copy taken at
//! creation time. The mutable balance book lives in the [`Ledger`], which
//! keys per-payment-method balances by [`PaymentMethodKind`]. A missing key
//! reads as zero.

use crate::base::{CustomerId, MerchantId};
use crate::payment_method::PaymentMethodKind;
use crate::PaymentError;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Customer identity plus per-payment-method balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub billing_address: String,
    pub username: String,
    pub auth_secret: String,
    /// Balances keyed by payment method type; a missing key reads as zero.
    pub balances: HashMap<PaymentMethodKind, Decimal>,
}

impl Customer {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        billing_address: impl Into<String>,
        username: impl Into<String>,
        auth_secret: impl Into<String>,
    ) -> Self {
        Self {
            id: CustomerId(id.into()),
            name: name.into(),
            email: email.into(),
            billing_address: billing_address.into(),
            username: username.into(),
            auth_secret: auth_secret.into(),
            balances: HashMap::new(),
        }
    }

    /// Sets an initial balance for a payment method, builder-style.
    pub fn with_balance(mut self, kind: PaymentMethodKind, amount: Decimal) -> Self {
        self.balances.insert(kind, amount);
        self
    }

    pub fn balance(&self, kind: PaymentMethodKind) -> Decimal {
        self.balances.get(&kind).copied().unwrap_or(Decimal::ZERO)
    }

    fn assert_invariants(&self) {
        for (kind, balance) in &self.balances {
            debug_assert!(
                *balance >= Decimal::ZERO,
                "Invariant violated: {} balance went negative: {}",
                kind,
                balance
            );
        }
    }

    /// Removes funds from the balance for `kind`.
    fn deduct(&mut self, kind: PaymentMethodKind, amount: Decimal) -> Result<(), PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        let balance = self.balances.entry(kind).or_insert(Decimal::ZERO);
        if *balance < amount {
            return Err(PaymentError::InsufficientFunds);
        }
        *balance -= amount;
        self.assert_invariants();
        Ok(())
    }

    /// Returns funds to the balance for `kind`, creating the key if absent.
    fn credit(&mut self, kind: PaymentMethodKind, amount: Decimal) -> Result<(), PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        *self.balances.entry(kind).or_insert(Decimal::ZERO) += amount;
        self.assert_invariants();
        Ok(())
    }
}

/// Merchant identity. Transactions embed a copy taken at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    pub category: String,
}

impl Merchant {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: MerchantId(id.into()),
            name: name.into(),
            category: category.into(),
        }
    }
}

/// One ledger account guarding a customer's mutable state.
#[derive(Debug)]
struct CustomerAccount {
    inner: Mutex<Customer>,
}

impl CustomerAccount {
    fn new(customer: Customer) -> Self {
        Self {
            inner: Mutex::new(customer),
        }
    }
}

/// Customer balance book.
///
/// Accounts are independent: operations on different customers never
/// contend, while operations on one customer serialize on its mutex.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<CustomerId, CustomerAccount>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Registers a customer, replacing any previous entry with the same ID.
    pub fn register(&self, customer: Customer) {
        self.accounts
            .insert(customer.id.clone(), CustomerAccount::new(customer));
    }

    pub fn contains(&self, id: &CustomerId) -> bool {
        self.accounts.contains_key(id)
    }

    /// Current balance for a customer's payment method; zero when either the
    /// account or the key is absent.
    pub fn balance(&self, id: &CustomerId, kind: PaymentMethodKind) -> Decimal {
        self.accounts
            .get(id)
            .map(|account| account.inner.lock().balance(kind))
            .unwrap_or(Decimal::ZERO)
    }

    /// Snapshot of a customer's current state.
    pub fn snapshot(&self, id: &CustomerId) -> Option<Customer> {
        self.accounts.get(id).map(|account| account.inner.lock().clone())
    }

    /// Removes funds from a customer's balance for `kind`.
    ///
    /// An unregistered customer has no balance to deduct from and fails with
    /// [`PaymentError::InsufficientFunds`].
    pub fn deduct(
        &self,
        id: &CustomerId,
        kind: PaymentMethodKind,
        amount: Decimal,
    ) -> Result<(), PaymentError> {
        let account = self
            .accounts
            .get(id)
            .ok_or(PaymentError::InsufficientFunds)?;
        account.inner.lock().deduct(kind, amount)
    }

    /// Returns refunded funds to a customer's balance for `kind`.
    ///
    /// The account is created from `customer` if it is not registered yet, so
    /// a refund credit cannot fail after the transaction state has already
    /// moved.
    pub fn credit(
        &self,
        customer: &Customer,
        kind: PaymentMethodKind,
        amount: Decimal,
    ) -> Result<(), PaymentError> {
        let account = self
            .accounts
            .entry(customer.id.clone())
            .or_insert_with(|| CustomerAccount::new(customer.clone()));
        account.inner.lock().credit(kind, amount)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
