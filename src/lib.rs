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

//! # Paygate
//!
//! This library provides a payment authorization pipeline: transactions move
//! through fraud scoring, bank authorization, and a state machine covering
//! capture, void, settlement, dispute, and refund flows.
//!
//! ## Core Components
//!
//! - [`PaymentGateway`]: Pipeline orchestrator owning the transaction log
//! - [`Transaction`]: Transaction entity with its lifecycle state machine
//! - [`FraudEngine`]: Weighted rule engine producing risk levels and alerts
//! - [`BankAuthorizer`]: Issuer-side authorization decision stub
//! - [`RefundManager`]: Refund commands plus the customer balance credit-back
//! - [`PaymentStore`]: Flat-record persistence boundary
//!
//! ## Example
//!
//! ```
//! use paygate_rs::{
//!     BankAuthorizer, Customer, FraudEngine, Merchant, PaymentGateway, PaymentMethod,
//!     Transaction, TransactionState,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new());
//!
//! let customer = Customer::new(
//!     "cust-1", "Ada Lovelace", "ada@example.com", "12 Analytical Way", "ada", "s3cret",
//! );
//! let merchant = Merchant::new("merch-1", "Widget Shop", "retail");
//! let method = PaymentMethod::CreditCard {
//!     number: "4111111111113456".to_string(),
//!     holder: "Ada Lovelace".to_string(),
//!     expiry: "12/27".to_string(),
//! };
//!
//! let transaction = Transaction::new(customer, merchant, method, dec!(500.00)).unwrap();
//! let id = transaction.id().clone();
//!
//! let outcome = gateway.process_transaction(transaction).unwrap();
//! assert_eq!(outcome.transaction_id, id);
//! assert_eq!(
//!     gateway.transaction(&id).unwrap().state(),
//!     TransactionState::Approved
//! );
//! ```
//!
//! ## Thread Safety
//!
//! The gateway can be shared across threads: the transaction log serializes
//! mutations per transaction while different transactions proceed in
//! parallel, and the idempotency map makes retries with the same key
//! at-most-once.

pub mod bank;
pub mod base;
pub mod customer;
pub mod error;
pub mod fraud;
pub mod gateway;
pub mod log;
pub mod payment_method;
pub mod refund;
pub mod store;
pub mod transaction;

pub use bank::{AuthorizationDecision, BankAuthorizer};
pub use base::{AlertId, CustomerId, MerchantId, RefundId, TransactionId};
pub use customer::{Customer, Ledger, Merchant};
pub use error::PaymentError;
pub use fraud::{
    FraudAlert, FraudEngine, FraudRule, MajorityScorer, RiskEvaluation, RiskLevel, RiskThresholds,
};
pub use gateway::{PaymentGateway, ProcessOutcome};
pub use log::TransactionLog;
pub use payment_method::{PaymentMethod, PaymentMethodKind};
pub use refund::{full_refund, partial_refund, Refund, RefundManager};
pub use store::{
    CustomerRecord, FraudAlertRecord, MemoryStore, PaymentStore, RefundRecord, StoreError,
    TransactionRecord,
};
pub use transaction::{Transaction, TransactionState, REFUND_EPSILON};
