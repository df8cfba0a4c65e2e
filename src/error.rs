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

//! Error types for payment processing.
//!
//! Every error here is recoverable: operations fail locally, leave state
//! unchanged, and surface a typed variant the caller must handle.

use crate::transaction::TransactionState;
use thiserror::Error;

/// Payment processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Deduction would exceed the customer's balance for the payment method
    #[error("insufficient balance for payment method")]
    InsufficientFunds,

    /// Refund request exceeds the transaction's remaining amount
    #[error("refund exceeds remaining amount")]
    ExceedsRemaining,

    /// Capture request exceeds the originally authorized amount
    #[error("capture exceeds authorized amount")]
    ExceedsAuthorized,

    /// Operation is not legal in the transaction's current state
    #[error("{operation} not allowed from {from:?}")]
    IllegalTransition {
        from: TransactionState,
        operation: &'static str,
    },

    /// Referenced transaction ID does not exist in the gateway log
    #[error("transaction not found")]
    TransactionNotFound,

    /// Transaction ID already exists in the gateway log
    #[error("duplicate transaction ID")]
    DuplicateTransaction,

    /// Payment method type string is not recognized
    #[error("unknown payment method type: {0}")]
    UnknownPaymentMethod(String),

    /// Payment method detail fields are missing or malformed
    #[error("invalid payment method details: {0}")]
    InvalidMethodDetails(&'static str),

    /// Fraud rule weight is outside [0, 1]
    #[error("rule weight must be within [0, 1]")]
    InvalidRuleWeight,

    /// Named fraud rule does not exist
    #[error("fraud rule not found")]
    RuleNotFound,

    /// Referenced fraud alert does not exist
    #[error("fraud alert not found")]
    AlertNotFound,
}
