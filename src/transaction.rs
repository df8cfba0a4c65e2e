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

//! The transaction entity and its state machine.
//!
//! States form the transition graph:
//!
//! ```text
//! Pending ──authorize──► PreAuthorized ──capture──► Approved
//! Pending ──process────► Approved ──process/settle──► Settled
//! PreAuthorized ──void──► Declined
//! Approved | PartiallyRefunded | Settled | Disputed ──refund──► PartiallyRefunded | Refunded
//! Approved | Settled ──dispute──► Disputed
//! Pending | PreAuthorized ──expire──► Expired
//! ```
//!
//! Every operation is total: failure returns a typed error and leaves the
//! transaction unchanged.

use crate::bank::AuthorizationDecision;
use crate::base::TransactionId;
use crate::customer::{Customer, Merchant};
use crate::payment_method::PaymentMethod;
use crate::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Residual below which a refund closes the transaction out entirely.
pub const REFUND_EPSILON: Decimal = dec!(0.001);

/// Transaction lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    Pending,
    PreAuthorized,
    Approved,
    Declined,
    FlaggedForReview,
    PartiallyRefunded,
    Refunded,
    Settled,
    Disputed,
    Expired,
}

impl TransactionState {
    /// Canonical status code used by persistence records.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::PreAuthorized => "PRE_AUTHORIZED",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::FlaggedForReview => "FLAGGED_FOR_REVIEW",
            Self::PartiallyRefunded => "PARTIALLY_REFUNDED",
            Self::Refunded => "REFUNDED",
            Self::Settled => "SETTLED",
            Self::Disputed => "DISPUTED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parses a persistence status code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PENDING" => Some(Self::Pending),
            "PRE_AUTHORIZED" => Some(Self::PreAuthorized),
            "APPROVED" => Some(Self::Approved),
            "DECLINED" => Some(Self::Declined),
            "FLAGGED_FOR_REVIEW" => Some(Self::FlaggedForReview),
            "PARTIALLY_REFUNDED" => Some(Self::PartiallyRefunded),
            "REFUNDED" => Some(Self::Refunded),
            "SETTLED" => Some(Self::Settled),
            "DISPUTED" => Some(Self::Disputed),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Whether a refund may be issued from this state.
    pub fn refundable(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::PartiallyRefunded | Self::Settled | Self::Disputed
        )
    }
}

/// A monetary transaction between a customer and a merchant.
///
/// Identity, parties, payment method, amount, and creation timestamp are
/// fixed at construction. The refunded amount and the lifecycle state are the
/// only mutable pieces, and the refunded amount only ever grows.
///
/// # Invariants
///
/// - `0 <= refunded <= amount` at all times.
/// - `remaining_amount() == amount - refunded`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    id: TransactionId,
    customer: Customer,
    merchant: Merchant,
    method: PaymentMethod,
    amount: Decimal,
    refunded: Decimal,
    state: TransactionState,
    created_at: DateTime<Utc>,
    idempotency_key: Option<String>,
}

impl Transaction {
    /// Creates a pending transaction with a freshly generated ID.
    ///
    /// # Errors
    ///
    /// [`PaymentError::InvalidAmount`] if `amount` is zero or negative.
    pub fn new(
        customer: Customer,
        merchant: Merchant,
        method: PaymentMethod,
        amount: Decimal,
    ) -> Result<Self, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        Ok(Self {
            id: TransactionId::generate(),
            customer,
            merchant,
            method,
            amount,
            refunded: Decimal::ZERO,
            state: TransactionState::Pending,
            created_at: Utc::now(),
            idempotency_key: None,
        })
    }

    /// Overrides the creation timestamp, builder-style.
    ///
    /// Fraud rules evaluate the stored timestamp, so pinning it makes rule
    /// evaluation deterministic in tests.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn merchant(&self) -> &Merchant {
        &self.merchant
    }

    pub fn method(&self) -> &PaymentMethod {
        &self.method
    }

    /// Original amount, fixed at creation.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Cumulative refunded amount.
    pub fn refunded_amount(&self) -> Decimal {
        self.refunded
    }

    /// Original amount minus cumulative refunds.
    pub fn remaining_amount(&self) -> Decimal {
        self.amount - self.refunded
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    pub(crate) fn set_idempotency_key(&mut self, key: impl Into<String>) {
        self.idempotency_key = Some(key.into());
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.refunded >= Decimal::ZERO,
            "Invariant violated: refunded amount went negative: {}",
            self.refunded
        );
        debug_assert!(
            self.refunded <= self.amount,
            "Invariant violated: refunded {} exceeds amount {}",
            self.refunded,
            self.amount
        );
    }

    /// Takes the state's default forward transition.
    ///
    /// `Pending` and `PreAuthorized` move to `Approved` (the latter as an
    /// implicit full capture); `Approved` and `PartiallyRefunded` settle.
    pub fn process(&mut self) -> Result<(), PaymentError> {
        let next = match self.state {
            TransactionState::Pending | TransactionState::PreAuthorized => {
                TransactionState::Approved
            }
            TransactionState::Approved | TransactionState::PartiallyRefunded => {
                TransactionState::Settled
            }
            from => {
                return Err(PaymentError::IllegalTransition {
                    from,
                    operation: "process",
                });
            }
        };
        self.state = next;
        Ok(())
    }

    /// Places an authorization hold: `Pending` → `PreAuthorized`.
    pub fn authorize(&mut self) -> Result<(), PaymentError> {
        match self.state {
            TransactionState::Pending => {
                self.state = TransactionState::PreAuthorized;
                Ok(())
            }
            from => Err(PaymentError::IllegalTransition {
                from,
                operation: "authorize",
            }),
        }
    }

    /// Finalizes a hold for `capture_amount`: `PreAuthorized` → `Approved`.
    ///
    /// A zero capture amount means the full original amount. Fails with
    /// [`PaymentError::ExceedsAuthorized`] when the capture exceeds the
    /// original authorized amount.
    pub fn capture(&mut self, capture_amount: Decimal) -> Result<(), PaymentError> {
        if self.state != TransactionState::PreAuthorized {
            return Err(PaymentError::IllegalTransition {
                from: self.state,
                operation: "capture",
            });
        }
        if capture_amount < Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        let effective = if capture_amount == Decimal::ZERO {
            self.amount
        } else {
            capture_amount
        };
        if effective > self.amount {
            return Err(PaymentError::ExceedsAuthorized);
        }
        self.state = TransactionState::Approved;
        Ok(())
    }

    /// Releases a hold: `PreAuthorized` → `Declined`.
    pub fn void_transaction(&mut self) -> Result<(), PaymentError> {
        match self.state {
            TransactionState::PreAuthorized => {
                self.state = TransactionState::Declined;
                Ok(())
            }
            from => Err(PaymentError::IllegalTransition {
                from,
                operation: "void",
            }),
        }
    }

    /// Refunds `refund_amount` of the remaining balance.
    ///
    /// Legal from `Approved`, `PartiallyRefunded`, `Settled`, and `Disputed`.
    /// The state moves to `Refunded` when the remainder drops to
    /// [`REFUND_EPSILON`] or below, otherwise to `PartiallyRefunded`.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::IllegalTransition`] from any other state.
    /// - [`PaymentError::InvalidAmount`] for a non-positive amount.
    /// - [`PaymentError::ExceedsRemaining`] when the request exceeds the
    ///   remaining amount.
    pub fn refund(&mut self, refund_amount: Decimal) -> Result<(), PaymentError> {
        if !self.state.refundable() {
            return Err(PaymentError::IllegalTransition {
                from: self.state,
                operation: "refund",
            });
        }
        if refund_amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        if refund_amount > self.remaining_amount() {
            return Err(PaymentError::ExceedsRemaining);
        }

        self.refunded += refund_amount;
        self.state = if self.remaining_amount() <= REFUND_EPSILON {
            TransactionState::Refunded
        } else {
            TransactionState::PartiallyRefunded
        };
        self.assert_invariants();
        Ok(())
    }

    /// Marks an approved transaction as settled.
    pub fn settle(&mut self) -> Result<(), PaymentError> {
        match self.state {
            TransactionState::Approved => {
                self.state = TransactionState::Settled;
                Ok(())
            }
            from => Err(PaymentError::IllegalTransition {
                from,
                operation: "settle",
            }),
        }
    }

    /// Flags an approved or settled transaction as disputed.
    pub fn mark_disputed(&mut self) -> Result<(), PaymentError> {
        match self.state {
            TransactionState::Approved | TransactionState::Settled => {
                self.state = TransactionState::Disputed;
                Ok(())
            }
            from => Err(PaymentError::IllegalTransition {
                from,
                operation: "dispute",
            }),
        }
    }

    /// Expires a transaction that never completed authorization.
    pub fn expire(&mut self) -> Result<(), PaymentError> {
        match self.state {
            TransactionState::Pending | TransactionState::PreAuthorized => {
                self.state = TransactionState::Expired;
                Ok(())
            }
            from => Err(PaymentError::IllegalTransition {
                from,
                operation: "expire",
            }),
        }
    }

    /// Applies a bank authorization outcome to a pending transaction.
    ///
    /// APPROVED, DECLINED, and REVIEW_REQUIRED map to `Approved`, `Declined`,
    /// and `FlaggedForReview`, bypassing `process()`.
    pub fn apply_authorization(
        &mut self,
        decision: AuthorizationDecision,
    ) -> Result<(), PaymentError> {
        if self.state != TransactionState::Pending {
            return Err(PaymentError::IllegalTransition {
                from: self.state,
                operation: "apply authorization",
            });
        }
        self.state = match decision {
            AuthorizationDecision::Approved => TransactionState::Approved,
            AuthorizationDecision::Declined => TransactionState::Declined,
            AuthorizationDecision::ReviewRequired => TransactionState::FlaggedForReview,
        };
        Ok(())
    }

    /// Restores a transaction from persisted parts. Used by the storage
    /// boundary; callers are trusted to pass values read back from records.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: TransactionId,
        customer: Customer,
        merchant: Merchant,
        method: PaymentMethod,
        amount: Decimal,
        refunded: Decimal,
        state: TransactionState,
        created_at: DateTime<Utc>,
        idempotency_key: Option<String>,
    ) -> Self {
        let tx = Self {
            id,
            customer,
            merchant,
            method,
            amount,
            refunded,
            state,
            created_at,
            idempotency_key,
        };
        tx.assert_invariants();
        tx
    }
}
