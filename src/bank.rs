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

//! Bank authorization stub.
//!
//! Produces a decision from basic instrument checks and the fraud level.
//! There is no card network behind this; the checks are simulations with
//! the same shape as the real thing.

use crate::fraud::RiskLevel;
use crate::payment_method::PaymentMethod;
use crate::transaction::Transaction;
use rust_decimal::Decimal;

/// Outcome of a bank authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationDecision {
    Approved,
    Declined,
    ReviewRequired,
}

/// Issuer-side authorization stub.
///
/// The funds check compares the raw transaction amount against a flat limit.
/// It does NOT consult the customer's ledger balance; authorization and the
/// ledger are deliberately disconnected here, and the limit is a pluggable
/// placeholder for a real balance check.
#[derive(Debug, Clone)]
pub struct BankAuthorizer {
    /// Amounts at or above this limit are treated as insufficient funds.
    insufficient_funds_limit: Decimal,
}

impl BankAuthorizer {
    pub const DEFAULT_FUNDS_LIMIT: u32 = 5_000;

    pub fn new() -> Self {
        Self {
            insufficient_funds_limit: Decimal::from(Self::DEFAULT_FUNDS_LIMIT),
        }
    }

    /// Overrides the funds-heuristic limit, builder-style.
    pub fn with_funds_limit(mut self, limit: Decimal) -> Self {
        self.insufficient_funds_limit = limit;
        self
    }

    pub fn funds_limit(&self) -> Decimal {
        self.insufficient_funds_limit
    }

    /// Decides on a transaction given its fraud level.
    ///
    /// Declines when the instrument fails validation or the funds heuristic
    /// trips. A HIGH fraud level demands review; MEDIUM is still approved.
    /// No side effects beyond the returned decision.
    pub fn authorize(
        &self,
        transaction: &Transaction,
        fraud_level: RiskLevel,
    ) -> AuthorizationDecision {
        if !self.validate_instrument(transaction.method(), transaction.amount()) {
            return AuthorizationDecision::Declined;
        }
        if transaction.amount() >= self.insufficient_funds_limit {
            return AuthorizationDecision::Declined;
        }
        match fraud_level {
            RiskLevel::High => AuthorizationDecision::ReviewRequired,
            RiskLevel::Low | RiskLevel::Medium => AuthorizationDecision::Approved,
        }
    }

    /// Instrument validation: the card-validity check is stubbed to true;
    /// the per-method amount cap stands in for issuer acceptance.
    fn validate_instrument(&self, method: &PaymentMethod, amount: Decimal) -> bool {
        method.supports_amount(amount)
    }
}

impl Default for BankAuthorizer {
    fn default() -> Self {
        Self::new()
    }
}
