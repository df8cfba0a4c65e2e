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

//! Core identifier types for transactions, refunds, fraud alerts,
//! customers, and merchants.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Builds a prefixed identifier like `TX-1A2B3C4D-5E6F`.
///
/// The tail is random: an eight-digit and a four-digit uppercase hex group.
fn generate_id(prefix: &str) -> String {
    format!(
        "{}-{:08X}-{:04X}",
        prefix,
        rand::random::<u32>(),
        rand::random::<u16>()
    )
}

/// Unique identifier for a transaction.
///
/// Format: `TX-XXXXXXXX-XXXX` (uppercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    /// Generates a new random transaction ID.
    pub fn generate() -> Self {
        Self(generate_id("TX"))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a refund record.
///
/// Format: `RF-XXXXXXXX-XXXX` (uppercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RefundId(pub String);

impl RefundId {
    /// Generates a new random refund ID.
    pub fn generate() -> Self {
        Self(generate_id("RF"))
    }
}

impl fmt::Display for RefundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a fraud alert.
///
/// Format: `FA-XXXXXXXX-XXXX` (uppercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AlertId(pub String);

impl AlertId {
    /// Generates a new random alert ID.
    pub fn generate() -> Self {
        Self(generate_id("FA"))
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a customer, assigned at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a merchant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MerchantId(pub String);

impl fmt::Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
