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

//! Payment method variants and the string-keyed factory.
//!
//! Each variant carries its own detail fields and an issuer-side amount cap
//! used as a rough acceptance simulation. Full card numbers are only held in
//! memory; anything leaving the core goes through [`PaymentMethod::masked_details`].

use crate::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment method type discriminator.
///
/// The `Display` form ("Credit Card", "Debit Card", "Digital Wallet") is the
/// canonical type string used by the factory, the customer balance book, and
/// persistence records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethodKind {
    CreditCard,
    DebitCard,
    DigitalWallet,
}

impl PaymentMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "Credit Card",
            Self::DebitCard => "Debit Card",
            Self::DigitalWallet => "Digital Wallet",
        }
    }
}

impl fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethodKind {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Credit Card" => Ok(Self::CreditCard),
            "Debit Card" => Ok(Self::DebitCard),
            "Digital Wallet" => Ok(Self::DigitalWallet),
            other => Err(PaymentError::UnknownPaymentMethod(other.to_string())),
        }
    }
}

/// A customer's payment instrument, owned by the transaction that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    CreditCard {
        number: String,
        holder: String,
        expiry: String,
    },
    DebitCard {
        number: String,
        holder: String,
        bank: String,
    },
    DigitalWallet {
        wallet_id: String,
        provider: String,
    },
}

impl PaymentMethod {
    /// Constructs a method from a type string and positional detail strings.
    ///
    /// Detail order: credit `[number, holder, expiry]`, debit
    /// `[number, holder, bank]`, wallet `[wallet_id, provider]`.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::UnknownPaymentMethod`] for an unrecognized type string.
    /// - [`PaymentError::InvalidMethodDetails`] when detail fields are missing.
    pub fn from_parts(kind: &str, details: &[&str]) -> Result<Self, PaymentError> {
        match kind.parse::<PaymentMethodKind>()? {
            PaymentMethodKind::CreditCard => {
                let [number, holder, expiry] = take3(details, "credit card needs number, holder, expiry")?;
                Ok(Self::CreditCard {
                    number,
                    holder,
                    expiry,
                })
            }
            PaymentMethodKind::DebitCard => {
                let [number, holder, bank] = take3(details, "debit card needs number, holder, bank")?;
                Ok(Self::DebitCard {
                    number,
                    holder,
                    bank,
                })
            }
            PaymentMethodKind::DigitalWallet => {
                if details.len() < 2 {
                    return Err(PaymentError::InvalidMethodDetails(
                        "digital wallet needs wallet_id, provider",
                    ));
                }
                Ok(Self::DigitalWallet {
                    wallet_id: details[0].to_string(),
                    provider: details[1].to_string(),
                })
            }
        }
    }

    pub fn kind(&self) -> PaymentMethodKind {
        match self {
            Self::CreditCard { .. } => PaymentMethodKind::CreditCard,
            Self::DebitCard { .. } => PaymentMethodKind::DebitCard,
            Self::DigitalWallet { .. } => PaymentMethodKind::DigitalWallet,
        }
    }

    /// Display details with the instrument number masked to its last four
    /// characters, e.g. `Credit Card ****3456`.
    pub fn masked_details(&self) -> String {
        match self {
            Self::CreditCard { number, .. } => {
                format!("Credit Card ****{}", last_four(number))
            }
            Self::DebitCard { number, bank, .. } => {
                format!("Debit Card ****{} ({})", last_four(number), bank)
            }
            Self::DigitalWallet {
                wallet_id,
                provider,
            } => {
                format!("{} Wallet ****{}", provider, last_four(wallet_id))
            }
        }
    }

    /// Positional detail strings with instrument numbers masked, in the
    /// order [`PaymentMethod::from_parts`] expects. This is the shape
    /// persistence records carry; full numbers never leave the core.
    pub fn masked_parts(&self) -> Vec<String> {
        match self {
            Self::CreditCard {
                number,
                holder,
                expiry,
            } => vec![mask(number), holder.clone(), expiry.clone()],
            Self::DebitCard {
                number,
                holder,
                bank,
            } => vec![mask(number), holder.clone(), bank.clone()],
            Self::DigitalWallet {
                wallet_id,
                provider,
            } => vec![mask(wallet_id), provider.clone()],
        }
    }

    /// Issuer-side acceptance simulation: each variant caps the single
    /// transaction amount it will carry.
    pub fn supports_amount(&self, amount: Decimal) -> bool {
        let cap = match self {
            Self::CreditCard { .. } => Decimal::from(10_000),
            Self::DebitCard { .. } => Decimal::from(5_000),
            Self::DigitalWallet { .. } => Decimal::from(2_000),
        };
        amount < cap
    }
}

fn take3(details: &[&str], context: &'static str) -> Result<[String; 3], PaymentError> {
    if details.len() < 3 {
        return Err(PaymentError::InvalidMethodDetails(context));
    }
    Ok([
        details[0].to_string(),
        details[1].to_string(),
        details[2].to_string(),
    ])
}

fn last_four(value: &str) -> &str {
    let len = value.len();
    if len <= 4 { value } else { &value[len - 4..] }
}

fn mask(value: &str) -> String {
    format!("****{}", last_four(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn credit_card() -> PaymentMethod {
        PaymentMethod::CreditCard {
            number: "4111111111113456".to_string(),
            holder: "Ada Lovelace".to_string(),
            expiry: "12/27".to_string(),
        }
    }

    #[test]
    fn factory_builds_each_variant() {
        let credit =
            PaymentMethod::from_parts("Credit Card", &["4111111111113456", "Ada", "12/27"])
                .unwrap();
        assert_eq!(credit.kind(), PaymentMethodKind::CreditCard);

        let debit =
            PaymentMethod::from_parts("Debit Card", &["5500000000004321", "Ada", "First Bank"])
                .unwrap();
        assert_eq!(debit.kind(), PaymentMethodKind::DebitCard);

        let wallet = PaymentMethod::from_parts("Digital Wallet", &["w-778899", "PayPal"]).unwrap();
        assert_eq!(wallet.kind(), PaymentMethodKind::DigitalWallet);
    }

    #[test]
    fn factory_rejects_unknown_type() {
        let result = PaymentMethod::from_parts("Crypto", &["abc"]);
        assert_eq!(
            result,
            Err(PaymentError::UnknownPaymentMethod("Crypto".to_string()))
        );
    }

    #[test]
    fn factory_rejects_missing_details() {
        let result = PaymentMethod::from_parts("Credit Card", &["4111111111113456"]);
        assert!(matches!(
            result,
            Err(PaymentError::InvalidMethodDetails(_))
        ));
    }

    #[test]
    fn masked_details_hide_all_but_last_four() {
        let masked = credit_card().masked_details();
        assert_eq!(masked, "Credit Card ****3456");
        assert!(!masked.contains("41111111"));
    }

    #[test]
    fn amount_caps_per_variant() {
        let credit = credit_card();
        assert!(credit.supports_amount(dec!(9999.99)));
        assert!(!credit.supports_amount(dec!(10000)));

        let debit = PaymentMethod::DebitCard {
            number: "5500000000004321".to_string(),
            holder: "Ada".to_string(),
            bank: "First Bank".to_string(),
        };
        assert!(debit.supports_amount(dec!(4999.99)));
        assert!(!debit.supports_amount(dec!(5000)));

        let wallet = PaymentMethod::DigitalWallet {
            wallet_id: "w-778899".to_string(),
            provider: "PayPal".to_string(),
        };
        assert!(wallet.supports_amount(dec!(1999.99)));
        assert!(!wallet.supports_amount(dec!(2000)));
    }

    #[test]
    fn masked_parts_rebuild_a_masked_instrument() {
        let parts = credit_card().masked_parts();
        assert_eq!(parts[0], "****3456");

        let borrowed: Vec<&str> = parts.iter().map(String::as_str).collect();
        let restored = PaymentMethod::from_parts("Credit Card", &borrowed).unwrap();
        assert_eq!(restored.kind(), PaymentMethodKind::CreditCard);
    }

    #[test]
    fn kind_round_trips_through_string() {
        for kind in [
            PaymentMethodKind::CreditCard,
            PaymentMethodKind::DebitCard,
            PaymentMethodKind::DigitalWallet,
        ] {
            assert_eq!(kind.as_str().parse::<PaymentMethodKind>().unwrap(), kind);
        }
    }
}
