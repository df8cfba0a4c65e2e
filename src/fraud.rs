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

//! Fraud risk scoring.
//!
//! Two strategies are exposed: [`MajorityScorer`], a fixed
//! count-of-suspicious-factors heuristic, and [`FraudEngine`], the weighted
//! rule engine with runtime-mutable rules and configurable level thresholds.
//! Evaluations that land at MEDIUM or HIGH record a [`FraudAlert`].

use crate::base::{AlertId, TransactionId};
use crate::payment_method::PaymentMethodKind;
use crate::transaction::Transaction;
use crate::PaymentError;
use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::fmt;
use tracing::debug;

/// Address fragments that mark a billing address as suspicious.
const SUSPICIOUS_ADDRESS_TOKENS: [&str; 5] =
    ["test", "suspicious", "fake", "invalid", "unknown"];

/// Fraud risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    pub fn from_str_code(code: &str) -> Option<Self> {
        match code {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Score cut-offs for classifying a weighted score into a [`RiskLevel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    /// Scores at or above this are HIGH.
    pub high: f64,
    /// Scores at or above this (but below `high`) are MEDIUM.
    pub medium: f64,
}

impl RiskThresholds {
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high: 0.7,
            medium: 0.3,
        }
    }
}

/// A named, weighted predicate over a transaction.
///
/// The name is the rule's identity: installing a rule under an existing name
/// replaces the old rule.
pub struct FraudRule {
    name: String,
    weight: f64,
    description: String,
    predicate: Box<dyn Fn(&Transaction) -> bool + Send + Sync>,
}

impl FraudRule {
    /// Creates a rule.
    ///
    /// # Errors
    ///
    /// [`PaymentError::InvalidRuleWeight`] if `weight` is outside [0, 1].
    pub fn new(
        name: impl Into<String>,
        weight: f64,
        description: impl Into<String>,
        predicate: impl Fn(&Transaction) -> bool + Send + Sync + 'static,
    ) -> Result<Self, PaymentError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(PaymentError::InvalidRuleWeight);
        }
        Ok(Self {
            name: name.into(),
            weight,
            description: description.into(),
            predicate: Box::new(predicate),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn triggers(&self, transaction: &Transaction) -> bool {
        (self.predicate)(transaction)
    }
}

impl fmt::Debug for FraudRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FraudRule")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Outcome of one weighted evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskEvaluation {
    /// Sum of triggered weights, clamped to [0, 1].
    pub score: f64,
    pub level: RiskLevel,
    /// Names of the rules that triggered, in installation order.
    pub triggered: Vec<String>,
}

/// Record of a MEDIUM or HIGH evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct FraudAlert {
    pub id: AlertId,
    pub transaction_id: TransactionId,
    pub level: RiskLevel,
    /// Lists the triggered rule names and the score.
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub reviewed: bool,
}

fn address_is_suspicious(address: &str, tokens: &[&str]) -> bool {
    let lowered = address.to_lowercase();
    tokens.iter().any(|token| lowered.contains(token))
}

/// The default weighted rule set.
pub fn default_rules() -> Vec<FraudRule> {
    let high_amount = FraudRule::new(
        "high_amount",
        0.4,
        "amount exceeds 1000",
        |tx: &Transaction| tx.amount() > Decimal::from(1_000),
    );
    let suspicious_address = FraudRule::new(
        "suspicious_address",
        0.3,
        "billing address contains a suspicious fragment",
        |tx: &Transaction| {
            address_is_suspicious(&tx.customer().billing_address, &SUSPICIOUS_ADDRESS_TOKENS)
        },
    );
    let digital_wallet = FraudRule::new(
        "digital_wallet",
        0.2,
        "digital wallet payment method",
        |tx: &Transaction| tx.method().kind() == PaymentMethodKind::DigitalWallet,
    );
    let odd_hours = FraudRule::new(
        "odd_hours",
        0.3,
        "transaction created between 02:00 and 05:59",
        |tx: &Transaction| (2..=5).contains(&tx.created_at().hour()),
    );

    // Default weights are all in range.
    [high_amount, suspicious_address, digital_wallet, odd_hours]
        .into_iter()
        .map(|rule| rule.expect("default rule weights are valid"))
        .collect()
}

/// Fixed majority-of-factors strategy.
///
/// Counts three suspicious factors (amount over 1000, address containing
/// "unknown" or "test", digital wallet). Zero factors is LOW, one is MEDIUM,
/// two or more is HIGH.
#[derive(Debug, Default)]
pub struct MajorityScorer;

impl MajorityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, transaction: &Transaction) -> RiskLevel {
        let mut factors = 0;
        if transaction.amount() > Decimal::from(1_000) {
            factors += 1;
        }
        if address_is_suspicious(&transaction.customer().billing_address, &["unknown", "test"]) {
            factors += 1;
        }
        if transaction.method().kind() == PaymentMethodKind::DigitalWallet {
            factors += 1;
        }
        match factors {
            0 => RiskLevel::Low,
            1 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }
}

/// Weighted rule engine with an alert book.
///
/// Rules and alerts sit behind mutexes so the engine can be shared by
/// reference and mutated at runtime.
#[derive(Debug)]
pub struct FraudEngine {
    rules: Mutex<Vec<FraudRule>>,
    thresholds: RiskThresholds,
    alerts: Mutex<Vec<FraudAlert>>,
}

impl FraudEngine {
    /// Creates an engine with the default rule set and default thresholds.
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(default_rules()),
            thresholds: RiskThresholds::default(),
            alerts: Mutex::new(Vec::new()),
        }
    }

    /// Creates an engine with no rules installed.
    pub fn empty() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            thresholds: RiskThresholds::default(),
            alerts: Mutex::new(Vec::new()),
        }
    }

    /// Overrides the level thresholds, builder-style.
    pub fn with_thresholds(mut self, thresholds: RiskThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> RiskThresholds {
        self.thresholds
    }

    /// Installs a rule. A rule with the same name is replaced in place,
    /// keeping its position in the evaluation order.
    pub fn add_rule(&self, rule: FraudRule) {
        let mut rules = self.rules.lock();
        match rules.iter().position(|existing| existing.name() == rule.name()) {
            Some(index) => rules[index] = rule,
            None => rules.push(rule),
        }
    }

    /// Removes a rule by name.
    ///
    /// # Errors
    ///
    /// [`PaymentError::RuleNotFound`] if no rule has that name; the rule set
    /// is left unchanged.
    pub fn remove_rule(&self, name: &str) -> Result<(), PaymentError> {
        let mut rules = self.rules.lock();
        match rules.iter().position(|rule| rule.name() == name) {
            Some(index) => {
                rules.remove(index);
                Ok(())
            }
            None => Err(PaymentError::RuleNotFound),
        }
    }

    pub fn rule_names(&self) -> Vec<String> {
        self.rules
            .lock()
            .iter()
            .map(|rule| rule.name().to_string())
            .collect()
    }

    /// Scores a transaction and classifies the result.
    ///
    /// A MEDIUM or HIGH outcome appends a [`FraudAlert`] to the alert book.
    pub fn evaluate(&self, transaction: &Transaction) -> RiskEvaluation {
        let (score, triggered) = {
            let rules = self.rules.lock();
            let mut score = 0.0f64;
            let mut triggered = Vec::new();
            for rule in rules.iter() {
                if rule.triggers(transaction) {
                    score += rule.weight();
                    triggered.push(rule.name().to_string());
                }
            }
            (score.min(1.0), triggered)
        };

        let level = self.thresholds.classify(score);
        if level >= RiskLevel::Medium {
            let alert = FraudAlert {
                id: AlertId::generate(),
                transaction_id: transaction.id().clone(),
                level,
                description: format!(
                    "triggered rules: [{}], score {:.2}",
                    triggered.join(", "),
                    score
                ),
                created_at: Utc::now(),
                reviewed: false,
            };
            debug!(transaction_id = %alert.transaction_id, %level, score, "fraud alert raised");
            self.alerts.lock().push(alert);
        }

        RiskEvaluation {
            score,
            level,
            triggered,
        }
    }

    /// Snapshot of all alerts raised so far.
    pub fn alerts(&self) -> Vec<FraudAlert> {
        self.alerts.lock().clone()
    }

    /// Marks an alert as reviewed.
    ///
    /// # Errors
    ///
    /// [`PaymentError::AlertNotFound`] if the alert ID is unknown.
    pub fn mark_reviewed(&self, alert_id: &AlertId) -> Result<(), PaymentError> {
        let mut alerts = self.alerts.lock();
        match alerts.iter_mut().find(|alert| &alert.id == alert_id) {
            Some(alert) => {
                alert.reviewed = true;
                Ok(())
            }
            None => Err(PaymentError::AlertNotFound),
        }
    }

    /// Restores persisted alerts into the alert book.
    pub fn install_alerts(&self, alerts: Vec<FraudAlert>) {
        self.alerts.lock().extend(alerts);
    }
}

impl Default for FraudEngine {
    fn default() -> Self {
        Self::new()
    }
}
