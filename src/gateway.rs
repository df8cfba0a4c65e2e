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

//! Payment gateway orchestration.
//!
//! The [`PaymentGateway`] runs the authorization pipeline: middleware stages,
//! fraud evaluation, bank authorization, state application, observer
//! notification, and the handoff into the transaction log and the persistence
//! sink. Collaborators are injected at construction; the gateway owns no
//! global state.
//!
//! Two entry paths exist: [`PaymentGateway::process_transaction`] is the
//! single-shot flow, [`PaymentGateway::authorize_transaction`] followed by
//! [`PaymentGateway::capture_transaction`] or
//! [`PaymentGateway::void_transaction`] is the two-phase hold-then-capture
//! flow.

use crate::bank::{AuthorizationDecision, BankAuthorizer};
use crate::base::TransactionId;
use crate::fraud::{FraudEngine, RiskEvaluation, RiskLevel};
use crate::log::TransactionLog;
use crate::store::{FraudAlertRecord, PaymentStore, TransactionRecord};
use crate::transaction::Transaction;
use crate::PaymentError;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of running a transaction through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub transaction_id: TransactionId,
    pub decision: AuthorizationDecision,
    pub risk: RiskEvaluation,
}

type Observer = Box<dyn Fn(&Transaction) + Send + Sync>;
type PipelineStage = Box<dyn Fn(&mut Transaction) + Send + Sync>;

/// Extension point for payload encryption before instrument data leaves
/// this process. Intentionally a no-op today.
fn transport_encryption(_transaction: &mut Transaction) {}

/// Orchestrates fraud evaluation, bank authorization, and state application.
///
/// The gateway owns the transaction log: a processed transaction moves into
/// the log and is addressed by ID from then on. The idempotency map and the
/// log are the only shared mutable resources; the map sits behind one mutex
/// so the check-then-insert on a key is atomic.
pub struct PaymentGateway {
    fraud: Arc<FraudEngine>,
    bank: BankAuthorizer,
    log: TransactionLog,
    /// Idempotency key to transaction ID, guarded as one unit.
    idempotency: Mutex<HashMap<String, TransactionId>>,
    /// Observers keyed by registration name.
    observers: Mutex<Vec<(String, Observer)>>,
    /// Middleware stages, run in order before fraud evaluation.
    stages: Vec<PipelineStage>,
    store: Option<Arc<dyn PaymentStore>>,
}

impl PaymentGateway {
    /// Creates a gateway with the default middleware pipeline (the
    /// transport-encryption stage) and no persistence sink.
    pub fn new(fraud: Arc<FraudEngine>, bank: BankAuthorizer) -> Self {
        Self {
            fraud,
            bank,
            log: TransactionLog::new(),
            idempotency: Mutex::new(HashMap::new()),
            observers: Mutex::new(Vec::new()),
            stages: vec![Box::new(transport_encryption)],
            store: None,
        }
    }

    /// Attaches a persistence sink, builder-style.
    pub fn with_store(mut self, store: Arc<dyn PaymentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Appends a middleware stage after the defaults, builder-style.
    pub fn with_stage(mut self, stage: impl Fn(&mut Transaction) + Send + Sync + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn fraud(&self) -> &FraudEngine {
        &self.fraud
    }

    pub fn bank(&self) -> &BankAuthorizer {
        &self.bank
    }

    /// The gateway's transaction log.
    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Snapshot of a stored transaction.
    pub fn transaction(&self, id: &TransactionId) -> Option<Transaction> {
        self.log.get(id)
    }

    pub(crate) fn store(&self) -> Option<&Arc<dyn PaymentStore>> {
        self.store.as_ref()
    }

    /// Registers an observer under a caller-chosen key.
    ///
    /// Registering the same key again replaces the previous callback, so
    /// repeated registration is idempotent.
    pub fn register_observer(
        &self,
        key: impl Into<String>,
        observer: impl Fn(&Transaction) + Send + Sync + 'static,
    ) {
        let key = key.into();
        let mut observers = self.observers.lock();
        match observers.iter_mut().find(|(name, _)| *name == key) {
            Some((_, existing)) => *existing = Box::new(observer),
            None => observers.push((key, Box::new(observer))),
        }
    }

    /// Removes an observer by key. Removing an unknown key is a no-op.
    pub fn remove_observer(&self, key: &str) {
        self.observers.lock().retain(|(name, _)| name != key);
    }

    pub(crate) fn notify_observers(&self, transaction: &Transaction) {
        for (_, observer) in self.observers.lock().iter() {
            observer(transaction);
        }
    }

    /// Runs the single-shot pipeline on a pending transaction.
    ///
    /// Stages run first, then fraud evaluation, then bank authorization. The
    /// decision is applied to the transaction state, observers see the
    /// post-authorization snapshot, and the transaction moves into the log.
    /// A record goes to the persistence sink if one is attached; sink
    /// failures are logged and never roll back the applied state.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::IllegalTransition`] if the transaction is not
    ///   pending.
    /// - [`PaymentError::DuplicateTransaction`] if its ID is already logged.
    pub fn process_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<ProcessOutcome, PaymentError> {
        for stage in &self.stages {
            stage(&mut transaction);
        }

        let evaluation = self.fraud.evaluate(&transaction);
        let decision = self.bank.authorize(&transaction, evaluation.level);
        transaction.apply_authorization(decision)?;
        info!(
            transaction_id = %transaction.id(),
            ?decision,
            level = %evaluation.level,
            score = evaluation.score,
            "transaction processed"
        );

        self.notify_observers(&transaction);
        self.finish(transaction, decision, evaluation)
    }

    /// Runs the pipeline at most once per idempotency key.
    ///
    /// A key seen before returns the stored transaction ID without
    /// reprocessing; otherwise the pipeline runs and the key is recorded
    /// after successful storage. The check and the insert happen under one
    /// lock, so a concurrent retry with the same key waits here instead of
    /// racing the pipeline.
    pub fn process_with_idempotency_key(
        &self,
        key: impl Into<String>,
        mut transaction: Transaction,
    ) -> Result<TransactionId, PaymentError> {
        let key = key.into();
        let mut keys = self.idempotency.lock();
        if let Some(existing) = keys.get(&key) {
            info!(%key, transaction_id = %existing, "idempotent replay");
            return Ok(existing.clone());
        }

        transaction.set_idempotency_key(key.clone());
        let outcome = self.process_transaction(transaction)?;
        keys.insert(key, outcome.transaction_id.clone());
        Ok(outcome.transaction_id)
    }

    /// Runs the two-phase entry: fraud and bank checks, then a hold.
    ///
    /// An approved decision places the transaction in `PreAuthorized` instead
    /// of `Approved`; capture or void finish the flow later. Declined and
    /// review outcomes apply their states directly, same as the single-shot
    /// path.
    pub fn authorize_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<ProcessOutcome, PaymentError> {
        for stage in &self.stages {
            stage(&mut transaction);
        }

        let evaluation = self.fraud.evaluate(&transaction);
        let decision = self.bank.authorize(&transaction, evaluation.level);
        match decision {
            AuthorizationDecision::Approved => transaction.authorize()?,
            AuthorizationDecision::Declined | AuthorizationDecision::ReviewRequired => {
                transaction.apply_authorization(decision)?
            }
        }
        info!(
            transaction_id = %transaction.id(),
            ?decision,
            level = %evaluation.level,
            "transaction authorized"
        );

        self.notify_observers(&transaction);
        self.finish(transaction, decision, evaluation)
    }

    /// Captures a previously placed hold for `amount` (zero means the full
    /// original amount).
    ///
    /// # Errors
    ///
    /// [`PaymentError::TransactionNotFound`] for an unknown ID; state and
    /// amount rejections come from [`Transaction::capture`] and leave the
    /// hold in place.
    pub fn capture_transaction(
        &self,
        id: &TransactionId,
        amount: Decimal,
    ) -> Result<(), PaymentError> {
        self.log.with_mut(id, |tx| tx.capture(amount))?;
        self.after_mutation(id);
        Ok(())
    }

    /// Voids a previously placed hold.
    ///
    /// # Errors
    ///
    /// [`PaymentError::TransactionNotFound`] for an unknown ID;
    /// [`PaymentError::IllegalTransition`] if no hold is in place.
    pub fn void_transaction(&self, id: &TransactionId) -> Result<(), PaymentError> {
        self.log.with_mut(id, |tx| tx.void_transaction())?;
        self.after_mutation(id);
        Ok(())
    }

    /// Restores loaded transactions into the log and rebuilds the
    /// idempotency map from their stored keys.
    ///
    /// # Errors
    ///
    /// [`PaymentError::DuplicateTransaction`] if a loaded ID collides with
    /// one already in the log.
    pub fn install_transactions(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<(), PaymentError> {
        let mut keys = self.idempotency.lock();
        for transaction in transactions {
            if let Some(key) = transaction.idempotency_key() {
                keys.insert(key.to_string(), transaction.id().clone());
            }
            self.log.insert(transaction)?;
        }
        Ok(())
    }

    /// Moves the transaction into the log and hands records to the sink.
    fn finish(
        &self,
        transaction: Transaction,
        decision: AuthorizationDecision,
        risk: RiskEvaluation,
    ) -> Result<ProcessOutcome, PaymentError> {
        let record = TransactionRecord::from(&transaction);
        let outcome = ProcessOutcome {
            transaction_id: transaction.id().clone(),
            decision,
            risk,
        };
        self.log.insert(transaction)?;

        self.persist_record(&record);
        if outcome.risk.level >= RiskLevel::Medium {
            self.persist_latest_alert(&outcome.transaction_id);
        }
        Ok(outcome)
    }

    /// Observer notification and re-persistence after an in-log mutation.
    fn after_mutation(&self, id: &TransactionId) {
        if let Some(snapshot) = self.log.get(id) {
            self.notify_observers(&snapshot);
            self.persist_transaction(&snapshot);
        }
    }

    pub(crate) fn persist_transaction(&self, transaction: &Transaction) {
        self.persist_record(&TransactionRecord::from(transaction));
    }

    fn persist_record(&self, record: &TransactionRecord) {
        if let Some(store) = &self.store {
            if let Err(error) = store.save_transaction(record) {
                warn!(transaction_id = %record.id, %error, "failed to persist transaction");
            }
        }
    }

    fn persist_latest_alert(&self, id: &TransactionId) {
        let Some(store) = &self.store else {
            return;
        };
        let alert = self
            .fraud
            .alerts()
            .into_iter()
            .rev()
            .find(|alert| &alert.transaction_id == id);
        if let Some(alert) = alert {
            if let Err(error) = store.save_fraud_alert(&FraudAlertRecord::from(&alert)) {
                warn!(alert_id = %alert.id, %error, "failed to persist fraud alert");
            }
        }
    }
}
