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

//! Gateway pipeline integration tests.

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use paygate_rs::store::{
    restore_customer, restore_fraud_alerts, restore_transactions,
};
use paygate_rs::{
    AuthorizationDecision, BankAuthorizer, Customer, CustomerRecord, FraudAlertRecord,
    FraudEngine, MemoryStore, Merchant, PaymentError, PaymentGateway, PaymentMethod,
    PaymentStore, RefundRecord, RiskLevel, StoreError, Transaction, TransactionRecord,
    TransactionState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

fn make_gateway() -> PaymentGateway {
    PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new())
}

fn make_customer(address: &str) -> Customer {
    Customer::new(
        "cust-1",
        "Ada Lovelace",
        "ada@example.com",
        address,
        "ada",
        "s3cret",
    )
}

fn credit_card() -> PaymentMethod {
    PaymentMethod::CreditCard {
        number: "4111111111113456".to_string(),
        holder: "Ada Lovelace".to_string(),
        expiry: "12/27".to_string(),
    }
}

fn wallet() -> PaymentMethod {
    PaymentMethod::DigitalWallet {
        wallet_id: "w-778899".to_string(),
        provider: "PayPal".to_string(),
    }
}

/// Transactions pinned to midday so the odd-hours rule stays quiet.
fn make_transaction(amount: Decimal, address: &str, method: PaymentMethod) -> Transaction {
    let merchant = Merchant::new("merch-1", "Widget Shop", "retail");
    Transaction::new(make_customer(address), merchant, method, amount)
        .unwrap()
        .with_created_at(Utc.with_ymd_and_hms(2025, 6, 15, 12, 30, 0).unwrap())
}

#[test]
fn clean_transaction_is_approved() {
    let gateway = make_gateway();
    let tx = make_transaction(dec!(500.00), "123 Main St", credit_card());
    let id = tx.id().clone();

    let outcome = gateway.process_transaction(tx).unwrap();
    assert_eq!(outcome.decision, AuthorizationDecision::Approved);
    assert_eq!(outcome.risk.level, RiskLevel::Low);
    assert_eq!(outcome.risk.score, 0.0);
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::Approved
    );
    assert!(gateway.fraud().alerts().is_empty());
}

#[test]
fn stacked_risk_factors_get_flagged() {
    let gateway = make_gateway();
    let tx = make_transaction(dec!(1500.00), "Unknown City", wallet());
    let id = tx.id().clone();

    let outcome = gateway.process_transaction(tx).unwrap();
    assert_eq!(outcome.decision, AuthorizationDecision::ReviewRequired);
    assert_eq!(outcome.risk.level, RiskLevel::High);
    assert!((outcome.risk.score - 0.9).abs() < 1e-9);
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::FlaggedForReview
    );

    let alerts = gateway.fraud().alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].transaction_id, id);
    assert_eq!(alerts[0].level, RiskLevel::High);
}

#[test]
fn oversized_amount_is_declined() {
    let gateway = make_gateway();
    // Over the funds-heuristic limit but under the credit card cap.
    let tx = make_transaction(dec!(7500.00), "123 Main St", credit_card());
    let id = tx.id().clone();

    let outcome = gateway.process_transaction(tx).unwrap();
    assert_eq!(outcome.decision, AuthorizationDecision::Declined);
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::Declined
    );
}

#[test]
fn observers_see_the_post_authorization_snapshot() {
    let gateway = make_gateway();
    let seen: Arc<Mutex<Vec<TransactionState>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    gateway.register_observer("ui", move |tx| sink.lock().push(tx.state()));

    gateway
        .process_transaction(make_transaction(dec!(500.00), "123 Main St", credit_card()))
        .unwrap();
    gateway
        .process_transaction(make_transaction(dec!(1500.00), "Unknown City", wallet()))
        .unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            TransactionState::Approved,
            TransactionState::FlaggedForReview
        ]
    );
}

#[test]
fn idempotency_key_makes_processing_at_most_once() {
    let gateway = make_gateway();
    let first = make_transaction(dec!(500.00), "123 Main St", credit_card());
    let second = make_transaction(dec!(500.00), "123 Main St", credit_card());
    assert_ne!(first.id(), second.id());

    let first_id = gateway.process_with_idempotency_key("K1", first).unwrap();
    let second_id = gateway.process_with_idempotency_key("K1", second).unwrap();

    assert_eq!(first_id, second_id);
    assert_eq!(gateway.log().len(), 1);
}

#[test]
fn distinct_idempotency_keys_process_independently() {
    let gateway = make_gateway();
    let a = gateway
        .process_with_idempotency_key(
            "K1",
            make_transaction(dec!(500.00), "123 Main St", credit_card()),
        )
        .unwrap();
    let b = gateway
        .process_with_idempotency_key(
            "K2",
            make_transaction(dec!(500.00), "123 Main St", credit_card()),
        )
        .unwrap();

    assert_ne!(a, b);
    assert_eq!(gateway.log().len(), 2);
}

#[test]
fn two_phase_hold_then_capture() {
    let gateway = make_gateway();
    let tx = make_transaction(dec!(800.00), "123 Main St", credit_card());
    let id = tx.id().clone();

    let outcome = gateway.authorize_transaction(tx).unwrap();
    assert_eq!(outcome.decision, AuthorizationDecision::Approved);
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::PreAuthorized
    );

    gateway.capture_transaction(&id, dec!(800.00)).unwrap();
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::Approved
    );
}

#[test]
fn capture_over_authorized_amount_leaves_hold_in_place() {
    let gateway = make_gateway();
    let tx = make_transaction(dec!(800.00), "123 Main St", credit_card());
    let id = tx.id().clone();
    gateway.authorize_transaction(tx).unwrap();

    let result = gateway.capture_transaction(&id, dec!(900.00));
    assert_eq!(result, Err(PaymentError::ExceedsAuthorized));
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::PreAuthorized
    );
}

#[test]
fn void_releases_the_hold() {
    let gateway = make_gateway();
    let tx = make_transaction(dec!(800.00), "123 Main St", credit_card());
    let id = tx.id().clone();
    gateway.authorize_transaction(tx).unwrap();

    gateway.void_transaction(&id).unwrap();
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::Declined
    );
}

#[test]
fn high_risk_authorization_skips_the_hold() {
    let gateway = make_gateway();
    let tx = make_transaction(dec!(1500.00), "Unknown City", wallet());
    let id = tx.id().clone();

    let outcome = gateway.authorize_transaction(tx).unwrap();
    assert_eq!(outcome.decision, AuthorizationDecision::ReviewRequired);
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::FlaggedForReview
    );

    // No hold exists, so capture fails cleanly.
    assert!(matches!(
        gateway.capture_transaction(&id, Decimal::ZERO),
        Err(PaymentError::IllegalTransition { .. })
    ));
}

#[test]
fn processed_transactions_reach_the_store() {
    let store = Arc::new(MemoryStore::new());
    let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new())
        .with_store(Arc::clone(&store) as Arc<dyn PaymentStore>);

    gateway
        .process_transaction(make_transaction(dec!(500.00), "123 Main St", credit_card()))
        .unwrap();
    gateway
        .process_transaction(make_transaction(dec!(1500.00), "Unknown City", wallet()))
        .unwrap();

    let records = store.load_transactions().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, "APPROVED");
    assert_eq!(records[1].status, "FLAGGED_FOR_REVIEW");
    // Instrument numbers are masked at the boundary.
    assert!(records[0].method_details[0].starts_with("****"));

    // The flagged transaction's alert was persisted too.
    let alerts = store.load_fraud_alerts().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, "HIGH");
}

/// A sink that always fails, standing in for a broken backend.
struct BrokenStore;

impl PaymentStore for BrokenStore {
    fn save_transaction(&self, _: &TransactionRecord) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }
    fn load_transactions(&self) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(Vec::new())
    }
    fn save_refund(&self, _: &RefundRecord) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }
    fn load_refunds(&self) -> Result<Vec<RefundRecord>, StoreError> {
        Ok(Vec::new())
    }
    fn save_fraud_alert(&self, _: &FraudAlertRecord) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }
    fn load_fraud_alerts(&self) -> Result<Vec<FraudAlertRecord>, StoreError> {
        Ok(Vec::new())
    }
    fn save_customer(&self, _: &CustomerRecord) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }
    fn load_customers(&self) -> Result<Vec<CustomerRecord>, StoreError> {
        Ok(Vec::new())
    }
}

#[test]
fn store_failure_does_not_roll_back_state() {
    let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new())
        .with_store(Arc::new(BrokenStore));
    let tx = make_transaction(dec!(500.00), "123 Main St", credit_card());
    let id = tx.id().clone();

    let outcome = gateway.process_transaction(tx).unwrap();
    assert_eq!(outcome.decision, AuthorizationDecision::Approved);
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::Approved
    );
    assert_eq!(gateway.log().len(), 1);
}

#[test]
fn gateway_state_survives_a_store_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new())
        .with_store(Arc::clone(&store) as Arc<dyn PaymentStore>);

    let customer = make_customer("123 Main St");
    let merchant = Merchant::new("merch-1", "Widget Shop", "retail");
    store.save_customer(&CustomerRecord::from(&customer)).unwrap();

    let id = gateway
        .process_with_idempotency_key(
            "K1",
            make_transaction(dec!(500.00), "123 Main St", credit_card()),
        )
        .unwrap();
    gateway
        .process_transaction(make_transaction(dec!(1500.00), "Unknown City", wallet()))
        .unwrap();

    // Rebuild a fresh gateway purely from the flat records.
    let customers: HashMap<_, _> = store
        .load_customers()
        .unwrap()
        .iter()
        .map(|record| restore_customer(record).map(|c| (c.id.clone(), c)))
        .collect::<Result<_, _>>()
        .unwrap();
    let merchants = HashMap::from([(merchant.id.clone(), merchant)]);
    let transactions =
        restore_transactions(&store.load_transactions().unwrap(), &customers, &merchants)
            .unwrap();

    let restored_fraud = Arc::new(FraudEngine::new());
    let restored = PaymentGateway::new(Arc::clone(&restored_fraud), BankAuthorizer::new());
    restored.install_transactions(transactions).unwrap();
    restored_fraud.install_alerts(
        restore_fraud_alerts(&store.load_fraud_alerts().unwrap(), restored.log()).unwrap(),
    );

    assert_eq!(restored.log().len(), 2);
    assert_eq!(
        restored.transaction(&id).unwrap().state(),
        TransactionState::Approved
    );
    assert_eq!(restored_fraud.alerts().len(), 1);

    // The restored idempotency map still replays instead of reprocessing.
    let replay = restored
        .process_with_idempotency_key(
            "K1",
            make_transaction(dec!(500.00), "123 Main St", credit_card()),
        )
        .unwrap();
    assert_eq!(replay, id);
    assert_eq!(restored.log().len(), 2);
}
