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

//! Refund manager integration tests: command execution, the ledger
//! credit-back, and refund persistence.

use chrono::{TimeZone, Utc};
use paygate_rs::{
    BankAuthorizer, Customer, CustomerId, FraudEngine, Ledger, MemoryStore, Merchant,
    PaymentError, PaymentGateway, PaymentMethod, PaymentMethodKind, PaymentStore,
    RefundManager, Transaction, TransactionId, TransactionState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn make_customer() -> Customer {
    Customer::new(
        "cust-1",
        "Ada Lovelace",
        "ada@example.com",
        "12 Analytical Way",
        "ada",
        "s3cret",
    )
    .with_balance(PaymentMethodKind::CreditCard, dec!(1000.00))
}

fn make_transaction(amount: Decimal) -> Transaction {
    let merchant = Merchant::new("merch-1", "Widget Shop", "retail");
    let method = PaymentMethod::CreditCard {
        number: "4111111111113456".to_string(),
        holder: "Ada Lovelace".to_string(),
        expiry: "12/27".to_string(),
    };
    Transaction::new(make_customer(), merchant, method, amount)
        .unwrap()
        .with_created_at(Utc.with_ymd_and_hms(2025, 6, 15, 12, 30, 0).unwrap())
}

/// Gateway with one approved transaction in the log, plus the ledger and
/// manager wired together.
fn approved_setup(amount: Decimal) -> (PaymentGateway, RefundManager, Arc<Ledger>, TransactionId) {
    let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new());
    let ledger = Arc::new(Ledger::new());
    ledger.register(make_customer());
    let manager = RefundManager::new(Arc::clone(&ledger));

    let tx = make_transaction(amount);
    let id = tx.id().clone();
    gateway.process_transaction(tx).unwrap();
    (gateway, manager, ledger, id)
}

#[test]
fn full_refund_credits_the_ledger() {
    let (gateway, manager, ledger, id) = approved_setup(dec!(100.00));
    let customer_id = CustomerId("cust-1".to_string());

    let refund = manager
        .process_full_refund(&gateway, &id, "order cancelled")
        .unwrap();
    assert_eq!(refund.amount, dec!(100.00));
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::Refunded
    );
    assert_eq!(
        ledger.balance(&customer_id, PaymentMethodKind::CreditCard),
        dec!(1100.00)
    );
    assert_eq!(manager.refunds().len(), 1);
}

#[test]
fn partial_refund_sequence_closes_out() {
    let (gateway, manager, ledger, id) = approved_setup(dec!(100.00));
    let customer_id = CustomerId("cust-1".to_string());

    manager
        .process_partial_refund(&gateway, &id, dec!(40.00), "damaged item")
        .unwrap();
    let snapshot = gateway.transaction(&id).unwrap();
    assert_eq!(snapshot.state(), TransactionState::PartiallyRefunded);
    assert_eq!(snapshot.remaining_amount(), dec!(60.00));

    manager
        .process_partial_refund(&gateway, &id, dec!(60.00), "remainder")
        .unwrap();
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::Refunded
    );

    // Third refund fails without touching the ledger.
    let result = manager.process_partial_refund(&gateway, &id, dec!(1.00), "again");
    assert!(matches!(
        result,
        Err(PaymentError::IllegalTransition { .. })
    ));
    assert_eq!(
        ledger.balance(&customer_id, PaymentMethodKind::CreditCard),
        dec!(1100.00)
    );
    assert_eq!(manager.refunds().len(), 2);
    assert_eq!(manager.refunded_total(&id), dec!(100.00));
}

#[test]
fn overdraw_fails_without_side_effects() {
    let (gateway, manager, ledger, id) = approved_setup(dec!(100.00));
    let customer_id = CustomerId("cust-1".to_string());

    let result = manager.process_partial_refund(&gateway, &id, dec!(100.01), "too much");
    assert_eq!(result, Err(PaymentError::ExceedsRemaining));

    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::Approved
    );
    assert_eq!(
        ledger.balance(&customer_id, PaymentMethodKind::CreditCard),
        dec!(1000.00)
    );
    assert!(manager.refunds().is_empty());
}

#[test]
fn refund_on_declined_transaction_fails() {
    let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new());
    let ledger = Arc::new(Ledger::new());
    let manager = RefundManager::new(Arc::clone(&ledger));

    // Over the funds heuristic, so the pipeline declines it.
    let tx = make_transaction(dec!(7500.00));
    let id = tx.id().clone();
    gateway.process_transaction(tx).unwrap();
    assert_eq!(
        gateway.transaction(&id).unwrap().state(),
        TransactionState::Declined
    );

    let result = manager.process_full_refund(&gateway, &id, "should fail");
    assert!(matches!(
        result,
        Err(PaymentError::IllegalTransition { .. })
    ));
    assert!(manager.refunds().is_empty());
}

#[test]
fn unknown_transaction_id_fails_cleanly() {
    let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new());
    let manager = RefundManager::new(Arc::new(Ledger::new()));
    let missing = TransactionId("TX-00000000-0000".to_string());

    assert_eq!(
        manager.process_full_refund(&gateway, &missing, "nothing there"),
        Err(PaymentError::TransactionNotFound)
    );
}

#[test]
fn refund_credit_upserts_an_unregistered_customer() {
    let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new());
    let ledger = Arc::new(Ledger::new());
    let manager = RefundManager::new(Arc::clone(&ledger));

    let tx = make_transaction(dec!(100.00));
    let id = tx.id().clone();
    gateway.process_transaction(tx).unwrap();

    // The customer was never registered; the credit creates the account
    // from the transaction's snapshot.
    manager
        .process_full_refund(&gateway, &id, "order cancelled")
        .unwrap();
    let customer_id = CustomerId("cust-1".to_string());
    assert!(ledger.contains(&customer_id));
    // Snapshot balance (1000.00) plus the credited refund.
    assert_eq!(
        ledger.balance(&customer_id, PaymentMethodKind::CreditCard),
        dec!(1100.00)
    );
}

#[test]
fn refunds_and_updated_transactions_reach_the_store() {
    let store = Arc::new(MemoryStore::new());
    let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new())
        .with_store(Arc::clone(&store) as Arc<dyn PaymentStore>);
    let ledger = Arc::new(Ledger::new());
    let manager = RefundManager::new(Arc::clone(&ledger));

    let tx = make_transaction(dec!(100.00));
    let id = tx.id().clone();
    gateway.process_transaction(tx).unwrap();
    manager
        .process_partial_refund(&gateway, &id, dec!(25.00), "damaged item")
        .unwrap();

    let refunds = store.load_refunds().unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].transaction_id, id);
    assert_eq!(refunds[0].amount, dec!(25.00));
    assert_eq!(refunds[0].reason, "damaged item");

    // The re-saved transaction snapshot reflects the refund.
    let records = store.load_transactions().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, "PARTIALLY_REFUNDED");
    assert_eq!(records[0].refunded, dec!(25.00));
}

#[test]
fn observers_hear_about_refunds() {
    let gateway = PaymentGateway::new(Arc::new(FraudEngine::new()), BankAuthorizer::new());
    let ledger = Arc::new(Ledger::new());
    let manager = RefundManager::new(Arc::clone(&ledger));

    let states: Arc<parking_lot::Mutex<Vec<TransactionState>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    gateway.register_observer("report", move |tx| sink.lock().push(tx.state()));

    let tx = make_transaction(dec!(100.00));
    let id = tx.id().clone();
    gateway.process_transaction(tx).unwrap();
    manager
        .process_full_refund(&gateway, &id, "order cancelled")
        .unwrap();

    assert_eq!(
        *states.lock(),
        vec![TransactionState::Approved, TransactionState::Refunded]
    );
}
