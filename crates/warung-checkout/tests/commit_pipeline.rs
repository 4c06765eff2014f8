//! End-to-end tests for the sale-commit pipeline: cart in, durable
//! transaction out, ledgers and aggregates in agreement afterwards.

use chrono::Utc;
use uuid::Uuid;

use warung_checkout::{CheckoutEngine, CommitError, EngineConfig};
use warung_core::{
    Cart, CashCategory, CashDirection, Customer, MovementReason, PaymentMethod, Product,
    PropagationStep,
};
use warung_db::{Database, DbConfig};

// =============================================================================
// Helpers
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

async fn engine() -> (CheckoutEngine, Database) {
    init_tracing();
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    (CheckoutEngine::new(db.clone(), EngineConfig::default()), db)
}

/// File-backed database so multiple pooled connections can genuinely
/// race (a `:memory:` pool is limited to a single connection).
async fn engine_on_disk() -> (CheckoutEngine, Database) {
    init_tracing();
    let path = std::env::temp_dir().join(format!("warung-test-{}.db", Uuid::new_v4()));
    let db = Database::new(DbConfig::new(path)).await.unwrap();
    (CheckoutEngine::new(db.clone(), EngineConfig::default()), db)
}

async fn seed_product(db: &Database, sku: &str, unit_price: i64, stock: i64) -> Product {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        unit_price,
        stock,
        min_stock: 2,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.products().insert(&product).await.unwrap();
    product
}

async fn seed_customer(db: &Database, lifetime_spend: i64, transaction_count: i64) -> Customer {
    let now = Utc::now();
    let customer = Customer {
        id: Uuid::new_v4().to_string(),
        name: "Bu Sari".into(),
        phone: None,
        transaction_count,
        lifetime_spend,
        created_at: now,
        updated_at: now,
    };
    db.customers().insert(&customer).await.unwrap();
    customer
}

// =============================================================================
// The happy path
// =============================================================================

#[tokio::test]
async fn cash_sale_commits_and_propagates_everywhere() {
    let (engine, db) = engine().await;
    let product = seed_product(&db, "SUSU-KOTAK", 10_000, 10).await;

    let mut cart = Cart::new("kasir-1");
    cart.add_line(&product, 2).unwrap();
    cart.set_payment_method(PaymentMethod::Cash);

    let receipt = engine.commit_sale(&cart).await.unwrap();

    // Pricing: 20.000 subtotal, 10% tax, no discount
    assert_eq!(receipt.subtotal, 20_000);
    assert_eq!(receipt.tax, 2_000);
    assert_eq!(receipt.discount, 0);
    assert_eq!(receipt.total, 22_000);
    assert_eq!(receipt.line_count, 1);

    // Durable transaction with its lines
    let stored = db
        .transactions()
        .find_by_number(&receipt.transaction_number)
        .await
        .unwrap()
        .expect("transaction persisted");
    assert_eq!(stored.total, 22_000);
    let lines = db.transactions().lines_for(&stored.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(lines[0].unit_price, 10_000);

    // Stock decremented through the ledger, cache in sync
    assert_eq!(db.stock_ledger().current_stock(&product.id).await.unwrap(), 8);
    let movement = db
        .stock_ledger()
        .latest_movement(&product.id)
        .await
        .unwrap()
        .expect("sale movement recorded");
    assert_eq!(movement.quantity, 2);
    assert_eq!(movement.stock_before, 10);
    assert_eq!(movement.stock_after, 8);
    assert_eq!(movement.transaction_id.as_deref(), Some(stored.id.as_str()));

    // Exactly one cash entry for the full total, referencing the sale
    let entries = db
        .cash_ledger()
        .entries_for_day(Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].direction, CashDirection::In);
    assert_eq!(entries[0].category, CashCategory::Sale);
    assert_eq!(entries[0].amount, 22_000);
    assert_eq!(entries[0].transaction_id.as_deref(), Some(stored.id.as_str()));

    // Nothing left for the operator
    assert!(engine.propagation_failures().await.unwrap().is_empty());
    assert!(engine.stock_drift().await.unwrap().is_empty());

    // The persisted totals re-derive from the lines
    engine.verify_transaction(&stored.id).await.unwrap();
}

#[tokio::test]
async fn non_cash_sale_produces_no_cash_entry() {
    let (engine, db) = engine().await;
    let product = seed_product(&db, "KOPI-BUBUK", 15_000, 5).await;

    let mut cart = Cart::new("kasir-1");
    cart.add_line(&product, 1).unwrap();
    cart.set_payment_method(PaymentMethod::Qris);

    engine.commit_sale(&cart).await.unwrap();

    let entries = db
        .cash_ledger()
        .entries_for_day(Utc::now().date_naive())
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn customer_sale_updates_the_aggregate() {
    let (engine, db) = engine().await;
    let product = seed_product(&db, "SUSU-KOTAK", 10_000, 10).await;
    let customer = seed_customer(&db, 100_000, 7).await;

    let mut cart = Cart::new("kasir-1");
    cart.add_line(&product, 2).unwrap();
    cart.attach_customer(&customer.id);

    engine.commit_sale(&cart).await.unwrap();

    let updated = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
    assert_eq!(updated.lifetime_spend, 122_000);
    assert_eq!(updated.transaction_count, 8);
}

// =============================================================================
// Idempotency
// =============================================================================

#[tokio::test]
async fn resubmitting_the_same_number_creates_no_duplicate() {
    let (engine, db) = engine().await;
    let product = seed_product(&db, "TELUR", 2_500, 30).await;
    let customer = seed_customer(&db, 0, 0).await;

    let mut cart = Cart::new("kasir-1");
    cart.add_line(&product, 4).unwrap();
    cart.attach_customer(&customer.id);

    let first = engine.commit_sale_as(&cart, "TRX-IDEM-1").await.unwrap();
    let second = engine.commit_sale_as(&cart, "TRX-IDEM-1").await.unwrap();

    assert_eq!(first.transaction_id, second.transaction_id);
    assert_eq!(first.total, second.total);

    // One transaction, one decrement, one cash entry, one aggregate bump
    assert_eq!(db.transactions().count().await.unwrap(), 1);
    assert_eq!(db.stock_ledger().current_stock(&product.id).await.unwrap(), 26);
    let entries = db
        .cash_ledger()
        .entries_for_day(Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    let updated = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
    assert_eq!(updated.transaction_count, 1);
}

// =============================================================================
// Failure semantics
// =============================================================================

#[tokio::test]
async fn empty_cart_is_rejected_before_any_write() {
    let (engine, db) = engine().await;

    let cart = Cart::new("kasir-1");
    let err = engine.commit_sale(&cart).await.unwrap_err();

    assert!(matches!(err, CommitError::Validation(_)));
    assert_eq!(db.transactions().count().await.unwrap(), 0);
}

#[tokio::test]
async fn stock_shortfall_at_commit_aborts_the_whole_sale() {
    let (engine, db) = engine().await;
    let product = seed_product(&db, "MIE-CUP", 6_000, 5).await;

    // Cart accepted 5 while stock was 5...
    let mut cart = Cart::new("kasir-1");
    cart.add_line(&product, 5).unwrap();

    // ...but 3 units vanish before the cashier hits pay
    engine
        .record_stock_adjustment(&product.id, -3, MovementReason::Correction, "kasir-1")
        .await
        .unwrap();

    let err = engine.commit_sale(&cart).await.unwrap_err();
    match err {
        CommitError::OutOfStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 2);
            assert_eq!(requested, 5);
        }
        other => panic!("expected OutOfStock, got {other}"),
    }

    // No partial transaction, no sale movement, no cash entry
    assert_eq!(db.transactions().count().await.unwrap(), 0);
    assert_eq!(db.stock_ledger().current_stock(&product.id).await.unwrap(), 2);
    assert!(db
        .cash_ledger()
        .entries_for_day(Utc::now().date_naive())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn clamped_cart_commits_with_the_clamped_quantity() {
    let (engine, db) = engine().await;
    let product = seed_product(&db, "SABUN", 4_000, 3).await;

    let mut cart = Cart::new("kasir-1");
    let check = cart.add_line(&product, 5).unwrap();
    assert!(check.clamped);
    assert_eq!(check.accepted, 3);

    let receipt = engine.commit_sale(&cart).await.unwrap();
    assert_eq!(receipt.subtotal, 12_000);
    assert_eq!(db.stock_ledger().current_stock(&product.id).await.unwrap(), 0);
}

#[tokio::test]
async fn propagation_failure_never_fails_the_commit() {
    let (engine, db) = engine().await;
    let product = seed_product(&db, "GULA", 14_000, 10).await;

    // Customer attached in the cart but missing from the store: the
    // aggregate update is doomed, the sale must stand anyway.
    let mut cart = Cart::new("kasir-1");
    cart.add_line(&product, 1).unwrap();
    cart.attach_customer("no-such-customer");

    let receipt = engine.commit_sale(&cart).await.unwrap();

    // The sale is durable and the cashier saw a receipt
    assert_eq!(db.transactions().count().await.unwrap(), 1);

    // The miss is queued for the operator
    let failures = engine.propagation_failures().await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].step, PropagationStep::CustomerAggregate);
    assert_eq!(failures[0].transaction_number, receipt.transaction_number);

    engine
        .resolve_propagation_failure(&failures[0].id)
        .await
        .unwrap();
    assert!(engine.propagation_failures().await.unwrap().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn concurrent_commits_for_the_last_unit_produce_one_winner() {
    let (engine, db) = engine_on_disk().await;
    let product = seed_product(&db, "LAST-ONE", 50_000, 1).await;

    let make_cart = || {
        let mut cart = Cart::new("kasir-1");
        cart.add_line(&product, 1).unwrap();
        cart
    };

    let engine_a = engine.clone();
    let engine_b = engine.clone();
    let cart_a = make_cart();
    let cart_b = make_cart();

    let (result_a, result_b) = tokio::join!(
        tokio::spawn(async move { engine_a.commit_sale(&cart_a).await }),
        tokio::spawn(async move { engine_b.commit_sale(&cart_b).await }),
    );
    let results = [result_a.unwrap(), result_b.unwrap()];

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let out_of_stock = results
        .iter()
        .filter(|r| matches!(r, Err(CommitError::OutOfStock { .. })))
        .count();

    assert_eq!(winners, 1, "exactly one commit must win");
    assert_eq!(out_of_stock, 1, "the loser must see OutOfStock");

    // Never negative, never oversold
    assert_eq!(db.stock_ledger().current_stock(&product.id).await.unwrap(), 0);
    assert_eq!(db.transactions().count().await.unwrap(), 1);
    assert!(engine.stock_drift().await.unwrap().is_empty());
}

// =============================================================================
// The daily cash book
// =============================================================================

#[tokio::test]
async fn daily_summary_folds_float_sales_and_expenses() {
    let (engine, db) = engine().await;
    let product = seed_product(&db, "BERAS", 10_000, 20).await;

    engine.open_cash_day(100_000, "kasir-1").await.unwrap();

    let mut cart = Cart::new("kasir-1");
    cart.add_line(&product, 2).unwrap();
    engine.commit_sale(&cart).await.unwrap();

    engine
        .record_cash_entry(
            CashDirection::Out,
            15_000,
            CashCategory::Expense,
            "beli galon",
            "kasir-1",
        )
        .await
        .unwrap();

    let summary = engine
        .daily_cash_summary(Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(summary.total_in, 122_000); // float + sale
    assert_eq!(summary.total_out, 15_000);
    assert_eq!(summary.net, 107_000);
    assert_eq!(summary.closing_balance, 107_000);
    assert_eq!(summary.entry_count, 3);

    // Replaying the stored entries reproduces every running balance
    let entries = db
        .cash_ledger()
        .entries_for_day(Utc::now().date_naive())
        .await
        .unwrap();
    let mut running = 0;
    for entry in &entries {
        running += entry.signed_amount();
        assert_eq!(entry.balance, running);
    }
}

// =============================================================================
// Stock operations through the facade
// =============================================================================

#[tokio::test]
async fn adjustments_and_restocks_keep_the_ledger_consistent() {
    let (engine, db) = engine().await;
    let product = seed_product(&db, "KECAP", 12_000, 10).await;

    engine
        .record_stock_adjustment(&product.id, -4, MovementReason::Damage, "kasir-1")
        .await
        .unwrap();
    engine.record_restock(&product.id, 6, "kasir-1").await.unwrap();

    assert_eq!(db.stock_ledger().current_stock(&product.id).await.unwrap(), 12);
    assert_eq!(db.stock_ledger().sum_signed(&product.id).await.unwrap(), 2);
    assert!(engine.stock_drift().await.unwrap().is_empty());

    // An adjustment below zero is refused
    let err = engine
        .record_stock_adjustment(&product.id, -20, MovementReason::Loss, "kasir-1")
        .await
        .unwrap_err();
    assert!(matches!(err, CommitError::OutOfStock { .. }));
}

#[tokio::test]
async fn low_stock_alert_lists_products_at_threshold() {
    let (engine, db) = engine().await;
    // min_stock is 2 in the seed helper
    let product = seed_product(&db, "SAMPO", 1_000, 3).await;

    assert!(engine.low_stock().await.unwrap().is_empty());

    let mut cart = Cart::new("kasir-1");
    cart.add_line(&product, 1).unwrap();
    engine.commit_sale(&cart).await.unwrap();

    let alerts = engine.low_stock().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].sku, "SAMPO");
}
