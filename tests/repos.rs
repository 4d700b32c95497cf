//! Repo round-trips against a live PostgreSQL pointed at by DATABASE_URL.
//! Ignored by default; run with `cargo test -- --ignored` next to a database.

use bb8_postgres::PostgresConnectionManager;
use tokio_postgres::NoTls;

use flocon_orders_lib::errors::RepoError;
use flocon_orders_lib::migrations;
use flocon_orders_lib::models::*;
use flocon_orders_lib::repos;
use flocon_orders_lib::repos::*;
use flocon_orders_lib::types::DbPool;

async fn prepare_pool() -> DbPool {
    let dsn = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let manager = PostgresConnectionManager::new_from_stringlike(dsn, NoTls).unwrap();
    let pool = bb8::Pool::builder().build(manager).await.unwrap();
    migrations::run(&pool).await.unwrap();
    pool
}

fn cart_item(product_id: i32) -> CartItem {
    CartItem {
        product_id: ProductId(product_id),
        quantity: 1,
        price: ProductPrice(34.9),
        name: "Boule à neige".to_string(),
        image: "https://img.flocon.example/5555.jpg".to_string(),
        description: None,
    }
}

fn order_inserter(session: &str) -> OrderInserter {
    OrderInserter {
        strategy: OrderMergeStrategy::ProviderSessionUpsert,
        id: OrderId::new(),
        customer: CustomerId(990001),
        state: OrderState::Paid,
        payment_status: PaymentStatus::Paid,
        payment_method: PaymentMethod::Card,
        fst_status: None,
        total: ProductPrice(69.8),
        products: vec![],
        address: ShippingAddress {
            name: "Marie Dupont".to_string(),
            email: "marie@example.com".to_string(),
            phone: None,
            address: "12 rue des Lilas".to_string(),
            city: "Lyon".to_string(),
            postal_code: "69003".to_string(),
            country: "France".to_string(),
        },
        provider_session: Some(ProviderSessionId(session.to_string())),
    }
}

#[tokio::test]
#[ignore]
async fn cart_lines_merge_instead_of_duplicating() {
    let pool = prepare_pool().await;
    let repo = repos::cart_item::make_repo();
    let customer = CustomerId(990001);

    let mut conn = pool.get().await.unwrap();
    // Never committed: the database is left untouched.
    let tx = conn.transaction().await.unwrap();

    repo.insert(
        &tx,
        CartItemInserter {
            strategy: CartItemMergeStrategy::Incrementer,
            customer,
            data: cart_item(5555),
        },
    )
    .await
    .unwrap();
    repo.insert(
        &tx,
        CartItemInserter {
            strategy: CartItemMergeStrategy::Incrementer,
            customer,
            data: cart_item(5555),
        },
    )
    .await
    .unwrap();

    let items = repo
        .select(
            &tx,
            CartItemFilter {
                customer: Some(customer),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
}

#[tokio::test]
#[ignore]
async fn orders_are_unique_per_provider_session() {
    let pool = prepare_pool().await;
    let repo = repos::order::make_repo();
    let session = format!("cs_test_{}", uuid::Uuid::new_v4());

    let mut conn = pool.get().await.unwrap();
    let tx = conn.transaction().await.unwrap();

    let first = repo.insert_exactly_one(&tx, order_inserter(&session)).await.unwrap();

    // A second completed-payment write for the same session hits the paid
    // guard and comes back empty instead of creating a duplicate row.
    match repo.insert_exactly_one(&tx, order_inserter(&session)).await {
        Err(RepoError::NotFound) => {}
        other => panic!("Expected the upsert guard to reject the duplicate, got {:?}", other.map(|o| o.slug)),
    }

    let orders = repo
        .select(&tx, OrderFilter::from(ProviderSessionId(session.clone())))
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, first.id);
}
