use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum_storefront_api::{
    db::{create_orm_conn, run_migrations},
    dto::checkout::{AddressInput, CheckoutRequest, LineItemInput},
    entity::{
        addresses::{Column as AddressCol, Entity as Addresses},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders, PaymentMethod, PaymentStatus, OrderStatus},
        product_variants, products, shipping_methods,
        product_variants::Entity as ProductVariants,
        users,
    },
    error::AppError,
    mailer::{LogNotifier, MailError, Notifier},
    middleware::auth::AuthUser,
    services::checkout_service,
    state::AppState,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

// Integration tests for the order-placement flow. They are skipped unless a
// database is configured in the environment (CI provides TEST_DATABASE_URL,
// local runs skip silently).
async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    Ok(Some(AppState {
        orm,
        notifier: Arc::new(LogNotifier),
    }))
}

fn short_tag() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

async fn seed_product(
    state: &AppState,
    price: Decimal,
    variant_stock: Option<i32>,
) -> anyhow::Result<(products::Model, Option<product_variants::Model>)> {
    let tag = short_tag();
    let product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Widget {tag}")),
        description: Set(Some("A product for testing".into())),
        sku: Set(format!("WID-{tag}")),
        price: Set(price),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let variant = match variant_stock {
        Some(stock) => Some(
            product_variants::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product.id),
                sku: Set(format!("WID-{tag}-M")),
                attributes: Set(serde_json::json!({ "size": "M" })),
                price: Set(None),
                stock: Set(stock),
                created_at: NotSet,
            }
            .insert(&state.orm)
            .await?,
        ),
        None => None,
    };

    Ok((product, variant))
}

async fn seed_shipping_method(
    state: &AppState,
    base_price: Decimal,
    free_above: Option<Decimal>,
    is_active: bool,
) -> anyhow::Result<shipping_methods::Model> {
    Ok(shipping_methods::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("Standard {}", short_tag())),
        base_price: Set(base_price),
        free_above: Set(free_above),
        is_active: Set(is_active),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?)
}

async fn seed_user(state: &AppState, role: &str) -> anyhow::Result<users::Model> {
    Ok(users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(format!("buyer-{}@example.com", short_tag())),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?)
}

fn checkout_request(
    email: Option<&str>,
    first_name: &str,
    shipping_method_id: Uuid,
    items: Vec<LineItemInput>,
) -> CheckoutRequest {
    CheckoutRequest {
        email: email.map(str::to_string),
        name: email.map(|_| "Guest Buyer".to_string()),
        address: AddressInput {
            first_name: first_name.into(),
            last_name: "Tester".into(),
            address1: "1 Integration Way".into(),
            address2: None,
            city: "Testville".into(),
            state: "TS".into(),
            postal_code: "12345".into(),
            country: "US".into(),
            phone: "+1 555 0100".into(),
        },
        shipping_method_id,
        payment_method: PaymentMethod::Cod,
        items,
    }
}

fn line(product_id: Uuid, variant_id: Option<Uuid>, quantity: i32) -> LineItemInput {
    LineItemInput {
        product_id,
        variant_id,
        quantity,
        // Display hints from the client cart; the service must ignore them.
        name: Some("Client Says Free".into()),
        attributes: Some(serde_json::json!({ "size": "client-picked" })),
    }
}

#[tokio::test]
async fn guest_checkout_snapshots_catalog_price_and_decrements_stock() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let (product, variant) = seed_product(&state, dec!(10.00), Some(5)).await?;
    let variant = variant.expect("variant seeded");
    let method = seed_shipping_method(&state, dec!(4.99), Some(dec!(50.00)), true).await?;

    let guest_email = format!("guest-{}@example.com", short_tag());
    let resp = checkout_service::place_order(
        &state,
        None,
        checkout_request(
            Some(&guest_email),
            "Ada",
            method.id,
            vec![line(product.id, Some(variant.id), 2)],
        ),
    )
    .await?;

    let placed = resp.data.expect("checkout data");
    assert_eq!(placed.subtotal, dec!(20.00));
    assert_eq!(placed.shipping_cost, dec!(4.99));
    assert_eq!(placed.total, dec!(24.99));
    assert!(placed.order_number.starts_with("ORD-"));

    let order = Orders::find_by_id(placed.order_id)
        .one(&state.orm)
        .await?
        .expect("order persisted");
    assert_eq!(order.user_id, None);
    assert_eq!(order.guest_email.as_deref(), Some(guest_email.as_str()));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.shipping_address_id, order.billing_address_id);

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?;
    assert_eq!(items.len(), 1);
    // Snapshot comes from the catalog, never from the client hints.
    assert_eq!(items[0].price, dec!(10.00));
    assert_eq!(items[0].name, product.name);
    assert_eq!(items[0].sku, variant.sku);
    assert_eq!(
        items[0].variant_info,
        Some(serde_json::json!({ "size": "M" }))
    );

    let remaining = ProductVariants::find_by_id(variant.id)
        .one(&state.orm)
        .await?
        .expect("variant");
    assert_eq!(remaining.stock, 3);

    Ok(())
}

#[tokio::test]
async fn account_checkout_sets_user_identity() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user = seed_user(&state, "user").await?;
    let (product, variant) = seed_product(&state, dec!(15.00), Some(4)).await?;
    let method = seed_shipping_method(&state, dec!(4.99), None, true).await?;

    let auth = AuthUser {
        user_id: user.id,
        role: "user".into(),
    };
    // The body email must be ignored for account checkouts.
    let resp = checkout_service::place_order(
        &state,
        Some(&auth),
        checkout_request(
            Some("ignored@example.com"),
            "Grace",
            method.id,
            vec![line(product.id, variant.map(|v| v.id), 1)],
        ),
    )
    .await?;

    let placed = resp.data.expect("checkout data");
    let order = Orders::find_by_id(placed.order_id)
        .one(&state.orm)
        .await?
        .expect("order persisted");
    assert_eq!(order.user_id, Some(user.id));
    assert_eq!(order.guest_email, None);
    assert_eq!(order.guest_name, None);

    Ok(())
}

#[tokio::test]
async fn subtotal_at_free_shipping_threshold_ships_free() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let method = seed_shipping_method(&state, dec!(4.99), Some(dec!(50.00)), true).await?;

    // Exactly at the threshold: free.
    let (at_threshold, _) = seed_product(&state, dec!(25.00), None).await?;
    let resp = checkout_service::place_order(
        &state,
        None,
        checkout_request(
            Some(&format!("guest-{}@example.com", short_tag())),
            "Freya",
            method.id,
            vec![line(at_threshold.id, None, 2)],
        ),
    )
    .await?;
    let placed = resp.data.expect("checkout data");
    assert_eq!(placed.subtotal, dec!(50.00));
    assert_eq!(placed.shipping_cost, Decimal::ZERO);
    assert_eq!(placed.total, dec!(50.00));

    // One cent below: base price applies.
    let (below_threshold, _) = seed_product(&state, dec!(49.99), None).await?;
    let resp = checkout_service::place_order(
        &state,
        None,
        checkout_request(
            Some(&format!("guest-{}@example.com", short_tag())),
            "Freya",
            method.id,
            vec![line(below_threshold.id, None, 1)],
        ),
    )
    .await?;
    let placed = resp.data.expect("checkout data");
    assert_eq!(placed.shipping_cost, dec!(4.99));
    assert_eq!(placed.total, dec!(54.98));

    Ok(())
}

#[tokio::test]
async fn insufficient_stock_rejects_the_whole_checkout() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let (in_stock, in_stock_variant) = seed_product(&state, dec!(10.00), Some(5)).await?;
    let (scarce, scarce_variant) = seed_product(&state, dec!(20.00), Some(2)).await?;
    let in_stock_variant = in_stock_variant.expect("variant");
    let scarce_variant = scarce_variant.expect("variant");
    let method = seed_shipping_method(&state, dec!(4.99), None, true).await?;

    let guest_email = format!("guest-{}@example.com", short_tag());
    let first_name = format!("Atomic{}", short_tag());
    let err = checkout_service::place_order(
        &state,
        None,
        checkout_request(
            Some(&guest_email),
            &first_name,
            method.id,
            vec![
                line(in_stock.id, Some(in_stock_variant.id), 1),
                line(scarce.id, Some(scarce_variant.id), 3),
            ],
        ),
    )
    .await
    .unwrap_err();

    match err {
        AppError::StockConflict(name) => assert_eq!(name, scarce.name),
        other => panic!("expected stock conflict, got {other:?}"),
    }

    // Nothing from the rejected request may persist.
    let orders = Orders::find()
        .filter(OrderCol::GuestEmail.eq(guest_email))
        .count(&state.orm)
        .await?;
    assert_eq!(orders, 0);

    let addresses = Addresses::find()
        .filter(AddressCol::FirstName.eq(first_name))
        .count(&state.orm)
        .await?;
    assert_eq!(addresses, 0);

    for (variant_id, expected) in [(in_stock_variant.id, 5), (scarce_variant.id, 2)] {
        let variant = ProductVariants::find_by_id(variant_id)
            .one(&state.orm)
            .await?
            .expect("variant");
        assert_eq!(variant.stock, expected);
    }

    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_do_not_oversell_the_last_unit() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let (product, variant) = seed_product(&state, dec!(30.00), Some(1)).await?;
    let variant = variant.expect("variant");
    let method = seed_shipping_method(&state, dec!(4.99), None, true).await?;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let state = state.clone();
        let request = checkout_request(
            Some(&format!("guest-{}@example.com", short_tag())),
            "Racer",
            method.id,
            vec![line(product.id, Some(variant.id), 1)],
        );
        handles.push(tokio::spawn(async move {
            checkout_service::place_order(&state, None, request).await
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => successes += 1,
            Err(AppError::StockConflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error under contention: {other:?}"),
        }
    }
    assert_eq!(successes, 1, "exactly one checkout must win the last unit");
    assert_eq!(conflicts, 1);

    let remaining = ProductVariants::find_by_id(variant.id)
        .one(&state.orm)
        .await?
        .expect("variant");
    assert_eq!(remaining.stock, 0);

    let sold = OrderItems::find()
        .filter(OrderItemCol::VariantId.eq(variant.id))
        .count(&state.orm)
        .await?;
    assert_eq!(sold, 1);

    Ok(())
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _to: &str, _subject: &str, _html: &str) -> Result<(), MailError> {
        Err(MailError::InvalidAddress("transport is down".into()))
    }
}

struct CountingNotifier {
    sent: AtomicUsize,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn send(&self, _to: &str, _subject: &str, _html: &str) -> Result<(), MailError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn failed_confirmation_email_does_not_fail_the_checkout() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let state = AppState {
        notifier: Arc::new(FailingNotifier),
        ..state
    };

    let (product, variant) = seed_product(&state, dec!(10.00), Some(3)).await?;
    let method = seed_shipping_method(&state, dec!(4.99), None, true).await?;

    let resp = checkout_service::place_order(
        &state,
        None,
        checkout_request(
            Some(&format!("guest-{}@example.com", short_tag())),
            "Stoic",
            method.id,
            vec![line(product.id, variant.map(|v| v.id), 1)],
        ),
    )
    .await?;

    let placed = resp.data.expect("checkout data");
    let order = Orders::find_by_id(placed.order_id).one(&state.orm).await?;
    assert!(order.is_some(), "order must persist despite notifier failure");

    Ok(())
}

#[tokio::test]
async fn successful_checkout_sends_one_confirmation() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let counting = Arc::new(CountingNotifier {
        sent: AtomicUsize::new(0),
    });
    let state = AppState {
        notifier: counting.clone(),
        ..state
    };

    let (product, _) = seed_product(&state, dec!(10.00), None).await?;
    let method = seed_shipping_method(&state, dec!(4.99), None, true).await?;

    checkout_service::place_order(
        &state,
        None,
        checkout_request(
            Some(&format!("guest-{}@example.com", short_tag())),
            "Mailer",
            method.id,
            vec![line(product.id, None, 1)],
        ),
    )
    .await?;

    assert_eq!(counting.sent.load(Ordering::SeqCst), 1);

    Ok(())
}

#[tokio::test]
async fn inactive_shipping_method_is_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let (product, _) = seed_product(&state, dec!(10.00), None).await?;
    let method = seed_shipping_method(&state, dec!(4.99), None, false).await?;

    let guest_email = format!("guest-{}@example.com", short_tag());
    let err = checkout_service::place_order(
        &state,
        None,
        checkout_request(
            Some(&guest_email),
            "Rejected",
            method.id,
            vec![line(product.id, None, 1)],
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let orders = Orders::find()
        .filter(OrderCol::GuestEmail.eq(guest_email))
        .count(&state.orm)
        .await?;
    assert_eq!(orders, 0);

    Ok(())
}
