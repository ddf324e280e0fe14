use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect,
    Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::checkout::{CheckoutRequest, CheckoutResponse, LineItemInput},
    entity::{
        addresses::ActiveModel as AddressActive,
        order_items::ActiveModel as OrderItemActive,
        orders::{ActiveModel as OrderActive, Model as OrderModel, OrderStatus, PaymentStatus},
        product_variants::{Column as VariantCol, Entity as ProductVariants},
        products::Entity as Products,
        shipping_methods::{Column as ShippingCol, Entity as ShippingMethods},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::shipping_service,
    state::AppState,
};

/// Upper bound on the persistence transaction. Hitting it fails the checkout
/// with a full rollback; nothing is partially committed.
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

/// Order numbers carry little entropy, so a collision aborts the insert via
/// the unique index and the whole transaction is retried with a fresh number.
const ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// A requested line reconciled against the catalog. Price, sku, name and
/// variant attributes come from the store, never from the request body.
#[derive(Debug, Clone)]
pub struct ValidatedLineItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub variant_info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}

pub fn line_subtotal(items: &[ValidatedLineItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.unit_price * Decimal::from(item.quantity))
        .sum()
}

/// Deterministic; discount and tax are carried as zero in this flow.
pub fn compute_totals(items: &[ValidatedLineItem], shipping_cost: Decimal) -> OrderTotals {
    let subtotal = line_subtotal(items);
    OrderTotals {
        subtotal,
        shipping_cost,
        total: subtotal + shipping_cost,
    }
}

pub async fn place_order(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    validate_request(&payload, user.is_some())?;

    let mut attempt = 0;
    let (order, contact_email, items) = loop {
        attempt += 1;
        let outcome = tokio::time::timeout(CHECKOUT_TIMEOUT, place_order_txn(state, user, &payload))
            .await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("checkout transaction timed out")))?;

        match outcome {
            Ok(placed) => break placed,
            Err(err) if is_order_number_collision(&err) && attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::warn!(attempt, "order number collision, retrying with a fresh number");
                continue;
            }
            Err(err) => return Err(err),
        }
    };

    if let Err(err) = log_audit(
        &state.orm,
        order.user_id,
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "order_number": order.order_number })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    // Post-commit, best effort: the order already exists, so a failed
    // confirmation email is logged and swallowed.
    let (subject, html) = confirmation_email(&order, &items);
    if let Err(err) = state.notifier.send(&contact_email, &subject, &html).await {
        tracing::warn!(
            error = %err,
            order_number = %order.order_number,
            "order confirmation email failed"
        );
    }

    Ok(ApiResponse::success(
        "Order placed",
        CheckoutResponse {
            order_id: order.id,
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            subtotal: order.subtotal,
            shipping_cost: order.shipping_cost,
            total: order.total,
        },
        Some(Meta::empty()),
    ))
}

/// The atomic unit: address, order, items and stock decrements all commit
/// together or not at all. Any early return rolls the transaction back.
async fn place_order_txn(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: &CheckoutRequest,
) -> AppResult<(OrderModel, String, Vec<ValidatedLineItem>)> {
    let txn = state.orm.begin().await?;

    // Account checkouts take the email from the user row; guests from the
    // request body. The two identities are mutually exclusive on the order.
    let (user_id, guest_email, guest_name, contact_email) = match user {
        Some(auth) => {
            let account = Users::find_by_id(auth.user_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::BadRequest("Unknown user".into()))?;
            (Some(account.id), None, None, account.email)
        }
        None => {
            let email = payload.email.clone().unwrap_or_default();
            (None, Some(email.clone()), payload.name.clone(), email)
        }
    };

    let validated = validate_items(&txn, &payload.items).await?;

    let method = ShippingMethods::find_by_id(payload.shipping_method_id)
        .filter(ShippingCol::IsActive.eq(true))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::BadRequest("Shipping method unavailable".into()))?;

    let shipping_cost = shipping_service::quote(&method, line_subtotal(&validated));
    let totals = compute_totals(&validated, shipping_cost);

    // One address row, referenced as both shipping and billing.
    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        first_name: Set(payload.address.first_name.clone()),
        last_name: Set(payload.address.last_name.clone()),
        address1: Set(payload.address.address1.clone()),
        address2: Set(payload.address.address2.clone()),
        city: Set(payload.address.city.clone()),
        state: Set(payload.address.state.clone()),
        postal_code: Set(payload.address.postal_code.clone()),
        country: Set(payload.address.country.clone()),
        phone: Set(payload.address.phone.clone()),
        user_id: Set(user_id),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(build_order_number(order_id)),
        user_id: Set(user_id),
        guest_email: Set(guest_email),
        guest_name: Set(guest_name),
        status: Set(OrderStatus::Pending),
        payment_status: Set(PaymentStatus::Pending),
        payment_method: Set(payload.payment_method),
        subtotal: Set(totals.subtotal),
        shipping_cost: Set(totals.shipping_cost),
        discount: Set(Decimal::ZERO),
        tax: Set(Decimal::ZERO),
        total: Set(totals.total),
        shipping_address_id: Set(address.id),
        billing_address_id: Set(address.id),
        shipping_method_id: Set(method.id),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for line in &validated {
        OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            variant_id: Set(line.variant_id),
            sku: Set(line.sku.clone()),
            name: Set(line.name.clone()),
            price: Set(line.unit_price),
            quantity: Set(line.quantity),
            variant_info: Set(line.variant_info.clone()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        // The stock check is repeated inside the WHERE clause: a concurrent
        // checkout that already took the last units leaves zero rows to
        // update, and this transaction rolls back instead of overselling.
        if let Some(variant_id) = line.variant_id {
            let updated = ProductVariants::update_many()
                .col_expr(
                    VariantCol::Stock,
                    Expr::col(VariantCol::Stock).sub(line.quantity),
                )
                .filter(VariantCol::Id.eq(variant_id))
                .filter(VariantCol::Stock.gte(line.quantity))
                .exec(&txn)
                .await?;

            if updated.rows_affected == 0 {
                return Err(AppError::StockConflict(line.name.clone()));
            }
        }
    }

    txn.commit().await?;

    Ok((order, contact_email, validated))
}

async fn validate_items(
    txn: &DatabaseTransaction,
    items: &[LineItemInput],
) -> AppResult<Vec<ValidatedLineItem>> {
    let mut validated = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let product = Products::find_by_id(item.product_id)
            .one(txn)
            .await?
            .filter(|product| product.is_active)
            .ok_or_else(|| {
                AppError::BadRequest(format!("Product not found for line {}", index + 1))
            })?;

        let line = match item.variant_id {
            Some(variant_id) => {
                let variant = ProductVariants::find_by_id(variant_id)
                    .filter(VariantCol::ProductId.eq(product.id))
                    .lock(LockType::Update)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        AppError::BadRequest(format!("Variant not found for {}", product.name))
                    })?;

                if variant.stock < item.quantity {
                    return Err(AppError::StockConflict(product.name.clone()));
                }

                ValidatedLineItem {
                    product_id: product.id,
                    variant_id: Some(variant.id),
                    sku: variant.sku,
                    name: product.name,
                    unit_price: variant.price.unwrap_or(product.price),
                    quantity: item.quantity,
                    variant_info: Some(variant.attributes),
                }
            }
            None => ValidatedLineItem {
                product_id: product.id,
                variant_id: None,
                sku: product.sku,
                name: product.name,
                unit_price: product.price,
                quantity: item.quantity,
                variant_info: None,
            },
        };

        validated.push(line);
    }

    Ok(validated)
}

fn validate_request(payload: &CheckoutRequest, has_session: bool) -> Result<(), AppError> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    if payload.items.iter().any(|item| item.quantity <= 0) {
        return Err(AppError::BadRequest("Quantity must be greater than 0".into()));
    }
    if !has_session {
        match payload.email.as_deref() {
            Some(email) if email.contains('@') => {}
            _ => {
                return Err(AppError::BadRequest(
                    "A valid email is required for guest checkout".into(),
                ));
            }
        }
    }

    let address = &payload.address;
    let required = [
        &address.first_name,
        &address.last_name,
        &address.address1,
        &address.city,
        &address.state,
        &address.postal_code,
        &address.country,
        &address.phone,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(AppError::BadRequest("Address is incomplete".into()));
    }

    Ok(())
}

fn is_order_number_collision(err: &AppError) -> bool {
    match err {
        AppError::OrmError(db_err) => matches!(
            db_err.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(msg)) if msg.contains("order_number")
        ),
        _ => false,
    }
}

fn build_order_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    format!("ORD-{}-{}", date, &suffix[..8])
}

fn confirmation_email(order: &OrderModel, items: &[ValidatedLineItem]) -> (String, String) {
    let subject = format!("Order {} confirmed", order.order_number);

    let mut rows = String::new();
    for line in items {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            line.name, line.quantity, line.unit_price
        ));
    }

    let html = format!(
        "<h1>Thanks for your order</h1>\
         <p>Order <strong>{}</strong> has been received and is awaiting payment.</p>\
         <table><tr><th>Item</th><th>Qty</th><th>Unit price</th></tr>{}</table>\
         <p>Subtotal: {} | Shipping: {} | Total: {}</p>",
        order.order_number, rows, order.subtotal, order.shipping_cost, order.total
    );

    (subject, html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::checkout::AddressInput;
    use crate::entity::orders::PaymentMethod;
    use rust_decimal_macros::dec;

    fn line(price: Decimal, quantity: i32) -> ValidatedLineItem {
        ValidatedLineItem {
            product_id: Uuid::new_v4(),
            variant_id: None,
            sku: "SKU-1".into(),
            name: "Widget".into(),
            unit_price: price,
            quantity,
            variant_info: None,
        }
    }

    fn request(items: Vec<LineItemInput>, email: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            email: email.map(str::to_string),
            name: None,
            address: AddressInput {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                address1: "1 Analytical Way".into(),
                address2: None,
                city: "London".into(),
                state: "LDN".into(),
                postal_code: "E1 6AN".into(),
                country: "GB".into(),
                phone: "+44 20 7946 0000".into(),
            },
            shipping_method_id: Uuid::new_v4(),
            payment_method: PaymentMethod::Cod,
            items,
        }
    }

    #[test]
    fn totals_are_exact_decimal_sums() {
        let items = vec![line(dec!(10.00), 2), line(dec!(5.00), 3)];
        let totals = compute_totals(&items, dec!(4.99));
        assert_eq!(totals.subtotal, dec!(35.00));
        assert_eq!(totals.shipping_cost, dec!(4.99));
        assert_eq!(totals.total, dec!(39.99));
    }

    #[test]
    fn totals_of_empty_cart_are_zero() {
        let totals = compute_totals(&[], Decimal::ZERO);
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn order_number_carries_date_and_suffix() {
        let number = build_order_number(Uuid::new_v4());
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn empty_cart_is_rejected() {
        let err = validate_request(&request(vec![], Some("a@b.test")), false).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let items = vec![LineItemInput {
            product_id: Uuid::new_v4(),
            variant_id: None,
            quantity: 0,
            name: None,
            attributes: None,
        }];
        let err = validate_request(&request(items, Some("a@b.test")), false).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn guest_checkout_requires_email() {
        let items = vec![LineItemInput {
            product_id: Uuid::new_v4(),
            variant_id: None,
            quantity: 1,
            name: None,
            attributes: None,
        }];
        let err = validate_request(&request(items, None), false).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn session_checkout_does_not_require_email() {
        let items = vec![LineItemInput {
            product_id: Uuid::new_v4(),
            variant_id: None,
            quantity: 1,
            name: None,
            attributes: None,
        }];
        assert!(validate_request(&request(items, None), true).is_ok());
    }
}
