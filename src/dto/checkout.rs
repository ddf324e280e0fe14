use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::orders::{OrderStatus, PaymentMethod, PaymentStatus};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Contact email; required for guest checkout, ignored for sessions.
    pub email: Option<String>,
    /// Display name recorded on guest orders.
    pub name: Option<String>,
    pub address: AddressInput,
    pub shipping_method_id: Uuid,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    pub first_name: String,
    pub last_name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
}

/// One requested line. Only product/variant identity and quantity are
/// trusted; name and attributes are display hints from the client cart and
/// are re-resolved against the catalog before anything is persisted.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LineItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub name: Option<String>,
    pub attributes: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}
