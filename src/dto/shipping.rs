use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::ShippingMethod;

#[derive(Debug, Serialize, ToSchema)]
pub struct ShippingMethodList {
    pub items: Vec<ShippingMethod>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateShippingMethodRequest {
    pub name: String,
    pub base_price: Decimal,
    pub free_above: Option<Decimal>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateShippingMethodRequest {
    pub name: Option<String>,
    pub base_price: Option<Decimal>,
    pub free_above: Option<Decimal>,
    pub is_active: Option<bool>,
}
