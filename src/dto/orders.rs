use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Guest order lookup by number plus the email the order was placed with.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderLookupQuery {
    pub order_number: String,
    pub email: String,
}
