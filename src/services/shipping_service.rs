use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::shipping::{CreateShippingMethodRequest, ShippingMethodList, UpdateShippingMethodRequest},
    entity::shipping_methods::{
        ActiveModel, Column, Entity as ShippingMethods, Model as ShippingMethodModel,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::ShippingMethod,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Cost charged by a method at a given subtotal. Subtotals at or above the
/// free-shipping threshold ship free; the boundary itself qualifies.
pub fn quote(method: &ShippingMethodModel, subtotal: Decimal) -> Decimal {
    match method.free_above {
        Some(threshold) if subtotal >= threshold => Decimal::ZERO,
        _ => method.base_price,
    }
}

pub async fn list_methods(state: &AppState) -> AppResult<ApiResponse<ShippingMethodList>> {
    let items = ShippingMethods::find()
        .filter(Column::IsActive.eq(true))
        .order_by_asc(Column::BasePrice)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(shipping_method_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Shipping methods",
        ShippingMethodList { items },
        Some(Meta::empty()),
    ))
}

pub async fn create_method(
    state: &AppState,
    user: &AuthUser,
    payload: CreateShippingMethodRequest,
) -> AppResult<ApiResponse<ShippingMethod>> {
    ensure_admin(user)?;
    if payload.base_price < Decimal::ZERO {
        return Err(AppError::BadRequest("base_price must not be negative".into()));
    }

    let method = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        base_price: Set(payload.base_price),
        free_above: Set(payload.free_above),
        is_active: Set(payload.is_active),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "shipping_method_create",
        Some("shipping_methods"),
        Some(serde_json::json!({ "shipping_method_id": method.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Shipping method created",
        shipping_method_from_entity(method),
        Some(Meta::empty()),
    ))
}

pub async fn update_method(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateShippingMethodRequest,
) -> AppResult<ApiResponse<ShippingMethod>> {
    ensure_admin(user)?;
    let existing = ShippingMethods::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(m) => m,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(base_price) = payload.base_price {
        if base_price < Decimal::ZERO {
            return Err(AppError::BadRequest("base_price must not be negative".into()));
        }
        active.base_price = Set(base_price);
    }
    if let Some(free_above) = payload.free_above {
        active.free_above = Set(Some(free_above));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let method = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "shipping_method_update",
        Some("shipping_methods"),
        Some(serde_json::json!({ "shipping_method_id": method.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Shipping method updated",
        shipping_method_from_entity(method),
        Some(Meta::empty()),
    ))
}

pub async fn delete_method(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = ShippingMethods::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.orm,
        Some(user.user_id),
        "shipping_method_delete",
        Some("shipping_methods"),
        Some(serde_json::json!({ "shipping_method_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Shipping method deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn shipping_method_from_entity(model: ShippingMethodModel) -> ShippingMethod {
    ShippingMethod {
        id: model.id,
        name: model.name,
        base_price: model.base_price,
        free_above: model.free_above,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn method(base_price: Decimal, free_above: Option<Decimal>) -> ShippingMethodModel {
        ShippingMethodModel {
            id: Uuid::new_v4(),
            name: "Standard".into(),
            base_price,
            free_above,
            is_active: true,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn subtotal_at_threshold_ships_free() {
        let m = method(dec!(4.99), Some(dec!(50.00)));
        assert_eq!(quote(&m, dec!(50.00)), Decimal::ZERO);
    }

    #[test]
    fn subtotal_below_threshold_pays_base_price() {
        let m = method(dec!(4.99), Some(dec!(50.00)));
        assert_eq!(quote(&m, dec!(49.99)), dec!(4.99));
    }

    #[test]
    fn no_threshold_always_pays_base_price() {
        let m = method(dec!(9.99), None);
        assert_eq!(quote(&m, dec!(10000.00)), dec!(9.99));
    }
}
