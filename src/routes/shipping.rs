use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::shipping::{
        CreateShippingMethodRequest, ShippingMethodList, UpdateShippingMethodRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::ShippingMethod,
    response::ApiResponse,
    services::shipping_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_methods).post(create_method))
        .route("/{id}", patch(update_method).delete(delete_method))
}

#[utoipa::path(
    get,
    path = "/api/shipping-methods",
    responses(
        (status = 200, description = "List active shipping methods", body = ApiResponse<ShippingMethodList>)
    ),
    tag = "Shipping"
)]
pub async fn list_methods(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<ShippingMethodList>>> {
    let resp = shipping_service::list_methods(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/shipping-methods",
    request_body = CreateShippingMethodRequest,
    responses(
        (status = 200, description = "Create shipping method (admin only)", body = ApiResponse<ShippingMethod>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Shipping"
)]
pub async fn create_method(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateShippingMethodRequest>,
) -> AppResult<Json<ApiResponse<ShippingMethod>>> {
    let resp = shipping_service::create_method(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/shipping-methods/{id}",
    params(
        ("id" = Uuid, Path, description = "Shipping method ID")
    ),
    request_body = UpdateShippingMethodRequest,
    responses(
        (status = 200, description = "Update shipping method (admin only)", body = ApiResponse<ShippingMethod>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Shipping"
)]
pub async fn update_method(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShippingMethodRequest>,
) -> AppResult<Json<ApiResponse<ShippingMethod>>> {
    let resp = shipping_service::update_method(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/shipping-methods/{id}",
    params(
        ("id" = Uuid, Path, description = "Shipping method ID")
    ),
    responses(
        (status = 200, description = "Delete shipping method (admin only)", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Shipping"
)]
pub async fn delete_method(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = shipping_service::delete_method(&state, &user, id).await?;
    Ok(Json(resp))
}
