use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    dto::orders::{OrderList, OrderLookup, OrderWithItems},
    error::AppResult,
    middleware::{
        auth::AuthUser,
        session::{CartSession, SessionHeader},
    },
    response::ApiResponse,
    routes::params::{OrderListQuery, OrderLookupQuery},
    services::{identity_service::CartIdentity, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/lookup", get(lookup_order))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout",
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderWithItems>),
        (status = 400, description = "No active cart or the cart is empty"),
        (status = 404, description = "A line references a product missing from the catalog"),
        (status = 409, description = "Cart changed during checkout"),
        (status = 502, description = "Catalog unavailable"),
    ),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    session: CartSession,
    user: Option<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let identity = CartIdentity::new(Some(session.token.clone()), user.as_ref().map(|u| u.user_id));
    let body = order_service::checkout(&state, &identity, user.as_ref()).await?;
    Ok((StatusCode::CREATED, SessionHeader(session.token), Json(body)))
}

#[utoipa::path(
    get,
    path = "/api/orders/lookup",
    params(OrderLookupQuery),
    responses(
        (status = 200, description = "Order status and item snapshots", body = ApiResponse<OrderLookup>),
        (status = 400, description = "Missing or non-numeric number"),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn lookup_order(
    State(state): State<AppState>,
    Query(query): Query<OrderLookupQuery>,
) -> AppResult<Json<ApiResponse<OrderLookup>>> {
    let body = order_service::lookup_order(&state, query.number.as_deref()).await?;
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "pending, paid or cancelled"),
        ("sort_order" = Option<String>, Query, description = "asc or desc, default desc"),
    ),
    responses(
        (status = 200, description = "Orders of the current user", body = ApiResponse<OrderList>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let body = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(body))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i32, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<OrderWithItems>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    let body = order_service::get_order(&state, &user, id).await?;
    Ok(Json(body))
}
