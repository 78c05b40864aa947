use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddCartItemRequest, CartItemList, PricedCart, UpdateCartItemRequest},
    error::AppResult,
    middleware::{
        auth::AuthUser,
        session::{CartSession, SessionHeader},
    },
    models::CartItem,
    response::ApiResponse,
    services::{cart_service, identity_service::CartIdentity},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", get(list_items).post(add_item))
        .route("/items/{id}", patch(update_item).delete(remove_item))
}

fn identity(session: &CartSession, user: Option<&AuthUser>) -> CartIdentity {
    CartIdentity::new(Some(session.token.clone()), user.map(|u| u.user_id))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    params(
        ("x-cart-session" = Option<String>, Header, description = "Anonymous cart token")
    ),
    responses(
        (status = 200, description = "Active cart priced with current catalog figures", body = ApiResponse<PricedCart>),
        (status = 404, description = "A line references a product missing from the catalog"),
        (status = 502, description = "Catalog unavailable"),
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    session: CartSession,
    user: Option<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let identity = identity(&session, user.as_ref());
    let body = cart_service::priced_cart(&state, &identity).await?;
    Ok((SessionHeader(session.token), Json(body)))
}

#[utoipa::path(
    get,
    path = "/api/cart/items",
    responses(
        (status = 200, description = "Stored lines of the active cart", body = ApiResponse<CartItemList>)
    ),
    tag = "Cart"
)]
pub async fn list_items(
    State(state): State<AppState>,
    session: CartSession,
    user: Option<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let identity = identity(&session, user.as_ref());
    let body = cart_service::list_items(&state, &identity).await?;
    Ok((SessionHeader(session.token), Json(body)))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddCartItemRequest,
    responses(
        (status = 201, description = "Line created", body = ApiResponse<CartItem>),
        (status = 200, description = "Quantity added to an existing line", body = ApiResponse<CartItem>),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Product not found"),
        (status = 502, description = "Catalog unavailable"),
    ),
    tag = "Cart"
)]
pub async fn add_item(
    State(state): State<AppState>,
    session: CartSession,
    user: Option<AuthUser>,
    Json(payload): Json<AddCartItemRequest>,
) -> AppResult<impl IntoResponse> {
    let identity = identity(&session, user.as_ref());
    let change = cart_service::add_item(&state, &identity, payload).await?;

    let (status, message) = if change.created {
        (StatusCode::CREATED, "Added to cart")
    } else {
        (StatusCode::OK, "Cart item updated")
    };
    Ok((
        status,
        SessionHeader(session.token),
        Json(ApiResponse::item(message, change.item)),
    ))
}

#[utoipa::path(
    patch,
    path = "/api/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart line id")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity set", body = ApiResponse<CartItem>),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Cart item not found"),
    ),
    tag = "Cart"
)]
pub async fn update_item(
    State(state): State<AppState>,
    session: CartSession,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<impl IntoResponse> {
    let identity = identity(&session, user.as_ref());
    let body = cart_service::update_item(&state, &identity, id, payload).await?;
    Ok((SessionHeader(session.token), Json(body)))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{id}",
    params(("id" = Uuid, Path, description = "Cart line id")),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Cart item not found"),
    ),
    tag = "Cart"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    session: CartSession,
    user: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let identity = identity(&session, user.as_ref());
    cart_service::remove_item(&state, &identity, id).await?;
    Ok((StatusCode::NO_CONTENT, SessionHeader(session.token), ()))
}
