use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    catalog::ProductSnapshot,
    db::{lock_for_update, map_write_err},
    dto::cart::{AddCartItemRequest, CartItemList, PricedCart, UpdateCartItemRequest},
    entity::{
        cart_items::{self, Column as CartItemCol, Entity as CartItems},
        carts::{CartStatus, Column as CartCol},
    },
    error::{AppError, AppResult},
    models::CartItem,
    pricing,
    response::ApiResponse,
    services::{
        identity_service::{CartIdentity, resolve_active_cart, resolve_in, retry_on_conflict},
        pricing_service::{assemble, price_lines},
    },
    state::AppState,
};

const MAX_PRODUCT_ID_LEN: usize = 255;

/// Display data copied onto a cart line when it is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySnapshot {
    pub title: String,
    /// Minor units.
    pub unit_price: i64,
    pub currency: String,
    pub image_url: String,
}

impl DisplaySnapshot {
    pub fn from_product(product: &ProductSnapshot) -> AppResult<Self> {
        let unit_price = pricing::to_minor_units(product.price).ok_or_else(|| {
            AppError::CatalogUnavailable(format!("price of product {} is out of range", product.id))
        })?;

        Ok(Self {
            title: product.title.clone().unwrap_or_default(),
            unit_price,
            currency: product.currency.clone(),
            image_url: product.image_url.clone().unwrap_or_default(),
        })
    }
}

/// Result of an add: the line and whether it was newly created.
#[derive(Debug, Clone)]
pub struct LineChange {
    pub item: CartItem,
    pub created: bool,
}

fn validate_quantity(quantity: i32) -> AppResult<()> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_product_id(product_id: &str) -> AppResult<&str> {
    let product_id = product_id.trim();
    if product_id.is_empty() {
        return Err(AppError::BadRequest("product_id is required".to_string()));
    }
    if product_id.len() > MAX_PRODUCT_ID_LEN {
        return Err(AppError::BadRequest("product_id is too long".to_string()));
    }
    Ok(product_id)
}

/// Lines of `cart_id`, only while that cart is still active.
pub async fn lines_for_active_cart<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> AppResult<Vec<cart_items::Model>> {
    let lines = CartItems::find()
        .join(
            sea_orm::JoinType::InnerJoin,
            cart_items::Relation::Carts.def(),
        )
        .filter(CartItemCol::CartId.eq(cart_id))
        .filter(CartCol::Status.eq(CartStatus::Active.as_str()))
        .order_by_asc(CartItemCol::CreatedAt)
        .order_by_asc(CartItemCol::Id)
        .all(conn)
        .await?;
    Ok(lines)
}

/// Create the line or add `quantity` to it. The snapshot is always refreshed.
pub async fn upsert_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    product_id: &str,
    quantity: i32,
    snapshot: &DisplaySnapshot,
) -> AppResult<(cart_items::Model, bool)> {
    let now = Utc::now();
    let select = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .filter(CartItemCol::ProductId.eq(product_id));
    let existing = lock_for_update(select, conn.get_database_backend())
        .one(conn)
        .await?;

    if let Some(current) = existing {
        let quantity = current.quantity.checked_add(quantity).ok_or_else(|| {
            AppError::BadRequest(format!("quantity overflow for product {product_id}"))
        })?;
        let mut active: cart_items::ActiveModel = current.into();
        active.quantity = Set(quantity);
        active.title_snapshot = Set(snapshot.title.clone());
        active.unit_price_snapshot = Set(snapshot.unit_price);
        active.currency_snapshot = Set(snapshot.currency.clone());
        active.image_url_snapshot = Set(snapshot.image_url.clone());
        active.updated_at = Set(now.into());
        let line = active.update(conn).await.map_err(map_write_err)?;
        return Ok((line, false));
    }

    let line = cart_items::ActiveModel {
        id: Set(Uuid::new_v4()),
        cart_id: Set(cart_id),
        product_id: Set(product_id.to_owned()),
        quantity: Set(quantity),
        title_snapshot: Set(snapshot.title.clone()),
        unit_price_snapshot: Set(snapshot.unit_price),
        currency_snapshot: Set(snapshot.currency.clone()),
        image_url_snapshot: Set(snapshot.image_url.clone()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await
    .map_err(map_write_err)?;
    Ok((line, true))
}

/// Set the quantity of a line in `cart_id` verbatim.
pub async fn set_line_quantity<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    line_id: Uuid,
    quantity: i32,
) -> AppResult<cart_items::Model> {
    let select = CartItems::find()
        .filter(CartItemCol::Id.eq(line_id))
        .filter(CartItemCol::CartId.eq(cart_id));
    let line = lock_for_update(select, conn.get_database_backend())
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart item not found".into()))?;

    let mut active: cart_items::ActiveModel = line.into();
    active.quantity = Set(quantity);
    active.updated_at = Set(Utc::now().into());
    let line = active.update(conn).await.map_err(map_write_err)?;
    Ok(line)
}

pub async fn delete_line<C: ConnectionTrait>(conn: &C, cart_id: Uuid, line_id: Uuid) -> AppResult<()> {
    let result = CartItems::delete_many()
        .filter(CartItemCol::Id.eq(line_id))
        .filter(CartItemCol::CartId.eq(cart_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Cart item not found".into()));
    }
    Ok(())
}

/// Add a product to the caller's active cart.
///
/// The catalog is consulted before the write transaction opens, so an
/// unknown product or an unreachable catalog never touches the cart.
pub async fn add_item(
    state: &AppState,
    identity: &CartIdentity,
    payload: AddCartItemRequest,
) -> AppResult<LineChange> {
    validate_quantity(payload.quantity)?;
    let product_id = validate_product_id(&payload.product_id)?;

    let product = state.catalog.get_product(product_id).await?;
    let snapshot = &DisplaySnapshot::from_product(&product)?;
    let quantity = payload.quantity;

    let (line, created) = retry_on_conflict(|| async move {
        let txn = state.orm.begin().await?;
        let cart = resolve_in(&txn, identity).await?;
        let change = upsert_line(&txn, cart.id, product_id, quantity, snapshot).await?;
        txn.commit().await.map_err(map_write_err)?;
        Ok::<_, AppError>(change)
    })
    .await?;

    tracing::debug!(
        cart_id = %line.cart_id,
        product_id = %line.product_id,
        quantity = line.quantity,
        created,
        "cart line saved"
    );
    Ok(LineChange {
        item: line.into(),
        created,
    })
}

pub async fn update_item(
    state: &AppState,
    identity: &CartIdentity,
    line_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    validate_quantity(payload.quantity)?;
    let quantity = payload.quantity;

    let line = retry_on_conflict(|| async move {
        let txn = state.orm.begin().await?;
        let cart = resolve_in(&txn, identity).await?;
        let line = set_line_quantity(&txn, cart.id, line_id, quantity).await?;
        txn.commit().await.map_err(map_write_err)?;
        Ok::<_, AppError>(line)
    })
    .await?;

    Ok(ApiResponse::item("Cart item updated", line.into()))
}

pub async fn remove_item(state: &AppState, identity: &CartIdentity, line_id: Uuid) -> AppResult<()> {
    retry_on_conflict(|| async move {
        let txn = state.orm.begin().await?;
        let cart = resolve_in(&txn, identity).await?;
        delete_line(&txn, cart.id, line_id).await?;
        txn.commit().await.map_err(map_write_err)?;
        Ok::<_, AppError>(())
    })
    .await
}

/// Stored lines of the active cart, without repricing.
pub async fn list_items(
    state: &AppState,
    identity: &CartIdentity,
) -> AppResult<ApiResponse<CartItemList>> {
    let cart = resolve_active_cart(&state.orm, identity).await?;
    let items = lines_for_active_cart(&state.orm, cart.id)
        .await?
        .into_iter()
        .map(CartItem::from)
        .collect();

    Ok(ApiResponse::item("OK", CartItemList { items }))
}

/// Active cart priced with current catalog figures.
pub async fn priced_cart(
    state: &AppState,
    identity: &CartIdentity,
) -> AppResult<ApiResponse<PricedCart>> {
    let cart = resolve_active_cart(&state.orm, identity).await?;
    let items = lines_for_active_cart(&state.orm, cart.id).await?;
    let lines = price_lines(state.catalog.as_ref(), items).await?;
    let view = assemble(&cart, &lines)?;

    Ok(ApiResponse::item("OK", view))
}
