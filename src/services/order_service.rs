use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    db::{lock_for_update, map_write_err},
    dto::orders::{OrderList, OrderLookup, OrderLookupItem, OrderWithItems},
    entity::{
        cart_items,
        carts::{self, CartStatus, Entity as Carts},
        order_items::{self, Column as OrderItemCol, Entity as OrderItems},
        orders::{self, Column as OrderCol, Entity as Orders, OrderStatus},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{self, Order, OrderItem},
    notify::{OrderConfirmation, dispatch_after_commit},
    pricing::{from_minor_units, to_minor_units},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        cart_service::lines_for_active_cart,
        identity_service::{CartIdentity, has_active_cart, resolve_active_cart},
        pricing_service::{PricedLine, price_lines, totals_of},
    },
    state::AppState,
};

/// Turn the caller's active cart into an order.
///
/// Lines are priced against the catalog before any lock is taken. The write
/// transaction then re-reads the cart and refuses to continue if it changed
/// in the meantime.
pub async fn checkout(
    state: &AppState,
    identity: &CartIdentity,
    user: Option<&AuthUser>,
) -> AppResult<ApiResponse<OrderWithItems>> {
    // nothing to check out; answer without creating a cart
    if !has_active_cart(&state.orm, identity).await? {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    let cart = resolve_active_cart(&state.orm, identity).await?;
    let items = lines_for_active_cart(&state.orm, cart.id).await?;
    if items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let priced = price_lines(state.catalog.as_ref(), items).await?;
    let total = totals_of(&priced)?.subtotal_final;
    let total_minor = minor_units(total)?;

    let txn = state.orm.begin().await?;
    let locked = lock_for_update(Carts::find_by_id(cart.id), txn.get_database_backend())
        .one(&txn)
        .await?
        .filter(carts::Model::is_active)
        .ok_or_else(|| AppError::BadRequest("Active cart not found".into()))?;

    let current = lines_for_active_cart(&txn, locked.id).await?;
    if !same_lines(&priced, &current) {
        tracing::info!(cart_id = %locked.id, "cart changed while checking out");
        return Err(AppError::Conflict(
            "Cart changed during checkout, please retry".into(),
        ));
    }

    let now = Utc::now();
    let order = orders::ActiveModel {
        id: NotSet,
        user_id: Set(user.map(|u| u.user_id)),
        status: Set(OrderStatus::Pending.as_str().into()),
        total: Set(total_minor),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let item_models = priced
        .iter()
        .map(|line| order_item_row(order.id, line, now))
        .collect::<AppResult<Vec<_>>>()?;
    OrderItems::insert_many(
        item_models
            .iter()
            .cloned()
            .map(|model| model.into_active_model().reset_all()),
    )
    .exec_without_returning(&txn)
    .await?;

    let mut retired: carts::ActiveModel = locked.into();
    retired.status = Set(CartStatus::CheckedOut.as_str().into());
    retired.updated_at = Set(now.into());
    retired.update(&txn).await.map_err(map_write_err)?;

    txn.commit().await?;

    tracing::info!(
        order_id = order.id,
        cart_id = %cart.id,
        user_id = ?order.user_id,
        total = %total,
        lines = item_models.len(),
        "checkout complete"
    );

    if let Some(recipient) = user.and_then(|u| u.email.clone()) {
        let currency = item_models
            .first()
            .map(|item| item.currency.clone())
            .unwrap_or_default();
        dispatch_after_commit(
            state.notifier.clone(),
            OrderConfirmation {
                order_id: order.id,
                recipient,
                total,
                currency,
            },
        );
    }

    Ok(ApiResponse::item(
        "Checkout success",
        order_with_items(order, item_models),
    ))
}

/// Public lookup by order number. There is no ownership check.
pub async fn lookup_order(
    state: &AppState,
    number: Option<&str>,
) -> AppResult<ApiResponse<OrderLookup>> {
    let number = number
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| AppError::BadRequest("Order number is required".into()))?;
    let order_id: i32 = number
        .parse()
        .map_err(|_| AppError::BadRequest("Order number is invalid".into()))?;

    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    let items = items_for_order(state, order.id).await?;

    let subtotal_original = models::subtotal_original(&items);
    let total_price = from_minor_units(order.total);
    let lookup = OrderLookup {
        order_number: order.id,
        status: order.status,
        created_at: order.created_at.with_timezone(&Utc),
        total_price,
        subtotal_original,
        discount_total: subtotal_original - total_price,
        currency: items
            .first()
            .map(|item| item.currency.clone())
            .unwrap_or_default(),
        items: items
            .into_iter()
            .map(|item| OrderLookupItem {
                title: item.title,
                quantity: item.quantity,
                unit_price_original: from_minor_units(item.unit_price_original),
                discount_percent: item.discount_percent,
                unit_price_final: from_minor_units(item.unit_price_final),
                line_total: from_minor_units(item.line_total),
            })
            .collect(),
    };

    Ok(ApiResponse::item("OK", lookup))
}

/// Orders of the caller, newest first by default. Admins see every order.
pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    if !user.is_admin() {
        condition = condition.add(OrderCol::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::BadRequest(format!("unknown order status {status}")))?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder
            .order_by_asc(OrderCol::CreatedAt)
            .order_by_asc(OrderCol::Id),
        SortOrder::Desc => finder
            .order_by_desc(OrderCol::CreatedAt)
            .order_by_desc(OrderCol::Id),
    };

    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<i32> = orders.iter().map(|order| order.id).collect();
    let mut items_by_order: HashMap<i32, Vec<order_items::Model>> = HashMap::new();
    for item in OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(ids))
        .all(&state.orm)
        .await?
    {
        items_by_order.entry(item.order_id).or_default().push(item);
    }

    let items = orders
        .into_iter()
        .map(|order| {
            let items = items_by_order.remove(&order.id).unwrap_or_default();
            Order::from_entity(order, &items)
        })
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// One order with its items. Other users' orders are reported as missing.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: i32,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|order| user.is_admin() || order.user_id == Some(user.user_id))
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    let items = items_for_order(state, order.id).await?;

    Ok(ApiResponse::item("OK", order_with_items(order, items)))
}

async fn items_for_order(state: &AppState, order_id: i32) -> AppResult<Vec<order_items::Model>> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .order_by_asc(OrderItemCol::Id)
        .all(&state.orm)
        .await?;
    Ok(items)
}

fn order_with_items(order: orders::Model, items: Vec<order_items::Model>) -> OrderWithItems {
    OrderWithItems {
        order: Order::from_entity(order, &items),
        items: items.into_iter().map(OrderItem::from).collect(),
    }
}

fn order_item_row(
    order_id: i32,
    line: &PricedLine,
    now: chrono::DateTime<Utc>,
) -> AppResult<order_items::Model> {
    Ok(order_items::Model {
        id: Uuid::new_v4(),
        order_id,
        product_id: line.item.product_id.clone(),
        title: line.title(),
        quantity: line.item.quantity,
        unit_price_original: minor_units(line.pricing.unit_price_original)?,
        discount_percent: line.pricing.discount_percent,
        unit_price_final: minor_units(line.pricing.unit_price_final)?,
        line_total: minor_units(line.pricing.line_total)?,
        currency: line.currency(),
        image_url: line.image_url(),
        created_at: now.into(),
    })
}

fn minor_units(amount: rust_decimal::Decimal) -> AppResult<i64> {
    to_minor_units(amount)
        .ok_or_else(|| AppError::CatalogUnavailable(format!("amount {amount} is out of range")))
}

/// Whether the lines priced earlier are still exactly the cart's lines.
fn same_lines(priced: &[PricedLine], current: &[cart_items::Model]) -> bool {
    let mut before: Vec<(Uuid, i32)> = priced
        .iter()
        .map(|line| (line.item.id, line.item.quantity))
        .collect();
    let mut after: Vec<(Uuid, i32)> = current.iter().map(|item| (item.id, item.quantity)).collect();
    before.sort_unstable();
    after.sort_unstable();
    before == after
}
