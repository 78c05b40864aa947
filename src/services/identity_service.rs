//! Resolve the one active cart for a request, merging carts when a guest
//! signs in.

use std::{collections::HashMap, future::Future};

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    db::{lock_for_update, map_write_err},
    entity::{
        cart_items::{self, Column as CartItemCol, Entity as CartItems},
        carts::{self, CartStatus, Column as CartCol, Entity as Carts},
    },
    error::{AppError, AppResult},
};

/// Attempts made by [`retry_on_conflict`] before the conflict is surfaced.
pub const MAX_ATTEMPTS: u32 = 3;

/// Who is asking for a cart. Passed explicitly into every cart operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartIdentity {
    pub session_token: Option<String>,
    pub user_id: Option<Uuid>,
}

impl CartIdentity {
    pub fn new(session_token: Option<String>, user_id: Option<Uuid>) -> Self {
        Self {
            session_token,
            user_id,
        }
    }

    pub fn guest(session_token: impl Into<String>) -> Self {
        Self::new(Some(session_token.into()), None)
    }

    /// A fully anonymous identity gets a fresh session token so that the
    /// cart it creates can be found again.
    fn with_session(&self) -> Self {
        let mut identity = self.clone();
        if identity.session_token.is_none() && identity.user_id.is_none() {
            identity.session_token = Some(Uuid::new_v4().simple().to_string());
        }
        identity
    }
}

/// Run `op` again when it fails with `Conflict`, up to [`MAX_ATTEMPTS`] times.
pub async fn retry_on_conflict<T, F, Fut>(mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(AppError::Conflict(reason)) if attempt < MAX_ATTEMPTS => {
                tracing::debug!(attempt, reason = %reason, "retrying after conflict");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Whether the session or the user already owns an active cart.
///
/// Plain read: nothing is created, merged or locked.
pub async fn has_active_cart<C: ConnectionTrait>(
    conn: &C,
    identity: &CartIdentity,
) -> AppResult<bool> {
    if identity.session_token.is_none() && identity.user_id.is_none() {
        return Ok(false);
    }
    let mut owner = Condition::any();
    if let Some(token) = identity.session_token.as_deref() {
        owner = owner.add(CartCol::SessionToken.eq(token));
    }
    if let Some(user_id) = identity.user_id {
        owner = owner.add(CartCol::UserId.eq(user_id));
    }

    let count = Carts::find()
        .filter(owner)
        .filter(CartCol::Status.eq(CartStatus::Active.as_str()))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// Resolve (and possibly create or merge) the active cart in its own
/// transaction.
pub async fn resolve_active_cart(
    db: &DatabaseConnection,
    identity: &CartIdentity,
) -> AppResult<carts::Model> {
    let identity = &identity.with_session();
    retry_on_conflict(|| async move {
        let txn = db.begin().await?;
        let cart = resolve_in(&txn, identity).await?;
        txn.commit().await.map_err(map_write_err)?;
        Ok::<_, AppError>(cart)
    })
    .await
}

/// Resolve the active cart on an open connection or transaction.
///
/// Candidate rows are locked where the backend supports it. The partial
/// unique indexes on `carts` catch the remaining races; those surface as
/// `Conflict` and the caller retries.
pub async fn resolve_in<C: ConnectionTrait>(
    conn: &C,
    identity: &CartIdentity,
) -> AppResult<carts::Model> {
    let identity = identity.with_session();
    let session_cart = match identity.session_token.as_deref() {
        Some(token) => find_active(conn, CartCol::SessionToken.eq(token)).await?,
        None => None,
    };

    let Some(user_id) = identity.user_id else {
        return match session_cart {
            Some(cart) => Ok(cart),
            None => insert_cart(conn, None, identity.session_token).await,
        };
    };

    let user_cart = find_active(conn, CartCol::UserId.eq(user_id)).await?;
    match (session_cart, user_cart) {
        (Some(session_cart), Some(user_cart)) if session_cart.id == user_cart.id => Ok(user_cart),
        (Some(session_cart), Some(user_cart)) => {
            merge_into(conn, &user_cart, session_cart).await?;
            Ok(user_cart)
        }
        (Some(session_cart), None) => adopt(conn, session_cart, user_id).await,
        (None, Some(user_cart)) => Ok(user_cart),
        (None, None) => insert_cart(conn, Some(user_id), None).await,
    }
}

async fn find_active<C: ConnectionTrait>(
    conn: &C,
    owner: sea_orm::sea_query::SimpleExpr,
) -> AppResult<Option<carts::Model>> {
    let select = Carts::find()
        .filter(owner)
        .filter(CartCol::Status.eq(CartStatus::Active.as_str()));
    let cart = lock_for_update(select, conn.get_database_backend())
        .one(conn)
        .await?;
    Ok(cart)
}

async fn insert_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Option<Uuid>,
    session_token: Option<String>,
) -> AppResult<carts::Model> {
    let now = Utc::now();
    let cart = carts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        session_token: Set(session_token),
        status: Set(CartStatus::Active.as_str().into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await
    .map_err(map_write_err)?;

    tracing::debug!(cart_id = %cart.id, user_id = ?cart.user_id, "created cart");
    Ok(cart)
}

/// Guest converts to an account: the session cart now belongs to the user.
async fn adopt<C: ConnectionTrait>(
    conn: &C,
    session_cart: carts::Model,
    user_id: Uuid,
) -> AppResult<carts::Model> {
    let mut active: carts::ActiveModel = session_cart.into();
    active.user_id = Set(Some(user_id));
    active.session_token = Set(None);
    active.updated_at = Set(Utc::now().into());
    let cart = active.update(conn).await.map_err(map_write_err)?;

    tracing::info!(cart_id = %cart.id, %user_id, "attached guest cart to user");
    Ok(cart)
}

/// Fold every line of `source` into `target` and retire `source`.
///
/// Quantities add up. Display snapshots are overwritten by the source line.
async fn merge_into<C: ConnectionTrait>(
    conn: &C,
    target: &carts::Model,
    source: carts::Model,
) -> AppResult<()> {
    let now = Utc::now();
    let mut existing: HashMap<String, cart_items::Model> = CartItems::find()
        .filter(CartItemCol::CartId.eq(target.id))
        .all(conn)
        .await?
        .into_iter()
        .map(|item| (item.product_id.clone(), item))
        .collect();
    let incoming = CartItems::find()
        .filter(CartItemCol::CartId.eq(source.id))
        .all(conn)
        .await?;
    let merged_lines = incoming.len();

    for item in incoming {
        match existing.remove(&item.product_id) {
            Some(current) => {
                let quantity = current.quantity.checked_add(item.quantity).ok_or_else(|| {
                    AppError::BadRequest(format!("quantity overflow for product {}", item.product_id))
                })?;
                let mut active: cart_items::ActiveModel = current.into();
                active.quantity = Set(quantity);
                active.title_snapshot = Set(item.title_snapshot);
                active.unit_price_snapshot = Set(item.unit_price_snapshot);
                active.currency_snapshot = Set(item.currency_snapshot);
                active.image_url_snapshot = Set(item.image_url_snapshot);
                active.updated_at = Set(now.into());
                active.update(conn).await.map_err(map_write_err)?;
            }
            None => {
                cart_items::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(target.id),
                    product_id: Set(item.product_id),
                    quantity: Set(item.quantity),
                    title_snapshot: Set(item.title_snapshot),
                    unit_price_snapshot: Set(item.unit_price_snapshot),
                    currency_snapshot: Set(item.currency_snapshot),
                    image_url_snapshot: Set(item.image_url_snapshot),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                }
                .insert(conn)
                .await
                .map_err(map_write_err)?;
            }
        }
    }

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(source.id))
        .exec(conn)
        .await?;

    let source_id = source.id;
    let mut retired: carts::ActiveModel = source.into();
    retired.status = Set(CartStatus::CheckedOut.as_str().into());
    retired.session_token = Set(None);
    retired.updated_at = Set(now.into());
    retired.update(conn).await.map_err(map_write_err)?;

    tracing::info!(
        cart_id = %target.id,
        source_cart_id = %source_id,
        merged_lines,
        "merged guest cart into user cart"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: AppResult<()> = retry_on_conflict(|| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Conflict("busy".into()))
        })
        .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn retry_stops_on_success_and_other_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_on_conflict(|| async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::Conflict("busy".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.ok(), Some(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: AppResult<()> = retry_on_conflict(|| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::NotFound("gone".into()))
        })
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn anonymous_identity_gets_a_session() {
        let identity = CartIdentity::default().with_session();
        assert!(identity.session_token.is_some());

        let user = CartIdentity::new(None, Some(Uuid::new_v4())).with_session();
        assert!(user.session_token.is_none());

        let guest = CartIdentity::guest("abc");
        assert_eq!(guest.with_session(), guest);
    }
}
