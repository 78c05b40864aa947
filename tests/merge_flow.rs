mod common;

use chrono::Utc;
use common::{all_carts, guest, lines_of, money, product, setup};
use sea_orm::{ActiveModelTrait, DbErr, Set, SqlErr};
use storefront_checkout::{
    db::map_write_err,
    dto::cart::AddCartItemRequest,
    entity::carts::{self, CartStatus},
    error::AppError,
    services::{
        cart_service,
        identity_service::{CartIdentity, resolve_active_cart},
    },
};
use testresult::TestResult;
use uuid::Uuid;

fn add(product_id: &str, quantity: i32) -> AddCartItemRequest {
    AddCartItemRequest {
        product_id: product_id.into(),
        quantity,
    }
}

fn signed_in(token: &str, user_id: Uuid) -> CartIdentity {
    CartIdentity::new(Some(token.into()), Some(user_id))
}

fn account(user_id: Uuid) -> CartIdentity {
    CartIdentity::new(None, Some(user_id))
}

#[tokio::test]
async fn signing_in_merges_guest_lines_into_user_cart() -> TestResult {
    let app = setup().await?;
    let user_id = Uuid::new_v4();
    app.catalog.put(product("A", "10.00", 0));
    app.catalog.put(product("B", "5.00", 0));

    cart_service::add_item(&app.state, &account(user_id), add("A", 3)).await?;
    cart_service::add_item(&app.state, &account(user_id), add("B", 1)).await?;
    let guest_line = cart_service::add_item(&app.state, &guest("guest-a"), add("A", 2)).await?;
    let guest_cart_id = guest_line.item.cart_id;

    let resolved = resolve_active_cart(&app.state.orm, &signed_in("guest-a", user_id)).await?;
    assert_eq!(resolved.user_id, Some(user_id));
    assert_ne!(resolved.id, guest_cart_id);

    let mut lines: Vec<(String, i32)> = lines_of(&app.state.orm, resolved.id)
        .await
        .into_iter()
        .map(|line| (line.product_id, line.quantity))
        .collect();
    lines.sort();
    assert_eq!(lines, vec![("A".to_string(), 5), ("B".to_string(), 1)]);

    let carts = all_carts(&app.state.orm).await;
    let source = carts
        .iter()
        .find(|cart| cart.id == guest_cart_id)
        .expect("guest cart kept");
    assert_eq!(source.status, CartStatus::CheckedOut.as_str());
    assert!(source.session_token.is_none());
    assert!(lines_of(&app.state.orm, guest_cart_id).await.is_empty());

    let active: Vec<_> = carts.iter().filter(|cart| cart.is_active()).collect();
    assert_eq!(active.len(), 1);

    // a second request with the same pair is a plain lookup
    let again = resolve_active_cart(&app.state.orm, &signed_in("guest-a", user_id)).await?;
    assert_eq!(again.id, resolved.id);
    assert_eq!(lines_of(&app.state.orm, resolved.id).await.len(), 2);
    Ok(())
}

#[tokio::test]
async fn merged_line_takes_the_guest_snapshot() -> TestResult {
    let app = setup().await?;
    let user_id = Uuid::new_v4();

    app.catalog.put(product("A", "10.00", 0));
    cart_service::add_item(&app.state, &guest("guest-a"), add("A", 1)).await?;

    // the user's line is written later, with newer catalog data
    let mut newer = product("A", "12.00", 0);
    newer.title = Some("Newer title".into());
    app.catalog.put(newer);
    cart_service::add_item(&app.state, &account(user_id), add("A", 1)).await?;

    let resolved = resolve_active_cart(&app.state.orm, &signed_in("guest-a", user_id)).await?;
    let lines = lines_of(&app.state.orm, resolved.id).await;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(lines[0].title_snapshot, "Product A");
    assert_eq!(lines[0].unit_price_snapshot, 1000);
    Ok(())
}

#[tokio::test]
async fn guest_cart_is_adopted_when_user_has_none() -> TestResult {
    let app = setup().await?;
    let user_id = Uuid::new_v4();
    app.catalog.put(product("A", "10.00", 0));
    let line = cart_service::add_item(&app.state, &guest("guest-a"), add("A", 2)).await?;

    let resolved = resolve_active_cart(&app.state.orm, &signed_in("guest-a", user_id)).await?;
    assert_eq!(resolved.id, line.item.cart_id);
    assert_eq!(resolved.user_id, Some(user_id));
    assert!(resolved.session_token.is_none());
    assert_eq!(lines_of(&app.state.orm, resolved.id).await[0].quantity, 2);

    // the account alone now reaches the same cart
    let by_user = resolve_active_cart(&app.state.orm, &account(user_id)).await?;
    assert_eq!(by_user.id, line.item.cart_id);
    Ok(())
}

#[tokio::test]
async fn unknown_token_for_known_user_returns_user_cart() -> TestResult {
    let app = setup().await?;
    let user_id = Uuid::new_v4();
    let user_cart = resolve_active_cart(&app.state.orm, &account(user_id)).await?;

    let resolved = resolve_active_cart(&app.state.orm, &signed_in("never-seen", user_id)).await?;
    assert_eq!(resolved.id, user_cart.id);
    assert_eq!(all_carts(&app.state.orm).await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn guests_with_different_tokens_get_separate_carts() -> TestResult {
    let app = setup().await?;
    let first = resolve_active_cart(&app.state.orm, &guest("guest-a")).await?;
    let second = resolve_active_cart(&app.state.orm, &guest("guest-b")).await?;
    let first_again = resolve_active_cart(&app.state.orm, &guest("guest-a")).await?;

    assert_ne!(first.id, second.id);
    assert_eq!(first.id, first_again.id);
    assert_eq!(first.session_token.as_deref(), Some("guest-a"));
    Ok(())
}

#[tokio::test]
async fn anonymous_request_gets_a_minted_token() -> TestResult {
    let app = setup().await?;
    let resolved = resolve_active_cart(&app.state.orm, &CartIdentity::default()).await?;

    let token = resolved.session_token.clone().expect("minted token");
    assert!(!token.is_empty());

    let again = resolve_active_cart(&app.state.orm, &guest(&token)).await?;
    assert_eq!(again.id, resolved.id);
    Ok(())
}

#[tokio::test]
async fn second_active_cart_for_a_user_is_a_conflict() -> TestResult {
    let app = setup().await?;
    let user_id = Uuid::new_v4();
    resolve_active_cart(&app.state.orm, &account(user_id)).await?;

    let now = Utc::now();
    let duplicate = carts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(user_id)),
        session_token: Set(None),
        status: Set(CartStatus::Active.as_str().into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&app.state.orm)
    .await;

    let err: DbErr = duplicate.expect_err("unique index rejects a second active cart");
    assert!(matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(_))
    ));
    assert!(matches!(map_write_err(err), AppError::Conflict(_)));

    // a retired cart does not count against the index
    let retired = carts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(Some(user_id)),
        session_token: Set(None),
        status: Set(CartStatus::CheckedOut.as_str().into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&app.state.orm)
    .await;
    assert!(retired.is_ok());
    Ok(())
}

#[tokio::test]
async fn concurrent_resolves_share_one_cart() -> TestResult {
    let app = setup().await?;
    let user_id = Uuid::new_v4();
    let identity = account(user_id);

    let (first, second, third) = tokio::join!(
        resolve_active_cart(&app.state.orm, &identity),
        resolve_active_cart(&app.state.orm, &identity),
        resolve_active_cart(&app.state.orm, &identity),
    );
    let (first, second, third) = (first?, second?, third?);

    assert_eq!(first.id, second.id);
    assert_eq!(second.id, third.id);
    let active = all_carts(&app.state.orm)
        .await
        .into_iter()
        .filter(|cart| cart.is_active())
        .count();
    assert_eq!(active, 1);
    Ok(())
}

#[tokio::test]
async fn merged_cart_prices_the_combined_lines() -> TestResult {
    let app = setup().await?;
    let user_id = Uuid::new_v4();
    app.catalog.put(product("A", "100.00", 25));
    cart_service::add_item(&app.state, &account(user_id), add("A", 1)).await?;
    cart_service::add_item(&app.state, &guest("guest-a"), add("A", 2)).await?;

    let priced = cart_service::priced_cart(&app.state, &signed_in("guest-a", user_id))
        .await?
        .data
        .expect("data");
    assert_eq!(priced.total_quantity, 3);
    assert_eq!(priced.total, money("225.00"));
    Ok(())
}
