//! Cart reconciliation and the all-or-nothing checkout commit, driven
//! through `CartService` against the in-memory store.

use domains::{DomainError, OrderStatus, Role, StoreRepo};
use integration_tests::{rules_without_cooldown, Harness};
use tokio_test::assert_ok;

fn harness() -> Harness {
    Harness::new(rules_without_cooldown())
}

#[tokio::test]
async fn checkout_debits_reserves_and_clears_cart() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 1_000).await;
    let pack = h.item("Diamond Pack", 250, Some(10)).await;
    let frame = h.item("Profile Frame", 80, None).await;

    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 2).await);
    let view = assert_ok!(h.cart.add_to_cart(&buyer, frame.id, 1).await);
    assert_eq!(view.total_cost, 580);

    let receipt = assert_ok!(h.cart.checkout(&buyer).await);
    assert_eq!(receipt.new_coin_balance, 420);

    let user = h.stored_user(buyer.user_id).await;
    assert_eq!(user.coins, 420);
    assert!(user.cart.is_empty());
    assert_eq!(h.stored_item(pack.id).await.inventory, Some(8));
    assert_eq!(h.stored_item(frame.id).await.inventory, None);

    let order = assert_ok!(h.cart.get_order(&buyer, receipt.order_id).await);
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.total_amount, 580);
    assert_eq!(order.payment_details.coin_balance_before, 1_000);
    assert_eq!(order.payment_details.coin_balance_after, 420);
}

#[tokio::test]
async fn order_keeps_price_at_purchase() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 500).await;
    let mut pack = h.item("Diamond Pack", 100, None).await;

    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 1).await);
    let receipt = assert_ok!(h.cart.checkout(&buyer).await);

    pack.coin_cost = 400;
    pack.name = "Mega Pack".into();
    h.store.upsert_item(&pack).await.unwrap();

    let order = assert_ok!(h.cart.get_order(&buyer, receipt.order_id).await);
    assert_eq!(order.items[0].price_at_purchase, 100);
    assert_eq!(order.items[0].name, "Diamond Pack");
}

#[tokio::test]
async fn low_stock_names_the_remaining_count() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 10_000).await;
    let a = h.item("A", 10, Some(2)).await;

    // Adding never checks stock; checkout does.
    assert_ok!(h.cart.add_to_cart(&buyer, a.id, 3).await);
    let err = h.cart.checkout(&buyer).await.unwrap_err();
    assert_eq!(err, DomainError::Conflict("Only 2 A(s) available".into()));

    let user = h.stored_user(buyer.user_id).await;
    assert_eq!(user.coins, 10_000);
    assert_eq!(user.cart.len(), 1);
    assert_eq!(h.stored_item(a.id).await.inventory, Some(2));
}

#[tokio::test]
async fn insufficient_balance_changes_nothing() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 300).await;
    let pack = h.item("Diamond Pack", 250, Some(5)).await;

    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 2).await);
    let err = h.cart.checkout(&buyer).await.unwrap_err();
    assert_eq!(
        err,
        DomainError::InsufficientFunds {
            required: 500,
            available: 300
        }
    );

    let user = h.stored_user(buyer.user_id).await;
    assert_eq!(user.coins, 300);
    assert_eq!(user.cart[0].quantity, 2);
    assert_eq!(h.stored_item(pack.id).await.inventory, Some(5));
    assert!(h.cart.list_orders(&buyer).await.unwrap().is_empty());
}

#[tokio::test]
async fn balance_can_reach_zero_but_never_below() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 300).await;
    let pack = h.item("Diamond Pack", 100, None).await;

    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 3).await);
    let receipt = assert_ok!(h.cart.checkout(&buyer).await);
    assert_eq!(receipt.new_coin_balance, 0);

    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 1).await);
    let err = h.cart.checkout(&buyer).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientFunds { .. }));
    assert_eq!(h.stored_user(buyer.user_id).await.coins, 0);
}

#[tokio::test]
async fn concurrent_checkouts_of_one_cart_debit_once() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 1_000).await;
    let pack = h.item("Diamond Pack", 300, Some(10)).await;
    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 1).await);

    let (first, second) = tokio::join!(h.cart.checkout(&buyer), h.cart.checkout(&buyer));
    let succeeded = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);

    assert_eq!(h.stored_user(buyer.user_id).await.coins, 700);
    assert_eq!(h.stored_item(pack.id).await.inventory, Some(9));
    assert_eq!(h.cart.list_orders(&buyer).await.unwrap().len(), 1);

    let again = h.cart.checkout(&buyer).await.unwrap_err();
    assert_eq!(again, DomainError::Validation("cart is empty".into()));
}

#[tokio::test]
async fn second_buyer_sees_reduced_stock() {
    let h = harness();
    let first = h.user("first", Role::User, 1_000).await;
    let second = h.user("second", Role::User, 1_000).await;
    let hoodie = h.item("Hoodie", 100, Some(3)).await;

    assert_ok!(h.cart.add_to_cart(&first, hoodie.id, 2).await);
    assert_ok!(h.cart.add_to_cart(&second, hoodie.id, 2).await);

    assert_ok!(h.cart.checkout(&first).await);
    let err = h.cart.checkout(&second).await.unwrap_err();
    assert_eq!(err, DomainError::Conflict("Only 1 Hoodie(s) available".into()));
    assert_eq!(h.stored_user(second.user_id).await.coins, 1_000);
}

#[tokio::test]
async fn deactivated_item_blocks_checkout() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 1_000).await;
    let mut pack = h.item("Diamond Pack", 100, None).await;
    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 1).await);

    pack.is_active = false;
    h.store.upsert_item(&pack).await.unwrap();

    let view = assert_ok!(h.cart.get_cart(&buyer).await);
    assert!(!view.items[0].item_exists);
    assert_eq!(view.total_cost, 0);

    let err = h.cart.checkout(&buyer).await.unwrap_err();
    assert_eq!(
        err,
        DomainError::Conflict("Diamond Pack is no longer available".into())
    );
}

#[tokio::test]
async fn cart_edits_merge_update_and_remove() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 0).await;
    let pack = h.item("Diamond Pack", 50, Some(4)).await;

    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 1).await);
    let merged = assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 2).await);
    assert_eq!(merged.items.len(), 1);
    assert_eq!(merged.items[0].quantity, 3);

    let too_many = h.cart.update_quantity(&buyer, pack.id, 5).await.unwrap_err();
    assert!(matches!(too_many, DomainError::Conflict(_)));

    let zero = h.cart.add_to_cart(&buyer, pack.id, 0).await.unwrap_err();
    assert!(matches!(zero, DomainError::Validation(_)));

    let updated = assert_ok!(h.cart.update_quantity(&buyer, pack.id, 4).await);
    assert_eq!(updated.total_cost, 200);

    let emptied = assert_ok!(h.cart.remove_from_cart(&buyer, pack.id).await);
    assert!(emptied.items.is_empty());
    let missing = h.cart.remove_from_cart(&buyer, pack.id).await.unwrap_err();
    assert!(matches!(missing, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn refund_credits_buyer_once() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 1_000).await;
    let admin = h.user("admin", Role::Admin, 0).await;
    let pack = h.item("Diamond Pack", 250, Some(5)).await;

    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 2).await);
    let receipt = assert_ok!(h.cart.checkout(&buyer).await);

    let denied = h
        .cart
        .update_order_status(&buyer, receipt.order_id, OrderStatus::Refunded)
        .await
        .unwrap_err();
    assert!(matches!(denied, DomainError::Forbidden(_)));

    let refunded = assert_ok!(
        h.cart
            .update_order_status(&admin, receipt.order_id, OrderStatus::Refunded)
            .await
    );
    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(h.stored_user(buyer.user_id).await.coins, 1_000);

    let twice = h
        .cart
        .update_order_status(&admin, receipt.order_id, OrderStatus::Refunded)
        .await
        .unwrap_err();
    assert!(matches!(twice, DomainError::Conflict(_)));
    assert_eq!(h.stored_user(buyer.user_id).await.coins, 1_000);
}

#[tokio::test]
async fn foreign_order_is_not_found() {
    let h = harness();
    let buyer = h.user("buyer", Role::User, 100).await;
    let stranger = h.user("stranger", Role::User, 100).await;
    let pack = h.item("Diamond Pack", 10, None).await;

    assert_ok!(h.cart.add_to_cart(&buyer, pack.id, 1).await);
    let receipt = assert_ok!(h.cart.checkout(&buyer).await);

    let err = h
        .cart
        .get_order(&stranger, receipt.order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
    assert!(h.cart.list_orders(&stranger).await.unwrap().is_empty());
}
