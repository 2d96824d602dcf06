//! Cart, checkout and order routes exercised through the axum router.

use axum::http::{Method, StatusCode};
use domains::voting::EngineRules;
use domains::Role;
use integration_tests::http::{request, send};
use integration_tests::Harness;
use serde_json::json;

#[tokio::test]
async fn add_view_and_checkout() {
    let h = Harness::new(EngineRules::default());
    let buyer = h.user("buyer", Role::User, 1_000).await;
    let pack = h.item("Diamond Pack", 250, Some(3)).await;
    let token = h.token(&buyer);
    let app = h.router();

    let reply = send(
        &app,
        request(
            Method::POST,
            "/profile/cart",
            Some(&token),
            Some(json!({ "itemId": pack.id })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["items"][0]["quantity"], 1);

    let reply = send(
        &app,
        request(
            Method::PATCH,
            &format!("/profile/cart/{}", pack.id),
            Some(&token),
            Some(json!({ "quantity": 2 })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["totalCost"], 500);
    assert_eq!(reply.body["items"][0]["lineTotal"], 500);
    assert_eq!(reply.body["items"][0]["itemExists"], true);

    let reply = send(
        &app,
        request(Method::POST, "/profile/cart/checkout", Some(&token), None),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["newCoinBalance"], 500);
    let order_id = reply.body["orderId"].as_str().unwrap().to_owned();

    let cart = send(&app, request(Method::GET, "/profile/cart", Some(&token), None)).await;
    assert_eq!(cart.body["items"].as_array().unwrap().len(), 0);

    let order = send(
        &app,
        request(
            Method::GET,
            &format!("/profile/orders/{order_id}"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(order.status, StatusCode::OK);
    assert_eq!(order.body["status"], "completed");
    assert_eq!(order.body["totalAmount"], 500);
    assert_eq!(order.body["items"][0]["priceAtPurchase"], 250);
    assert_eq!(order.body["paymentDetails"]["coinBalanceAfter"], 500);

    let orders = send(&app, request(Method::GET, "/profile/orders", Some(&token), None)).await;
    assert_eq!(orders.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn checkout_errors_map_to_status_codes() {
    let h = Harness::new(EngineRules::default());
    let buyer = h.user("buyer", Role::User, 300).await;
    let pack = h.item("Diamond Pack", 250, Some(1)).await;
    let token = h.token(&buyer);
    let app = h.router();

    let empty = send(
        &app,
        request(Method::POST, "/profile/cart/checkout", Some(&token), None),
    )
    .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    send(
        &app,
        request(
            Method::POST,
            "/profile/cart",
            Some(&token),
            Some(json!({ "itemId": pack.id, "quantity": 2 })),
        ),
    )
    .await;
    let short = send(
        &app,
        request(Method::POST, "/profile/cart/checkout", Some(&token), None),
    )
    .await;
    assert_eq!(short.status, StatusCode::CONFLICT);
    assert_eq!(short.body["success"], false);
    assert!(short.body["error"]
        .as_str()
        .unwrap()
        .contains("Only 1 Diamond Pack(s) available"));

    h.cart.remove_from_cart(&buyer, pack.id).await.unwrap();
    let pricey = h.item("Hoodie", 1_200, None).await;
    h.cart.add_to_cart(&buyer, pricey.id, 1).await.unwrap();
    let broke = send(
        &app,
        request(Method::POST, "/profile/cart/checkout", Some(&token), None),
    )
    .await;
    assert_eq!(broke.status, StatusCode::BAD_REQUEST);
    assert_eq!(h.stored_user(buyer.user_id).await.coins, 300);
}

#[tokio::test]
async fn quantity_below_one_is_rejected() {
    let h = Harness::new(EngineRules::default());
    let buyer = h.user("buyer", Role::User, 0).await;
    let pack = h.item("Diamond Pack", 10, None).await;

    let reply = send(
        &h.router(),
        request(
            Method::POST,
            "/profile/cart",
            Some(&h.token(&buyer)),
            Some(json!({ "itemId": pack.id, "quantity": 0 })),
        ),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn foreign_order_is_hidden_and_refund_is_admin_only() {
    let h = Harness::new(EngineRules::default());
    let buyer = h.user("buyer", Role::User, 1_000).await;
    let stranger = h.user("stranger", Role::User, 0).await;
    let admin = h.user("admin", Role::Admin, 0).await;
    let pack = h.item("Diamond Pack", 400, None).await;
    h.cart.add_to_cart(&buyer, pack.id, 1).await.unwrap();
    let receipt = h.cart.checkout(&buyer).await.unwrap();
    let app = h.router();

    let peek = send(
        &app,
        request(
            Method::GET,
            &format!("/profile/orders/{}", receipt.order_id),
            Some(&h.token(&stranger)),
            None,
        ),
    )
    .await;
    assert_eq!(peek.status, StatusCode::NOT_FOUND);

    let uri = format!("/admin/orders/{}", receipt.order_id);
    let denied = send(
        &app,
        request(
            Method::PATCH,
            &uri,
            Some(&h.token(&buyer)),
            Some(json!({ "status": "refunded" })),
        ),
    )
    .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let refunded = send(
        &app,
        request(
            Method::PATCH,
            &uri,
            Some(&h.token(&admin)),
            Some(json!({ "status": "refunded" })),
        ),
    )
    .await;
    assert_eq!(refunded.status, StatusCode::OK);
    assert_eq!(refunded.body["status"], "refunded");
    assert_eq!(h.stored_user(buyer.user_id).await.coins, 1_000);

    let again = send(
        &app,
        request(
            Method::PATCH,
            &uri,
            Some(&h.token(&admin)),
            Some(json!({ "status": "cancelled" })),
        ),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}
