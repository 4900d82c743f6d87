//! HTTP-level tests: the real router over the in-memory store.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use techshop::api::{self, AppState, USER_ID_HEADER, USER_ROLE_HEADER};
use techshop::config::Config;
use techshop::domain::aggregates::{FixedReplyPicker, PaymentStatus, Product, AUTO_REPLIES};
use techshop::services::EventPublisher;
use techshop::store::{MemoryStore, Store};

struct TestApp {
    app: Router,
    store: MemoryStore,
    admin: Uuid,
}

fn test_app() -> TestApp {
    let store = MemoryStore::new();
    let state = AppState::with_reply_picker(
        Arc::new(store.clone()),
        EventPublisher::disabled(),
        &Config::default(),
        Arc::new(FixedReplyPicker(0)),
    );
    TestApp { app: api::app(state), store, admin: Uuid::now_v7() }
}

impl TestApp {
    fn product(&self, name: &str, price: i64, stock: i32) -> Product {
        let p = Product::new(name, price, stock);
        self.store.insert_product(p.clone()).unwrap();
        p
    }

    async fn stock(&self, p: &Product) -> i32 {
        self.store.product(p.id).await.unwrap().unwrap().stock
    }

    async fn call(&self, method: Method, uri: &str, user: Option<(Uuid, &str)>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = user {
            req = req.header(USER_ID_HEADER, id.to_string()).header(USER_ROLE_HEADER, role);
        }
        let req = match body {
            Some(b) => req.header("content-type", "application/json").body(Body::from(b.to_string())).unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = self.app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn admin(&self) -> Option<(Uuid, &'static str)> { Some((self.admin, "ADMIN")) }
}

fn customer(id: Uuid) -> Option<(Uuid, &'static str)> { Some((id, "CUSTOMER")) }

fn order_body(items: Value) -> Value {
    json!({
        "customerName": "Ada Lovelace",
        "customerEmail": "ada@example.com",
        "customerPhone": "+1 555 0100",
        "deliveryAddress": "12 Analytical Row",
        "deliveryCost": 500,
        "items": items,
    })
}

#[tokio::test]
async fn test_health() {
    let t = test_app();
    let (status, body) = t.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "techshop"}));
}

#[tokio::test]
async fn test_checkout_and_cancel_flow() {
    let t = test_app();
    let phone = t.product("Phone", 30_000, 2);
    let user = Uuid::now_v7();

    let (status, order) = t
        .call(Method::POST, "/api/orders", customer(user), Some(order_body(json!([{"productId": phone.id, "quantity": 2}]))))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["subtotal"], 60_000);
    assert_eq!(order["total"], 60_500);
    assert!(order["orderNumber"].as_str().unwrap().starts_with("TS-"));
    assert_eq!(t.stock(&phone).await, 0);

    let (status, body) = t
        .call(Method::POST, "/api/orders", customer(user), Some(order_body(json!([{"productId": phone.id, "quantity": 1}]))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Insufficient stock: Phone");

    let id = order["id"].as_str().unwrap().to_string();
    let (status, body) = t.call(Method::POST, &format!("/api/orders/{id}/cancel"), customer(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["needsRefund"], false);
    assert_eq!(t.stock(&phone).await, 2);

    let (status, _) = t.call(Method::POST, &format!("/api/orders/{id}/cancel"), customer(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(t.stock(&phone).await, 2);

    let (status, body) = t
        .call(Method::PATCH, &format!("/api/orders/{id}"), t.admin(), Some(json!({"status": "CONFIRMED"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_checkout_validation() {
    let t = test_app();
    let (status, body) = t.call(Method::POST, "/api/orders", None, Some(order_body(json!([])))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cart is empty");

    let mut bad_email = order_body(json!([{"productId": Uuid::now_v7(), "quantity": 1}]));
    bad_email["customerEmail"] = json!("not-an-email");
    let (status, _) = t.call(Method::POST, "/api/orders", None, Some(bad_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .call(Method::POST, "/api/orders", None, Some(order_body(json!([{"productId": Uuid::now_v7(), "quantity": 1}]))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Product is unavailable"));
}

#[tokio::test]
async fn test_oversized_amounts_are_bad_requests() {
    let t = test_app();
    let tv = t.product("TV", 90_000, 2);
    let mut body = order_body(json!([{"productId": tv.id, "quantity": 1}]));
    body["deliveryCost"] = json!(i64::MAX);
    let (status, body) = t.call(Method::POST, "/api/orders", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(t.stock(&tv).await, 2);

    let (status, _) = t.call(Method::POST, "/api/admin/promo", t.admin(), Some(json!({"code": "TEN", "value": 10}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = t
        .call(Method::POST, "/api/promo", None, Some(json!({"code": "TEN", "orderTotal": 4_000_000_000_000_000_000i64})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_ids_render_json_errors() {
    let t = test_app();
    let me = customer(Uuid::now_v7());
    for (method, uri, user) in [
        (Method::GET, "/api/orders/not-a-uuid", me),
        (Method::POST, "/api/orders/not-a-uuid/cancel", me),
        (Method::GET, "/api/reviews?productId=nope", None),
        (Method::GET, "/api/support/123", me),
        (Method::DELETE, "/api/admin/promo/xyz", t.admin()),
    ] {
        let (status, body) = t.call(method, uri, user, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_admin_cancels_paid_order() {
    let t = test_app();
    let a = t.product("Keyboard", 4_000, 3);
    let b = t.product("Monitor", 20_000, 1);
    let (_, order) = t
        .call(
            Method::POST,
            "/api/orders",
            None,
            Some(order_body(json!([{"productId": a.id, "quantity": 3}, {"productId": b.id, "quantity": 1}]))),
        )
        .await;
    let id: Uuid = order["id"].as_str().unwrap().parse().unwrap();
    t.store.set_payment_status(id, PaymentStatus::Paid).unwrap();

    let (status, body) = t
        .call(Method::PATCH, &format!("/api/orders/{id}"), customer(Uuid::now_v7()), Some(json!({"status": "CANCELLED"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, body) = t
        .call(Method::PATCH, &format!("/api/orders/{id}"), t.admin(), Some(json!({"status": "CANCELLED"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(body["paymentStatus"], "PAID");
    assert_eq!(body["needsRefund"], true);
    assert_eq!(body["restoredStock"], true);
    assert_eq!(t.stock(&a).await, 3);
    assert_eq!(t.stock(&b).await, 1);

    let (status, body) = t
        .call(Method::PATCH, &format!("/api/orders/{id}"), t.admin(), Some(json!({"paymentStatus": "REFUNDED"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paymentStatus"], "REFUNDED");
}

#[tokio::test]
async fn test_orders_require_identity() {
    let t = test_app();
    let (status, _) = t.call(Method::GET, "/api/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = t.call(Method::GET, "/api/orders?status=RETURNING", t.admin(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    let (status, _) = t.call(Method::GET, "/api/orders?status=LOST", t.admin(), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_promo_lifecycle() {
    let t = test_app();
    let (status, promo) = t
        .call(Method::POST, "/api/admin/promo", t.admin(), Some(json!({"code": " welcome ", "value": 10, "maxUses": 1})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(promo["code"], "WELCOME");
    assert_eq!(promo["type"], "PERCENTAGE");

    let (status, _) = t.call(Method::POST, "/api/admin/promo", t.admin(), Some(json!({"code": "WELCOME", "value": 5}))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, priced) = t.call(Method::POST, "/api/promo", None, Some(json!({"code": "welcome", "orderTotal": 10_000}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(priced["discount"], 1_000);

    let (status, body) = t.call(Method::POST, "/api/promo", None, Some(json!({"code": "nope", "orderTotal": 100}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Promo code not found");

    let tv = t.product("TV", 10_000, 5);
    let mut body = order_body(json!([{"productId": tv.id, "quantity": 1}]));
    body["promoCodeId"] = promo["id"].clone();
    body["discount"] = json!(1_000);
    let (status, order) = t.call(Method::POST, "/api/orders", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["discount"], 1_000);
    assert_eq!(order["total"], 9_500);

    let (status, body) = t.call(Method::POST, "/api/orders", None, Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Promo code usage limit reached");
    assert_eq!(t.stock(&tv).await, 4);

    let id = promo["id"].as_str().unwrap();
    let (status, _) = t.call(Method::DELETE, &format!("/api/admin/promo/{id}"), customer(Uuid::now_v7()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = t.call(Method::DELETE, &format!("/api/admin/promo/{id}"), t.admin(), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let (status, _) = t.call(Method::DELETE, &format!("/api/admin/promo/{id}"), t.admin(), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_review_gate() {
    let t = test_app();
    let p = t.product("Speaker", 6_000, 5);
    let user = Uuid::now_v7();
    let review = json!({"productId": p.id, "rating": 5, "comment": "Loud and clear"});

    let (status, _) = t.call(Method::POST, "/api/reviews", None, Some(review.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.call(Method::POST, "/api/reviews", customer(user), Some(review.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, order) = t
        .call(Method::POST, "/api/orders", customer(user), Some(order_body(json!([{"productId": p.id, "quantity": 1}]))))
        .await;
    let id = order["id"].as_str().unwrap();
    let (status, _) = t
        .call(Method::PATCH, &format!("/api/orders/{id}"), t.admin(), Some(json!({"status": "DELIVERED"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, created) = t.call(Method::POST, "/api/reviews", customer(user), Some(review.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["adminReply"], AUTO_REPLIES[0]);
    assert_eq!(created["isAutoReply"], true);

    let (status, _) = t.call(Method::POST, "/api/reviews", customer(user), Some(review)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let rid = created["id"].as_str().unwrap();
    let (status, replied) = t
        .call(Method::PATCH, &format!("/api/reviews/{rid}"), t.admin(), Some(json!({"adminReply": " Thanks! "})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replied["adminReply"], "Thanks!");
    assert_eq!(replied["isAutoReply"], false);

    let (status, listed) = t.call(Method::GET, &format!("/api/reviews?productId={}", p.id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    let (status, _) = t.call(Method::GET, "/api/reviews", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_support_chat() {
    let t = test_app();
    let user = Uuid::now_v7();
    let (status, chat) = t.call(Method::GET, "/api/support", customer(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chat["status"], "open");
    assert_eq!(chat["pollIntervalSecs"], 5);
    let chat_id = chat["id"].as_str().unwrap().to_string();

    let (status, msg) = t
        .call(Method::POST, "/api/support", customer(user), Some(json!({"chatId": chat_id, "content": "Where is my parcel?"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(msg["isAdmin"], false);

    let (status, _) = t.call(Method::GET, "/api/support/admin", customer(user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t
        .call(Method::POST, "/api/support/admin", t.admin(), Some(json!({"chatId": chat_id, "content": "On its way"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, inbox) = t.call(Method::GET, "/api/support/admin", t.admin(), None).await;
    assert_eq!(inbox[0]["messages"].as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["messages"][0]["content"], "On its way");

    let (status, again) = t.call(Method::GET, &format!("/api/support/{chat_id}"), customer(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["messages"].as_array().unwrap().len(), 2);

    let (status, _) = t.call(Method::GET, &format!("/api/support/{chat_id}"), customer(Uuid::now_v7()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
