mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, data, TestApp};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};
use stockroom_api::entities::{stock_entry, stock_exit, stock_exit_item};

async fn adjust(app: &TestApp, product_id: i32, new_quantity: Value) -> (StatusCode, Value) {
    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/stock/adjust",
            Some(json!({
                "product_id": product_id,
                "new_quantity": new_quantity,
                "reason": "quarterly count"
            })),
        )
        .await;
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn count_above_stock_records_a_zero_value_entry() {
    let app = TestApp::new().await;
    let product = app.create_product("Toner").await;
    app.receive(product, 7).await;

    let (status, body) = adjust(&app, product, json!(12)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Stock increased by 5 to 12");
    assert_eq!(body["data"]["previous_stock"], 7);
    assert_eq!(body["data"]["action"]["kind"], "entry_recorded");

    let db = app.state.db.as_ref();
    let corrections = stock_entry::Entity::find()
        .filter(stock_entry::Column::ProductId.eq(product))
        .filter(stock_entry::Column::Quantity.eq(5))
        .all(db)
        .await
        .unwrap();
    assert_eq!(corrections.len(), 1);
    assert!(corrections[0].unit_value.is_zero());
    assert_eq!(
        corrections[0].notes.as_deref(),
        Some("inventory adjustment: quarterly count")
    );
    assert_eq!(app.stock_of(product).await, 12);
}

#[tokio::test]
async fn count_below_stock_records_one_adjustment_exit() {
    let app = TestApp::new().await;
    let product = app.create_product("Toner").await;
    app.receive(product, 7).await;

    let (status, body) = adjust(&app, product, json!("4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["difference"], -3);

    let db = app.state.db.as_ref();
    let exits = stock_exit::Entity::find().all(db).await.unwrap();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].ticket_number, "ADJUSTMENT");
    assert_eq!(exits[0].ticket_link, "N/A");
    assert_eq!(exits[0].requester_person_id, None);
    assert_eq!(exits[0].user_id, app.admin_id);

    let items = stock_exit_item::Entity::find().all(db).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 3);
    assert_eq!(app.stock_of(product).await, 4);

    // adjustment orders show up in the normal exit listing
    let response = app.as_user(Method::GET, "/api/v1/stock/exits", None).await;
    let listed = data(response).await;
    assert_eq!(listed[0]["ticket_number"], "ADJUSTMENT");
    assert_eq!(listed[0]["requester_name"], Value::Null);
}

#[tokio::test]
async fn matching_count_is_a_no_op() {
    let app = TestApp::new().await;
    let product = app.create_product("Toner").await;
    app.receive(product, 7).await;

    let (status, body) = adjust(&app, product, json!(7)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No adjustment needed");

    let db = app.state.db.as_ref();
    assert_eq!(stock_entry::Entity::find().count(db).await.unwrap(), 1);
    assert_eq!(stock_exit::Entity::find().count(db).await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_counts_and_unknown_products_are_rejected() {
    let app = TestApp::new().await;
    let product = app.create_product("Toner").await;

    for bad in [json!(-1), json!(1.5), json!("many"), Value::Null] {
        let (status, _) = adjust(&app, product, bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = adjust(&app, product + 1, json!(3)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = app
        .as_admin(
            Method::POST,
            "/api/v1/stock/adjust",
            Some(json!({"product_id": product, "new_quantity": 3})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn adjustment_is_admin_only() {
    let app = TestApp::new().await;
    let product = app.create_product("Toner").await;

    let response = app
        .as_user(
            Method::POST,
            "/api/v1/stock/adjust",
            Some(json!({"product_id": product, "new_quantity": 3, "reason": "count"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.stock_of(product).await, 0);
}

#[tokio::test]
async fn stock_always_equals_entries_minus_exit_items() {
    let app = TestApp::new().await;
    let product = app.create_product("Badge").await;
    let requester = app.create_requester("Jo", "Security").await;

    app.receive(product, 10).await;
    app.receive(product, 6).await;
    let response = app
        .as_user(
            Method::POST,
            "/api/v1/stock/exits",
            Some(common::exit_order(
                requester,
                json!([{"product_id": product, "quantity": 4}, {"product_id": product, "quantity": 2}]),
            )),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    adjust(&app, product, json!(3)).await;
    adjust(&app, product, json!(9)).await;

    let db = app.state.db.as_ref();
    let entered: i64 = stock_entry::Entity::find()
        .filter(stock_entry::Column::ProductId.eq(product))
        .all(db)
        .await
        .unwrap()
        .iter()
        .map(|e| i64::from(e.quantity))
        .sum();
    let exited: i64 = stock_exit_item::Entity::find()
        .filter(stock_exit_item::Column::ProductId.eq(product))
        .all(db)
        .await
        .unwrap()
        .iter()
        .map(|i| i64::from(i.quantity))
        .sum();

    assert_eq!(entered - exited, 9);
    assert_eq!(app.stock_of(product).await, entered - exited);
}
