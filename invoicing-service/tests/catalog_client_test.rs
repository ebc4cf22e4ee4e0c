//! Stock service client against a mocked stock service.

mod common;

use invoicing_service::services::{
    Catalog, CatalogError, LedgerError, StockDecrement, StockLedger, StockServiceClient,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> StockServiceClient {
    common::init_tracing();
    StockServiceClient::new(server.uri(), Duration::from_secs(2), Duration::from_secs(2))
}

async fn serve_pen(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/product/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "name": "Pen",
            "description": "",
            "price": 10.0,
            "balance": 5
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetch_product_reads_name_and_price() {
    let server = MockServer::start().await;
    serve_pen(&server).await;

    let product = client(&server).fetch_product("p1").await.unwrap();

    assert_eq!(product.name, "Pen");
    assert_eq!(product.price, rust_decimal::Decimal::TEN);
}

#[tokio::test]
async fn product_id_is_sent_as_a_single_path_segment() {
    let server = MockServer::start().await;
    serve_pen(&server).await;
    let client = client(&server);

    for id in ["p1?x", "p1#frag", "x/../p1", "p1/"] {
        let result = client.fetch_product(id).await;
        assert!(
            matches!(result, Err(CatalogError::NotFound(ref missing)) if missing == id),
            "{id} resolved to {result:?}"
        );
    }

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert!(paths.contains(&"/product/p1%3Fx"), "paths: {paths:?}");
    assert!(paths.contains(&"/product/x%2F..%2Fp1"), "paths: {paths:?}");
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/stock/products/balance-update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Stock updated for 1 products"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = StockServiceClient::new(
        format!("{}/stock/", server.uri()),
        Duration::from_secs(2),
        Duration::from_secs(2),
    );

    client
        .decrement_balances(&[StockDecrement::new("p1", 1)])
        .await
        .unwrap();
}

#[tokio::test]
async fn conflict_maps_to_insufficient_stock() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/products/balance-update"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "success": false,
            "error": "Insufficient stock for product: p2",
            "product_id": "p2"
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .decrement_balances(&[StockDecrement::new("p2", 1)])
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientStock(ref id) if id == "p2"));
}
