#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parkcart_rs::{
    config::ServerConfig,
    create_app,
    models::Commodity,
    repositories::InMemoryCartRepository,
    services::CartService,
    Metrics,
};
use reqwest::Client;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const VISITOR_ID: i32 = 7;
pub const T_SHIRT_ID: i32 = 3;
pub const MUG_ID: i32 = 4;
pub const SOLD_OUT_ID: i32 = 5;

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub repository: Arc<InMemoryCartRepository>,
}

pub fn test_catalog() -> Vec<Commodity> {
    vec![
        Commodity::new(T_SHIRT_ID, "Park T-Shirt", dec!(19.99), 5)
            .with_image_url("https://cdn.example.com/shirt.png"),
        Commodity::new(MUG_ID, "Souvenir Mug", dec!(9.50), 100),
        Commodity::new(SOLD_OUT_ID, "Mascot Plush", dec!(24.00), 0),
    ]
}

fn test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 8080,
        request_timeout_seconds: 5,
        max_request_size: 16 * 1024,
    }
}

impl TestEnvironment {
    pub async fn new() -> Self {
        let repository = Arc::new(InMemoryCartRepository::with_commodities(test_catalog()));
        let cart_service = Arc::new(CartService::new(repository.clone()));
        let metrics = Arc::new(Metrics::new().expect("Failed to create metrics"));
        let app = create_app(cart_service, metrics, &test_server_config());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            client: Client::new(),
            base_url,
            repository,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST /api/cart/add and return status and body
    pub async fn add(&self, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url("/api/cart/add"))
            .json(&body)
            .send()
            .await
            .expect("Failed to send request");
        let status = response.status().as_u16();
        (status, response.json().await.expect("Failed to parse response"))
    }

    pub async fn add_item(&self, commodity_type_id: i32, quantity: i32, size: Option<&str>) -> (u16, Value) {
        self.add(json!({
            "visitorId": VISITOR_ID,
            "commodityTypeId": commodity_type_id,
            "quantity": quantity,
            "size": size,
        }))
        .await
    }

    pub async fn list(&self, visitor_id: i32) -> Vec<Value> {
        let response = self
            .client
            .get(self.url(&format!("/api/cart/{}", visitor_id)))
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.expect("Failed to parse response")
    }
}
