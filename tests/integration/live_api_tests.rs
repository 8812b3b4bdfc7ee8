//! Tests against a running server.
//!
//! Start the server with `CATALOG_AUTH__BOOTSTRAP_ADMIN_LOGIN=admin` and
//! `CATALOG_AUTH__BOOTSTRAP_ADMIN_PASSWORD=admin`, then run
//! `cargo test --test live_api_tests -- --ignored`.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

async fn admin_token(client: &Client) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "login": "admin", "password": "admin" }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_equipment_requires_token() {
    let client = Client::new();

    let response = client
        .get(format!("{}/equipment", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_equipment_lifecycle() {
    let client = Client::new();
    let token = admin_token(&client).await;

    let site: Value = client
        .post(format!("{}/sites", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "name": unique("site") }))
        .send()
        .await
        .expect("Failed to create site")
        .json()
        .await
        .expect("Failed to parse site");

    let workshop: Value = client
        .post(format!("{}/workshops", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "name": "Workshop1", "site": site["id"] }))
        .send()
        .await
        .expect("Failed to create workshop")
        .json()
        .await
        .expect("Failed to parse workshop");

    let equipment_type: Value = client
        .post(format!("{}/equipment-types", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "name": unique("type") }))
        .send()
        .await
        .expect("Failed to create type")
        .json()
        .await
        .expect("Failed to parse type");

    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "name": "Valve0",
            "inventory_number": unique("INV"),
            "equipment_type": equipment_type["id"],
            "workshop": workshop["id"],
        }))
        .send()
        .await
        .expect("Failed to create equipment");
    assert_eq!(response.status(), StatusCode::CREATED);
    let equipment: Value = response.json().await.expect("Failed to parse equipment");
    assert_eq!(equipment["site"], site["id"]);

    let response = client
        .delete(format!("{}/workshops/{}", BASE_URL, workshop["id"]))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .delete(format!("{}/equipment/{}", BASE_URL, equipment["id"]))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client
        .delete(format!("{}/sites/{}", BASE_URL, site["id"]))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
