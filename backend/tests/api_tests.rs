//! HTTP API tests
//!
//! Drives the full router (auth middleware, handlers, error rendering) with
//! `oneshot` requests against the in-memory store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use stock_ledger_backend::config::{
    AgingConfig, Config, DatabaseConfig, JwtConfig, LedgerConfig, ServerConfig,
};
use stock_ledger_backend::store::MemoryLedgerStore;
use stock_ledger_backend::{create_app, AppState};

const SECRET: &str = "test-secret";

fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
            lock_timeout_ms: 1000,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        ledger: LedgerConfig::default(),
        aging: AgingConfig::default(),
    }
}

fn test_app() -> Router {
    let store = MemoryLedgerStore::new();
    create_app(AppState::new(Arc::new(store), test_config()))
}

fn token_for(user_id: Uuid, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "sub": user_id.to_string(),
        "iat": now,
        "exp": now + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn token() -> String {
    token_for(Uuid::new_v4(), SECRET)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, token: &str, item_id: &str) {
    let (status, _) = send(
        app,
        Method::PUT,
        &format!("/api/v1/items/{}", item_id),
        Some(json!({ "name": "Widget" })),
        Some(token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

async fn receive(app: &Router, token: &str, item_id: &str, quantity: i64) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/stock/in",
        Some(json!({ "item_id": item_id, "quantity": quantity, "reason": "purchase" })),
        Some(token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

// ============================================================================
// Public endpoints and authentication
// ============================================================================

#[cfg(test)]
mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_is_public() {
        let app = test_app();
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    /// Ledger endpoints require a bearer token
    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let app = test_app();
        let (status, body) = send(&app, Method::GET, "/api/v1/movements", None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_token_with_wrong_secret_is_rejected() {
        let app = test_app();
        let forged = token_for(Uuid::new_v4(), "another-secret");
        let (status, _) = send(
            &app,
            Method::GET,
            "/api/v1/movements",
            None,
            Some(&forged),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

// ============================================================================
// Stock flow
// ============================================================================

#[cfg(test)]
mod stock_flow_tests {
    use super::*;

    /// Two receipts, one multi-batch issue, then balance and batch views agree
    #[tokio::test]
    async fn test_fifo_flow_over_http() {
        let app = test_app();
        let token = token();
        register(&app, &token, "SKU-1").await;

        let first = receive(&app, &token, "SKU-1", 5).await;
        let second = receive(&app, &token, "SKU-1", 5).await;
        assert_eq!(second["new_balance"], 10);

        let (status, out) = send(
            &app,
            Method::POST,
            "/api/v1/stock/out",
            Some(json!({ "item_id": "SKU-1", "quantity": 7, "reason": "sale" })),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(out["new_balance"], 3);
        let consumed = out["consumed_batches"].as_array().unwrap();
        assert_eq!(consumed.len(), 2);
        assert_eq!(consumed[0]["batch_number"], first["batch_number"]);
        assert_eq!(consumed[0]["quantity"], 5);
        assert_eq!(consumed[1]["batch_number"], second["batch_number"]);
        assert_eq!(consumed[1]["quantity"], 2);
        assert!(out["movement_id"].is_string());
        assert!(out["damage_id"].is_null());

        let (_, item) = send(&app, Method::GET, "/api/v1/items/SKU-1", None, Some(&token)).await;
        assert_eq!(item["quantity"], 3);

        let (_, report) = send(
            &app,
            Method::GET,
            "/api/v1/items/SKU-1/reconciliation",
            None,
            Some(&token),
        )
        .await;
        assert_eq!(report["consistent"], true);
        assert_eq!(report["batch_total"], 3);

        let (_, batches) = send(
            &app,
            Method::GET,
            "/api/v1/batches?item_id=SKU-1&status=active",
            None,
            Some(&token),
        )
        .await;
        let batches = batches.as_array().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0]["quantity_remaining"], 3);

        let (_, aging) = send(
            &app,
            Method::GET,
            "/api/v1/aging?item_id=SKU-1",
            None,
            Some(&token),
        )
        .await;
        let aging = aging.as_array().unwrap();
        assert_eq!(aging.len(), 2);
        assert_eq!(aging[0]["status"], "empty");
        assert_eq!(aging[1]["status"], "good");
        assert_eq!(aging[1]["days_in_stock"], 0);
    }

    /// Over-draw renders a 422 with the shortfall details
    #[tokio::test]
    async fn test_insufficient_stock_response() {
        let app = test_app();
        let token = token();
        register(&app, &token, "SKU-2").await;
        receive(&app, &token, "SKU-2", 2).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/stock/out",
            Some(json!({ "item_id": "SKU-2", "quantity": 3, "reason": "sale" })),
            Some(&token),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["error"]["details"]["requested"], 3);
        assert_eq!(body["error"]["details"]["available"], 2);
    }

    #[tokio::test]
    async fn test_validation_response() {
        let app = test_app();
        let token = token();
        register(&app, &token, "SKU-3").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/stock/in",
            Some(json!({ "item_id": "SKU-3", "quantity": 0, "reason": "purchase" })),
            Some(&token),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], "quantity");
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let app = test_app();
        let token = token();

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/stock/in",
            Some(json!({ "item_id": "GHOST", "quantity": 1, "reason": "purchase" })),
            Some(&token),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    /// Damage rows land in /damages and stay out of /movements
    #[tokio::test]
    async fn test_damage_endpoints() {
        let app = test_app();
        let token = token();
        register(&app, &token, "SKU-4").await;
        receive(&app, &token, "SKU-4", 10).await;

        let (status, out) = send(
            &app,
            Method::POST,
            "/api/v1/stock/out",
            Some(json!({
                "item_id": "SKU-4",
                "quantity": 4,
                "reason": "damage",
                "damage_reason": "Crushed in transit",
            })),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(out["movement_id"].is_null());
        assert!(out["damage_id"].is_string());

        let (_, movements) = send(
            &app,
            Method::GET,
            "/api/v1/movements?item_id=SKU-4",
            None,
            Some(&token),
        )
        .await;
        let movements = movements.as_array().unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0]["direction"], "in");

        let (_, damages) = send(
            &app,
            Method::GET,
            "/api/v1/damages?item_id=SKU-4",
            None,
            Some(&token),
        )
        .await;
        let damages = damages.as_array().unwrap();
        assert_eq!(damages.len(), 1);
        assert_eq!(damages[0]["damage_reason"], "Crushed in transit");
        assert_eq!(damages[0]["quantity"], 4);
    }

    #[tokio::test]
    async fn test_inverted_date_range_is_rejected() {
        let app = test_app();
        let token = token();

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/v1/movements?date_from=2024-02-01&date_to=2024-01-01",
            None,
            Some(&token),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}

// ============================================================================
// Batch deletion
// ============================================================================

#[cfg(test)]
mod batch_delete_tests {
    use super::*;

    /// 409 while stock remains, 204 once empty, 404 afterwards
    #[tokio::test]
    async fn test_delete_batch_lifecycle() {
        let app = test_app();
        let token = token();
        register(&app, &token, "SKU-5").await;
        let receipt = receive(&app, &token, "SKU-5", 3).await;
        let uri = format!("/api/v1/batches/{}", receipt["batch_id"].as_str().unwrap());

        let (status, body) = send(&app, Method::DELETE, &uri, None, Some(&token)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/stock/out",
            Some(json!({ "item_id": "SKU-5", "quantity": 3, "reason": "transfer" })),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, Method::DELETE, &uri, None, Some(&token)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        let (status, _) = send(&app, Method::DELETE, &uri, None, Some(&token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
