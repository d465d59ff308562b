//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod auth;
mod records;

use crate::auth::authorize;
use crate::config::Settings;
use crate::models::{CarInsurance, InsuranceCover, Property, PropertyInsurance, Resource};
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

const CORS_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    // Everything here requires a verified token and a permitted method
    let protected = Router::new()
        .merge(resource_routes::<Property>("/api/properties"))
        .merge(resource_routes::<CarInsurance>("/api/insuredcars"))
        .merge(resource_routes::<PropertyInsurance>("/api/propertyinsured"))
        .merge(resource_routes::<InsuranceCover>("/api/insuredcover"))
        .route("/api/insurance", get(records::insurance_overview))
        .route_layer(from_fn_with_state(state.clone(), authorize));

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Authentication routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth", post(auth::register).put(auth::login))

        .merge(protected)

        // Apply middleware and state
        .layer(middleware)
        .with_state(state)
}

/// List/create/update/delete routes for one resource collection
fn resource_routes<R: Resource>(path: &str) -> Router<SharedState> {
    Router::new()
        .route(
            path,
            get(records::list::<R>)
                .post(records::create::<R>)
                .put(records::update::<R>)
                .delete(records::remove::<R>),
        )
        .route(&format!("{}/{{id}}", path), get(records::get_one::<R>))
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(CORS_MAX_AGE);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, CorsConfig, ServerConfig};
    use crate::state::AppState;
    use crate::store::{MemoryCredentialStore, MemoryDocumentStore};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};
    use tower::ServiceExt;

    fn settings() -> Settings {
        Settings {
            server: ServerConfig::default(),
            database: None,
            cors: CorsConfig {
                allowed_origins: vec![],
            },
            auth: AuthConfig {
                bcrypt_cost: 4,
                ..AuthConfig::new("router-test-secret")
            },
        }
    }

    fn app() -> Router {
        let settings = settings();
        let state = Arc::new(AppState::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryDocumentStore::new()),
            &settings.auth,
        ));
        create_router(state, &settings)
    }

    async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register(app: &Router, username: &str, role: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{}@x.com", username),
                "password": "Secret123",
                "role": role,
                "firstName": "J",
                "lastName": "Doe"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_finance_can_read_but_not_delete_properties() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({
                "username": "jdoe",
                "email": "j@x.com",
                "password": "Secret123",
                "role": "finance",
                "firstName": "J",
                "lastName": "Doe"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["user"]["role"], "finance");
        assert!(body["data"]["user"].get("passwordHash").is_none());
        let token = body["data"]["token"].as_str().unwrap();

        let (status, body) = send(&app, "DELETE", "/api/properties?id=1", Some(token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Unauthorized: Insufficient permissions");

        let (status, body) = send(&app, "GET", "/api/properties", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(body["userRole"], "finance");
    }

    #[tokio::test]
    async fn test_missing_and_invalid_tokens_are_rejected() {
        let app = app();

        let (status, body) = send(&app, "GET", "/api/properties", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "No token provided");

        let (status, body) = send(&app, "GET", "/api/insurance", Some("not.a.token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid token");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_property_manager_crud_and_unique_reference() {
        let app = app();
        let token = register(&app, "pm", "property_manager").await;
        let property = json!({"propertyRef": "P-1", "propertyName": "Elm Court"});

        let (status, created) = send(&app, "POST", "/api/properties", Some(&token), Some(property.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["message"], "Property created successfully");
        let id = created["data"]["_id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "POST", "/api/properties", Some(&token), Some(property)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "propertyRef 'P-1' already exists");

        let (status, body) = send(
            &app,
            "PUT",
            "/api/properties",
            Some(&token),
            Some(json!({"_id": id, "propertyName": "Elm Court East"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["propertyName"], "Elm Court East");
        assert_eq!(body["data"]["propertyRef"], "P-1");

        let (status, body) = send(&app, "GET", &format!("/api/properties/{}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["propertyName"], "Elm Court East");

        let (status, _) = send(&app, "DELETE", &format!("/api/properties?id={}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "DELETE", &format!("/api/properties?id={}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Property not found");

        let (status, body) = send(&app, "DELETE", "/api/properties", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Property ID is required");
    }

    #[tokio::test]
    async fn test_validation_failures_carry_details() {
        let app = app();
        let token = register(&app, "pm", "property_manager").await;

        let (status, body) = send(&app, "POST", "/api/insuredcover", Some(&token), Some(json!({"coverId": "C-1"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Missing required fields: coverType, description, coverageAmount, premium, status"
        );

        let (status, body) = send(
            &app,
            "POST",
            "/api/insuredcover",
            Some(&token),
            Some(json!({
                "coverId": "C-1",
                "coverType": "Liability",
                "description": "Public liability cover",
                "coverageAmount": 100000,
                "premium": 0.5,
                "status": "paused"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"], json!(["Status must be either active or inactive"]));
    }

    #[tokio::test]
    async fn test_insurance_overview_counts_each_collection() {
        let app = app();
        let token = register(&app, "pm", "property_manager").await;
        let ceo = register(&app, "boss", "ceo").await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/propertyinsured",
            Some(&token),
            Some(json!({
                "propertyId": "P-1",
                "insuranceType": "Buildings",
                "coverage": 250000,
                "startDate": "2026-01-01",
                "endDate": "2027-01-01",
                "premium": 820,
                "status": "active"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, "GET", "/api/insurance", Some(&ceo), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["counts"], json!({"propertyInsurance": 1, "carInsurance": 0, "insuranceCover": 0}));
        assert_eq!(body["data"]["propertyInsurance"][0]["insuranceType"], "Buildings");

        let missing = format!("/api/propertyinsured?id={}", uuid::Uuid::new_v4());
        let (status, body) = send(&app, "DELETE", &missing, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Property insurance not found");

        let (status, body) = send(&app, "DELETE", "/api/insuredcover", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cover ID is required");

        // Read-only roles cannot write insurance records either
        let (status, _) = send(&app, "POST", "/api/insuredcover", Some(&ceo), Some(json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_login_flow_and_me() {
        let app = app();
        register(&app, "jdoe", "assistant").await;

        let (status, unknown) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "nobody@x.com", "password": "Secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (_, wrong) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "jdoe@x.com", "password": "nope"})),
        )
        .await;
        assert_eq!(unknown, wrong);

        let (status, body) = send(&app, "POST", "/api/auth/login", None, Some(json!({"email": "jdoe@x.com"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Email and password are required");

        // Legacy combined endpoint: PUT logs in
        let (status, body) = send(
            &app,
            "PUT",
            "/api/auth",
            None,
            Some(json!({"email": "jdoe@x.com", "password": "Secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["token"].as_str().unwrap();

        let (status, body) = send(&app, "GET", "/api/auth/me", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["username"], "jdoe");
        assert_eq!(body["data"]["user"]["isActive"], true);
        assert!(!body["data"]["user"]["lastLogin"].is_null());
        assert!(body["data"]["user"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_uses_error_envelope() {
        let app = app();
        assert_err!(serde_json::from_str::<Value>("{not json"));

        let request = Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = assert_ok!(app.oneshot(request).await);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(!body["error"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_preflight_is_answered_without_token() {
        let app = app();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/properties")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
