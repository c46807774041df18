//! HTTP surface for the credential lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use gatekeep_core::ValidationError;
use gatekeep_core::validation::require_fields;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info};

use crate::ServerError;
use crate::auth::{AuthError, CredentialOrchestrator};

/// Usage scope reported when the caller gives none.
pub const DEFAULT_USAGE_SCOPE: &str = "partner_api";

const SIGNUP_NOTE: &str = "JWT secret is generated and stored by Kong; Gatekeep stores only IDs.";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address.
    pub bind_address: String,
    /// Allow cross-origin requests.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            bind_address: "0.0.0.0".to_string(),
            cors: true,
        }
    }
}

impl From<&gatekeep_core::config::ServerConfig> for ServerConfig {
    fn from(config: &gatekeep_core::config::ServerConfig) -> Self {
        Self {
            port: config.port,
            bind_address: config.bind.clone(),
            cors: true,
        }
    }
}

/// Auth HTTP server.
pub struct AuthServer {
    config: ServerConfig,
    orchestrator: Arc<CredentialOrchestrator>,
}

impl AuthServer {
    /// Create a server around an orchestrator.
    #[must_use]
    pub fn new(config: ServerConfig, orchestrator: Arc<CredentialOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Build the router.
    #[must_use]
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.orchestrator), self.config.cors)
    }

    /// Run until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| ServerError::Config(format!("Invalid address: {e}")))?;

        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Auth API listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

/// Build the `/auth` router.
#[must_use]
pub fn router(orchestrator: Arc<CredentialOrchestrator>, cors: bool) -> Router {
    let app = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/apikey", post(apikey_handler))
        .route("/auth/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator);

    if cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Error response: `{"error": message}` with a status derived from the error kind.
#[derive(Debug)]
struct ApiError(AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(AuthError::Validation(err))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            AuthError::Validation(ValidationError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AuthError::Persistence(_) | AuthError::Token(_) | AuthError::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.0.to_string();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %message, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Default, Deserialize)]
struct CredentialsBody {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Default, Deserialize)]
struct LogoutBody {
    email: Option<String>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyBody {
    user_id: Option<String>,
    usage_scope: Option<String>,
}

/// Parse a JSON body, treating anything unreadable as an empty object.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

fn decode_password(encoded: &str) -> Result<String, ValidationError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ValidationError::InvalidEncoding(format!("password is not base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|_| ValidationError::InvalidEncoding("password is not UTF-8".to_string()))
}

/// Pull the required credentials out of a body.
fn credentials(body: CredentialsBody) -> Result<(String, String), ValidationError> {
    require_fields(&[
        ("email", body.email.as_deref()),
        ("password", body.password.as_deref()),
    ])?;
    let email = body.email.unwrap_or_default();
    let password = decode_password(&body.password.unwrap_or_default())?;
    Ok((email, password))
}

async fn signup_handler(
    State(orchestrator): State<Arc<CredentialOrchestrator>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) = credentials(parse_body(&body))?;
    let outcome = orchestrator.signup(&email, &password).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "userId": outcome.identity, "note": SIGNUP_NOTE })),
    ))
}

async fn login_handler(
    State(orchestrator): State<Arc<CredentialOrchestrator>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let (email, password) = credentials(parse_body(&body))?;
    let outcome = orchestrator.login(&email, &password).await?;

    Ok(Json(outcome))
}

async fn logout_handler(
    State(orchestrator): State<Arc<CredentialOrchestrator>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: LogoutBody = parse_body(&body);
    require_fields(&[("email", body.email.as_deref())])?;
    let email = body.email.unwrap_or_default();

    let outcome = orchestrator.logout(&email).await?;
    Ok(Json(outcome))
}

async fn apikey_handler(
    State(orchestrator): State<Arc<CredentialOrchestrator>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let body: ApiKeyBody = parse_body(&body);
    require_fields(&[("userId", body.user_id.as_deref())])?;
    let user_id = body.user_id.unwrap_or_default();
    let usage_scope = body
        .usage_scope
        .unwrap_or_else(|| DEFAULT_USAGE_SCOPE.to_string());

    let outcome = orchestrator.generate_api_key(&user_id, &usage_scope).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "userId": outcome.identity,
            "api_key": outcome.key,
            "consumer_id": outcome.consumer_id,
            "usage_scope": outcome.usage_scope,
        })),
    ))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, UserStore};
    use crate::testutil::FakeGateway;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app() -> (TempDir, Arc<FakeGateway>, Router) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(UserStore::open(dir.path()).unwrap());
        let gateway = Arc::new(FakeGateway::new());
        let orchestrator = Arc::new(CredentialOrchestrator::new(
            gateway.clone(),
            store,
            AuthConfig::default(),
        ));
        (dir, gateway, router(orchestrator, true))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        call(app, "POST", uri, Body::from(body.to_string())).await
    }

    fn creds(email: &str, password: &str) -> Value {
        json!({ "email": email, "password": STANDARD.encode(password) })
    }

    #[tokio::test]
    async fn test_healthz() {
        let (_dir, _gateway, app) = app();
        let (status, body) = call(&app, "GET", "/auth/healthz", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_signup_and_conflict() {
        let (_dir, _gateway, app) = app();

        let (status, body) = post_json(&app, "/auth/signup", creds("a@x.com", "Passw0rd!")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["userId"], "a@x.com");

        let (status, body) = post_json(&app, "/auth/signup", creds("a@x.com", "Passw0rd!")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, json!({ "error": "User already exists" }));
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let (_dir, _gateway, app) = app();

        let (status, body) = post_json(&app, "/auth/signup", json!({ "email": "a@x.com" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": r#"Missing fields: ["password"]"# }));

        let (status, body) = call(&app, "POST", "/auth/login", Body::from("not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "error": r#"Missing fields: ["email", "password"]"# })
        );

        let (status, _) = post_json(&app, "/auth/apikey", json!({ "userId": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (_dir, _gateway, app) = app();

        let (status, body) = post_json(
            &app,
            "/auth/signup",
            json!({ "email": "a@x.com", "password": "%%%" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("base64"));

        let (status, body) = post_json(&app, "/auth/signup", creds("nope", "Passw0rd!")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid email format" }));

        let (status, _) = post_json(&app, "/auth/login", creds("a@x.com", "weak")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login_flow() {
        let (_dir, _gateway, app) = app();
        post_json(&app, "/auth/signup", creds("a@x.com", "Passw0rd!")).await;

        let (status, body) = post_json(&app, "/auth/login", creds("a@x.com", "Passw0rd!")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "Bearer");
        assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));

        let (status, body) = post_json(&app, "/auth/login", creds("a@x.com", "Wr0ngpass!")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            json!({ "error": "Invalid credentials Or User Not Exist" })
        );

        let (status, _) = post_json(&app, "/auth/login", creds("b@x.com", "Passw0rd!")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_apikey_and_logout() {
        let (_dir, gateway, app) = app();
        post_json(&app, "/auth/signup", creds("a@x.com", "Passw0rd!")).await;
        post_json(&app, "/auth/login", creds("a@x.com", "Passw0rd!")).await;

        let (status, body) = post_json(&app, "/auth/apikey", json!({ "userId": "a@x.com" })).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["userId"], "a@x.com");
        assert_eq!(body["usage_scope"], DEFAULT_USAGE_SCOPE);
        assert_eq!(body["api_key"].as_str().map(str::len), Some(32));
        assert_eq!(body["consumer_id"], json!(gateway.consumer_id("a@x.com")));

        let (status, body) = post_json(
            &app,
            "/auth/apikey",
            json!({ "userId": "a@x.com", "usageScope": "internal_reports" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["usage_scope"], "internal_reports");

        let (status, body) = post_json(&app, "/auth/logout", json!({ "email": "a@x.com" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            "Logout successful. Please delete your token on the client."
        );

        // consumer is gone, so the gateway refuses new keys
        let (status, _) = post_json(&app, "/auth/apikey", json!({ "userId": "a@x.com" })).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (_dir, _gateway, app) = app();

        let (status, body) = post_json(&app, "/auth/logout", json!({ "email": "a@x.com" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "error": "User not found" }));

        let (status, _) = post_json(&app, "/auth/apikey", json!({ "userId": "a@x.com" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_bad_gateway() {
        let (_dir, gateway, app) = app();
        post_json(&app, "/auth/signup", creds("a@x.com", "Passw0rd!")).await;

        gateway.fail_next("create_consumer", 503);
        let (status, body) = post_json(&app, "/auth/login", creds("a@x.com", "Passw0rd!")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Kong Admin API error: 503")
        );
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (_dir, _gateway, app) = app();
        let request = Request::builder()
            .method("GET")
            .uri("/auth/healthz")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(
            response
                .headers()
                .contains_key("access-control-allow-origin")
        );
    }
}
