//! Webhook HTTP server handlers
//!
//! Implements the ValidatingAdmissionWebhook endpoint for
//! HierarchyConfiguration resources.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use k8s_openapi::api::authentication::v1::UserInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::policies::{DenialCode, ValidationResult, reasons};
use super::validator::{HierarchyRequest, Validator};
use crate::crd::HierarchyConfiguration;

/// Path the API server posts HierarchyConfiguration reviews to
pub const VALIDATE_HIERARCHY_PATH: &str = "/validate-hnc-x-k8s-io-v1alpha2-hierarchyconfigurations";

/// Kubernetes AdmissionReview request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    pub api_version: String,
    pub kind: String,
    pub request: Option<AdmissionRequest>,
}

/// AdmissionRequest contains the details of the admission request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    #[serde(default)]
    pub kind: Option<RequestKind>,
    pub operation: String,
    pub namespace: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub user_info: UserInfo,
    pub object: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// AdmissionReview response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

/// AdmissionResponse contains the result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionStatus {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared state for webhook handlers
pub(crate) struct WebhookState {
    pub validator: Validator,
}

impl WebhookState {
    pub fn new(validator: Validator) -> Self {
        Self { validator }
    }
}

/// Create the webhook router
pub(crate) fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATE_HIERARCHY_PATH, post(validate_hierarchy_configuration))
        .with_state(state)
}

/// Validate HierarchyConfiguration admission webhook handler
pub(crate) async fn validate_hierarchy_configuration(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> impl IntoResponse {
    let request = match review.request {
        Some(req) => req,
        None => {
            error!("Admission review missing request");
            let result = ValidationResult::denied(
                DenialCode::BadRequest,
                reasons::MALFORMED_REQUEST,
                "Missing request in AdmissionReview",
            );
            return (StatusCode::BAD_REQUEST, Json(create_response("", &result)));
        }
    };

    let uid = request.uid.clone();
    info!(
        uid = %uid,
        operation = %request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        user = ?request.user_info.username,
        "Processing admission request"
    );

    // Deleting a hierarchy leaves the namespace a root, which is always legal
    if request.operation == "DELETE" {
        info!(uid = %uid, "DELETE operation allowed");
        return (
            StatusCode::OK,
            Json(create_response(&uid, &ValidationResult::allowed())),
        );
    }

    let hierarchy_request = match parse_request(request) {
        Ok(req) => req,
        Err(message) => {
            warn!(uid = %uid, message = %message, "Malformed admission request");
            let result =
                ValidationResult::denied(DenialCode::BadRequest, reasons::MALFORMED_REQUEST, &message);
            return (StatusCode::OK, Json(create_response(&uid, &result)));
        }
    };

    let result = state.validator.handle(&hierarchy_request).await;

    if result.allowed {
        info!(uid = %uid, "Admission request allowed");
    } else {
        warn!(
            uid = %uid,
            code = result.status_code(),
            reason = %result.reason(),
            message = %result.message(),
            "Admission request denied"
        );
    }
    (StatusCode::OK, Json(create_response(&uid, &result)))
}

/// Decode the HierarchyConfiguration carried by an admission request
pub(crate) fn parse_request(request: AdmissionRequest) -> Result<HierarchyRequest, String> {
    let object = request
        .object
        .ok_or_else(|| "Missing object in request".to_string())?;
    let hc: HierarchyConfiguration = serde_json::from_value(object)
        .map_err(|e| format!("Failed to parse HierarchyConfiguration: {}", e))?;
    HierarchyRequest::from_object(&hc, request.namespace.as_deref(), request.user_info)
}

/// Create an AdmissionReview response
pub(crate) fn create_response(uid: &str, result: &ValidationResult) -> AdmissionReviewResponse {
    AdmissionReviewResponse {
        api_version: "admission.k8s.io/v1".to_string(),
        kind: "AdmissionReview".to_string(),
        response: AdmissionResponse {
            uid: uid.to_string(),
            allowed: result.allowed,
            status: if result.allowed {
                None
            } else {
                Some(AdmissionStatus {
                    code: result.status_code(),
                    message: result.message().to_string(),
                    reason: result.reason.clone(),
                })
            },
        },
    }
}

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:8443 and serves [`VALIDATE_HIERARCHY_PATH`].
///
/// # Arguments
/// * `validator` - Decides each admission request
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
pub async fn run_webhook_server(
    validator: Validator,
    cert_path: &str,
    key_path: &str,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let state = Arc::new(WebhookState::new(validator));
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!("Webhook server listening on {} with TLS", addr);

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}

/// Errors that can occur when running the webhook server
#[derive(Debug)]
pub enum WebhookError {
    /// TLS configuration error
    TlsConfig(String),
    /// Server error
    Server(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::TlsConfig(msg) => write!(f, "TLS configuration error: {}", msg),
            WebhookError::Server(msg) => write!(f, "Webhook server error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}
