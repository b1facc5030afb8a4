//! HTTP adapter for the tally service
//!
//! JSON over HTTP. Ciphertexts and the public-key bundle travel as standard
//! base64 of the binary envelope in [`crate::wire`]. Every response carries
//! permissive CORS headers and `OPTIONS` preflights are answered with 204.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::accumulator::Accumulator;
use crate::context::CryptoContext;
use crate::error::{param_err, Result, TallyError};
use crate::evaluator::Evaluator;
use crate::rlwe::{Ciphertext, Decryptor, Encryptor, KeyId, KeyMaterial};
use crate::wire;

/// Default request body limit (16 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 << 20;

/// Everything the handlers share
pub struct TallyService {
    ctx: Arc<CryptoContext>,
    accumulator: Accumulator,
    decryptor: Decryptor,
    evaluator: Evaluator,
    key_id: KeyId,
    public_key_base64: String,
}

impl TallyService {
    /// Build the service from freshly generated key material
    ///
    /// The secret key moves into the decryptor; the public-key bundle is
    /// encoded once here.
    pub fn new(ctx: Arc<CryptoContext>, mut keys: KeyMaterial) -> Result<Self> {
        let secret_key = keys
            .secret_key
            .take()
            .ok_or_else(|| param_err!("the tally server needs the secret key"))?;

        let public_key_base64 = wire::to_base64(&keys.public_bundle(&ctx))?;
        let key_id = keys.public_key.key_id;
        let decryptor = Decryptor::new(Arc::clone(&ctx), secret_key, &keys.public_key)?;
        let encryptor = Encryptor::new(Arc::clone(&ctx), keys.public_key)?;

        Ok(Self {
            accumulator: Accumulator::new(encryptor),
            evaluator: Evaluator::new(Arc::clone(&ctx)),
            ctx,
            decryptor,
            key_id,
            public_key_base64,
        })
    }

    /// Shared context
    pub fn context(&self) -> &Arc<CryptoContext> {
        &self.ctx
    }

    /// The accumulator behind `/api/submit`
    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Base64 envelope of the public-key bundle served at `/api/key`
    pub fn public_key_base64(&self) -> &str {
        &self.public_key_base64
    }
}

impl std::fmt::Debug for TallyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TallyService")
            .field("key_id", &self.key_id)
            .field("accumulator", &self.accumulator)
            .finish_non_exhaustive()
    }
}

/// Error body: a message plus the stable error class
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,
    /// One of `malformed`, `incompatible`, `capacity`, `encoding_range`,
    /// `parameter`, `internal`
    pub kind: String,
}

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn internal(err: TallyError) -> Self {
        error!(error = %err, "internal error");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: err.to_string(),
        }
    }
}

impl From<TallyError> for ApiError {
    fn from(err: TallyError) -> Self {
        let status = match &err {
            TallyError::Serialization(_)
            | TallyError::InvalidCiphertext(_)
            | TallyError::EncodingRange { .. } => StatusCode::BAD_REQUEST,
            TallyError::IncompatibleCiphertext(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TallyError::NoiseBudgetExhausted { .. } => StatusCode::CONFLICT,
            TallyError::Parameter(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            kind: "malformed",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// `GET /api/params`
#[derive(Debug, Serialize, Deserialize)]
pub struct ParamsResponse {
    pub poly_degree: usize,
    pub coeff_modulus_bits: Vec<usize>,
    /// Data primes then the special prime, as decimal strings
    pub primes: Vec<String>,
    pub scale: f64,
    pub max_value: f64,
    pub max_submissions: u64,
    pub precision_digits: u32,
    pub security_level: u32,
    pub parms_id: String,
    pub key_id: String,
}

/// `GET /api/key`
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyResponse {
    pub public_key: String,
}

/// `POST /api/submit` body
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub ciphertext: String,
}

/// `POST /api/submit` response
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub count: u64,
}

/// `POST /api/tally` response
#[derive(Debug, Serialize, Deserialize)]
pub struct TallyResponse {
    pub sum: f64,
    pub count: u64,
    pub epoch: u64,
}

/// `POST /api/reset` response
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub status: String,
    pub epoch: u64,
}

/// `POST /api/add` body
#[derive(Debug, Serialize, Deserialize)]
pub struct AddRequest {
    pub cipher1: String,
    pub cipher2: String,
}

/// `POST /api/add` response
#[derive(Debug, Serialize, Deserialize)]
pub struct AddResponse {
    pub result: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_params(State(service): State<Arc<TallyService>>) -> Json<ParamsResponse> {
    let ctx = &service.ctx;
    let params = ctx.params();
    Json(ParamsResponse {
        poly_degree: params.poly_degree,
        coeff_modulus_bits: params.coeff_modulus_bits.clone(),
        primes: ctx.primes().iter().map(|q| q.to_string()).collect(),
        scale: params.scale,
        max_value: params.max_value,
        max_submissions: params.max_submissions,
        precision_digits: params.precision_digits,
        security_level: params.security_level.bits(),
        parms_id: ctx.parms_id(ctx.top_level()).to_hex(),
        key_id: service.key_id.to_hex(),
    })
}

async fn get_key(State(service): State<Arc<TallyService>>) -> Json<KeyResponse> {
    Json(KeyResponse {
        public_key: service.public_key_base64.clone(),
    })
}

async fn submit(
    State(service): State<Arc<TallyService>>,
    body: std::result::Result<Json<SubmitRequest>, JsonRejection>,
) -> std::result::Result<Json<SubmitResponse>, ApiError> {
    let Json(request) = body?;
    let ct: Ciphertext = wire::from_base64(&request.ciphertext)?;
    let count = service.accumulator.add(&ct)?;
    Ok(Json(SubmitResponse { count }))
}

async fn tally(
    State(service): State<Arc<TallyService>>,
) -> std::result::Result<Json<TallyResponse>, ApiError> {
    let snapshot = service.accumulator.snapshot();
    let sum = service
        .decryptor
        .decrypt(&snapshot.ciphertext)
        .map_err(ApiError::internal)?;
    Ok(Json(TallyResponse {
        sum,
        count: snapshot.count,
        epoch: snapshot.epoch,
    }))
}

async fn reset(State(service): State<Arc<TallyService>>) -> Json<ResetResponse> {
    let epoch = service.accumulator.reset();
    Json(ResetResponse {
        status: "reset".to_string(),
        epoch,
    })
}

async fn add(
    State(service): State<Arc<TallyService>>,
    body: std::result::Result<Json<AddRequest>, JsonRejection>,
) -> std::result::Result<Json<AddResponse>, ApiError> {
    let Json(request) = body?;
    let a: Ciphertext = wire::from_base64(&request.cipher1)?;
    let b: Ciphertext = wire::from_base64(&request.cipher2)?;
    let sum = service.evaluator.add(&a, &b)?;
    Ok(Json(AddResponse {
        result: wire::to_base64(&sum)?,
    }))
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type"),
    );
    response
}

/// Router with every endpoint, the body limit and CORS
pub fn router(service: Arc<TallyService>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/params", get(get_params))
        .route("/api/key", get(get_key))
        .route("/api/submit", post(submit))
        .route("/api/tally", post(tally))
        .route("/api/reset", post(reset))
        .route("/api/add", post(add))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(cors))
        .with_state(service)
}
