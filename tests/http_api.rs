#![cfg(feature = "server")]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use ckks_tally::api::{
    router, AddResponse, ErrorResponse, HealthResponse, KeyResponse, ParamsResponse,
    ResetResponse, SubmitResponse, TallyResponse, TallyService, DEFAULT_MAX_BODY_BYTES,
};
use ckks_tally::wire;
use ckks_tally::{CryptoContext, Encryptor, KeyGenerator, PublicKeyBundle, SchemeParameters};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

async fn spawn_server(params: SchemeParameters, seed: u64) -> (String, JoinHandle<()>) {
    let ctx = CryptoContext::new(params).expect("context should build");
    let keys = KeyGenerator::with_seed(Arc::clone(&ctx), seed).generate();
    let service = TallyService::new(ctx, keys).expect("service should build");
    let app = router(Arc::new(service), DEFAULT_MAX_BODY_BYTES);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr: SocketAddr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });
    (format!("http://{}", addr), handle)
}

async fn client_encryptor(client: &reqwest::Client, base_url: &str) -> Encryptor {
    let key: KeyResponse = client
        .get(format!("{}/api/key", base_url))
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("parse key response");
    let bundle: PublicKeyBundle = wire::from_base64(&key.public_key).expect("decode bundle");
    Encryptor::from_bundle(bundle).expect("bundle should be accepted")
}

async fn submit(client: &reqwest::Client, base_url: &str, ciphertext: String) -> reqwest::Response {
    client
        .post(format!("{}/api/submit", base_url))
        .json(&json!({ "ciphertext": ciphertext }))
        .send()
        .await
        .expect("request should succeed")
}

async fn tally(client: &reqwest::Client, base_url: &str) -> TallyResponse {
    client
        .post(format!("{}/api/tally", base_url))
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("parse tally response")
}

#[tokio::test]
async fn http_submit_tally_reset_flow() {
    let (base_url, server) = spawn_server(SchemeParameters::compact_4096(), 300).await;
    let client = reqwest::Client::new();

    let health: HealthResponse = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("parse health");
    assert_eq!(health.status, "ok");

    let params: ParamsResponse = client
        .get(format!("{}/api/params", base_url))
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("parse params");
    assert_eq!(params.poly_degree, 4096);
    assert_eq!(params.primes.len(), 2);
    assert_eq!(params.security_level, 128);

    let enc = client_encryptor(&client, &base_url).await;
    assert_eq!(enc.public_key().key_id.to_hex(), params.key_id);

    for (i, v) in [2.0, 3.0, 5.0].into_iter().enumerate() {
        let ct = wire::to_base64(&enc.encrypt_number(v).unwrap()).unwrap();
        let response = submit(&client, &base_url, ct).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: SubmitResponse = response.json().await.expect("parse submit");
        assert_eq!(body.count, i as u64 + 1);
    }

    let t = tally(&client, &base_url).await;
    assert_eq!((t.sum, t.count, t.epoch), (10.0, 3, 0));

    let reset: ResetResponse = client
        .post(format!("{}/api/reset", base_url))
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("parse reset");
    assert_eq!(reset.status, "reset");
    assert_eq!(reset.epoch, 1);

    let t = tally(&client, &base_url).await;
    assert_eq!((t.sum, t.count, t.epoch), (0.0, 0, 1));

    // stateless addition, then submit the combined ciphertext
    let added: AddResponse = client
        .post(format!("{}/api/add", base_url))
        .json(&json!({
            "cipher1": wire::to_base64(&enc.encrypt_number(2.5).unwrap()).unwrap(),
            "cipher2": wire::to_base64(&enc.encrypt_number(4.5).unwrap()).unwrap(),
        }))
        .send()
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("parse add");
    let response = submit(&client, &base_url, added.result).await;
    assert_eq!(response.status(), StatusCode::OK);

    let t = tally(&client, &base_url).await;
    assert_eq!((t.sum, t.count), (7.0, 1));

    server.abort();
}

#[tokio::test]
async fn http_error_kinds() {
    let (base_url, server) = spawn_server(SchemeParameters::compact_4096(), 301).await;
    let client = reqwest::Client::new();

    // bad base64
    let response = submit(&client, &base_url, "%%%".to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.expect("parse error");
    assert_eq!(body.kind, "malformed");

    // valid base64, not an envelope
    let response = submit(&client, &base_url, wire::encode_base64(b"hello world")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // broken JSON
    let response = client
        .post(format!("{}/api/submit", base_url))
        .header("content-type", "application/json")
        .body("{\"ciphertext\": ")
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.expect("parse error");
    assert_eq!(body.kind, "malformed");

    // ciphertext under someone else's key
    let ctx = CryptoContext::new(SchemeParameters::compact_4096()).unwrap();
    let foreign_keys = KeyGenerator::with_seed(Arc::clone(&ctx), 999).generate();
    let foreign = Encryptor::new(ctx, foreign_keys.public_key).unwrap();
    let ct = wire::to_base64(&foreign.encrypt_number(1.0).unwrap()).unwrap();
    let response = submit(&client, &base_url, ct).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorResponse = response.json().await.expect("parse error");
    assert_eq!(body.kind, "incompatible");

    let t = tally(&client, &base_url).await;
    assert_eq!((t.sum, t.count), (0.0, 0));

    server.abort();
}

#[tokio::test]
async fn http_capacity_reached() {
    let mut params = SchemeParameters::compact_4096();
    params.max_submissions = 1;
    let (base_url, server) = spawn_server(params, 302).await;
    let client = reqwest::Client::new();
    let enc = client_encryptor(&client, &base_url).await;

    let first = wire::to_base64(&enc.encrypt_number(1.0).unwrap()).unwrap();
    assert_eq!(submit(&client, &base_url, first).await.status(), StatusCode::OK);

    let second = wire::to_base64(&enc.encrypt_number(1.0).unwrap()).unwrap();
    let response = submit(&client, &base_url, second).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: ErrorResponse = response.json().await.expect("parse error");
    assert_eq!(body.kind, "capacity");

    server.abort();
}

#[tokio::test]
async fn http_cors_headers() {
    let (base_url, server) = spawn_server(SchemeParameters::compact_4096(), 303).await;
    let client = reqwest::Client::new();

    let preflight = client
        .request(reqwest::Method::OPTIONS, format!("{}/api/submit", base_url))
        .header("origin", "http://example.org")
        .header("access-control-request-method", "POST")
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        preflight.headers()["access-control-allow-origin"],
        "*"
    );

    let health = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .expect("request should succeed");
    assert_eq!(health.headers()["access-control-allow-origin"], "*");

    server.abort();
}
