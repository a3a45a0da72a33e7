//! HTTP surface tests: auth, jurisdictions, privacy settings, verification and submissions.

use ark_bn254::Fr;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use compliance_backend::clock::ManualClock;
use compliance_backend::config::Config;
use compliance_backend::engine::Groth16Check;
use compliance_backend::nullifier::nullifier_key;
use compliance_backend::registry::CircuitDescriptor;
use compliance_backend::state::AppState;
use compliance_backend::{api, db, ComplianceService};
use zk_circuits::circuits::{JurisdictionCircuit, WhitelistCircuit};
use zk_circuits::groth16::{prove, setup_kind};
use zk_circuits::hash::identity_leaf;
use zk_circuits::merkle::MerkleTree;
use zk_circuits::types::proof_to_b64;
use zk_circuits::{CircuitKind, FrHex};

const KEY: &str = "test-key";

async fn test_app() -> (axum::Router, AppState) {
    let mut config = Config::default();
    config.server.api_key = KEY.to_string();

    let service = ComplianceService::new(
        &config.engine,
        config.privacy,
        Arc::new(ManualClock::new(1_000)),
        Arc::new(Groth16Check),
    )
    .unwrap();

    let db = db::connect("sqlite::memory:", 1).await.unwrap();
    db::init_schema(&db).await.unwrap();

    let state = AppState::new(Arc::new(service), db, config);
    (api::router(state.clone()), state)
}

fn request(method: &str, uri: &str, body: Option<Value>, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("X-API-KEY", key);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn hex_inputs(inputs: &[Fr]) -> Vec<FrHex> {
    inputs.iter().map(FrHex::from_fr).collect()
}

#[tokio::test]
async fn health_is_public_and_mutations_need_the_key() {
    let (app, _state) = test_app().await;

    let response = app.clone().oneshot(request("GET", "/health", None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let add = json!({"name": "United States", "code": "US"});
    let (status, _) = send(&app, request("POST", "/api/v1/jurisdictions", Some(add.clone()), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, request("POST", "/api/v1/jurisdictions", Some(add), Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn jurisdiction_lifecycle() {
    let (app, state) = test_app().await;

    for (name, code) in [("United States", "US"), ("European Union", "EU")] {
        let body = json!({"name": name, "code": code});
        let (status, _) = send(&app, request("POST", "/api/v1/jurisdictions", Some(body), Some(KEY))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let dup = json!({"name": "Again", "code": "US"});
    let (status, body) = send(&app, request("POST", "/api/v1/jurisdictions", Some(dup), Some(KEY))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("US"));

    let (_, body) = send(&app, request("GET", "/api/v1/jurisdictions", None, None)).await;
    assert_eq!(body["allowed_mask"], 3);

    let (status, _) = send(&app, request("DELETE", "/api/v1/jurisdictions/US", None, Some(KEY))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("DELETE", "/api/v1/jurisdictions/US", None, Some(KEY))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, request("GET", "/api/v1/jurisdictions", None, None)).await;
    assert_eq!(body["allowed_mask"], 2);
    assert_eq!(body["jurisdictions"][0]["code"], "EU");

    let toggle = json!({"active": true});
    let (status, body) =
        send(&app, request("PUT", "/api/v1/jurisdictions/US/active", Some(toggle.clone()), Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mask"], 1);
    let (status, _) = send(&app, request("PUT", "/api/v1/jurisdictions/US/active", Some(toggle), Some(KEY))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Journal reflects the final state.
    let rows = db::load_jurisdictions(&state.db).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|j| j.active));
}

#[tokio::test]
async fn privacy_settings_fall_back_and_validate() {
    let (app, state) = test_app().await;

    let (status, body) = send(&app, request("GET", "/api/v1/users/alice/privacy", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validity_period_secs"], 7 * 24 * 60 * 60);
    assert_eq!(body["enable_whitelist"], true);

    let bad = json!({"enable_whitelist": false, "validity_period_secs": 60});
    let (status, _) = send(&app, request("PUT", "/api/v1/users/alice/privacy", Some(bad), Some(KEY))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let good = json!({
        "enable_whitelist": false,
        "enable_jurisdiction": true,
        "enable_accreditation": true,
        "enable_compliance": false,
        "validity_period_secs": 7200
    });
    let (status, _) = send(&app, request("PUT", "/api/v1/users/alice/privacy", Some(good.clone()), Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, request("GET", "/api/v1/users/alice/privacy", None, None)).await;
    assert_eq!(body, good);
    assert_eq!(db::load_user_settings(&state.db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn verify_submit_and_status_over_http() {
    let (app, state) = test_app().await;
    let mut rng = ChaCha20Rng::seed_from_u64(7);

    let kind = CircuitKind::JurisdictionEligibility;
    let (pk, vk) = setup_kind(kind, 4, &mut rng).unwrap();
    state.service.register_circuit(CircuitDescriptor::from_verifying_key(kind.id(), vk)).unwrap();

    let circuit = JurisdictionCircuit::new(3, Fr::from(21u64), 9);
    let public = circuit.public.to_field_elems();
    let proof_b64 = proof_to_b64(&prove(circuit, &pk, &mut rng).unwrap()).unwrap();

    let (status, body) = send(&app, request("GET", "/api/v1/circuits/jurisdiction_eligibility", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["arity"], 2);
    let (status, body) = send(&app, request("GET", "/api/v1/circuits/jurisdiction_eligibility/vk", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["curve"], "bn254");

    let verify = json!({
        "circuit_id": kind.id(),
        "proof_b64": proof_b64,
        "public_inputs": hex_inputs(&public),
        "caller": "escrow"
    });
    let (status, body) = send(&app, request("POST", "/api/v1/verify", Some(verify), Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);

    let short = json!({"circuit_id": kind.id(), "proof_b64": proof_b64, "public_inputs": hex_inputs(&public[..1])});
    let (status, _) = send(&app, request("POST", "/api/v1/verify", Some(short), Some(KEY))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = json!({"circuit_id": "nope", "proof_b64": proof_b64, "public_inputs": hex_inputs(&public)});
    let (status, _) = send(&app, request("POST", "/api/v1/verify", Some(unknown), Some(KEY))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, request("GET", "/api/v1/circuits/jurisdiction_eligibility/stats", None, None)).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["success_rate_percent"], 100);

    let submit = json!({"kind": "jurisdiction_eligibility", "proof_b64": proof_b64, "public_inputs": hex_inputs(&public)});
    let (status, body) = send(&app, request("POST", "/api/v1/users/carol/proofs", Some(submit), Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_valid_proof"], true);
    assert_eq!(body["submitted_at"], 1_000);

    let (_, body) = send(&app, request("GET", "/api/v1/users/carol/proofs/jurisdiction_eligibility", None, None)).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["expired"], false);
    let (status, _) = send(&app, request("GET", "/api/v1/users/carol/proofs/bogus", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, request("GET", "/api/v1/users/carol/compliance", None, None)).await;
    assert_eq!(body["fully_compliant"], false);
}

/// Registers whitelist keys on `state` and returns a submission body plus its public inputs.
fn whitelist_submission(state: &AppState, seed: u64) -> (Value, Vec<Fr>) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let kind = CircuitKind::WhitelistMembership;
    let (pk, vk) = setup_kind(kind, 4, &mut rng).unwrap();
    state.service.register_circuit(CircuitDescriptor::from_verifying_key(kind.id(), vk)).unwrap();

    let ids: Vec<Fr> = (1..=4u64).map(Fr::from).collect();
    let tree = MerkleTree::new(4, ids.iter().map(|i| identity_leaf(*i)).collect()).unwrap();
    let circuit = WhitelistCircuit::for_member(&tree, 1, ids[1]).unwrap();
    let public = circuit.public.to_field_elems();
    let proof_b64 = proof_to_b64(&prove(circuit, &pk, &mut rng).unwrap()).unwrap();

    let body = json!({"kind": kind.id(), "proof_b64": proof_b64, "public_inputs": hex_inputs(&public)});
    (body, public)
}

#[tokio::test]
async fn whitelist_nullifier_is_journaled_before_acceptance() {
    let (app, state) = test_app().await;
    let (submit, public) = whitelist_submission(&state, 11);

    let (status, body) = send(&app, request("POST", "/api/v1/users/dana/proofs", Some(submit.clone()), Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_valid_proof"], true);
    assert_eq!(db::load_nullifiers(&state.db).await.unwrap(), vec![nullifier_key(&public[1])]);

    let (status, _) = send(&app, request("POST", "/api/v1/users/eve/proofs", Some(submit), Some(KEY))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn failed_journal_write_leaves_the_nullifier_unclaimed() {
    let (app, state) = test_app().await;
    let (submit, public) = whitelist_submission(&state, 12);

    state.db.close().await;
    let (status, _) = send(&app, request("POST", "/api/v1/users/dana/proofs", Some(submit), Some(KEY))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let kind = CircuitKind::WhitelistMembership;
    assert!(!state.service.nullifiers().is_used(&public[1]));
    assert!(!state.service.proof_status("dana", kind).present);
    assert!(!state.service.has_valid_proof("dana", kind));
}

#[tokio::test]
async fn batch_bounds_and_cache_maintenance() {
    let (app, _state) = test_app().await;

    let (status, _) = send(&app, request("POST", "/api/v1/verify/batch", Some(json!({"items": []})), Some(KEY))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let items = vec![json!({"circuit_id": "nope", "proof_b64": "!!", "public_inputs": []}); 2];
    let (status, body) =
        send(&app, request("POST", "/api/v1/verify/batch", Some(json!({"items": items})), Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!([false, false]));
    assert_eq!(body["success_count"], 0);

    let (status, _) = send(&app, request("PUT", "/api/v1/cache/ttl", Some(json!({"ttl_secs": 5})), Some(KEY))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) =
        send(&app, request("PUT", "/api/v1/cache/ttl", Some(json!({"ttl_secs": 7200})), Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ttl_secs"], 7200);

    let (status, body) = send(&app, request("POST", "/api/v1/cache/purge", None, Some(KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);
}
