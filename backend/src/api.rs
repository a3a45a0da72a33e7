use crate::db;
use crate::engine::BatchItem;
use crate::errors::ApiError;
use crate::jurisdiction::Jurisdiction;
use crate::models::*;
use crate::nullifier::nullifier_key;
use crate::settings::PrivacySettings;
use crate::state::AppState;
use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Json, Router,
};
use base64::Engine;
use tower_http::cors::{Any, CorsLayer};
use zk_circuits::groth16::serialize_vk;
use zk_circuits::CircuitKind;

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/verify", post(verify))
        .route("/api/v1/verify/batch", post(verify_batch))
        .route("/api/v1/users/:user/privacy", put(set_privacy))
        .route("/api/v1/users/:user/proofs", post(submit_proof))
        .route("/api/v1/privacy/default", put(set_default_privacy))
        .route("/api/v1/jurisdictions", post(add_jurisdiction))
        .route("/api/v1/jurisdictions/:code", delete(remove_jurisdiction))
        .route("/api/v1/jurisdictions/:code/active", put(set_jurisdiction_active))
        .route("/api/v1/cache/purge", post(purge_cache))
        .route("/api/v1/cache/ttl", put(set_cache_ttl))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/circuits/:id", get(get_circuit))
        .route("/api/v1/circuits/:id/vk", get(get_vk))
        .route("/api/v1/circuits/:id/stats", get(get_stats))
        .route("/api/v1/jurisdictions", get(list_jurisdictions))
        .route("/api/v1/users/:user/privacy", get(get_privacy))
        .route("/api/v1/users/:user/proofs/:kind", get(get_proof_status))
        .route("/api/v1/users/:user/compliance", get(get_compliance))
        .merge(protected_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(provided_key) = headers.get("X-API-KEY") {
        if provided_key == state.config.server.api_key.as_str() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!(path = %request.uri().path(), "unauthorized access attempt");
    Err(StatusCode::UNAUTHORIZED)
}

fn parse_kind(kind: &str) -> Result<CircuitKind, ApiError> {
    kind.parse().map_err(ApiError::NotFound)
}

async fn verify(State(state): State<AppState>, Json(req): Json<VerifyRequest>) -> Result<Json<VerifyResponse>, ApiError> {
    let proof = decode_proof(&req.proof_b64)?;
    let inputs = decode_inputs(&req.public_inputs)?;

    let service = state.service.clone();
    let circuit_id = req.circuit_id.clone();
    let caller = req.caller;
    let verified = tokio::task::spawn_blocking(move || service.verify(caller.as_deref(), &circuit_id, &proof, &inputs))
        .await
        .map_err(|_| ApiError::Internal)??;

    Ok(Json(VerifyResponse { circuit_id: req.circuit_id, verified }))
}

async fn verify_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchVerifyRequest>,
) -> Result<Json<BatchVerifyResponse>, ApiError> {
    // Undecodable items stay in the batch and fail in their own slot.
    let items: Vec<BatchItem> = req
        .items
        .into_iter()
        .map(|item| BatchItem {
            proof: decode_proof(&item.proof_b64).unwrap_or_default(),
            public_inputs: decode_inputs(&item.public_inputs).unwrap_or_default(),
            circuit_id: item.circuit_id,
        })
        .collect();

    let service = state.service.clone();
    let caller = req.caller;
    let outcome = tokio::task::spawn_blocking(move || service.verify_batch(caller.as_deref(), &items))
        .await
        .map_err(|_| ApiError::Internal)??;

    Ok(Json(BatchVerifyResponse { results: outcome.results, success_count: outcome.success_count }))
}

async fn get_circuit(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<CircuitInfoResponse>, ApiError> {
    let descriptor = state.service.engine().registry().get(&id)?;
    Ok(Json(CircuitInfoResponse { circuit_id: descriptor.id.clone(), arity: descriptor.arity }))
}

async fn get_vk(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<VkResponse>, ApiError> {
    let descriptor = state.service.engine().registry().get(&id)?;
    let vk_bytes = serialize_vk(&descriptor.vk).map_err(|_| ApiError::Internal)?;

    Ok(Json(VkResponse {
        circuit_id: descriptor.id.clone(),
        curve: "bn254".to_string(),
        proof_system: "groth16".to_string(),
        vk_b64: base64::engine::general_purpose::STANDARD.encode(vk_bytes),
    }))
}

async fn get_stats(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.service.get_stats(&id)?;
    Ok(Json(StatsResponse { circuit_id: id, stats }))
}

async fn get_privacy(State(state): State<AppState>, Path(user): Path<String>) -> Json<PrivacySettings> {
    Json(state.service.get_settings(&user))
}

async fn set_privacy(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(settings): Json<PrivacySettings>,
) -> Result<Json<PrivacySettings>, ApiError> {
    state.service.set_settings(&user, settings)?;
    db::upsert_user_settings(&state.db, &user, &settings).await?;
    Ok(Json(settings))
}

async fn set_default_privacy(
    State(state): State<AppState>,
    Json(settings): Json<PrivacySettings>,
) -> Result<Json<PrivacySettings>, ApiError> {
    state.service.set_default_settings(settings)?;
    db::store_default_settings(&state.db, &settings).await?;
    Ok(Json(settings))
}

async fn submit_proof(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<SubmitProofRequest>,
) -> Result<Json<ProofStatusResponse>, ApiError> {
    let proof = decode_proof(&req.proof_b64)?;
    let inputs = decode_inputs(&req.public_inputs)?;
    let kind = req.kind;

    let service = state.service.clone();
    let owner = user.clone();
    let submission = tokio::task::spawn_blocking(move || service.verify_submission(&owner, kind, &proof, &inputs))
        .await
        .map_err(|_| ApiError::Internal)??;

    // The nullifier hits the journal before it is claimed, so an acknowledged
    // whitelist proof can never be replayed after a restart.
    if let Some(n) = &submission.nullifier {
        db::insert_nullifier(&state.db, &nullifier_key(n)).await?;
    }
    state.service.commit_submission(submission)?;

    Ok(Json(ProofStatusResponse {
        has_valid_proof: state.service.has_valid_proof(&user, kind),
        status: state.service.proof_status(&user, kind),
        user,
        kind,
    }))
}

async fn get_proof_status(
    State(state): State<AppState>,
    Path((user, kind)): Path<(String, String)>,
) -> Result<Json<ProofStatusResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(ProofStatusResponse {
        has_valid_proof: state.service.has_valid_proof(&user, kind),
        status: state.service.proof_status(&user, kind),
        user,
        kind,
    }))
}

async fn get_compliance(State(state): State<AppState>, Path(user): Path<String>) -> Json<ComplianceResponse> {
    Json(ComplianceResponse { fully_compliant: state.service.is_fully_compliant(&user), user })
}

async fn list_jurisdictions(State(state): State<AppState>) -> Json<JurisdictionListResponse> {
    Json(JurisdictionListResponse {
        allowed_mask: state.service.jurisdictions().allowed_mask(),
        jurisdictions: state.service.list_active_jurisdictions(),
    })
}

async fn add_jurisdiction(
    State(state): State<AppState>,
    Json(req): Json<AddJurisdictionRequest>,
) -> Result<(StatusCode, Json<Jurisdiction>), ApiError> {
    let entry = state.service.add_jurisdiction(&req.name, &req.code)?;
    db::upsert_jurisdiction(&state.db, &entry).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn remove_jurisdiction(State(state): State<AppState>, Path(code): Path<String>) -> Result<StatusCode, ApiError> {
    state.service.remove_jurisdiction(&code)?;
    if let Some(entry) = state.service.jurisdictions().get(&code) {
        db::upsert_jurisdiction(&state.db, &entry).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn set_jurisdiction_active(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<Jurisdiction>, ApiError> {
    let entry = state.service.set_jurisdiction_active(&code, req.active)?;
    db::upsert_jurisdiction(&state.db, &entry).await?;
    Ok(Json(entry))
}

async fn purge_cache(State(state): State<AppState>) -> Json<CacheResponse> {
    let removed = state.service.purge_expired();
    Json(CacheResponse {
        removed,
        entries: state.service.cache_len(),
        ttl_secs: state.service.engine().cache().ttl(),
    })
}

async fn set_cache_ttl(
    State(state): State<AppState>,
    Json(req): Json<CacheTtlRequest>,
) -> Result<Json<CacheResponse>, ApiError> {
    state.service.set_cache_ttl(req.ttl_secs)?;
    Ok(Json(CacheResponse {
        removed: 0,
        entries: state.service.cache_len(),
        ttl_secs: state.service.engine().cache().ttl(),
    }))
}
