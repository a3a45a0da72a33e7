use crate::clock::SystemClock;
use crate::config::{CircuitsConfig, Config};
use crate::db::{self, Db};
use crate::engine::Groth16Check;
use crate::errors::ApiError;
use crate::registry::CircuitDescriptor;
use crate::service::ComplianceService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use zk_circuits::groth16::{deserialize_vk, serialize_pk, serialize_vk, setup_kind};
use zk_circuits::CircuitKind;

use rand::rngs::OsRng;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ComplianceService>,
    pub db: Db,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(service: Arc<ComplianceService>, db: Db, config: Config) -> Self {
        Self { service, db, config: Arc::new(config) }
    }

    /// Open the journal, build the service, replay persisted state and register every
    /// circuit whose verifying key is available.
    pub async fn bootstrap(config: Config) -> Result<Self, ApiError> {
        std::fs::create_dir_all(&config.server.data_dir).map_err(|_| ApiError::Internal)?;
        let db_path = config.server.data_dir.join("compliance.sqlite");
        let db_url = format!("sqlite:{}?mode=rwc", db_path.to_string_lossy());

        let db = db::connect(&db_url, 5).await?;
        db::init_schema(&db).await?;

        let service = ComplianceService::new(
            &config.engine,
            config.privacy,
            Arc::new(SystemClock::new()),
            Arc::new(Groth16Check),
        )?;
        db::hydrate(&db, &service).await?;

        let circuits = config.circuits.clone();
        let descriptors = tokio::task::spawn_blocking(move || load_circuit_keys(&circuits))
            .await
            .map_err(|_| ApiError::Internal)??;
        for descriptor in descriptors {
            service.register_circuit(descriptor)?;
        }

        Ok(Self::new(Arc::new(service), db, config))
    }
}

fn key_paths(keys_dir: &Path, kind: CircuitKind) -> (PathBuf, PathBuf) {
    (
        keys_dir.join(format!("{}_pk.bin", kind.id())),
        keys_dir.join(format!("{}_vk.bin", kind.id())),
    )
}

/// Verifying keys for the built-in circuits.
///
/// Keys come from `keys_dir`. A missing key leaves its circuit unregistered unless
/// `dev_setup` is on, in which case a local single-party setup writes a fresh pair.
/// IMPORTANT: dev keys are not safe for production use.
pub fn load_circuit_keys(config: &CircuitsConfig) -> Result<Vec<CircuitDescriptor>, ApiError> {
    let mut out = Vec::with_capacity(CircuitKind::ALL.len());
    for kind in CircuitKind::ALL {
        let (pk_path, vk_path) = key_paths(&config.keys_dir, kind);

        let vk = if vk_path.exists() {
            let bytes = std::fs::read(&vk_path).map_err(|_| ApiError::Internal)?;
            deserialize_vk(&bytes).map_err(|e| {
                warn!(circuit = %kind, error = %e, "unreadable verifying key");
                ApiError::Internal
            })?
        } else if config.dev_setup {
            std::fs::create_dir_all(&config.keys_dir).map_err(|_| ApiError::Internal)?;
            let mut rng = OsRng;
            let (pk, vk) = setup_kind(kind, config.merkle_depth, &mut rng).map_err(|_| ApiError::Internal)?;

            let pk_bytes = serialize_pk(&pk).map_err(|_| ApiError::Internal)?;
            let vk_bytes = serialize_vk(&vk).map_err(|_| ApiError::Internal)?;
            std::fs::write(&pk_path, pk_bytes).map_err(|_| ApiError::Internal)?;
            std::fs::write(&vk_path, vk_bytes).map_err(|_| ApiError::Internal)?;
            info!(circuit = %kind, dir = %config.keys_dir.display(), "generated development keys");
            vk
        } else {
            warn!(circuit = %kind, path = %vk_path.display(), "verifying key missing, circuit not registered");
            continue;
        };

        let descriptor = CircuitDescriptor::from_verifying_key(kind.id(), vk);
        if descriptor.arity != kind.arity() {
            warn!(circuit = %kind, expected = kind.arity(), got = descriptor.arity, "verifying key has wrong arity");
            return Err(ApiError::Internal);
        }
        out.push(descriptor);
    }
    Ok(out)
}
