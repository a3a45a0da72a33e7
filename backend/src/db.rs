//! sqlite journal for the state that must survive restarts: used nullifiers, jurisdictions
//! and privacy settings. The in-memory stores stay authoritative; handlers write through
//! after the in-memory transition succeeds, and `hydrate` replays the journal on start.

use crate::errors::ApiError;
use crate::jurisdiction::Jurisdiction;
use crate::nullifier::NullifierKey;
use crate::service::ComplianceService;
use crate::settings::PrivacySettings;
use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use tracing::{error, info};

pub type Db = Pool<Sqlite>;

const DEFAULT_SETTINGS_KEY: &str = "default_privacy_settings";

fn db_err(e: sqlx::Error) -> ApiError {
    error!(error = %e, "database error");
    ApiError::Internal
}

pub async fn connect(db_url: &str, max_connections: u32) -> Result<Db, ApiError> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .map_err(db_err)
}

pub async fn init_schema(db: &Db) -> Result<(), ApiError> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS nullifiers (
  nullifier_hex TEXT PRIMARY KEY,
  used_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS jurisdictions (
  code TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  mask INTEGER NOT NULL UNIQUE,
  active INTEGER NOT NULL,
  created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS privacy_settings (
  user_id TEXT PRIMARY KEY,
  settings_json TEXT NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await
    .map_err(db_err)?;

    Ok(())
}

pub async fn insert_nullifier(db: &Db, key: &NullifierKey) -> Result<(), ApiError> {
    sqlx::query(r#"INSERT OR IGNORE INTO nullifiers (nullifier_hex, used_at) VALUES (?, ?)"#)
        .bind(hex::encode(key))
        .bind(Utc::now().to_rfc3339())
        .execute(db)
        .await
        .map_err(db_err)?;
    Ok(())
}

pub async fn load_nullifiers(db: &Db) -> Result<Vec<NullifierKey>, ApiError> {
    let rows = sqlx::query(r#"SELECT nullifier_hex FROM nullifiers"#)
        .fetch_all(db)
        .await
        .map_err(db_err)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let hex_str: String = row.get(0);
        let bytes = hex::decode(&hex_str).map_err(|_| ApiError::Internal)?;
        let key: NullifierKey = bytes.try_into().map_err(|_| ApiError::Internal)?;
        out.push(key);
    }
    Ok(out)
}

pub async fn upsert_jurisdiction(db: &Db, j: &Jurisdiction) -> Result<(), ApiError> {
    // Masks above i64::MAX keep their bit pattern.
    sqlx::query(
        r#"INSERT INTO jurisdictions (code, name, mask, active, created_at)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT(code) DO UPDATE SET active = excluded.active"#,
    )
    .bind(&j.code)
    .bind(&j.name)
    .bind(j.mask as i64)
    .bind(if j.active { 1i64 } else { 0i64 })
    .bind(j.created_at as i64)
    .execute(db)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub async fn load_jurisdictions(db: &Db) -> Result<Vec<Jurisdiction>, ApiError> {
    let rows = sqlx::query(r#"SELECT code, name, mask, active, created_at FROM jurisdictions ORDER BY mask"#)
        .fetch_all(db)
        .await
        .map_err(db_err)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let mask: i64 = row.get(2);
            let active: i64 = row.get(3);
            let created_at: i64 = row.get(4);
            Jurisdiction {
                code: row.get(0),
                name: row.get(1),
                mask: mask as u64,
                active: active == 1,
                created_at: created_at as u64,
            }
        })
        .collect())
}

pub async fn upsert_user_settings(db: &Db, user: &str, settings: &PrivacySettings) -> Result<(), ApiError> {
    let json = serde_json::to_string(settings).map_err(|_| ApiError::Internal)?;
    sqlx::query(
        r#"INSERT OR REPLACE INTO privacy_settings (user_id, settings_json, updated_at) VALUES (?, ?, ?)"#,
    )
    .bind(user)
    .bind(json)
    .bind(Utc::now().to_rfc3339())
    .execute(db)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub async fn load_user_settings(db: &Db) -> Result<Vec<(String, PrivacySettings)>, ApiError> {
    let rows = sqlx::query(r#"SELECT user_id, settings_json FROM privacy_settings"#)
        .fetch_all(db)
        .await
        .map_err(db_err)?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let user: String = row.get(0);
        let json: String = row.get(1);
        let settings: PrivacySettings = serde_json::from_str(&json).map_err(|_| ApiError::Internal)?;
        out.push((user, settings));
    }
    Ok(out)
}

pub async fn store_default_settings(db: &Db, settings: &PrivacySettings) -> Result<(), ApiError> {
    let json = serde_json::to_string(settings).map_err(|_| ApiError::Internal)?;
    sqlx::query(r#"INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)"#)
        .bind(DEFAULT_SETTINGS_KEY)
        .bind(json)
        .execute(db)
        .await
        .map_err(db_err)?;
    Ok(())
}

pub async fn load_default_settings(db: &Db) -> Result<Option<PrivacySettings>, ApiError> {
    let row = sqlx::query(r#"SELECT value FROM meta WHERE key = ?"#)
        .bind(DEFAULT_SETTINGS_KEY)
        .fetch_optional(db)
        .await
        .map_err(db_err)?;

    let Some(row) = row else { return Ok(None) };
    let json: String = row.get(0);
    serde_json::from_str(&json).map(Some).map_err(|_| ApiError::Internal)
}

/// Replay the journal into the in-memory stores.
pub async fn hydrate(db: &Db, service: &ComplianceService) -> Result<(), ApiError> {
    let nullifiers = load_nullifiers(db).await?;
    let jurisdictions = load_jurisdictions(db).await?;
    let users = load_user_settings(db).await?;

    info!(
        nullifiers = nullifiers.len(),
        jurisdictions = jurisdictions.len(),
        users = users.len(),
        "hydrating stores"
    );

    service.nullifiers().hydrate(nullifiers);
    service.jurisdictions().hydrate(jurisdictions);
    service.settings().hydrate(users);
    if let Some(default) = load_default_settings(db).await? {
        service.set_default_settings(default)?;
    }
    Ok(())
}
