// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client persistence.
//!
//! A client row is keyed by the common name of its TLS certificate. The
//! `last_seen` column is nullable; a stored epoch-zero timestamp reads back
//! as "never seen" so the wire shape is `null` rather than 1970.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::error::{DbError, Result};
use crate::types::parse_ts;

/// A certificate-authenticated machine principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
	pub id: i64,
	pub name: String,
	pub description: String,
	/// False blocks the client entirely.
	pub enabled: bool,
	/// True grants the client the automation (management) surface.
	pub automation_allowed: bool,
	#[serde(with = "chrono::serde::ts_seconds_option")]
	pub last_seen: Option<DateTime<Utc>>,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub updated_at: DateTime<Utc>,
	pub updated_by: String,
}

#[derive(Clone)]
pub struct ClientRepository {
	pool: SqlitePool,
}

impl ClientRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn create_client(
		&self,
		name: &str,
		description: &str,
		creator: &str,
		automation_allowed: bool,
	) -> Result<i64> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			INSERT INTO clients (name, description, enabled, automation_allowed, created_at, created_by, updated_at, updated_by)
			VALUES (?, ?, 1, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(name)
		.bind(description)
		.bind(automation_allowed as i32)
		.bind(&now)
		.bind(creator)
		.bind(&now)
		.bind(creator)
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if DbError::is_unique_violation(&e) {
				DbError::Conflict(name.to_string())
			} else {
				DbError::Sqlx(e)
			}
		})?;
		Ok(result.last_insert_rowid())
	}

	/// Look up a client by its certificate-derived name.
	#[tracing::instrument(skip(self))]
	pub async fn get_client_by_name(&self, name: &str) -> Result<Option<Client>> {
		let row = sqlx::query(
			"SELECT id, name, description, enabled, automation_allowed, last_seen, \
			 created_at, created_by, updated_at, updated_by FROM clients WHERE name = ?",
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.map(|r| row_to_client(&r)))
	}

	/// Record that a client was just seen. Called out-of-band from the
	/// request path; failures are the caller's to ignore.
	#[tracing::instrument(skip(self))]
	pub async fn touch_last_seen(&self, name: &str) -> Result<()> {
		sqlx::query("UPDATE clients SET last_seen = ? WHERE name = ?")
			.bind(Utc::now().to_rfc3339())
			.bind(name)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
		sqlx::query("UPDATE clients SET enabled = ?, updated_at = ? WHERE name = ?")
			.bind(enabled as i32)
			.bind(Utc::now().to_rfc3339())
			.bind(name)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

pub(crate) fn row_to_client(row: &SqliteRow) -> Client {
	// Epoch zero means "never" in rows imported from older deployments.
	let last_seen = row
		.get::<Option<String>, _>("last_seen")
		.map(|raw| parse_ts(&raw))
		.filter(|ts| ts.timestamp() != 0);

	Client {
		id: row.get("id"),
		name: row.get("name"),
		description: row.get("description"),
		enabled: row.get::<i64, _>("enabled") != 0,
		automation_allowed: row.get::<i64, _>("automation_allowed") != 0,
		last_seen,
		created_at: parse_ts(&row.get::<String, _>("created_at")),
		created_by: row.get("created_by"),
		updated_at: parse_ts(&row.get::<String, _>("updated_at")),
		updated_by: row.get("updated_by"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn test_create_and_get() {
		let pool = create_test_pool().await;
		let repo = ClientRepository::new(pool);

		repo.create_client("ops-bot", "deploy automation", "admin", true)
			.await
			.unwrap();

		let client = repo.get_client_by_name("ops-bot").await.unwrap().unwrap();
		assert!(client.enabled);
		assert!(client.automation_allowed);
		assert!(client.last_seen.is_none());

		assert!(repo.get_client_by_name("ghost").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_touch_last_seen() {
		let pool = create_test_pool().await;
		let repo = ClientRepository::new(pool);

		repo.create_client("ops-bot", "", "admin", true).await.unwrap();
		repo.touch_last_seen("ops-bot").await.unwrap();

		let client = repo.get_client_by_name("ops-bot").await.unwrap().unwrap();
		assert!(client.last_seen.is_some());
	}

	#[tokio::test]
	async fn test_epoch_zero_last_seen_reads_as_never() {
		let pool = create_test_pool().await;
		let repo = ClientRepository::new(pool.clone());

		repo.create_client("legacy", "", "admin", false).await.unwrap();
		sqlx::query("UPDATE clients SET last_seen = ? WHERE name = ?")
			.bind(DateTime::from_timestamp(0, 0).unwrap().to_rfc3339())
			.bind("legacy")
			.execute(&pool)
			.await
			.unwrap();

		let client = repo.get_client_by_name("legacy").await.unwrap().unwrap();
		assert!(client.last_seen.is_none());
	}

	#[tokio::test]
	async fn test_last_seen_serializes_as_null_when_absent() {
		let pool = create_test_pool().await;
		let repo = ClientRepository::new(pool);

		repo.create_client("ops-bot", "", "admin", true).await.unwrap();
		let client = repo.get_client_by_name("ops-bot").await.unwrap().unwrap();

		let json = serde_json::to_value(&client).unwrap();
		assert!(json.get("lastSeen").unwrap().is_null());
	}

	#[tokio::test]
	async fn test_disable_client() {
		let pool = create_test_pool().await;
		let repo = ClientRepository::new(pool);

		repo.create_client("ops-bot", "", "admin", true).await.unwrap();
		repo.set_enabled("ops-bot", false).await.unwrap();

		let client = repo.get_client_by_name("ops-bot").await.unwrap().unwrap();
		assert!(!client.enabled);
	}

	#[tokio::test]
	async fn test_duplicate_name_conflicts() {
		let pool = create_test_pool().await;
		let repo = ClientRepository::new(pool);

		repo.create_client("dup", "", "admin", false).await.unwrap();
		let err = repo.create_client("dup", "", "admin", false).await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}
}
