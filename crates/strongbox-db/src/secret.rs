// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret series and content persistence.
//!
//! A secret is a *series* (its named identity) plus an append-only set of
//! immutable *content* versions, one of which is current. Creating appends;
//! nothing ever rewrites a stored version, with the single exception of the
//! expiry backfill on the current content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::BTreeMap;

use crate::error::{DbError, Result};
use crate::types::{parse_string_map, parse_ts};

/// The named identity of a secret, aggregating its versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSeries {
	pub id: i64,
	pub name: String,
	pub description: String,
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub updated_at: DateTime<Utc>,
	pub updated_by: String,
	pub current_version_id: Option<i64>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub generation_options: BTreeMap<String, String>,
}

/// One immutable version of a secret series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretContent {
	pub id: i64,
	pub series_id: i64,
	pub encrypted_content: String,
	pub content_hmac: String,
	pub metadata: BTreeMap<String, String>,
	/// Unix seconds; 0 means no known expiry.
	pub expiry: i64,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub updated_at: DateTime<Utc>,
}

/// A series joined with its current content.
#[derive(Debug, Clone)]
pub struct SecretSeriesAndContent {
	pub series: SecretSeries,
	pub content: SecretContent,
}

/// Projection safe to return in listings: no ciphertext, no HMAC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedSecret {
	pub id: i64,
	pub name: String,
	pub description: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub metadata: BTreeMap<String, String>,
	pub expiry: i64,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub updated_at: DateTime<Utc>,
	pub updated_by: String,
	pub version: i64,
}

impl SanitizedSecret {
	pub fn from_series_and_content(pair: &SecretSeriesAndContent) -> Self {
		Self {
			id: pair.series.id,
			name: pair.series.name.clone(),
			description: pair.series.description.clone(),
			kind: pair.series.kind.clone(),
			metadata: pair.content.metadata.clone(),
			expiry: pair.content.expiry,
			created_at: pair.series.created_at,
			created_by: pair.series.created_by.clone(),
			updated_at: pair.series.updated_at,
			updated_by: pair.series.updated_by.clone(),
			version: pair.content.id,
		}
	}
}

/// Everything needed to write one secret version.
///
/// The controller populates this after encryption; the repository never sees
/// plaintext.
#[derive(Debug, Clone)]
pub struct CreateSecretParams {
	pub name: String,
	pub encrypted_content: String,
	pub content_hmac: String,
	pub creator: String,
	pub metadata: BTreeMap<String, String>,
	pub expiry: i64,
	pub description: String,
	pub kind: String,
	pub generation_options: BTreeMap<String, String>,
}

/// Repository for secret series and content versions.
#[derive(Clone)]
pub struct SecretRepository {
	pool: SqlitePool,
}

pub(crate) const SERIES_AND_CONTENT_COLUMNS: &str = r#"
	s.id, s.name, s.description, s.kind, s.options, s.current_version_id,
	s.created_at, s.created_by, s.updated_at, s.updated_by,
	c.id AS content_id, c.encrypted_content, c.content_hmac, c.metadata,
	c.expiry, c.created_at AS content_created_at,
	c.created_by AS content_created_by, c.updated_at AS content_updated_at
"#;

impl SecretRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create a new secret series with its initial content version.
	///
	/// Races on the same name serialize through the unique index; the loser
	/// observes `DbError::Conflict`.
	#[tracing::instrument(skip(self, params), fields(name = %params.name))]
	pub async fn create_secret(&self, params: &CreateSecretParams) -> Result<i64> {
		let now = Utc::now().to_rfc3339();
		let mut tx = self.pool.begin().await?;

		let series_result = sqlx::query(
			r#"
			INSERT INTO secrets (name, description, kind, options, created_at, created_by, updated_at, updated_by)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(&params.name)
		.bind(&params.description)
		.bind(&params.kind)
		.bind(serde_json::to_string(&params.generation_options)?)
		.bind(&now)
		.bind(&params.creator)
		.bind(&now)
		.bind(&params.creator)
		.execute(&mut *tx)
		.await
		.map_err(|e| {
			if DbError::is_unique_violation(&e) {
				DbError::Conflict(params.name.clone())
			} else {
				DbError::Sqlx(e)
			}
		})?;
		let series_id = series_result.last_insert_rowid();

		let content_id = self
			.insert_content(&mut tx, series_id, params, &now)
			.await?;
		sqlx::query("UPDATE secrets SET current_version_id = ? WHERE id = ?")
			.bind(content_id)
			.bind(series_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		tracing::debug!(series_id, content_id, "secret created");
		Ok(series_id)
	}

	/// Upsert a secret series, appending a new content version and marking
	/// it current.
	///
	/// A version is appended even when the content is byte-identical to the
	/// current one: downstream consumers rely on version bumps as rollout
	/// triggers.
	#[tracing::instrument(skip(self, params), fields(name = %params.name))]
	pub async fn create_or_update_secret(&self, params: &CreateSecretParams) -> Result<i64> {
		let now = Utc::now().to_rfc3339();
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO secrets (name, description, kind, options, created_at, created_by, updated_at, updated_by)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(name) DO UPDATE SET
				description = excluded.description,
				kind = excluded.kind,
				options = excluded.options,
				updated_at = excluded.updated_at,
				updated_by = excluded.updated_by
			"#,
		)
		.bind(&params.name)
		.bind(&params.description)
		.bind(&params.kind)
		.bind(serde_json::to_string(&params.generation_options)?)
		.bind(&now)
		.bind(&params.creator)
		.bind(&now)
		.bind(&params.creator)
		.execute(&mut *tx)
		.await?;

		let series_id: i64 = sqlx::query("SELECT id FROM secrets WHERE name = ?")
			.bind(&params.name)
			.fetch_one(&mut *tx)
			.await?
			.get("id");

		let content_id = self
			.insert_content(&mut tx, series_id, params, &now)
			.await?;
		sqlx::query("UPDATE secrets SET current_version_id = ? WHERE id = ?")
			.bind(content_id)
			.bind(series_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		tracing::debug!(series_id, content_id, "secret version appended");
		Ok(series_id)
	}

	async fn insert_content(
		&self,
		tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
		series_id: i64,
		params: &CreateSecretParams,
		now: &str,
	) -> Result<i64> {
		let result = sqlx::query(
			r#"
			INSERT INTO secrets_content (series_id, encrypted_content, content_hmac, metadata, expiry, created_at, created_by, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(series_id)
		.bind(&params.encrypted_content)
		.bind(&params.content_hmac)
		.bind(serde_json::to_string(&params.metadata)?)
		.bind(params.expiry)
		.bind(now)
		.bind(&params.creator)
		.bind(now)
		.execute(&mut **tx)
		.await?;
		Ok(result.last_insert_rowid())
	}

	/// Look up a series and its current content by id.
	#[tracing::instrument(skip(self))]
	pub async fn get_secret_by_id(&self, id: i64) -> Result<Option<SecretSeriesAndContent>> {
		let query = format!(
			"SELECT {SERIES_AND_CONTENT_COLUMNS} FROM secrets s \
			 JOIN secrets_content c ON c.id = s.current_version_id WHERE s.id = ?"
		);
		let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
		Ok(row.map(|r| row_to_pair(&r)))
	}

	/// Look up a series and its current content by name.
	#[tracing::instrument(skip(self))]
	pub async fn get_secret_by_name(&self, name: &str) -> Result<Option<SecretSeriesAndContent>> {
		let query = format!(
			"SELECT {SERIES_AND_CONTENT_COLUMNS} FROM secrets s \
			 JOIN secrets_content c ON c.id = s.current_version_id WHERE s.name = ?"
		);
		let row = sqlx::query(&query)
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|r| row_to_pair(&r)))
	}

	/// Ids and names of every live series.
	#[tracing::instrument(skip(self))]
	pub async fn list_secret_names(&self) -> Result<Vec<(i64, String)>> {
		let rows = sqlx::query("SELECT id, name FROM secrets ORDER BY name")
			.fetch_all(&self.pool)
			.await?;
		Ok(rows
			.into_iter()
			.map(|r| (r.get("id"), r.get("name")))
			.collect())
	}

	/// Secrets with their current content, optionally bounded by expiry and
	/// restricted to one group's grants.
	///
	/// The expiry filter keeps `0 < expiry <= max_expiry`: zero means
	/// "unknown", and callers asking for expiring-soon secrets don't want
	/// unknowns.
	#[tracing::instrument(skip(self, group), fields(group = group.map(|g| g.name.as_str())))]
	pub async fn list_secrets(
		&self,
		max_expiry: Option<i64>,
		group: Option<&crate::group::Group>,
	) -> Result<Vec<SecretSeriesAndContent>> {
		let mut conditions = vec!["1=1".to_string()];
		if max_expiry.is_some() {
			conditions.push("c.expiry > 0 AND c.expiry <= ?".to_string());
		}
		if group.is_some() {
			conditions.push("s.id IN (SELECT secret_id FROM accessgrants WHERE group_id = ?)".to_string());
		}
		let query = format!(
			"SELECT {SERIES_AND_CONTENT_COLUMNS} FROM secrets s \
			 JOIN secrets_content c ON c.id = s.current_version_id \
			 WHERE {} ORDER BY c.expiry, s.name",
			conditions.join(" AND ")
		);

		let mut q = sqlx::query(&query);
		if let Some(bound) = max_expiry {
			q = q.bind(bound);
		}
		if let Some(g) = group {
			q = q.bind(g.id);
		}

		let rows = q.fetch_all(&self.pool).await?;
		Ok(rows.iter().map(row_to_pair).collect())
	}

	/// A page of a series' versions, newest first by update time.
	///
	/// Returns `None` when no series has this name.
	#[tracing::instrument(skip(self))]
	pub async fn get_versions_by_name(
		&self,
		name: &str,
		offset: i64,
		count: i64,
	) -> Result<Option<Vec<SecretContent>>> {
		let Some(series_id) = self.series_id(name).await? else {
			return Ok(None);
		};

		let rows = sqlx::query(
			r#"
			SELECT id, series_id, encrypted_content, content_hmac, metadata, expiry, created_at, created_by, updated_at
			FROM secrets_content
			WHERE series_id = ?
			ORDER BY updated_at DESC, id DESC
			LIMIT ? OFFSET ?
			"#,
		)
		.bind(series_id)
		.bind(count)
		.bind(offset)
		.fetch_all(&self.pool)
		.await?;

		Ok(Some(rows.iter().map(row_to_content).collect()))
	}

	/// Point the series at an existing version.
	///
	/// Fails with `NotFound` for a missing series and `BadVersion` when the
	/// version id does not belong to it.
	#[tracing::instrument(skip(self))]
	pub async fn set_current_version_by_name(&self, name: &str, version_id: i64) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		let series_id: i64 = sqlx::query("SELECT id FROM secrets WHERE name = ?")
			.bind(name)
			.fetch_optional(&mut *tx)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("secret '{name}'")))?
			.get("id");

		let owner: Option<i64> = sqlx::query("SELECT series_id FROM secrets_content WHERE id = ?")
			.bind(version_id)
			.fetch_optional(&mut *tx)
			.await?
			.map(|r| r.get("series_id"));
		if owner != Some(series_id) {
			return Err(DbError::BadVersion {
				secret: name.to_string(),
				version: version_id,
			});
		}

		sqlx::query("UPDATE secrets SET current_version_id = ?, updated_at = ? WHERE id = ?")
			.bind(version_id)
			.bind(Utc::now().to_rfc3339())
			.bind(series_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		Ok(())
	}

	/// Update the expiry on the series' *current* content.
	///
	/// Returns whether a row was affected.
	#[tracing::instrument(skip(self))]
	pub async fn set_expiration(&self, name: &str, expiry: i64) -> Result<bool> {
		let result = sqlx::query(
			r#"
			UPDATE secrets_content SET expiry = ?, updated_at = ?
			WHERE id = (SELECT current_version_id FROM secrets WHERE name = ?)
			"#,
		)
		.bind(expiry)
		.bind(Utc::now().to_rfc3339())
		.bind(name)
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Delete a series, its versions, and its access grants. Idempotent;
	/// the name becomes free for reuse.
	#[tracing::instrument(skip(self))]
	pub async fn delete_secrets_by_name(&self, name: &str) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		let Some(series_id) = sqlx::query("SELECT id FROM secrets WHERE name = ?")
			.bind(name)
			.fetch_optional(&mut *tx)
			.await?
			.map(|r| r.get::<i64, _>("id"))
		else {
			return Ok(());
		};

		sqlx::query("DELETE FROM accessgrants WHERE secret_id = ?")
			.bind(series_id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM secrets_content WHERE series_id = ?")
			.bind(series_id)
			.execute(&mut *tx)
			.await?;
		sqlx::query("DELETE FROM secrets WHERE id = ?")
			.bind(series_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		tracing::debug!(series_id, "secret series deleted");
		Ok(())
	}

	async fn series_id(&self, name: &str) -> Result<Option<i64>> {
		let row = sqlx::query("SELECT id FROM secrets WHERE name = ?")
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(|r| r.get("id")))
	}
}

pub(crate) fn row_to_pair(row: &SqliteRow) -> SecretSeriesAndContent {
	let series = SecretSeries {
		id: row.get("id"),
		name: row.get("name"),
		description: row.get("description"),
		kind: row.get("kind"),
		created_at: parse_ts(&row.get::<String, _>("created_at")),
		created_by: row.get("created_by"),
		updated_at: parse_ts(&row.get::<String, _>("updated_at")),
		updated_by: row.get("updated_by"),
		current_version_id: row.get("current_version_id"),
		generation_options: parse_string_map(&row.get::<String, _>("options")),
	};
	let content = SecretContent {
		id: row.get("content_id"),
		series_id: series.id,
		encrypted_content: row.get("encrypted_content"),
		content_hmac: row.get("content_hmac"),
		metadata: parse_string_map(&row.get::<String, _>("metadata")),
		expiry: row.get("expiry"),
		created_at: parse_ts(&row.get::<String, _>("content_created_at")),
		created_by: row.get("content_created_by"),
		updated_at: parse_ts(&row.get::<String, _>("content_updated_at")),
	};
	SecretSeriesAndContent { series, content }
}

fn row_to_content(row: &SqliteRow) -> SecretContent {
	SecretContent {
		id: row.get("id"),
		series_id: row.get("series_id"),
		encrypted_content: row.get("encrypted_content"),
		content_hmac: row.get("content_hmac"),
		metadata: parse_string_map(&row.get::<String, _>("metadata")),
		expiry: row.get("expiry"),
		created_at: parse_ts(&row.get::<String, _>("created_at")),
		created_by: row.get("created_by"),
		updated_at: parse_ts(&row.get::<String, _>("updated_at")),
	}
}
