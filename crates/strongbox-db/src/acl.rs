// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access-control persistence.
//!
//! The ACL graph is bipartite through groups: clients join groups
//! (memberships) and groups are granted secrets (accessgrants). Both edge
//! relations are deduplicated, so grant and revoke are idempotent; an audit
//! event is emitted only when an edge actually changed.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use strongbox_audit::{AuditEvent, AuditLog, EventTag};

use crate::client::{row_to_client, Client};
use crate::error::{DbError, Result};
use crate::group::{row_to_group, Group};
use crate::secret::{row_to_pair, SanitizedSecret, SERIES_AND_CONTENT_COLUMNS};

#[derive(Clone)]
pub struct AclRepository {
	pool: SqlitePool,
}

impl AclRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Grant a group access to a secret.
	///
	/// Idempotent: returns whether an edge was created. `ACCESS_ADD` is
	/// recorded only on state change, after the insert commits; an audit
	/// failure propagates to the caller.
	#[tracing::instrument(skip(self, audit, extra))]
	pub async fn find_and_allow_access(
		&self,
		secret_id: i64,
		group_id: i64,
		audit: &AuditLog,
		actor: &str,
		extra: BTreeMap<String, String>,
	) -> Result<bool> {
		let (secret_name, group_name) = self.edge_names(secret_id, group_id).await?;

		let result = sqlx::query(
			"INSERT OR IGNORE INTO accessgrants (group_id, secret_id, created_at) VALUES (?, ?, ?)",
		)
		.bind(group_id)
		.bind(secret_id)
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await?;

		let changed = result.rows_affected() > 0;
		if changed {
			let mut extra = extra;
			extra.insert("group".to_string(), group_name);
			let event = AuditEvent::with_extra(EventTag::AccessAdd, actor, secret_name, extra);
			audit.record_event(&event).await?;
		}
		Ok(changed)
	}

	/// Revoke a group's access to a secret.
	///
	/// Idempotent: returns whether an edge was removed. `ACCESS_REMOVE` is
	/// recorded only on state change.
	#[tracing::instrument(skip(self, audit, extra))]
	pub async fn find_and_revoke_access(
		&self,
		secret_id: i64,
		group_id: i64,
		audit: &AuditLog,
		actor: &str,
		extra: BTreeMap<String, String>,
	) -> Result<bool> {
		let (secret_name, group_name) = self.edge_names(secret_id, group_id).await?;

		let result = sqlx::query("DELETE FROM accessgrants WHERE group_id = ? AND secret_id = ?")
			.bind(group_id)
			.bind(secret_id)
			.execute(&self.pool)
			.await?;

		let changed = result.rows_affected() > 0;
		if changed {
			let mut extra = extra;
			extra.insert("group".to_string(), group_name);
			let event = AuditEvent::with_extra(EventTag::AccessRemove, actor, secret_name, extra);
			audit.record_event(&event).await?;
		}
		Ok(changed)
	}

	/// Enroll a client in a group. Idempotent.
	#[tracing::instrument(skip(self))]
	pub async fn enroll_client(&self, client_id: i64, group_id: i64) -> Result<bool> {
		let result = sqlx::query(
			"INSERT OR IGNORE INTO memberships (client_id, group_id, created_at) VALUES (?, ?, ?)",
		)
		.bind(client_id)
		.bind(group_id)
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Remove a client from a group. Idempotent.
	#[tracing::instrument(skip(self))]
	pub async fn evict_client(&self, client_id: i64, group_id: i64) -> Result<bool> {
		let result = sqlx::query("DELETE FROM memberships WHERE client_id = ? AND group_id = ?")
			.bind(client_id)
			.bind(group_id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() > 0)
	}

	/// Groups granted access to a secret.
	#[tracing::instrument(skip(self))]
	pub async fn get_groups_for_secret(&self, secret_id: i64) -> Result<Vec<Group>> {
		let rows = sqlx::query(
			r#"
			SELECT g.id, g.name, g.description, g.created_at, g.created_by, g.updated_at, g.updated_by
			FROM groups g
			JOIN accessgrants a ON a.group_id = g.id
			WHERE a.secret_id = ?
			ORDER BY g.name
			"#,
		)
		.bind(secret_id)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(row_to_group).collect())
	}

	/// Clients that can read a secret through any group.
	#[tracing::instrument(skip(self))]
	pub async fn get_clients_for_secret(&self, secret_id: i64) -> Result<Vec<Client>> {
		let rows = sqlx::query(
			r#"
			SELECT DISTINCT c.id, c.name, c.description, c.enabled, c.automation_allowed,
				c.last_seen, c.created_at, c.created_by, c.updated_at, c.updated_by
			FROM clients c
			JOIN memberships m ON m.client_id = c.id
			JOIN accessgrants a ON a.group_id = m.group_id
			WHERE a.secret_id = ?
			ORDER BY c.name
			"#,
		)
		.bind(secret_id)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(row_to_client).collect())
	}

	/// Secrets visible to a client: the union over its groups of each
	/// group's grants, deduplicated by secret id.
	#[tracing::instrument(skip(self))]
	pub async fn get_secrets_for_client(&self, client_id: i64) -> Result<Vec<SanitizedSecret>> {
		let query = format!(
			r#"
			SELECT DISTINCT {SERIES_AND_CONTENT_COLUMNS}
			FROM secrets s
			JOIN secrets_content c ON c.id = s.current_version_id
			JOIN accessgrants a ON a.secret_id = s.id
			JOIN memberships m ON m.group_id = a.group_id
			WHERE m.client_id = ?
			ORDER BY s.name
			"#
		);
		let rows = sqlx::query(&query).bind(client_id).fetch_all(&self.pool).await?;
		Ok(rows
			.iter()
			.map(|r| SanitizedSecret::from_series_and_content(&row_to_pair(r)))
			.collect())
	}

	async fn edge_names(&self, secret_id: i64, group_id: i64) -> Result<(String, String)> {
		let secret_name: String = sqlx::query("SELECT name FROM secrets WHERE id = ?")
			.bind(secret_id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("secret id {secret_id}")))?
			.get("name");
		let group_name: String = sqlx::query("SELECT name FROM groups WHERE id = ?")
			.bind(group_id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| DbError::NotFound(format!("group id {group_id}")))?
			.get("name");
		Ok((secret_name, group_name))
	}
}
