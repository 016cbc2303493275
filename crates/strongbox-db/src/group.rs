// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Group persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::error::{DbError, Result};
use crate::types::parse_ts;

/// An access-control group. Members of a group may read the secrets the
/// group has been granted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
	pub id: i64,
	pub name: String,
	pub description: String,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub created_at: DateTime<Utc>,
	pub created_by: String,
	#[serde(with = "chrono::serde::ts_seconds")]
	pub updated_at: DateTime<Utc>,
	pub updated_by: String,
}

#[derive(Clone)]
pub struct GroupRepository {
	pool: SqlitePool,
}

impl GroupRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn create_group(&self, name: &str, description: &str, creator: &str) -> Result<i64> {
		let now = Utc::now().to_rfc3339();
		let result = sqlx::query(
			r#"
			INSERT INTO groups (name, description, created_at, created_by, updated_at, updated_by)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(name)
		.bind(description)
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

	#[tracing::instrument(skip(self))]
	pub async fn get_group(&self, name: &str) -> Result<Option<Group>> {
		let row = sqlx::query(
			"SELECT id, name, description, created_at, created_by, updated_at, updated_by \
			 FROM groups WHERE name = ?",
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;
		Ok(row.map(|r| row_to_group(&r)))
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_groups(&self) -> Result<Vec<Group>> {
		let rows = sqlx::query(
			"SELECT id, name, description, created_at, created_by, updated_at, updated_by \
			 FROM groups ORDER BY name",
		)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.iter().map(row_to_group).collect())
	}
}

pub(crate) fn row_to_group(row: &SqliteRow) -> Group {
	Group {
		id: row.get("id"),
		name: row.get("name"),
		description: row.get("description"),
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
		let repo = GroupRepository::new(pool);

		let id = repo.create_group("db-team", "database owners", "admin").await.unwrap();
		let group = repo.get_group("db-team").await.unwrap().unwrap();
		assert_eq!(group.id, id);
		assert_eq!(group.description, "database owners");

		assert!(repo.get_group("ghost").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_duplicate_name_conflicts() {
		let pool = create_test_pool().await;
		let repo = GroupRepository::new(pool);

		repo.create_group("dup", "", "admin").await.unwrap();
		let err = repo.create_group("dup", "", "admin").await.unwrap_err();
		assert!(matches!(err, DbError::Conflict(_)));
	}

	#[tokio::test]
	async fn test_list_sorted_by_name() {
		let pool = create_test_pool().await;
		let repo = GroupRepository::new(pool);

		repo.create_group("web", "", "admin").await.unwrap();
		repo.create_group("db", "", "admin").await.unwrap();

		let names: Vec<_> = repo
			.list_groups()
			.await
			.unwrap()
			.into_iter()
			.map(|g| g.name)
			.collect();
		assert_eq!(names, vec!["db", "web"]);
	}
}
