// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Version {version} does not belong to secret '{secret}'")]
	BadVersion { secret: String, version: i64 },

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error(transparent)]
	Audit(#[from] strongbox_audit::AuditError),
}

impl DbError {
	/// True when the underlying database rejected a duplicate on a unique
	/// index — how create races on a secret name surface to the loser.
	pub fn is_unique_violation(e: &sqlx::Error) -> bool {
		e.as_database_error()
			.map(|db| db.is_unique_violation())
			.unwrap_or(false)
	}
}

pub type Result<T> = std::result::Result<T, DbError>;
