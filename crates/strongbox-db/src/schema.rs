// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Idempotent schema creation, run at startup.

use sqlx::SqlitePool;

use crate::error::Result;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	let statements = [
		r#"
		CREATE TABLE IF NOT EXISTS secrets (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL UNIQUE,
			description TEXT NOT NULL DEFAULT '',
			kind TEXT NOT NULL DEFAULT '',
			options TEXT NOT NULL DEFAULT '{}',
			current_version_id INTEGER,
			created_at TEXT NOT NULL,
			created_by TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			updated_by TEXT NOT NULL
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS secrets_content (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			series_id INTEGER NOT NULL REFERENCES secrets(id) ON DELETE CASCADE,
			encrypted_content TEXT NOT NULL,
			content_hmac TEXT NOT NULL,
			metadata TEXT NOT NULL DEFAULT '{}',
			expiry INTEGER NOT NULL DEFAULT 0,
			created_at TEXT NOT NULL,
			created_by TEXT NOT NULL,
			updated_at TEXT NOT NULL
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS groups (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL UNIQUE,
			description TEXT NOT NULL DEFAULT '',
			created_at TEXT NOT NULL,
			created_by TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			updated_by TEXT NOT NULL
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS clients (
			id INTEGER PRIMARY KEY AUTOINCREMENT,
			name TEXT NOT NULL UNIQUE,
			description TEXT NOT NULL DEFAULT '',
			enabled INTEGER NOT NULL DEFAULT 1,
			automation_allowed INTEGER NOT NULL DEFAULT 0,
			last_seen TEXT,
			created_at TEXT NOT NULL,
			created_by TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			updated_by TEXT NOT NULL
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS memberships (
			client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
			group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
			created_at TEXT NOT NULL,
			PRIMARY KEY (client_id, group_id)
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS accessgrants (
			group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
			secret_id INTEGER NOT NULL REFERENCES secrets(id) ON DELETE CASCADE,
			created_at TEXT NOT NULL,
			PRIMARY KEY (group_id, secret_id)
		)
		"#,
		r#"
		CREATE TABLE IF NOT EXISTS audit_events (
			id TEXT PRIMARY KEY,
			at TEXT NOT NULL,
			tag TEXT NOT NULL,
			actor TEXT NOT NULL,
			target TEXT NOT NULL,
			extra TEXT NOT NULL DEFAULT '{}'
		)
		"#,
		"CREATE INDEX IF NOT EXISTS idx_secrets_content_series ON secrets_content(series_id)",
		"CREATE INDEX IF NOT EXISTS idx_secrets_content_expiry ON secrets_content(expiry)",
		"CREATE INDEX IF NOT EXISTS idx_accessgrants_secret ON accessgrants(secret_id)",
		"CREATE INDEX IF NOT EXISTS idx_memberships_group ON memberships(group_id)",
		"CREATE INDEX IF NOT EXISTS idx_audit_events_at ON audit_events(at)",
	];

	for statement in statements {
		sqlx::query(statement).execute(pool).await?;
	}

	tracing::debug!("database schema up to date");
	Ok(())
}
