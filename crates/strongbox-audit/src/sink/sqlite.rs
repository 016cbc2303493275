// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::AuditSinkError;
use crate::event::AuditEvent;
use crate::sink::AuditSink;

pub struct SqliteAuditSink {
	pool: SqlitePool,
	name: String,
}

impl SqliteAuditSink {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			name: "sqlite".to_string(),
		}
	}
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
	fn name(&self) -> &str {
		&self.name
	}

	async fn publish(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		let extra_json = serde_json::to_string(&event.extra_info)
			.map_err(|e| AuditSinkError::Permanent(format!("failed to serialize extra_info: {e}")))?;

		sqlx::query(
			r#"
			INSERT INTO audit_events (id, at, tag, actor, target, extra)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(event.id.to_string())
		.bind(event.at.to_rfc3339())
		.bind(event.tag.to_string())
		.bind(&event.actor)
		.bind(&event.target)
		.bind(&extra_json)
		.execute(&self.pool)
		.await
		.map_err(|e| {
			if is_transient_error(&e) {
				AuditSinkError::Transient(format!("database error: {e}"))
			} else {
				AuditSinkError::Permanent(format!("database error: {e}"))
			}
		})?;

		Ok(())
	}
}

fn is_transient_error(e: &sqlx::Error) -> bool {
	match e {
		sqlx::Error::Io(_) => true,
		sqlx::Error::PoolTimedOut => true,
		sqlx::Error::PoolClosed => true,
		sqlx::Error::Database(db_err) => {
			let msg = db_err.message().to_lowercase();
			msg.contains("busy") || msg.contains("locked") || msg.contains("timeout")
		}
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::EventTag;
	use sqlx::Row;
	use std::str::FromStr;

	async fn create_audit_test_pool() -> SqlitePool {
		let options = sqlx::sqlite::SqliteConnectOptions::from_str(":memory:")
			.unwrap()
			.create_if_missing(true);
		let pool = sqlx::sqlite::SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(options)
			.await
			.expect("Failed to create test pool");
		sqlx::query(
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
		)
		.execute(&pool)
		.await
		.unwrap();
		pool
	}

	#[tokio::test]
	async fn test_publish_inserts_row() {
		let pool = create_audit_test_pool().await;
		let sink = SqliteAuditSink::new(pool.clone());

		let mut event = AuditEvent::new(EventTag::SecretCreate, "ops-bot", "db-password");
		event
			.extra_info
			.insert("expiry".to_string(), "0".to_string());
		sink.publish(&event).await.unwrap();

		let row = sqlx::query("SELECT tag, actor, target, extra FROM audit_events")
			.fetch_one(&pool)
			.await
			.unwrap();
		assert_eq!(row.get::<String, _>("tag"), "SECRET_CREATE");
		assert_eq!(row.get::<String, _>("actor"), "ops-bot");
		assert_eq!(row.get::<String, _>("target"), "db-password");
		assert!(row.get::<String, _>("extra").contains("expiry"));
	}

	#[tokio::test]
	async fn test_publish_without_table_fails() {
		let pool = SqlitePool::connect(":memory:").await.unwrap();
		let sink = SqliteAuditSink::new(pool);

		let event = AuditEvent::new(EventTag::SecretDelete, "ops-bot", "db-password");
		assert!(sink.publish(&event).await.is_err());
	}
}
