// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router assembly.

use axum::{
	routing::{get, post},
	Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;

use strongbox_audit::{AuditLog, AuditSink, SqliteAuditSink, TracingAuditSink};
use strongbox_config::{AuthConfig, ServerConfig};
use strongbox_crypto::ContentCryptographer;
use strongbox_db::{
	AclRepository, ClientRepository, GroupRepository, SecretRepository,
};

use crate::controller::SecretController;
use crate::routes::automation;

/// Application state shared across handlers.
///
/// No cross-request mutable memory lives here: everything mutable is behind
/// the database pool.
#[derive(Clone)]
pub struct AppState {
	pub controller: Arc<SecretController>,
	pub secrets: SecretRepository,
	pub groups: GroupRepository,
	pub clients: ClientRepository,
	pub acl: AclRepository,
	pub audit: Arc<AuditLog>,
	pub auth: AuthConfig,
}

/// Creates the application state from a pool and loaded configuration.
pub fn create_app_state(
	pool: SqlitePool,
	cryptographer: Arc<ContentCryptographer>,
	config: &ServerConfig,
) -> AppState {
	let mut sinks: Vec<Arc<dyn AuditSink>> = Vec::new();
	if config.audit.sqlite_sink {
		sinks.push(Arc::new(SqliteAuditSink::new(pool.clone())));
	}
	if config.audit.tracing_sink {
		sinks.push(Arc::new(TracingAuditSink::new()));
	}

	let secrets = SecretRepository::new(pool.clone());
	AppState {
		controller: Arc::new(SecretController::new(cryptographer, secrets.clone())),
		secrets,
		groups: GroupRepository::new(pool.clone()),
		clients: ClientRepository::new(pool.clone()),
		acl: AclRepository::new(pool),
		audit: Arc::new(AuditLog::new(sinks)),
		auth: config.auth.clone(),
	}
}

/// Builds the full router for the automation surface.
pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/healthz", get(healthz))
		.route(
			"/automation/v2/secrets",
			post(automation::create_secret).get(automation::secret_listing),
		)
		.route(
			"/automation/v2/secrets/expiring/{time}",
			get(automation::secret_listing_expiring),
		)
		.route(
			"/automation/v2/secrets/expiring/v2/{time}",
			get(automation::secret_listing_expiring_v2),
		)
		.route(
			"/automation/v2/secrets/expiring/{time}/{group}",
			get(automation::secret_listing_expiring_for_group),
		)
		.route(
			"/automation/v2/secrets/{name}",
			post(automation::create_or_update_secret)
				.get(automation::secret_info)
				.delete(automation::delete_secret_series),
		)
		.route(
			"/automation/v2/secrets/{name}/versions/{range}",
			get(automation::secret_versions),
		)
		.route(
			"/automation/v2/secrets/{name}/setversion",
			post(automation::set_secret_version),
		)
		.route(
			"/automation/v2/secrets/{name}/backfill-expiration",
			post(automation::backfill_expiration),
		)
		.route(
			"/automation/v2/secrets/{name}/groups",
			get(automation::secret_groups_listing).put(automation::modify_secret_groups),
		)
		.with_state(state)
}

async fn healthz() -> &'static str {
	"ok"
}
