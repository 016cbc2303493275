// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end tests for the automation secret-management surface.
//!
//! Each test drives the real router over an in-memory database, with the
//! peer principal supplied through the trusted proxy header.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tower::ServiceExt;

use strongbox_audit::{AuditLog, AuditSink, SqliteAuditSink};
use strongbox_config::AuthConfig;
use strongbox_crypto::{ContentCryptographer, MasterKey};
use strongbox_db::testing::create_test_pool;
use strongbox_db::{AclRepository, ClientRepository, GroupRepository, SecretRepository};
use strongbox_server::{create_router, AppState, SecretController};

const CN_HEADER: &str = "x-client-cert-cn";

async fn test_app() -> (Router, SqlitePool) {
	let pool = create_test_pool().await;

	let clients = ClientRepository::new(pool.clone());
	clients
		.create_client("ops-bot", "automation", "test", true)
		.await
		.unwrap();
	clients
		.create_client("reader", "consumer only", "test", false)
		.await
		.unwrap();
	clients
		.create_client("locked", "disabled automation", "test", true)
		.await
		.unwrap();
	clients.set_enabled("locked", false).await.unwrap();

	let groups = GroupRepository::new(pool.clone());
	for name in ["db-team", "alpha", "beta", "gamma"] {
		groups.create_group(name, "", "test").await.unwrap();
	}

	let cryptographer = Arc::new(ContentCryptographer::new(MasterKey::generate()));
	let secrets = SecretRepository::new(pool.clone());
	let sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(SqliteAuditSink::new(pool.clone()))];

	let state = AppState {
		controller: Arc::new(SecretController::new(cryptographer, secrets.clone())),
		secrets,
		groups,
		clients,
		acl: AclRepository::new(pool.clone()),
		audit: Arc::new(AuditLog::new(sinks)),
		auth: AuthConfig {
			trust_proxy_header: true,
			client_cn_header: CN_HEADER.to_string(),
		},
	};

	(create_router(state), pool)
}

fn request(method: Method, uri: &str, peer: Option<&str>, body: Option<Value>) -> Request<Body> {
	let mut builder = Request::builder().method(method).uri(uri);
	if let Some(peer) = peer {
		builder = builder.header(CN_HEADER, peer);
	}
	match body {
		Some(value) => builder
			.header(header::CONTENT_TYPE, "application/json")
			.body(Body::from(value.to_string()))
			.unwrap(),
		None => builder.body(Body::empty()).unwrap(),
	}
}

async fn send(
	app: &Router,
	method: Method,
	uri: &str,
	body: Option<Value>,
) -> (StatusCode, Option<Value>, axum::http::HeaderMap) {
	let response = app
		.clone()
		.oneshot(request(method, uri, Some("ops-bot"), body))
		.await
		.unwrap();
	let status = response.status();
	let headers = response.headers().clone();
	let bytes = response.into_body().collect().await.unwrap().to_bytes();
	let value = serde_json::from_slice(&bytes).ok();
	(status, value, headers)
}

async fn create_secret(app: &Router, name: &str, content: &str, expiry: i64, groups: Vec<&str>) {
	let (status, _, _) = send(
		app,
		Method::POST,
		"/automation/v2/secrets",
		Some(json!({
			"name": name,
			"content": content,
			"expiry": expiry,
			"groups": groups,
		})),
	)
	.await;
	assert_eq!(status, StatusCode::CREATED);
}

async fn audit_count(pool: &SqlitePool, tag: &str) -> i64 {
	sqlx::query("SELECT COUNT(*) AS cnt FROM audit_events WHERE tag = ?")
		.bind(tag)
		.fetch_one(pool)
		.await
		.unwrap()
		.get("cnt")
}

#[tokio::test]
async fn test_create_and_fetch() {
	let (app, pool) = test_app().await;

	let (status, _, headers) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets",
		Some(json!({
			"name": "db-password",
			"content": "cGFzczEyMw==",
			"expiry": 0,
			"groups": ["db-team"],
		})),
	)
	.await;
	assert_eq!(status, StatusCode::CREATED);
	assert_eq!(
		headers.get(header::LOCATION).unwrap(),
		"/automation/v2/secrets/db-password"
	);

	let (status, body, _) = send(&app, Method::GET, "/automation/v2/secrets/db-password", None).await;
	assert_eq!(status, StatusCode::OK);
	let body = body.unwrap();
	assert_eq!(body["series"]["name"], "db-password");
	assert_eq!(body["expiry"], 0);
	// The detail response never carries secret material.
	assert!(body["series"].get("encryptedContent").is_none());

	assert_eq!(audit_count(&pool, "SECRET_CREATE").await, 1);
	assert_eq!(audit_count(&pool, "ACCESS_ADD").await, 1);
}

#[tokio::test]
async fn test_duplicate_create_conflicts() {
	let (app, _) = test_app().await;

	let body = json!({"name": "db-password", "content": "cGFzczEyMw==", "expiry": 0, "groups": []});
	let (status, _, _) = send(&app, Method::POST, "/automation/v2/secrets", Some(body.clone())).await;
	assert_eq!(status, StatusCode::CREATED);

	let (status, error, _) = send(&app, Method::POST, "/automation/v2/secrets", Some(body)).await;
	assert_eq!(status, StatusCode::CONFLICT);
	assert_eq!(
		error.unwrap()["message"],
		"Cannot create secret db-password."
	);
}

#[tokio::test]
async fn test_validation_failures() {
	let (app, _) = test_app().await;

	let (status, _, _) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets",
		Some(json!({"name": "k", "content": ""})),
	)
	.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, _, _) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets",
		Some(json!({"name": "k", "content": "@@not base64@@"})),
	)
	.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_authentication_and_authorization() {
	let (app, _) = test_app().await;

	// No peer identity at all.
	let response = app
		.clone()
		.oneshot(request(Method::GET, "/automation/v2/secrets", None, None))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

	// Unknown certificate CN.
	let response = app
		.clone()
		.oneshot(request(
			Method::GET,
			"/automation/v2/secrets",
			Some("ghost"),
			None,
		))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

	// Known client without automation rights.
	let response = app
		.clone()
		.oneshot(request(
			Method::GET,
			"/automation/v2/secrets",
			Some("reader"),
			None,
		))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::FORBIDDEN);

	// Disabled client.
	let response = app
		.clone()
		.oneshot(request(
			Method::GET,
			"/automation/v2/secrets",
			Some("locked"),
			None,
		))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_versioning_and_rollback() {
	let (app, pool) = test_app().await;

	create_secret(&app, "k", "djE=", 1111, vec![]).await;

	let (status, _, _) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets/k",
		Some(json!({"content": "djI=", "expiry": 2222})),
	)
	.await;
	assert_eq!(status, StatusCode::CREATED);

	let (status, versions, _) = send(
		&app,
		Method::GET,
		"/automation/v2/secrets/k/versions/0-10",
		None,
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	let versions = versions.unwrap();
	let versions = versions.as_array().unwrap();
	assert_eq!(versions.len(), 2);
	// Newest first.
	assert_eq!(versions[0]["expiry"], 2222);
	assert_eq!(versions[1]["expiry"], 1111);
	let v1_id = versions[1]["version"].as_i64().unwrap();

	let (status, _, _) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets/k/setversion",
		Some(json!({"name": "k", "version": v1_id})),
	)
	.await;
	assert_eq!(status, StatusCode::CREATED);

	let (_, detail, _) = send(&app, Method::GET, "/automation/v2/secrets/k", None).await;
	assert_eq!(detail.unwrap()["expiry"], 1111);

	assert_eq!(audit_count(&pool, "SECRET_CREATEORUPDATE").await, 1);
	assert_eq!(audit_count(&pool, "SECRET_CHANGEVERSION").await, 1);
}

#[tokio::test]
async fn test_setversion_rejects_foreign_and_missing() {
	let (app, _) = test_app().await;

	create_secret(&app, "mine", "QQ==", 0, vec![]).await;
	create_secret(&app, "other", "QQ==", 0, vec![]).await;

	let (_, other_detail, _) = send(&app, Method::GET, "/automation/v2/secrets/other", None).await;
	let other_version = other_detail.unwrap()["version"].as_i64().unwrap();

	let (status, _, _) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets/mine/setversion",
		Some(json!({"name": "mine", "version": other_version})),
	)
	.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);

	let (status, _, _) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets/ghost/setversion",
		Some(json!({"name": "ghost", "version": 1})),
	)
	.await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_version_range_is_rejected() {
	let (app, _) = test_app().await;
	create_secret(&app, "k", "QQ==", 0, vec![]).await;

	let (status, _, _) = send(
		&app,
		Method::GET,
		"/automation/v2/secrets/k/versions/abc",
		None,
	)
	.await;
	assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expiring_listings() {
	let (app, _) = test_app().await;

	create_secret(&app, "a", "QQ==", 0, vec![]).await;
	create_secret(&app, "b", "QQ==", 1000, vec!["db-team"]).await;
	create_secret(&app, "c", "QQ==", 5000, vec![]).await;

	// 0 (unknown) excluded, 5000 beyond the bound excluded.
	let (status, names, _) = send(
		&app,
		Method::GET,
		"/automation/v2/secrets/expiring/3000",
		None,
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(names.unwrap(), json!(["b"]));

	// Inclusive upper bound.
	let (_, names, _) = send(
		&app,
		Method::GET,
		"/automation/v2/secrets/expiring/5000",
		None,
	)
	.await;
	assert_eq!(names.unwrap(), json!(["b", "c"]));

	let (status, sanitized, _) = send(
		&app,
		Method::GET,
		"/automation/v2/secrets/expiring/v2/3000",
		None,
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	let sanitized = sanitized.unwrap();
	let entries = sanitized.as_array().unwrap();
	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0]["name"], "b");
	assert!(entries[0].get("encryptedContent").is_none());
	assert!(entries[0].get("contentHmac").is_none());

	let (status, names, _) = send(
		&app,
		Method::GET,
		"/automation/v2/secrets/expiring/3000/db-team",
		None,
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(names.unwrap(), json!(["b"]));

	let (status, _, _) = send(
		&app,
		Method::GET,
		"/automation/v2/secrets/expiring/3000/no-such-group",
		None,
	)
	.await;
	assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_group_modification_diff() {
	let (app, pool) = test_app().await;

	create_secret(&app, "s", "QQ==", 0, vec!["alpha", "beta"]).await;
	assert_eq!(audit_count(&pool, "ACCESS_ADD").await, 2);

	// "beta" already granted, "delta" doesn't exist: both are skipped.
	let (status, names, _) = send(
		&app,
		Method::PUT,
		"/automation/v2/secrets/s/groups",
		Some(json!({"addGroups": ["beta", "gamma"], "removeGroups": ["alpha", "delta"]})),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(names.unwrap(), json!(["beta", "gamma"]));

	assert_eq!(audit_count(&pool, "ACCESS_ADD").await, 3);
	assert_eq!(audit_count(&pool, "ACCESS_REMOVE").await, 1);

	let (_, names, _) = send(&app, Method::GET, "/automation/v2/secrets/s/groups", None).await;
	assert_eq!(names.unwrap(), json!(["beta", "gamma"]));
}

#[tokio::test]
async fn test_unknown_group_on_create_is_skipped() {
	let (app, pool) = test_app().await;

	create_secret(&app, "s", "QQ==", 0, vec!["db-team", "no-such-group"]).await;
	assert_eq!(audit_count(&pool, "ACCESS_ADD").await, 1);
}

#[tokio::test]
async fn test_delete_frees_name() {
	let (app, pool) = test_app().await;

	create_secret(&app, "reusable", "QQ==", 0, vec!["db-team"]).await;

	let (status, _, _) = send(&app, Method::DELETE, "/automation/v2/secrets/reusable", None).await;
	assert_eq!(status, StatusCode::NO_CONTENT);

	let (status, _, _) = send(&app, Method::GET, "/automation/v2/secrets/reusable", None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);

	let (status, _, _) = send(&app, Method::DELETE, "/automation/v2/secrets/reusable", None).await;
	assert_eq!(status, StatusCode::NOT_FOUND);

	// The name is free for reuse.
	create_secret(&app, "reusable", "QQ==", 0, vec![]).await;
	assert_eq!(audit_count(&pool, "SECRET_DELETE").await, 1);
}

#[tokio::test]
async fn test_secret_listing() {
	let (app, _) = test_app().await;

	create_secret(&app, "beta-key", "QQ==", 0, vec![]).await;
	create_secret(&app, "alpha-key", "QQ==", 0, vec![]).await;

	let (status, names, _) = send(&app, Method::GET, "/automation/v2/secrets", None).await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(names.unwrap(), json!(["alpha-key", "beta-key"]));
}

#[tokio::test]
async fn test_backfill_expiration() {
	let (app, pool) = test_app().await;

	// No decoder for this suffix: expected outcome, not an error.
	create_secret(&app, "db-password", "cGFzczEyMw==", 0, vec![]).await;
	let (status, result, _) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets/db-password/backfill-expiration",
		Some(json!([])),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(result.unwrap(), json!(false));

	// Certificate suffix whose payload isn't parseable: still false.
	create_secret(&app, "cert.pem", "bm90IGEgY2VydA==", 0, vec![]).await;
	let (status, result, _) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets/cert.pem/backfill-expiration",
		Some(json!(["hunter2"])),
	)
	.await;
	assert_eq!(status, StatusCode::OK);
	assert_eq!(result.unwrap(), json!(false));

	// Missing secret is a 404, unlike an unparseable payload.
	let (status, _, _) = send(
		&app,
		Method::POST,
		"/automation/v2/secrets/ghost.pem/backfill-expiration",
		Some(json!([])),
	)
	.await;
	assert_eq!(status, StatusCode::NOT_FOUND);

	assert_eq!(audit_count(&pool, "SECRET_BACKFILLEXPIRY").await, 0);
}

#[tokio::test]
async fn test_healthz_is_public() {
	let (app, _) = test_app().await;
	let response = app
		.clone()
		.oneshot(request(Method::GET, "/healthz", None, None))
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
}
