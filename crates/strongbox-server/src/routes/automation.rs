// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Automation endpoints to manage secrets.
//!
//! Mounted under `/automation/v2/secrets`; every handler requires an
//! authenticated automation client. Audit events are recorded after the
//! state change commits, and a failed audit append fails the request.

use axum::{
	extract::{Path, State},
	http::{header, StatusCode},
	response::IntoResponse,
	Json,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use strongbox_audit::{AuditEvent, EventTag};
use strongbox_db::{DbError, SanitizedSecret, SecretSeries};
use strongbox_expiration::extract_expiration;

use crate::api::AppState;
use crate::api_response::{
	bad_request, conflict, internal_error, not_found, ErrorResponse,
};
use crate::auth::RequireAutomationClient;
use crate::controller::{ControllerError, CreateSecret};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretRequest {
	pub name: String,
	/// Base64 form of the raw secret bytes.
	pub content: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub metadata: BTreeMap<String, String>,
	#[serde(default, rename = "type")]
	pub kind: String,
	/// Unix seconds; 0 means no known expiry.
	#[serde(default)]
	pub expiry: i64,
	#[serde(default)]
	pub groups: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrUpdateSecretRequest {
	pub content: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub metadata: BTreeMap<String, String>,
	#[serde(default, rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub expiry: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSecretVersionRequest {
	pub name: String,
	pub version: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyGroupsRequest {
	#[serde(default)]
	pub add_groups: Vec<String>,
	#[serde(default)]
	pub remove_groups: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SecretDetailResponse {
	pub series: SecretSeries,
	pub expiry: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub version: Option<i64>,
}

fn location_of(name: &str) -> [(header::HeaderName, String); 1] {
	[(header::LOCATION, format!("/automation/v2/secrets/{name}"))]
}

fn secret_write_extra(description: &str, metadata: &BTreeMap<String, String>, expiry: i64) -> BTreeMap<String, String> {
	let mut extra = BTreeMap::new();
	if !description.is_empty() {
		extra.insert("description".to_string(), description.to_string());
	}
	if !metadata.is_empty() {
		if let Ok(rendered) = serde_json::to_string(metadata) {
			extra.insert("metadata".to_string(), rendered);
		}
	}
	extra.insert("expiry".to_string(), expiry.to_string());
	extra
}

async fn record_event(
	state: &AppState,
	event: AuditEvent,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
	state.audit.record_event(&event).await.map_err(|e| {
		tracing::error!(error = %e, "Failed to record audit event");
		internal_error("Audit append failed")
	})
}

/// Grant the named groups access to a secret, skipping names that don't
/// resolve. A typo in one group must not fail the whole batch.
async fn allow_groups(
	state: &AppState,
	actor: &str,
	secret_id: i64,
	groups: impl IntoIterator<Item = String>,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
	for group_name in groups {
		let group = match state.groups.get_group(&group_name).await {
			Ok(Some(group)) => group,
			Ok(None) => {
				tracing::info!(group = %group_name, "skipping unknown group");
				continue;
			}
			Err(e) => {
				tracing::error!(error = %e, group = %group_name, "Failed to look up group");
				return Err(internal_error("Internal server error"));
			}
		};

		state
			.acl
			.find_and_allow_access(secret_id, group.id, &state.audit, actor, BTreeMap::new())
			.await
			.map_err(|e| match e {
				DbError::Audit(e) => {
					tracing::error!(error = %e, "Failed to record audit event");
					internal_error("Audit append failed")
				}
				e => {
					tracing::error!(error = %e, group = %group_name, "Failed to grant access");
					internal_error("Internal server error")
				}
			})?;
	}
	Ok(())
}

/// Creates a secret and assigns it to the given groups.
#[tracing::instrument(skip(state, request), fields(client = %client.name, name = %request.name))]
pub async fn create_secret(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Json(request): Json<CreateSecretRequest>,
) -> impl IntoResponse {
	let name = request.name.clone();

	let created = state
		.controller
		.create_secret(CreateSecret {
			name: request.name,
			content: request.content,
			creator: client.name.clone(),
			description: request.description.clone(),
			metadata: request.metadata.clone(),
			expiry: request.expiry,
			kind: request.kind,
			generation_options: BTreeMap::new(),
		})
		.await;

	let secret = match created {
		Ok(pair) => pair,
		Err(ControllerError::Validation(message)) => {
			return bad_request("validation", message).into_response();
		}
		Err(ControllerError::Db(DbError::Conflict(_))) => {
			tracing::info!(name = %name, "Cannot create secret, name exists");
			return conflict("already_exists", format!("Cannot create secret {name}."))
				.into_response();
		}
		Err(e) => {
			tracing::error!(error = %e, name = %name, "Failed to create secret");
			return internal_error("Internal server error").into_response();
		}
	};

	let extra = secret_write_extra(&request.description, &request.metadata, request.expiry);
	let event = AuditEvent::with_extra(EventTag::SecretCreate, &client.name, &name, extra);
	if let Err(resp) = record_event(&state, event).await {
		return resp.into_response();
	}

	if let Err(resp) = allow_groups(&state, &client.name, secret.series.id, request.groups).await {
		return resp.into_response();
	}

	(StatusCode::CREATED, location_of(&name)).into_response()
}

/// Creates or updates (if it exists) a secret.
#[tracing::instrument(skip(state, request), fields(client = %client.name, %name))]
pub async fn create_or_update_secret(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path(name): Path<String>,
	Json(request): Json<CreateOrUpdateSecretRequest>,
) -> impl IntoResponse {
	let result = state
		.controller
		.create_or_update_secret(CreateSecret {
			name: name.clone(),
			content: request.content,
			creator: client.name.clone(),
			description: request.description.clone(),
			metadata: request.metadata.clone(),
			expiry: request.expiry,
			kind: request.kind,
			generation_options: BTreeMap::new(),
		})
		.await;

	match result {
		Ok(_) => {}
		Err(ControllerError::Validation(message)) => {
			return bad_request("validation", message).into_response();
		}
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to create or update secret");
			return internal_error("Internal server error").into_response();
		}
	}

	let extra = secret_write_extra(&request.description, &request.metadata, request.expiry);
	let event = AuditEvent::with_extra(EventTag::SecretCreateorupdate, &client.name, &name, extra);
	if let Err(resp) = record_event(&state, event).await {
		return resp.into_response();
	}

	(StatusCode::CREATED, location_of(&name)).into_response()
}

/// Retrieve the names of all secrets.
#[tracing::instrument(skip(state), fields(client = %client.name))]
pub async fn secret_listing(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
) -> impl IntoResponse {
	match state.secrets.list_secret_names().await {
		Ok(names) => {
			let names: Vec<String> = names.into_iter().map(|(_, name)| name).collect();
			Json(names).into_response()
		}
		Err(e) => {
			tracing::error!(error = %e, "Failed to list secrets");
			internal_error("Internal server error").into_response()
		}
	}
}

/// Retrieve information on a secret series.
#[tracing::instrument(skip(state), fields(client = %client.name, %name))]
pub async fn secret_info(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> impl IntoResponse {
	match state.secrets.get_secret_by_name(&name).await {
		Ok(Some(pair)) => Json(SecretDetailResponse {
			expiry: pair.content.expiry,
			version: pair.series.current_version_id,
			series: pair.series,
		})
		.into_response(),
		Ok(None) => not_found(format!("No such secret: {name}")).into_response(),
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to get secret");
			internal_error("Internal server error").into_response()
		}
	}
}

/// Delete a secret series, all its versions, and its access grants.
#[tracing::instrument(skip(state), fields(client = %client.name, %name))]
pub async fn delete_secret_series(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> impl IntoResponse {
	match state.secrets.get_secret_by_name(&name).await {
		Ok(Some(_)) => {}
		Ok(None) => return not_found(format!("No such secret: {name}")).into_response(),
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to get secret for delete");
			return internal_error("Internal server error").into_response();
		}
	}

	if let Err(e) = state.secrets.delete_secrets_by_name(&name).await {
		tracing::error!(error = %e, %name, "Failed to delete secret");
		return internal_error("Internal server error").into_response();
	}

	let event = AuditEvent::new(EventTag::SecretDelete, &client.name, &name);
	if let Err(resp) = record_event(&state, event).await {
		return resp.into_response();
	}

	StatusCode::NO_CONTENT.into_response()
}

/// Retrieve a range of versions of this secret, newest first.
///
/// The range is `{versionIdx}-{numVersions}` in one path segment.
#[tracing::instrument(skip(state), fields(client = %client.name, %name, %range))]
pub async fn secret_versions(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path((name, range)): Path<(String, String)>,
) -> impl IntoResponse {
	let Some((version_idx, num_versions)) = parse_version_range(&range) else {
		return bad_request("validation", format!("Invalid version range: {range}")).into_response();
	};

	let series = match state.secrets.get_secret_by_name(&name).await {
		Ok(Some(pair)) => pair.series,
		Ok(None) => return not_found(format!("No such secret: {name}")).into_response(),
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to get secret");
			return internal_error("Internal server error").into_response();
		}
	};

	match state
		.secrets
		.get_versions_by_name(&name, version_idx, num_versions)
		.await
	{
		Ok(Some(versions)) => {
			let details: Vec<SecretDetailResponse> = versions
				.into_iter()
				.map(|content| SecretDetailResponse {
					series: series.clone(),
					expiry: content.expiry,
					version: Some(content.id),
				})
				.collect();
			Json(details).into_response()
		}
		Ok(None) => not_found(format!("No such secret: {name}")).into_response(),
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to list versions");
			internal_error("Internal server error").into_response()
		}
	}
}

fn parse_version_range(range: &str) -> Option<(i64, i64)> {
	let (idx, count) = range.split_once('-')?;
	let idx: i64 = idx.parse().ok()?;
	let count: i64 = count.parse().ok()?;
	(idx >= 0 && count >= 0).then_some((idx, count))
}

/// Reset the current version of the given secret.
#[tracing::instrument(skip(state, request), fields(client = %client.name))]
pub async fn set_secret_version(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Json(request): Json<SetSecretVersionRequest>,
) -> impl IntoResponse {
	match state
		.secrets
		.set_current_version_by_name(&request.name, request.version)
		.await
	{
		Ok(()) => {}
		Err(DbError::NotFound(message)) => return not_found(message).into_response(),
		Err(DbError::BadVersion { secret, version }) => {
			return bad_request(
				"bad_version",
				format!("Version {version} does not belong to secret '{secret}'"),
			)
			.into_response();
		}
		Err(e) => {
			tracing::error!(error = %e, name = %request.name, "Failed to set version");
			return internal_error("Internal server error").into_response();
		}
	}

	let mut extra = BTreeMap::new();
	extra.insert("new version".to_string(), request.version.to_string());
	let event =
		AuditEvent::with_extra(EventTag::SecretChangeversion, &client.name, &request.name, extra);
	if let Err(resp) = record_event(&state, event).await {
		return resp.into_response();
	}

	StatusCode::CREATED.into_response()
}

/// Retrieve the names of secrets expiring by the given time.
#[tracing::instrument(skip(state), fields(client = %client.name, time))]
pub async fn secret_listing_expiring(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path(time): Path<i64>,
) -> impl IntoResponse {
	match state.secrets.list_secrets(Some(time), None).await {
		Ok(secrets) => {
			let names: Vec<String> = secrets.into_iter().map(|pair| pair.series.name).collect();
			Json(names).into_response()
		}
		Err(e) => {
			tracing::error!(error = %e, "Failed to list expiring secrets");
			internal_error("Internal server error").into_response()
		}
	}
}

/// Retrieve sanitized secrets expiring by the given time.
#[tracing::instrument(skip(state), fields(client = %client.name, time))]
pub async fn secret_listing_expiring_v2(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path(time): Path<i64>,
) -> impl IntoResponse {
	match state.secrets.list_secrets(Some(time), None).await {
		Ok(secrets) => {
			let sanitized: Vec<SanitizedSecret> = secrets
				.iter()
				.map(SanitizedSecret::from_series_and_content)
				.collect();
			Json(sanitized).into_response()
		}
		Err(e) => {
			tracing::error!(error = %e, "Failed to list expiring secrets");
			internal_error("Internal server error").into_response()
		}
	}
}

/// Retrieve the names of secrets expiring by the given time in one group.
#[tracing::instrument(skip(state), fields(client = %client.name, time, group = %group_name))]
pub async fn secret_listing_expiring_for_group(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path((time, group_name)): Path<(i64, String)>,
) -> impl IntoResponse {
	let group = match state.groups.get_group(&group_name).await {
		Ok(Some(group)) => group,
		Ok(None) => return not_found(format!("No such group: {group_name}")).into_response(),
		Err(e) => {
			tracing::error!(error = %e, group = %group_name, "Failed to look up group");
			return internal_error("Internal server error").into_response();
		}
	};

	match state.secrets.list_secrets(Some(time), Some(&group)).await {
		Ok(secrets) => {
			let names: Vec<String> = secrets.into_iter().map(|pair| pair.series.name).collect();
			Json(names).into_response()
		}
		Err(e) => {
			tracing::error!(error = %e, "Failed to list expiring secrets for group");
			internal_error("Internal server error").into_response()
		}
	}
}

/// Backfill expiration for this secret from its payload.
///
/// Returns `true` when an expiry was found and recorded. Inability to parse
/// the payload (or exhausting the password list) is an expected outcome,
/// not an error: the response is `false` with 200.
#[tracing::instrument(skip(state, passwords), fields(client = %client.name, %name))]
pub async fn backfill_expiration(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path(name): Path<String>,
	Json(passwords): Json<Vec<String>>,
) -> impl IntoResponse {
	let pair = match state.secrets.get_secret_by_name(&name).await {
		Ok(Some(pair)) => pair,
		Ok(None) => return not_found(format!("No such secret: {name}")).into_response(),
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to get secret");
			return internal_error("Internal server error").into_response();
		}
	};

	let content = match state.controller.decrypted_content(&pair) {
		Ok(content) => content,
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to decrypt secret for backfill");
			return internal_error("Internal server error").into_response();
		}
	};

	let Some(expiry) = extract_expiration(&name, &content, &passwords) else {
		tracing::info!(%name, "unable to determine expiry");
		return Json(false).into_response();
	};

	tracing::info!(%name, expiry = expiry.timestamp(), "found expiry for secret");
	let success = match state.secrets.set_expiration(&name, expiry.timestamp()).await {
		Ok(success) => success,
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to set expiration");
			return internal_error("Internal server error").into_response();
		}
	};

	if success {
		let mut extra = BTreeMap::new();
		extra.insert(
			"backfilled expiry".to_string(),
			expiry.timestamp().to_string(),
		);
		let event =
			AuditEvent::with_extra(EventTag::SecretBackfillexpiry, &client.name, &name, extra);
		if let Err(resp) = record_event(&state, event).await {
			return resp.into_response();
		}
	}

	Json(success).into_response()
}

/// Listing of groups a secret is assigned to.
#[tracing::instrument(skip(state), fields(client = %client.name, %name))]
pub async fn secret_groups_listing(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path(name): Path<String>,
) -> impl IntoResponse {
	let pair = match state.secrets.get_secret_by_name(&name).await {
		Ok(Some(pair)) => pair,
		Ok(None) => return not_found(format!("No such secret: {name}")).into_response(),
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to get secret");
			return internal_error("Internal server error").into_response();
		}
	};

	match state.acl.get_groups_for_secret(pair.series.id).await {
		Ok(groups) => {
			let names: Vec<String> = groups.into_iter().map(|group| group.name).collect();
			Json(names).into_response()
		}
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to list groups");
			internal_error("Internal server error").into_response()
		}
	}
}

/// Modify the groups a secret is assigned to.
///
/// `toAdd = addGroups \ existing`, `toRemove = removeGroups ∩ existing`;
/// names that don't resolve to a group are skipped. Returns the resulting
/// group-name set.
#[tracing::instrument(skip(state, request), fields(client = %client.name, %name))]
pub async fn modify_secret_groups(
	RequireAutomationClient(client): RequireAutomationClient,
	State(state): State<AppState>,
	Path(name): Path<String>,
	Json(request): Json<ModifyGroupsRequest>,
) -> impl IntoResponse {
	let pair = match state.secrets.get_secret_by_name(&name).await {
		Ok(Some(pair)) => pair,
		Ok(None) => return not_found(format!("No such secret: {name}")).into_response(),
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to get secret");
			return internal_error("Internal server error").into_response();
		}
	};
	let secret_id = pair.series.id;

	let existing: BTreeSet<String> = match state.acl.get_groups_for_secret(secret_id).await {
		Ok(groups) => groups.into_iter().map(|group| group.name).collect(),
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to list groups");
			return internal_error("Internal server error").into_response();
		}
	};

	let to_add: Vec<String> = request
		.add_groups
		.into_iter()
		.filter(|group| !existing.contains(group))
		.collect();
	let to_remove: Vec<String> = request
		.remove_groups
		.into_iter()
		.filter(|group| existing.contains(group))
		.collect();

	if let Err(resp) = allow_groups(&state, &client.name, secret_id, to_add).await {
		return resp.into_response();
	}

	for group_name in to_remove {
		let group = match state.groups.get_group(&group_name).await {
			Ok(Some(group)) => group,
			Ok(None) => {
				tracing::info!(group = %group_name, "skipping unknown group");
				continue;
			}
			Err(e) => {
				tracing::error!(error = %e, group = %group_name, "Failed to look up group");
				return internal_error("Internal server error").into_response();
			}
		};

		let revoked = state
			.acl
			.find_and_revoke_access(secret_id, group.id, &state.audit, &client.name, BTreeMap::new())
			.await;
		if let Err(e) = revoked {
			tracing::error!(error = %e, group = %group_name, "Failed to revoke access");
			return internal_error("Internal server error").into_response();
		}
	}

	match state.acl.get_groups_for_secret(secret_id).await {
		Ok(groups) => {
			let names: Vec<String> = groups.into_iter().map(|group| group.name).collect();
			Json(names).into_response()
		}
		Err(e) => {
			tracing::error!(error = %e, %name, "Failed to list groups");
			internal_error("Internal server error").into_response()
		}
	}
}
