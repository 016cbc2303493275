// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Mapping the TLS peer identity to a client principal.
//!
//! TLS termination is outside this service: the acceptor (or a trusted
//! reverse proxy) verifies the client certificate chain and supplies the
//! peer's common name, either as a [`Peer`] request extension or — when
//! `auth.trust_proxy_header` is enabled — as a header it is expected to
//! strip from client traffic. The extractor resolves that name to a client
//! row and enforces the enabled/automation flags; `last_seen` is updated
//! out-of-band so the request never waits on it.

use axum::{
	extract::FromRequestParts,
	http::{request::Parts, StatusCode},
	Json,
};

use strongbox_db::Client;

use crate::api::AppState;
use crate::api_response::{forbidden, internal_error, unauthorized, ErrorResponse};

/// Verified peer identity, installed by the TLS acceptor.
#[derive(Debug, Clone)]
pub struct Peer {
	pub common_name: String,
}

/// Extractor for handlers on the automation surface.
///
/// Rejects with 401 when no verified peer maps to a known client, and 403
/// when the client is disabled or not automation-allowed.
pub struct RequireAutomationClient(pub Client);

impl FromRequestParts<AppState> for RequireAutomationClient {
	type Rejection = (StatusCode, Json<ErrorResponse>);

	async fn from_request_parts(
		parts: &mut Parts,
		state: &AppState,
	) -> Result<Self, Self::Rejection> {
		let client = authenticate_client(parts, state).await?;

		if !client.automation_allowed {
			tracing::warn!(client = %client.name, "client is not automation-allowed");
			return Err(forbidden(
				"automation_not_allowed",
				"Client may not use the automation interface",
			));
		}

		Ok(Self(client))
	}
}

async fn authenticate_client(
	parts: &Parts,
	state: &AppState,
) -> Result<Client, (StatusCode, Json<ErrorResponse>)> {
	let Some(peer_name) = peer_common_name(parts, state) else {
		return Err(unauthorized(
			"unauthenticated",
			"No verified client certificate presented",
		));
	};

	let client = match state.clients.get_client_by_name(&peer_name).await {
		Ok(Some(client)) => client,
		Ok(None) => {
			tracing::warn!(peer = %peer_name, "unknown client certificate");
			return Err(unauthorized("unknown_client", "Unknown client"));
		}
		Err(e) => {
			tracing::error!(error = %e, peer = %peer_name, "Failed to look up client");
			return Err(internal_error("Internal server error"));
		}
	};

	if !client.enabled {
		tracing::warn!(client = %client.name, "disabled client rejected");
		return Err(forbidden("client_disabled", "Client is disabled"));
	}

	// Out-of-band: the request does not wait on the bookkeeping write.
	let clients = state.clients.clone();
	let name = client.name.clone();
	tokio::spawn(async move {
		if let Err(e) = clients.touch_last_seen(&name).await {
			tracing::debug!(error = %e, client = %name, "failed to update last_seen");
		}
	});

	Ok(client)
}

fn peer_common_name(parts: &Parts, state: &AppState) -> Option<String> {
	if let Some(peer) = parts.extensions.get::<Peer>() {
		return Some(peer.common_name.clone());
	}

	if state.auth.trust_proxy_header {
		return parts
			.headers
			.get(&state.auth.client_cn_header)
			.and_then(|value| value.to_str().ok())
			.map(|value| value.to_string());
	}

	None
}
