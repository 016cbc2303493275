// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client authentication configuration.
//!
//! Strongbox itself never terminates TLS; the acceptor (or a trusted
//! reverse proxy) verifies the client certificate and hands the peer's
//! common name to the service. This section controls how that principal
//! reaches the request pipeline.

use serde::Deserialize;

/// Header carrying the verified peer common name when `trust_proxy_header`
/// is enabled.
pub const DEFAULT_CLIENT_CN_HEADER: &str = "x-client-cert-cn";

/// Authentication configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct AuthConfig {
	/// Accept the peer principal from `client_cn_header`. Only safe when a
	/// trusted TLS-terminating proxy strips the header from client traffic.
	pub trust_proxy_header: bool,
	pub client_cn_header: String,
}

impl Default for AuthConfig {
	fn default() -> Self {
		Self {
			trust_proxy_header: false,
			client_cn_header: DEFAULT_CLIENT_CN_HEADER.to_string(),
		}
	}
}

/// Authentication configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfigLayer {
	#[serde(default)]
	pub trust_proxy_header: Option<bool>,
	#[serde(default)]
	pub client_cn_header: Option<String>,
}

impl AuthConfigLayer {
	pub fn from_env() -> Self {
		Self {
			trust_proxy_header: std::env::var("STRONGBOX_TRUST_PROXY_HEADER")
				.ok()
				.map(|v| v == "1" || v.to_lowercase() == "true"),
			client_cn_header: std::env::var("STRONGBOX_CLIENT_CN_HEADER").ok(),
		}
	}

	pub fn merge(&mut self, other: AuthConfigLayer) {
		if other.trust_proxy_header.is_some() {
			self.trust_proxy_header = other.trust_proxy_header;
		}
		if other.client_cn_header.is_some() {
			self.client_cn_header = other.client_cn_header;
		}
	}

	pub fn finalize(self) -> AuthConfig {
		AuthConfig {
			trust_proxy_header: self.trust_proxy_header.unwrap_or(false),
			client_cn_header: self
				.client_cn_header
				.map(|h| h.to_lowercase())
				.unwrap_or_else(|| DEFAULT_CLIENT_CN_HEADER.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = AuthConfigLayer::default().finalize();
		assert!(!config.trust_proxy_header);
		assert_eq!(config.client_cn_header, DEFAULT_CLIENT_CN_HEADER);
	}

	#[test]
	fn test_header_name_lowercased() {
		let layer = AuthConfigLayer {
			trust_proxy_header: Some(true),
			client_cn_header: Some("X-Forwarded-Client-CN".to_string()),
		};
		let config = layer.finalize();
		assert!(config.trust_proxy_header);
		assert_eq!(config.client_cn_header, "x-forwarded-client-cn");
	}
}
