// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Strongbox server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`STRONGBOX_*`)
//!
//! # Usage
//!
//! ```ignore
//! use strongbox_config::load_config;
//!
//! let config = load_config(None)?;
//! println!("Server listening on {}:{}", config.http.host, config.http.port);
//! ```

pub mod error;
pub mod sections;

pub use error::ConfigError;
pub use sections::*;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default location of the server config file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/strongbox/server.toml";

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub auth: AuthConfig,
	pub crypto: CryptoConfig,
	pub logging: LoggingConfig,
	pub audit: AuditConfig,
}

impl ServerConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Partial configuration as read from one source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub auth: Option<AuthConfigLayer>,
	#[serde(default)]
	pub crypto: Option<CryptoConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub audit: Option<AuditConfigLayer>,
}

impl ServerConfigLayer {
	pub fn from_env() -> Self {
		Self {
			http: Some(HttpConfigLayer::from_env()),
			database: Some(DatabaseConfigLayer::from_env()),
			auth: Some(AuthConfigLayer::from_env()),
			crypto: Some(CryptoConfigLayer::from_env()),
			logging: Some(LoggingConfigLayer::from_env()),
			audit: Some(AuditConfigLayer::from_env()),
		}
	}

	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.auth, other.auth, AuthConfigLayer::merge);
		merge_section(&mut self.crypto, other.crypto, CryptoConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_section(&mut self.audit, other.audit, AuditConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		_ => {}
	}
}

/// Load configuration with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`STRONGBOX_*`)
/// 2. Config file (`config_path`, or `/etc/strongbox/server.toml`)
/// 3. Built-in defaults
///
/// A missing config file is not an error unless an explicit path was given.
pub fn load_config(config_path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();

	let (path, required): (PathBuf, bool) = match config_path {
		Some(p) => (p.to_path_buf(), true),
		None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
	};

	match std::fs::read_to_string(&path) {
		Ok(raw) => {
			debug!(path = %path.display(), "loading configuration file");
			merged.merge(toml::from_str(&raw)?);
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
			debug!(path = %path.display(), "no configuration file, using defaults");
		}
		Err(e) => return Err(ConfigError::Io(e)),
	}

	merged.merge(ServerConfigLayer::from_env());

	finalize(merged)
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(ServerConfigLayer::from_env());
	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let auth = layer.auth.unwrap_or_default().finalize();
	let crypto = layer.crypto.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let audit = layer.audit.unwrap_or_default().finalize();

	validate_config(&crypto, &audit)?;

	info!(
		host = %http.host,
		port = http.port,
		database = %database.url,
		trust_proxy_header = auth.trust_proxy_header,
		audit_sqlite = audit.sqlite_sink,
		audit_tracing = audit.tracing_sink,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		auth,
		crypto,
		logging,
		audit,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(crypto: &CryptoConfig, audit: &AuditConfig) -> Result<(), ConfigError> {
	if crypto.master_key_hex.is_none() && crypto.master_key_file.is_none() {
		return Err(ConfigError::Validation(
			"no content-encryption master key configured. Set STRONGBOX_MASTER_KEY \
			 (hex) or point crypto.master_key_file at a 32-byte key file."
				.to_string(),
		));
	}

	if !audit.sqlite_sink && !audit.tracing_sink {
		return Err(ConfigError::Validation(
			"at least one audit sink must be enabled; state-changing requests fail \
			 without a working audit trail."
				.to_string(),
		));
	}

	Ok(())
}
