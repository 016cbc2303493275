// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit log configuration.
//!
//! The SQLite sink is the durable record and is required for correctness of
//! state-changing calls; the tracing sink mirrors events into the service
//! log and may be switched off.

use serde::Deserialize;

/// Audit configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct AuditConfig {
	pub sqlite_sink: bool,
	pub tracing_sink: bool,
}

impl Default for AuditConfig {
	fn default() -> Self {
		Self {
			sqlite_sink: true,
			tracing_sink: true,
		}
	}
}

/// Audit configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfigLayer {
	#[serde(default)]
	pub sqlite_sink: Option<bool>,
	#[serde(default)]
	pub tracing_sink: Option<bool>,
}

impl AuditConfigLayer {
	pub fn from_env() -> Self {
		let flag = |name: &str| {
			std::env::var(name)
				.ok()
				.map(|v| v == "1" || v.to_lowercase() == "true")
		};
		Self {
			sqlite_sink: flag("STRONGBOX_AUDIT_SQLITE_SINK"),
			tracing_sink: flag("STRONGBOX_AUDIT_TRACING_SINK"),
		}
	}

	pub fn merge(&mut self, other: AuditConfigLayer) {
		if other.sqlite_sink.is_some() {
			self.sqlite_sink = other.sqlite_sink;
		}
		if other.tracing_sink.is_some() {
			self.tracing_sink = other.tracing_sink;
		}
	}

	pub fn finalize(self) -> AuditConfig {
		AuditConfig {
			sqlite_sink: self.sqlite_sink.unwrap_or(true),
			tracing_sink: self.tracing_sink.unwrap_or(true),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sinks_default_on() {
		let config = AuditConfigLayer::default().finalize();
		assert!(config.sqlite_sink);
		assert!(config.tracing_sink);
	}

	#[test]
	fn test_merge_keeps_latest() {
		let mut base = AuditConfigLayer {
			sqlite_sink: Some(true),
			tracing_sink: Some(true),
		};
		base.merge(AuditConfigLayer {
			sqlite_sink: None,
			tracing_sink: Some(false),
		});
		let config = base.finalize();
		assert!(config.sqlite_sink);
		assert!(!config.tracing_sink);
	}
}
