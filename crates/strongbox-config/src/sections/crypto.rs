// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Content-encryption key material configuration.
//!
//! The master key never appears in the TOML file; it is supplied either as
//! hex in `STRONGBOX_MASTER_KEY` or as a raw 32-byte file referenced by
//! `master_key_file`.

use serde::Deserialize;

/// Crypto configuration (runtime, fully resolved).
#[derive(Clone)]
pub struct CryptoConfig {
	/// Hex-encoded 256-bit master key, if supplied via environment.
	pub master_key_hex: Option<String>,
	/// Path to a raw 32-byte key file, consulted when the env key is absent.
	pub master_key_file: Option<String>,
}

// Manual Debug: the key material must never end up in logs.
impl std::fmt::Debug for CryptoConfig {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CryptoConfig")
			.field("master_key_hex", &self.master_key_hex.as_ref().map(|_| "<redacted>"))
			.field("master_key_file", &self.master_key_file)
			.finish()
	}
}

/// Crypto configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CryptoConfigLayer {
	#[serde(default)]
	pub master_key_file: Option<String>,
}

impl CryptoConfigLayer {
	pub fn from_env() -> Self {
		Self {
			master_key_file: std::env::var("STRONGBOX_MASTER_KEY_FILE").ok(),
		}
	}

	pub fn merge(&mut self, other: CryptoConfigLayer) {
		if other.master_key_file.is_some() {
			self.master_key_file = other.master_key_file;
		}
	}

	pub fn finalize(self) -> CryptoConfig {
		CryptoConfig {
			master_key_hex: std::env::var("STRONGBOX_MASTER_KEY").ok(),
			master_key_file: self.master_key_file,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_debug_redacts_key() {
		let config = CryptoConfig {
			master_key_hex: Some("deadbeef".to_string()),
			master_key_file: None,
		};
		let rendered = format!("{config:?}");
		assert!(!rendered.contains("deadbeef"));
		assert!(rendered.contains("<redacted>"));
	}
}
