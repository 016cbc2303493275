// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Master key handling.
//!
//! The master key is the root of the content-key hierarchy. It is held only
//! in memory (zeroized on drop); every per-series subkey is derived from it
//! and never persisted.

use aes_gcm::aead::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};

/// Size of encryption keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// The content-encryption master key.
pub struct MasterKey(Zeroizing<[u8; KEY_SIZE]>);

impl MasterKey {
	/// Generate a fresh random master key.
	pub fn generate() -> Self {
		let mut key = Zeroizing::new([0u8; KEY_SIZE]);
		OsRng.fill_bytes(key.as_mut());
		Self(key)
	}

	pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
		Self(Zeroizing::new(bytes))
	}

	/// Parse a hex-encoded 256-bit key, as supplied via `STRONGBOX_MASTER_KEY`.
	pub fn from_hex(encoded: &str) -> CryptoResult<Self> {
		let raw = hex::decode(encoded.trim())
			.map_err(|e| CryptoError::InvalidKey(format!("master key is not valid hex: {e}")))?;
		Self::from_raw(&raw)
	}

	/// Load a raw 32-byte key file.
	pub fn from_file(path: &str) -> CryptoResult<Self> {
		let raw = std::fs::read(path)
			.map_err(|e| CryptoError::InvalidKey(format!("cannot read key file {path}: {e}")))?;
		Self::from_raw(&raw)
	}

	fn from_raw(raw: &[u8]) -> CryptoResult<Self> {
		if raw.len() != KEY_SIZE {
			return Err(CryptoError::InvalidKey(format!(
				"master key must be {KEY_SIZE} bytes, got {}",
				raw.len()
			)));
		}
		let mut key = Zeroizing::new([0u8; KEY_SIZE]);
		key.copy_from_slice(raw);
		Ok(Self(key))
	}

	/// Hex form, for operators provisioning `STRONGBOX_MASTER_KEY`.
	pub fn to_hex(&self) -> String {
		hex::encode(self.0.as_ref())
	}

	pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
		&self.0
	}
}

/// A per-series subkey derived from the master key.
///
/// Bound to the series name at derivation time; never persisted.
pub struct DerivedKey(pub(crate) Zeroizing<[u8; KEY_SIZE]>);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generate_produces_unique_keys() {
		let key1 = MasterKey::generate();
		let key2 = MasterKey::generate();
		assert_ne!(key1.as_bytes(), key2.as_bytes());
	}

	#[test]
	fn from_hex_roundtrip() {
		let key = MasterKey::generate();
		let encoded = hex::encode(key.as_bytes());
		let restored = MasterKey::from_hex(&encoded).unwrap();
		assert_eq!(key.as_bytes(), restored.as_bytes());
	}

	#[test]
	fn from_hex_rejects_short_keys() {
		assert!(MasterKey::from_hex("deadbeef").is_err());
	}

	#[test]
	fn from_hex_rejects_garbage() {
		assert!(MasterKey::from_hex("not hex at all").is_err());
	}

	#[test]
	fn from_hex_tolerates_surrounding_whitespace() {
		let encoded = format!("  {}\n", "11".repeat(KEY_SIZE));
		assert!(MasterKey::from_hex(&encoded).is_ok());
	}
}
