// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Envelope encryption and fingerprinting for secret content.
//!
//! Uses AES-256-GCM with per-series subkeys derived from the master key via
//! HKDF-SHA256. Ciphertext is self-describing: base64(nonce || ciphertext).
//! Because the subkey derivation is bound to the series name, a ciphertext
//! copied between series fails AEAD authentication on decrypt.

use aes_gcm::{
	aead::{Aead, KeyInit, OsRng},
	Aes256Gcm, Key, Nonce,
};
use base64::Engine;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{DerivedKey, MasterKey, KEY_SIZE};

/// Size of AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

// HKDF domain separation between the encryption and fingerprint hierarchies.
const CONTENT_KEY_SALT: &[u8] = b"strongbox.content-encryption.v1";
const FINGERPRINT_SALT: &[u8] = b"strongbox.content-fingerprint.v1";
const FINGERPRINT_INFO: &[u8] = b"hmac-key";

type HmacSha256 = Hmac<Sha256>;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Encrypts, decrypts and fingerprints secret content.
pub struct ContentCryptographer {
	master_key: MasterKey,
}

impl ContentCryptographer {
	pub fn new(master_key: MasterKey) -> Self {
		Self { master_key }
	}

	/// Derive the subkey for a secret series.
	///
	/// Deterministic: two calls with the same name yield the same key.
	pub fn derive_key(&self, name: &str) -> DerivedKey {
		let hkdf = Hkdf::<Sha256>::new(Some(CONTENT_KEY_SALT), self.master_key.as_bytes());
		let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
		hkdf.expand(name.as_bytes(), okm.as_mut())
			.expect("32 bytes is a valid HKDF-SHA256 output length");
		DerivedKey(okm)
	}

	/// Encrypt plaintext under a derived key.
	///
	/// Output carries the random 96-bit nonce alongside the ciphertext and
	/// tag, base64-encoded for storage as an opaque string.
	pub fn encrypt(&self, key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<String> {
		let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.0.as_ref()));

		let mut nonce_bytes = [0u8; NONCE_SIZE];
		OsRng.fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let ciphertext = cipher
			.encrypt(nonce, plaintext)
			.map_err(|e| CryptoError::Encryption(format!("content encryption failed: {e}")))?;

		let mut framed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
		framed.extend_from_slice(&nonce_bytes);
		framed.extend_from_slice(&ciphertext);
		Ok(BASE64.encode(framed))
	}

	/// Decrypt a self-describing ciphertext produced by [`Self::encrypt`].
	pub fn decrypt(&self, key: &DerivedKey, encoded: &str) -> CryptoResult<Vec<u8>> {
		let framed = BASE64
			.decode(encoded)
			.map_err(|e| CryptoError::MalformedCiphertext(format!("not valid base64: {e}")))?;

		if framed.len() < NONCE_SIZE {
			return Err(CryptoError::MalformedCiphertext(format!(
				"ciphertext too short to carry a nonce: {} bytes",
				framed.len()
			)));
		}
		let (nonce_bytes, ciphertext) = framed.split_at(NONCE_SIZE);

		let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.0.as_ref()));
		cipher
			.decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
			.map_err(|e| CryptoError::Decryption(format!("content decryption failed: {e}")))
	}

	/// Compute the hex-encoded HMAC-SHA256 fingerprint of secret content.
	///
	/// The MAC is keyed from the master key under a separate HKDF domain and
	/// is computed over the content bytes exactly as received from the API —
	/// that is, over the base64 encoding, not the decoded payload. This
	/// matches the stored fingerprints of existing deployments.
	pub fn compute_hmac(&self, content: &[u8]) -> String {
		let hkdf = Hkdf::<Sha256>::new(Some(FINGERPRINT_SALT), self.master_key.as_bytes());
		let mut mac_key = Zeroizing::new([0u8; KEY_SIZE]);
		hkdf.expand(FINGERPRINT_INFO, mac_key.as_mut())
			.expect("32 bytes is a valid HKDF-SHA256 output length");

		let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key.as_ref())
			.expect("HMAC can take key of any size");
		mac.update(content);
		hex::encode(mac.finalize().into_bytes())
	}
}
