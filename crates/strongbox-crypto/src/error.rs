// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
	#[error("Encryption failed: {0}")]
	Encryption(String),

	#[error("Decryption failed: {0}")]
	Decryption(String),

	#[error("Malformed ciphertext: {0}")]
	MalformedCiphertext(String),

	#[error("Invalid key material: {0}")]
	InvalidKey(String),
}

pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
