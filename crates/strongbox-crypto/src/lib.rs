// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Content cryptography for Strongbox.
//!
//! Secret payloads are envelope-encrypted: every secret series gets its own
//! AES-256-GCM subkey derived from the master key via HKDF-SHA256 with the
//! series name as derivation info. A keyed HMAC-SHA256 fingerprint of the
//! content (as received on the wire) is stored alongside the ciphertext for
//! change detection without decryption.

pub mod cryptographer;
pub mod error;
pub mod keys;

pub use cryptographer::{ContentCryptographer, NONCE_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use keys::{DerivedKey, MasterKey, KEY_SIZE};
