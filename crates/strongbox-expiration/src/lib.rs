// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Best-effort expiry extraction from opaque secret payloads.
//!
//! The decoder is chosen by filename suffix, matching operational
//! convention: certificate material in `.crt`/`.pem`/`.key`, OpenPGP keys in
//! `.gpg`/`.pgp`, and password-protected keystores in `.p12`/`.pfx`/`.jks`/
//! `.jceks`. An unknown suffix and a payload that fails to parse are the
//! same outcome (`None`); neither causes a state change in the caller.

pub mod keystore;
pub mod openpgp;
pub mod x509;

use chrono::{DateTime, Utc};
use tracing::debug;

pub use keystore::{expiration_from_keystore, KeystoreKind};
pub use openpgp::expiration_from_openpgp;
pub use x509::expiration_from_certificate_chain;

/// Extract the expiry instant for the decoded payload of a secret.
///
/// `passwords` is tried in order for keystore formats; the empty password is
/// always appended to a local copy (the caller's list is never mutated).
pub fn extract_expiration(
	name: &str,
	content: &[u8],
	passwords: &[String],
) -> Option<DateTime<Utc>> {
	let expiry = if has_suffix(name, &[".crt", ".pem", ".key"]) {
		expiration_from_certificate_chain(content)
	} else if has_suffix(name, &[".gpg", ".pgp"]) {
		expiration_from_openpgp(content)
	} else if has_suffix(name, &[".p12", ".pfx"]) {
		try_passwords(KeystoreKind::Pkcs12, content, passwords)
	} else if has_suffix(name, &[".jceks"]) {
		try_passwords(KeystoreKind::Jceks, content, passwords)
	} else if has_suffix(name, &[".jks"]) {
		try_passwords(KeystoreKind::Jks, content, passwords)
	} else {
		debug!(name, "no expiration decoder for suffix");
		None
	};

	if expiry.is_none() {
		debug!(name, "unable to determine expiry");
	}
	expiry
}

fn has_suffix(name: &str, suffixes: &[&str]) -> bool {
	suffixes.iter().any(|s| name.ends_with(s))
}

fn try_passwords(
	kind: KeystoreKind,
	content: &[u8],
	passwords: &[String],
) -> Option<DateTime<Utc>> {
	let mut trial = passwords.to_vec();
	trial.push(String::new());

	trial
		.iter()
		.find_map(|password| expiration_from_keystore(kind, password, content))
}
