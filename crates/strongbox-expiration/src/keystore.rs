// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keystore expiry extraction: PKCS#12 and the Java JKS/JCEKS store format.
//!
//! PKCS#12 archives are opened with the supplied password (MAC-verified)
//! and their certificate bags examined. JKS/JCEKS stores are framed with a
//! trailing SHA-1 integrity digest keyed by the store password; certificate
//! entries themselves are stored in the clear, so once the digest verifies
//! the chain can be walked without further decryption.

use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use x509_parser::parse_x509_certificate;

const JKS_MAGIC: u32 = 0xFEED_FEED;
const JCEKS_MAGIC: u32 = 0xCECE_CECE;

// Fixed salt Java mixes into the store integrity digest.
const INTEGRITY_SALT: &[u8] = b"Mighty Aphrodite";

const DIGEST_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeystoreKind {
	Pkcs12,
	Jks,
	Jceks,
}

/// Earliest certificate `notAfter` in a keystore opened with `password`.
///
/// `None` means the password did not open the store, the payload is not a
/// store of the given kind, or no certificate inside carried a validity.
pub fn expiration_from_keystore(
	kind: KeystoreKind,
	password: &str,
	content: &[u8],
) -> Option<DateTime<Utc>> {
	let certificates = match kind {
		KeystoreKind::Pkcs12 => pkcs12_certificates(password, content)?,
		KeystoreKind::Jks => java_keystore_certificates(JKS_MAGIC, password, content)?,
		KeystoreKind::Jceks => java_keystore_certificates(JCEKS_MAGIC, password, content)?,
	};

	let earliest = certificates
		.iter()
		.filter_map(|der| parse_x509_certificate(der).ok())
		.map(|(_, cert)| cert.validity().not_after.timestamp())
		.min()?;
	DateTime::from_timestamp(earliest, 0)
}

fn pkcs12_certificates(password: &str, content: &[u8]) -> Option<Vec<Vec<u8>>> {
	let pfx = p12::PFX::parse(content).ok()?;
	if !pfx.verify_mac(password) {
		return None;
	}
	pfx.cert_bags(password).ok()
}

/// DER certificates from a JKS/JCEKS store, after verifying the integrity
/// digest with the store password.
fn java_keystore_certificates(
	magic: u32,
	password: &str,
	content: &[u8],
) -> Option<Vec<Vec<u8>>> {
	if content.len() < 12 + DIGEST_LEN {
		return None;
	}

	let (preimage, stored_digest) = content.split_at(content.len() - DIGEST_LEN);
	if integrity_digest(password, preimage).as_slice() != stored_digest {
		return None;
	}

	let mut reader = Reader::new(preimage);
	if reader.u32()? != magic {
		return None;
	}
	let version = reader.u32()?;
	if version != 1 && version != 2 {
		return None;
	}
	let count = reader.u32()?;

	let mut certificates = Vec::new();
	for _ in 0..count {
		match reader.u32()? {
			// Private key entry: alias, date, encrypted key, cert chain.
			1 => {
				reader.utf()?;
				reader.u64()?;
				let key_len = reader.u32()? as usize;
				reader.take(key_len)?;
				let chain_len = reader.u32()?;
				for _ in 0..chain_len {
					certificates.push(read_certificate(&mut reader, version)?);
				}
			}
			// Trusted certificate entry.
			2 => {
				reader.utf()?;
				reader.u64()?;
				certificates.push(read_certificate(&mut reader, version)?);
			}
			// JCEKS sealed secret-key entry: a serialized object with no
			// length framing, so the walk cannot continue past it.
			3 => break,
			_ => return None,
		}
	}

	Some(certificates)
}

fn read_certificate(reader: &mut Reader<'_>, version: u32) -> Option<Vec<u8>> {
	if version == 2 {
		reader.utf()?; // certificate type, "X.509" in practice
	}
	let len = reader.u32()? as usize;
	Some(reader.take(len)?.to_vec())
}

fn integrity_digest(password: &str, preimage: &[u8]) -> [u8; DIGEST_LEN] {
	let mut hasher = Sha1::new();
	let password_utf16: Vec<u8> = password
		.encode_utf16()
		.flat_map(|unit| unit.to_be_bytes())
		.collect();
	hasher.update(&password_utf16);
	hasher.update(INTEGRITY_SALT);
	hasher.update(preimage);
	hasher.finalize().into()
}

struct Reader<'a> {
	buf: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	fn new(buf: &'a [u8]) -> Self {
		Self { buf, pos: 0 }
	}

	fn take(&mut self, len: usize) -> Option<&'a [u8]> {
		let slice = self.buf.get(self.pos..self.pos + len)?;
		self.pos += len;
		Some(slice)
	}

	fn u32(&mut self) -> Option<u32> {
		let b = self.take(4)?;
		Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
	}

	fn u64(&mut self) -> Option<u64> {
		let b = self.take(8)?;
		let mut raw = [0u8; 8];
		raw.copy_from_slice(b);
		Some(u64::from_be_bytes(raw))
	}

	/// Java modified-UTF string: two-byte length prefix, then bytes.
	fn utf(&mut self) -> Option<&'a [u8]> {
		let b = self.take(2)?;
		let len = u16::from_be_bytes([b[0], b[1]]) as usize;
		self.take(len)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const PASSWORD: &str = "changeit";

	fn write_utf(out: &mut Vec<u8>, s: &str) {
		out.extend_from_slice(&(s.len() as u16).to_be_bytes());
		out.extend_from_slice(s.as_bytes());
	}

	/// Build a version-2 store with one trusted-cert entry holding `cert`.
	fn build_store(magic: u32, password: &str, cert: &[u8]) -> Vec<u8> {
		let mut out = Vec::new();
		out.extend_from_slice(&magic.to_be_bytes());
		out.extend_from_slice(&2u32.to_be_bytes());
		out.extend_from_slice(&1u32.to_be_bytes());

		out.extend_from_slice(&2u32.to_be_bytes()); // trusted cert tag
		write_utf(&mut out, "alias");
		out.extend_from_slice(&0u64.to_be_bytes());
		write_utf(&mut out, "X.509");
		out.extend_from_slice(&(cert.len() as u32).to_be_bytes());
		out.extend_from_slice(cert);

		let digest = integrity_digest(password, &out);
		out.extend_from_slice(&digest);
		out
	}

	#[test]
	fn store_opens_with_correct_password() {
		let store = build_store(JKS_MAGIC, PASSWORD, b"bogus-der");
		let certs = java_keystore_certificates(JKS_MAGIC, PASSWORD, &store).unwrap();
		assert_eq!(certs, vec![b"bogus-der".to_vec()]);
	}

	#[test]
	fn wrong_password_fails_integrity_check() {
		let store = build_store(JKS_MAGIC, PASSWORD, b"bogus-der");
		assert!(java_keystore_certificates(JKS_MAGIC, "wrong", &store).is_none());
	}

	#[test]
	fn empty_password_store_opens_with_empty_password() {
		let store = build_store(JKS_MAGIC, "", b"bogus-der");
		assert!(java_keystore_certificates(JKS_MAGIC, "", &store).is_some());
		assert!(java_keystore_certificates(JKS_MAGIC, PASSWORD, &store).is_none());
	}

	#[test]
	fn jceks_magic_is_not_a_jks_store() {
		let store = build_store(JCEKS_MAGIC, PASSWORD, b"bogus-der");
		assert!(java_keystore_certificates(JKS_MAGIC, PASSWORD, &store).is_none());
		assert!(java_keystore_certificates(JCEKS_MAGIC, PASSWORD, &store).is_some());
	}

	#[test]
	fn private_key_entry_chain_is_collected() {
		let mut out = Vec::new();
		out.extend_from_slice(&JKS_MAGIC.to_be_bytes());
		out.extend_from_slice(&2u32.to_be_bytes());
		out.extend_from_slice(&1u32.to_be_bytes());

		out.extend_from_slice(&1u32.to_be_bytes()); // private key tag
		write_utf(&mut out, "key-alias");
		out.extend_from_slice(&0u64.to_be_bytes());
		out.extend_from_slice(&3u32.to_be_bytes());
		out.extend_from_slice(b"key");
		out.extend_from_slice(&2u32.to_be_bytes()); // two certs in the chain
		for cert in [b"one".as_slice(), b"two".as_slice()] {
			write_utf(&mut out, "X.509");
			out.extend_from_slice(&(cert.len() as u32).to_be_bytes());
			out.extend_from_slice(cert);
		}

		let digest = integrity_digest(PASSWORD, &out);
		out.extend_from_slice(&digest);

		let certs = java_keystore_certificates(JKS_MAGIC, PASSWORD, &out).unwrap();
		assert_eq!(certs, vec![b"one".to_vec(), b"two".to_vec()]);
	}

	#[test]
	fn truncated_store_yields_none() {
		let store = build_store(JKS_MAGIC, PASSWORD, b"bogus-der");
		assert!(java_keystore_certificates(JKS_MAGIC, PASSWORD, &store[..10]).is_none());
	}

	#[test]
	fn bogus_certificates_produce_no_expiry() {
		let store = build_store(JKS_MAGIC, PASSWORD, b"bogus-der");
		assert_eq!(
			expiration_from_keystore(KeystoreKind::Jks, PASSWORD, &store),
			None
		);
	}

	#[test]
	fn pkcs12_garbage_yields_none() {
		assert_eq!(
			expiration_from_keystore(KeystoreKind::Pkcs12, "", b"not a pfx"),
			None
		);
	}
}
