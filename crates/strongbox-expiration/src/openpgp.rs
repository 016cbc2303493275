// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OpenPGP key expiry extraction.
//!
//! Walks the RFC 4880 packet stream of an exported (binary) key: key packets
//! carry their creation time, and the self-signatures that follow may carry a
//! key-expiration-time subpacket expressed as seconds after creation. The
//! earliest expiring key (primary or subkey) wins; keys without an expiration
//! subpacket never expire and contribute nothing.

use chrono::{DateTime, Utc};

// Packet tags (RFC 4880 §4.3).
const TAG_SIGNATURE: u8 = 2;
const TAG_SECRET_KEY: u8 = 5;
const TAG_PUBLIC_KEY: u8 = 6;
const TAG_SECRET_SUBKEY: u8 = 7;
const TAG_PUBLIC_SUBKEY: u8 = 14;

// Signature subpacket type (RFC 4880 §5.2.3.1).
const SUBPACKET_KEY_EXPIRATION: u8 = 9;

pub fn expiration_from_openpgp(content: &[u8]) -> Option<DateTime<Utc>> {
	let mut rest = content;
	let mut current_key_created: Option<i64> = None;
	let mut earliest: Option<i64> = None;
	let mut fold = |ts: i64| {
		earliest = Some(match earliest {
			Some(prev) => prev.min(ts),
			None => ts,
		});
	};

	while !rest.is_empty() {
		let (tag, body, consumed) = read_packet(rest)?;
		rest = &rest[consumed..];

		match tag {
			TAG_PUBLIC_KEY | TAG_PUBLIC_SUBKEY | TAG_SECRET_KEY | TAG_SECRET_SUBKEY => {
				match key_packet_times(body) {
					Some((created, Some(valid_days))) => {
						// v3 keys carry their validity period inline.
						fold(created + i64::from(valid_days) * 86_400);
						current_key_created = Some(created);
					}
					Some((created, None)) => current_key_created = Some(created),
					None => return None,
				}
			}
			TAG_SIGNATURE => {
				if let (Some(created), Some(secs)) =
					(current_key_created, signature_key_expiration(body))
				{
					fold(created + i64::from(secs));
				}
			}
			_ => {}
		}
	}

	earliest.and_then(|ts| DateTime::from_timestamp(ts, 0))
}

/// Decode one packet header, returning (tag, body, total consumed bytes).
fn read_packet(buf: &[u8]) -> Option<(u8, &[u8], usize)> {
	let first = *buf.first()?;
	if first & 0x80 == 0 {
		return None;
	}

	let (tag, body_len, header_len) = if first & 0x40 != 0 {
		// New format lengths (RFC 4880 §4.2.2). Partial body lengths only
		// appear in streamed literal data, never in exported keys.
		let tag = first & 0x3F;
		let l0 = *buf.get(1)?;
		match l0 {
			0..=191 => (tag, l0 as usize, 2),
			192..=223 => {
				let l1 = *buf.get(2)?;
				(tag, ((l0 as usize - 192) << 8) + l1 as usize + 192, 3)
			}
			255 => (tag, be32(buf.get(2..6)?) as usize, 6),
			_ => return None,
		}
	} else {
		let tag = (first >> 2) & 0x0F;
		match first & 0x03 {
			0 => (tag, *buf.get(1)? as usize, 2),
			1 => (tag, be16(buf.get(1..3)?) as usize, 3),
			2 => (tag, be32(buf.get(1..5)?) as usize, 5),
			// Indeterminate length: the packet runs to the end of the input.
			_ => (tag, buf.len() - 1, 1),
		}
	};

	let body = buf.get(header_len..header_len + body_len)?;
	Some((tag, body, header_len + body_len))
}

/// Creation time and (for v3 keys) validity days from a key packet body.
fn key_packet_times(body: &[u8]) -> Option<(i64, Option<u16>)> {
	let version = *body.first()?;
	let created = i64::from(be32(body.get(1..5)?));
	match version {
		2 | 3 => {
			let days = be16(body.get(5..7)?);
			Some((created, (days > 0).then_some(days)))
		}
		4 | 5 => Some((created, None)),
		_ => None,
	}
}

/// Key-expiration seconds from a v4 signature packet's hashed subpackets.
fn signature_key_expiration(body: &[u8]) -> Option<u32> {
	if *body.first()? != 4 {
		return None;
	}
	// [version][sigtype][pk algo][hash algo][hashed len][hashed area]
	let hashed_len = be16(body.get(4..6)?) as usize;
	let mut area = body.get(6..6 + hashed_len)?;

	while !area.is_empty() {
		let l0 = *area.first()?;
		let (sub_len, consumed) = match l0 {
			0..=191 => (l0 as usize, 1),
			192..=254 => {
				let l1 = *area.get(1)?;
				(((l0 as usize - 192) << 8) + l1 as usize + 192, 2)
			}
			255 => (be32(area.get(1..5)?) as usize, 5),
		};
		let sub = area.get(consumed..consumed + sub_len)?;
		area = &area[consumed + sub_len..];

		if sub.first().map(|t| t & 0x7F) == Some(SUBPACKET_KEY_EXPIRATION) {
			return Some(be32(sub.get(1..5)?));
		}
	}
	None
}

fn be16(buf: &[u8]) -> u16 {
	u16::from_be_bytes([buf[0], buf[1]])
}

fn be32(buf: &[u8]) -> u32 {
	u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

#[cfg(test)]
mod tests {
	use super::*;

	const CREATED: u32 = 1_500_000_000;
	const EXPIRE_SECS: u32 = 86_400;

	fn v4_public_key_packet(created: u32) -> Vec<u8> {
		// New-format header, tag 6; body: version 4, creation time, RSA algo id.
		let body = {
			let mut b = vec![4u8];
			b.extend_from_slice(&created.to_be_bytes());
			b.push(1);
			b
		};
		let mut packet = vec![0xC0 | TAG_PUBLIC_KEY, body.len() as u8];
		packet.extend_from_slice(&body);
		packet
	}

	fn v4_signature_packet(expire_secs: Option<u32>) -> Vec<u8> {
		let mut hashed = Vec::new();
		if let Some(secs) = expire_secs {
			hashed.push(5); // subpacket length: type byte + 4 data bytes
			hashed.push(SUBPACKET_KEY_EXPIRATION);
			hashed.extend_from_slice(&secs.to_be_bytes());
		}

		let mut body = vec![4u8, 0x13, 1, 8];
		body.extend_from_slice(&(hashed.len() as u16).to_be_bytes());
		body.extend_from_slice(&hashed);
		body.extend_from_slice(&0u16.to_be_bytes()); // empty unhashed area

		let mut packet = vec![0xC0 | TAG_SIGNATURE, body.len() as u8];
		packet.extend_from_slice(&body);
		packet
	}

	#[test]
	fn key_with_expiration_subpacket() {
		let mut stream = v4_public_key_packet(CREATED);
		stream.extend(v4_signature_packet(Some(EXPIRE_SECS)));

		let expiry = expiration_from_openpgp(&stream).unwrap();
		assert_eq!(expiry.timestamp(), i64::from(CREATED + EXPIRE_SECS));
	}

	#[test]
	fn key_without_expiration_yields_none() {
		let mut stream = v4_public_key_packet(CREATED);
		stream.extend(v4_signature_packet(None));

		assert_eq!(expiration_from_openpgp(&stream), None);
	}

	#[test]
	fn earliest_expiring_key_wins() {
		let mut stream = v4_public_key_packet(CREATED);
		stream.extend(v4_signature_packet(Some(EXPIRE_SECS * 10)));
		// Subkey expiring sooner than the primary.
		let mut subkey = v4_public_key_packet(CREATED);
		subkey[0] = 0xC0 | TAG_PUBLIC_SUBKEY;
		stream.extend(subkey);
		stream.extend(v4_signature_packet(Some(EXPIRE_SECS)));

		let expiry = expiration_from_openpgp(&stream).unwrap();
		assert_eq!(expiry.timestamp(), i64::from(CREATED + EXPIRE_SECS));
	}

	#[test]
	fn old_format_header_is_accepted() {
		// Old format, tag 6, two-byte length.
		let body = {
			let mut b = vec![4u8];
			b.extend_from_slice(&CREATED.to_be_bytes());
			b.push(1);
			b
		};
		let mut stream = vec![0x99, 0, body.len() as u8];
		stream.extend_from_slice(&body);
		stream.extend(v4_signature_packet(Some(EXPIRE_SECS)));

		let expiry = expiration_from_openpgp(&stream).unwrap();
		assert_eq!(expiry.timestamp(), i64::from(CREATED + EXPIRE_SECS));
	}

	#[test]
	fn v3_key_carries_inline_validity() {
		let mut body = vec![3u8];
		body.extend_from_slice(&CREATED.to_be_bytes());
		body.extend_from_slice(&2u16.to_be_bytes()); // valid for two days
		body.push(1);
		let mut stream = vec![0xC0 | TAG_PUBLIC_KEY, body.len() as u8];
		stream.extend_from_slice(&body);

		let expiry = expiration_from_openpgp(&stream).unwrap();
		assert_eq!(expiry.timestamp(), i64::from(CREATED) + 2 * 86_400);
	}

	#[test]
	fn garbage_yields_none() {
		assert_eq!(expiration_from_openpgp(b"definitely not pgp"), None);
		assert_eq!(expiration_from_openpgp(&[]), None);
	}
}
