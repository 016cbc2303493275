// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit event types.
//!
//! Every state-changing operation on the secret store emits exactly one
//! event naming the acting client and the affected target, plus free-form
//! key/value diagnostics in `extra_info`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Tags for the events the secret lifecycle can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventTag {
	SecretCreate,
	SecretCreateorupdate,
	SecretDelete,
	SecretChangeversion,
	SecretBackfillexpiry,
	AccessAdd,
	AccessRemove,
}

impl fmt::Display for EventTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			EventTag::SecretCreate => "SECRET_CREATE",
			EventTag::SecretCreateorupdate => "SECRET_CREATEORUPDATE",
			EventTag::SecretDelete => "SECRET_DELETE",
			EventTag::SecretChangeversion => "SECRET_CHANGEVERSION",
			EventTag::SecretBackfillexpiry => "SECRET_BACKFILLEXPIRY",
			EventTag::AccessAdd => "ACCESS_ADD",
			EventTag::AccessRemove => "ACCESS_REMOVE",
		};
		write!(f, "{s}")
	}
}

impl EventTag {
	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"SECRET_CREATE" => Some(EventTag::SecretCreate),
			"SECRET_CREATEORUPDATE" => Some(EventTag::SecretCreateorupdate),
			"SECRET_DELETE" => Some(EventTag::SecretDelete),
			"SECRET_CHANGEVERSION" => Some(EventTag::SecretChangeversion),
			"SECRET_BACKFILLEXPIRY" => Some(EventTag::SecretBackfillexpiry),
			"ACCESS_ADD" => Some(EventTag::AccessAdd),
			"ACCESS_REMOVE" => Some(EventTag::AccessRemove),
			_ => None,
		}
	}
}

/// One record in the append-only audit stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
	pub id: Uuid,
	pub at: DateTime<Utc>,
	pub tag: EventTag,
	/// Name of the automation client that performed the action.
	pub actor: String,
	/// Name of the secret or grant target the action affected.
	pub target: String,
	pub extra_info: BTreeMap<String, String>,
}

impl AuditEvent {
	pub fn new(tag: EventTag, actor: impl Into<String>, target: impl Into<String>) -> Self {
		Self {
			id: Uuid::new_v4(),
			at: Utc::now(),
			tag,
			actor: actor.into(),
			target: target.into(),
			extra_info: BTreeMap::new(),
		}
	}

	pub fn with_extra(
		tag: EventTag,
		actor: impl Into<String>,
		target: impl Into<String>,
		extra_info: BTreeMap<String, String>,
	) -> Self {
		Self {
			extra_info,
			..Self::new(tag, actor, target)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const ALL_TAGS: [EventTag; 7] = [
		EventTag::SecretCreate,
		EventTag::SecretCreateorupdate,
		EventTag::SecretDelete,
		EventTag::SecretChangeversion,
		EventTag::SecretBackfillexpiry,
		EventTag::AccessAdd,
		EventTag::AccessRemove,
	];

	#[test]
	fn display_matches_wire_tags() {
		assert_eq!(EventTag::SecretCreate.to_string(), "SECRET_CREATE");
		assert_eq!(
			EventTag::SecretCreateorupdate.to_string(),
			"SECRET_CREATEORUPDATE"
		);
		assert_eq!(EventTag::AccessRemove.to_string(), "ACCESS_REMOVE");
		assert_eq!(
			EventTag::SecretBackfillexpiry.to_string(),
			"SECRET_BACKFILLEXPIRY"
		);
	}

	#[test]
	fn parse_roundtrips_all_tags() {
		for tag in ALL_TAGS {
			assert_eq!(EventTag::parse(&tag.to_string()), Some(tag));
		}
		assert_eq!(EventTag::parse("NOT_A_TAG"), None);
	}

	#[test]
	fn serde_roundtrips_all_tags() {
		for tag in ALL_TAGS {
			let json = serde_json::to_string(&tag).unwrap();
			let restored: EventTag = serde_json::from_str(&json).unwrap();
			assert_eq!(restored, tag);
		}
	}

	#[test]
	fn events_get_unique_ids() {
		let one = AuditEvent::new(EventTag::SecretCreate, "ops-bot", "db-password");
		let two = AuditEvent::new(EventTag::SecretCreate, "ops-bot", "db-password");
		assert_ne!(one.id, two.id);
	}

	#[test]
	fn with_extra_carries_diagnostics() {
		let mut extra = BTreeMap::new();
		extra.insert("expiry".to_string(), "0".to_string());
		let event = AuditEvent::with_extra(EventTag::SecretCreate, "ops-bot", "k", extra);
		assert_eq!(event.extra_info.get("expiry").unwrap(), "0");
		assert_eq!(event.actor, "ops-bot");
		assert_eq!(event.target, "k");
	}
}
