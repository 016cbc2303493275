// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Row-mapping helpers shared by the repositories.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Parse a stored RFC 3339 timestamp, falling back to now for rows written
/// by hand during migrations.
pub(crate) fn parse_ts(raw: &str) -> DateTime<Utc> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.unwrap_or_else(|_| Utc::now())
}

/// Parse a stored JSON string→string map, treating malformed rows as empty.
pub(crate) fn parse_string_map(raw: &str) -> BTreeMap<String, String> {
	serde_json::from_str(raw).unwrap_or_default()
}
