// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::AuditSinkError;
use crate::event::AuditEvent;
use crate::sink::AuditSink;

/// Mirrors audit events into the service log.
pub struct TracingAuditSink {
	name: String,
}

impl TracingAuditSink {
	pub fn new() -> Self {
		Self {
			name: "tracing".to_string(),
		}
	}
}

impl Default for TracingAuditSink {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl AuditSink for TracingAuditSink {
	fn name(&self) -> &str {
		&self.name
	}

	async fn publish(&self, event: &AuditEvent) -> Result<(), AuditSinkError> {
		tracing::info!(
			target: "strongbox::audit",
			tag = %event.tag,
			actor = %event.actor,
			audit_target = %event.target,
			extra = ?event.extra_info,
			"audit event"
		);
		Ok(())
	}
}
