// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The audit log facade handlers record through.

use std::sync::Arc;

use tracing::instrument;

use crate::error::{AuditError, AuditResult};
use crate::event::AuditEvent;
use crate::sink::AuditSink;

/// Fan-out over the configured sinks.
///
/// `record_event` awaits every sink and propagates the first failure: the
/// audit trail is part of the correctness boundary for state-changing calls,
/// so an append that cannot be delivered must fail the request rather than
/// be dropped. Events are recorded only after the mutation they describe has
/// committed.
pub struct AuditLog {
	sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditLog {
	pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
		Self { sinks }
	}

	#[instrument(skip(self, event), fields(tag = %event.tag, audit_target = %event.target))]
	pub async fn record_event(&self, event: &AuditEvent) -> AuditResult<()> {
		for sink in &self.sinks {
			sink.publish(event).await.map_err(|source| {
				tracing::error!(sink = sink.name(), error = %source, "audit sink publish failed");
				AuditError::Sink {
					sink: sink.name().to_string(),
					source,
				}
			})?;
		}
		Ok(())
	}
}
