// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod sqlite;
pub mod tracing;

use async_trait::async_trait;

use crate::error::AuditSinkError;
use crate::event::AuditEvent;

/// Destination for audit events.
///
/// Sinks must be durable enough for their role: the store-backed sink is the
/// record of authority, and its failure fails the mutating request.
#[async_trait]
pub trait AuditSink: Send + Sync {
	fn name(&self) -> &str;

	async fn publish(&self, event: &AuditEvent) -> Result<(), AuditSinkError>;
}
