// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only audit logging for the secret store.
//!
//! Every mutation of secret state produces exactly one [`AuditEvent`],
//! recorded through [`AuditLog`] after the mutation commits. Delivery to the
//! configured sinks happens before the request is acknowledged.

pub mod error;
pub mod event;
pub mod log;
pub mod sink;

pub use error::{AuditError, AuditResult, AuditSinkError};
pub use event::{AuditEvent, EventTag};
pub use log::AuditLog;
pub use sink::sqlite::SqliteAuditSink;
pub use sink::tracing::TracingAuditSink;
pub use sink::AuditSink;
