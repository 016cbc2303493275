// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum AuditSinkError {
	#[error("transient: {0}")]
	Transient(String),

	#[error("permanent: {0}")]
	Permanent(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
	#[error("Audit sink '{sink}' failed: {source}")]
	Sink {
		sink: String,
		source: AuditSinkError,
	},
}

pub type AuditResult<T> = std::result::Result<T, AuditError>;
