// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence for the Strongbox secret store.
//!
//! Entities: secret series with immutable content versions, groups, clients,
//! and the two deduplicated edge relations that form the ACL graph
//! (client↔group memberships and group↔secret access grants).

pub mod acl;
pub mod client;
pub mod error;
pub mod group;
pub mod pool;
pub mod schema;
pub mod secret;
pub mod testing;
mod types;

pub use acl::AclRepository;
pub use client::{Client, ClientRepository};
pub use error::{DbError, Result};
pub use group::{Group, GroupRepository};
pub use pool::create_pool;
pub use schema::run_migrations;
pub use secret::{
	CreateSecretParams, SanitizedSecret, SecretContent, SecretRepository, SecretSeries,
	SecretSeriesAndContent,
};
