// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Strongbox secret-distribution server.
//!
//! This crate wires the secret controller, the automation HTTP surface, and
//! the client authenticator over the persistence and audit crates.

pub mod api;
pub mod api_response;
pub mod auth;
pub mod controller;
pub mod routes;

pub use api::{create_app_state, create_router, AppState};
pub use auth::{Peer, RequireAutomationClient};
pub use controller::{ControllerError, CreateSecret, SecretController};
