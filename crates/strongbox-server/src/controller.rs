// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The secret controller: the only component that sees plaintext.
//!
//! Composes the cryptographer with the secret repository. Content arrives
//! base64-encoded from the API and is fingerprinted and encrypted in exactly
//! that form, so stored HMACs stay comparable across deployments; the
//! decoded payload only materializes inside [`SecretController::decrypted_content`]
//! for the expiry backfill.

use base64::Engine;
use std::collections::BTreeMap;
use std::sync::Arc;

use strongbox_crypto::{ContentCryptographer, CryptoError};
use strongbox_db::{
	CreateSecretParams, DbError, SecretRepository, SecretSeriesAndContent,
};

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
	#[error("Validation failed: {0}")]
	Validation(String),

	#[error(transparent)]
	Crypto(#[from] CryptoError),

	#[error(transparent)]
	Db(#[from] DbError),
}

/// One secret write, fully specified.
///
/// Collected from the request before a single terminal call, in place of a
/// chained builder.
#[derive(Debug, Clone, Default)]
pub struct CreateSecret {
	pub name: String,
	/// Base64 form of the raw secret bytes, as received on the wire.
	pub content: String,
	pub creator: String,
	pub description: String,
	pub metadata: BTreeMap<String, String>,
	/// Unix seconds; 0 means no known expiry.
	pub expiry: i64,
	pub kind: String,
	pub generation_options: BTreeMap<String, String>,
}

pub struct SecretController {
	cryptographer: Arc<ContentCryptographer>,
	secrets: SecretRepository,
}

impl SecretController {
	pub fn new(cryptographer: Arc<ContentCryptographer>, secrets: SecretRepository) -> Self {
		Self {
			cryptographer,
			secrets,
		}
	}

	/// Create a new secret series. Fails with `DbError::Conflict` (wrapped)
	/// when a live series already has this name.
	#[tracing::instrument(skip(self, request), fields(name = %request.name))]
	pub async fn create_secret(
		&self,
		request: CreateSecret,
	) -> Result<SecretSeriesAndContent, ControllerError> {
		let params = self.seal(&request)?;
		self.secrets.create_secret(&params).await?;
		self.hydrate(&request.name).await
	}

	/// Create the series if missing, otherwise append a new version and mark
	/// it current.
	#[tracing::instrument(skip(self, request), fields(name = %request.name))]
	pub async fn create_or_update_secret(
		&self,
		request: CreateSecret,
	) -> Result<SecretSeriesAndContent, ControllerError> {
		let params = self.seal(&request)?;
		self.secrets.create_or_update_secret(&params).await?;
		self.hydrate(&request.name).await
	}

	/// Decode a stored secret back to its raw payload bytes.
	///
	/// Internal use only (expiry backfill); nothing on the automation wire
	/// surface returns this.
	pub fn decrypted_content(
		&self,
		pair: &SecretSeriesAndContent,
	) -> Result<Vec<u8>, ControllerError> {
		let key = self.cryptographer.derive_key(&pair.series.name);
		let encoded = self
			.cryptographer
			.decrypt(&key, &pair.content.encrypted_content)?;
		BASE64.decode(&encoded).map_err(|e| {
			ControllerError::Crypto(CryptoError::MalformedCiphertext(format!(
				"stored content is not base64: {e}"
			)))
		})
	}

	/// Validate and encrypt a request into repository parameters.
	fn seal(&self, request: &CreateSecret) -> Result<CreateSecretParams, ControllerError> {
		if request.name.is_empty() {
			return Err(ControllerError::Validation("name must not be empty".to_string()));
		}
		if request.content.is_empty() {
			return Err(ControllerError::Validation(
				"content must not be empty".to_string(),
			));
		}
		if request.creator.is_empty() {
			return Err(ControllerError::Validation(
				"creator must not be empty".to_string(),
			));
		}
		if BASE64.decode(&request.content).is_err() {
			return Err(ControllerError::Validation(
				"content must be valid base64".to_string(),
			));
		}

		// Fingerprint over the encoded bytes as received.
		let content_hmac = self.cryptographer.compute_hmac(request.content.as_bytes());
		let key = self.cryptographer.derive_key(&request.name);
		let encrypted_content = self.cryptographer.encrypt(&key, request.content.as_bytes())?;

		Ok(CreateSecretParams {
			name: request.name.clone(),
			encrypted_content,
			content_hmac,
			creator: request.creator.clone(),
			metadata: request.metadata.clone(),
			expiry: request.expiry,
			description: request.description.clone(),
			kind: request.kind.clone(),
			generation_options: request.generation_options.clone(),
		})
	}

	async fn hydrate(&self, name: &str) -> Result<SecretSeriesAndContent, ControllerError> {
		self.secrets
			.get_secret_by_name(name)
			.await?
			.ok_or_else(|| ControllerError::Db(DbError::NotFound(format!("secret '{name}'"))))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use strongbox_crypto::MasterKey;
	use strongbox_db::testing::create_test_pool;

	async fn controller() -> SecretController {
		let pool = create_test_pool().await;
		let cryptographer = Arc::new(ContentCryptographer::new(MasterKey::generate()));
		SecretController::new(cryptographer, SecretRepository::new(pool))
	}

	fn request(name: &str, content: &str) -> CreateSecret {
		CreateSecret {
			name: name.to_string(),
			content: content.to_string(),
			creator: "ops-bot".to_string(),
			..Default::default()
		}
	}

	#[tokio::test]
	async fn test_create_encrypts_and_fingerprints() {
		let controller = controller().await;
		// "pass123"
		let pair = controller
			.create_secret(request("db-password", "cGFzczEyMw=="))
			.await
			.unwrap();

		assert_ne!(pair.content.encrypted_content, "cGFzczEyMw==");
		assert!(!pair.content.encrypted_content.contains("pass123"));
		assert_eq!(pair.content.content_hmac.len(), 64);

		let raw = controller.decrypted_content(&pair).unwrap();
		assert_eq!(raw, b"pass123");
	}

	#[tokio::test]
	async fn test_validation_rejects_empty_fields() {
		let controller = controller().await;

		let err = controller.create_secret(request("", "QQ==")).await.unwrap_err();
		assert!(matches!(err, ControllerError::Validation(_)));

		let err = controller.create_secret(request("k", "")).await.unwrap_err();
		assert!(matches!(err, ControllerError::Validation(_)));

		let mut anonymous = request("k", "QQ==");
		anonymous.creator = String::new();
		let err = controller.create_secret(anonymous).await.unwrap_err();
		assert!(matches!(err, ControllerError::Validation(_)));
	}

	#[tokio::test]
	async fn test_validation_rejects_malformed_base64() {
		let controller = controller().await;
		let err = controller
			.create_secret(request("k", "@@not-base64@@"))
			.await
			.unwrap_err();
		assert!(matches!(err, ControllerError::Validation(_)));
	}

	#[tokio::test]
	async fn test_duplicate_create_surfaces_conflict() {
		let controller = controller().await;
		controller.create_secret(request("dup", "QQ==")).await.unwrap();
		let err = controller.create_secret(request("dup", "QQ==")).await.unwrap_err();
		assert!(matches!(err, ControllerError::Db(DbError::Conflict(_))));
	}

	#[tokio::test]
	async fn test_create_or_update_appends_and_stays_decryptable() {
		let controller = controller().await;

		controller
			.create_or_update_secret(request("k", "djE="))
			.await
			.unwrap();
		let updated = controller
			.create_or_update_secret(request("k", "djI="))
			.await
			.unwrap();

		assert_eq!(controller.decrypted_content(&updated).unwrap(), b"v2");
	}

	#[tokio::test]
	async fn test_identical_content_gets_identical_hmac_distinct_ciphertext() {
		let controller = controller().await;

		let first = controller
			.create_or_update_secret(request("k", "c2FtZQ=="))
			.await
			.unwrap();
		let second = controller
			.create_or_update_secret(request("k", "c2FtZQ=="))
			.await
			.unwrap();

		assert_eq!(first.content.content_hmac, second.content.content_hmac);
		assert_ne!(
			first.content.encrypted_content,
			second.content.encrypted_content
		);
	}
}
