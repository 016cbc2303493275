// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Strongbox server binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use strongbox_crypto::{ContentCryptographer, MasterKey};
use strongbox_server::{create_app_state, create_router};

/// Strongbox - centralized secret distribution for machine clients.
#[derive(Parser, Debug)]
#[command(name = "strongbox-server", about = "Strongbox secret-distribution server", version)]
struct Args {
	/// Path to the server configuration file.
	#[arg(long)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
	/// Generate a fresh master key and print it as hex
	GenKey,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	match args.command {
		Some(Command::Version) => {
			println!("strongbox-server {}", env!("CARGO_PKG_VERSION"));
			return Ok(());
		}
		Some(Command::GenKey) => {
			let key = MasterKey::generate();
			println!("{}", key.to_hex());
			return Ok(());
		}
		None => {}
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = strongbox_config::load_config(args.config.as_deref())?;

	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.init();

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting strongbox-server"
	);

	let master_key = match (&config.crypto.master_key_hex, &config.crypto.master_key_file) {
		(Some(hex), _) => MasterKey::from_hex(hex)?,
		(None, Some(path)) => MasterKey::from_file(path)?,
		(None, None) => unreachable!("config validation requires a key source"),
	};
	let cryptographer = Arc::new(ContentCryptographer::new(master_key));

	let pool = strongbox_db::create_pool(&config.database.url).await?;
	strongbox_db::run_migrations(&pool).await?;

	let state = create_app_state(pool, cryptographer, &config);
	let app = create_router(state).layer(TraceLayer::new_for_http());

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);
	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "Server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("Received shutdown signal");
		}
	}

	tracing::info!("Server shutdown complete");
	Ok(())
}
