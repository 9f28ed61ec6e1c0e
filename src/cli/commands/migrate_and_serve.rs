use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, trace};

use super::initdb::apply_migrations;
use super::serve::run_server;
use crate::config::{AppConfig, redact_database_url};
use crate::schemas::AppState;

pub async fn migrate_and_serve(database_url: &str, bind_address: &str) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");
    debug!("Database URL: {}", redact_database_url(database_url));

    let config = AppConfig::load()?;
    let db = apply_migrations(database_url).await?;
    let state = AppState::new(db, Arc::new(config));
    debug!("Application state initialized successfully");

    run_server(state, bind_address).await
}
