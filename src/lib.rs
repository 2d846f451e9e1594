//! EcoConnect: a small HTTP service for sharing community environmental
//! initiatives. Users submit initiatives, browse them, delete them by title
//! and like or unlike them.

pub mod aws_clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod startup;

use crate::config::{Config, StoreBackend};
use crate::domain::InitiativeRepository;
use crate::errors::AppError;
use crate::memory::InMemoryInitiativeRepository;
use crate::repositories::DynamoDbInitiativeRepository;
use crate::service::{InitiativeService, ServiceSettings};
use std::sync::Arc;

/// AppState holds shared resources for the web server.
pub struct AppState {
    pub service: InitiativeService,
}

/// Builds the repository selected by `config`, provisioning AWS resources
/// when the DynamoDB backend is chosen.
pub async fn build_repository(config: &Config) -> Result<Arc<dyn InitiativeRepository>, AppError> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; initiatives are lost on restart");
            Ok(Arc::new(InMemoryInitiativeRepository::new()))
        }
        StoreBackend::DynamoDb => {
            let sdk_config = aws_clients::create_sdk_config(config).await;
            let db_client = aws_clients::create_dynamodb_client(&sdk_config);
            startup::init_resources(&db_client, &config.initiatives_table).await?;
            Ok(Arc::new(DynamoDbInitiativeRepository::new(
                db_client,
                config.initiatives_table.clone(),
            )))
        }
    }
}

/// Assembles the router over an already-built repository.
pub fn build_app(repo: Arc<dyn InitiativeRepository>, config: &Config) -> axum::Router {
    let state = Arc::new(AppState {
        service: InitiativeService::new(repo, ServiceSettings::from(config)),
    });
    routes::create_router(state, config.max_body_bytes)
}
