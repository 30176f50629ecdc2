//! Core QueryHaus functionality
//!
//! This module contains the main QueryHaus struct: it owns the connection
//! pool and the naming conventions, and hands out queries and the executor
//! that runs them.

use sqlx::PgPool;
use std::time::Duration;

use crate::errors::QueryHausError;
use crate::executor::PgExecutor;
use config::{AppConfig, DatabaseConfig, QueryConfig};
use query_object::{Entity, Query};

/// Main QueryHaus coordinator that manages the database connection and query settings
pub struct QueryHaus {
    executor: PgExecutor,
    query_config: QueryConfig,
}

impl QueryHaus {
    /// Create new QueryHaus with database connection and default query settings
    pub async fn new(config: DatabaseConfig) -> Result<Self, QueryHausError> {
        Self::with_query_config(config, QueryConfig::default()).await
    }

    /// Create QueryHaus from a loaded application configuration
    pub async fn from_app_config(config: &AppConfig) -> Result<Self, QueryHausError> {
        Self::with_query_config(config.database.clone(), config.query.clone()).await
    }

    pub async fn with_query_config(
        config: DatabaseConfig,
        query_config: QueryConfig,
    ) -> Result<Self, QueryHausError> {
        let connection_string = config.connection_string();

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect(&connection_string)
            .await?;

        tracing::debug!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "Connected to database"
        );

        Ok(Self::from_pool(pool, query_config))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool, query_config: QueryConfig) -> Self {
        Self {
            executor: PgExecutor::new(pool),
            query_config,
        }
    }

    /// Get database pool reference
    pub fn pool(&self) -> &PgPool {
        self.executor.pool()
    }

    /// Executor to pass to the terminal operations of a query
    pub fn executor(&self) -> &PgExecutor {
        &self.executor
    }

    pub fn query_config(&self) -> &QueryConfig {
        &self.query_config
    }

    /// Start a query over `T` using the configured naming conventions
    pub fn query<T: Entity>(&self) -> Query<T> {
        Query::with_config(self.query_config.clone())
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), QueryHausError> {
        sqlx::query("SELECT 1").fetch_one(self.pool()).await?;
        Ok(())
    }
}
