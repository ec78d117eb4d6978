//! Main application state and service coordination
//!
//! This module contains the production AppState that coordinates the
//! matchmaking engine, its maintenance tasks, the health/metrics endpoint,
//! and graceful shutdown.

use crate::config::AppConfig;
use crate::events::LogEventPublisher;
use crate::matchmaker::{MaintenanceTasks, MatchmakingEngine};
use crate::metrics::health::{HealthServer, HealthServerConfig};
use crate::metrics::{MetricsCollector, MetricsService};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core matchmaking engine
    engine: Arc<MatchmakingEngine>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Handles for the engine's periodic sweeps
    maintenance: Option<MaintenanceTasks>,

    /// Other background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing chatmix-matchmaker service");
        info!(
            "Configuration: service={}, max_rooms={}, queue_timeout={}s",
            config.service.name, config.chat.max_rooms, config.chat.queue_timeout_seconds
        );

        let metrics_collector = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let engine = Arc::new(MatchmakingEngine::with_publisher_and_metrics(
            config.chat.clone(),
            Arc::new(LogEventPublisher),
            metrics_collector.clone(),
        ));

        let health_config = HealthServerConfig {
            port: config.service.metrics_port,
            host: "0.0.0.0".to_string(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, metrics_collector.clone())
                .with_engine(engine.clone()),
        );
        let metrics_service = Arc::new(MetricsService::new(metrics_collector, health_server));

        Ok(Self {
            config,
            engine,
            metrics_service,
            maintenance: None,
            background_tasks: Vec::new(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start all background services
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting chatmix-matchmaker service");

        *self.is_running.write().await = true;

        self.start_metrics_service().await?;
        self.maintenance = Some(MaintenanceTasks::spawn(self.engine.clone()));
        self.start_stats_refresher();

        info!("✅ chatmix-matchmaker service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of chatmix-matchmaker service");

        *self.is_running.write().await = false;

        if let Some(mut maintenance) = self.maintenance.take() {
            maintenance.shutdown();
            info!("✅ Maintenance tasks stopped");
        }

        for handle in self.background_tasks.drain(..) {
            handle.abort();
        }

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        match self.engine.stats() {
            Ok(final_stats) => info!("Final service statistics: {:?}", final_stats),
            Err(e) => warn!("Failed to read final statistics: {}", e),
        }

        info!("✅ chatmix-matchmaker service shutdown completed");
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Get the matchmaking engine for operations
    pub fn engine(&self) -> Arc<MatchmakingEngine> {
        self.engine.clone()
    }

    /// Get metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Start the health/metrics endpoint as a background task
    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        info!(
            "Starting metrics and health endpoints on port {}",
            self.config.service.metrics_port
        );

        let metrics_service = self.metrics_service.clone();
        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            }
        });
        self.background_tasks.push(metrics_handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        Ok(())
    }

    /// Periodically refresh metric gauges from engine statistics
    fn start_stats_refresher(&mut self) {
        let engine = self.engine.clone();
        let collector = self.metrics_service.collector();
        let is_running = self.is_running.clone();

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(30));
            loop {
                tick.tick().await;
                if !*is_running.read().await {
                    break;
                }
                match engine.stats() {
                    Ok(stats) => collector.update_from_stats(&stats),
                    Err(e) => warn!("Stats refresh failed: {}", e),
                }
            }
        });
        self.background_tasks.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        // high port so the test listener cannot clash with a local service
        config.service.metrics_port = 19184;
        config.chat.max_rooms = 2;
        config
    }

    #[tokio::test]
    async fn test_app_state_initialization() {
        let app_state = AppState::new(test_config()).await.unwrap();

        assert!(!app_state.is_running().await);
        assert_eq!(app_state.config().chat.max_rooms, 2);

        // the engine is usable before start()
        let response = app_state.engine().start_chat("alice").await.unwrap();
        assert!(response.room_code().is_some());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut app_state = AppState::new(test_config()).await.unwrap();

        app_state.start().await.unwrap();
        assert!(app_state.is_running().await);

        app_state.shutdown().await.unwrap();
        assert!(!app_state.is_running().await);
    }
}
