//! Health check logic for the matchmaking service
//!
//! This module provides health check functionality for the
//! chatmix-matchmaker service, including readiness and liveness probes.

use crate::matchmaker::engine::MatchmakingEngine;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Number of active rooms
    pub active_rooms: usize,
    /// Number of one-member rooms waiting for a partner
    pub waiting_rooms: usize,
    /// Users currently waiting in the queue
    pub queue_depth: usize,
    /// Total rooms created since service start
    pub rooms_created: u64,
    /// Total lonely rooms reaped since service start
    pub rooms_reaped: u64,
    /// Total users promoted out of the queue since service start
    pub users_promoted: u64,
    /// Service uptime information
    pub uptime_info: String,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(engine: &MatchmakingEngine) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let registry_check = Self::check_registry(engine).await;
        if registry_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(registry_check);

        let queue_check = Self::check_queue(engine).await;
        if queue_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if queue_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(queue_check);

        let stats = Self::gather_service_stats(engine);

        Ok(HealthCheck {
            status: overall_status,
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - verify the engine state is reachable
    pub async fn liveness_check(engine: &MatchmakingEngine) -> Result<HealthStatus> {
        match engine.stats() {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(_) => Ok(HealthStatus::Unhealthy),
        }
    }

    /// Readiness check - verify the engine can handle requests
    pub async fn readiness_check(engine: &MatchmakingEngine) -> Result<HealthStatus> {
        match Self::check_queue(engine).await.status {
            HealthStatus::Unhealthy => Ok(HealthStatus::Unhealthy),
            status => match Self::check_registry(engine).await.status {
                HealthStatus::Healthy => Ok(status),
                other => Ok(other),
            },
        }
    }

    /// Check the room registry is reachable
    async fn check_registry(engine: &MatchmakingEngine) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match engine.waiting_rooms().await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Room registry check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Registry inaccessible: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "room_registry".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Check the wait queue; a backed-up queue at full capacity degrades the
    /// service but does not make it unhealthy
    async fn check_queue(engine: &MatchmakingEngine) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match engine.queue_size().await {
            Ok(size) if size > 0 => match engine.stats() {
                Ok(stats) if stats.active_rooms >= engine.settings().max_rooms => (
                    HealthStatus::Degraded,
                    Some(format!(
                        "Registry at capacity with {} users queued",
                        size
                    )),
                ),
                _ => (HealthStatus::Healthy, None),
            },
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Wait queue check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Queue inaccessible: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "wait_queue".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Gather current service statistics
    fn gather_service_stats(engine: &MatchmakingEngine) -> ServiceStats {
        match engine.stats() {
            Ok(stats) => ServiceStats {
                active_rooms: stats.active_rooms,
                waiting_rooms: stats.waiting_rooms,
                queue_depth: stats.queue_depth,
                rooms_created: stats.rooms_created,
                rooms_reaped: stats.rooms_reaped,
                users_promoted: stats.users_promoted,
                uptime_info: format!(
                    "Chats started: {}, users queued: {}",
                    stats.chats_started, stats.users_queued
                ),
            },
            Err(_) => ServiceStats {
                active_rooms: 0,
                waiting_rooms: 0,
                queue_depth: 0,
                rooms_created: 0,
                rooms_reaped: 0,
                users_promoted: 0,
                uptime_info: "Statistics unavailable".to_string(),
            },
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
