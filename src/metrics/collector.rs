//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the chatmix-matchmaker
//! service using Prometheus metrics.

use crate::matchmaker::engine::EngineStats;
use anyhow::Result;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntGauge, Registry};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Room-related metrics
    room_metrics: RoomMetrics,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,
}

/// Room-related metrics
#[derive(Clone)]
pub struct RoomMetrics {
    /// Number of active rooms
    pub active_rooms: IntGauge,

    /// Number of one-member rooms waiting for a partner
    pub waiting_rooms: IntGauge,

    /// Total rooms created
    pub rooms_created_total: IntCounter,

    /// Total lonely rooms reaped
    pub rooms_reaped_total: IntCounter,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Users currently waiting in the queue
    pub queue_depth: IntGauge,

    /// Total users sent to the queue
    pub users_queued_total: IntCounter,

    /// Total users promoted out of the queue
    pub promotions_total: IntCounter,

    /// Total queue entries dropped by the expiry sweep
    pub expirations_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Start-chat request processing time
    pub start_chat_duration_seconds: Histogram,

    /// Maintenance sweep durations by sweep name
    pub sweep_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let room_metrics = RoomMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            room_metrics,
            queue_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get room metrics
    pub fn room(&self) -> &RoomMetrics {
        &self.room_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a room being created
    pub fn record_room_created(&self) {
        self.room_metrics.rooms_created_total.inc();
    }

    /// Record rooms created by a promotion sweep
    pub fn record_rooms_created(&self, count: u64) {
        self.room_metrics.rooms_created_total.inc_by(count);
    }

    /// Record rooms removed by the reaper
    pub fn record_rooms_reaped(&self, count: u64) {
        self.room_metrics.rooms_reaped_total.inc_by(count);
    }

    /// Record a user entering the wait queue
    pub fn record_user_queued(&self) {
        self.queue_metrics.users_queued_total.inc();
    }

    /// Record users promoted out of the queue
    pub fn record_promotions(&self, count: u64) {
        self.queue_metrics.promotions_total.inc_by(count);
    }

    /// Record queue entries dropped by the expiry sweep
    pub fn record_queue_expirations(&self, count: u64) {
        self.queue_metrics.expirations_total.inc_by(count);
    }

    /// Record a start-chat request being processed
    pub fn record_start_chat(&self, duration: Duration) {
        self.performance_metrics
            .start_chat_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record a maintenance sweep run
    pub fn record_sweep(&self, sweep: &str, duration: Duration) {
        self.performance_metrics
            .sweep_duration_seconds
            .with_label_values(&[sweep])
            .observe(duration.as_secs_f64());
    }

    /// Update current room occupancy gauges
    pub fn update_room_occupancy(&self, active: usize, waiting: usize) {
        self.room_metrics.active_rooms.set(active as i64);
        self.room_metrics.waiting_rooms.set(waiting as i64);
    }

    /// Update the current queue depth gauge
    pub fn update_queue_depth(&self, depth: usize) {
        self.queue_metrics.queue_depth.set(depth as i64);
    }

    /// Update health status (0=unhealthy, 1=degraded, 2=healthy)
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Refresh gauges from an engine statistics snapshot
    pub fn update_from_stats(&self, stats: &EngineStats) {
        self.update_room_occupancy(stats.active_rooms, stats.waiting_rooms);
        self.update_queue_depth(stats.queue_depth);
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        // registration into a fresh registry cannot collide
        Self::new().expect("metrics collector with fresh registry")
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("chatmix_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "chatmix_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
        })
    }
}

impl RoomMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_rooms = IntGauge::new("chatmix_active_rooms", "Number of active rooms")?;
        registry.register(Box::new(active_rooms.clone()))?;

        let waiting_rooms = IntGauge::new(
            "chatmix_waiting_rooms",
            "Number of one-member rooms waiting for a partner",
        )?;
        registry.register(Box::new(waiting_rooms.clone()))?;

        let rooms_created_total =
            IntCounter::new("chatmix_rooms_created_total", "Total rooms created")?;
        registry.register(Box::new(rooms_created_total.clone()))?;

        let rooms_reaped_total =
            IntCounter::new("chatmix_rooms_reaped_total", "Total lonely rooms reaped")?;
        registry.register(Box::new(rooms_reaped_total.clone()))?;

        Ok(Self {
            active_rooms,
            waiting_rooms,
            rooms_created_total,
            rooms_reaped_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queue_depth = IntGauge::new("chatmix_queue_depth", "Users waiting in the queue")?;
        registry.register(Box::new(queue_depth.clone()))?;

        let users_queued_total =
            IntCounter::new("chatmix_users_queued_total", "Total users queued")?;
        registry.register(Box::new(users_queued_total.clone()))?;

        let promotions_total = IntCounter::new(
            "chatmix_promotions_total",
            "Total users promoted from the queue into rooms",
        )?;
        registry.register(Box::new(promotions_total.clone()))?;

        let expirations_total = IntCounter::new(
            "chatmix_queue_expirations_total",
            "Total queue entries dropped by the expiry sweep",
        )?;
        registry.register(Box::new(expirations_total.clone()))?;

        Ok(Self {
            queue_depth,
            users_queued_total,
            promotions_total,
            expirations_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let start_chat_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "chatmix_start_chat_duration_seconds",
            "Start-chat request processing time",
        ))?;
        registry.register(Box::new(start_chat_duration_seconds.clone()))?;

        let sweep_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "chatmix_sweep_duration_seconds",
                "Maintenance sweep duration",
            ),
            &["sweep"],
        )?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        Ok(Self {
            start_chat_duration_seconds,
            sweep_duration_seconds,
        })
    }
}
