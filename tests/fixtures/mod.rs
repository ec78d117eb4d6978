//! Test fixtures and mock implementations for integration testing

use async_trait::async_trait;
use chatmix_matchmaker::error::Result;
use chatmix_matchmaker::events::{ChatEvent, ChatEventPublisher};
use std::sync::{Arc, Mutex};

/// Event publisher that captures published events for assertions
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published_events: Arc<Mutex<Vec<ChatEvent>>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self {
            published_events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get all published events
    pub fn get_published_events(&self) -> Vec<ChatEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of a specific kind (e.g. "user_joined")
    pub fn count_events_of_kind(&self, kind: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }
}

#[async_trait]
impl ChatEventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: ChatEvent) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
        Ok(())
    }
}
