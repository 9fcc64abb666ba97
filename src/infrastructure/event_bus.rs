use crate::domain::events::{EventListener, OptimizationEvent};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

/// Event bus for publishing optimization events to multiple listeners
pub struct EventBus {
    listeners: Arc<RwLock<Vec<Arc<dyn EventListener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().await.push(listener);
    }

    /// Publish an event to all listeners, in subscription order
    pub async fn publish(&self, event: OptimizationEvent) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

/// Forwards events into a `tokio::sync::broadcast` channel for a streaming
/// layer. Lagging or absent receivers never block publishers.
pub struct BroadcastListener {
    sender: broadcast::Sender<OptimizationEvent>,
}

impl BroadcastListener {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn receiver(&self) -> broadcast::Receiver<OptimizationEvent> {
        self.sender.subscribe()
    }
}

impl EventListener for BroadcastListener {
    fn on_event(&self, event: &OptimizationEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!("EventBus: no stream receivers for {:?}", event);
        }
    }
}
