//! Registry of queue engines keyed by qualified name.
//!
//! Queues are created on first reference by any operation and live for the
//! lifetime of the registry. Concurrent first references to the same name
//! resolve to a single engine.

use crate::queue::{Message, QueueEngine, QueueSettings, QueueStats};
use crate::{BrokerError, MessageId, QualifiedQueueName};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Lazily populated map from qualified queue name to engine
#[derive(Debug)]
pub struct QueueRegistry {
    queues: RwLock<HashMap<QualifiedQueueName, Arc<QueueEngine>>>,
    settings: QueueSettings,
}

impl QueueRegistry {
    /// Create an empty registry; every queue it creates uses `settings`
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Get the engine for `name`, creating it if this is the first reference
    ///
    /// Must be called from within a Tokio runtime, as creating an engine
    /// spawns its reclamation task.
    pub fn resolve(&self, name: &QualifiedQueueName) -> Arc<QueueEngine> {
        {
            let queues = self.queues.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(engine) = queues.get(name) {
                return Arc::clone(engine);
            }
        }

        let mut queues = self.queues.write().unwrap_or_else(PoisonError::into_inner);
        let engine = queues
            .entry(name.clone())
            .or_insert_with(|| Arc::new(QueueEngine::new(name.clone(), self.settings.clone())));
        Arc::clone(engine)
    }

    pub fn publish(
        &self,
        name: &QualifiedQueueName,
        payload: Bytes,
    ) -> Result<MessageId, BrokerError> {
        self.resolve(name).publish(payload)
    }

    /// Claim from `name`; the registry lock is released before waiting
    pub async fn claim(
        &self,
        name: &QualifiedQueueName,
        wait: Duration,
    ) -> Result<Message, BrokerError> {
        let engine = self.resolve(name);
        engine.claim(wait).await
    }

    pub fn ack(&self, name: &QualifiedQueueName, message_id: &MessageId) -> Result<(), BrokerError> {
        self.resolve(name).ack(message_id)
    }

    pub fn stats(&self, name: &QualifiedQueueName) -> QueueStats {
        self.resolve(name).stats()
    }

    /// Number of queues created so far
    pub fn len(&self) -> usize {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new(QueueSettings::default())
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
