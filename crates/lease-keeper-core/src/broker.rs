//! Authenticated, tenant-scoped broker operations.
//!
//! [`TenantBroker`] is the single entry point transports use. Every queue
//! operation first resolves the bearer token to a tenant, then scopes the
//! caller-supplied queue name to that tenant. A token can therefore never
//! address another tenant's queues.

use crate::auth::{Credentials, IssuedKey, TenantKeyStore};
use crate::queue::{Message, QueueStats};
use crate::registry::QueueRegistry;
use crate::{
    BrokerError, KeyId, MessageId, QualifiedQueueName, QueueName, TenantId, ValidationError,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Facade combining the queue registry with tenant authentication
#[derive(Clone)]
pub struct TenantBroker {
    registry: Arc<QueueRegistry>,
    keys: Arc<dyn TenantKeyStore>,
}

impl TenantBroker {
    pub fn new(registry: Arc<QueueRegistry>, keys: Arc<dyn TenantKeyStore>) -> Self {
        Self { registry, keys }
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    /// Issue a new API key for `tenant`
    ///
    /// Unauthenticated: any caller may mint a key for any tenant name.
    pub async fn create_key(&self, tenant: &str) -> Result<IssuedKey, BrokerError> {
        let tenant = TenantId::new(tenant)?;
        Ok(self.keys.create_key(&tenant).await?)
    }

    /// Resolve a bearer token to its tenant
    pub async fn authenticate(&self, token: &str) -> Result<Credentials, BrokerError> {
        self.keys.validate_key(token).await.map_err(|e| {
            warn!(error = %e, "API key rejected");
            BrokerError::from(e)
        })
    }

    async fn scoped_queue(
        &self,
        token: &str,
        queue: &str,
    ) -> Result<QualifiedQueueName, BrokerError> {
        let credentials = self.authenticate(token).await?;
        let queue = QueueName::new(queue)?;
        Ok(QualifiedQueueName::new(&credentials.tenant, &queue))
    }

    /// Publish `payload` to the caller's queue
    pub async fn publish(
        &self,
        token: &str,
        queue: &str,
        payload: Bytes,
    ) -> Result<MessageId, BrokerError> {
        let name = self.scoped_queue(token, queue).await?;

        if payload.is_empty() {
            return Err(ValidationError::Required {
                field: "payload".to_string(),
            }
            .into());
        }

        self.registry.publish(&name, payload)
    }

    /// Claim a message from the caller's queue, waiting up to `wait`
    pub async fn claim(
        &self,
        token: &str,
        queue: &str,
        wait: Duration,
    ) -> Result<Message, BrokerError> {
        let name = self.scoped_queue(token, queue).await?;
        self.registry.claim(&name, wait).await
    }

    /// Acknowledge a message previously claimed from the caller's queue
    pub async fn ack(&self, token: &str, queue: &str, message_id: &str) -> Result<(), BrokerError> {
        let name = self.scoped_queue(token, queue).await?;
        let message_id: MessageId = message_id.parse()?;
        self.registry.ack(&name, &message_id)
    }

    /// Collection sizes of the caller's queue
    pub async fn stats(&self, token: &str, queue: &str) -> Result<QueueStats, BrokerError> {
        let name = self.scoped_queue(token, queue).await?;
        Ok(self.registry.stats(&name))
    }

    /// Revoke one of the caller's own keys
    ///
    /// Keys belonging to other tenants are reported as not found, so the
    /// existence of a foreign key id is never revealed.
    pub async fn revoke_key(&self, token: &str, key_id: &str) -> Result<(), BrokerError> {
        let credentials = self.authenticate(token).await?;
        let key_id: KeyId = key_id.parse()?;

        match self.keys.key_tenant(&key_id).await {
            Some(owner) if owner == credentials.tenant => {}
            _ => {
                return Err(BrokerError::KeyNotFound {
                    key_id: key_id.to_string(),
                })
            }
        }

        self.keys.revoke_key(&key_id).await?;
        info!(
            tenant = %credentials.tenant,
            key_id = %key_id,
            revoked_by = %credentials.key_id,
            "API key revoked by tenant"
        );
        Ok(())
    }
}

impl std::fmt::Debug for TenantBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantBroker")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
