use std::sync::Arc;

use crate::cas::CAManager;
use crate::containers::ContainerManager;
use crate::error::Result;
use crate::orders::OrderManager;
use crate::secrets::SecretManager;
use crate::transport::{HttpTransport, HttpTransportConfig, Transport};

/// Entry point bundling one manager per resource collection.
///
/// All managers share the same transport.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    pub secrets: SecretManager,
    pub orders: OrderManager,
    pub containers: ContainerManager,
    pub cas: CAManager,
}

impl Client {
    /// Client talking HTTP to a Barbican endpoint
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        tracing::debug!(endpoint = %config.endpoint, "creating client");
        Ok(Self::with_transport(Arc::new(HttpTransport::new(config)?)))
    }

    /// Client over any transport, e.g. an in-memory service in tests
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            secrets: SecretManager::new(transport.clone()),
            orders: OrderManager::new(transport.clone()),
            containers: ContainerManager::new(transport.clone()),
            cas: CAManager::new(transport.clone()),
            transport,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::RecordingTransport;

    #[test]
    fn test_missing_endpoint_is_a_config_error() {
        let result = Client::new(HttpTransportConfig::new(" "));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_managers_share_the_transport() {
        let transport = RecordingTransport::new();
        let client = Client::with_transport(transport.clone());

        let _ = client.secrets.total().await;
        let _ = client.orders.total().await;
        let _ = client.containers.total().await;
        let _ = client.cas.total().await;
        assert_eq!(transport.request_count(), 4);
    }
}
