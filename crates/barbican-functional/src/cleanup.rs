//! Tracks entities created by a test and deletes them afterwards
//!
//! Deletion runs containers first, then orders together with the secret or
//! container each one generated, then secrets. A 404 during cleanup means
//! the entity is already gone and is not an error.

use barbican_client::{Client, Container, OrderCommon, OrderType, Result, Secret};

pub struct CleanUp {
    client: Client,
    secrets: Vec<String>,
    containers: Vec<String>,
    orders: Vec<String>,
}

impl CleanUp {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            secrets: Vec::new(),
            containers: Vec::new(),
            orders: Vec::new(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Store a secret and remember it for deletion
    pub async fn store_secret(&mut self, secret: &mut Secret) -> Result<String> {
        let secret_ref = secret.store().await?;
        self.track_secret(&secret_ref);
        Ok(secret_ref)
    }

    /// Store a container and remember it, along with any member secrets it
    /// stored on the way
    pub async fn store_container(&mut self, container: &mut Container) -> Result<String> {
        let container_ref = container.store().await?;
        for secret_ref in container.secret_refs().into_values() {
            self.track_secret(&secret_ref);
        }
        self.containers.push(container_ref.clone());
        Ok(container_ref)
    }

    /// Submit an order and remember it for deletion
    pub async fn submit_order<O: OrderCommon>(&mut self, order: &mut O) -> Result<String> {
        let order_ref = order.submit().await?;
        self.orders.push(order_ref.clone());
        Ok(order_ref)
    }

    /// Remember a secret stored some other way
    pub fn track_secret(&mut self, secret_ref: &str) {
        if !self.secrets.iter().any(|s| s == secret_ref) {
            self.secrets.push(secret_ref.to_string());
        }
    }

    /// Number of entities still tracked
    pub fn tracked(&self) -> usize {
        self.secrets.len() + self.containers.len() + self.orders.len()
    }

    /// Delete everything tracked so far
    pub async fn delete_all_entities(&mut self) -> Result<()> {
        self.delete_all_containers().await?;
        self.delete_all_orders().await?;
        self.delete_all_secrets().await
    }

    async fn delete_all_containers(&mut self) -> Result<()> {
        for container_ref in std::mem::take(&mut self.containers) {
            ignore_missing(self.client.containers.delete(&container_ref).await)?;
        }
        Ok(())
    }

    async fn delete_all_orders(&mut self) -> Result<()> {
        for order_ref in std::mem::take(&mut self.orders) {
            let mut order = match self.client.orders.get(&order_ref).await {
                Ok(order) => order,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };

            if let Some(result_ref) = order.result_ref().await? {
                match order.order_type() {
                    OrderType::Key => {
                        ignore_missing(self.client.secrets.delete(&result_ref).await)?;
                    }
                    OrderType::Asymmetric | OrderType::Certificate => {
                        self.delete_generated_container(&result_ref).await?;
                    }
                }
            }

            ignore_missing(self.client.orders.delete(&order_ref).await)?;
        }
        Ok(())
    }

    /// Delete a container an order produced, then the secrets inside it
    async fn delete_generated_container(&self, container_ref: &str) -> Result<()> {
        let container = match self.client.containers.get(container_ref).await {
            Ok(container) => container,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        ignore_missing(self.client.containers.delete(container_ref).await)?;
        for secret_ref in container.secret_refs().into_values() {
            ignore_missing(self.client.secrets.delete(&secret_ref).await)?;
        }
        Ok(())
    }

    async fn delete_all_secrets(&mut self) -> Result<()> {
        for secret_ref in std::mem::take(&mut self.secrets) {
            ignore_missing(self.client.secrets.delete(&secret_ref).await)?;
        }
        Ok(())
    }
}

fn ignore_missing(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::debug!("cleanup: {}", e);
            Ok(())
        }
        other => other,
    }
}
