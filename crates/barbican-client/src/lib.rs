//! Client library for the Barbican secret management API
//!
//! The crate wraps the four Barbican resource collections behind typed
//! managers:
//!
//! - **Secrets** (`secrets`): store, fetch and delete secret material
//! - **Orders** (`orders`): ask the service to generate keys, key pairs or certificates
//! - **Containers** (`containers`): group secrets, optionally as RSA or certificate bundles
//! - **Certificate authorities** (`cas`): read-only view of configured CAs
//!
//! Entities fetched by reference are lazy: the first read of an attribute
//! that is not cached performs exactly one GET. Entities become immutable
//! once stored.
//!
//! # Example
//!
//! ```rust,ignore
//! use barbican_client::{Client, HttpTransportConfig, NewSecret};
//!
//! let client = Client::new(
//!     HttpTransportConfig::new("http://localhost:9311")
//!         .with_project_id("12345")
//!         .with_auth_token(token),
//! )?;
//!
//! let mut secret = client.secrets.create(NewSecret::new("db-password", "hunter2"))?;
//! let secret_ref = secret.store().await?;
//!
//! let mut fetched = client.secrets.get(&secret_ref)?;
//! let payload = fetched.payload().await?;
//! ```

mod cas;
mod client;
mod containers;
mod entity;
mod error;
mod formatter;
mod orders;
mod pagination;
mod reference;
mod secrets;
mod transport;

#[cfg(test)]
mod testing;

pub use cas::{CAManager, CA};
pub use client::Client;
pub use containers::{
    Consumer, Container, ContainerManager, ContainerType, NewCertificateContainer, NewContainer,
    NewRsaContainer, CERTIFICATE, INTERMEDIATES, PRIVATE_KEY, PRIVATE_KEY_PASSPHRASE, PUBLIC_KEY,
};
pub use entity::{parse_timestamp, EntitySchema, EntityState, RemoteEntity};
pub use error::{Error, Result};
pub use formatter::{format_entity, format_list, render_entity, render_list, Formatted, OutputFormat};
pub use orders::{
    AsymmetricOrder, CertificateOrder, KeyOrder, NewAsymmetricOrder, NewCertificateOrder,
    NewKeyOrder, Order, OrderCommon, OrderManager, OrderType,
};
pub use pagination::{ListQuery, Page, DEFAULT_LIMIT};
pub use reference::{ref_id, validate_ref};
pub use secrets::{NewSecret, Secret, SecretManager, SecretPayload};
pub use transport::{HttpTransport, HttpTransportConfig, Query, Transport, DEFAULT_API_VERSION};
