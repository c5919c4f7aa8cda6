//! Containers: named groupings of secrets
//!
//! A `generic` container holds any number of named secrets. `rsa` and
//! `certificate` containers only accept the fixed slots of their type.
//! Secret names are case-insensitive and stored lower-cased.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::entity::{flat_object, EntitySchema, EntityState, RemoteEntity};
use crate::error::{Error, Result};
use crate::formatter::Formatted;
use crate::pagination::{fetch_page, fetch_total, ListQuery, Page};
use crate::reference::{ref_id, require_ref, validate_ref};
use crate::secrets::Secret;
use crate::transport::Transport;

pub(crate) const COLLECTION: &str = "containers";

static CONTAINER: EntitySchema = EntitySchema {
    kind: "Container",
    collection: COLLECTION,
    ref_key: "container_ref",
    settable: &["name", "secret_refs"],
    generated: &[
        "container_ref",
        "type",
        "created",
        "updated",
        "status",
        "consumers",
        "creator_id",
    ],
    normalize: flat_object,
};

const GENERIC_COLUMNS: &[&str] = &[
    "Container href",
    "Name",
    "Created",
    "Status",
    "Type",
    "Secrets",
    "Consumers",
];

const RSA_COLUMNS: &[&str] = &[
    "Container href",
    "Name",
    "Created",
    "Status",
    "Type",
    "Public Key",
    "Private Key",
    "PK Passphrase",
    "Consumers",
];

const CERTIFICATE_COLUMNS: &[&str] = &[
    "Container href",
    "Name",
    "Created",
    "Status",
    "Type",
    "Certificate",
    "Intermediates",
    "Private Key",
    "PK Passphrase",
    "Consumers",
];

pub const PUBLIC_KEY: &str = "public_key";
pub const PRIVATE_KEY: &str = "private_key";
pub const PRIVATE_KEY_PASSPHRASE: &str = "private_key_passphrase";
pub const CERTIFICATE: &str = "certificate";
pub const INTERMEDIATES: &str = "intermediates";

/// Container variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    Generic,
    Rsa,
    Certificate,
}

impl ContainerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Rsa => "rsa",
            Self::Certificate => "certificate",
        }
    }

    /// Named slots of a typed container; empty for generic containers
    pub fn slots(&self) -> &'static [&'static str] {
        match self {
            Self::Generic => &[],
            Self::Rsa => &[PUBLIC_KEY, PRIVATE_KEY, PRIVATE_KEY_PASSPHRASE],
            Self::Certificate => &[
                CERTIFICATE,
                INTERMEDIATES,
                PRIVATE_KEY,
                PRIVATE_KEY_PASSPHRASE,
            ],
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            Self::Generic => "Container",
            Self::Rsa => "RSAContainer",
            Self::Certificate => "CertificateContainer",
        }
    }

    fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Generic => GENERIC_COLUMNS,
            Self::Rsa => RSA_COLUMNS,
            Self::Certificate => CERTIFICATE_COLUMNS,
        }
    }
}

impl FromStr for ContainerType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(Self::Generic),
            "rsa" => Ok(Self::Rsa),
            "certificate" => Ok(Self::Certificate),
            _ => Err(Error::unsupported_type("Container", s)),
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service registered as using a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub name: String,
    #[serde(rename = "URL")]
    pub url: String,
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.url)
    }
}

#[derive(Deserialize)]
struct SecretRef {
    name: String,
    secret_ref: String,
}

/// A container of secrets
pub struct Container {
    entity: RemoteEntity,
    container_type: ContainerType,
    secrets: BTreeMap<String, Secret>,
}

impl Container {
    fn new(
        transport: Arc<dyn Transport>,
        container_type: ContainerType,
        name: Option<String>,
    ) -> Result<Self> {
        let mut entity = RemoteEntity::new(&CONTAINER, transport);
        entity.insert_default("type", container_type.as_str());
        entity.set_optional("name", name)?;
        Ok(Self {
            entity,
            container_type,
            secrets: BTreeMap::new(),
        })
    }

    /// Build the typed container described by a GET body
    pub(crate) fn from_body(transport: Arc<dyn Transport>, body: Value) -> Result<Self> {
        let container_type: ContainerType = body
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .parse()?;
        let entity = RemoteEntity::from_body(&CONTAINER, transport.clone(), body)?;

        let refs: Vec<SecretRef> = match entity.cached("secret_refs") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| Error::InvalidResponse(format!("invalid secret_refs: {e}")))?,
            None => Vec::new(),
        };
        let secrets = refs
            .into_iter()
            .map(|r| {
                let secret = Secret::lazy(transport.clone(), r.secret_ref);
                (r.name.to_lowercase(), secret)
            })
            .collect();

        Ok(Self {
            entity,
            container_type,
            secrets,
        })
    }

    pub fn container_ref(&self) -> Option<&str> {
        self.entity.href()
    }

    pub fn container_type(&self) -> ContainerType {
        self.container_type
    }

    pub fn state(&self) -> EntityState {
        self.entity.state()
    }

    pub async fn name(&mut self) -> Result<Option<String>> {
        self.entity.string("name").await
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.entity.set_attribute("name", name.into())
    }

    pub async fn created(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.entity.timestamp("created").await
    }

    pub async fn updated(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.entity.timestamp("updated").await
    }

    pub async fn status(&mut self) -> Result<Option<String>> {
        self.entity.string("status").await
    }

    pub async fn creator_id(&mut self) -> Result<Option<String>> {
        self.entity.string("creator_id").await
    }

    /// Registered consumers; empty for unsaved containers
    pub async fn consumers(&mut self) -> Result<Vec<Consumer>> {
        match self.entity.get_attribute("consumers").await? {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| Error::InvalidResponse(format!("invalid consumers: {e}"))),
            None => Ok(Vec::new()),
        }
    }

    /// Member secrets keyed by lower-cased name
    pub fn secrets(&self) -> &BTreeMap<String, Secret> {
        &self.secrets
    }

    pub fn secret(&self, name: &str) -> Option<&Secret> {
        self.secrets.get(&name.to_lowercase())
    }

    pub fn secret_mut(&mut self, name: &str) -> Option<&mut Secret> {
        self.secrets.get_mut(&name.to_lowercase())
    }

    /// Names mapped to hrefs, for members that are stored
    pub fn secret_refs(&self) -> BTreeMap<String, String> {
        self.secrets
            .iter()
            .filter_map(|(name, s)| s.secret_ref().map(|r| (name.clone(), r.to_string())))
            .collect()
    }

    /// Add a named secret to a generic container
    pub fn add(&mut self, name: &str, secret: Secret) -> Result<()> {
        self.entity.guard_mutation("secret_refs")?;
        if self.container_type != ContainerType::Generic {
            return Err(Error::UnsupportedOperation(format!(
                "add() is not available for {} containers",
                self.container_type
            )));
        }
        let name = name.to_lowercase();
        if self.secrets.contains_key(&name) {
            return Err(Error::DuplicateSecret { name });
        }
        self.secrets.insert(name, secret);
        Ok(())
    }

    /// Drop a named secret; unknown names are ignored
    pub fn remove(&mut self, name: &str) -> Result<Option<Secret>> {
        self.entity.guard_mutation("secret_refs")?;
        Ok(self.secrets.remove(&name.to_lowercase()))
    }

    /// Fill (or replace) one slot of a typed container
    pub fn set_slot(&mut self, slot: &str, secret: Secret) -> Result<()> {
        self.entity.guard_mutation("secret_refs")?;
        let slot = slot.to_lowercase();
        if !self.container_type.slots().contains(&slot.as_str()) {
            return Err(Error::UnsupportedOperation(format!(
                "{} containers have no '{slot}' slot",
                self.container_type
            )));
        }
        self.secrets.insert(slot, secret);
        Ok(())
    }

    fn set_slot_opt(&mut self, slot: &str, secret: Option<Secret>) -> Result<()> {
        match secret {
            Some(secret) => self.set_slot(slot, secret),
            None => Ok(()),
        }
    }

    pub fn public_key(&self) -> Option<&Secret> {
        self.secrets.get(PUBLIC_KEY)
    }

    pub fn private_key(&self) -> Option<&Secret> {
        self.secrets.get(PRIVATE_KEY)
    }

    pub fn private_key_passphrase(&self) -> Option<&Secret> {
        self.secrets.get(PRIVATE_KEY_PASSPHRASE)
    }

    pub fn certificate(&self) -> Option<&Secret> {
        self.secrets.get(CERTIFICATE)
    }

    pub fn intermediates(&self) -> Option<&Secret> {
        self.secrets.get(INTERMEDIATES)
    }

    /// Store unsaved member secrets, then the container itself
    pub async fn store(&mut self) -> Result<String> {
        self.entity.check_submittable()?;

        let mut secret_refs = Vec::with_capacity(self.secrets.len());
        for (name, secret) in self.secrets.iter_mut() {
            let secret_ref = match secret.secret_ref() {
                Some(r) => r.to_string(),
                None => {
                    tracing::debug!(name = %name, "storing container member secret");
                    secret.store().await?
                }
            };
            secret_refs.push(json!({ "name": name, "secret_ref": secret_ref }));
        }

        let mut body = self.entity.request_fields();
        body.insert("type".to_string(), self.container_type.as_str().into());
        body.insert("secret_refs".to_string(), Value::Array(secret_refs));
        self.entity.submit_body(Value::Object(body)).await
    }

    /// Delete the container (member secrets are left alone)
    pub async fn delete(&mut self) -> Result<()> {
        self.entity.delete().await
    }

    async fn head_row(&mut self) -> Result<Vec<Option<String>>> {
        Ok(vec![
            self.container_ref().map(str::to_string),
            self.entity.string("name").await?,
            self.entity.string("created").await?,
            self.entity.string("status").await?,
            Some(self.container_type.as_str().to_string()),
        ])
    }

    async fn consumer_cell(&mut self) -> Result<Option<String>> {
        let consumers = self.consumers().await?;
        Ok((!consumers.is_empty()).then(|| {
            consumers
                .iter()
                .map(Consumer::to_string)
                .collect::<Vec<_>>()
                .join("\n")
        }))
    }

    async fn generic_row(&mut self) -> Result<Vec<Option<String>>> {
        let mut row = self.head_row().await?;
        let refs = self.secret_refs();
        row.push((!refs.is_empty()).then(|| {
            refs.iter()
                .map(|(name, r)| format!("{name}={r}"))
                .collect::<Vec<_>>()
                .join("\n")
        }));
        row.push(self.consumer_cell().await?);
        Ok(row)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.container_type.display_name();
        match self.entity.href() {
            Some(href) => write!(f, "{kind}(container_ref=\"{href}\")"),
            None => write!(
                f,
                "{kind}(name=\"{}\")",
                self.entity.cached_str("name").unwrap_or_default()
            ),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("type", &self.container_type)
            .field("entity", &self.entity)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl Formatted for Container {
    fn columns(&self) -> &'static [&'static str] {
        self.container_type.columns()
    }

    async fn row(&mut self) -> Result<Vec<Option<String>>> {
        if self.container_type == ContainerType::Generic {
            return self.generic_row().await;
        }
        let mut row = self.head_row().await?;
        for slot in self.container_type.slots() {
            row.push(
                self.secrets
                    .get(*slot)
                    .and_then(Secret::secret_ref)
                    .map(str::to_string),
            );
        }
        row.push(self.consumer_cell().await?);
        Ok(row)
    }

    fn list_columns(&self) -> &'static [&'static str] {
        GENERIC_COLUMNS
    }

    async fn list_row(&mut self) -> Result<Vec<Option<String>>> {
        self.generic_row().await
    }
}

/// Parameters for [`ContainerManager::create`]
#[derive(Debug, Default)]
pub struct NewContainer {
    pub name: Option<String>,
    pub secrets: Vec<(String, Secret)>,
}

/// Parameters for [`ContainerManager::create_rsa`]
#[derive(Debug, Default)]
pub struct NewRsaContainer {
    pub name: Option<String>,
    pub public_key: Option<Secret>,
    pub private_key: Option<Secret>,
    pub private_key_passphrase: Option<Secret>,
}

/// Parameters for [`ContainerManager::create_certificate`]
#[derive(Debug, Default)]
pub struct NewCertificateContainer {
    pub name: Option<String>,
    pub certificate: Option<Secret>,
    pub intermediates: Option<Secret>,
    pub private_key: Option<Secret>,
    pub private_key_passphrase: Option<Secret>,
}

/// Entity manager for containers
#[derive(Clone)]
pub struct ContainerManager {
    transport: Arc<dyn Transport>,
}

impl ContainerManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch a container and build the variant named by its `type`
    pub async fn get(&self, container_ref: &str) -> Result<Container> {
        tracing::debug!(container_ref, "getting container");
        validate_ref(container_ref, "Container")?;
        let body = self.transport.get(container_ref, &[]).await?;
        Container::from_body(self.transport.clone(), body)
    }

    pub fn create(&self, new: NewContainer) -> Result<Container> {
        let mut container = Container::new(self.transport.clone(), ContainerType::Generic, new.name)?;
        for (name, secret) in new.secrets {
            container.add(&name, secret)?;
        }
        Ok(container)
    }

    pub fn create_rsa(&self, new: NewRsaContainer) -> Result<Container> {
        let mut container = Container::new(self.transport.clone(), ContainerType::Rsa, new.name)?;
        container.set_slot_opt(PUBLIC_KEY, new.public_key)?;
        container.set_slot_opt(PRIVATE_KEY, new.private_key)?;
        container.set_slot_opt(PRIVATE_KEY_PASSPHRASE, new.private_key_passphrase)?;
        Ok(container)
    }

    pub fn create_certificate(&self, new: NewCertificateContainer) -> Result<Container> {
        let mut container =
            Container::new(self.transport.clone(), ContainerType::Certificate, new.name)?;
        container.set_slot_opt(CERTIFICATE, new.certificate)?;
        container.set_slot_opt(INTERMEDIATES, new.intermediates)?;
        container.set_slot_opt(PRIVATE_KEY, new.private_key)?;
        container.set_slot_opt(PRIVATE_KEY_PASSPHRASE, new.private_key_passphrase)?;
        Ok(container)
    }

    pub async fn delete(&self, container_ref: &str) -> Result<()> {
        let container_ref = require_ref(container_ref, "Container")?;
        validate_ref(container_ref, "Container")?;
        tracing::info!(container_ref, "deleting container");
        self.transport.delete(container_ref, None).await
    }

    pub async fn list(&self, limit: u32, offset: u32) -> Result<Page<Container>> {
        self.list_with(&ListQuery::new(limit, offset)).await
    }

    /// List with optional `name` and `type` filters
    pub async fn list_with(&self, query: &ListQuery) -> Result<Page<Container>> {
        tracing::debug!(limit = query.limit, offset = query.offset, "listing containers");
        self.page(COLLECTION, &query.to_pairs()).await
    }

    pub async fn list_by_href(&self, href: Option<&str>) -> Result<Page<Container>> {
        match href {
            Some(href) => self.page(href, &[]).await,
            None => Ok(Page::empty()),
        }
    }

    pub async fn total(&self) -> Result<u64> {
        fetch_total(self.transport.as_ref(), COLLECTION).await
    }

    /// Register `name`/`url` as a consumer and return the updated container
    pub async fn register_consumer(
        &self,
        container_ref: &str,
        name: &str,
        url: &str,
    ) -> Result<Container> {
        tracing::debug!(container_ref, name, url, "registering consumer");
        validate_ref(container_ref, "Container")?;
        let body = json!({ "name": name, "URL": url });
        let response = self
            .transport
            .post(&consumers_path(container_ref), &body)
            .await?;
        Container::from_body(self.transport.clone(), response)
    }

    pub async fn remove_consumer(&self, container_ref: &str, name: &str, url: &str) -> Result<()> {
        tracing::debug!(container_ref, name, url, "removing consumer");
        validate_ref(container_ref, "Container")?;
        let body = json!({ "name": name, "URL": url });
        self.transport
            .delete(&consumers_path(container_ref), Some(&body))
            .await
    }

    async fn page(&self, href: &str, query: &[(String, String)]) -> Result<Page<Container>> {
        fetch_page(self.transport.as_ref(), href, query, COLLECTION)
            .await?
            .try_map(|body| Container::from_body(self.transport.clone(), body))
    }
}

fn consumers_path(container_ref: &str) -> String {
    format!("{COLLECTION}/{}/consumers", ref_id(container_ref))
}
