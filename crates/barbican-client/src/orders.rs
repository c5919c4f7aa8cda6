//! Orders: asynchronous requests for Barbican to generate secrets
//!
//! An order is one of three variants keyed on its `type`:
//!
//! - `key`: a symmetric key, producing a secret (`secret_ref`)
//! - `asymmetric`: a key pair, producing a container (`container_ref`)
//! - `certificate`: a certificate, producing a container (`container_ref`)
//!
//! Request parameters travel under `meta` on the wire and are flattened into
//! plain attributes on the client side.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::entity::{flat_object, EntitySchema, EntityState, RemoteEntity};
use crate::error::{Error, Result};
use crate::formatter::Formatted;
use crate::pagination::{fetch_page, fetch_total, ListQuery, Page};
use crate::reference::{require_ref, validate_ref};
use crate::transport::Transport;

pub(crate) const COLLECTION: &str = "orders";

static KEY_ORDER: EntitySchema = EntitySchema {
    kind: "KeyOrder",
    collection: COLLECTION,
    ref_key: "order_ref",
    settable: &[
        "name",
        "algorithm",
        "bit_length",
        "mode",
        "expiration",
        "payload_content_type",
    ],
    generated: &[
        "order_ref",
        "type",
        "status",
        "created",
        "updated",
        "error_status_code",
        "error_reason",
        "sub_status",
        "sub_status_message",
        "creator_id",
        "secret_ref",
    ],
    normalize: flatten_meta,
};

static ASYMMETRIC_ORDER: EntitySchema = EntitySchema {
    kind: "AsymmetricOrder",
    collection: COLLECTION,
    ref_key: "order_ref",
    settable: &[
        "name",
        "algorithm",
        "bit_length",
        "pass_phrase",
        "expiration",
        "payload_content_type",
    ],
    generated: &[
        "order_ref",
        "type",
        "status",
        "created",
        "updated",
        "error_status_code",
        "error_reason",
        "sub_status",
        "sub_status_message",
        "creator_id",
        "container_ref",
    ],
    normalize: flatten_meta,
};

static CERTIFICATE_ORDER: EntitySchema = EntitySchema {
    kind: "CertificateOrder",
    collection: COLLECTION,
    ref_key: "order_ref",
    settable: &[
        "name",
        "request_type",
        "subject_dn",
        "source_container_ref",
        "ca_id",
        "profile",
        "request_data",
    ],
    generated: &[
        "order_ref",
        "type",
        "status",
        "created",
        "updated",
        "error_status_code",
        "error_reason",
        "sub_status",
        "sub_status_message",
        "creator_id",
        "container_ref",
    ],
    normalize: flatten_certificate_meta,
};

const COLUMNS: &[&str] = &[
    "Order href",
    "Type",
    "Container href",
    "Secret href",
    "Created",
    "Status",
    "Error code",
    "Error message",
];

const NOT_APPLICABLE: &str = "N/A";

/// Lift `meta` entries to the top level; top-level keys win
fn flatten_meta(body: Value) -> Result<Map<String, Value>> {
    let mut map = flat_object(body)?;
    if let Some(Value::Object(meta)) = map.remove("meta") {
        for (key, value) in meta {
            map.entry(key).or_insert(value);
        }
    }
    Ok(map)
}

/// Certificate orders carry their source container as `meta.container_ref`,
/// which would clash with the generated top-level `container_ref`
fn flatten_certificate_meta(body: Value) -> Result<Map<String, Value>> {
    let mut map = flat_object(body)?;
    if let Some(Value::Object(mut meta)) = map.remove("meta") {
        if let Some(source) = meta.remove("container_ref") {
            map.insert("source_container_ref".to_string(), source);
        }
        for (key, value) in meta {
            map.entry(key).or_insert(value);
        }
    }
    Ok(map)
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The `type` discriminator of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Key,
    Asymmetric,
    Certificate,
}

impl OrderType {
    /// Wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Asymmetric => "asymmetric",
            Self::Certificate => "certificate",
        }
    }

    /// Name shown in the `Type` column
    pub fn label(&self) -> &'static str {
        match self {
            Self::Key => "Key",
            Self::Asymmetric => "Asymmetric",
            Self::Certificate => "Certificate",
        }
    }

    fn schema(&self) -> &'static EntitySchema {
        match self {
            Self::Key => &KEY_ORDER,
            Self::Asymmetric => &ASYMMETRIC_ORDER,
            Self::Certificate => &CERTIFICATE_ORDER,
        }
    }
}

impl FromStr for OrderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "key" => Ok(Self::Key),
            "asymmetric" => Ok(Self::Asymmetric),
            "certificate" => Ok(Self::Certificate),
            _ => Err(Error::unsupported_type("Order", s)),
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behaviour shared by every order variant
#[async_trait]
pub trait OrderCommon: Send {
    #[doc(hidden)]
    fn entity(&self) -> &RemoteEntity;

    #[doc(hidden)]
    fn entity_mut(&mut self) -> &mut RemoteEntity;

    fn order_type(&self) -> OrderType;

    fn order_ref(&self) -> Option<&str> {
        self.entity().href()
    }

    fn state(&self) -> EntityState {
        self.entity().state()
    }

    async fn name(&mut self) -> Result<Option<String>> {
        self.entity_mut().string("name").await
    }

    fn set_name(&mut self, name: String) -> Result<()> {
        self.entity_mut().set_attribute("name", name)
    }

    async fn status(&mut self) -> Result<Option<String>> {
        self.entity_mut().string("status").await
    }

    async fn created(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.entity_mut().timestamp("created").await
    }

    async fn updated(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.entity_mut().timestamp("updated").await
    }

    async fn error_status_code(&mut self) -> Result<Option<String>> {
        self.entity_mut().string("error_status_code").await
    }

    async fn error_reason(&mut self) -> Result<Option<String>> {
        self.entity_mut().string("error_reason").await
    }

    async fn sub_status(&mut self) -> Result<Option<String>> {
        self.entity_mut().string("sub_status").await
    }

    async fn sub_status_message(&mut self) -> Result<Option<String>> {
        self.entity_mut().string("sub_status_message").await
    }

    async fn creator_id(&mut self) -> Result<Option<String>> {
        self.entity_mut().string("creator_id").await
    }

    /// Read any order attribute by name
    async fn get_attribute(&mut self, name: &str) -> Result<Option<Value>> {
        Ok(self.entity_mut().get_attribute(name).await?.cloned())
    }

    /// Write any user-settable order attribute by name
    fn set_attribute(&mut self, name: &str, value: Value) -> Result<()> {
        self.entity_mut().set_attribute(name, value)
    }

    /// Submit the order and return its href
    async fn submit(&mut self) -> Result<String> {
        self.entity().check_submittable()?;
        let order_type = self.order_type();
        let mut meta = self.entity().request_fields();
        if order_type == OrderType::Certificate {
            if let Some(source) = meta.remove("source_container_ref") {
                meta.insert("container_ref".to_string(), source);
            }
        }
        let body = json!({ "type": order_type.as_str(), "meta": meta });
        self.entity_mut().submit_body(body).await
    }

    /// Delete the order from Barbican
    async fn delete(&mut self) -> Result<()> {
        self.entity_mut().delete().await
    }
}

fn fmt_order(entity: &RemoteEntity, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = entity.schema().kind;
    match entity.href() {
        Some(href) => write!(f, "{kind}(order_ref=\"{href}\"")?,
        None => write!(
            f,
            "{kind}(name=\"{}\"",
            entity.cached_str("name").unwrap_or_default()
        )?,
    }
    if let Some(code) = entity.cached_str("error_status_code") {
        write!(f, ", error_status_code={code}")?;
    }
    if let Some(reason) = entity.cached_str("error_reason") {
        write!(f, ", error_reason=\"{reason}\"")?;
    }
    f.write_str(")")
}

async fn order_row(
    entity: &mut RemoteEntity,
    order_type: OrderType,
) -> Result<Vec<Option<String>>> {
    let (container_ref, secret_ref) = match order_type {
        OrderType::Key => (
            Some(NOT_APPLICABLE.to_string()),
            entity.string("secret_ref").await?,
        ),
        OrderType::Asymmetric | OrderType::Certificate => (
            entity.string("container_ref").await?,
            Some(NOT_APPLICABLE.to_string()),
        ),
    };
    Ok(vec![
        entity.href().map(str::to_string),
        Some(order_type.label().to_string()),
        container_ref,
        secret_ref,
        entity.string("created").await?,
        entity.string("status").await?,
        entity.string("error_status_code").await?,
        entity.string("error_reason").await?,
    ])
}

/// Request for a symmetric key
pub struct KeyOrder {
    entity: RemoteEntity,
}

impl KeyOrder {
    pub async fn algorithm(&mut self) -> Result<Option<String>> {
        self.entity.string("algorithm").await
    }

    pub fn set_algorithm(&mut self, algorithm: impl Into<String>) -> Result<()> {
        self.entity.set_attribute("algorithm", algorithm.into())
    }

    pub async fn bit_length(&mut self) -> Result<Option<u64>> {
        self.entity.integer("bit_length").await
    }

    pub fn set_bit_length(&mut self, bit_length: u64) -> Result<()> {
        self.entity.set_attribute("bit_length", bit_length)
    }

    /// Block cipher mode, e.g. `cbc`
    pub async fn mode(&mut self) -> Result<Option<String>> {
        self.entity.string("mode").await
    }

    pub fn set_mode(&mut self, mode: impl Into<String>) -> Result<()> {
        self.entity.set_attribute("mode", mode.into())
    }

    pub async fn expiration(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.entity.timestamp("expiration").await
    }

    pub fn set_expiration(&mut self, expiration: DateTime<Utc>) -> Result<()> {
        self.entity.set_attribute("expiration", rfc3339(expiration))
    }

    pub async fn payload_content_type(&mut self) -> Result<Option<String>> {
        self.entity.string("payload_content_type").await
    }

    pub fn set_payload_content_type(&mut self, content_type: impl Into<String>) -> Result<()> {
        self.entity
            .set_attribute("payload_content_type", content_type.into())
    }

    /// Secret generated once the order completes
    pub async fn secret_ref(&mut self) -> Result<Option<String>> {
        self.entity.string("secret_ref").await
    }
}

/// Request for a key pair
pub struct AsymmetricOrder {
    entity: RemoteEntity,
}

impl AsymmetricOrder {
    pub async fn algorithm(&mut self) -> Result<Option<String>> {
        self.entity.string("algorithm").await
    }

    pub fn set_algorithm(&mut self, algorithm: impl Into<String>) -> Result<()> {
        self.entity.set_attribute("algorithm", algorithm.into())
    }

    pub async fn bit_length(&mut self) -> Result<Option<u64>> {
        self.entity.integer("bit_length").await
    }

    pub fn set_bit_length(&mut self, bit_length: u64) -> Result<()> {
        self.entity.set_attribute("bit_length", bit_length)
    }

    /// Passphrase protecting the generated private key
    pub async fn pass_phrase(&mut self) -> Result<Option<String>> {
        self.entity.string("pass_phrase").await
    }

    pub fn set_pass_phrase(&mut self, pass_phrase: impl Into<String>) -> Result<()> {
        self.entity.set_attribute("pass_phrase", pass_phrase.into())
    }

    pub async fn expiration(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.entity.timestamp("expiration").await
    }

    pub fn set_expiration(&mut self, expiration: DateTime<Utc>) -> Result<()> {
        self.entity.set_attribute("expiration", rfc3339(expiration))
    }

    pub async fn payload_content_type(&mut self) -> Result<Option<String>> {
        self.entity.string("payload_content_type").await
    }

    /// Container generated once the order completes
    pub async fn container_ref(&mut self) -> Result<Option<String>> {
        self.entity.string("container_ref").await
    }
}

/// Request for a certificate
pub struct CertificateOrder {
    entity: RemoteEntity,
}

impl CertificateOrder {
    pub async fn request_type(&mut self) -> Result<Option<String>> {
        self.entity.string("request_type").await
    }

    pub async fn subject_dn(&mut self) -> Result<Option<String>> {
        self.entity.string("subject_dn").await
    }

    /// Container holding the key pair for stored-key requests
    pub async fn source_container_ref(&mut self) -> Result<Option<String>> {
        self.entity.string("source_container_ref").await
    }

    pub async fn ca_id(&mut self) -> Result<Option<String>> {
        self.entity.string("ca_id").await
    }

    pub async fn profile(&mut self) -> Result<Option<String>> {
        self.entity.string("profile").await
    }

    pub async fn request_data(&mut self) -> Result<Option<String>> {
        self.entity.string("request_data").await
    }

    /// Container generated once the order completes
    pub async fn container_ref(&mut self) -> Result<Option<String>> {
        self.entity.string("container_ref").await
    }
}

macro_rules! order_variant {
    ($variant:ident, $order_type:expr) => {
        #[async_trait]
        impl OrderCommon for $variant {
            fn entity(&self) -> &RemoteEntity {
                &self.entity
            }

            fn entity_mut(&mut self) -> &mut RemoteEntity {
                &mut self.entity
            }

            fn order_type(&self) -> OrderType {
                $order_type
            }
        }

        impl fmt::Display for $variant {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt_order(&self.entity, f)
            }
        }

        impl fmt::Debug for $variant {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($variant)).field(&self.entity).finish()
            }
        }

        #[async_trait]
        impl Formatted for $variant {
            fn columns(&self) -> &'static [&'static str] {
                COLUMNS
            }

            async fn row(&mut self) -> Result<Vec<Option<String>>> {
                order_row(&mut self.entity, $order_type).await
            }
        }
    };
}

order_variant!(KeyOrder, OrderType::Key);
order_variant!(AsymmetricOrder, OrderType::Asymmetric);
order_variant!(CertificateOrder, OrderType::Certificate);

/// An order of any type
#[derive(Debug)]
pub enum Order {
    Key(KeyOrder),
    Asymmetric(AsymmetricOrder),
    Certificate(CertificateOrder),
}

impl Order {
    fn wrap(order_type: OrderType, entity: RemoteEntity) -> Self {
        match order_type {
            OrderType::Key => Self::Key(KeyOrder { entity }),
            OrderType::Asymmetric => Self::Asymmetric(AsymmetricOrder { entity }),
            OrderType::Certificate => Self::Certificate(CertificateOrder { entity }),
        }
    }

    fn building(order_type: OrderType, transport: Arc<dyn Transport>) -> Self {
        Self::wrap(order_type, RemoteEntity::new(order_type.schema(), transport))
    }

    /// Build the variant named by the body's `type`
    pub(crate) fn from_body(transport: Arc<dyn Transport>, body: Value) -> Result<Self> {
        let order_type: OrderType = body
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_field("type"))?
            .parse()?;
        let entity = RemoteEntity::from_body(order_type.schema(), transport, body)?;
        Ok(Self::wrap(order_type, entity))
    }

    pub fn as_key(&mut self) -> Option<&mut KeyOrder> {
        match self {
            Self::Key(order) => Some(order),
            _ => None,
        }
    }

    pub fn as_asymmetric(&mut self) -> Option<&mut AsymmetricOrder> {
        match self {
            Self::Asymmetric(order) => Some(order),
            _ => None,
        }
    }

    pub fn as_certificate(&mut self) -> Option<&mut CertificateOrder> {
        match self {
            Self::Certificate(order) => Some(order),
            _ => None,
        }
    }

    /// Href of the generated secret or container, whichever applies
    pub async fn result_ref(&mut self) -> Result<Option<String>> {
        match self {
            Self::Key(order) => order.secret_ref().await,
            Self::Asymmetric(order) => order.container_ref().await,
            Self::Certificate(order) => order.container_ref().await,
        }
    }
}

#[async_trait]
impl OrderCommon for Order {
    fn entity(&self) -> &RemoteEntity {
        match self {
            Self::Key(order) => &order.entity,
            Self::Asymmetric(order) => &order.entity,
            Self::Certificate(order) => &order.entity,
        }
    }

    fn entity_mut(&mut self) -> &mut RemoteEntity {
        match self {
            Self::Key(order) => &mut order.entity,
            Self::Asymmetric(order) => &mut order.entity,
            Self::Certificate(order) => &mut order.entity,
        }
    }

    fn order_type(&self) -> OrderType {
        match self {
            Self::Key(_) => OrderType::Key,
            Self::Asymmetric(_) => OrderType::Asymmetric,
            Self::Certificate(_) => OrderType::Certificate,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_order(self.entity(), f)
    }
}

#[async_trait]
impl Formatted for Order {
    fn columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    async fn row(&mut self) -> Result<Vec<Option<String>>> {
        let order_type = self.order_type();
        order_row(self.entity_mut(), order_type).await
    }
}

/// Parameters for [`OrderManager::create_key`]
#[derive(Debug, Clone, Default)]
pub struct NewKeyOrder {
    pub name: Option<String>,
    pub algorithm: Option<String>,
    pub bit_length: Option<u64>,
    pub mode: Option<String>,
    pub payload_content_type: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

/// Parameters for [`OrderManager::create_asymmetric`]
#[derive(Clone, Default)]
pub struct NewAsymmetricOrder {
    pub name: Option<String>,
    pub algorithm: Option<String>,
    pub bit_length: Option<u64>,
    pub pass_phrase: Option<String>,
    pub payload_content_type: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for NewAsymmetricOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAsymmetricOrder")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("bit_length", &self.bit_length)
            .field("pass_phrase", &self.pass_phrase.as_ref().map(|_| "<redacted>"))
            .field("payload_content_type", &self.payload_content_type)
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Parameters for [`OrderManager::create_certificate`]
#[derive(Debug, Clone, Default)]
pub struct NewCertificateOrder {
    pub name: Option<String>,
    pub request_type: Option<String>,
    pub subject_dn: Option<String>,
    pub source_container_ref: Option<String>,
    pub ca_id: Option<String>,
    pub profile: Option<String>,
    pub request_data: Option<String>,
}

/// Entity manager for orders
#[derive(Clone)]
pub struct OrderManager {
    transport: Arc<dyn Transport>,
}

impl OrderManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch an order and build the variant named by its `type`
    pub async fn get(&self, order_ref: &str) -> Result<Order> {
        tracing::debug!(order_ref, "getting order");
        validate_ref(order_ref, "Order")?;
        let body = self.transport.get(order_ref, &[]).await?;
        Order::from_body(self.transport.clone(), body)
    }

    /// Empty, unsubmitted order of the named type
    pub fn create(&self, type_name: &str) -> Result<Order> {
        let order_type: OrderType = type_name.parse()?;
        Ok(Order::building(order_type, self.transport.clone()))
    }

    pub fn create_key(&self, new: NewKeyOrder) -> Result<KeyOrder> {
        let mut entity = RemoteEntity::new(&KEY_ORDER, self.transport.clone());
        entity.set_optional("name", new.name)?;
        entity.set_optional("algorithm", new.algorithm)?;
        entity.set_optional("bit_length", new.bit_length)?;
        entity.set_optional("mode", new.mode)?;
        entity.set_optional("payload_content_type", new.payload_content_type)?;
        entity.set_optional("expiration", new.expiration.map(rfc3339))?;
        Ok(KeyOrder { entity })
    }

    pub fn create_asymmetric(&self, new: NewAsymmetricOrder) -> Result<AsymmetricOrder> {
        let mut entity = RemoteEntity::new(&ASYMMETRIC_ORDER, self.transport.clone());
        entity.set_optional("name", new.name)?;
        entity.set_optional("algorithm", new.algorithm)?;
        entity.set_optional("bit_length", new.bit_length)?;
        entity.set_optional("pass_phrase", new.pass_phrase)?;
        entity.set_optional("payload_content_type", new.payload_content_type)?;
        entity.set_optional("expiration", new.expiration.map(rfc3339))?;
        Ok(AsymmetricOrder { entity })
    }

    pub fn create_certificate(&self, new: NewCertificateOrder) -> Result<CertificateOrder> {
        let mut entity = RemoteEntity::new(&CERTIFICATE_ORDER, self.transport.clone());
        entity.set_optional("name", new.name)?;
        entity.set_optional("request_type", new.request_type)?;
        entity.set_optional("subject_dn", new.subject_dn)?;
        entity.set_optional("source_container_ref", new.source_container_ref)?;
        entity.set_optional("ca_id", new.ca_id)?;
        entity.set_optional("profile", new.profile)?;
        entity.set_optional("request_data", new.request_data)?;
        Ok(CertificateOrder { entity })
    }

    pub async fn delete(&self, order_ref: &str) -> Result<()> {
        let order_ref = require_ref(order_ref, "Order")?;
        validate_ref(order_ref, "Order")?;
        tracing::info!(order_ref, "deleting order");
        self.transport.delete(order_ref, None).await
    }

    pub async fn list(&self, limit: u32, offset: u32) -> Result<Page<Order>> {
        self.list_with(&ListQuery::new(limit, offset)).await
    }

    pub async fn list_with(&self, query: &ListQuery) -> Result<Page<Order>> {
        tracing::debug!(limit = query.limit, offset = query.offset, "listing orders");
        self.page(COLLECTION, &query.to_pairs()).await
    }

    /// Follow a `previous`/`next` cursor; `None` yields an empty page
    pub async fn list_by_href(&self, href: Option<&str>) -> Result<Page<Order>> {
        match href {
            Some(href) => self.page(href, &[]).await,
            None => Ok(Page::empty()),
        }
    }

    pub async fn total(&self) -> Result<u64> {
        fetch_total(self.transport.as_ref(), COLLECTION).await
    }

    async fn page(&self, href: &str, query: &[(String, String)]) -> Result<Page<Order>> {
        fetch_page(self.transport.as_ref(), href, query, COLLECTION)
            .await?
            .try_map(|body| Order::from_body(self.transport.clone(), body))
    }
}
