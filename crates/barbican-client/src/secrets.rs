//! Secrets: keys, credentials and other sensitive data
//!
//! A [`Secret`] returned by [`SecretManager::get`] is lazy: nothing is
//! fetched until an attribute that is not cached is read. The payload lives
//! behind its own `<secret_ref>/payload` resource and is fetched separately
//! by [`Secret::payload`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::entity::{flat_object, value_to_string, EntitySchema, EntityState, RemoteEntity};
use crate::error::{Error, Result};
use crate::formatter::Formatted;
use crate::pagination::{fetch_page, fetch_total, ListQuery, Page};
use crate::reference::{require_ref, validate_ref};
use crate::transport::Transport;

pub(crate) const COLLECTION: &str = "secrets";

const DEFAULT_SECRET_TYPE: &str = "opaque";
const TEXT_PLAIN: &str = "text/plain";
const OCTET_STREAM: &str = "application/octet-stream";

pub(crate) static SECRET: EntitySchema = EntitySchema {
    kind: "Secret",
    collection: COLLECTION,
    ref_key: "secret_ref",
    settable: &[
        "name",
        "expiration",
        "algorithm",
        "bit_length",
        "mode",
        "secret_type",
        "payload",
        "payload_content_type",
        "payload_content_encoding",
    ],
    generated: &[
        "secret_ref",
        "created",
        "updated",
        "status",
        "content_types",
        "creator_id",
    ],
    normalize: flat_object,
};

const COLUMNS: &[&str] = &[
    "Secret href",
    "Name",
    "Created",
    "Status",
    "Content types",
    "Algorithm",
    "Bit length",
    "Secret type",
    "Mode",
    "Expiration",
];

/// Unencrypted secret data
#[derive(Clone, PartialEq, Eq)]
pub enum SecretPayload {
    /// Stored as `text/plain`
    Text(String),
    /// Stored base64-encoded as `application/octet-stream`
    Binary(Vec<u8>),
}

impl SecretPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// JSON string form: text as-is, binary base64-encoded
    fn to_wire(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Binary(b) => BASE64.encode(b),
        }
    }
}

// Payloads never show up in logs
impl fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "Text(<{} bytes>)", s.len()),
            Self::Binary(b) => write!(f, "Binary(<{} bytes>)", b.len()),
        }
    }
}

impl From<String> for SecretPayload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SecretPayload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for SecretPayload {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl From<&[u8]> for SecretPayload {
    fn from(value: &[u8]) -> Self {
        Self::Binary(value.to_vec())
    }
}

/// Parameters for [`SecretManager::create`]
#[derive(Debug, Clone, Default)]
pub struct NewSecret {
    pub name: Option<String>,
    pub payload: Option<SecretPayload>,
    /// Overrides the content type derived from the payload
    pub payload_content_type: Option<String>,
    /// Overrides the content encoding derived from the payload
    pub payload_content_encoding: Option<String>,
    pub algorithm: Option<String>,
    pub bit_length: Option<u64>,
    pub mode: Option<String>,
    /// Defaults to `opaque`
    pub secret_type: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
}

impl NewSecret {
    pub fn new(name: impl Into<String>, payload: impl Into<SecretPayload>) -> Self {
        Self {
            name: Some(name.into()),
            payload: Some(payload.into()),
            ..Default::default()
        }
    }
}

/// A secret stored (or to be stored) in Barbican
pub struct Secret {
    entity: RemoteEntity,
    payload: Option<SecretPayload>,
}

impl Secret {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        let mut entity = RemoteEntity::new(&SECRET, transport);
        entity.insert_default("secret_type", DEFAULT_SECRET_TYPE);
        Self {
            entity,
            payload: None,
        }
    }

    pub(crate) fn lazy(transport: Arc<dyn Transport>, secret_ref: impl Into<String>) -> Self {
        Self {
            entity: RemoteEntity::lazy(&SECRET, transport, secret_ref),
            payload: None,
        }
    }

    pub(crate) fn from_body(transport: Arc<dyn Transport>, body: Value) -> Result<Self> {
        Ok(Self {
            entity: RemoteEntity::from_body(&SECRET, transport, body)?,
            payload: None,
        })
    }

    pub fn secret_ref(&self) -> Option<&str> {
        self.entity.href()
    }

    pub fn state(&self) -> EntityState {
        self.entity.state()
    }

    pub fn is_loaded(&self) -> bool {
        self.entity.is_loaded()
    }

    pub async fn name(&mut self) -> Result<Option<String>> {
        self.entity.string("name").await
    }

    pub async fn algorithm(&mut self) -> Result<Option<String>> {
        self.entity.string("algorithm").await
    }

    pub async fn bit_length(&mut self) -> Result<Option<u64>> {
        self.entity.integer("bit_length").await
    }

    pub async fn mode(&mut self) -> Result<Option<String>> {
        self.entity.string("mode").await
    }

    pub async fn secret_type(&mut self) -> Result<Option<String>> {
        self.entity.string("secret_type").await
    }

    pub async fn expiration(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.entity.timestamp("expiration").await
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

    /// Content types the payload can be retrieved as.
    ///
    /// A secret built locally with an explicit content type reports it as
    /// `default`.
    pub async fn content_types(&mut self) -> Result<Option<BTreeMap<String, String>>> {
        if self.entity.href().is_some() {
            if let Some(Value::Object(map)) = self.entity.get_attribute("content_types").await? {
                return Ok(Some(
                    map.iter()
                        .map(|(k, v)| (k.clone(), value_to_string(v)))
                        .collect(),
                ));
            }
        }
        Ok(self
            .entity
            .cached_str("payload_content_type")
            .map(|ct| BTreeMap::from([("default".to_string(), ct)])))
    }

    /// Explicit content type, else the server's default content type
    pub async fn payload_content_type(&mut self) -> Result<Option<String>> {
        if let Some(ct) = self.entity.cached_str("payload_content_type") {
            return Ok(Some(ct));
        }
        if self.entity.href().is_none() {
            return Ok(None);
        }
        Ok(self
            .content_types()
            .await?
            .and_then(|types| types.get("default").cloned()))
    }

    pub fn payload_content_encoding(&self) -> Option<String> {
        self.entity.cached_str("payload_content_encoding")
    }

    /// The secret payload, fetched from `<secret_ref>/payload` on first use
    pub async fn payload(&mut self) -> Result<Option<&SecretPayload>> {
        if self.payload.is_none() {
            if let Some(href) = self.entity.href().map(str::to_string) {
                let payload = self.fetch_payload(&href).await?;
                self.payload = Some(payload);
            }
        }
        Ok(self.payload.as_ref())
    }

    async fn fetch_payload(&mut self, href: &str) -> Result<SecretPayload> {
        let content_type = self.payload_content_type().await?.ok_or_else(|| {
            Error::Payload("secret has no content type to retrieve the payload as".to_string())
        })?;

        let url = format!("{}/payload", href.trim_end_matches('/'));
        tracing::debug!(href = %url, accept = %content_type, "fetching secret payload");
        let bytes = self.entity.transport().get_raw(&url, &content_type).await?;

        if content_type.starts_with(TEXT_PLAIN) {
            String::from_utf8(bytes)
                .map(SecretPayload::Text)
                .map_err(|e| Error::Payload(format!("payload is not valid UTF-8: {e}")))
        } else {
            Ok(SecretPayload::Binary(bytes))
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.entity.set_attribute("name", name.into())
    }

    pub fn set_algorithm(&mut self, algorithm: impl Into<String>) -> Result<()> {
        self.entity.set_attribute("algorithm", algorithm.into())
    }

    pub fn set_bit_length(&mut self, bit_length: u64) -> Result<()> {
        self.entity.set_attribute("bit_length", bit_length)
    }

    pub fn set_mode(&mut self, mode: impl Into<String>) -> Result<()> {
        self.entity.set_attribute("mode", mode.into())
    }

    pub fn set_secret_type(&mut self, secret_type: impl Into<String>) -> Result<()> {
        self.entity.set_attribute("secret_type", secret_type.into())
    }

    pub fn set_expiration(&mut self, expiration: DateTime<Utc>) -> Result<()> {
        self.entity.set_attribute(
            "expiration",
            expiration.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    pub fn set_payload(&mut self, payload: impl Into<SecretPayload>) -> Result<()> {
        self.entity.guard_mutation("payload")?;
        self.payload = Some(payload.into());
        Ok(())
    }

    pub fn set_payload_content_type(&mut self, content_type: impl Into<String>) -> Result<()> {
        self.entity
            .set_attribute("payload_content_type", content_type.into())
    }

    pub fn set_payload_content_encoding(&mut self, encoding: impl Into<String>) -> Result<()> {
        self.entity
            .set_attribute("payload_content_encoding", encoding.into())
    }

    /// Read any attribute by name; `payload` is returned in its wire form
    pub async fn get_attribute(&mut self, name: &str) -> Result<Option<Value>> {
        if name == "payload" {
            return Ok(self.payload().await?.map(|p| Value::String(p.to_wire())));
        }
        Ok(self.entity.get_attribute(name).await?.cloned())
    }

    /// Write any user-settable attribute by name
    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if name != "payload" {
            return self.entity.set_attribute(name, value);
        }
        self.entity.guard_mutation(name)?;
        self.payload = match value.into() {
            Value::Null => None,
            Value::String(s) => Some(SecretPayload::Text(s)),
            other => {
                return Err(Error::Payload(format!("invalid payload type: {other}")));
            }
        };
        Ok(())
    }

    /// Store the secret and return its new href
    pub async fn store(&mut self) -> Result<String> {
        self.entity.check_submittable()?;
        let body = self.request_body()?;
        self.entity.submit_body(Value::Object(body)).await
    }

    fn request_body(&self) -> Result<Map<String, Value>> {
        let payload = self
            .payload
            .as_ref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::Payload("Missing payload".to_string()))?;

        let mut body = self.entity.request_fields();
        let explicit = body.contains_key("payload_content_type")
            || body.contains_key("payload_content_encoding");

        body.insert("payload".to_string(), Value::String(payload.to_wire()));
        if !explicit {
            match payload {
                SecretPayload::Binary(_) => {
                    body.insert("payload_content_type".to_string(), OCTET_STREAM.into());
                    body.insert("payload_content_encoding".to_string(), "base64".into());
                }
                SecretPayload::Text(_) => {
                    body.insert("payload_content_type".to_string(), TEXT_PLAIN.into());
                }
            }
        }
        Ok(body)
    }

    /// Delete the secret from Barbican
    pub async fn delete(&mut self) -> Result<()> {
        self.entity.delete().await
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity.href() {
            Some(href) => write!(f, "Secret(secret_ref=\"{href}\")"),
            None => write!(
                f,
                "Secret(name=\"{}\")",
                self.entity.cached_str("name").unwrap_or_default()
            ),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("entity", &self.entity)
            .field("payload", &self.payload)
            .finish()
    }
}

#[async_trait]
impl Formatted for Secret {
    fn columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    async fn row(&mut self) -> Result<Vec<Option<String>>> {
        let content_types = self.content_types().await?.map(|types| {
            types
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(", ")
        });
        Ok(vec![
            self.secret_ref().map(str::to_string),
            self.entity.string("name").await?,
            self.entity.string("created").await?,
            self.entity.string("status").await?,
            content_types,
            self.entity.string("algorithm").await?,
            self.entity.string("bit_length").await?,
            self.entity.string("secret_type").await?,
            self.entity.string("mode").await?,
            self.entity.string("expiration").await?,
        ])
    }
}

/// Entity manager for secrets
#[derive(Clone)]
pub struct SecretManager {
    transport: Arc<dyn Transport>,
}

impl SecretManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Lazy handle to an existing secret; no request is made here
    pub fn get(&self, secret_ref: &str) -> Result<Secret> {
        tracing::debug!(secret_ref, "getting secret");
        validate_ref(secret_ref, SECRET.kind)?;
        Ok(Secret::lazy(self.transport.clone(), secret_ref))
    }

    /// Lazy handle whose payload will be requested as `content_type`
    pub fn get_as(&self, secret_ref: &str, content_type: &str) -> Result<Secret> {
        let mut secret = self.get(secret_ref)?;
        secret
            .entity
            .insert_default("payload_content_type", content_type);
        Ok(secret)
    }

    /// New, unsaved secret
    pub fn create(&self, new: NewSecret) -> Result<Secret> {
        let mut secret = Secret::new(self.transport.clone());
        let e = &mut secret.entity;
        e.set_optional("name", new.name)?;
        e.set_optional("algorithm", new.algorithm)?;
        e.set_optional("bit_length", new.bit_length)?;
        e.set_optional("mode", new.mode)?;
        if let Some(secret_type) = new.secret_type {
            e.set_attribute("secret_type", secret_type)?;
        }
        e.set_optional("payload_content_type", new.payload_content_type)?;
        e.set_optional("payload_content_encoding", new.payload_content_encoding)?;
        if let Some(expiration) = new.expiration {
            secret.set_expiration(expiration)?;
        }
        secret.payload = new.payload;
        Ok(secret)
    }

    pub async fn delete(&self, secret_ref: &str) -> Result<()> {
        let secret_ref = require_ref(secret_ref, SECRET.kind)?;
        validate_ref(secret_ref, SECRET.kind)?;
        tracing::info!(secret_ref, "deleting secret");
        self.transport.delete(secret_ref, None).await
    }

    /// One page of secrets, newest pages first as ordered by the server
    pub async fn list(&self, limit: u32, offset: u32) -> Result<Page<Secret>> {
        self.list_with(&ListQuery::new(limit, offset)).await
    }

    /// List with filters: `name`, `alg`, `mode`, `bits`
    pub async fn list_with(&self, query: &ListQuery) -> Result<Page<Secret>> {
        tracing::debug!(limit = query.limit, offset = query.offset, "listing secrets");
        self.page(COLLECTION, &query.to_pairs()).await
    }

    /// Follow a `previous`/`next` cursor; `None` yields an empty page
    pub async fn list_by_href(&self, href: Option<&str>) -> Result<Page<Secret>> {
        match href {
            Some(href) => self.page(href, &[]).await,
            None => Ok(Page::empty()),
        }
    }

    pub async fn total(&self) -> Result<u64> {
        fetch_total(self.transport.as_ref(), COLLECTION).await
    }

    async fn page(&self, href: &str, query: &[(String, String)]) -> Result<Page<Secret>> {
        fetch_page(self.transport.as_ref(), href, query, COLLECTION)
            .await?
            .try_map(|body| Secret::from_body(self.transport.clone(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;
    use serde_json::json;

    const HREF: &str = "http://localhost:9311/v1/secrets/8ff1b5c6-e0f4-4a5d-8a6e-8bbd4cc1b3a4";

    fn manager(transport: &Arc<RecordingTransport>) -> SecretManager {
        SecretManager::new(transport.clone())
    }

    fn remote_secret() -> Value {
        json!({
            "secret_ref": HREF,
            "name": "db-password",
            "status": "ACTIVE",
            "algorithm": "aes",
            "bit_length": 256,
            "mode": "cbc",
            "secret_type": "opaque",
            "created": "2015-03-23T20:12:44.474209",
            "content_types": { "default": "text/plain" }
        })
    }

    #[tokio::test]
    async fn test_store_text_payload() {
        let transport = RecordingTransport::new();
        transport.respond_post(COLLECTION, json!({ "secret_ref": HREF }));

        let mut secret = manager(&transport)
            .create(NewSecret::new("db-password", "hunter2"))
            .unwrap();
        let href = secret.store().await.unwrap();

        assert_eq!(href, HREF);
        assert_eq!(
            transport.last_body().unwrap(),
            json!({
                "name": "db-password",
                "secret_type": "opaque",
                "payload": "hunter2",
                "payload_content_type": "text/plain"
            })
        );
    }

    #[tokio::test]
    async fn test_store_binary_payload_is_base64_encoded() {
        let transport = RecordingTransport::new();
        transport.respond_post(COLLECTION, json!({ "secret_ref": HREF }));

        let mut secret = manager(&transport).create(NewSecret::default()).unwrap();
        secret.set_payload(vec![0u8, 1, 2, 255]).unwrap();
        secret.store().await.unwrap();

        let body = transport.last_body().unwrap();
        assert_eq!(body["payload"], "AAEC/w==");
        assert_eq!(body["payload_content_type"], "application/octet-stream");
        assert_eq!(body["payload_content_encoding"], "base64");
    }

    #[tokio::test]
    async fn test_explicit_content_type_is_passed_through() {
        let transport = RecordingTransport::new();
        transport.respond_post(COLLECTION, json!({ "secret_ref": HREF }));

        let mut secret = manager(&transport)
            .create(NewSecret {
                payload: Some("c2VjcmV0".into()),
                payload_content_type: Some("application/octet-stream".to_string()),
                payload_content_encoding: Some("base64".to_string()),
                ..Default::default()
            })
            .unwrap();
        secret.store().await.unwrap();

        let body = transport.last_body().unwrap();
        assert_eq!(body["payload"], "c2VjcmV0");
        assert_eq!(body["payload_content_type"], "application/octet-stream");
        assert_eq!(body["payload_content_encoding"], "base64");
    }

    #[tokio::test]
    async fn test_store_without_payload_fails() {
        let transport = RecordingTransport::new();
        let mut secret = manager(&transport).create(NewSecret::default()).unwrap();
        secret.set_payload("").unwrap();

        assert!(matches!(secret.store().await, Err(Error::Payload(_))));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_second_store_fails() {
        let transport = RecordingTransport::new();
        transport.respond_post(COLLECTION, json!({ "secret_ref": HREF }));
        let mut secret = manager(&transport)
            .create(NewSecret::new("a", "b"))
            .unwrap();
        secret.store().await.unwrap();

        assert!(matches!(
            secret.store().await,
            Err(Error::AlreadySubmitted { .. })
        ));
        assert!(matches!(
            secret.set_payload("other"),
            Err(Error::Immutable { .. })
        ));
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_get_is_lazy_and_validates_ref() {
        let transport = RecordingTransport::new();
        let secret = manager(&transport).get(HREF).unwrap();
        assert_eq!(secret.secret_ref(), Some(HREF));
        assert_eq!(secret.state(), EntityState::Submitted);
        assert_eq!(transport.request_count(), 0);

        assert!(matches!(
            manager(&transport).get("8ff1b5c6"),
            Err(Error::InvalidReference { .. })
        ));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_payload_is_fetched_with_default_content_type() {
        let transport = RecordingTransport::new();
        transport.respond_get(HREF, remote_secret());
        transport.respond_raw(&format!("{HREF}/payload"), b"hunter2");

        let mut secret = manager(&transport).get(HREF).unwrap();
        let payload = secret.payload().await.unwrap().cloned();

        assert_eq!(payload, Some(SecretPayload::Text("hunter2".to_string())));
        let raw = transport.requests().pop().unwrap();
        assert_eq!(raw.accept.as_deref(), Some("text/plain"));

        secret.payload().await.unwrap();
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_get_as_overrides_payload_content_type() {
        let transport = RecordingTransport::new();
        transport.respond_raw(&format!("{HREF}/payload"), &[0xde, 0xad]);

        let mut secret = manager(&transport)
            .get_as(HREF, "application/octet-stream")
            .unwrap();
        let payload = secret.payload().await.unwrap().cloned();

        assert_eq!(payload, Some(SecretPayload::Binary(vec![0xde, 0xad])));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_payload_without_content_type_fails() {
        let transport = RecordingTransport::new();
        transport.respond_get(HREF, json!({ "secret_ref": HREF, "name": "x" }));

        let mut secret = manager(&transport).get(HREF).unwrap();
        assert!(matches!(secret.payload().await, Err(Error::Payload(_))));
    }

    #[tokio::test]
    async fn test_typed_accessors_after_lazy_load() {
        let transport = RecordingTransport::new();
        transport.respond_get(HREF, remote_secret());

        let mut secret = manager(&transport).get(HREF).unwrap();
        assert_eq!(secret.name().await.unwrap().as_deref(), Some("db-password"));
        assert_eq!(secret.bit_length().await.unwrap(), Some(256));
        assert!(secret.created().await.unwrap().is_some());
        assert!(secret.expiration().await.unwrap().is_none());
        assert_eq!(transport.request_count(), 1);
        assert!(matches!(
            secret.set_name("renamed"),
            Err(Error::Immutable { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_builds_loaded_secrets() {
        let transport = RecordingTransport::new();
        transport.respond_get(
            COLLECTION,
            json!({ "secrets": [remote_secret()], "total": 1 }),
        );

        let mut page = manager(&transport)
            .list_with(&ListQuery::new(5, 0).filter("name", "db-password"))
            .await
            .unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page.total, Some(1));
        assert!(page.next.is_none());
        let secret = &mut page.items[0];
        assert!(secret.is_loaded());
        assert_eq!(secret.status().await.unwrap().as_deref(), Some("ACTIVE"));
        assert_eq!(transport.request_count(), 1);

        let query = &transport.requests()[0].query;
        assert!(query.contains(&("name".to_string(), "db-password".to_string())));
    }

    #[tokio::test]
    async fn test_list_by_href_none_is_empty() {
        let transport = RecordingTransport::new();
        let page = manager(&transport).list_by_href(None).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_requires_ref() {
        let transport = RecordingTransport::new();
        assert!(matches!(
            manager(&transport).delete("").await,
            Err(Error::MissingReference { .. })
        ));
        manager(&transport).delete(HREF).await.unwrap();
        assert_eq!(transport.deleted(), vec![HREF.to_string()]);
    }

    #[test]
    fn test_display() {
        let transport = RecordingTransport::new();
        let secret = manager(&transport)
            .create(NewSecret::new("db-password", "x"))
            .unwrap();
        assert_eq!(secret.to_string(), "Secret(name=\"db-password\")");
        assert_eq!(
            manager(&transport).get(HREF).unwrap().to_string(),
            format!("Secret(secret_ref=\"{HREF}\")")
        );
    }

    #[test]
    fn test_payload_debug_is_redacted() {
        let payload = SecretPayload::from("hunter2");
        assert_eq!(format!("{payload:?}"), "Text(<7 bytes>)");
    }
}
