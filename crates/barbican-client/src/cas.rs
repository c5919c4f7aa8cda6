//! Certificate authorities the service is configured to use
//!
//! CAs are read-only. Their `name` and `description` arrive as a `meta` list
//! of single-key objects, e.g. `[{"name": "Dogtag CA"}, {"description": "…"}]`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::entity::{flat_object, EntitySchema, EntityState, RemoteEntity};
use crate::error::{Error, Result};
use crate::formatter::Formatted;
use crate::pagination::{fetch_page, fetch_total, ListQuery, Page};
use crate::reference::validate_ref;
use crate::transport::Transport;

pub(crate) const COLLECTION: &str = "cas";

static CA_SCHEMA: EntitySchema = EntitySchema {
    kind: "CA",
    collection: COLLECTION,
    ref_key: "ca_ref",
    settable: &[],
    generated: &[
        "ca_ref",
        "name",
        "description",
        "expiration",
        "plugin_name",
        "plugin_ca_id",
        "created",
        "updated",
        "status",
        "creator_id",
    ],
    normalize: flatten_meta_list,
};

const COLUMNS: &[&str] = &[
    "CA href",
    "Name",
    "Description",
    "Created",
    "Updated",
    "Status",
    "Plugin Name",
    "Plugin CA ID",
    "Expiration",
];

fn flatten_meta_list(body: Value) -> Result<Map<String, Value>> {
    let mut map = flat_object(body)?;
    if let Some(Value::Array(entries)) = map.remove("meta") {
        for entry in entries {
            if let Value::Object(pair) = entry {
                map.extend(pair);
            }
        }
    }
    Ok(map)
}

/// A certificate authority or sub-CA
pub struct CA {
    entity: RemoteEntity,
}

impl CA {
    fn lazy(transport: Arc<dyn Transport>, ca_ref: impl Into<String>) -> Self {
        Self {
            entity: RemoteEntity::lazy(&CA_SCHEMA, transport, ca_ref),
        }
    }

    /// List entries are either bare hrefs or full representations
    fn from_list_item(transport: Arc<dyn Transport>, item: Value) -> Result<Self> {
        match item {
            Value::String(ca_ref) => Ok(Self::lazy(transport, ca_ref)),
            body @ Value::Object(_) => Ok(Self {
                entity: RemoteEntity::from_body(&CA_SCHEMA, transport, body)?,
            }),
            other => Err(Error::InvalidResponse(format!(
                "unexpected CA list entry: {other}"
            ))),
        }
    }

    pub fn ca_ref(&self) -> Option<&str> {
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

    pub async fn description(&mut self) -> Result<Option<String>> {
        self.entity.string("description").await
    }

    pub async fn expiration(&mut self) -> Result<Option<DateTime<Utc>>> {
        self.entity.timestamp("expiration").await
    }

    pub async fn plugin_name(&mut self) -> Result<Option<String>> {
        self.entity.string("plugin_name").await
    }

    pub async fn plugin_ca_id(&mut self) -> Result<Option<String>> {
        self.entity.string("plugin_ca_id").await
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

    pub async fn get_attribute(&mut self, name: &str) -> Result<Option<Value>> {
        Ok(self.entity.get_attribute(name).await?.cloned())
    }
}

impl fmt::Display for CA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity.href() {
            Some(href) => write!(f, "CA(ca_ref=\"{href}\")"),
            None => write!(
                f,
                "CA(name=\"{}\")",
                self.entity.cached_str("name").unwrap_or_default()
            ),
        }
    }
}

impl fmt::Debug for CA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CA").field(&self.entity).finish()
    }
}

#[async_trait]
impl Formatted for CA {
    fn columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    async fn row(&mut self) -> Result<Vec<Option<String>>> {
        let e = &mut self.entity;
        Ok(vec![
            e.href().map(str::to_string),
            e.string("name").await?,
            e.string("description").await?,
            e.string("created").await?,
            e.string("updated").await?,
            e.string("status").await?,
            e.string("plugin_name").await?,
            e.string("plugin_ca_id").await?,
            e.string("expiration").await?,
        ])
    }
}

/// Entity manager for certificate authorities
#[derive(Clone)]
pub struct CAManager {
    transport: Arc<dyn Transport>,
}

impl CAManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Lazy handle to an existing CA; no request is made here
    pub fn get(&self, ca_ref: &str) -> Result<CA> {
        tracing::debug!(ca_ref, "getting CA");
        validate_ref(ca_ref, "CA")?;
        Ok(CA::lazy(self.transport.clone(), ca_ref))
    }

    pub async fn list(&self, limit: u32, offset: u32) -> Result<Page<CA>> {
        self.list_with(&ListQuery::new(limit, offset)).await
    }

    /// List with an optional `name` filter
    pub async fn list_with(&self, query: &ListQuery) -> Result<Page<CA>> {
        tracing::debug!(limit = query.limit, offset = query.offset, "listing CAs");
        self.page(COLLECTION, &query.to_pairs()).await
    }

    pub async fn list_by_href(&self, href: Option<&str>) -> Result<Page<CA>> {
        match href {
            Some(href) => self.page(href, &[]).await,
            None => Ok(Page::empty()),
        }
    }

    pub async fn total(&self) -> Result<u64> {
        fetch_total(self.transport.as_ref(), COLLECTION).await
    }

    async fn page(&self, href: &str, query: &[(String, String)]) -> Result<Page<CA>> {
        fetch_page(self.transport.as_ref(), href, query, COLLECTION)
            .await?
            .try_map(|item| CA::from_list_item(self.transport.clone(), item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingTransport;
    use serde_json::json;

    const CA_REF: &str = "http://localhost:9311/v1/cas/5a4b3ab6-0bf9-4a4b-8d2c-5c1c2a1c9e77";

    fn ca_body() -> Value {
        json!({
            "ca_ref": CA_REF,
            "plugin_name": "barbican.plugin.dogtag",
            "plugin_ca_id": "Dogtag CA",
            "status": "ACTIVE",
            "expiration": "2025-05-28T17:54:37.912938",
            "meta": [
                { "name": "Dogtag CA" },
                { "description": "Certificate Authority - Dogtag CA" }
            ]
        })
    }

    #[tokio::test]
    async fn test_get_is_lazy() {
        let transport = RecordingTransport::new();
        transport.respond_get(CA_REF, ca_body());

        let mut ca = CAManager::new(transport.clone()).get(CA_REF).unwrap();
        assert_eq!(transport.request_count(), 0);
        assert_eq!(ca.to_string(), format!("CA(ca_ref=\"{CA_REF}\")"));

        assert_eq!(ca.name().await.unwrap().as_deref(), Some("Dogtag CA"));
        assert_eq!(
            ca.description().await.unwrap().as_deref(),
            Some("Certificate Authority - Dogtag CA")
        );
        assert!(ca.expiration().await.unwrap().is_some());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_list_returns_lazy_cas() {
        let transport = RecordingTransport::new();
        transport.respond_get(COLLECTION, json!({ "cas": [CA_REF], "total": 1 }));

        let page = CAManager::new(transport.clone())
            .list_with(&ListQuery::new(10, 0).filter("name", "Dogtag CA"))
            .await
            .unwrap();

        assert_eq!(page.len(), 1);
        assert_eq!(page.items[0].ca_ref(), Some(CA_REF));
        assert!(!page.items[0].is_loaded());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_row_loads_once() {
        let transport = RecordingTransport::new();
        transport.respond_get(CA_REF, ca_body());

        let mut ca = CAManager::new(transport.clone()).get(CA_REF).unwrap();
        let row = ca.row().await.unwrap();
        assert_eq!(row[1].as_deref(), Some("Dogtag CA"));
        assert_eq!(row[6].as_deref(), Some("barbican.plugin.dogtag"));
        assert_eq!(row[3], None);
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_get_rejects_bad_ref() {
        let transport = RecordingTransport::new();
        assert!(matches!(
            CAManager::new(transport).get("cas/123"),
            Err(Error::InvalidReference { .. })
        ));
    }
}
