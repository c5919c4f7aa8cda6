//! Lazy remote entity
//!
//! [`RemoteEntity`] is the shared core behind every typed wrapper. It keeps a
//! local cache of attribute values, fetches the full representation at most
//! once when an unknown attribute is read, and refuses mutation once the
//! entity has been stored on the server.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Lifecycle of a client-side entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Under construction, no href yet
    Building,
    /// Persisted on the server; attributes not fetched yet
    Submitted,
    /// Full representation fetched and cached
    Loaded,
    /// Deleted through this object
    Deleted,
}

/// Static description of one entity variant
#[derive(Debug)]
pub struct EntitySchema {
    /// Display name used in errors and `Display`
    pub kind: &'static str,
    /// Collection path the entity is POSTed to
    pub collection: &'static str,
    /// Response key carrying the new href (`secret_ref`, `order_ref`, ...)
    pub ref_key: &'static str,
    /// Attributes the caller may set before submission
    pub settable: &'static [&'static str],
    /// Attributes only the server assigns
    pub generated: &'static [&'static str],
    /// Flattens a GET body into the attribute map
    pub normalize: fn(Value) -> Result<Map<String, Value>>,
}

impl EntitySchema {
    pub fn is_settable(&self, name: &str) -> bool {
        self.settable.contains(&name)
    }

    pub fn is_generated(&self, name: &str) -> bool {
        self.generated.contains(&name)
    }

    pub fn knows(&self, name: &str) -> bool {
        self.is_settable(name) || self.is_generated(name)
    }
}

/// Identity normaliser for bodies that are already flat objects
pub fn flat_object(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidResponse(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// A remote resource with a lazily filled attribute cache
pub struct RemoteEntity {
    schema: &'static EntitySchema,
    transport: Arc<dyn Transport>,
    href: Option<String>,
    fields: Map<String, Value>,
    loaded: bool,
    state: EntityState,
}

impl RemoteEntity {
    /// New entity in `Building` state
    pub fn new(schema: &'static EntitySchema, transport: Arc<dyn Transport>) -> Self {
        Self {
            schema,
            transport,
            href: None,
            fields: Map::new(),
            loaded: false,
            state: EntityState::Building,
        }
    }

    /// Wrapper around an existing href; nothing is fetched until a read needs it
    pub fn lazy(
        schema: &'static EntitySchema,
        transport: Arc<dyn Transport>,
        href: impl Into<String>,
    ) -> Self {
        let href = href.into();
        let mut fields = Map::new();
        fields.insert(schema.ref_key.to_string(), Value::String(href.clone()));
        Self {
            schema,
            transport,
            href: Some(href),
            fields,
            loaded: false,
            state: EntityState::Submitted,
        }
    }

    /// Entity built from a full representation already in hand
    pub fn from_body(
        schema: &'static EntitySchema,
        transport: Arc<dyn Transport>,
        body: Value,
    ) -> Result<Self> {
        let fields = (schema.normalize)(body)?;
        let href = fields
            .get(schema.ref_key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::missing_field(schema.ref_key))?;
        Ok(Self {
            schema,
            transport,
            href: Some(href),
            fields,
            loaded: true,
            state: EntityState::Loaded,
        })
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Cached value without triggering a fetch
    pub fn cached(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Cached value rendered as a string
    pub fn cached_str(&self, name: &str) -> Option<String> {
        self.cached(name).map(value_to_string)
    }

    /// Read an attribute, fetching the remote representation once if needed
    pub async fn get_attribute(&mut self, name: &str) -> Result<Option<&Value>> {
        if !self.schema.knows(name) {
            return Err(self.unknown(name));
        }
        if !self.fields.contains_key(name) {
            self.ensure_loaded().await?;
        }
        Ok(self.cached(name))
    }

    /// Fetch and merge the remote representation unless already done
    pub async fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded || self.state == EntityState::Deleted {
            return Ok(());
        }
        let Some(href) = self.href.clone() else {
            return Ok(());
        };

        tracing::debug!(kind = self.schema.kind, href = %href, "loading entity");
        let body = self.transport.get(&href, &[]).await?;
        let remote = (self.schema.normalize)(body)?;
        self.fields.extend(remote);
        self.loaded = true;
        self.state = EntityState::Loaded;
        Ok(())
    }

    /// Check that `name` may be written in the current state
    pub fn guard_mutation(&self, name: &str) -> Result<()> {
        if self.schema.is_generated(name) {
            return Err(Error::ReadOnlyAttribute {
                attribute: name.to_string(),
            });
        }
        if !self.schema.is_settable(name) {
            return Err(self.unknown(name));
        }
        if self.state != EntityState::Building {
            return Err(Error::Immutable {
                attribute: name.to_string(),
            });
        }
        Ok(())
    }

    /// Store a value locally; `null` clears the attribute
    pub fn set_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.guard_mutation(name)?;
        let value = value.into();
        if value.is_null() {
            self.fields.remove(name);
        } else {
            self.fields.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Set or clear an optional attribute
    pub fn set_optional<V: Into<Value>>(&mut self, name: &str, value: Option<V>) -> Result<()> {
        match value {
            Some(v) => self.set_attribute(name, v),
            None => self.set_attribute(name, Value::Null),
        }
    }

    /// User-settable fields that carry a value, for request bodies
    pub fn request_fields(&self) -> Map<String, Value> {
        self.schema
            .settable
            .iter()
            .filter_map(|name| {
                self.fields
                    .get(*name)
                    .filter(|v| is_present(v))
                    .map(|v| (name.to_string(), v.clone()))
            })
            .collect()
    }

    /// Seed a settable field before the caller touches the entity
    pub(crate) fn insert_default(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Fail unless the entity can still be stored
    pub fn check_submittable(&self) -> Result<()> {
        match (self.state, &self.href) {
            (EntityState::Building, _) => Ok(()),
            (_, Some(href)) => Err(Error::AlreadySubmitted { href: href.clone() }),
            (state, None) => Err(Error::InvalidState(format!(
                "{} cannot be stored from state {state:?}",
                self.schema.kind
            ))),
        }
    }

    /// POST `body` to the collection and record the returned href
    pub async fn submit_body(&mut self, body: Value) -> Result<String> {
        self.check_submittable()?;

        tracing::debug!(kind = self.schema.kind, "Request body: {}", body);
        let response = self.transport.post(self.schema.collection, &body).await?;
        let href = response
            .get(self.schema.ref_key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::missing_field(self.schema.ref_key))?;

        self.fields
            .insert(self.schema.ref_key.to_string(), Value::String(href.clone()));
        self.href = Some(href.clone());
        self.state = EntityState::Submitted;
        Ok(href)
    }

    /// DELETE the remote resource and drop the href
    pub async fn delete(&mut self) -> Result<()> {
        let Some(href) = self.href.clone() else {
            return Err(Error::NotStored {
                entity: self.schema.kind.to_string(),
            });
        };
        tracing::info!(kind = self.schema.kind, href = %href, "deleting entity");
        self.transport.delete(&href, None).await?;
        self.href = None;
        self.fields.remove(self.schema.ref_key);
        self.state = EntityState::Deleted;
        Ok(())
    }

    /// String attribute (lazy)
    pub async fn string(&mut self, name: &str) -> Result<Option<String>> {
        Ok(self.get_attribute(name).await?.map(value_to_string))
    }

    /// Integer attribute (lazy); numeric strings are accepted
    pub async fn integer(&mut self, name: &str) -> Result<Option<u64>> {
        match self.get_attribute(name).await? {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_u64()),
            Some(Value::String(s)) => s
                .parse()
                .map(Some)
                .map_err(|_| Error::InvalidResponse(format!("'{name}' is not an integer: {s}"))),
            Some(other) => Err(Error::InvalidResponse(format!(
                "'{name}' is not an integer: {other}"
            ))),
        }
    }

    /// ISO-8601 timestamp attribute (lazy)
    pub async fn timestamp(&mut self, name: &str) -> Result<Option<DateTime<Utc>>> {
        match self.get_attribute(name).await? {
            None => Ok(None),
            Some(Value::String(s)) => parse_timestamp(s)
                .map(Some)
                .ok_or_else(|| Error::InvalidResponse(format!("'{name}' is not a timestamp: {s}"))),
            Some(other) => Err(Error::InvalidResponse(format!(
                "'{name}' is not a timestamp: {other}"
            ))),
        }
    }

    fn unknown(&self, name: &str) -> Error {
        Error::UnknownAttribute {
            entity: self.schema.kind.to_string(),
            attribute: name.to_string(),
        }
    }
}

impl std::fmt::Debug for RemoteEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEntity")
            .field("kind", &self.schema.kind)
            .field("href", &self.href)
            .field("state", &self.state)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}

/// Whether a value should be sent in a request body
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Render a JSON value for display: strings unquoted, everything else as JSON
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse RFC 3339 or a naive ISO-8601 timestamp (taken as UTC)
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing::RecordingTransport;
    use serde_json::json;

    pub(crate) static WIDGET: EntitySchema = EntitySchema {
        kind: "Widget",
        collection: "widgets",
        ref_key: "widget_ref",
        settable: &["name", "size"],
        generated: &["widget_ref", "status", "created"],
        normalize: flat_object,
    };

    const HREF: &str = "http://localhost:9311/v1/widgets/d0460cc4-2876-4493-b7de-fc5c812883cc";

    fn remote_body() -> Value {
        json!({
            "widget_ref": HREF,
            "name": "remote",
            "size": 3,
            "status": "ACTIVE",
            "created": "2014-10-21T17:15:50.824202"
        })
    }

    #[tokio::test]
    async fn test_building_entity_never_fetches() {
        let transport = RecordingTransport::new();
        let mut entity = RemoteEntity::new(&WIDGET, transport.clone());

        assert_eq!(entity.state(), EntityState::Building);
        assert!(entity.get_attribute("name").await.unwrap().is_none());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_first_read_fetches_once() {
        let transport = RecordingTransport::new();
        transport.respond_get(HREF, remote_body());
        let mut entity = RemoteEntity::lazy(&WIDGET, transport.clone(), HREF);

        assert_eq!(entity.string("name").await.unwrap().as_deref(), Some("remote"));
        assert_eq!(transport.request_count(), 1);

        assert_eq!(entity.string("status").await.unwrap().as_deref(), Some("ACTIVE"));
        assert_eq!(entity.integer("size").await.unwrap(), Some(3));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(entity.state(), EntityState::Loaded);
    }

    #[tokio::test]
    async fn test_missing_attribute_after_load_does_not_refetch() {
        let transport = RecordingTransport::new();
        transport.respond_get(HREF, json!({ "widget_ref": HREF }));
        let mut entity = RemoteEntity::lazy(&WIDGET, transport.clone(), HREF);

        assert!(entity.get_attribute("name").await.unwrap().is_none());
        assert!(entity.get_attribute("status").await.unwrap().is_none());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_lazy_load_of_missing_resource_is_not_found() {
        let transport = RecordingTransport::new();
        let mut entity = RemoteEntity::lazy(&WIDGET, transport, HREF);

        let err = entity.get_attribute("name").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_attribute_is_rejected() {
        let transport = RecordingTransport::new();
        let mut entity = RemoteEntity::new(&WIDGET, transport);

        assert!(matches!(
            entity.get_attribute("colour").await,
            Err(Error::UnknownAttribute { .. })
        ));
        assert!(matches!(
            entity.set_attribute("colour", "red"),
            Err(Error::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_generated_fields_are_never_settable() {
        let transport = RecordingTransport::new();
        let mut building = RemoteEntity::new(&WIDGET, transport.clone());
        assert!(matches!(
            building.set_attribute("status", "ACTIVE"),
            Err(Error::ReadOnlyAttribute { .. })
        ));

        let mut loaded = RemoteEntity::from_body(&WIDGET, transport, remote_body()).unwrap();
        assert!(matches!(
            loaded.set_attribute("created", "now"),
            Err(Error::ReadOnlyAttribute { .. })
        ));
    }

    #[tokio::test]
    async fn test_submit_records_href_and_locks_entity() {
        let transport = RecordingTransport::new();
        transport.respond_post("widgets", json!({ "widget_ref": HREF }));
        let mut entity = RemoteEntity::new(&WIDGET, transport.clone());
        entity.set_attribute("name", "w").unwrap();
        entity.set_attribute("size", Value::Null).unwrap();

        let body = Value::Object(entity.request_fields());
        let href = entity.submit_body(body).await.unwrap();

        assert_eq!(href, HREF);
        assert_eq!(entity.href(), Some(HREF));
        assert_eq!(entity.state(), EntityState::Submitted);
        assert_eq!(transport.last_body().unwrap(), json!({ "name": "w" }));
        assert!(matches!(
            entity.set_attribute("name", "x"),
            Err(Error::Immutable { .. })
        ));

        let again = entity.submit_body(json!({})).await;
        assert!(matches!(again, Err(Error::AlreadySubmitted { .. })));
    }

    #[tokio::test]
    async fn test_submit_without_ref_in_response_fails() {
        let transport = RecordingTransport::new();
        transport.respond_post("widgets", json!({}));
        let mut entity = RemoteEntity::new(&WIDGET, transport);

        let result = entity.submit_body(json!({})).await;
        assert!(matches!(result, Err(Error::InvalidResponse(_))));
        assert_eq!(entity.state(), EntityState::Building);
    }

    #[tokio::test]
    async fn test_delete_moves_to_deleted() {
        let transport = RecordingTransport::new();
        let mut entity = RemoteEntity::from_body(&WIDGET, transport.clone(), remote_body()).unwrap();

        entity.delete().await.unwrap();

        assert_eq!(entity.state(), EntityState::Deleted);
        assert!(entity.href().is_none());
        assert_eq!(transport.deleted(), vec![HREF.to_string()]);
        assert!(matches!(
            entity.set_attribute("name", "x"),
            Err(Error::Immutable { .. })
        ));
        assert!(matches!(
            entity.submit_body(json!({})).await,
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(entity.delete().await, Err(Error::NotStored { .. })));
    }

    #[test]
    fn test_request_fields_skip_empty_strings() {
        let transport = RecordingTransport::new();
        let mut entity = RemoteEntity::new(&WIDGET, transport);
        entity.set_attribute("name", "").unwrap();
        entity.set_attribute("size", 0).unwrap();

        let fields = entity.request_fields();
        assert!(!fields.contains_key("name"));
        assert_eq!(fields.get("size"), Some(&json!(0)));
    }

    #[test]
    fn test_parse_timestamp() {
        let naive = parse_timestamp("2014-10-21T17:15:50.824202").unwrap();
        assert_eq!(naive.to_rfc3339(), "2014-10-21T17:15:50.824202+00:00");

        let zoned = parse_timestamp("2015-02-28T19:14:44Z").unwrap();
        assert_eq!(zoned.timestamp(), 1425150884);

        assert!(parse_timestamp("yesterday").is_none());
    }
}
