//! In-memory Barbican service for functional tests
//!
//! [`MockBarbican`] implements the client's [`Transport`] trait directly, so
//! requests never leave the process. It keeps secrets, orders, containers and
//! CAs in memory and answers with the same JSON shapes as the real API:
//! `<type>_ref` hrefs, `limit`/`offset` paging with `previous`/`next` links,
//! and 404s for anything it does not hold.
//!
//! Orders complete immediately: a key order generates a secret, asymmetric
//! and certificate orders generate a container of secrets.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use barbican_client::{
    Client, ContainerType, Error, Query, Result, Transport, CERTIFICATE, PRIVATE_KEY,
    PRIVATE_KEY_PASSPHRASE, PUBLIC_KEY,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Endpoint the mock pretends to live at
pub const MOCK_ENDPOINT: &str = "http://barbican.test:9311";
const API_VERSION: &str = "v1";

const SECRETS: &str = "secrets";
const ORDERS: &str = "orders";
const CONTAINERS: &str = "containers";
const CAS: &str = "cas";

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;
const CREATOR_ID: &str = "mock-user";
const OCTET_STREAM: &str = "application/octet-stream";

/// A stored resource and its creation sequence, used for list order
struct Record {
    seq: u64,
    body: Value,
}

struct StoredPayload {
    content_type: String,
    bytes: Vec<u8>,
}

/// Mock Barbican service that tracks every resource and request
pub struct MockBarbican {
    secrets: DashMap<String, Record>,
    /// Secret id -> decoded payload
    payloads: DashMap<String, StoredPayload>,
    orders: DashMap<String, Record>,
    containers: DashMap<String, Record>,
    cas: DashMap<String, Record>,
    sequence: AtomicU64,
    get_count: AtomicU64,
    post_count: AtomicU64,
    delete_count: AtomicU64,
    /// Whether every request fails with a 500
    fail_requests: AtomicBool,
    /// Whether new orders end in the ERROR state
    reject_orders: AtomicBool,
}

impl MockBarbican {
    /// Create a new, empty mock service
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Client whose managers all talk to this mock
    pub fn client(self: &Arc<Self>) -> Client {
        Client::with_transport(self.clone())
    }

    /// Versioned API root, e.g. `http://barbican.test:9311/v1`
    pub fn base_url() -> String {
        format!("{MOCK_ENDPOINT}/{API_VERSION}")
    }

    /// Register a CA and return its href
    pub fn add_ca(&self, name: &str, description: &str) -> String {
        let (ca_ref, id) = new_ref(CAS);
        let now = timestamp();
        let expiration = (Utc::now() + chrono::Duration::days(365))
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();
        let body = json!({
            "ca_ref": ca_ref,
            "plugin_name": "barbican.plugin.mock",
            "plugin_ca_id": name,
            "status": "ACTIVE",
            "expiration": expiration,
            "created": now,
            "updated": now,
            "creator_id": CREATOR_ID,
            "meta": [{ "name": name }, { "description": description }]
        });
        self.insert(CAS, &id, body);
        ca_ref
    }

    /// Whether the resource behind `href` exists
    pub fn contains(&self, href: &str) -> bool {
        match route(href) {
            Some((segments, _)) => match segments.as_slice() {
                [collection, id] => self.table(collection).is_some_and(|t| t.contains_key(*id)),
                _ => false,
            },
            None => false,
        }
    }

    /// Decoded payload of a stored secret (for test assertions)
    pub fn stored_payload(&self, secret_ref: &str) -> Option<Vec<u8>> {
        let id = secret_ref.trim_end_matches('/').rsplit('/').next()?;
        self.payloads.get(id).map(|p| p.bytes.clone())
    }

    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn get_count(&self) -> u64 {
        self.get_count.load(Ordering::SeqCst)
    }

    pub fn post_count(&self) -> u64 {
        self.post_count.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> u64 {
        self.delete_count.load(Ordering::SeqCst)
    }

    /// Requests of any method seen so far
    pub fn request_count(&self) -> u64 {
        self.get_count() + self.post_count() + self.delete_count()
    }

    /// Reset the request counters without touching stored resources
    pub fn reset_counts(&self) {
        self.get_count.store(0, Ordering::SeqCst);
        self.post_count.store(0, Ordering::SeqCst);
        self.delete_count.store(0, Ordering::SeqCst);
    }

    /// Configure mock to answer every request with a 500
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Configure mock to put new orders in the ERROR state
    pub fn set_reject_orders(&self, reject: bool) {
        self.reject_orders.store(reject, Ordering::SeqCst);
    }

    /// Drop every stored resource (useful between tests)
    pub fn clear(&self) {
        self.secrets.clear();
        self.payloads.clear();
        self.orders.clear();
        self.containers.clear();
        self.cas.clear();
    }

    fn table(&self, collection: &str) -> Option<&DashMap<String, Record>> {
        match collection {
            SECRETS => Some(&self.secrets),
            ORDERS => Some(&self.orders),
            CONTAINERS => Some(&self.containers),
            CAS => Some(&self.cas),
            _ => None,
        }
    }

    fn insert(&self, collection: &str, id: &str, body: Value) {
        if let Some(table) = self.table(collection) {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            table.insert(id.to_string(), Record { seq, body });
        }
    }

    fn check_available(&self, href: &str) -> Result<()> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(Error::from_status(500, href, "Simulated server failure"));
        }
        Ok(())
    }

    fn fetch(&self, href: &str, collection: &str, id: &str) -> Result<Value> {
        self.table(collection)
            .and_then(|table| table.get(id).map(|record| record.body.clone()))
            .ok_or_else(|| not_found(href))
    }

    fn list(&self, href: &str, collection: &str, query: &[(String, String)]) -> Result<Value> {
        let table = self.table(collection).ok_or_else(|| not_found(href))?;
        let limit = number_param(href, query, "limit", DEFAULT_LIMIT)?.min(MAX_LIMIT);
        let offset = number_param(href, query, "offset", 0)?;
        let filters: Vec<&(String, String)> = query
            .iter()
            .filter(|(key, _)| key != "limit" && key != "offset")
            .collect();

        let mut matching: Vec<(u64, Value)> = table
            .iter()
            .filter(|record| {
                filters
                    .iter()
                    .all(|(key, value)| matches_filter(&record.value().body, key, value))
            })
            .map(|record| (record.value().seq, record.value().body.clone()))
            .collect();
        matching.sort_by_key(|(seq, _)| *seq);

        let total = matching.len();
        let items: Vec<Value> = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, body)| list_item(collection, body))
            .collect();

        let mut response = Map::new();
        response.insert(collection.to_string(), Value::Array(items));
        response.insert("total".to_string(), json!(total));
        if limit > 0 {
            if offset > 0 {
                let previous = page_link(collection, limit, offset.saturating_sub(limit), &filters);
                response.insert("previous".to_string(), json!(previous));
            }
            if offset + limit < total {
                let next = page_link(collection, limit, offset + limit, &filters);
                response.insert("next".to_string(), json!(next));
            }
        }
        Ok(Value::Object(response))
    }

    fn create_secret(&self, href: &str, request: &Value) -> Result<Value> {
        let mut body = request
            .as_object()
            .cloned()
            .ok_or_else(|| bad_request(href, "Secret body must be an object"))?;
        let payload = body.remove("payload");
        let content_type = body.remove("payload_content_type");
        let encoding = body.remove("payload_content_encoding");
        let (secret_ref, id) = new_ref(SECRETS);

        if let Some(payload) = payload {
            let text = payload
                .as_str()
                .filter(|text| !text.is_empty())
                .ok_or_else(|| bad_request(href, "Payload must be a non-empty string"))?;
            let content_type = content_type
                .as_ref()
                .and_then(Value::as_str)
                .ok_or_else(|| bad_request(href, "Payload content type missing"))?
                .to_string();
            let bytes = match encoding.as_ref().and_then(Value::as_str) {
                Some("base64") => STANDARD
                    .decode(text)
                    .map_err(|_| bad_request(href, "Payload is not valid base64"))?,
                Some(other) => {
                    return Err(bad_request(
                        href,
                        format!("Unsupported content encoding: {other}"),
                    ))
                }
                None => text.as_bytes().to_vec(),
            };
            body.insert(
                "content_types".to_string(),
                json!({ "default": content_type }),
            );
            self.payloads
                .insert(id.clone(), StoredPayload { content_type, bytes });
        }

        body.entry("secret_type").or_insert_with(|| json!("opaque"));
        stamp(&mut body, "secret_ref", &secret_ref);
        tracing::debug!("MockBarbican: stored secret {}", secret_ref);
        self.insert(SECRETS, &id, Value::Object(body));
        Ok(json!({ "secret_ref": secret_ref }))
    }

    fn create_order(&self, href: &str, request: &Value) -> Result<Value> {
        let order_type = request
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| bad_request(href, "Order type missing"))?;
        if !matches!(order_type, "key" | "asymmetric" | "certificate") {
            return Err(bad_request(href, format!("Invalid order type: {order_type}")));
        }
        let meta = request
            .get("meta")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| bad_request(href, "Order meta missing"))?;

        let (order_ref, id) = new_ref(ORDERS);
        let mut body = Map::new();
        body.insert("type".to_string(), json!(order_type));
        stamp(&mut body, "order_ref", &order_ref);

        if self.reject_orders.load(Ordering::SeqCst) {
            body.insert("status".to_string(), json!("ERROR"));
            body.insert("error_status_code".to_string(), json!(400));
            body.insert("error_reason".to_string(), json!("Simulated order failure"));
        } else {
            match order_type {
                "key" => {
                    let secret_ref = self.generate_key(href, &meta)?;
                    body.insert("secret_ref".to_string(), json!(secret_ref));
                }
                "asymmetric" => {
                    let container_ref = self.generate_key_pair(href, &meta)?;
                    body.insert("container_ref".to_string(), json!(container_ref));
                }
                _ => {
                    let container_ref = self.generate_certificate(href, &meta)?;
                    body.insert("container_ref".to_string(), json!(container_ref));
                }
            }
            body.insert("sub_status".to_string(), json!("Unknown"));
            body.insert("sub_status_message".to_string(), json!("Unknown"));
        }
        body.insert("meta".to_string(), Value::Object(meta));

        tracing::debug!("MockBarbican: created {} order {}", order_type, order_ref);
        self.insert(ORDERS, &id, Value::Object(body));
        Ok(json!({ "order_ref": order_ref }))
    }

    fn generate_key(&self, href: &str, meta: &Map<String, Value>) -> Result<String> {
        let bits = meta.get("bit_length").and_then(Value::as_u64).unwrap_or(256);
        let content_type = meta
            .get("payload_content_type")
            .and_then(Value::as_str)
            .unwrap_or(OCTET_STREAM)
            .to_string();

        let mut fields = copy_fields(meta, &["name", "algorithm", "bit_length", "mode", "expiration"]);
        fields.insert("secret_type".to_string(), json!("symmetric"));
        fields.insert("payload_content_type".to_string(), json!(content_type));
        let material = key_material(bits as usize / 8, &content_type);
        self.generate_secret(href, fields, &material)
    }

    fn generate_key_pair(&self, href: &str, meta: &Map<String, Value>) -> Result<String> {
        let bits = meta.get("bit_length").and_then(Value::as_u64).unwrap_or(2048);
        let mut refs = Vec::new();

        for (slot, secret_type, label) in [
            (PRIVATE_KEY, "private", "PRIVATE KEY"),
            (PUBLIC_KEY, "public", "PUBLIC KEY"),
        ] {
            let mut fields = copy_fields(meta, &["name", "algorithm", "bit_length", "expiration"]);
            fields.insert("secret_type".to_string(), json!(secret_type));
            fields.insert("payload_content_type".to_string(), json!(OCTET_STREAM));
            let secret_ref = self.generate_secret(href, fields, pem(label, bits as usize / 8).as_bytes())?;
            refs.push((slot, secret_ref));
        }

        if let Some(pass_phrase) = meta.get("pass_phrase").and_then(Value::as_str) {
            let mut fields = copy_fields(meta, &["name"]);
            fields.insert("secret_type".to_string(), json!("passphrase"));
            fields.insert("payload_content_type".to_string(), json!("text/plain"));
            let secret_ref = self.generate_secret(href, fields, pass_phrase.as_bytes())?;
            refs.push((PRIVATE_KEY_PASSPHRASE, secret_ref));
        }

        self.generate_container(href, ContainerType::Rsa, meta.get("name"), refs)
    }

    fn generate_certificate(&self, href: &str, meta: &Map<String, Value>) -> Result<String> {
        if let Some(source) = meta.get("container_ref").and_then(Value::as_str) {
            if !self.contains(source) {
                return Err(bad_request(href, format!("Invalid container_ref: {source}")));
            }
        }

        let mut fields = copy_fields(meta, &["name"]);
        fields.insert("secret_type".to_string(), json!("certificate"));
        fields.insert("payload_content_type".to_string(), json!(OCTET_STREAM));
        let certificate = self.generate_secret(href, fields, pem("CERTIFICATE", 256).as_bytes())?;

        self.generate_container(
            href,
            ContainerType::Certificate,
            meta.get("name"),
            vec![(CERTIFICATE, certificate)],
        )
    }

    fn generate_secret(&self, href: &str, mut fields: Map<String, Value>, bytes: &[u8]) -> Result<String> {
        fields.insert("payload".to_string(), json!(STANDARD.encode(bytes)));
        fields.insert("payload_content_encoding".to_string(), json!("base64"));
        let response = self.create_secret(href, &Value::Object(fields))?;
        created_ref(href, &response, "secret_ref")
    }

    fn generate_container(
        &self,
        href: &str,
        container_type: ContainerType,
        name: Option<&Value>,
        refs: Vec<(&str, String)>,
    ) -> Result<String> {
        let secret_refs: Vec<Value> = refs
            .into_iter()
            .map(|(name, secret_ref)| json!({ "name": name, "secret_ref": secret_ref }))
            .collect();
        let mut request = json!({ "type": container_type.as_str(), "secret_refs": secret_refs });
        if let Some(name) = name {
            request["name"] = name.clone();
        }
        let response = self.create_container(href, &request)?;
        created_ref(href, &response, "container_ref")
    }

    fn create_container(&self, href: &str, request: &Value) -> Result<Value> {
        let container_type: ContainerType = request
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("generic")
            .parse()
            .map_err(|e: Error| bad_request(href, e.to_string()))?;
        let slots = container_type.slots();

        let refs = request
            .get("secret_refs")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for entry in &refs {
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| bad_request(href, "Secret reference name missing"))?;
            let secret_ref = entry
                .get("secret_ref")
                .and_then(Value::as_str)
                .ok_or_else(|| bad_request(href, "Secret reference href missing"))?;
            if !slots.is_empty() && !slots.contains(&name) {
                return Err(bad_request(
                    href,
                    format!("Invalid secret name for {container_type} container: {name}"),
                ));
            }
            if !self.contains(secret_ref) {
                return Err(Error::from_status(
                    404,
                    href,
                    format!("Secret provided for '{name}' doesn't exist"),
                ));
            }
        }

        let (container_ref, id) = new_ref(CONTAINERS);
        let mut body = Map::new();
        if let Some(name) = request.get("name") {
            body.insert("name".to_string(), name.clone());
        }
        body.insert("type".to_string(), json!(container_type.as_str()));
        body.insert("secret_refs".to_string(), Value::Array(refs));
        body.insert("consumers".to_string(), json!([]));
        stamp(&mut body, "container_ref", &container_ref);

        tracing::debug!("MockBarbican: stored {} container {}", container_type, container_ref);
        self.insert(CONTAINERS, &id, Value::Object(body));
        Ok(json!({ "container_ref": container_ref }))
    }

    fn register_consumer(&self, href: &str, id: &str, request: &Value) -> Result<Value> {
        let consumer = consumer(href, request)?;
        let mut record = self.containers.get_mut(id).ok_or_else(|| not_found(href))?;
        if let Some(consumers) = record.body.get_mut("consumers").and_then(Value::as_array_mut) {
            if !consumers.contains(&consumer) {
                consumers.push(consumer);
            }
        }
        record.body["updated"] = json!(timestamp());
        Ok(record.body.clone())
    }

    fn remove_consumer(&self, href: &str, id: &str, request: &Value) -> Result<()> {
        let consumer = consumer(href, request)?;
        let mut record = self.containers.get_mut(id).ok_or_else(|| not_found(href))?;
        let consumers = record
            .body
            .get_mut("consumers")
            .and_then(Value::as_array_mut)
            .ok_or_else(|| not_found(href))?;
        let before = consumers.len();
        consumers.retain(|c| c != &consumer);
        if consumers.len() == before {
            return Err(Error::from_status(404, href, "Consumer not found"));
        }
        Ok(())
    }

    fn remove(&self, href: &str, collection: &str, id: &str) -> Result<()> {
        let table = self.table(collection).ok_or_else(|| not_found(href))?;
        table.remove(id).ok_or_else(|| not_found(href))?;
        if collection == SECRETS {
            self.payloads.remove(id);
        }
        tracing::debug!("MockBarbican: deleted {} {}", collection, id);
        Ok(())
    }
}

impl Default for MockBarbican {
    fn default() -> Self {
        Self {
            secrets: DashMap::new(),
            payloads: DashMap::new(),
            orders: DashMap::new(),
            containers: DashMap::new(),
            cas: DashMap::new(),
            sequence: AtomicU64::new(1),
            get_count: AtomicU64::new(0),
            post_count: AtomicU64::new(0),
            delete_count: AtomicU64::new(0),
            fail_requests: AtomicBool::new(false),
            reject_orders: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for MockBarbican {
    async fn get(&self, href: &str, query: &Query) -> Result<Value> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.check_available(href)?;
        let (segments, mut params) = route(href).ok_or_else(|| not_found(href))?;
        params.extend(query.iter().cloned());

        match segments.as_slice() {
            [collection] => self.list(href, collection, &params),
            [collection, id] => self.fetch(href, collection, id),
            _ => Err(not_found(href)),
        }
    }

    async fn get_raw(&self, href: &str, accept: &str) -> Result<Vec<u8>> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.check_available(href)?;
        let (segments, _) = route(href).ok_or_else(|| not_found(href))?;

        match segments.as_slice() {
            [SECRETS, id, "payload"] => {
                if !self.secrets.contains_key(*id) {
                    return Err(not_found(href));
                }
                let payload = self
                    .payloads
                    .get(*id)
                    .ok_or_else(|| Error::from_status(404, href, "Secret has no payload"))?;
                if media_type(accept) != media_type(&payload.content_type) {
                    return Err(Error::from_status(406, href, "Wrong Content Type"));
                }
                Ok(payload.bytes.clone())
            }
            _ => Err(not_found(href)),
        }
    }

    async fn post(&self, href: &str, body: &Value) -> Result<Value> {
        self.post_count.fetch_add(1, Ordering::Relaxed);
        self.check_available(href)?;
        let (segments, _) = route(href).ok_or_else(|| not_found(href))?;

        match segments.as_slice() {
            [SECRETS] => self.create_secret(href, body),
            [ORDERS] => self.create_order(href, body),
            [CONTAINERS] => self.create_container(href, body),
            [CONTAINERS, id, "consumers"] => self.register_consumer(href, id, body),
            _ => Err(Error::from_status(405, href, "Method Not Allowed")),
        }
    }

    async fn delete(&self, href: &str, body: Option<&Value>) -> Result<()> {
        self.delete_count.fetch_add(1, Ordering::Relaxed);
        self.check_available(href)?;
        let (segments, _) = route(href).ok_or_else(|| not_found(href))?;

        match (segments.as_slice(), body) {
            ([CONTAINERS, id, "consumers"], Some(body)) => self.remove_consumer(href, id, body),
            ([collection, id], _) if *collection != CAS => self.remove(href, collection, id),
            _ => Err(Error::from_status(405, href, "Method Not Allowed")),
        }
    }
}

/// Path segments below the API root, plus any query string
fn route(href: &str) -> Option<(Vec<&str>, Vec<(String, String)>)> {
    let relative = if href.starts_with("http://") || href.starts_with("https://") {
        href.strip_prefix(MockBarbican::base_url().as_str())?
    } else {
        href
    };
    let (path, query) = relative.split_once('?').unwrap_or((relative, ""));
    let segments = path.split('/').filter(|s| !s.is_empty()).collect();
    let params = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Some((segments, params))
}

fn new_ref(collection: &str) -> (String, String) {
    let id = Uuid::new_v4().to_string();
    (format!("{}/{collection}/{id}", MockBarbican::base_url()), id)
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Server-generated fields every resource carries
fn stamp(body: &mut Map<String, Value>, ref_key: &str, href: &str) {
    let now = timestamp();
    body.insert(ref_key.to_string(), json!(href));
    body.insert("status".to_string(), json!("ACTIVE"));
    body.insert("created".to_string(), json!(now));
    body.insert("updated".to_string(), json!(now));
    body.insert("creator_id".to_string(), json!(CREATOR_ID));
}

fn not_found(href: &str) -> Error {
    Error::from_status(404, href, "Not Found")
}

fn bad_request(href: &str, message: impl Into<String>) -> Error {
    Error::from_status(400, href, message)
}

fn number_param(href: &str, query: &[(String, String)], key: &str, default: usize) -> Result<usize> {
    match query.iter().find(|(k, _)| k == key) {
        Some((_, value)) => value
            .parse()
            .map_err(|_| bad_request(href, format!("Invalid {key}: {value}"))),
        None => Ok(default),
    }
}

/// Compare a list filter against a body field; CA names live in `meta`
fn matches_filter(body: &Value, key: &str, expected: &str) -> bool {
    let field = match key {
        "alg" => "algorithm",
        "bits" => "bit_length",
        other => other,
    };
    let actual = body.get(field).or_else(|| {
        body.get("meta")?
            .as_array()?
            .iter()
            .find_map(|entry| entry.get(field))
    });
    match actual {
        Some(Value::String(s)) => s == expected,
        Some(Value::Number(n)) => n.to_string() == expected,
        _ => false,
    }
}

/// CA lists carry bare hrefs, the other collections full bodies
fn list_item(collection: &str, body: Value) -> Value {
    if collection == CAS {
        body.get("ca_ref").cloned().unwrap_or(Value::Null)
    } else {
        body
    }
}

fn page_link(collection: &str, limit: usize, offset: usize, filters: &[&(String, String)]) -> String {
    let mut link = format!(
        "{}/{collection}?limit={limit}&offset={offset}",
        MockBarbican::base_url()
    );
    for (key, value) in filters {
        link.push_str(&format!("&{key}={value}"));
    }
    link
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase()
}

fn copy_fields(meta: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| meta.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}

fn created_ref(href: &str, response: &Value, key: &str) -> Result<String> {
    response
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::from_status(500, href, format!("missing {key}")))
}

fn consumer(href: &str, request: &Value) -> Result<Value> {
    let name = request.get("name").and_then(Value::as_str);
    let url = request.get("URL").and_then(Value::as_str);
    match (name, url) {
        (Some(name), Some(url)) => Ok(json!({ "name": name, "URL": url })),
        _ => Err(bad_request(href, "Consumer needs a name and a URL")),
    }
}

/// Random bytes, hex-encoded when the content type is textual
fn key_material(len: usize, content_type: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(len);
    while bytes.len() < len {
        bytes.extend_from_slice(Uuid::new_v4().as_bytes());
    }
    bytes.truncate(len);
    if content_type.starts_with("text/") {
        bytes.iter().map(|b| format!("{b:02x}")).collect::<String>().into_bytes()
    } else {
        bytes
    }
}

fn pem(label: &str, len: usize) -> String {
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        STANDARD.encode(key_material(len, OCTET_STREAM))
    )
}
