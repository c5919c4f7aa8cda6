//! Scripted transport for unit tests

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::{Query, Transport};

/// One request seen by [`RecordingTransport`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub href: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub accept: Option<String>,
}

/// Transport that answers from canned responses and records every call
#[derive(Default)]
pub struct RecordingTransport {
    gets: Mutex<HashMap<String, Value>>,
    raws: Mutex<HashMap<String, Vec<u8>>>,
    posts: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond_get(&self, href: &str, body: Value) {
        self.gets.lock().insert(href.to_string(), body);
    }

    pub fn respond_raw(&self, href: &str, body: &[u8]) {
        self.raws.lock().insert(href.to_string(), body.to_vec());
    }

    pub fn respond_post(&self, href: &str, body: Value) {
        self.posts.lock().insert(href.to_string(), body);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_body(&self) -> Option<Value> {
        self.requests.lock().iter().rev().find_map(|r| r.body.clone())
    }

    pub fn deleted(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == "DELETE")
            .map(|r| r.href.clone())
            .collect()
    }

    fn record(&self, method: &'static str, href: &str, query: &Query, body: Option<&Value>) {
        self.requests.lock().push(RecordedRequest {
            method,
            href: href.to_string(),
            query: query.to_vec(),
            body: body.cloned(),
            accept: None,
        });
    }
}

fn not_found(href: &str) -> Error {
    Error::from_status(404, href, "Not Found")
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn get(&self, href: &str, query: &Query) -> Result<Value> {
        self.record("GET", href, query, None);
        self.gets.lock().get(href).cloned().ok_or_else(|| not_found(href))
    }

    async fn get_raw(&self, href: &str, accept: &str) -> Result<Vec<u8>> {
        self.requests.lock().push(RecordedRequest {
            method: "GET",
            href: href.to_string(),
            query: Vec::new(),
            body: None,
            accept: Some(accept.to_string()),
        });
        self.raws.lock().get(href).cloned().ok_or_else(|| not_found(href))
    }

    async fn post(&self, href: &str, body: &Value) -> Result<Value> {
        self.record("POST", href, &[], Some(body));
        self.posts.lock().get(href).cloned().ok_or_else(|| not_found(href))
    }

    async fn delete(&self, href: &str, body: Option<&Value>) -> Result<()> {
        self.record("DELETE", href, &[], body);
        Ok(())
    }
}
