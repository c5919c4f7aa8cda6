//! List queries and paged results
//!
//! List responses carry the items under a collection key plus optional
//! `previous`/`next` hrefs. A missing cursor marks the end of the list in
//! that direction.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Default page size used by the list helpers
pub const DEFAULT_LIMIT: u32 = 10;

/// `limit`/`offset` paging plus optional filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: u32,
    pub offset: u32,
    filters: Vec<(String, String)>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, 0)
    }
}

impl ListQuery {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit,
            offset,
            filters: Vec::new(),
        }
    }

    /// Add a filter parameter
    pub fn filter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push((key.into(), value.to_string()));
        self
    }

    /// Add a filter parameter when a value is present
    pub fn filter_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.filter(key, v),
            None => self,
        }
    }

    /// Query pairs in wire order: `limit`, `offset`, then filters
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("limit".to_string(), self.limit.to_string()),
            ("offset".to_string(), self.offset.to_string()),
        ];
        pairs.extend(self.filters.iter().cloned());
        pairs
    }
}

/// One page of a list response
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Href of the previous page, if any
    pub previous: Option<String>,
    /// Href of the next page, if any
    pub next: Option<String>,
    /// Total number of entities reported by the server
    pub total: Option<u64>,
}

impl<T> Page<T> {
    /// The page returned when there is no cursor to follow
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            previous: None,
            next: None,
            total: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// A list response before its items are turned into entities
pub(crate) struct RawPage {
    items: Vec<Value>,
    previous: Option<String>,
    next: Option<String>,
    total: Option<u64>,
}

impl RawPage {
    fn from_body(mut body: Value, key: &str) -> Self {
        let items = match body.get_mut(key).map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let cursor = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            items,
            previous: cursor("previous"),
            next: cursor("next"),
            total: body.get("total").and_then(Value::as_u64),
        }
    }

    /// Build entities in server order
    pub(crate) fn try_map<T>(self, f: impl FnMut(Value) -> Result<T>) -> Result<Page<T>> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_>>()?,
            previous: self.previous,
            next: self.next,
            total: self.total,
        })
    }
}

/// GET one page of a collection or cursor href
pub(crate) async fn fetch_page(
    transport: &dyn Transport,
    href: &str,
    query: &[(String, String)],
    key: &str,
) -> Result<RawPage> {
    let body = transport.get(href, query).await?;
    Ok(RawPage::from_body(body, key))
}

/// Count of entities in a collection, via a zero-length page
pub(crate) async fn fetch_total(transport: &dyn Transport, collection: &str) -> Result<u64> {
    let body = transport
        .get(collection, &ListQuery::new(0, 0).to_pairs())
        .await?;
    body.get("total")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::missing_field("total"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_start_with_paging() {
        let query = ListQuery::new(10, 5)
            .filter("name", "db-password")
            .filter_opt("bits", Some(256))
            .filter_opt::<&str>("mode", None);
        assert_eq!(
            query.to_pairs(),
            vec![
                ("limit".to_string(), "10".to_string()),
                ("offset".to_string(), "5".to_string()),
                ("name".to_string(), "db-password".to_string()),
                ("bits".to_string(), "256".to_string()),
            ]
        );
    }

    #[test]
    fn test_default_query() {
        let query = ListQuery::default();
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn test_raw_page_reads_cursors() {
        let body = json!({
            "secrets": [{"a": 1}, {"a": 2}],
            "previous": "http://localhost/v1/secrets?limit=2&offset=0",
            "next": "http://localhost/v1/secrets?limit=2&offset=4",
            "total": 9
        });
        let page = RawPage::from_body(body, "secrets")
            .try_map(|v| Ok(v["a"].as_u64().unwrap()))
            .unwrap();
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.previous.unwrap().ends_with("offset=0"));
        assert!(page.next.unwrap().ends_with("offset=4"));
        assert_eq!(page.total, Some(9));
    }

    #[test]
    fn test_raw_page_without_items_is_empty() {
        let page = RawPage::from_body(json!({"total": 0}), "orders")
            .try_map(Ok)
            .unwrap();
        assert!(page.is_empty());
        assert!(page.next.is_none());
    }

    #[test]
    fn test_empty_page() {
        let page: Page<()> = Page::empty();
        assert!(page.is_empty());
        assert!(page.previous.is_none() && page.next.is_none());
    }
}
