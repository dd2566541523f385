//! Path and query parameter collections.

use crate::percent;
use tracing::warn;

/// A single bound path parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub key: String,
    pub value: String,
}

impl Param {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Path parameters bound during route lookup, in segment order.
///
/// Values preserve the matched segment text exactly as it appeared in the
/// (decoded) request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<Param>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push(Param::new(key, value));
    }

    /// Returns the first parameter bound under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|p| p.key == key).map(|p| p.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }
}

/// Decoded query-string parameters in wire order.
///
/// Duplicate keys are preserved; lookups return the first match. Keys are
/// compared case-sensitively against their decoded form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw (still percent-encoded) query string.
    ///
    /// Returns `None` when any key or value fails to decode; a malformed
    /// query string is discarded as a whole.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        let mut params = Vec::new();
        for pair in raw.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = match percent::decode(key) {
                Ok(key) => key,
                Err(e) => {
                    warn!(pair, "query key failed to decode: {e}");
                    return None;
                }
            };
            let value = match percent::decode(value) {
                Ok(value) => value,
                Err(e) => {
                    warn!(pair, "query value failed to decode: {e}");
                    return None;
                }
            };
            params.push((key, value));
        }
        Some(Self { params })
    }

    /// Returns the value of the first parameter stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Like [`get`](Self::get) but substituting `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Sets `key` to `value`: the first matching entry is replaced and any
    /// remaining matches are removed; inserts when absent.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.params.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.params[pos].1 = value.to_string();
                let mut i = self.params.len();
                while i > pos + 1 {
                    i -= 1;
                    if self.params[i].0 == key {
                        self.params.remove(i);
                    }
                }
            }
            None => self.params.push((key.to_string(), value.to_string())),
        }
    }

    /// Removes all entries matching `key`, returning how many were removed.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.params.len();
        self.params.retain(|(k, _)| k != key);
        before - self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_params_ordered_first_match() {
        let mut ps = PathParams::new();
        ps.add("tool", "test");
        ps.add("sub", "3");
        assert_eq!(ps.get("tool"), Some("test"));
        assert_eq!(ps.get("sub"), Some("3"));
        assert_eq!(ps.get("missing"), None);
        assert_eq!(ps.len(), 2);
    }

    #[test]
    fn query_parse_basic() {
        let qs = QueryParams::parse("a=1&b=2").unwrap();
        assert_eq!(qs.get("a"), Some("1"));
        assert_eq!(qs.get("b"), Some("2"));
        assert_eq!(qs.get("c"), None);
    }

    #[test]
    fn query_parse_empty_and_presence_only() {
        let qs = QueryParams::parse("key%2B1=hello%20world&key%2B2=&key%2B3&").unwrap();
        assert_eq!(qs.get("key+1"), Some("hello world"));
        assert_eq!(qs.get("key+2"), Some(""));
        assert_eq!(qs.get("key+3"), Some(""));
        assert_eq!(qs.get_or("key+4", "empty"), "empty");
    }

    #[test]
    fn query_parse_duplicates_first_wins() {
        let qs = QueryParams::parse("a=1&a=2&a=3").unwrap();
        assert_eq!(qs.get("a"), Some("1"));
        assert_eq!(qs.len(), 3);
    }

    #[test]
    fn query_parse_malformed_discards_all() {
        assert!(QueryParams::parse("foobar=%GA").is_none());
        assert!(QueryParams::parse("%zz=1&a=2").is_none());
    }

    #[test]
    fn query_set_and_remove() {
        let mut qs = QueryParams::parse("a=1&b=2&a=3").unwrap();
        qs.set("a", "9");
        assert_eq!(qs.get("a"), Some("9"));
        assert_eq!(qs.len(), 2);

        qs.set("c", "new");
        assert_eq!(qs.get("c"), Some("new"));

        assert_eq!(qs.remove("a"), 1);
        assert_eq!(qs.get("a"), None);
        assert_eq!(qs.remove("missing"), 0);
    }
}
