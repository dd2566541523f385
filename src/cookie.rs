//! Request cookie parsing and `Set-Cookie` serialization.
//!
//! Request-side parsing follows RFC 6265 with one widely adopted relaxation:
//! an entry without `=` is accepted as a name with an empty value. Entries
//! with a non-token name, a value outside the strict percent-encoded form, or
//! more than one `=` are skipped with a warning. On duplicate names the first
//! entry wins.
//!
//! Response-side serialization validates each attribute independently; an
//! invalid attribute is skipped (with a warning) while the rest of the cookie
//! is still emitted. An invalid cookie *name* aborts serialization entirely,
//! producing an empty string that the caller must not emit.

use chrono::{DateTime, Datelike, Utc};
use http::header::COOKIE;
use http::HeaderMap;
use tracing::{error, warn};

use crate::percent;

// token = 1*tchar
// tchar = "!" / "#" / "$" / "%" / "&" / "'" / "*" / "+" / "-" / "." /
//         "^" / "_" / "`" / "|" / "~" / DIGIT / ALPHA
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || matches!(b, b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~')
        })
}

fn valid_cookie_path_value(value: &str) -> bool {
    value.bytes().all(|b| (0x20..0x7F).contains(&b) && b != b';')
}

// Accepts a reg-name / IPv4 host with an optional numeric port, which covers
// what a Domain attribute may carry once the leading dot is stripped.
fn valid_cookie_domain(domain: &str) -> bool {
    let host = match domain.split_once(':') {
        Some((host, port)) => {
            if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
                return false;
            }
            host
        }
        None => domain,
    };
    !host.is_empty() && host.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
}

// As per RFC, the year must not be less than 1601.
fn valid_expires(expires: &DateTime<Utc>) -> bool {
    expires.year() >= 1601
}

/// Cookies parsed from the `Cookie` headers of a request.
#[derive(Debug, Default)]
pub struct CookieJar {
    // Wire order with duplicates already resolved (first match wins).
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub(crate) fn parse(headers: &HeaderMap) -> Self {
        let mut jar = CookieJar::default();
        for value in headers.get_all(COOKIE) {
            match value.to_str() {
                Ok(value) => jar.parse_cookie_value(value),
                Err(_) => warn!("cookie header is not visible ascii, skipped"),
            }
        }
        jar
    }

    fn parse_cookie_value(&mut self, cookie_value: &str) {
        for entry in cookie_value.split(';') {
            let trimmed = entry.trim_matches([' ', '\t', '\r', '\n']);
            if trimmed.is_empty() {
                continue;
            }

            // Must be `name=value`; the value may be empty, the name may not.
            let mut fields = trimmed.split('=');
            let name = fields.next().unwrap_or_default();
            let value = fields.next().unwrap_or_default();
            if fields.next().is_some() || name.is_empty() {
                warn!(cookie = trimmed, "malformed cookie entry, skipped");
                continue;
            }

            if !is_token(name) {
                warn!(name, "name of the cookie entry is not a http token, skipped");
                continue;
            }

            if !percent::is_strictly_encoded(value) {
                warn!(name, value, "invalid value of the cookie entry, skipped");
                continue;
            }

            // First-match policy on duplicate names.
            if self.cookies.iter().any(|(n, _)| n == name) {
                continue;
            }

            // Cannot fail: the value was just validated.
            let decoded = percent::decode(value).unwrap_or_default();
            self.cookies.push((name.to_string(), decoded));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cookies.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

/// The `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SameSite {
    /// Attribute is not emitted.
    #[default]
    Default,
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
            SameSite::Default => "Default",
        }
    }
}

/// A response cookie, serialized into a `Set-Cookie` header value.
#[derive(Debug, Clone, Default)]
pub struct Cookie {
    pub name: String,
    /// Percent-escaped during serialization.
    pub value: String,

    pub path: String,
    pub domain: String,

    /// `max_age <= 0` means the cookie should expire immediately.
    pub max_age: Option<i64>,
    pub expires: Option<DateTime<Utc>>,

    pub http_only: bool,
    pub secure: bool,

    pub same_site: SameSite,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), ..Default::default() }
    }

    /// Serializes into a `Set-Cookie` header value.
    ///
    /// Returns an empty string if `name` is not an HTTP token; the caller
    /// must not emit the header in that case. Invalid attribute values are
    /// skipped individually.
    pub fn to_header_value(&self) -> String {
        if !is_token(&self.name) {
            error!(name = %self.name, "invalid cookie name, abort");
            return String::new();
        }

        let mut out = String::with_capacity(self.name.len() + self.value.len() + 64);
        out.push_str(&self.name);
        out.push('=');
        out.push_str(&percent::encode(&self.value));

        if !self.path.is_empty() {
            if valid_cookie_path_value(&self.path) {
                out.push_str("; Path=");
                out.push_str(&self.path);
            } else {
                warn!(path = %self.path, "invalid path value, skipped");
            }
        }

        if !self.domain.is_empty() {
            // Leading `.` is no longer required.
            let domain = self.domain.strip_prefix('.').unwrap_or(&self.domain);
            if valid_cookie_domain(domain) {
                out.push_str("; Domain=");
                out.push_str(domain);
            } else {
                warn!(domain = %self.domain, "invalid domain value, skipped");
            }
        }

        if let Some(max_age) = self.max_age {
            out.push_str("; Max-Age=");
            out.push_str(&max_age.to_string());
        }

        if let Some(expires) = &self.expires {
            if valid_expires(expires) {
                out.push_str("; Expires=");
                out.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
            } else {
                warn!(%expires, "invalid expires value, skipped");
            }
        }

        if self.secure {
            out.push_str("; Secure");
        }

        if self.http_only {
            out.push_str("; HttpOnly");
        }

        if self.same_site != SameSite::Default {
            out.push_str("; SameSite=");
            out.push_str(self.same_site.as_str());
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use http::HeaderValue;

    fn jar_from(value: &str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        CookieJar::parse(&headers)
    }

    #[test]
    fn empty_cookie_header() {
        let jar = CookieJar::parse(&HeaderMap::new());
        assert!(jar.is_empty());
    }

    #[test]
    fn parse_and_reference_cookie_entries() {
        let jar = jar_from("key1=value1; key2=value2; special=a%2Bb");
        assert_eq!(jar.len(), 3);
        assert_eq!(jar.get("key1"), Some("value1"));
        assert_eq!(jar.get("key2"), Some("value2"));
        assert_eq!(jar.get("key3"), None);

        // auto-unescape for entry values
        assert_eq!(jar.get("special"), Some("a+b"));
    }

    #[test]
    fn entry_value_is_empty() {
        let jar = jar_from("key1=; key2");
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("key1"), Some(""));
        // Allow the non-strict no-`=` case.
        assert_eq!(jar.get("key2"), Some(""));
    }

    #[test]
    fn first_entry_wins_on_duplicates() {
        let jar = jar_from("key=foobar; key2=test; key=");
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("key"), Some("foobar"));
    }

    #[test]
    fn empty_entries_are_skipped() {
        assert!(jar_from("").is_empty());
        assert!(jar_from("; ;").is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        // multiple `=` in one entry
        assert!(jar_from("key=foo=bar").is_empty());
        // empty name
        assert!(jar_from("=foo").is_empty());
        // name is not a token
        assert!(jar_from("k@y=foo").is_empty());
        // value cannot contain spaces
        assert!(jar_from("key=a b").is_empty());
    }

    #[test]
    fn multiple_cookie_headers_are_merged() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("b=2; a=overridden"));
        let jar = CookieJar::parse(&headers);
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("a"), Some("1"));
        assert_eq!(jar.get("b"), Some("2"));
    }

    #[test]
    fn simple_cookie_with_only_name_value() {
        let cookie = Cookie::new("msg", "hello world");
        assert_eq!(cookie.to_header_value(), "msg=hello%20world");
    }

    #[test]
    fn complex_cookie_with_all_attributes() {
        let mut cookie = Cookie::new("msg", "hello world");
        cookie.path = "/".to_string();
        cookie.domain = ".example.com".to_string(); // leading dot is stripped
        cookie.max_age = Some(86400);
        cookie.expires = Some(Utc.with_ymd_and_hms(2025, 12, 12, 0, 0, 0).unwrap());
        cookie.http_only = true;
        cookie.secure = true;
        cookie.same_site = SameSite::Lax;

        assert_eq!(
            cookie.to_header_value(),
            "msg=hello%20world; Path=/; Domain=example.com; Max-Age=86400\
             ; Expires=Fri, 12 Dec 2025 00:00:00 GMT; Secure; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn empty_string_for_invalid_name() {
        let cookie = Cookie::new("a b", "foobar");
        assert_eq!(cookie.to_header_value(), "");
    }

    #[test]
    fn skip_invalid_path() {
        let mut cookie = Cookie::new("msg", "hello world");
        cookie.path = "/test/a;b;c".to_string();
        assert_eq!(cookie.to_header_value(), "msg=hello%20world");
    }

    #[test]
    fn skip_invalid_domain() {
        let mut cookie = Cookie::new("msg", "hello world");
        cookie.domain = "/test/".to_string();
        assert_eq!(cookie.to_header_value(), "msg=hello%20world");
    }

    #[test]
    fn skip_invalid_expires() {
        let mut cookie = Cookie::new("msg", "hello world");
        cookie.expires = Some(Utc.with_ymd_and_hms(1600, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(cookie.to_header_value(), "msg=hello%20world");
    }
}
