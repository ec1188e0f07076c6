use log::warn;
use reqwest::header::{HeaderValue, SET_COOKIE};
use reqwest::Response;
use std::collections::BTreeMap;

/// Explicit cookie store for the login flow.
///
/// The portal hands out session cookies piecemeal across five responses on
/// two hosts, and every request must carry the full accumulated set. A
/// name/value map with overwrite-on-merge matches that contract; nothing is
/// ever expired or cleared within one flow.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> CookieJar {
        CookieJar::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Merges every `Set-Cookie` header of `response` into the jar.
    /// A cookie that already exists is overwritten with the newer value.
    pub fn merge_response(&mut self, response: &Response) {
        for header in response.headers().get_all(SET_COOKIE) {
            let raw = match header.to_str() {
                Ok(raw) => raw,
                Err(_) => {
                    warn!("Ignoring Set-Cookie header with non-ASCII bytes");
                    continue;
                }
            };
            // Attributes after the first ';' (Path, HttpOnly, ...) are
            // irrelevant to this flow.
            let pair = raw.split(';').next().unwrap_or("");
            match pair.split_once('=') {
                Some((name, value)) if !name.trim().is_empty() => {
                    self.insert(name.trim(), value.trim());
                }
                _ => warn!("Ignoring malformed Set-Cookie header: {}", raw),
            }
        }
    }

    /// Renders the jar as a `Cookie` request header, or `None` when empty.
    pub fn header_value(&self) -> Option<HeaderValue> {
        if self.cookies.is_empty() {
            return None;
        }
        let joined = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }
}
