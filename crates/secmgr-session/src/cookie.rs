//! Cookies recorded against an authority.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An HTTP cookie obtained from (or destined for) an authority.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Path attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Expiry; `None` for a cookie that never expires.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires: Option<DateTime<Utc>>,
    /// Secure attribute.
    #[serde(default)]
    pub secure: bool,
    /// HttpOnly attribute.
    #[serde(default)]
    pub http_only: bool,
}

/// Identity of a cookie within one authority's cookie jar.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CookieKey {
    name: String,
    domain: Option<String>,
    path: Option<String>,
}

impl Cookie {
    /// Creates a host-only, session-lifetime cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    /// Sets the expiry.
    pub fn expiring_at(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Sets the domain attribute.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets the path attribute.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The `(name, domain, path)` identity of this cookie.
    pub fn key(&self) -> CookieKey {
        CookieKey {
            name: self.name.clone(),
            domain: self.domain.clone(),
            path: self.path.clone(),
        }
    }

    /// A cookie is expired once its expiry is at or before `time`.
    pub fn is_expired(&self, time: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= time)
    }
}
