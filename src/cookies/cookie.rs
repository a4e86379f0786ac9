//! The cookie value object.
//!
//! Cookies are treated as immutable once stored: an update replaces the map
//! entry rather than mutating in place. Expiration is derived from the
//! creation timestamp plus `max_age`; `-1` marks a session cookie that never
//! expires and is never persisted, `0` is the immediate-delete signal.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// `max_age` sentinel for session cookies.
pub const SESSION_MAX_AGE: i64 = -1;

/// A cookie as stored and persisted.
///
/// Equality is identity, not full state: name and domain compared
/// case-insensitively plus the exact path, matching how deduplication works
/// when the same logical cookie is reachable under both key shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name (case-sensitive for host-only cookies).
    pub name: String,

    /// Raw cookie value, not decoded.
    pub value: String,

    /// Domain scoping; `None` makes this a host-only cookie matched against
    /// the exact request host.
    pub domain: Option<String>,

    /// Path scoping. Compared exactly (case-insensitive) by the domain key,
    /// not by RFC 6265 prefix rules.
    pub path: Option<String>,

    /// Lifetime in seconds; `-1` = session, `0` = delete signal.
    pub max_age: i64,

    /// Sent only over HTTPS when set.
    pub secure: bool,

    /// Hidden from client-side scripts when set.
    pub http_only: bool,

    /// Discard flag carried through persistence.
    pub discard: bool,

    /// Cookie spec version: 0 selects Netscape domain matching, 1 and up the
    /// RFC suffix matching.
    pub version: u32,

    pub comment: Option<String>,
    pub comment_url: Option<String>,
    pub port_list: Option<String>,

    /// Creation timestamp, seconds since the Unix epoch.
    pub created: i64,
}

impl Cookie {
    /// Creates a version-0 session cookie.
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: None,
            path: None,
            max_age: SESSION_MAX_AGE,
            secure: false,
            http_only: false,
            discard: false,
            version: 0,
            comment: None,
            comment_url: None,
            port_list: None,
            created: now_epoch_secs(),
        }
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Absolute expiry timestamp; `None` for session cookies.
    pub fn expires_at(&self) -> Option<i64> {
        if self.max_age == SESSION_MAX_AGE {
            None
        } else {
            Some(self.created + self.max_age)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_epoch_secs())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at() {
            Some(expires) => expires <= now,
            None => false,
        }
    }

    /// Parses a single `Set-Cookie` header value.
    ///
    /// Attribute coverage is intentionally minimal: `Path`, `Domain`,
    /// `Max-Age`, `Version`, `Secure` and `HttpOnly`. The domain attribute is
    /// kept verbatim (leading dot included) because version-0 matching is
    /// sensitive to it. Returns `None` when there is no `name=value` pair.
    pub fn parse_set_cookie(header: &str) -> Option<Cookie> {
        let (name, rest) = header.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, "");
        let mut saw_value = false;
        for part in rest.split(';') {
            let part = part.trim();
            if !saw_value {
                cookie.value = part.to_string();
                saw_value = true;
                continue;
            }

            if let Some((k, v)) = part.split_once('=') {
                let v = v.trim();
                match k.trim().to_ascii_lowercase().as_str() {
                    "path" => cookie.path = Some(v.to_string()),
                    "domain" => cookie.domain = Some(v.to_string()),
                    "max-age" => {
                        if let Ok(age) = v.parse::<i64>() {
                            cookie.max_age = age;
                        }
                    }
                    "version" => {
                        if let Ok(version) = v.parse::<u32>() {
                            cookie.version = version;
                        }
                    }
                    "comment" => cookie.comment = Some(v.to_string()),
                    _ => {}
                }
            } else if part.eq_ignore_ascii_case("secure") {
                cookie.secure = true;
            } else if part.eq_ignore_ascii_case("httponly") {
                cookie.http_only = true;
            } else if part.eq_ignore_ascii_case("discard") {
                cookie.discard = true;
            }
        }

        Some(cookie)
    }
}

impl PartialEq for Cookie {
    fn eq(&self, other: &Self) -> bool {
        fn opt_ci(a: Option<&str>, b: Option<&str>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            }
        }
        self.name.eq_ignore_ascii_case(&other.name)
            && opt_ci(self.domain.as_deref(), other.domain.as_deref())
            && self.path == other.path
    }
}

pub(crate) fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_never_expires() {
        let c = Cookie::new("session", "abc");
        assert_eq!(c.expires_at(), None);
        assert!(!c.is_expired_at(i64::MAX - 1));
    }

    #[test]
    fn finite_max_age_expires_relative_to_creation() {
        let mut c = Cookie::new("short", "x").with_max_age(60);
        c.created = 1_000;
        assert_eq!(c.expires_at(), Some(1_060));
        assert!(!c.is_expired_at(1_059));
        assert!(c.is_expired_at(1_060));
    }

    #[test]
    fn parse_set_cookie_attributes() {
        let c = Cookie::parse_set_cookie(
            "id=a3fWa; Max-Age=2592000; Path=/; Domain=.example.com; Secure; HttpOnly",
        )
        .unwrap();
        assert_eq!(c.name, "id");
        assert_eq!(c.value, "a3fWa");
        assert_eq!(c.max_age, 2_592_000);
        assert_eq!(c.path.as_deref(), Some("/"));
        // Leading dot preserved; version-0 matching depends on it.
        assert_eq!(c.domain.as_deref(), Some(".example.com"));
        assert!(c.secure);
        assert!(c.http_only);
    }

    #[test]
    fn parse_set_cookie_without_pair_is_none() {
        assert!(Cookie::parse_set_cookie("garbage").is_none());
        assert!(Cookie::parse_set_cookie("=nameless").is_none());
    }
}
