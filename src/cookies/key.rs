//! Cookie identity and domain matching.
//!
//! A stored cookie is addressed by one or two keys: always a [`CookieKey::Domain`]
//! when the cookie carries a domain attribute, always a [`CookieKey::Uri`] when an
//! origin URI was supplied at insertion time. Both shapes live in the same
//! map so a single pass covers lookups and the expiration sweep.

use std::hash::{Hash, Hasher};

use url::Url;

use crate::cookies::cookie::Cookie;

/// Identity of a stored cookie.
///
/// Equality and hashing are case-insensitive where the matching rules are:
/// the URI host is lowercased at construction, the domain-key name/domain are
/// folded during comparison. Path comparison is exact (case-insensitive),
/// not the RFC 6265 prefix match; this preserves the behavior of existing
/// persisted stores.
#[derive(Debug, Clone, Eq)]
pub enum CookieKey {
    /// Host-only cookie, keyed by `(name, lowercased host)`.
    Uri { name: String, host: String },
    /// Domain cookie, keyed by `(name, domain, path)` case-insensitively.
    Domain {
        name: String,
        domain: String,
        path: Option<String>,
    },
}

impl CookieKey {
    pub fn uri(name: &str, host: &str) -> Self {
        CookieKey::Uri {
            name: name.to_string(),
            host: host.to_ascii_lowercase(),
        }
    }

    pub fn domain(name: &str, domain: &str, path: Option<&str>) -> Self {
        CookieKey::Domain {
            name: name.to_string(),
            domain: domain.to_string(),
            path: path.map(str::to_string),
        }
    }

    /// Domain-shaped key for `cookie`, when it has a domain attribute.
    pub(crate) fn domain_key_of(cookie: &Cookie) -> Option<Self> {
        cookie
            .domain
            .as_deref()
            .map(|d| Self::domain(&cookie.name, d, cookie.path.as_deref()))
    }

    /// URI-shaped key for `cookie` inserted against `url`.
    pub(crate) fn uri_key_of(cookie: &Cookie, url: &Url) -> Option<Self> {
        url.host_str().map(|h| Self::uri(&cookie.name, h))
    }

    /// Both keys the cookie occupies for an insertion against `uri`.
    pub(crate) fn keys_of(cookie: &Cookie, uri: Option<&Url>) -> Vec<Self> {
        let mut keys = Vec::with_capacity(2);
        if let Some(k) = Self::domain_key_of(cookie) {
            keys.push(k);
        }
        if let Some(k) = uri.and_then(|u| Self::uri_key_of(cookie, u)) {
            keys.push(k);
        }
        keys
    }
}

fn opt_path_eq(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

impl PartialEq for CookieKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                CookieKey::Uri { name: n1, host: h1 },
                CookieKey::Uri { name: n2, host: h2 },
            ) => n1 == n2 && h1 == h2,
            (
                CookieKey::Domain {
                    name: n1,
                    domain: d1,
                    path: p1,
                },
                CookieKey::Domain {
                    name: n2,
                    domain: d2,
                    path: p2,
                },
            ) => {
                n1.eq_ignore_ascii_case(n2)
                    && d1.eq_ignore_ascii_case(d2)
                    && opt_path_eq(p1.as_deref(), p2.as_deref())
            }
            _ => false,
        }
    }
}

impl Hash for CookieKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            CookieKey::Uri { name, host } => {
                0u8.hash(state);
                name.hash(state);
                host.hash(state);
            }
            CookieKey::Domain { name, domain, path } => {
                1u8.hash(state);
                name.to_ascii_lowercase().hash(state);
                domain.to_ascii_lowercase().hash(state);
                path.as_deref()
                    .map(str::to_ascii_lowercase)
                    .hash(state);
            }
        }
    }
}

/// Dispatches to the matching rule selected by the cookie's version.
pub fn domain_matches(version: u32, domain: &str, host: &str) -> bool {
    if version == 0 {
        netscape_domain_matches(domain, host)
    } else {
        rfc_domain_matches(domain, host)
    }
}

/// Historical version-0 ("Netscape") domain matching.
///
/// This reproduces the JDK `InMemoryCookieStore` algorithm branch for
/// branch, including the pure tail comparison when the host is longer than
/// the domain. Do not re-derive it from the Netscape spec; reordering the
/// branches changes matching outcomes.
pub fn netscape_domain_matches(domain: &str, host: &str) -> bool {
    if domain.is_empty() || host.is_empty() {
        return false;
    }

    let is_local_domain = domain.eq_ignore_ascii_case(".local");
    let mut embedded_dot = domain.find('.');
    if embedded_dot == Some(0) {
        embedded_dot = domain[1..].find('.').map(|i| i + 1);
    }
    match embedded_dot {
        None if !is_local_domain => return false,
        Some(i) if !is_local_domain && i == domain.len() - 1 => return false,
        _ => {}
    }

    if !host.contains('.') && is_local_domain {
        return true;
    }

    if host.len() == domain.len() {
        return host.eq_ignore_ascii_case(domain);
    }
    if host.len() > domain.len() {
        // Only the tail is compared; the leading portion is unused here.
        return host
            .get(host.len() - domain.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(domain));
    }
    if host.len() + 1 == domain.len() {
        return domain.starts_with('.') && host.eq_ignore_ascii_case(&domain[1..]);
    }
    false
}

/// RFC-2965-style suffix matching for cookie versions 1 and up.
pub fn rfc_domain_matches(domain: &str, host: &str) -> bool {
    if domain.is_empty() || host.is_empty() {
        return false;
    }
    let domain = domain.strip_prefix('.').unwrap_or(domain);
    if host.eq_ignore_ascii_case(domain) {
        return true;
    }
    host.len() > domain.len()
        && host
            .get(host.len() - domain.len() - 1..)
            .is_some_and(|tail| {
                tail.as_bytes()[0] == b'.' && tail[1..].eq_ignore_ascii_case(domain)
            })
}
