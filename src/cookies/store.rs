//! The cookie store contract and the concurrent in-memory implementation.

use std::sync::Arc;

use dashmap::DashMap;
use url::Url;

use crate::cookies::cookie::{now_epoch_secs, Cookie};
use crate::cookies::key::{domain_matches, CookieKey};

/// Store of cookies shared by all requests of a client.
///
/// Implementations must be `Send + Sync` and internally synchronized; the
/// trait methods take `&self`.
pub trait CookieStore: Send + Sync {
    /// Inserts `cookie`, keyed by its domain attribute and/or the origin
    /// `uri`. A cookie with `max_age == 0` is never stored; it removes any
    /// existing entry with the same keys instead.
    fn add(&self, uri: Option<&Url>, cookie: Cookie);

    /// Valid cookies matching `uri` (scheme/secure check, then host or
    /// domain matching per the cookie's version). Expired entries observed
    /// during the scan are removed.
    fn get(&self, uri: &Url) -> Vec<Cookie>;

    /// All valid cookies, unfiltered by URI.
    fn cookies(&self) -> Vec<Cookie>;

    /// Distinct hosts present among URI-keyed entries.
    fn uris(&self) -> Vec<Url>;

    /// Removes the cookie under both key shapes; `true` if either existed.
    fn remove(&self, uri: Option<&Url>, cookie: &Cookie) -> bool;

    /// Clears the store; `true` iff it held anything.
    fn remove_all(&self) -> bool;
}

/// Shared, type-erased store handle.
pub type CookieStoreHandle = Arc<dyn CookieStore>;

/// Concurrent in-memory cookie store.
///
/// One sharded map holds both key shapes; a dual-keyed cookie occupies two
/// slots pointing at the same logical value. No compound operation needs
/// atomicity across keys: a cookie may be briefly visible under one key but
/// not the other during a two-key insert, which callers tolerate within a
/// request's lifetime. Expired entries are evicted lazily, the moment a scan
/// observes them.
#[derive(Default)]
pub struct NonBlockingCookieStore {
    all: DashMap<CookieKey, Cookie>,
}

impl NonBlockingCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Sweeps the map, removing expired entries and passing live ones to
    /// `visit`. Removal happens after iteration so no shard lock is held
    /// while mutating.
    fn sweep(&self, mut visit: impl FnMut(&CookieKey, &Cookie)) {
        let now = now_epoch_secs();
        let mut expired: Vec<CookieKey> = Vec::new();
        for entry in self.all.iter() {
            if entry.value().is_expired_at(now) {
                expired.push(entry.key().clone());
            } else {
                visit(entry.key(), entry.value());
            }
        }
        for key in expired {
            self.evict_if_expired(&key, now);
        }
    }

    /// Removes the entry under `key` only while it is still expired. A writer
    /// may have replaced it with a fresh cookie between the scan and this
    /// deferred removal; the replacement must survive.
    fn evict_if_expired(&self, key: &CookieKey, now: i64) {
        self.all.remove_if(key, |_, cookie| cookie.is_expired_at(now));
    }
}

impl CookieStore for NonBlockingCookieStore {
    fn add(&self, uri: Option<&Url>, cookie: Cookie) {
        let keys = CookieKey::keys_of(&cookie, uri);
        if cookie.max_age == 0 {
            // Immediate-delete signal: never stored, removes prior entries.
            for key in keys {
                self.all.remove(&key);
            }
            return;
        }
        for key in keys {
            self.all.insert(key, cookie.clone());
        }
    }

    fn get(&self, uri: &Url) -> Vec<Cookie> {
        let host = uri
            .host_str()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let https = uri.scheme().eq_ignore_ascii_case("https");

        let mut matched: Vec<Cookie> = Vec::new();
        self.sweep(|key, cookie| {
            // Secure cookies never travel over a non-HTTPS scheme.
            if cookie.secure && !https {
                return;
            }
            let hit = match key {
                CookieKey::Uri { host: key_host, .. } => *key_host == host,
                CookieKey::Domain { .. } => cookie
                    .domain
                    .as_deref()
                    .is_some_and(|d| domain_matches(cookie.version, d, &host)),
            };
            if hit && !matched.contains(cookie) {
                matched.push(cookie.clone());
            }
        });
        matched
    }

    fn cookies(&self) -> Vec<Cookie> {
        let mut out: Vec<Cookie> = Vec::new();
        self.sweep(|_key, cookie| {
            if !out.contains(cookie) {
                out.push(cookie.clone());
            }
        });
        out
    }

    fn uris(&self) -> Vec<Url> {
        let mut hosts: Vec<String> = Vec::new();
        self.sweep(|key, _cookie| {
            if let CookieKey::Uri { host, .. } = key {
                if !hosts.contains(host) {
                    hosts.push(host.clone());
                }
            }
        });
        hosts
            .into_iter()
            .filter_map(|h| Url::parse(&format!("http://{h}/")).ok())
            .collect()
    }

    fn remove(&self, uri: Option<&Url>, cookie: &Cookie) -> bool {
        let mut removed = false;
        for key in CookieKey::keys_of(cookie, uri) {
            removed |= self.all.remove(&key).is_some();
        }
        removed
    }

    fn remove_all(&self) -> bool {
        let had_entries = !self.all.is_empty();
        self.all.clear();
        had_entries
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn zero_max_age_is_never_stored_and_removes_prior_entry() {
        let store = NonBlockingCookieStore::new();
        let uri = url("http://shop.example.com/");

        store.add(Some(&uri), Cookie::new("cart", "full"));
        assert_eq!(store.get(&uri).len(), 1);

        store.add(Some(&uri), Cookie::new("cart", "gone").with_max_age(0));
        assert!(store.get(&uri).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn domain_cookie_occupies_two_slots_but_dedupes_on_get() {
        let store = NonBlockingCookieStore::new();
        let uri = url("http://www.example.com/");

        store.add(
            Some(&uri),
            Cookie::new("session", "abc").with_domain(".example.com"),
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&uri).len(), 1);
    }

    #[test]
    fn version0_domain_matching_accepts_and_rejects() {
        let store = NonBlockingCookieStore::new();
        store.add(None, Cookie::new("s", "1").with_domain(".example.com"));

        assert_eq!(store.get(&url("http://www.example.com/")).len(), 1);
        assert_eq!(store.get(&url("http://example.com/")).len(), 1);
        // No embedded-dot boundary alignment at the tail.
        assert!(store.get(&url("http://evilexample.com/")).is_empty());
    }

    #[test]
    fn secure_cookie_requires_https() {
        let store = NonBlockingCookieStore::new();
        store.add(
            None,
            Cookie::new("s", "1").with_domain(".example.com").with_secure(true),
        );

        assert!(store.get(&url("http://www.example.com/")).is_empty());
        assert_eq!(store.get(&url("https://www.example.com/")).len(), 1);
    }

    #[test]
    fn host_only_cookie_matches_exact_host_only() {
        let store = NonBlockingCookieStore::new();
        let origin = url("http://app.example.com/");
        store.add(Some(&origin), Cookie::new("local", "1"));

        assert_eq!(store.get(&url("http://APP.example.com/")).len(), 1);
        assert!(store.get(&url("http://other.example.com/")).is_empty());
    }

    #[test]
    fn expired_entries_are_evicted_on_read() {
        let store = NonBlockingCookieStore::new();
        let uri = url("http://example.com/");

        let mut stale = Cookie::new("old", "1").with_max_age(10);
        stale.created = 0; // long past
        store.add(Some(&uri), stale);
        assert_eq!(store.len(), 1);

        assert!(store.get(&uri).is_empty());
        // The scan removed the entry, not just filtered it.
        assert!(store.is_empty());
    }

    #[test]
    fn uris_lists_distinct_hosts_from_uri_keys_only() {
        let store = NonBlockingCookieStore::new();
        store.add(Some(&url("http://a.example.com/")), Cookie::new("x", "1"));
        store.add(Some(&url("http://a.example.com/p")), Cookie::new("y", "2"));
        store.add(None, Cookie::new("z", "3").with_domain(".example.com"));

        let uris = store.uris();
        assert_eq!(uris.len(), 1);
        assert_eq!(uris[0].host_str(), Some("a.example.com"));
    }

    #[test]
    fn remove_drops_both_key_forms() {
        let store = NonBlockingCookieStore::new();
        let uri = url("http://www.example.com/");
        let cookie = Cookie::new("s", "1").with_domain(".example.com");

        store.add(Some(&uri), cookie.clone());
        assert_eq!(store.len(), 2);

        assert!(store.remove(Some(&uri), &cookie));
        assert!(store.is_empty());
        assert!(!store.remove(Some(&uri), &cookie));
    }

    #[test]
    fn remove_all_reports_true_then_false() {
        let store = NonBlockingCookieStore::new();
        store.add(None, Cookie::new("a", "1").with_domain(".example.com"));

        assert!(store.remove_all());
        assert!(!store.remove_all());
    }

    #[test]
    fn deferred_eviction_spares_a_fresh_replacement() {
        let store = NonBlockingCookieStore::new();
        let uri = url("http://shop.example.com/");

        let mut stale = Cookie::new("cart", "old").with_max_age(10);
        stale.created = 0;
        let keys = CookieKey::keys_of(&stale, Some(&uri));
        store.add(Some(&uri), stale);

        // A writer replaces the entry after a scan queued it for eviction.
        store.add(Some(&uri), Cookie::new("cart", "fresh").with_max_age(600));
        let now = now_epoch_secs();
        for key in &keys {
            store.evict_if_expired(key, now);
        }

        let got = store.get(&uri);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].value, "fresh");
    }

    #[test]
    fn concurrent_adds_lose_no_updates() {
        let store = Arc::new(NonBlockingCookieStore::new());
        let per_thread = 200;

        let writers: Vec<_> = (0..2)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    let origin = url(&format!("http://host{t}.example.com/"));
                    for i in 0..per_thread {
                        store.add(Some(&origin), Cookie::new(&format!("c{t}-{i}"), "v"));
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let reader = {
            let store = store.clone();
            thread::spawn(move || store.cookies().len())
        };
        assert_eq!(reader.join().unwrap(), 2 * per_thread);
    }
}
