//! File-backed persistent cookie store.
//!
//! Decorates [`NonBlockingCookieStore`] with per-key `.properties` files in a
//! backing directory. The in-memory store stays authoritative: `add` is
//! visible to readers immediately, while the disk write happens later on the
//! supplied runtime's blocking pool. Disk I/O for a key is serialized by one
//! of 16 stripe locks selected by hashing the key, bounding contention
//! without a lock per file; unrelated keys that hash to the same stripe may
//! occasionally contend, which is accepted.
//!
//! A backing directory is claimed by at most one live store per process.
//! Claiming an already-claimed directory fails construction. Distinct keys
//! that sanitize to the same filename collide; this is a documented
//! limitation, not defended against.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use lazy_static::lazy_static;
use tokio::runtime::Handle;
use url::Url;

use crate::cookies::cookie::{now_epoch_secs, Cookie, SESSION_MAX_AGE};
use crate::cookies::key::CookieKey;
use crate::cookies::store::{CookieStore, NonBlockingCookieStore};
use crate::errors::CookieStoreError;

const STRIPE_COUNT: usize = 16;
const FILE_SUFFIX: &str = ".properties";

lazy_static! {
    /// Canonical paths of directories claimed by live stores in this process.
    static ref CLAIMED_DIRS: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
}

/// Counter of writes scheduled but not yet landed on disk.
///
/// `Drop` must not release the directory claim while writes are in flight: a
/// successor store over the same directory would hold its own stripe table,
/// so an old write and a new write to the same key would no longer be
/// serialized, and the successor's startup load could read half-written
/// files.
#[derive(Default)]
struct PendingWrites {
    count: Mutex<usize>,
    done: Condvar,
}

impl PendingWrites {
    fn begin(&self) {
        *self.count.lock().unwrap() += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.done.notify_all();
        }
    }

    /// Blocks until every scheduled write has finished. Bails out after a
    /// timeout in case the executor was shut down with tasks still queued.
    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap();
        while *count > 0 {
            let (next, timeout) = self
                .done
                .wait_timeout(count, Duration::from_secs(5))
                .unwrap();
            count = next;
            if timeout.timed_out() && *count > 0 {
                log::warn!("giving up on {} pending cookie writes", *count);
                return;
            }
        }
    }
}

/// Cookie store persisting non-session cookies to one file per key.
pub struct FileBackedCookieStore {
    inner: NonBlockingCookieStore,
    dir: PathBuf,
    stripes: Arc<Vec<Mutex<()>>>,
    pending: Arc<PendingWrites>,
    executor: Handle,
}

impl FileBackedCookieStore {
    /// Opens (creating if needed) a store over `dir`, loading any persisted
    /// cookies. Fails fast if another live store in this process already
    /// claims the directory.
    pub fn new(dir: impl AsRef<Path>, executor: Handle) -> Result<Self, CookieStoreError> {
        fs::create_dir_all(dir.as_ref())?;
        let dir = dir.as_ref().canonicalize()?;

        {
            let mut claimed = CLAIMED_DIRS.lock().unwrap();
            if !claimed.insert(dir.clone()) {
                return Err(CookieStoreError::DirectoryClaimed(dir));
            }
        }

        let store = Self {
            inner: NonBlockingCookieStore::new(),
            dir,
            stripes: Arc::new((0..STRIPE_COUNT).map(|_| Mutex::new(())).collect()),
            pending: Arc::new(PendingWrites::default()),
            executor,
        };
        store.load_all();
        Ok(store)
    }

    /// Loads every persisted cookie file, best effort. Expired and malformed
    /// files are deleted rather than loaded; one bad file never aborts the
    /// rest of the scan.
    fn load_all(&self) {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!(
                    "cannot enumerate cookie directory {}: {err}",
                    self.dir.display()
                );
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let is_cookie_file = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(FILE_SUFFIX));
            if !is_cookie_file {
                continue;
            }
            match load_cookie_file(&path) {
                Ok(Some((host, cookie))) => {
                    let origin = host.and_then(|h| Url::parse(&format!("http://{h}/")).ok());
                    self.inner.add(origin.as_ref(), cookie);
                }
                Ok(None) => {
                    // Expired on disk; reclaim the file.
                    let _ = fs::remove_file(&path);
                }
                Err(err) => {
                    log::warn!("skipping cookie file {}: {err}", path.display());
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }

    fn stripe_for(&self, key: &CookieKey) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % STRIPE_COUNT]
    }

    fn file_for(&self, key: &CookieKey) -> PathBuf {
        self.dir.join(file_name(key))
    }

    /// Schedules the asynchronous write of one key's file. Callers must not
    /// assume the write has completed when this returns.
    fn persist_async(&self, key: &CookieKey, contents: String) {
        let path = self.file_for(key);
        let stripes = Arc::clone(&self.stripes);
        let stripe = {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            (hasher.finish() as usize) % STRIPE_COUNT
        };
        self.pending.begin();
        let pending = Arc::clone(&self.pending);
        self.executor.spawn_blocking(move || {
            let _guard = stripes[stripe].lock().unwrap();
            if let Err(err) = fs::write(&path, contents) {
                log::warn!("failed to persist cookie file {}: {err}", path.display());
            }
            pending.finish();
        });
    }

    /// Deletes one key's file synchronously under its stripe lock.
    fn delete_file(&self, key: &CookieKey) {
        let path = self.file_for(key);
        let _guard = self.stripe_for(key).lock().unwrap();
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to delete cookie file {}: {err}", path.display());
            }
        }
    }

    /// Backing directory of this store.
    pub fn directory(&self) -> &Path {
        &self.dir
    }
}

impl CookieStore for FileBackedCookieStore {
    fn add(&self, uri: Option<&Url>, cookie: Cookie) {
        let keys = CookieKey::keys_of(&cookie, uri);
        self.inner.add(uri, cookie.clone());

        if cookie.max_age == 0 {
            // Delete signal: drop the backing files along with the entries.
            for key in &keys {
                self.delete_file(key);
            }
            return;
        }
        if cookie.max_age == SESSION_MAX_AGE {
            return;
        }

        let host = uri.and_then(|u| u.host_str()).map(str::to_ascii_lowercase);
        for key in &keys {
            // Only the URI-shaped file records the origin host, so a reload
            // can rebuild the same key shapes.
            let with_host = match key {
                CookieKey::Uri { .. } => host.as_deref(),
                CookieKey::Domain { .. } => None,
            };
            self.persist_async(key, serialize_cookie(&cookie, with_host));
        }
    }

    fn get(&self, uri: &Url) -> Vec<Cookie> {
        self.inner.get(uri)
    }

    fn cookies(&self) -> Vec<Cookie> {
        self.inner.cookies()
    }

    fn uris(&self) -> Vec<Url> {
        self.inner.uris()
    }

    fn remove(&self, uri: Option<&Url>, cookie: &Cookie) -> bool {
        let removed = self.inner.remove(uri, cookie);
        for key in CookieKey::keys_of(cookie, uri) {
            self.delete_file(&key);
        }
        removed
    }

    fn remove_all(&self) -> bool {
        let removed = self.inner.remove_all();
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                let is_cookie_file = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(FILE_SUFFIX));
                if is_cookie_file {
                    if let Err(err) = fs::remove_file(&path) {
                        log::warn!("failed to delete cookie file {}: {err}", path.display());
                    }
                }
            }
        }
        removed
    }
}

impl Drop for FileBackedCookieStore {
    fn drop(&mut self) {
        // Scheduled writes must land before the claim is released, so a
        // successor store never races them or loads half-written files.
        self.pending.wait_idle();
        CLAIMED_DIRS.lock().unwrap().remove(&self.dir);
    }
}

/// Deterministic filename for a key: domain (or host) + path + name, with
/// path separators replaced by `_`.
fn file_name(key: &CookieKey) -> String {
    let raw = match key {
        CookieKey::Uri { name, host } => format!("{host}{name}"),
        CookieKey::Domain { name, domain, path } => {
            format!("{domain}{}{name}", path.as_deref().unwrap_or(""))
        }
    };
    let mut sanitized: String = raw
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    sanitized.push_str(FILE_SUFFIX);
    sanitized
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('=');
    out.push_str(value);
    out.push('\n');
}

fn serialize_cookie(cookie: &Cookie, host: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(expires) = cookie.expires_at() {
        push_field(&mut out, "expires", &expires.to_string());
    }
    push_field(&mut out, "name", &cookie.name);
    push_field(&mut out, "value", &cookie.value);
    if let Some(domain) = &cookie.domain {
        push_field(&mut out, "domain", domain);
    }
    push_field(&mut out, "discard", if cookie.discard { "true" } else { "false" });
    push_field(&mut out, "secure", if cookie.secure { "true" } else { "false" });
    push_field(&mut out, "version", &cookie.version.to_string());
    push_field(&mut out, "httpOnly", if cookie.http_only { "true" } else { "false" });
    if let Some(comment) = &cookie.comment {
        push_field(&mut out, "comment", comment);
    }
    if let Some(comment_url) = &cookie.comment_url {
        push_field(&mut out, "commentURL", comment_url);
    }
    if let Some(path) = &cookie.path {
        push_field(&mut out, "path", path);
    }
    if let Some(port_list) = &cookie.port_list {
        push_field(&mut out, "portlist", port_list);
    }
    if let Some(host) = host {
        push_field(&mut out, "host", host);
    }
    out
}

/// Reads one persisted cookie file.
///
/// Returns `Ok(None)` when the entry expired on disk; the max-age of a live
/// entry is recomputed as `expires - now`.
fn load_cookie_file(path: &Path) -> Result<Option<(Option<String>, Cookie)>, CookieStoreError> {
    let contents = fs::read_to_string(path)?;
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for line in contents.lines() {
        if let Some((key, value)) = line.split_once('=') {
            fields.insert(key.trim(), value);
        }
    }

    let missing = |field: &'static str| {
        CookieStoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("missing field '{field}'"),
        ))
    };
    let name = fields.get("name").ok_or_else(|| missing("name"))?;
    let value = fields.get("value").ok_or_else(|| missing("value"))?;
    let expires: i64 = fields
        .get("expires")
        .ok_or_else(|| missing("expires"))?
        .parse()
        .map_err(|_| missing("expires"))?;

    let now = now_epoch_secs();
    if expires <= now {
        return Ok(None);
    }

    let mut cookie = Cookie::new(name, value).with_max_age(expires - now);
    cookie.created = now;
    cookie.domain = fields.get("domain").map(|s| s.to_string());
    cookie.path = fields.get("path").map(|s| s.to_string());
    cookie.discard = fields.get("discard").is_some_and(|v| *v == "true");
    cookie.secure = fields.get("secure").is_some_and(|v| *v == "true");
    cookie.http_only = fields.get("httpOnly").is_some_and(|v| *v == "true");
    cookie.version = fields
        .get("version")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    cookie.comment = fields.get("comment").map(|s| s.to_string());
    cookie.comment_url = fields.get("commentURL").map(|s| s.to_string());
    cookie.port_list = fields.get("portlist").map(|s| s.to_string());

    let host = fields.get("host").map(|s| s.to_string());
    Ok(Some((host, cookie)))
}
