//! Cookies: records, keys, matching and the [`CookieStore`] backends.

mod cookie;
mod file_store;
mod key;
mod store;

pub use cookie::{Cookie, SESSION_MAX_AGE};
pub use file_store::FileBackedCookieStore;
pub use key::{domain_matches, netscape_domain_matches, rfc_domain_matches, CookieKey};
pub use store::{CookieStore, CookieStoreHandle, NonBlockingCookieStore};
