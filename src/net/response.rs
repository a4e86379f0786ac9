//! Buffered HTTP response model.
//!
//! Represents a fully buffered response from the transport: final URL (after
//! redirects, if the client follows them), status code + reason, headers and
//! the raw body bytes. Parsing into a typed body is the job of whichever
//! parser the config chain resolves for the response content type.

use http::header::{HeaderMap, CONTENT_TYPE, SET_COOKIE};
use url::Url;

/// A received HTTP response, as-is; no transformation is applied here.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL of the response (after redirects, if any).
    pub url: Url,

    /// Numeric HTTP status code (e.g. `200`, `404`).
    pub status: u16,

    /// Reason phrase; may be `"Unknown"` for non-standard codes.
    pub status_text: String,

    /// Response headers, case-insensitive by name.
    pub headers: HeaderMap,

    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl Response {
    /// Media type from the `Content-Type` header, lowercased, without
    /// parameters.
    pub fn content_type(&self) -> Option<String> {
        let value = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let media_type = value.split(';').next()?.trim();
        if media_type.is_empty() {
            None
        } else {
            Some(media_type.to_ascii_lowercase())
        }
    }

    /// `charset` parameter from the `Content-Type` header, if any.
    pub fn charset(&self) -> Option<String> {
        let value = self.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        value.split(';').skip(1).find_map(|param| {
            let (k, v) = param.split_once('=')?;
            if k.trim().eq_ignore_ascii_case("charset") {
                Some(v.trim().trim_matches('"').to_string())
            } else {
                None
            }
        })
    }

    /// All `Set-Cookie` header values, order preserved.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}
