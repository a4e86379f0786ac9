//! Transport adapter over reqwest.

use http::{HeaderMap, Method};
use url::Url;

use crate::config::{AuthConfig, AuthScheme};
use crate::errors::HttpError;
use crate::net::Response;

/// Executes one exchange and buffers the response.
///
/// The body, when present, is already encoded by the resolved encoder; this
/// layer only moves bytes.
pub async fn exchange(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
    auth: Option<AuthConfig>,
) -> Result<Response, HttpError> {
    let mut request = client.request(method, url).headers(headers);
    if let Some(auth) = auth {
        request = match auth.scheme {
            AuthScheme::Basic => request.basic_auth(auth.user, Some(auth.password)),
            // Digest challenges need a first round trip; out of scope for
            // this transport, so credentials go out preemptively as basic.
            AuthScheme::Digest => request.basic_auth(auth.user, Some(auth.password)),
        };
    }
    if let Some(bytes) = body {
        request = request.body(bytes);
    }

    let res = request.send().await?;

    let final_url = res.url().clone();
    let status = res.status().as_u16();
    let status_text = res
        .status()
        .canonical_reason()
        .unwrap_or("Unknown")
        .to_string();
    let headers = res.headers().clone();

    // Buffer the whole body; streaming is delegated to codec plugins.
    let body = res.bytes().await?.to_vec();

    Ok(Response {
        url: final_url,
        status,
        status_text,
        headers,
        body,
    })
}
