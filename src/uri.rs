//! Request URI assembly.
//!
//! A [`UriBuilder`] holds the pieces of a request URI as overridable fields.
//! Builders live inside config nodes, so a request-level builder that leaves
//! the port at its sentinel or the query map empty falls through to whatever
//! an ancestor node configured (see `config::resolver`).

use std::collections::HashMap;

use url::Url;

use crate::errors::HttpError;

/// Sentinel meaning "no port configured at this node".
pub const DEFAULT_PORT: i32 = -1;

/// Piecewise URI builder stored in request settings.
///
/// Invalid input is not rejected here: per the config contract, validation
/// happens when the request is dispatched, not while configuring. A full-URI
/// string that fails to parse is remembered and reported from [`build_with`].
///
/// [`build_with`]: UriBuilder::build_with
#[derive(Debug, Clone)]
pub struct UriBuilder {
    /// Raw text that failed to parse in `from_full`, surfaced at build time.
    invalid: Option<String>,
    scheme: Option<String>,
    host: Option<String>,
    port: i32,
    path: Option<String>,
    query: HashMap<String, Vec<String>>,
    fragment: Option<String>,
}

impl Default for UriBuilder {
    fn default() -> Self {
        Self {
            invalid: None,
            scheme: None,
            host: None,
            port: DEFAULT_PORT,
            path: None,
            query: HashMap::new(),
            fragment: None,
        }
    }
}

impl UriBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates the builder from a full URI string.
    ///
    /// Parse failures are deferred: the builder is returned as-is and the
    /// error surfaces when the request tries to build the final URL.
    pub fn from_full(full: &str) -> Self {
        let mut builder = Self::new();
        match Url::parse(full) {
            Ok(url) => {
                builder.scheme = Some(url.scheme().to_string());
                builder.host = url.host_str().map(str::to_string);
                builder.port = url.port().map(i32::from).unwrap_or(DEFAULT_PORT);
                builder.path = Some(url.path().to_string());
                for (k, v) in url.query_pairs() {
                    builder
                        .query
                        .entry(k.into_owned())
                        .or_default()
                        .push(v.into_owned());
                }
                builder.fragment = url.fragment().map(str::to_string);
            }
            Err(_) => builder.invalid = Some(full.to_string()),
        }
        builder
    }

    pub fn scheme(&mut self, scheme: &str) -> &mut Self {
        self.scheme = Some(scheme.to_string());
        self
    }

    pub fn host(&mut self, host: &str) -> &mut Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = i32::from(port);
        self
    }

    pub fn path(&mut self, path: &str) -> &mut Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn query_param(&mut self, name: &str, value: &str) -> &mut Self {
        self.query
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn fragment(&mut self, fragment: &str) -> &mut Self {
        self.fragment = Some(fragment.to_string());
        self
    }

    /// Port configured on this builder, or [`DEFAULT_PORT`].
    pub fn port_value(&self) -> i32 {
        self.port
    }

    /// Query parameters configured on this builder.
    pub fn query_map(&self) -> &HashMap<String, Vec<String>> {
        &self.query
    }

    /// Assembles the final URL using the chain-resolved port and query map.
    ///
    /// `port` and `query` come from the resolver, which may have picked them
    /// up from an ancestor node; they override whatever this builder holds.
    pub fn build_with(
        &self,
        port: i32,
        query: &HashMap<String, Vec<String>>,
    ) -> Result<Url, HttpError> {
        if let Some(raw) = &self.invalid {
            return Err(HttpError::InvalidUri(raw.clone()));
        }
        let host = self
            .host
            .as_deref()
            .ok_or(HttpError::MissingProperty("uri host"))?;
        let scheme = self.scheme.as_deref().unwrap_or("http");

        let mut url = Url::parse(&format!("{scheme}://{host}/"))
            .map_err(|e| HttpError::InvalidUri(format!("{scheme}://{host}/: {e}")))?;
        if port != DEFAULT_PORT {
            let port = u16::try_from(port)
                .map_err(|_| HttpError::InvalidUri(format!("port {port} out of range")))?;
            url.set_port(Some(port))
                .map_err(|_| HttpError::InvalidUri(format!("port {port} not allowed")))?;
        }
        url.set_path(self.path.as_deref().unwrap_or("/"));
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            let mut names: Vec<&String> = query.keys().collect();
            names.sort();
            for name in names {
                for value in &query[name] {
                    pairs.append_pair(name, value);
                }
            }
        }
        url.set_fragment(self.fragment.as_deref());
        Ok(url)
    }

    /// Assembles the URL from this builder alone, without chain overrides.
    pub fn build(&self) -> Result<Url, HttpError> {
        self.build_with(self.port, &self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_full_splits_into_parts() {
        let b = UriBuilder::from_full("https://example.com:8443/api/things?kind=a&kind=b#frag");
        assert_eq!(b.port_value(), 8443);
        assert_eq!(b.query_map()["kind"], vec!["a", "b"]);

        let url = b.build().unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.port(), Some(8443));
        assert_eq!(url.path(), "/api/things");
        assert_eq!(url.fragment(), Some("frag"));
    }

    #[test]
    fn invalid_full_uri_fails_at_build_not_parse() {
        let b = UriBuilder::from_full("not a uri at all");
        // No panic while configuring; the error shows up on build.
        assert!(matches!(b.build(), Err(HttpError::InvalidUri(_))));
    }

    #[test]
    fn missing_host_is_a_dispatch_error() {
        let mut b = UriBuilder::new();
        b.path("/x");
        assert!(matches!(b.build(), Err(HttpError::MissingProperty(_))));
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        let b = UriBuilder::from_full("http://example.com/");
        assert!(matches!(
            b.build_with(70_000, &HashMap::new()),
            Err(HttpError::InvalidUri(_))
        ));
        assert!(matches!(
            b.build_with(-2, &HashMap::new()),
            Err(HttpError::InvalidUri(_))
        ));
    }

    #[test]
    fn build_with_overrides_port_and_query() {
        let b = UriBuilder::from_full("http://example.com/search");
        let mut query = HashMap::new();
        query.insert("q".to_string(), vec!["rust".to_string()]);
        let url = b.build_with(8080, &query).unwrap();
        assert_eq!(url.as_str(), "http://example.com:8080/search?q=rust");
    }
}
