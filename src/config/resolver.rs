//! Chain-walking property resolution.
//!
//! Every configurable property is looked up the same way: apply an accessor
//! to the starting node, test a stop predicate, and walk to the parent until
//! the predicate is satisfied or the chain runs out. When the chain is
//! exhausted the last-fetched value is returned, which may well be an absent
//! default.
//!
//! Two strategies exist on top of that walk: first-match-wins (content type,
//! charset, body, auth, encoder/parser lookup) and additive collection
//! (headers merge with leaf precedence, cookies append from every node).

use std::collections::HashMap;

use crate::config::layer::ConfigLayer;
use crate::config::settings::{
    AuthConfig, Body, ContextValue, EncoderFn, ExceptionHandlerFn, ParserFn, ResponseHandlerFn,
};
use crate::cookies::Cookie;
use crate::uri::{UriBuilder, DEFAULT_PORT};

/// Generic upward walk: accessor + stop predicate from `start` to the root.
pub fn resolve<T>(
    start: &dyn ConfigLayer,
    accessor: impl Fn(&dyn ConfigLayer) -> T,
    stop: impl Fn(&T) -> bool,
) -> T {
    let mut value = accessor(start);
    if stop(&value) {
        return value;
    }
    let mut cursor = start.parent();
    while let Some(node) = cursor {
        value = accessor(node.as_ref());
        if stop(&value) {
            return value;
        }
        cursor = node.parent();
    }
    value
}

/// First-match-wins walk with the default "value is present" predicate.
pub fn first_present<T>(
    start: &dyn ConfigLayer,
    accessor: impl Fn(&dyn ConfigLayer) -> Option<T>,
) -> Option<T> {
    resolve(start, accessor, Option::is_some)
}

pub fn content_type(start: &dyn ConfigLayer) -> Option<String> {
    first_present(start, |n| n.content_type())
}

pub fn charset(start: &dyn ConfigLayer) -> Option<String> {
    first_present(start, |n| n.charset())
}

pub fn body(start: &dyn ConfigLayer) -> Option<Body> {
    first_present(start, |n| n.body())
}

pub fn auth(start: &dyn ConfigLayer) -> Option<AuthConfig> {
    first_present(start, |n| n.auth())
}

pub fn uri(start: &dyn ConfigLayer) -> Option<UriBuilder> {
    first_present(start, |n| n.uri())
}

/// Port resolution uses the sentinel predicate: a node with the default `-1`
/// does not stop the walk.
pub fn port(start: &dyn ConfigLayer) -> i32 {
    resolve(start, |n| n.port(), |p| *p != DEFAULT_PORT)
}

/// Query-map resolution skips nodes that declared an empty override.
pub fn query_params(start: &dyn ConfigLayer) -> HashMap<String, Vec<String>> {
    resolve(start, |n| n.query_params(), |m| !m.is_empty())
}

pub fn encoder(start: &dyn ConfigLayer, content_type: &str) -> Option<EncoderFn> {
    first_present(start, |n| n.encoder_for(content_type))
}

pub fn parser(start: &dyn ConfigLayer, content_type: &str) -> Option<ParserFn> {
    first_present(start, |n| n.parser_for(content_type))
}

pub fn exception_handler(start: &dyn ConfigLayer) -> Option<ExceptionHandlerFn> {
    first_present(start, |n| n.exception_handler())
}

pub fn context_value(
    start: &dyn ConfigLayer,
    content_type: &str,
    key: &str,
) -> Option<ContextValue> {
    first_present(start, |n| n.context_value(content_type, key))
}

/// Status-handler resolution.
///
/// Each node applies its own exact-code / success / failure selection (see
/// `ResponseSettings::handler_for`); only when a node has nothing for the
/// status does the walk move to its parent. This is deliberately not a
/// first-match over a flattened view of the maps.
pub fn status_handler(start: &dyn ConfigLayer, status: u16) -> Option<ResponseHandlerFn> {
    first_present(start, |n| n.handler_for(status))
}

/// Additive header merge from leaf to root; on a name collision the value
/// closer to the leaf wins.
pub fn merged_headers(start: &dyn ConfigLayer) -> HashMap<String, String> {
    let mut merged = start.headers();
    let mut cursor = start.parent();
    while let Some(node) = cursor {
        for (name, value) in node.headers() {
            merged.entry(name).or_insert(value);
        }
        cursor = node.parent();
    }
    merged
}

/// Cookies accumulate from every node in the chain, leaf first, no merging.
pub fn collected_cookies(start: &dyn ConfigLayer) -> Vec<Cookie> {
    let mut collected = start.cookies();
    let mut cursor = start.parent();
    while let Some(node) = cursor {
        collected.extend(node.cookies());
        cursor = node.parent();
    }
    collected
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::layer::{BasicConfig, ConfigHandle, SharedConfig};
    use crate::errors::HttpError;
    use crate::net::Response;

    fn chain() -> (ConfigHandle, ConfigHandle) {
        let root: ConfigHandle = Arc::new(SharedConfig::new(None));
        let middle: ConfigHandle = Arc::new(SharedConfig::new(Some(root.clone())));
        (root, middle)
    }

    fn dummy_response(status: u16) -> Response {
        Response {
            url: "http://example.com/".parse().unwrap(),
            status,
            status_text: String::new(),
            headers: http::HeaderMap::new(),
            body: Vec::new(),
        }
    }

    fn tagged_handler(tag: &'static str) -> ResponseHandlerFn {
        Arc::new(move |_response, _body| Ok(Body::Text(tag.to_string())))
    }

    fn run(handler: &ResponseHandlerFn, status: u16) -> String {
        match handler(&dummy_response(status), Body::Empty).unwrap() {
            Body::Text(tag) => tag,
            other => panic!("unexpected handler output: {other:?}"),
        }
    }

    #[test]
    fn three_node_content_type_scenario() {
        let root = Arc::new(SharedConfig::new(None));
        root.set_content_type("text/plain");
        let root: ConfigHandle = root;

        let middle: ConfigHandle = Arc::new(SharedConfig::new(Some(root.clone())));

        let mut leaf = BasicConfig::new(Some(middle.clone()));
        BasicConfig::content_type(&mut leaf, "application/json");

        // Leaf resolves to its own value.
        assert_eq!(content_type(&leaf), Some("application/json".to_string()));
        // Middle sets nothing and falls through to root.
        assert_eq!(
            content_type(middle.as_ref()),
            Some("text/plain".to_string())
        );
    }

    #[test]
    fn exhausted_chain_returns_last_fetched_value() {
        let (_, middle) = chain();
        let leaf = BasicConfig::new(Some(middle));
        assert_eq!(content_type(&leaf), None);
        assert_eq!(port(&leaf), DEFAULT_PORT);
    }

    #[test]
    fn port_sentinel_predicate_skips_default() {
        let root = Arc::new(SharedConfig::new(None));
        root.set_uri("http://example.com:9001/base");
        let root: ConfigHandle = root;

        // Leaf has a URI of its own, but with no explicit port.
        let mut leaf = BasicConfig::new(Some(root.clone()));
        BasicConfig::uri(&mut leaf, "http://example.com/other");

        assert_eq!(port(&leaf), 9001);
    }

    #[test]
    fn empty_query_override_is_skipped() {
        let root = Arc::new(SharedConfig::new(None));
        root.set_uri("http://example.com/?tracking=on");
        let root: ConfigHandle = root;

        let mut leaf = BasicConfig::new(Some(root.clone()));
        BasicConfig::uri(&mut leaf, "http://example.com/path");

        let params = query_params(&leaf);
        assert_eq!(params["tracking"], vec!["on"]);
    }

    #[test]
    fn headers_merge_with_leaf_precedence() {
        let root = Arc::new(SharedConfig::new(None));
        root.set_header("Accept", "text/html");
        root.set_header("User-Agent", "httpforge");
        let root: ConfigHandle = root;

        let mut leaf = BasicConfig::new(Some(root.clone()));
        leaf.header("Accept", "application/json");

        let merged = merged_headers(&leaf);
        assert_eq!(merged["Accept"], "application/json");
        assert_eq!(merged["User-Agent"], "httpforge");
    }

    #[test]
    fn cookies_append_from_every_node() {
        let root = Arc::new(SharedConfig::new(None));
        root.add_cookie(Cookie::new("session", "root"));
        let root: ConfigHandle = root;

        let mut leaf = BasicConfig::new(Some(root.clone()));
        leaf.cookie(Cookie::new("session", "leaf"));

        let cookies = collected_cookies(&leaf);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].value, "leaf");
        assert_eq!(cookies[1].value, "root");
    }

    #[test]
    fn success_handler_falls_through_exact_handler_does_not() {
        let root = Arc::new(SharedConfig::new(None));
        root.set_success_handler(tagged_handler("root-success"));
        let root: ConfigHandle = root;

        let mut leaf = BasicConfig::new(Some(root.clone()));
        leaf.on_status(404, tagged_handler("leaf-404"));

        // 200 at the leaf: no exact handler, no threshold handler, fall
        // through to root's success handler.
        let h = status_handler(&leaf, 200).unwrap();
        assert_eq!(run(&h, 200), "root-success");

        // 404 at the leaf: exact handler wins.
        let h = status_handler(&leaf, 404).unwrap();
        assert_eq!(run(&h, 404), "leaf-404");
    }

    #[test]
    fn node_threshold_handler_shadows_ancestor_exact_handler() {
        let root = Arc::new(SharedConfig::new(None));
        root.set_status_handler(500, tagged_handler("root-500"));
        let root: ConfigHandle = root;

        let mut leaf = BasicConfig::new(Some(root.clone()));
        leaf.on_failure(tagged_handler("leaf-failure"));

        // The leaf's own failure handler is consulted before ascending, so
        // it shadows the root's exact 500 handler.
        let h = status_handler(&leaf, 500).unwrap();
        assert_eq!(run(&h, 500), "leaf-failure");
    }

    #[test]
    fn encoder_lookup_is_first_match() {
        let root = Arc::new(SharedConfig::new(None));
        root.register_encoder(
            "application/json",
            Arc::new(|_body| Ok(b"root".to_vec())),
        );
        let root: ConfigHandle = root;

        let mut leaf = BasicConfig::new(Some(root.clone()));
        leaf.encoder("application/json", Arc::new(|_body| Ok(b"leaf".to_vec())));

        let enc = encoder(&leaf, "Application/JSON").unwrap();
        assert_eq!(enc(&Body::Empty).unwrap(), b"leaf".to_vec());

        let missing = encoder(&leaf, "text/csv");
        assert!(missing.is_none());
    }

    #[test]
    fn exception_handler_resolves_up_the_chain() {
        let root = Arc::new(SharedConfig::new(None));
        root.set_exception_handler(Arc::new(|err| match err {
            HttpError::Status(code) => HttpError::Status(code + 1),
            other => other,
        }));
        let root: ConfigHandle = root;

        let leaf = BasicConfig::new(Some(root.clone()));
        let handler = exception_handler(&leaf).unwrap();
        assert!(matches!(handler(HttpError::Status(500)), HttpError::Status(501)));
    }

    #[test]
    fn context_values_resolve_by_pair() {
        let root = Arc::new(SharedConfig::new(None));
        root.put_context("application/json", "pretty", Arc::new(true));
        let root: ConfigHandle = root;

        let leaf = BasicConfig::new(Some(root.clone()));
        let value = context_value(&leaf, "application/json", "pretty").unwrap();
        assert_eq!(value.downcast_ref::<bool>(), Some(&true));
        assert!(context_value(&leaf, "application/json", "indent").is_none());
    }
}
