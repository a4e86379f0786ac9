//! Content encoders and parsers.
//!
//! Codecs are plain functions looked up by content type through the config
//! chain (first match wins, leaf to root). The defaults below are installed
//! on the process-wide root node; any node may override or extend them via
//! [`register_codec`] or the per-node `encoder`/`parser` setters.
//!
//! Raw bytes act as the universal fallback parser: a response with an
//! unknown content type is never an error, it just comes back as bytes.

use std::sync::Arc;

use crate::config::{Body, EncoderFn, ParserFn, SharedConfig};
use crate::errors::HttpError;
use crate::net::Response;

pub const TEXT: &str = "text/plain";
pub const JSON: &str = "application/json";
pub const FORM: &str = "application/x-www-form-urlencoded";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Registers an encoder/parser pair for `content_type` on `node`.
pub fn register_codec(
    node: &SharedConfig,
    content_type: &str,
    encoder: EncoderFn,
    parser: ParserFn,
) {
    node.register_encoder(content_type, encoder);
    node.register_parser(content_type, parser);
}

/// Installs the baked-in codecs on a (root) node.
pub fn install_defaults(node: &SharedConfig) {
    register_codec(node, TEXT, Arc::new(encode_text), Arc::new(parse_text));
    register_codec(node, JSON, Arc::new(encode_json), Arc::new(parse_json));
    node.register_encoder(FORM, Arc::new(encode_form));
    register_codec(
        node,
        OCTET_STREAM,
        Arc::new(encode_bytes),
        Arc::new(parse_bytes),
    );
}

/// Fallback parser used when no registered parser matches the response
/// content type.
pub fn fallback_parser() -> ParserFn {
    Arc::new(parse_bytes)
}

fn encode_text(body: &Body) -> Result<Vec<u8>, HttpError> {
    match body {
        Body::Text(s) => Ok(s.clone().into_bytes()),
        Body::Bytes(b) => Ok(b.clone()),
        Body::Empty => Ok(Vec::new()),
        other => Err(HttpError::Encode(format!(
            "text encoder cannot encode {other:?}"
        ))),
    }
}

fn encode_json(body: &Body) -> Result<Vec<u8>, HttpError> {
    match body {
        Body::Json(value) => {
            serde_json::to_vec(value).map_err(|e| HttpError::Encode(e.to_string()))
        }
        // Pre-serialized JSON text passes through untouched.
        Body::Text(s) => Ok(s.clone().into_bytes()),
        Body::Bytes(b) => Ok(b.clone()),
        other => Err(HttpError::Encode(format!(
            "json encoder cannot encode {other:?}"
        ))),
    }
}

fn encode_form(body: &Body) -> Result<Vec<u8>, HttpError> {
    match body {
        Body::Form(pairs) => {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (name, value) in pairs {
                serializer.append_pair(name, value);
            }
            Ok(serializer.finish().into_bytes())
        }
        other => Err(HttpError::Encode(format!(
            "form encoder cannot encode {other:?}"
        ))),
    }
}

fn encode_bytes(body: &Body) -> Result<Vec<u8>, HttpError> {
    match body {
        Body::Bytes(b) => Ok(b.clone()),
        Body::Text(s) => Ok(s.clone().into_bytes()),
        Body::Empty => Ok(Vec::new()),
        other => Err(HttpError::Encode(format!(
            "byte encoder cannot encode {other:?}"
        ))),
    }
}

fn parse_text(response: &Response) -> Result<Body, HttpError> {
    Ok(Body::Text(
        String::from_utf8_lossy(&response.body).into_owned(),
    ))
}

fn parse_json(response: &Response) -> Result<Body, HttpError> {
    serde_json::from_slice(&response.body)
        .map(Body::Json)
        .map_err(|e| HttpError::Parse(e.to_string()))
}

fn parse_bytes(response: &Response) -> Result<Body, HttpError> {
    Ok(Body::Bytes(response.body.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    fn response(body: &[u8]) -> Response {
        Response {
            url: "http://example.com/".parse().unwrap(),
            status: 200,
            status_text: "OK".to_string(),
            headers: HeaderMap::new(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn json_codec_round_trips_a_value() {
        let value = serde_json::json!({"id": 7, "name": "x"});
        let bytes = encode_json(&Body::Json(value.clone())).unwrap();
        match parse_json(&response(&bytes)).unwrap() {
            Body::Json(parsed) => assert_eq!(parsed, value),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn json_parse_failure_is_a_parse_error() {
        assert!(matches!(
            parse_json(&response(b"{nope")),
            Err(HttpError::Parse(_))
        ));
    }

    #[test]
    fn form_encoder_percent_encodes_pairs() {
        let body = Body::Form(vec![
            ("q".to_string(), "a b".to_string()),
            ("lang".to_string(), "en".to_string()),
        ]);
        let bytes = encode_form(&body).unwrap();
        assert_eq!(bytes, b"q=a+b&lang=en".to_vec());
    }

    #[test]
    fn form_encoder_rejects_other_bodies() {
        assert!(matches!(
            encode_form(&Body::Text("x".into())),
            Err(HttpError::Encode(_))
        ));
    }

    #[test]
    fn fallback_parser_returns_raw_bytes() {
        let parser = fallback_parser();
        match parser(&response(b"\x00\x01")).unwrap() {
            Body::Bytes(b) => assert_eq!(b, vec![0, 1]),
            other => panic!("unexpected body: {other:?}"),
        }
    }
}
