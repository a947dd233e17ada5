//! Input sanitizing for query strings, JSON and form bodies, and path
//! parameters.

use std::collections::HashMap;
use std::str::FromStr;

use assist_core::sanitize::{is_secret_field, sanitize_str, sanitize_value};
use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{FromRequestParts, Path, Request},
    http::{HeaderValue, Uri, header, request::Parts, uri::PathAndQuery},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use url::form_urlencoded;

use crate::error::AppError;

/// Largest body the sanitizer will buffer.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Rewrites the query string and JSON/form bodies with sanitized values.
/// Bodies that fail to parse are passed on untouched.
pub async fn sanitize_input(request: Request, next: Next) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    if let Some(uri) = sanitize_uri(&parts.uri) {
        parts.uri = uri;
    }

    let kind = BodyKind::of(&parts.headers);
    let request = match kind {
        BodyKind::Other => Request::from_parts(parts, body),
        BodyKind::Json | BodyKind::Form => {
            let bytes = to_bytes(body, MAX_BODY_BYTES)
                .await
                .map_err(|_| AppError::Validation("Request body too large".into()))?;
            let bytes = match kind {
                BodyKind::Json => sanitize_json(&bytes),
                _ => Some(sanitize_form(&bytes)),
            }
            .unwrap_or(bytes);
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            Request::from_parts(parts, Body::from(bytes))
        }
    };

    Ok(next.run(request).await)
}

#[derive(Clone, Copy)]
enum BodyKind {
    Json,
    Form,
    Other,
}

impl BodyKind {
    fn of(headers: &axum::http::HeaderMap) -> Self {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if is_json_essence(essence) {
            BodyKind::Json
        } else if essence == "application/x-www-form-urlencoded" {
            BodyKind::Form
        } else {
            BodyKind::Other
        }
    }
}

/// `application/json` or any `application/*+json`, matching what axum's
/// `Json` extractor accepts.
fn is_json_essence(essence: &str) -> bool {
    essence
        .strip_prefix("application/")
        .is_some_and(|subtype| subtype == "json" || subtype.ends_with("+json"))
}

fn sanitize_json(bytes: &Bytes) -> Option<Bytes> {
    if bytes.is_empty() {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "leaving unparseable JSON body untouched");
            return None;
        }
    };
    serde_json::to_vec(&sanitize_value(value)).ok().map(Bytes::from)
}

fn sanitize_pairs(input: &[u8]) -> String {
    let mut out = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(input) {
        if is_secret_field(&key) {
            out.append_pair(&key, &value);
        } else {
            out.append_pair(&key, &sanitize_str(&value));
        }
    }
    out.finish()
}

fn sanitize_form(bytes: &Bytes) -> Bytes {
    Bytes::from(sanitize_pairs(bytes))
}

fn sanitize_uri(uri: &Uri) -> Option<Uri> {
    let query = uri.query().filter(|q| !q.is_empty())?;
    let cleaned = sanitize_pairs(query.as_bytes());
    let path_and_query = PathAndQuery::from_str(&format!("{}?{cleaned}", uri.path())).ok()?;
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).ok()
}

/// Path parameters with every value sanitized.
#[derive(Debug, Clone)]
pub struct SanitizedParams(pub HashMap<String, String>);

impl SanitizedParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Parse parameter `name`, mapping absence or a bad value to a
    /// validation error.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T, AppError> {
        self.get(name)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| AppError::Validation(format!("invalid path parameter: {name}")))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SanitizedParams {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(Self(
            params
                .into_iter()
                .map(|(k, v)| (k, sanitize_str(&v)))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_cleaned() {
        let uri: Uri = "/api/search?q=%3Cscript%3Ealert(1)&page=2".parse().unwrap();
        let cleaned = sanitize_uri(&uri).unwrap();
        assert_eq!(cleaned.path(), "/api/search");
        let pairs: Vec<(String, String)> = form_urlencoded::parse(cleaned.query().unwrap().as_bytes())
            .into_owned()
            .collect();
        assert_eq!(
            pairs,
            [
                ("q".to_string(), "scriptalert(1)".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        assert!(sanitize_uri(&"/health".parse().unwrap()).is_none());
    }

    #[test]
    fn json_bodies_are_cleaned_except_secrets() {
        let body = Bytes::from_static(br#"{"name":"<b>Ana</b>","password":"<p@ss>"}"#);
        let cleaned: serde_json::Value =
            serde_json::from_slice(&sanitize_json(&body).unwrap()).unwrap();
        assert_eq!(cleaned["name"], "bAna/b");
        assert_eq!(cleaned["password"], "<p@ss>");
    }

    fn kind_of(content_type: &'static str) -> BodyKind {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        BodyKind::of(&headers)
    }

    #[test]
    fn json_media_types_include_suffixed_subtypes() {
        for ct in [
            "application/json",
            "application/json; charset=utf-8",
            "Application/JSON",
            "application/vnd.api+json",
            "application/merge-patch+json; charset=utf-8",
        ] {
            assert!(matches!(kind_of(ct), BodyKind::Json), "{ct}");
        }
        for ct in ["text/json", "application/jsonp", "application/json-seq", "text/plain"] {
            assert!(matches!(kind_of(ct), BodyKind::Other), "{ct}");
        }
        assert!(matches!(
            kind_of("application/x-www-form-urlencoded; charset=utf-8"),
            BodyKind::Form
        ));
    }

    #[test]
    fn invalid_json_is_left_alone() {
        assert!(sanitize_json(&Bytes::from_static(b"{not json")).is_none());
        assert!(sanitize_json(&Bytes::new()).is_none());
    }

    #[test]
    fn form_bodies_are_cleaned() {
        let cleaned = sanitize_form(&Bytes::from_static(
            b"bio=javascript%3Aalert(1)&password=%3Cx%3E",
        ));
        let pairs: HashMap<String, String> = form_urlencoded::parse(&cleaned).into_owned().collect();
        assert_eq!(pairs["bio"], "alert(1)");
        assert_eq!(pairs["password"], "<x>");
    }
}
