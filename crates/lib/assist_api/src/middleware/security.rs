//! Security response headers and the CSRF origin guard.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

static X_CONTENT_TYPE_OPTIONS: HeaderName = HeaderName::from_static("x-content-type-options");
static X_FRAME_OPTIONS: HeaderName = HeaderName::from_static("x-frame-options");
static X_XSS_PROTECTION: HeaderName = HeaderName::from_static("x-xss-protection");
static REFERRER_POLICY: HeaderName = HeaderName::from_static("referrer-policy");
static STRICT_TRANSPORT_SECURITY: HeaderName =
    HeaderName::from_static("strict-transport-security");
static X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Adds the standard security headers to every response and strips server
/// fingerprinting headers. HSTS is only sent in hardened mode.
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        X_CONTENT_TYPE_OPTIONS.clone(),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(X_FRAME_OPTIONS.clone(), HeaderValue::from_static("DENY"));
    headers.insert(
        X_XSS_PROTECTION.clone(),
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        REFERRER_POLICY.clone(),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    if state.config.is_hardened() {
        headers.insert(
            STRICT_TRANSPORT_SECURITY.clone(),
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    headers.remove(header::SERVER);
    headers.remove(&X_POWERED_BY);

    response
}

fn is_state_changing(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Origin of the request from `Origin`, falling back to `Referer`.
/// An unparseable `Referer` yields an origin that matches nothing.
fn request_origin(headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = headers.get(header::ORIGIN) {
        return Some(
            origin
                .to_str()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
        );
    }
    let referer = headers.get(header::REFERER)?;
    Some(
        referer
            .to_str()
            .ok()
            .and_then(|r| url::Url::parse(r).ok())
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_default(),
    )
}

/// Rejects state-changing requests whose `Origin`/`Referer` is not an
/// allowed origin. Requests carrying neither header pass. Outside hardened
/// mode a mismatch is only logged.
pub async fn csrf_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if is_state_changing(request.method())
        && let Some(origin) = request_origin(request.headers())
        && !state.config.allows_origin(&origin)
    {
        if state.config.is_hardened() {
            warn!(%origin, path = %request.uri().path(), "cross-site request rejected");
            return Err(AppError::CsrfRejected);
        }
        warn!(%origin, path = %request.uri().path(), "cross-site request allowed outside production");
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn safe_methods_are_exempt() {
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::HEAD));
        assert!(!is_state_changing(&Method::OPTIONS));
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::DELETE));
    }

    #[test]
    fn origin_prefers_origin_header() {
        let map = headers(&[
            (header::ORIGIN, "https://a.example"),
            (header::REFERER, "https://b.example/page"),
        ]);
        assert_eq!(request_origin(&map).as_deref(), Some("https://a.example"));
    }

    #[test]
    fn origin_from_referer() {
        let map = headers(&[(header::REFERER, "http://localhost:5173/login?next=/")]);
        assert_eq!(
            request_origin(&map).as_deref(),
            Some("http://localhost:5173")
        );
        assert_eq!(request_origin(&HeaderMap::new()), None);
    }

    #[test]
    fn garbage_referer_matches_nothing() {
        let map = headers(&[(header::REFERER, "not a url")]);
        assert_eq!(request_origin(&map).as_deref(), Some(""));
    }
}
