//! Authentication: the provider credential session and the PSK guard for the
//! REST surface.
//!
//! The PSK check uses constant-time comparison to mitigate timing attacks.

mod session;

pub use session::*;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Header carrying the server's pre-shared key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// PSK guard for the REST surface.
///
/// This protects access to this server only; the provider credential lives in
/// [`Session`]. With no PSK configured every request passes.
pub async fn psk_auth_layer(expected_psk: Option<String>, request: Request, next: Next) -> Response {
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    match presented_key(&request) {
        Some(key) if keys_match(key, &expected) => next.run(request).await,
        Some(_) => AppError::Auth("Invalid API key".to_string()).into_response(),
        None => AppError::Auth("Missing API key".to_string()).into_response(),
    }
}

/// Key from `x-api-key`, falling back to an `Authorization: Bearer` header.
fn presented_key(request: &Request) -> Option<&str> {
    let headers = request.headers();
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
}

/// Constant-time key comparison.
fn keys_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("psk-123", "psk-123"));
        assert!(!keys_match("psk-123", "psk-124"));
        assert!(!keys_match("short", "much-longer-key"));
        assert!(keys_match("", ""));
    }

    #[test]
    fn test_presented_key_prefers_api_key_header() {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .headers_mut()
            .insert(API_KEY_HEADER, HeaderValue::from_static("from-header"));
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(presented_key(&request), Some("from-header"));
    }

    #[test]
    fn test_presented_key_bearer_fallback() {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(presented_key(&request), Some("from-bearer"));

        let request = Request::new(axum::body::Body::empty());
        assert_eq!(presented_key(&request), None);
    }
}
