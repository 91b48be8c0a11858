//! Response construction.
//!
//! # Responsibilities
//! - Turn routing outcomes into HTTP responses
//! - Relay function responses (status, headers, body) verbatim
//! - Map dispatch and storage failures to 500 / 502 / 504
//!
//! # Design Decisions
//! - Hop-by-hop headers from a function are stripped; hyper re-frames the body
//! - Object metadata becomes `Content-Type`, `Cache-Control`, `Expires`,
//!   `Last-Modified`
//! - A redirect target that is not a valid header value is a server error

use axum::{
    body::Body,
    http::{
        header::{
            ALLOW, CACHE_CONTROL, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, EXPIRES,
            LAST_MODIFIED, LOCATION, TRANSFER_ENCODING, UPGRADE, WWW_AUTHENTICATE,
        },
        HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};

use crate::functions::{DispatchError, FunctionResponse};
use crate::http::middleware::cors::ALLOWED_METHODS;
use crate::security::basic::challenge;
use crate::storage::StoredObject;

const HOP_BY_HOP: &[&str] = &["keep-alive", "proxy-connection", "te", "trailer"];

fn text(status: StatusCode, body: &'static str) -> Response {
    (status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// 401 with a Basic challenge.
pub fn unauthorized(realm: &str) -> Response {
    match HeaderValue::from_str(&challenge(realm)) {
        Ok(value) => (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, value)],
            "Unauthorized",
        )
            .into_response(),
        Err(_) => {
            tracing::error!(realm, "Realm cannot be sent in a header");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

pub fn redirect(target: &str, status: StatusCode) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => (status, [(LOCATION, location)]).into_response(),
        Err(_) => {
            tracing::error!(location = %target, "Redirect target cannot be sent in a header");
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn set_metadata(response: &mut Response, name: HeaderName, value: Option<&str>) {
    if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
        response.headers_mut().insert(name, value);
    }
}

/// An object from the store, with its metadata.
pub fn object(status: StatusCode, object: StoredObject) -> Response {
    let mut response = Response::new(Body::from(object.body));
    *response.status_mut() = status;

    set_metadata(&mut response, CONTENT_TYPE, object.content_type.as_deref());
    set_metadata(&mut response, CACHE_CONTROL, object.cache_control.as_deref());
    set_metadata(&mut response, EXPIRES, object.expires.as_deref());
    set_metadata(&mut response, LAST_MODIFIED, object.last_modified.as_deref());
    response
}

fn error_page(status: StatusCode, page: Option<StoredObject>, fallback: &'static str) -> Response {
    match page {
        Some(page) => object(status, page),
        None => text(status, fallback),
    }
}

/// 404, using the site's own page when it has one.
pub fn not_found(page: Option<StoredObject>) -> Response {
    error_page(StatusCode::NOT_FOUND, page, "Page Not Found")
}

/// 500 for a failed store lookup, using the site's own page when it has one.
pub fn server_error(page: Option<StoredObject>) -> Response {
    error_page(StatusCode::INTERNAL_SERVER_ERROR, page, "Internal Server Error")
}

/// 504 for a store that did not answer; the body is the site's 500 page.
pub fn store_timeout(page: Option<StoredObject>) -> Response {
    error_page(StatusCode::GATEWAY_TIMEOUT, page, "Gateway Timeout")
}

pub fn gateway_timeout() -> Response {
    text(StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout")
}

pub fn bad_request() -> Response {
    text(StatusCode::BAD_REQUEST, "Bad Request")
}

pub fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(ALLOW, ALLOWED_METHODS)],
        "Method Not Allowed",
    )
        .into_response()
}

/// Plain answer to an OPTIONS request.
pub fn options(status: StatusCode) -> Response {
    (status, [(ALLOW, ALLOWED_METHODS)]).into_response()
}

pub fn forbidden() -> Response {
    text(StatusCode::FORBIDDEN, "Forbidden")
}

pub fn payload_too_large() -> Response {
    text(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
}

/// Relay a function's answer.
pub fn relay(function: FunctionResponse) -> Response {
    let mut response = Response::new(Body::from(function.body));
    *response.status_mut() = function.status;

    let headers = response.headers_mut();
    *headers = function.headers;
    for name in [CONNECTION, TRANSFER_ENCODING, UPGRADE, CONTENT_LENGTH] {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    response
}

pub fn dispatch_error(error: &DispatchError) -> Response {
    if error.status() == StatusCode::GATEWAY_TIMEOUT {
        gateway_timeout()
    } else {
        text(StatusCode::BAD_GATEWAY, "Bad Gateway")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use bytes::Bytes;
    use std::time::Duration;

    #[test]
    fn test_unauthorized_challenge() {
        let response = unauthorized("Admin");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Basic realm=\"Admin\"");
    }

    #[test]
    fn test_redirect_location() {
        let response = redirect("/new", StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[LOCATION], "/new");

        let response = redirect("/bad\nheader", StatusCode::FOUND);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_object_metadata() {
        let mut stored = StoredObject::new("x").with_content_type("image/png");
        stored.last_modified = Some("Tue, 01 Jan 2030 00:00:00 GMT".into());
        let response = object(StatusCode::OK, stored);

        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert!(response.headers().contains_key(LAST_MODIFIED));
        assert!(!response.headers().contains_key(EXPIRES));
    }

    #[test]
    fn test_error_pages() {
        let page = StoredObject::new("<h1>oops</h1>").with_content_type("text/html");
        let response = server_error(Some(page.clone()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html");

        let response = store_timeout(Some(page));
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html");

        let response = server_error(None);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn test_relay_strips_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-rendered-by", HeaderValue::from_static("fn"));
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));

        let response = relay(FunctionResponse {
            status: StatusCode::CREATED,
            headers,
            body: Bytes::from_static(b"ok"),
        });

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-rendered-by"], "fn");
        assert!(!response.headers().contains_key(TRANSFER_ENCODING));
        assert!(!response.headers().contains_key("keep-alive"));
    }

    #[test]
    fn test_dispatch_error_statuses() {
        assert_eq!(
            dispatch_error(&DispatchError::Timeout(Duration::from_secs(3))).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            dispatch_error(&DispatchError::Transport("refused".into())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
