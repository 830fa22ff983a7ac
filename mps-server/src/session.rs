//! Session identity
//!
//! Sessions are carried in a cookie. Requests without a usable cookie get a
//! fresh random id, which is handed back with `Set-Cookie` on the response.

use std::fmt;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::AppState;

const MAX_SESSION_ID_LEN: usize = 128;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept ids of 1 to 128 ASCII alphanumerics, `-` or `_`.
    pub fn parse(raw: &str) -> Option<Self> {
        let usable = !raw.is_empty()
            && raw.len() <= MAX_SESSION_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        usable.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Find `name` among the request's `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Resolve the request's session and expose it as an `Extension<SessionId>`.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let settings = &state.config.session;
    let existing = read_cookie(request.headers(), &settings.cookie_name).and_then(SessionId::parse);

    let (session, issued) = match existing {
        Some(session) => (session, false),
        None => {
            let session = SessionId::generate();
            debug!(%session, "Issuing new session");
            (session, true)
        }
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if issued {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            settings.cookie_name, session
        );
        if settings.secure_cookie {
            cookie.push_str("; Secure");
        }
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Session cookie is not a valid header value"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_and_parseable() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(SessionId::parse(a.as_str()), Some(a));
    }

    #[test]
    fn test_parse_rejects_unusable_ids() {
        assert!(SessionId::parse("").is_none());
        assert!(SessionId::parse("has space").is_none());
        assert!(SessionId::parse("semi;colon").is_none());
        assert!(SessionId::parse(&"a".repeat(129)).is_none());
        assert!(SessionId::parse("abc-DEF_123").is_some());
    }

    #[test]
    fn test_read_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; mps_session=abc123"));
        headers.append(header::COOKIE, HeaderValue::from_static("other=1"));

        assert_eq!(read_cookie(&headers, "mps_session"), Some("abc123"));
        assert_eq!(read_cookie(&headers, "other"), Some("1"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }
}
