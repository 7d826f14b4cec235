//! Session middleware and request extractors.
//!
//! Sessions live server-side; the browser only holds the opaque token in the
//! `hs_session` cookie. The middleware resolves the token, refreshes the
//! session's expiry, re-issues the cookie and injects the [`Session`] into
//! request extensions for downstream handlers.
//!
//! # Extracting the session
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use hydraulisc::Session;
//!
//! async fn protected_handler(Extension(session): Extension<Session>) -> String {
//!     format!("Signed in as {}", session.identity())
//! }
//! # let _ = protected_handler;
//! ```

use std::{convert::Infallible, net::{IpAddr, SocketAddr}};

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, header::SET_COOKIE, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Duration;
use hydraulisc::AuthError;

use super::{AppState, errors::ApiError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "hs_session";

/// Header carrying the original client address behind a proxy
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Session token from the request cookies, if any
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

fn base_cookie(value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Cookie handing out a session token
pub fn session_cookie(token: &str, ttl: Duration) -> Cookie<'static> {
    base_cookie(token.to_string(), ttl.num_seconds().max(0))
}

/// Cookie removing the session cookie from the browser
pub fn clear_session_cookie() -> Cookie<'static> {
    base_cookie(String::new(), 0)
}

/// Require a live session
///
/// # Behavior
///
/// - **Success**: Session valid → expiry refreshed → `Session` injected → cookie re-issued
/// - **Missing cookie / unknown token**: `401 Unauthorized`
/// - **Expired session**: `401 Unauthorized`, session deleted
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(request.headers()).ok_or(AuthError::Unauthenticated)?;
    let session = state.auth_manager.authenticate(&token).await?;

    request.extensions_mut().insert(session);
    let response = next.run(request).await;

    // The handler may have ended the session itself
    if response.headers().contains_key(SET_COOKIE) {
        return Ok(response);
    }

    let jar = CookieJar::new().add(session_cookie(&token, state.auth_manager.session_ttl()));
    Ok((jar, response).into_response())
}

/// Rate limiting key for the calling client
///
/// The peer address, unless the peer is a trusted proxy: then the right-most
/// `X-Forwarded-For` hop that is not itself a trusted proxy. Requests without
/// connection info (in-process calls) share the `"unknown"` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl ClientKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the key for a peer given the configured trusted proxies
    pub fn resolve(peer: Option<IpAddr>, headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Self {
        let Some(peer) = peer else {
            return ClientKey("unknown".to_string());
        };

        if !trusted_proxies.contains(&peer) {
            return ClientKey(peer.to_string());
        }

        // Hops left of the last untrusted one are whatever the client claimed
        let forwarded = forwarded_hops(headers)
            .into_iter()
            .rev()
            .find(|hop| !matches!(hop.parse::<IpAddr>(), Ok(ip) if trusted_proxies.contains(&ip)));

        ClientKey(forwarded.unwrap_or_else(|| peer.to_string()))
    }
}

/// Every `X-Forwarded-For` hop in order, across repeated headers
fn forwarded_hops(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(FORWARDED_FOR_HEADER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(|hop| match hop.parse::<IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => hop.to_string(),
        })
        .collect()
}

impl FromRequestParts<AppState> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(ClientKey::resolve(peer, &parts.headers, &state.trusted_proxies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::COOKIE};

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, HeaderValue::from_static(value));
        headers
    }

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    #[test]
    fn test_session_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; hs_session=abc123; other=1"),
        );
        assert_eq!(session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_session_token_missing_or_empty() {
        assert_eq!(session_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("hs_session="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", Duration::hours(24));
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(86400)));

        let rendered = cookie.to_string();
        assert!(rendered.starts_with("hs_session=tok"));
        assert!(rendered.contains("Max-Age=86400"));

        let cleared = clear_session_cookie();
        assert_eq!(cleared.value(), "");
        assert!(cleared.to_string().contains("Max-Age=0"));
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarded_header() {
        let headers = forwarded("203.0.113.7");
        let key = ClientKey::resolve(Some(ip("192.0.2.10")), &headers, &[]);
        assert_eq!(key.as_str(), "192.0.2.10");

        let key = ClientKey::resolve(Some(ip("192.0.2.10")), &headers, &[ip("10.0.0.1")]);
        assert_eq!(key.as_str(), "192.0.2.10");
    }

    #[test]
    fn test_trusted_proxy_takes_rightmost_untrusted_hop() {
        let trusted = [ip("10.0.0.1"), ip("10.0.0.2")];

        let headers = forwarded("198.51.100.9, 203.0.113.7, 10.0.0.2");
        let key = ClientKey::resolve(Some(ip("10.0.0.1")), &headers, &trusted);
        assert_eq!(key.as_str(), "203.0.113.7");

        // Nothing but proxies: the peer itself
        let headers = forwarded("10.0.0.2");
        let key = ClientKey::resolve(Some(ip("10.0.0.1")), &headers, &trusted);
        assert_eq!(key.as_str(), "10.0.0.1");

        let key = ClientKey::resolve(Some(ip("10.0.0.1")), &HeaderMap::new(), &trusted);
        assert_eq!(key.as_str(), "10.0.0.1");
    }

    #[test]
    fn test_forwarded_hops_span_repeated_headers() {
        let mut headers = forwarded("198.51.100.9, ");
        headers.append(FORWARDED_FOR_HEADER, HeaderValue::from_static("203.0.113.7"));
        assert_eq!(
            forwarded_hops(&headers),
            vec!["198.51.100.9".to_string(), "203.0.113.7".to_string()]
        );
    }

    #[test]
    fn test_missing_peer_is_unknown() {
        let key = ClientKey::resolve(None, &forwarded("203.0.113.7"), &[ip("10.0.0.1")]);
        assert_eq!(key.as_str(), "unknown");
    }
}
