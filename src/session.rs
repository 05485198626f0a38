//! The session boundary.
//!
//! Sign-in happens elsewhere. By the time a request reaches the form the
//! identity provider has handed the browser an ID token, which arrives either
//! as a bearer token or in a cookie.
use std::future::Future;

use axum::http::{
    HeaderMap,
    header::{AUTHORIZATION, COOKIE},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Clone, PartialEq, Eq)]
pub struct IdToken(String);

impl std::fmt::Debug for IdToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("IdToken(..)")
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

impl IdToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Expiry from the JWT `exp` claim. `None` if the token is not a readable JWT.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let payload = self.0.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;

        DateTime::from_timestamp(claims.exp?, 0)
    }

    /// Opaque tokens are left for the identity service to judge.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

pub trait SessionProvider {
    fn id_token(&self) -> impl Future<Output = Option<IdToken>> + Send;
}

/// Session carried by an incoming request.
#[derive(Debug, Clone, Default)]
pub struct RequestSession {
    token: Option<IdToken>,
}

impl RequestSession {
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        let token = bearer_token(headers)
            .or_else(|| cookie_value(headers, cookie_name))
            .filter(|t| !t.is_empty())
            .map(IdToken::new);

        Self { token }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl From<IdToken> for RequestSession {
    fn from(token: IdToken) -> Self {
        Self { token: Some(token) }
    }
}

impl SessionProvider for RequestSession {
    async fn id_token(&self) -> Option<IdToken> {
        self.token.clone()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;

    Some(token.trim().to_string())
}

/// Looks a cookie up across every `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Login map key identifying the user pool that issued the token.
pub fn login_key(provider_region: &str, user_pool_id: &str) -> String {
    format!("cognito-idp.{provider_region}.amazonaws.com/{user_pool_id}")
}

#[cfg(test)]
pub(crate) fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user","exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[tokio::test]
    async fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("id_token=from-cookie"));

        let session = RequestSession::from_headers(&headers, "id_token");
        assert_eq!(session.id_token().await, Some(IdToken::new("from-header")));
    }

    #[tokio::test]
    async fn cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("form_session=abc; id_token=tok"));

        let session = RequestSession::from_headers(&headers, "id_token");
        assert_eq!(session.id_token().await, Some(IdToken::new("tok")));
    }

    #[tokio::test]
    async fn no_token_means_no_session() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("id_token="));

        let session = RequestSession::from_headers(&headers, "id_token");
        assert_eq!(session.id_token().await, None);
    }

    #[test]
    fn expiry_read_from_claims() {
        let token = IdToken::new(jwt_with_exp(1_700_000_000));
        let exp = token.expires_at().unwrap();

        assert_eq!(exp.timestamp(), 1_700_000_000);
        assert!(token.is_expired(DateTime::from_timestamp(1_700_000_001, 0).unwrap()));
        assert!(!token.is_expired(DateTime::from_timestamp(1_699_999_999, 0).unwrap()));
    }

    #[test]
    fn opaque_token_never_expires_locally() {
        let token = IdToken::new("opaque");
        assert_eq!(token.expires_at(), None);
        assert!(!token.is_expired(Utc::now()));
    }

    #[test]
    fn login_key_names_user_pool() {
        assert_eq!(
            login_key("us-east-1", "us-east-1_AbCd"),
            "cognito-idp.us-east-1.amazonaws.com/us-east-1_AbCd"
        );
    }
}
