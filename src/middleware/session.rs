//! The anonymous cart key travels in the `x-cart-session` header.
//!
//! A request without the header gets a freshly minted token, and every cart
//! or checkout response echoes the token back so the client can keep it.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderName, HeaderValue, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};
use uuid::Uuid;

use crate::error::AppError;

pub const SESSION_HEADER: HeaderName = HeaderName::from_static("x-cart-session");

const MAX_TOKEN_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSession {
    pub token: String,
}

impl CartSession {
    pub fn mint() -> Self {
        Self {
            token: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if !is_valid_token(raw) {
            return Err(AppError::BadRequest(format!(
                "invalid {SESSION_HEADER} header"
            )));
        }
        Ok(Self {
            token: raw.to_owned(),
        })
    }
}

fn is_valid_token(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= MAX_TOKEN_LEN
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

impl<S> FromRequestParts<S> for CartSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(&SESSION_HEADER) {
            None => Ok(Self::mint()),
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| AppError::BadRequest(format!("invalid {SESSION_HEADER} header")))?;
                Self::parse(raw)
            }
        }
    }
}

/// Echoes the session token on a response.
#[derive(Debug, Clone)]
pub struct SessionHeader(pub String);

impl IntoResponseParts for SessionHeader {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        // tokens are validated or minted, so they are always valid header values
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            res.headers_mut().insert(SESSION_HEADER, value);
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<CartSession, AppError> {
        let (mut parts, _) = request.into_parts();
        CartSession::from_request_parts(&mut parts, &()).await
    }

    #[test]
    fn minted_tokens_are_valid() {
        let session = CartSession::mint();
        assert_eq!(session.token.len(), 32);
        assert!(CartSession::parse(&session.token).is_ok());
    }

    #[test]
    fn rejects_malformed_tokens() {
        for raw in ["", "has space", "semi;colon", &"a".repeat(65)] {
            assert!(CartSession::parse(raw).is_err(), "accepted {raw:?}");
        }
        assert!(CartSession::parse("abc_DEF-123").is_ok());
    }

    #[tokio::test]
    async fn header_token_is_kept_and_missing_one_is_minted() {
        let given = Request::builder()
            .header(&SESSION_HEADER, "guest-a")
            .body(())
            .expect("request");
        assert_eq!(extract(given).await.ok(), Some(CartSession { token: "guest-a".into() }));

        let first = extract(Request::new(())).await.expect("minted");
        let second = extract(Request::new(())).await.expect("minted");
        assert_ne!(first.token, second.token);

        let bad = Request::builder()
            .header(&SESSION_HEADER, "not a token!")
            .body(())
            .expect("request");
        assert!(matches!(extract(bad).await, Err(AppError::BadRequest(_))));
    }
}
