//! Bearer-token authentication against the external identity service.
//!
//! Regular endpoints carry the token in the Authorization header; the
//! streaming endpoints receive it as a `token` query parameter because
//! browser streaming APIs cannot set headers.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;

use jobscout_core::UserId;

use crate::error::ApiError;

/// Resolves a bearer token to the authenticated user.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<UserId, ApiError>;
}

/// Pull the bearer token out of an Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))
}

/// Verifier backed by the external identity service.
pub struct HttpTokenVerifier {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    user_id: i64,
}

impl HttpTokenVerifier {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<UserId, ApiError> {
        let response = self
            .client
            .get(format!("{}/verify", self.base_url))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("identity service: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized("invalid token".into()));
        }
        if !response.status().is_success() {
            return Err(ApiError::Internal(format!(
                "identity service: HTTP {}",
                response.status()
            )));
        }

        let body: VerifyResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Internal(format!("identity service: {e}")))?;
        Ok(UserId::new(body.user_id))
    }
}

/// Fixed token table for local development and tests.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, UserId>) -> Self {
        Self { tokens }
    }

    /// Parse a `token=user_id,token=user_id` spec.
    pub fn from_spec(spec: &str) -> Self {
        let tokens = spec
            .split(',')
            .filter_map(|pair| {
                let (token, user) = pair.trim().split_once('=')?;
                Some((token.to_string(), UserId::new(user.parse().ok()?)))
            })
            .collect();
        Self { tokens }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<UserId, ApiError> {
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| ApiError::Unauthorized("invalid token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer tok-123".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "tok-123");

        let empty = HeaderMap::new();
        assert!(bearer_token(&empty).is_err());
    }

    #[tokio::test]
    async fn test_static_verifier_from_spec() {
        let verifier = StaticTokenVerifier::from_spec("alpha=1, beta=42,malformed");
        assert_eq!(verifier.verify("alpha").await.unwrap(), UserId::new(1));
        assert_eq!(verifier.verify("beta").await.unwrap(), UserId::new(42));
        assert!(verifier.verify("malformed").await.is_err());
        assert!(verifier.verify("missing").await.is_err());
    }
}
