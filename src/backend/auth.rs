//! Store authentication
//!
//! The HTTP client asks a [`TokenProvider`] for a token before each request.
//! After a 401 it asks again with `force_refresh` set and retries once.

use async_trait::async_trait;

use super::BackendResult;

/// Header used when a provider does not name its own
pub const DEFAULT_AUTH_HEADER: &str = "X-Auth-Token";

/// Source of authentication tokens for store requests
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current token, or `None` when requests go out unauthenticated
    ///
    /// With `force_refresh` the provider must not hand back a cached token.
    async fn token(&self, force_refresh: bool) -> BackendResult<Option<String>>;

    /// Header the token is sent in
    fn header_name(&self) -> &str {
        DEFAULT_AUTH_HEADER
    }
}

/// Unauthenticated access
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl TokenProvider for NoAuth {
    async fn token(&self, _force_refresh: bool) -> BackendResult<Option<String>> {
        Ok(None)
    }
}

/// A fixed, pre-issued token
///
/// Refreshing returns the same token, so a store that keeps rejecting it
/// surfaces as an auth failure after the single retry.
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
    header: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            header: DEFAULT_AUTH_HEADER.to_string(),
        }
    }

    /// Builder method: send the token in a different header
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self, _force_refresh: bool) -> BackendResult<Option<String>> {
        Ok(Some(self.token.clone()))
    }

    fn header_name(&self) -> &str {
        &self.header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_auth() {
        assert_eq!(NoAuth.token(false).await.unwrap(), None);
        assert_eq!(NoAuth.header_name(), "X-Auth-Token");
    }

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticToken::new("secret").with_header("Authorization");
        assert_eq!(provider.token(true).await.unwrap(), Some("secret".to_string()));
        assert_eq!(provider.header_name(), "Authorization");
    }
}
