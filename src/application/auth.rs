use async_trait::async_trait;
use thiserror::Error;

use crate::domain::users::AuthUser;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("access token rejected")]
    InvalidToken,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Resolves a bearer token to the calling user.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// Extracts the token from an `Authorization: Bearer …` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingToken)?.trim();
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).ok(), Some("abc.def"));
        assert_eq!(bearer_token(Some("bearer   tok ")).ok(), Some("tok"));
    }

    #[test]
    fn rejects_missing_or_foreign_schemes() {
        assert!(matches!(bearer_token(None), Err(AuthError::MissingToken)));
        assert!(matches!(bearer_token(Some("Basic Zm9v")), Err(AuthError::MissingToken)));
        assert!(matches!(bearer_token(Some("Bearer")), Err(AuthError::MissingToken)));
        assert!(matches!(bearer_token(Some("Bearer ")), Err(AuthError::MissingToken)));
    }
}
