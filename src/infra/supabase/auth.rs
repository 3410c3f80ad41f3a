use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::auth::{AuthError, Authenticator};
use crate::domain::users::{AuthUser, UserRole};
use crate::infra::error::InfraError;

/// Verifies access tokens against Supabase `GET /auth/v1/user`.
#[derive(Clone)]
pub struct SupabaseAuth {
    http: Client,
    user_url: Url,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: AppMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    role: Option<String>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(user: SupabaseUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: UserRole::parse(user.app_metadata.role.as_deref()),
        }
    }
}

impl SupabaseAuth {
    pub fn new(http: Client, supabase_url: &Url, anon_key: &str) -> Result<Self, InfraError> {
        let user_url = supabase_url
            .join("auth/v1/user")
            .map_err(|err| InfraError::configuration(format!("invalid supabase url: {err}")))?;
        Ok(Self {
            http,
            user_url,
            anon_key: anon_key.to_string(),
        })
    }
}

#[async_trait]
impl Authenticator for SupabaseAuth {
    async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .http
            .get(self.user_url.clone())
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| AuthError::Unavailable(err.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<SupabaseUser>()
                .await
                .map(AuthUser::from)
                .map_err(|err| AuthError::Unavailable(err.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            status => Err(AuthError::Unavailable(format!("auth returned {status}"))),
        }
    }
}
