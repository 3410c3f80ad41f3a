//! Minimal PostgREST client for the Supabase `rest/v1` endpoint.

use reqwest::{Client, Method, Response, StatusCode, Url, header::HeaderValue};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::application::repos::RepoError;
use crate::infra::error::InfraError;

const UNIQUE_VIOLATION: &str = "23505";

/// Query string pairs, e.g. `("user_id", "eq.<uuid>")`.
pub type Params = Vec<(&'static str, String)>;

#[derive(Debug, Deserialize, Default)]
struct PostgrestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PostgrestClient {
    http: Client,
    base: Url,
    api_key: String,
}

impl PostgrestClient {
    pub fn new(http: Client, supabase_url: &Url, api_key: &str) -> Result<Self, InfraError> {
        let base = supabase_url
            .join("rest/v1/")
            .map_err(|err| InfraError::configuration(format!("invalid supabase url: {err}")))?;
        Ok(Self {
            http,
            base,
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, table: &str, params: &[(&'static str, String)]) -> Result<Url, RepoError> {
        let mut url = self
            .base
            .join(table)
            .map_err(|err| RepoError::InvalidInput {
                message: err.to_string(),
            })?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        table: &str,
        params: &[(&'static str, String)],
        prefer: Option<&'static str>,
        body: Option<serde_json::Value>,
    ) -> Result<Response, RepoError> {
        let url = self.url(table, params)?;
        debug!(target = "noa::supabase", method = %method, table, "postgrest request");

        let mut request = self
            .http
            .request(method, url)
            .header("apikey", self.api_key.as_str())
            .header(reqwest::header::AUTHORIZATION, self.bearer()?);
        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(map_status_error(response).await)
    }

    fn bearer(&self) -> Result<HeaderValue, RepoError> {
        HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|err| {
            RepoError::InvalidInput {
                message: err.to_string(),
            }
        })
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&'static str, String)],
    ) -> Result<Vec<T>, RepoError> {
        let response = self.send(Method::GET, table, params, None, None).await?;
        decode(response).await
    }

    pub async fn insert<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<Vec<T>, RepoError> {
        let response = self
            .send(
                Method::POST,
                table,
                &[("select", "*".to_string())],
                Some("return=representation"),
                Some(to_json(body)?),
            )
            .await?;
        decode(response).await
    }

    /// Insert-or-merge keyed by `on_conflict`.
    pub async fn upsert<B: Serialize>(
        &self,
        table: &str,
        on_conflict: &str,
        body: &B,
    ) -> Result<(), RepoError> {
        self.send(
            Method::POST,
            table,
            &[("on_conflict", on_conflict.to_string())],
            Some("resolution=merge-duplicates,return=minimal"),
            Some(to_json(body)?),
        )
        .await?;
        Ok(())
    }

    pub async fn update<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        filters: &[(&'static str, String)],
        body: &B,
    ) -> Result<Vec<T>, RepoError> {
        let response = self
            .send(
                Method::PATCH,
                table,
                filters,
                Some("return=representation"),
                Some(to_json(body)?),
            )
            .await?;
        decode(response).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&'static str, String)],
    ) -> Result<Vec<T>, RepoError> {
        let response = self
            .send(
                Method::DELETE,
                table,
                filters,
                Some("return=representation"),
                None,
            )
            .await?;
        decode(response).await
    }
}

/// `or=(a,b,…)` value for a set of alternative conditions.
pub fn or_filter(conditions: &[String]) -> String {
    format!("({})", conditions.join(","))
}

/// `in.(a,b,…)` value for a list of ids.
pub fn in_filter<T: ToString>(values: &[T]) -> String {
    let joined = values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({joined})")
}

fn to_json<B: Serialize>(body: &B) -> Result<serde_json::Value, RepoError> {
    serde_json::to_value(body).map_err(|err| RepoError::InvalidInput {
        message: err.to_string(),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<Vec<T>, RepoError> {
    response
        .json::<Vec<T>>()
        .await
        .map_err(RepoError::from_persistence)
}

fn map_transport_error(err: reqwest::Error) -> RepoError {
    if err.is_timeout() {
        RepoError::Timeout
    } else {
        RepoError::from_persistence(err)
    }
}

async fn map_status_error(response: Response) -> RepoError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    classify_error(status, &text)
}

fn classify_error(status: StatusCode, text: &str) -> RepoError {
    let body: PostgrestErrorBody = serde_json::from_str(text).unwrap_or_default();
    let message = body
        .message
        .clone()
        .unwrap_or_else(|| format!("status {status}"));

    if body.code.as_deref() == Some(UNIQUE_VIOLATION) || status == StatusCode::CONFLICT {
        return RepoError::Duplicate {
            constraint: body.details.unwrap_or(message),
        };
    }
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            RepoError::InvalidInput { message }
        }
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => RepoError::Timeout,
        _ => RepoError::Persistence(format!("{status}: {message}")),
    }
}
