use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use shared_config::AppConfig;

/// Postgres `unique_violation`, surfaced by PostgREST in the error body.
const UNIQUE_VIOLATION: &str = "23505";

/// Classified PostgREST failure. Returned inside `anyhow::Error` so callers can
/// `downcast_ref` when they care about the kind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    Duplicate(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl SupabaseError {
    fn classify(status: u16, body: String) -> Self {
        match status {
            401 | 403 => SupabaseError::Auth(body),
            404 => SupabaseError::NotFound(body),
            409 => SupabaseError::Duplicate(body),
            _ if body.contains(UNIQUE_VIOLATION) => SupabaseError::Duplicate(body),
            _ => SupabaseError::Api { status, body },
        }
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_token: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        let service_token = if config.supabase_service_role_key.is_empty() {
            None
        } else {
            Some(config.supabase_service_role_key.clone())
        };

        let api_key = if config.supabase_anon_key.is_empty() {
            config.supabase_service_role_key.clone()
        } else {
            config.supabase_anon_key.clone()
        };

        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key,
            service_token,
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token.or(self.service_token.as_deref()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            let classified = SupabaseError::classify(status.as_u16(), error_text);

            // Unique violations are an expected outcome for callers racing on a slot.
            match &classified {
                SupabaseError::Duplicate(_) => info!("API rejected duplicate row ({})", status),
                _ => error!("API error ({}): {}", status, classified),
            }

            return Err(anyhow!(classified));
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Header asking PostgREST to echo the written rows back.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_conflicts_as_duplicates() {
        assert!(matches!(SupabaseError::classify(409, "dup".into()), SupabaseError::Duplicate(_)));
        assert!(matches!(
            SupabaseError::classify(400, r#"{"code":"23505"}"#.into()),
            SupabaseError::Duplicate(_)
        ));
        assert!(matches!(SupabaseError::classify(404, "".into()), SupabaseError::NotFound(_)));
        assert!(matches!(SupabaseError::classify(500, "boom".into()), SupabaseError::Api { status: 500, .. }));
    }
}
