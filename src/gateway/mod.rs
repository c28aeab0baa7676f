//! CRM REST API Gateway
//!
//! Thin typed wrapper around the CRM backend: base-URL and bearer-token
//! injection, JSON encode/decode at the boundary, and a closed error
//! taxonomy. The gateway never retries on its own; callers own that
//! decision.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ApiConfig;
use crate::session::Session;

/// Paginated list envelope returned by every CRM list endpoint
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Page<T> {
    /// Total number of records matching the query
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    /// Records on this page
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// An empty page
    pub fn empty() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: Vec::new(),
        }
    }
}

/// Error body the backend returns on non-2xx responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    detail: String,
    #[serde(default)]
    code: Option<String>,
}

/// Typed HTTP client for the CRM backend
pub struct Gateway {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Gateway {
    /// Create a gateway for the given backend, optionally authenticated
    pub fn new(config: &ApiConfig, session: Option<&Session>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: session.map(|s| s.access_token.clone()),
        }
    }

    /// Whether this gateway carries a bearer credential
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Build the absolute URL for an API path
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET a typed resource
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.send(Method::GET, path, None::<&()>, &[]).await
    }

    /// GET a typed resource with query parameters
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        self.send(Method::GET, path, None::<&()>, query).await
    }

    /// POST a JSON body, decoding a typed response
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.send(Method::POST, path, Some(body), &[]).await
    }

    /// PATCH a JSON body, decoding a typed response
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.send(Method::PATCH, path, Some(body), &[]).await
    }

    /// DELETE a resource; the backend replies with an empty body
    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        let response = self
            .request(Method::DELETE, path, None::<&()>, &[])
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Issue a request and decode the JSON response
    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let response = self
            .request(method, path, body, query)
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status().is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::Decode(e.to_string()))
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Build a request with auth header and query parameters applied
    fn request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, String)],
    ) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));

        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder
    }
}

/// Map a reqwest transport failure into the gateway taxonomy
pub(crate) fn map_transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::Unavailable
    } else {
        GatewayError::Request(e)
    }
}

/// Convert a non-2xx response into a typed error
async fn error_from_response(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let body: Option<ApiErrorBody> = response.json().await.ok();
    let message = body
        .map(|b| match b.code {
            Some(code) => format!("{} ({})", b.detail, code),
            None => b.detail,
        })
        .unwrap_or_else(|| status.to_string());

    let request_id = uuid::Uuid::new_v4();
    tracing::error!(
        request_id = %request_id,
        status = status.as_u16(),
        message = %message,
        "Backend request failed"
    );

    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::BAD_REQUEST => GatewayError::Validation(message),
        _ => GatewayError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Errors that can occur when talking to the CRM backend or IoT API
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Backend unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::UserProfile;

    #[test]
    fn test_url_joining() {
        let config = ApiConfig {
            base_url: "http://localhost:8000/api/v1/".to_string(),
            ..ApiConfig::default()
        };
        let gateway = Gateway::new(&config, None);

        assert_eq!(gateway.url("/tasks/"), "http://localhost:8000/api/v1/tasks/");
        assert_eq!(gateway.url("tasks/"), "http://localhost:8000/api/v1/tasks/");
    }

    #[test]
    fn test_auth_header_presence() {
        let config = ApiConfig::default();
        assert!(!Gateway::new(&config, None).is_authenticated());

        let session = Session {
            access_token: "tok".to_string(),
            user: UserProfile {
                id: 1,
                username: "u".to_string(),
                email: None,
                full_name: None,
            },
        };
        assert!(Gateway::new(&config, Some(&session)).is_authenticated());
    }

    #[test]
    fn test_page_deserialization() {
        #[derive(Debug, Deserialize, PartialEq, Clone)]
        struct Row {
            id: u64,
        }

        let json = r#"{"count": 2, "next": "http://x/?page=2", "results": [{"id": 1}, {"id": 2}]}"#;
        let page: Page<Row> = serde_json::from_str(json).unwrap();

        assert_eq!(page.count, 2);
        assert_eq!(page.next.as_deref(), Some("http://x/?page=2"));
        assert_eq!(page.previous, None);
        assert_eq!(page.results.len(), 2);
    }

    #[test]
    fn test_empty_page() {
        let page: Page<u32> = Page::empty();
        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
    }
}
