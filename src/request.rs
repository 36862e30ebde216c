use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::navigation::{Navigator, redirect_to_login};
use crate::token::{TokenStore, TokenStoreError};

/// Body `code` value the backend uses to report an expired session.
pub const SESSION_EXPIRED_CODE: i64 = 401;

#[derive(Debug, Error)]
pub enum RequestError {
    /// No token in the store; the transport was never invoked.
    #[error("not logged in")]
    NotAuthenticated,

    /// The server rejected the stored token; it has been cleared.
    #[error("please log in again")]
    ReauthenticationRequired,

    #[error("invalid request options: {0}")]
    Options(String),

    #[error(transparent)]
    Store(#[from] TokenStoreError),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Caller-supplied request descriptor, shaped like the loosely-typed options
/// object the transport accepts: everything past the URL is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOptions {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub header: Option<HashMap<String, String>>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl RequestOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            data: None,
            header: None,
            timeout_ms: None,
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn header(mut self, header: HashMap<String, String>) -> Self {
        self.header = Some(header);
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Overlay these options onto the default header set. The merge is
    /// shallow: a caller-supplied `header` map replaces the injected one
    /// wholesale, so it carries no `Authorization` key unless the caller put
    /// one there. See DESIGN.md before changing this to a per-key merge.
    fn authorized(mut self, token: &str) -> Self {
        if self.header.is_none() {
            self.header = Some(HashMap::from([(
                "Authorization".to_string(),
                token.to_string(),
            )]));
        }
        self
    }
}

/// What came back from the transport: status, response headers, and the
/// decoded JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub header: HashMap<String, String>,
    pub data: Value,
}

impl Response {
    /// The body-level `code` field, when present and numeric.
    pub fn body_code(&self) -> Option<i64> {
        self.data.get("code").and_then(Value::as_i64)
    }
}

/// Request execution, implemented by [`HttpTransport`] in production and by
/// scripted fakes in tests.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: RequestOptions,
    ) -> impl Future<Output = Result<Response, RequestError>> + Send;
}

/// Production transport over a shared [`reqwest::Client`]. Relative option
/// URLs are joined onto the configured base URL; absolute ones pass through.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), url)
        }
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: RequestOptions) -> Result<Response, RequestError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| RequestError::Options(format!("bad method `{}`", request.method)))?;

        let mut builder = self.client.request(method, self.endpoint(&request.url));
        if let Some(header) = &request.header {
            for (name, value) in header {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }
        if let Some(timeout_ms) = request.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let header = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        // Only the body `code` field is ever inspected, so a non-JSON body
        // decodes to null rather than failing the request.
        let data = response.json::<Value>().await.unwrap_or(Value::Null);

        Ok(Response {
            status,
            header,
            data,
        })
    }
}

/// Perform one request with the stored credential attached.
///
/// With no stored token this redirects to the login route and fails without
/// touching the transport. When the response body reports
/// [`SESSION_EXPIRED_CODE`], the token is cleared, the login redirect fires,
/// and the caller gets [`RequestError::ReauthenticationRequired`]. Transport
/// failures propagate unmodified. Everything else is returned as-is.
pub async fn send_authenticated<S, N, T>(
    store: &S,
    navigator: &N,
    transport: &T,
    options: RequestOptions,
) -> Result<Response, RequestError>
where
    S: TokenStore,
    N: Navigator,
    T: Transport,
{
    let token = match store.get()? {
        Some(token) if !token.is_empty() => token,
        _ => {
            tracing::warn!(url = %options.url, "no stored token, redirecting to login");
            redirect_to_login(navigator);
            return Err(RequestError::NotAuthenticated);
        }
    };

    let response = transport.execute(options.authorized(&token)).await?;

    if response.body_code() == Some(SESSION_EXPIRED_CODE) {
        tracing::warn!("server reported an expired token, redirecting to login");
        // Removal is best-effort; a store failure here must not mask the
        // auth error the caller needs to see.
        if let Err(err) = store.remove() {
            tracing::warn!("failed to clear expired token: {err}");
        }
        redirect_to_login(navigator);
        return Err(RequestError::ReauthenticationRequired);
    }

    Ok(response)
}
