use std::time::Duration;

use failure::Error as FailureError;
use hyper::client::HttpConnector;
use hyper::{Body, Method, Request};
use hyper_tls::HttpsConnector;
use serde::de::DeserializeOwned;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub http_client_retries: usize,
    pub timeout_duration_ms: u64,
}

/// Non-2xx answer from a remote service, kept verbatim for passthrough.
#[derive(Debug, Fail)]
#[fail(display = "HTTP error {}: {}", status, body)]
pub struct ClientError {
    pub status: u16,
    pub body: String,
}

/// Outbound JSON client shared by the payment and mail integrations.
/// Transport failures and timeouts are retried, HTTP error statuses are not.
pub struct HttpClient {
    inner: hyper::Client<HttpsConnector<HttpConnector>>,
    config: Config,
}

impl HttpClient {
    pub fn new(config: &Config) -> Self {
        let connector = HttpsConnector::new();
        Self {
            inner: hyper::Client::builder().build::<_, Body>(connector),
            config: config.clone(),
        }
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        headers: Option<Vec<(&'static str, String)>>,
    ) -> Result<T, FailureError> {
        let bytes = self.request_raw(method, url, body, headers).await?;
        serde_json::from_slice(&bytes).map_err(From::from)
    }

    /// Fire a request and only check the status, discarding the body.
    pub async fn request_ack(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        headers: Option<Vec<(&'static str, String)>>,
    ) -> Result<(), FailureError> {
        self.request_raw(method, url, body, headers).await.map(|_| ())
    }

    async fn request_raw(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        headers: Option<Vec<(&'static str, String)>>,
    ) -> Result<Vec<u8>, FailureError> {
        let mut last_error = format_err!("Request to {} was never attempted", url);

        for attempt in 0..=self.config.http_client_retries {
            if attempt > 0 {
                debug!("Retrying {} {} (attempt {})", method, url, attempt + 1);
            }

            let mut builder = Request::builder().method(method.clone()).uri(url.as_str());
            if let Some(ref headers) = headers {
                for (name, value) in headers {
                    builder = builder.header(*name, value.as_str());
                }
            }
            let request = builder
                .body(match body {
                    Some(ref b) => Body::from(b.clone()),
                    None => Body::empty(),
                })
                .map_err(FailureError::from)?;

            let timeout = Duration::from_millis(self.config.timeout_duration_ms);
            match tokio::time::timeout(timeout, self.inner.request(request)).await {
                Err(_) => {
                    warn!("Request to {} timed out after {:?}", url, timeout);
                    last_error = format_err!("Request to {} timed out after {:?}", url, timeout);
                }
                Ok(Err(e)) => {
                    warn!("Transport error talking to {}: {}", url, e);
                    last_error = e.into();
                }
                Ok(Ok(response)) => {
                    let status = response.status();
                    let bytes = hyper::body::to_bytes(response.into_body())
                        .await
                        .map_err(FailureError::from)?;
                    if status.is_success() {
                        return Ok(bytes.to_vec());
                    }
                    return Err(ClientError {
                        status: status.as_u16(),
                        body: String::from_utf8_lossy(&bytes).into_owned(),
                    }
                    .into());
                }
            }
        }

        Err(last_error)
    }
}
