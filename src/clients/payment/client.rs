use std::sync::Arc;

use futures::future::BoxFuture;
use futures::prelude::*;
use hyper::Method;

use super::model::*;
use crate::config;
use crate::errors::Error;
use crate::http::client::HttpClient;
use crate::models::ProviderSessionId;

pub type ClientFuture<T> = BoxFuture<'static, Result<T, failure::Error>>;

/// Hosted-checkout API of the payment provider.
pub trait PaymentClient: Send + Sync {
    /// Create a checkout session and get back its hosted page URL.
    fn create_session(&self, request: CheckoutSessionRequest) -> ClientFuture<CheckoutSession>;
    /// Fetch a session by id. The success-page flow goes through this
    /// instead of trusting the client's claim of payment.
    fn fetch_session(&self, id: ProviderSessionId) -> ClientFuture<CheckoutSession>;
}

#[derive(Clone)]
pub struct HttpPaymentClient {
    http: Arc<HttpClient>,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentClient {
    pub fn new(http: Arc<HttpClient>, config: &config::Payment) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Authorization", format!("Bearer {}", self.secret_key)),
            ("Content-Type", "application/json".to_string()),
        ]
    }
}

impl PaymentClient for HttpPaymentClient {
    fn create_session(&self, request: CheckoutSessionRequest) -> ClientFuture<CheckoutSession> {
        let self_clone = self.clone();
        let url = format!("{}/v1/checkout/sessions", self.base_url);
        async move {
            let body = serde_json::to_string(&request)?;
            self_clone
                .http
                .request_json::<CheckoutSession>(Method::POST, url, Some(body), Some(self_clone.headers()))
                .await
                .map_err(|e| e.context(Error::Gateway).into())
        }
        .boxed()
    }

    fn fetch_session(&self, id: ProviderSessionId) -> ClientFuture<CheckoutSession> {
        let self_clone = self.clone();
        let url = format!("{}/v1/checkout/sessions/{}", self.base_url, id);
        async move {
            self_clone
                .http
                .request_json::<CheckoutSession>(Method::GET, url, None, Some(self_clone.headers()))
                .await
                .map_err(|e| e.context(Error::Gateway).into())
        }
        .boxed()
    }
}
