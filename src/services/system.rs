use futures::future;
use futures::prelude::*;

use super::types::ServiceFuture;

pub trait SystemService: Send + Sync {
    /// Liveness check
    fn healthcheck(&self) -> ServiceFuture<String>;
}

#[derive(Clone, Debug, Default)]
pub struct SystemServiceImpl;

impl SystemService for SystemServiceImpl {
    fn healthcheck(&self) -> ServiceFuture<String> {
        future::ready(Ok("Ok".to_string())).boxed()
    }
}
