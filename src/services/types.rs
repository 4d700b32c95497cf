use std::sync::Arc;

use futures::future::BoxFuture;

use crate::errors::RepoError;
use crate::repos::*;

pub type ServiceFuture<T> = BoxFuture<'static, Result<T, failure::Error>>;

pub type CartItemRepoFactory = Arc<dyn Fn() -> Box<dyn CartItemRepo> + Send + Sync>;
pub type OrderRepoFactory = Arc<dyn Fn() -> Box<dyn OrderRepo> + Send + Sync>;
pub type OrderEventRepoFactory = Arc<dyn Fn() -> Box<dyn OrderEventRepo> + Send + Sync>;
pub type AdminRepoFactory = Arc<dyn Fn() -> Box<dyn AdminRepo> + Send + Sync>;
pub type AdminSessionRepoFactory = Arc<dyn Fn() -> Box<dyn AdminSessionRepo> + Send + Sync>;

pub fn pool_error(e: bb8::RunError<tokio_postgres::Error>) -> RepoError {
    RepoError::Connection {
        reason: format!("{}", e),
    }
}
