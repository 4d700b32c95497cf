use std::marker::PhantomData;

use futures::future::BoxFuture;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, Transaction};

use crate::errors::RepoError;
use crate::util::{Filter, Inserter, SqlArg, Updater};

pub type RepoFuture<'a, T> = BoxFuture<'a, Result<T, RepoError>>;

/// CRUD over one table, generic in the model, its inserter, its filter and
/// its updater. Every call runs on the caller's transaction.
pub trait DbRepo<T, I, F, U>: Send + Sync
where
    T: Send,
    I: Send,
    F: Send,
    U: Send,
{
    fn insert<'a>(&'a self, conn: &'a Transaction<'_>, inserter: I) -> RepoFuture<'a, Vec<T>>;
    fn insert_exactly_one<'a>(&'a self, conn: &'a Transaction<'_>, inserter: I) -> RepoFuture<'a, T>;
    fn select<'a>(&'a self, conn: &'a Transaction<'_>, filter: F) -> RepoFuture<'a, Vec<T>>;
    fn update<'a>(&'a self, conn: &'a Transaction<'_>, updater: U) -> RepoFuture<'a, Vec<T>>;
    fn delete<'a>(&'a self, conn: &'a Transaction<'_>, filter: F) -> RepoFuture<'a, Vec<T>>;
}

pub struct DbRepoImpl<T, I, F, U> {
    table: &'static str,
    _marker: PhantomData<fn() -> (T, I, F, U)>,
}

impl<T, I, F, U> DbRepoImpl<T, I, F, U> {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            _marker: PhantomData,
        }
    }
}

fn run_query<'a, T>(conn: &'a Transaction<'_>, query: String, args: Vec<SqlArg>) -> RepoFuture<'a, Vec<T>>
where
    T: From<Row> + Send,
{
    Box::pin(async move {
        debug!("Executing query: {}", query);
        let params: Vec<&(dyn ToSql + Sync)> = args
            .iter()
            .map(|arg| arg.as_ref() as &(dyn ToSql + Sync))
            .collect();
        let rows = conn.query(query.as_str(), &params).await?;
        Ok(rows.into_iter().map(T::from).collect())
    })
}

impl<T, I, F, U> DbRepo<T, I, F, U> for DbRepoImpl<T, I, F, U>
where
    T: From<Row> + Send + 'static,
    I: Inserter + Send,
    F: Filter + Send,
    U: Updater + Send,
{
    fn insert<'a>(&'a self, conn: &'a Transaction<'_>, inserter: I) -> RepoFuture<'a, Vec<T>> {
        let (query, args) = inserter.into_insert_builder(self.table).build();
        run_query(conn, query, args)
    }

    fn insert_exactly_one<'a>(&'a self, conn: &'a Transaction<'_>, inserter: I) -> RepoFuture<'a, T> {
        let (query, args) = inserter.into_insert_builder(self.table).build();
        Box::pin(async move {
            let mut rows: Vec<T> = run_query(conn, query, args).await?;
            if rows.len() != 1 {
                return Err(RepoError::NotFound);
            }
            Ok(rows.remove(0))
        })
    }

    fn select<'a>(&'a self, conn: &'a Transaction<'_>, filter: F) -> RepoFuture<'a, Vec<T>> {
        let (query, args) = filter.into_filtered_operation_builder(self.table).build_select();
        run_query(conn, query, args)
    }

    fn update<'a>(&'a self, conn: &'a Transaction<'_>, updater: U) -> RepoFuture<'a, Vec<T>> {
        let (query, args) = updater.into_update_builder(self.table).build();
        run_query(conn, query, args)
    }

    fn delete<'a>(&'a self, conn: &'a Transaction<'_>, filter: F) -> RepoFuture<'a, Vec<T>> {
        let (query, args) = filter.into_filtered_operation_builder(self.table).build_delete();
        run_query(conn, query, args)
    }
}
