use bb8_postgres::PostgresConnectionManager;
use tokio_postgres::NoTls;

pub type DbPool = bb8::Pool<PostgresConnectionManager<NoTls>>;
