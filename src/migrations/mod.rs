use crate::types::DbPool;

/// Idempotent schema setup, run at startup. The UNIQUE constraint on
/// orders.provider_session is what makes payment reconciliation safe under
/// racing webhook and confirmation writers.
pub async fn run(db_pool: &DbPool) -> Result<(), failure::Error> {
    let conn = db_pool
        .get()
        .await
        .map_err(|e| format_err!("Failed to acquire a connection for migrations: {}", e))?;

    conn.batch_execute(
        "
        CREATE TABLE IF NOT EXISTS cart_items (
            id          SERIAL PRIMARY KEY,
            customer    INTEGER NOT NULL,
            product_id  INTEGER NOT NULL,
            quantity    INTEGER NOT NULL,
            price       DOUBLE PRECISION NOT NULL,
            name        VARCHAR NOT NULL,
            image       VARCHAR NOT NULL,
            description VARCHAR,

            CONSTRAINT cart_line UNIQUE (customer, product_id)
        );

        CREATE TABLE IF NOT EXISTS orders (
            id               UUID PRIMARY KEY,
            slug             SERIAL,
            customer         INTEGER NOT NULL,
            state            VARCHAR NOT NULL,
            payment_status   VARCHAR NOT NULL,
            payment_method   VARCHAR NOT NULL,
            fst_status       VARCHAR,
            total            DOUBLE PRECISION NOT NULL,
            items            INTEGER NOT NULL,
            products         JSONB NOT NULL,
            receiver_name    VARCHAR NOT NULL,
            receiver_email   VARCHAR NOT NULL,
            receiver_phone   VARCHAR,
            address          VARCHAR NOT NULL,
            city             VARCHAR NOT NULL,
            postal_code      VARCHAR NOT NULL,
            country          VARCHAR NOT NULL,
            provider_session VARCHAR,
            created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at       TIMESTAMPTZ NOT NULL DEFAULT now(),

            CONSTRAINT order_provider_session UNIQUE (provider_session)
        );

        CREATE TABLE IF NOT EXISTS order_events (
            id           UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            parent       UUID NOT NULL REFERENCES orders (id),
            source       VARCHAR NOT NULL,
            committed_at TIMESTAMPTZ NOT NULL,
            state        VARCHAR NOT NULL,
            comment      VARCHAR
        );

        CREATE TABLE IF NOT EXISTS admins (
            id            SERIAL PRIMARY KEY,
            email         VARCHAR NOT NULL UNIQUE,
            password_hash VARCHAR NOT NULL,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
        );

        CREATE TABLE IF NOT EXISTS admin_sessions (
            token      VARCHAR PRIMARY KEY,
            admin_id   INTEGER NOT NULL REFERENCES admins (id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            expires_at TIMESTAMPTZ NOT NULL
        );
        ",
    )
    .await?;

    info!("Database schema is up to date");
    Ok(())
}
