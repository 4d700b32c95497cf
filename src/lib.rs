//! Flocon order lifecycle service: customer carts, hosted checkout,
//! payment reconciliation, order tracking and the back-office endpoints.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

use std::net::SocketAddr;
use std::process::exit;
use std::sync::Arc;

use bb8_postgres::PostgresConnectionManager;
use hyper::service::{make_service_fn, service_fn};
use hyper::Server;
use tokio_postgres::NoTls;

pub mod clients;
pub mod config;
pub mod controller;
pub mod errors;
pub mod http;
pub mod migrations;
pub mod models;
pub mod repos;
pub mod router;
pub mod services;
pub mod types;
pub mod util;

use crate::config::Config;
use crate::controller::ControllerImpl;

pub fn start_server(config: Config) {
    env_logger::init();

    let _sentry = config.sentry.as_ref().map(|sentry_config| {
        sentry::init((sentry_config.dsn.clone(), sentry::ClientOptions::default()))
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Unexpected error creating the runtime");

    runtime.block_on(async move {
        let manager = PostgresConnectionManager::new_from_stringlike(&config.db.dsn, NoTls)
            .expect("Invalid database DSN");
        let db_pool = bb8::Pool::builder()
            .build(manager)
            .await
            .expect("Failed to create connection pool");

        migrations::run(&db_pool)
            .await
            .expect("Failed to run database migrations");

        let addr = SocketAddr::new(config.listen.host, config.listen.port);
        let controller = Arc::new(ControllerImpl::new(db_pool, config));

        let make_svc = make_service_fn(move |_conn| {
            let controller = controller.clone();
            async move {
                Ok::<_, std::convert::Infallible>(service_fn(move |request| {
                    let controller = controller.clone();
                    async move {
                        Ok::<_, std::convert::Infallible>(
                            http::controller::serve(&*controller, request).await,
                        )
                    }
                }))
            }
        });

        info!("Listening on {}", addr);
        let server = Server::bind(&addr)
            .serve(make_svc)
            .with_graceful_shutdown(shutdown_signal());
        if let Err(e) = server.await {
            error!("Http server error: {}", e);
            exit(1);
        }
    });
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install the shutdown signal handler");
    info!("Shutdown signal received, draining connections");
}
