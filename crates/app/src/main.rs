//! Process entry: logging, configuration, the database pool, the template
//! engine, the route table and the server, torn down in reverse on exit.

mod auth;
mod config;
mod filters;
mod handlers;
mod models;
mod page;
mod session;
mod state;

use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use weblog_orm::MySqlDb;
use weblog_web::{handler_fn, AccessLog, Interceptors, Server, Views};

use crate::auth::AuthInterceptor;
use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cfg = AppConfig::load()?;

    let db = MySqlDb::connect(&cfg.db).await?;
    info!(database = %cfg.db.database, "connected database pool");

    let state = Arc::new(AppState { db, secret: cfg.session.secret.clone() });

    let mut views = Views::from_dir(&cfg.templates_dir);
    views.env_mut().add_filter("datetime", filters::datetime);

    let router = handlers::routes(&state)?;

    let interceptors = Interceptors::builder()
        .add_last(AccessLog)
        .add_last(AuthInterceptor::new(Arc::clone(&state)))
        .build();

    let server = Server::builder()
        .router(router)
        .address((cfg.server.host.as_str(), cfg.server.port))
        .views(views)
        .static_dir(&cfg.static_dir)
        .interceptors(interceptors)
        .default_handler(handler_fn(handlers::not_found_page))
        .build()?;

    info!(host = %cfg.server.host, port = cfg.server.port, "server starting");
    server.serve().await?;

    state.db.close().await;
    info!("database pool closed");
    Ok(())
}
