mod auth;
mod cart;
mod config;
mod database;
mod handlers;
mod library;
mod model;
mod player;
mod pricing;
mod search;
mod state;
mod templates;
mod tmdb;
mod watchlist;

use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{middleware::Logger, web, App, HttpServer};
use config::Config;
use log::info;
use state::AppState;
use std::io;
use tmdb::TmdbClient;

fn startup_error<E: std::fmt::Display>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "arc_cinema=debug,actix_web=info");
    }
    env_logger::init();

    let config = Config::from_env();
    let db = config.open_db().map_err(startup_error)?;
    auth::seed_users(&db, config.bcrypt_cost).map_err(startup_error)?;
    let tera = web::Data::new(templates::load().map_err(startup_error)?);
    let state = web::Data::new(AppState::new(
        db,
        config.checkout_delay,
        config.bcrypt_cost,
    ));

    info!("Listening on {}", config.bind);
    let bind = config.bind.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(&config.cookie_key)
                    .name("arc_user")
                    .secure(false),
            ))
            .app_data(tera.clone())
            .app_data(state.clone())
            .data(TmdbClient::new(&config.tmdb_base_url, &config.tmdb_api_key))
            .configure(handlers::routes)
            .default_service(web::route().to(handlers::not_found))
    })
    .bind(bind)?
    .run()
    .await
}
