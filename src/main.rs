mod context;
mod core;
mod database;
mod error;
mod handlers;
mod impls;
mod middlewares;
mod response;

use actix_web::web::{get, patch, post, put, resource, scope, Data};
use actix_web::HttpServer;
use sqlx::postgres::PgPoolOptions;

use database::sqlx::PgSqlxManager;
use impls::cache::memory::MemoryCache;
use middlewares::jwt::{Jwt, JWT_SECRET};

#[actix_web::main]
async fn main() -> Result<(), std::io::Error> {
    dotenv::dotenv().ok();
    env_logger::init();
    let database_url = dotenv::var("DATABASE_URL").expect("environment variable DATABASE_URL not been set");
    let jwt_secret = dotenv::var(JWT_SECRET).expect("environment variable JWT_SECRET not been set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");
    log::info!("listening on 0.0.0.0:8000");
    HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(Data::new(PgSqlxManager::new(pool.clone())))
            .app_data(Data::new(MemoryCache::new()))
            .service(
                scope("")
                    .service(resource("login").route(post().to(handlers::login)))
                    .service(resource("signup").route(post().to(handlers::signup)))
                    .service(
                        scope("")
                            .wrap(Jwt::new(jwt_secret.as_bytes().to_owned()))
                            .service(
                                scope("forms")
                                    .route("", post().to(handlers::form::create))
                                    .route("", get().to(handlers::form::list))
                                    .service(
                                        scope("{form_id}")
                                            .route("", get().to(handlers::form::detail::<MemoryCache>))
                                            .route("", put().to(handlers::form::update::<MemoryCache>))
                                            .service(
                                                scope("submissions")
                                                    .route("", post().to(handlers::submission::start::<MemoryCache>))
                                                    .route("", get().to(handlers::submission::list_by_form)),
                                            ),
                                    ),
                            )
                            .service(
                                scope("submissions").service(
                                    scope("{submission_id}")
                                        .route("", get().to(handlers::submission::detail))
                                        .route("answers", patch().to(handlers::submission::upsert_answer::<MemoryCache>))
                                        .route("answers/batch", patch().to(handlers::submission::upsert_answers_batch::<MemoryCache>))
                                        .route("submit", post().to(handlers::submission::submit::<MemoryCache>)),
                                ),
                            ),
                    ),
            )
    })
    .bind(("0.0.0.0", 8000))?
    .run()
    .await
}
