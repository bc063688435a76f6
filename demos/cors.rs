use std::collections::HashMap;

use actix_cors_policy::{keys, ConfigValue, Cors};
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!("starting HTTP server at http://localhost:8080");

    // app-wide defaults; builder options take precedence over these
    let mut config = HashMap::new();
    config.insert(
        keys::ORIGINS.to_owned(),
        ConfigValue::from(vec!["http://project.local:8080", "http://localhost:8080"]),
    );
    config.insert(keys::MAX_AGE.to_owned(), ConfigValue::Number(3600));

    HttpServer::new(move || {
        let cors = Cors::default()
            // echo the caller's own origin instead of the serialized list
            .origins_single()
            // set allowed methods list
            .allowed_methods(vec!["GET", "POST"])
            // set allowed request header list
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT])
            // add header to allowed list
            .allowed_header(header::CONTENT_TYPE)
            // set list of headers that are safe to expose
            .expose_headers(vec![header::CONTENT_DISPOSITION])
            // remaining options come from the app config above
            .finish_with(&config)
            .expect("valid CORS configuration");

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .default_service(web::to(|| async { "Hello, cross-origin world!" }))
    })
    .workers(1)
    .bind(("127.0.0.1", 8080))?
    .run()
    .await
}
