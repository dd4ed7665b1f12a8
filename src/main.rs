use actix_cors::Cors;
use actix_web::{
    http::header,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpServer,
};
use clap::Parser;
use std::path::PathBuf;
use wildhaven_backend::{config::Config, routes, Services};

#[derive(Parser, Debug)]
#[command(name = "wildhaven_server", author, version, about = "Starts the Wild Haven API server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

fn build_cors(allowed_origins: &str) -> Cors {
    let cors = if allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).map_err(|e| {
        eprintln!("FATAL: Failed to load or parse configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let services = Services::bootstrap(&config).await.map_err(|e| {
        log::error!("FATAL: Failed to initialise storage: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let app_state = web::Data::new(services.state);
    let local_storage = web::Data::from(services.local_storage);
    let json_limit = config.json_limit_bytes();

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let api_prefix = config.api_prefix.clone();
        App::new()
            .wrap(build_cors(&config.allowed_origins))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("Referrer-Policy", "no-referrer")),
            )
            .app_data(routes::json_config(json_limit))
            .app_data(routes::query_config())
            .app_data(app_state.clone())
            .app_data(local_storage.clone())
            .configure(move |cfg| routes::configure(cfg, &api_prefix))
    })
    .bind(server_address)?
    .run()
    .await
}
