#[macro_use]
extern crate lazy_static;

use std::env;

use actix_files::{Files, NamedFile};
use actix_web::{
    http::{Method, StatusCode},
    middleware,
    web::{self, Data},
    App, Either, HttpResponse, HttpServer, Responder,
};
use chrono::Local;
use log::info;
use tera::Tera;
use tokio::sync::RwLock;

mod errors;
mod ledger;
mod routes;
mod schedule;
mod structs;
mod utils;

use ledger::Ledger;

const STATIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static");
const NOT_FOUND_PAGE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/static/404.html");

pub struct AppState {
    ledger: RwLock<Ledger>,
}

lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = match Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*")) {
            Ok(t) => t,
            Err(e) => {
                log::error!("Parsing error(s): {}", e);
                ::std::process::exit(1);
            }
        };
        tera.autoescape_on(vec![".html"]);
        tera
    };
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::error!("FATAL: {} has an invalid value {:?}: {}", key, raw, e);
            std::process::exit(1);
        }),
        Err(_) => default,
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let host: String = env_or("MCA_HOST", "0.0.0.0".to_owned());
    let port: u16 = env_or("MCA_PORT", 8080);
    let seed_demo: bool = env_or("MCA_SEED_DEMO", true);

    let ledger = if seed_demo {
        Ledger::with_demo_data(Local::now().date_naive()).map_err(errors::AppError::from)?
    } else {
        Ledger::new()
    };
    info!(
        "Ledger ready with {} users and {} deals",
        ledger.users().len(),
        ledger.deals().len()
    );

    // One ledger shared by every worker.
    let state = Data::new(AppState {
        ledger: RwLock::new(ledger),
    });

    info!("Starting HTTP server on http://{}:{}/", host, port);

    HttpServer::new(move || {
        App::new()
            // enable automatic response compression - usually register this first
            .wrap(middleware::Compress::default())
            // enable logger - always register Actix Web Logger middleware last
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(Files::new("/static", STATIC_DIR))
            .configure(routes::configure)
            .default_service(web::to(default_handler))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

async fn default_handler(req_method: Method) -> Result<impl Responder, std::io::Error> {
    match req_method {
        Method::GET => {
            let file = NamedFile::open(NOT_FOUND_PAGE)?
                .customize()
                .with_status(StatusCode::NOT_FOUND);
            Ok(Either::Left(file))
        }
        _ => Ok(Either::Right(HttpResponse::MethodNotAllowed().finish())),
    }
}
