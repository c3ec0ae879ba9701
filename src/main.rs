use std::time::Duration;

use crate::{
    backend::CatalogBackend, configuration::Configuration,
    configuration_handler::ConfigurationHandler, database_interface::DatabaseInterface,
    http::create_app, local_store::LocalStore,
};
use tokio::time::sleep;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod availability;
mod backend;
mod booking;
mod configuration;
mod configuration_handler;
mod database_interface;
mod http;
mod local_store;
mod schema;
mod status;
#[cfg(test)]
mod testutils;
mod types;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("#################");
    println!("# Salon Booking #");
    println!("#################");

    let configuration = ConfigurationHandler::parse_arguments();

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(?err, "Failed to bind {address}");
            return;
        }
    };
    info!("Accessible at {address}");

    let app = if let Some(database_url) = configuration.database_url() {
        let backend = loop {
            match DatabaseInterface::new(&database_url) {
                Ok(backend) => {
                    info!("Successfully connected to database");
                    break backend;
                }
                Err(err) => {
                    error!(?err, "Failed to establish database connection: {database_url}. Retry in 1 sec. You may want to restart it with database disabled (appointments kept locally).");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        };
        if let Err(err) = backend.insert_default_services() {
            error!(%err, "Failed to seed default services");
        }
        create_app(backend, configuration)
    } else {
        let backend = match configuration.data_file() {
            Some(path) => match LocalStore::with_snapshot(&path) {
                Ok(backend) => backend,
                Err(err) => {
                    error!(%err, "Failed to open local data file");
                    return;
                }
            },
            None => LocalStore::default(),
        };
        if let Err(err) = backend.insert_default_services() {
            error!(%err, "Failed to seed default services");
        }
        create_app(backend, configuration)
    };

    if let Err(err) = axum::serve(listener, app).await {
        error!(?err, "Server stopped");
    }
}
