use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};
use billing_engine::{events::EventProducers, InvoiceFlowApi, SqliteDatabase};
use log::info;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    routes::{batch_generate, generate_invoice, health},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db, EventProducers::default())?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Assembles the HTTP server. `producers` lets the binary attach invoice-created / invoice-voided subscribers
/// (document rendering, notification delivery) without the server knowing anything about them.
pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let flow_api = InvoiceFlowApi::new(db.clone(), producers.clone())
            .with_fee_config(config.fees.clone())
            .with_numbering(config.numbering.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("rbg::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(config.clone()))
            .service(health)
            .service(generate_invoice)
            .service(batch_generate)
    })
    .bind((host.as_str(), port))?
    .run();
    info!("🚀️ Billing server listening on {host}:{port}");
    Ok(srv)
}
