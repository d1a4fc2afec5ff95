pub mod application;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::checkout_service::CheckoutService;
use application::invoice_service::InvoiceService;
use application::notification_service::NotificationService;
use application::outbox_dispatcher::OutboxDispatcher;
use application::payment_event_service::PaymentEventService;
use application::shipment_service::ShipmentService;
use auth::Authenticator;
use domain::ports::{
    Mailer, ObjectStorage, OrderRepository, OutboxRepository, PaymentProvider,
    ShipmentRepository, UserRepository,
};
use handlers::openapi::ApiDoc;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    log::info!("Applied {} pending migration(s)", applied.len());
    Ok(())
}

/// Every adapter the services depend on, constructed by the caller.
#[derive(Clone)]
pub struct Ports {
    pub orders: Arc<dyn OrderRepository>,
    pub shipments: Arc<dyn ShipmentRepository>,
    pub outbox: Arc<dyn OutboxRepository>,
    pub users: Arc<dyn UserRepository>,
    pub payments: Arc<dyn PaymentProvider>,
    pub mailer: Arc<dyn Mailer>,
    pub storage: Arc<dyn ObjectStorage>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub proof_bucket: String,
    pub invoice_bucket: String,
    pub internal_api_key: Option<String>,
}

impl From<&config::Config> for Settings {
    fn from(c: &config::Config) -> Self {
        Self {
            jwt_secret: c.jwt_secret.clone(),
            jwt_audience: c.jwt_audience.clone(),
            proof_bucket: c.proof_bucket.clone(),
            invoice_bucket: c.invoice_bucket.clone(),
            internal_api_key: c.internal_api_key.clone(),
        }
    }
}

pub struct AppState {
    pub checkout: CheckoutService,
    pub payments: PaymentEventService,
    pub shipments: ShipmentService,
    pub invoices: Arc<InvoiceService>,
    pub notifications: Arc<NotificationService>,
    pub auth: Authenticator,
    pub internal_api_key: Option<String>,
    outbox: Arc<dyn OutboxRepository>,
}

impl AppState {
    pub fn new(ports: Ports, settings: Settings) -> Self {
        Self {
            checkout: CheckoutService::new(ports.payments.clone()),
            payments: PaymentEventService::new(
                ports.payments,
                ports.orders.clone(),
                ports.users.clone(),
            ),
            shipments: ShipmentService::new(
                ports.orders.clone(),
                ports.shipments,
                ports.users.clone(),
                ports.storage.clone(),
                settings.proof_bucket,
            ),
            invoices: Arc::new(InvoiceService::new(
                ports.orders,
                ports.users.clone(),
                ports.storage,
                settings.invoice_bucket,
            )),
            notifications: Arc::new(NotificationService::new(ports.mailer)),
            auth: Authenticator::new(
                &settings.jwt_secret,
                settings.jwt_audience.as_deref(),
                ports.users,
            ),
            internal_api_key: settings.internal_api_key,
            outbox: ports.outbox,
        }
    }

    /// Background worker sharing this state's notification and invoice services.
    pub fn outbox_dispatcher(&self, batch_size: i64, max_attempts: i32) -> OutboxDispatcher {
        OutboxDispatcher::new(
            self.outbox.clone(),
            self.notifications.clone(),
            self.invoices.clone(),
            batch_size,
            max_attempts,
        )
    }
}

/// Mounts every endpoint; methods without a route answer 405.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    use handlers::*;

    cfg.app_data(json_config())
        .app_data(query_config())
        .service(
            web::resource("/create-checkout")
                .route(web::post().to(checkout::create_checkout))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/stripe-webhook")
                .route(web::post().to(webhook::stripe_webhook))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/create-shipment")
                .route(web::post().to(shipments::create_shipment))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/update-shipment-status")
                .route(web::put().to(shipments::update_shipment_status))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/upload-proof-of-delivery")
                .route(web::post().to(shipments::request_proof_upload))
                .route(web::put().to(shipments::confirm_proof_upload))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/track-shipment")
                .route(web::get().to(tracking::track_shipment))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/generate-invoice")
                .route(web::post().to(invoices::generate_invoice))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            web::resource("/send-email")
                .route(web::post().to(email::send_email))
                .default_service(web::to(method_not_allowed)),
        )
        .service(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or spawning) the returned
/// server.
pub fn build_server(
    state: web::Data<AppState>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(configure_routes)
    })
    .bind((host.to_string(), port))?
    .run())
}
