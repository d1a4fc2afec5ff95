use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use dotenvy::dotenv;
use loadify_market::config::Config;
use loadify_market::infrastructure::mailer::HttpMailer;
use loadify_market::infrastructure::order_repo::DieselOrderRepository;
use loadify_market::infrastructure::outbox_repo::DieselOutboxRepository;
use loadify_market::infrastructure::shipment_repo::DieselShipmentRepository;
use loadify_market::infrastructure::storage::RestStorage;
use loadify_market::infrastructure::stripe::StripeClient;
use loadify_market::infrastructure::user_repo::DieselUserRepository;
use loadify_market::{build_server, create_pool, run_migrations, AppState, Ports, Settings};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url)?;
    run_migrations(&pool)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;

    let ports = Ports {
        orders: Arc::new(DieselOrderRepository::new(pool.clone())),
        shipments: Arc::new(DieselShipmentRepository::new(pool.clone())),
        outbox: Arc::new(DieselOutboxRepository::new(pool.clone())),
        users: Arc::new(DieselUserRepository::new(pool)),
        payments: Arc::new(StripeClient::new(
            http.clone(),
            &config.stripe_secret_key,
            &config.stripe_webhook_secret,
            &config.stripe_api_base,
            &config.currency,
            &config.site_url,
            config.webhook_tolerance_secs,
        )),
        mailer: Arc::new(HttpMailer::new(
            http.clone(),
            &config.mail_api_url,
            &config.mail_api_key,
            &config.mail_from,
        )),
        storage: Arc::new(RestStorage::new(
            http,
            &config.storage_url,
            &config.storage_service_key,
        )),
    };

    let state = web::Data::new(AppState::new(ports, Settings::from(&config)));

    let dispatcher =
        state.outbox_dispatcher(config.outbox_batch_size, config.outbox_max_attempts);
    actix_web::rt::spawn(dispatcher.run(config.outbox_poll_interval));

    log::info!(
        "Starting server at http://{}:{} ({} environment)",
        config.host,
        config.port,
        config.environment
    );

    build_server(state, &config.host, config.port)?.await?;
    Ok(())
}
