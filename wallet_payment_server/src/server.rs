use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use gateway_tools::GatewayApi;
use log::*;
use wallet_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    FxApi,
    ReconciliationApi,
    SqliteDatabase,
    WalletApi,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::GatewayRateProvider,
    renewal_worker::start_renewal_worker,
    routes::{
        exchange_rate,
        health,
        BalanceRoute,
        HistoryRoute,
        InitiateFundingRoute,
        PurchaseRoute,
        VerifyFundingRoute,
    },
    webhook_routes::GatewayWebhookRoute,
};

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, default_event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    start_renewal_worker(db.clone(), producers.clone(), config.renewal_interval);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let gateway = GatewayApi::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if !gateway.has_credentials() {
        warn!("🪛️ No gateway credentials configured. Verification calls will fail and FX will use fallback rates.");
    }
    // The FX cache is shared across workers, so the api is constructed once and handed out as Data.
    let fx = web::Data::new(FxApi::new(GatewayRateProvider::new(gateway.clone())));
    let gateway = web::Data::new(gateway);
    let srv = HttpServer::new(move || {
        let reconciliation_api = ReconciliationApi::new(db.clone(), producers.clone());
        let wallet_api = WalletApi::new(db.clone(), producers.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("wps::access_log"))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(wallet_api))
            .app_data(gateway.clone())
            .app_data(fx.clone())
            .service(health)
            .service(exchange_rate)
            .service(InitiateFundingRoute::<SqliteDatabase>::new())
            .service(VerifyFundingRoute::<SqliteDatabase>::new())
            .service(BalanceRoute::<SqliteDatabase>::new())
            .service(HistoryRoute::<SqliteDatabase>::new())
            .service(PurchaseRoute::<SqliteDatabase>::new())
            .service(GatewayWebhookRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// The default event subscribers: structured log lines for every hook. Email and chat notifiers subscribe here when
/// they are wired in.
pub fn default_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_wallet_funded(|event| {
        Box::pin(async move {
            info!(
                "📬️ Wallet funded: {} for account {}. New balance: {} ({})",
                event.amount, event.account_id, event.new_balance, event.reference
            );
        })
    });
    hooks.on_purchase_completed(|event| {
        Box::pin(async move {
            info!(
                "📬️ Purchase {} completed for buyer {}. Owner share {}, platform share {}",
                event.reference, event.buyer_account_id, event.split.owner_share, event.split.platform_share
            );
        })
    });
    hooks.on_renewal_notice(|event| {
        Box::pin(async move {
            info!(
                "📬️ Renewal notice ({} day window) for subscription {} in community {}",
                event.window.days(),
                event.subscription.id,
                event.subscription.community_id
            );
        })
    });
    hooks.on_subscription_renewed(|event| {
        Box::pin(async move {
            info!(
                "📬️ Subscription {} renewed until {}",
                event.subscription.id, event.subscription.next_billing_date
            );
        })
    });
    hooks.on_subscription_expired(|event| {
        Box::pin(async move {
            info!("📬️ Subscription {} expired; community access revoked", event.subscription.id);
        })
    });
    hooks
}
