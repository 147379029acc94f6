//! Endpoint tests for the webhook ingestor: signature enforcement and end-to-end funding through the HTTP surface.
use actix_web::{test, web, App};
use wallet_payment_engine::{
    db_types::{Money, NewPaymentRecord, PaymentType},
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    AccountManagement,
    ReconciliationApi,
    SqliteDatabase,
    WalletLedgerDatabase,
};
use wallet_payment_server::{
    config::ServerConfig,
    helpers::calculate_hmac,
    routes::health,
    webhook_routes::GatewayWebhookRoute,
};
use wpg_common::Secret;

const WEBHOOK_SECRET: &str = "test-webhook-secret";

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn test_config() -> ServerConfig {
    ServerConfig { webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()), ..Default::default() }
}

fn charge_body(reference: &str, amount: f64) -> String {
    serde_json::json!({
        "event": "charge.completed",
        "data": {
            "id": 424242,
            "tx_ref": reference,
            "amount": amount,
            "currency": "NGN",
            "status": "successful"
        }
    })
    .to_string()
}

macro_rules! webhook_app {
    ($db:expr) => {{
        let api = ReconciliationApi::new($db.clone(), EventProducers::default());
        test::init_service(
            App::new()
                .app_data(web::Data::new(test_config()))
                .app_data(web::Data::new(api))
                .service(health)
                .service(GatewayWebhookRoute::<SqliteDatabase>::new()),
        )
        .await
    }};
}

#[actix_web::test]
async fn health_check() {
    let db = new_db().await;
    let app = webhook_app!(db);
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn webhooks_with_a_bad_signature_are_rejected() {
    let db = new_db().await;
    let app = webhook_app!(db);
    let body = charge_body("TX-SIG", 5000.0);
    let req = test::TestRequest::post()
        .uri("/webhooks/flutterwave")
        .insert_header(("verif-hash", "not-the-right-signature"))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_web::test]
async fn webhooks_without_a_signature_are_rejected_when_a_secret_is_set() {
    let db = new_db().await;
    let app = webhook_app!(db);
    let req = test::TestRequest::post().uri("/webhooks/flutterwave").set_payload(charge_body("TX-SIG2", 1.0)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_web::test]
async fn a_signed_charge_event_funds_the_wallet() {
    let db = new_db().await;
    let account = db.fetch_or_create_account("webhook-student").await.expect("Error creating account");
    let record = NewPaymentRecord::new("TX-WH-1", Money::from(500_000), "NGN", PaymentType::WalletFunding, account.id);
    db.initiate_payment(record).await.expect("Error initiating payment");

    let app = webhook_app!(db);
    let body = charge_body("TX-WH-1", 5000.0);
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    let req = test::TestRequest::post()
        .uri("/webhooks/flutterwave")
        .insert_header(("verif-hash", signature.clone()))
        .set_payload(body.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let balance = db.balance_for_account(account.id, true).await.expect("Error reading balance");
    assert_eq!(balance.balance, Money::from(500_000));

    // Redelivery of the same signed event is acknowledged without a second credit.
    let req = test::TestRequest::post()
        .uri("/webhooks/flutterwave")
        .insert_header(("verif-hash", signature))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let balance = db.balance_for_account(account.id, true).await.expect("Error reading balance");
    assert_eq!(balance.balance, Money::from(500_000));
}

#[actix_web::test]
async fn unknown_references_get_a_200_and_no_record() {
    let db = new_db().await;
    let app = webhook_app!(db);
    let body = charge_body("TX-NOBODY", 100.0);
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    let req = test::TestRequest::post()
        .uri("/webhooks/flutterwave")
        .insert_header(("verif-hash", signature))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(db.fetch_payment_record("TX-NOBODY").await.expect("Error fetching record").is_none());
}

#[actix_web::test]
async fn non_charge_events_are_ignored_politely() {
    let db = new_db().await;
    let app = webhook_app!(db);
    let body = serde_json::json!({"event": "transfer.completed", "data": {}}).to_string();
    let signature = calculate_hmac(WEBHOOK_SECRET, body.as_bytes());
    let req = test::TestRequest::post()
        .uri("/webhooks/flutterwave")
        .insert_header(("verif-hash", signature))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}
