//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. Any long, non-cpu-bound operation (I/O, database and gateway
//! calls) must therefore be awaited rather than blocked on.
use actix_web::{get, web, HttpResponse, Responder};
use gateway_tools::GatewayApi;
use log::*;
use wallet_payment_engine::{
    db_types::NewPaymentRecord,
    traits::{ReconcileOutcome, WalletLedgerDatabase},
    FxApi,
    ReconciliationApi,
    WalletApi,
};

use crate::{
    data_objects::{
        ConvertParams,
        FundingResult,
        HistoryParams,
        InitiateFundingRequest,
        PurchaseRequest,
        RateResult,
        VerifyFundingRequest,
    },
    errors::ServerError,
    integrations::{canonical_transaction, GatewayRateProvider},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Funding  ----------------------------------------------------

route!(initiate_funding => Post "/wallet/fund/initiate" impl WalletLedgerDatabase);
/// Route handler for the funding initiation endpoint.
///
/// Registers the payment attempt before the customer is redirected to the gateway. The stored record carries the
/// expected amount, currency and payment type, so both the webhook and verification paths can later validate the
/// gateway's claims without trusting its payload.
pub async fn initiate_funding<B: WalletLedgerDatabase>(
    body: web::Json<InitiateFundingRequest>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!(
        "💻️ POST initiate {} of {} {} for account {} ({})",
        req.payment_type, req.amount, req.currency, req.account_id, req.reference
    );
    let mut record = NewPaymentRecord::new(&req.reference, req.amount, &req.currency, req.payment_type, req.account_id);
    if let Some(tag) = &req.period_tag {
        record = record.with_period_tag(tag);
    }
    let record = api.initiate(record).await?;
    Ok(HttpResponse::Ok().json(record))
}

route!(verify_funding => Post "/wallet/fund/verify" impl WalletLedgerDatabase);
/// Route handler for the client-triggered verification endpoint.
///
/// Looks the transaction up at the gateway (with bounded retries for "not found"), normalizes it into the canonical
/// transaction shape and hands it to the reconciliation coordinator. Replays are success-shaped: a transaction that
/// was already processed reports its recorded state rather than an error.
pub async fn verify_funding<B: WalletLedgerDatabase>(
    body: web::Json<VerifyFundingRequest>,
    gateway: web::Data<GatewayApi>,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST verify funding for {}", req.transaction_reference);
    let details = gateway.verify_transaction(&req.transaction_reference).await?;
    let txn = canonical_transaction(details);
    let outcome = api.reconcile(&txn, None).await?;
    match outcome {
        ReconcileOutcome::Applied { record, new_balance, .. } => {
            info!("💻️ Funding {} applied. New balance: {new_balance}", record.reference);
            Ok(HttpResponse::Ok().json(FundingResult::applied(&record, new_balance)))
        },
        ReconcileOutcome::AlreadyProcessed { record } => {
            debug!("💻️ Funding {} was already {}", record.reference, record.status);
            Ok(HttpResponse::Ok().json(FundingResult::already_processed(&record)))
        },
        ReconcileOutcome::Ignored { reference } => {
            Err(ServerError::NoRecordFound(format!("No payment was initiated with reference {reference}")))
        },
    }
}

//----------------------------------------------   Wallet reads  ----------------------------------------------------

route!(balance => Get "/wallet/balance/{account_id}" impl WalletLedgerDatabase);
/// Route handler for the balance endpoint.
///
/// The returned balance is always the signed sum of the account's ledger entries. The first read of an account that
/// still carries a legacy stored balance migrates it into the ledger; the response flags when that happened.
pub async fn balance<B: WalletLedgerDatabase>(
    path: web::Path<i64>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    debug!("💻️ GET balance for account {account_id}");
    let summary = api.balance(account_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(history => Get "/wallet/history/{account_id}" impl WalletLedgerDatabase);
pub async fn history<B: WalletLedgerDatabase>(
    path: web::Path<i64>,
    params: web::Query<HistoryParams>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let account_id = path.into_inner();
    let count = params.count.unwrap_or(50).clamp(1, 500);
    debug!("💻️ GET history for account {account_id} (last {count})");
    let entries = api.history(account_id, count).await?;
    Ok(HttpResponse::Ok().json(entries))
}

//----------------------------------------------   Purchases  ----------------------------------------------------

route!(purchase => Post "/purchase" impl WalletLedgerDatabase);
/// Route handler for wallet-funded purchases.
///
/// Settles the purchase from the buyer's existing balance: buyer debit, owner credit and commission record are one
/// atomic unit in the engine. An underfunded wallet rejects the purchase without any writes.
pub async fn purchase<B: WalletLedgerDatabase>(
    body: web::Json<PurchaseRequest>,
    api: web::Data<WalletApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST purchase {} for buyer {}", req.reference, req.buyer_account_id);
    let result = api.purchase(req.into()).await?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   FX  ----------------------------------------------------

/// Route handler for display-currency conversions.
///
/// Rates come from the gateway with a short-lived cache; when the gateway cannot answer, the static fallback table
/// does, and the response says so.
#[get("/rates/{from}/{to}")]
pub async fn exchange_rate(
    path: web::Path<(String, String)>,
    params: web::Query<ConvertParams>,
    fx: web::Data<FxApi<GatewayRateProvider>>,
) -> Result<HttpResponse, ServerError> {
    let (from, to) = path.into_inner();
    debug!("💻️ GET rate {from}->{to}");
    let rate = fx.rate(&from, &to).await?;
    let converted_amount = params.amount.map(|amount| rate.convert(amount));
    let result = RateResult {
        source_currency: rate.source_currency.clone(),
        destination_currency: rate.destination_currency.clone(),
        rate: rate.rate,
        used_fallback: rate.is_fallback,
        converted_amount,
    };
    Ok(HttpResponse::Ok().json(result))
}
