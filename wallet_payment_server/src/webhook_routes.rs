//----------------------------------------------   Webhooks  ----------------------------------------------------
//
// The gateway delivers charge events at least once and retries anything that does not get a 200 back. Only a
// signature failure may return a non-200; every business failure is logged and acknowledged, and the idempotency
// guard in the engine makes redeliveries harmless.

use actix_web::{web, HttpRequest, HttpResponse};
use gateway_tools::WebhookEnvelope;
use log::*;
use wallet_payment_engine::{
    traits::{ReconcileOutcome, WalletLedgerDatabase},
    ReconciliationApi,
};

use crate::{
    config::ServerConfig,
    data_objects::JsonResponse,
    helpers::calculate_hmac,
    integrations::canonical_transaction,
    route,
};

route!(gateway_webhook => Post "/webhooks/{gateway}" impl WalletLedgerDatabase);
/// Route handler for inbound gateway webhooks.
///
/// The signature is an HMAC-SHA256 over the raw, unparsed body, delivered in the `verif-hash` header. It is checked
/// before the body is interpreted in any way. A missing configured secret downgrades to unverified acceptance so
/// that non-production environments keep working, but every such acceptance is logged loudly.
pub async fn gateway_webhook<B: WalletLedgerDatabase>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    config: web::Data<ServerConfig>,
    api: web::Data<ReconciliationApi<B>>,
) -> HttpResponse {
    let gateway = path.into_inner();
    trace!("📬️ Received {gateway} webhook ({} bytes)", body.len());
    let secret = config.webhook_secret.reveal();
    if secret.is_empty() {
        warn!("📬️ No webhook secret is configured. Accepting the {gateway} webhook WITHOUT signature verification.");
    } else {
        let expected = calculate_hmac(secret, &body);
        let provided = req.headers().get("verif-hash").and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_str()) {
            warn!("📬️ Invalid or missing signature on a {gateway} webhook. Rejecting.");
            return HttpResponse::Unauthorized().json(JsonResponse::failure("Invalid webhook signature."));
        }
        trace!("📬️ Webhook signature check ✅️");
    }
    // From here on the gateway always gets a 200, so that it stops redelivering.
    let envelope = match serde_json::from_slice::<WebhookEnvelope>(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("📬️ Could not parse {gateway} webhook body. {e}");
            return HttpResponse::Ok().json(JsonResponse::failure("Could not parse webhook body."));
        },
    };
    if !envelope.is_charge_event() {
        debug!("📬️ Ignoring {gateway} webhook event type {}", envelope.event);
        return HttpResponse::Ok().json(JsonResponse::success("Event type ignored."));
    }
    let details = match envelope.transaction() {
        Ok(details) => details,
        Err(e) => {
            warn!("📬️ Could not normalize {gateway} webhook transaction. {e}");
            return HttpResponse::Ok().json(JsonResponse::failure("Could not normalize transaction payload."));
        },
    };
    let txn = canonical_transaction(details);
    let result = match api.process_webhook_event(&txn).await {
        Ok(ReconcileOutcome::Applied { record, new_balance, .. }) => {
            info!("📬️ Webhook applied {} ({}). New balance: {new_balance}", record.reference, record.payment_type);
            JsonResponse::success("Transaction applied.")
        },
        Ok(ReconcileOutcome::AlreadyProcessed { record }) => {
            debug!("📬️ Webhook replay for {}; already {}", record.reference, record.status);
            JsonResponse::success("Transaction was already processed.")
        },
        Ok(ReconcileOutcome::Ignored { reference }) => {
            debug!("📬️ Webhook for unknown transaction {reference} acknowledged without effect");
            JsonResponse::success("Acknowledged.")
        },
        Err(e) => {
            // Business failures (amount/currency mismatch, failed gateway status) are recorded on the payment record
            // by the engine. The gateway still gets its 200; redelivering the same event cannot fix the mismatch.
            warn!("📬️ Webhook for {} was rejected. {e}", txn.key());
            JsonResponse::failure(e.to_string())
        },
    };
    HttpResponse::Ok().json(result)
}
