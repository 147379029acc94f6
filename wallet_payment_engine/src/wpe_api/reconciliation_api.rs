use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{ExternalTransaction, NewPaymentRecord, PaymentRecord, PaymentType},
    events::{EventProducers, PurchaseCompletedEvent, WalletFundedEvent},
    traits::{ExpectedEffect, ReconcileOutcome, WalletLedgerDatabase, WalletLedgerError},
};

/// `ReconciliationApi` is the coordinator for external payment-gateway events.
///
/// Both delivery channels land here with the same canonical [`ExternalTransaction`] shape: the webhook ingestor calls
/// [`Self::process_webhook_event`], and the client-triggered verification path calls [`Self::reconcile`] after the
/// verification client has fetched the transaction. The backend guarantees exactly-once ledger effects per external
/// reference; this layer adds payment initiation and fire-and-forget notifications on top.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> ReconciliationApi<B>
where B: WalletLedgerDatabase
{
    /// Register a payment attempt before the customer is redirected to the gateway. The stored record carries the
    /// expected amount and effect, so later gateway events can be validated without trusting their payload.
    pub async fn initiate(&self, new_record: NewPaymentRecord) -> Result<PaymentRecord, WalletLedgerError> {
        self.db.initiate_payment(new_record).await
    }

    /// Reconcile a canonical transaction from the verification path, where the caller knows the expected effect.
    pub async fn reconcile(
        &self,
        txn: &ExternalTransaction,
        expected: Option<&ExpectedEffect>,
    ) -> Result<ReconcileOutcome, WalletLedgerError> {
        let outcome = self.db.apply_reconciliation(txn, expected).await?;
        self.publish_hooks(&outcome).await;
        Ok(outcome)
    }

    /// Reconcile a webhook-delivered transaction. Webhooks carry no caller expectation; the payment record created at
    /// initiation time is the expectation, and events matching no record are acknowledged without effect.
    ///
    /// The gateway retries webhooks indefinitely, so this must be safe to call any number of times for the same
    /// event; the backend's idempotency guard makes every call after the first a read.
    pub async fn process_webhook_event(
        &self,
        txn: &ExternalTransaction,
    ) -> Result<ReconcileOutcome, WalletLedgerError> {
        let outcome = self.db.apply_reconciliation(txn, None).await?;
        match &outcome {
            ReconcileOutcome::Applied { record, .. } => {
                debug!("🔄️💰️ Webhook for {} applied ({})", record.reference, record.payment_type)
            },
            ReconcileOutcome::AlreadyProcessed { record } => {
                debug!("🔄️💰️ Webhook replay for {} ignored; already {}", record.reference, record.status)
            },
            ReconcileOutcome::Ignored { reference } => {
                debug!("🔄️💰️ Webhook for unknown transaction {reference} acknowledged without effect")
            },
        }
        self.publish_hooks(&outcome).await;
        Ok(outcome)
    }

    async fn publish_hooks(&self, outcome: &ReconcileOutcome) {
        let ReconcileOutcome::Applied { record, new_balance, split, .. } = outcome else {
            return;
        };
        for emitter in &self.producers.wallet_funded_producer {
            emitter.publish_event(WalletFundedEvent::new(record, *new_balance)).await;
        }
        if record.payment_type == PaymentType::MarketplacePurchase {
            if let Some(split) = split {
                for emitter in &self.producers.purchase_completed_producer {
                    let event = PurchaseCompletedEvent {
                        timestamp: chrono::Utc::now(),
                        buyer_account_id: record.account_id.unwrap_or_default(),
                        reference: record.reference.clone(),
                        split: *split,
                    };
                    emitter.publish_event(event).await;
                }
            }
        }
    }
}
