use std::fmt::Debug;

use log::*;

use crate::{
    db_types::NoticeWindow,
    events::{EventProducers, RenewalNoticeEvent, SubscriptionExpiredEvent, SubscriptionRenewedEvent},
    traits::{WalletLedgerDatabase, WalletLedgerError},
};

/// What one scheduler pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenewalRunSummary {
    pub notices_sent: usize,
    pub renewed: usize,
    pub expired: usize,
}

/// `RenewalApi` drives the subscription lifecycle.
///
/// Each pass sends at most one expiration notice per subscription per window (7/3/1 days, tracked by per-window
/// flags), then sweeps past-due subscriptions: auto-renew ones are renewed from the member's wallet balance, and
/// anything that cannot renew is expired with its community access revoked.
pub struct RenewalApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for RenewalApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RenewalApi")
    }
}

impl<B> RenewalApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> RenewalApi<B>
where B: WalletLedgerDatabase
{
    /// One scheduler pass. Safe to run on any interval: notices are idempotent per window and renewals go through
    /// the ledger's atomic primitives.
    pub async fn run_once(&self) -> Result<RenewalRunSummary, WalletLedgerError> {
        let mut summary = RenewalRunSummary::default();
        summary.notices_sent = self.send_due_notices().await?;
        let past_due = self.db.subscriptions_past_due().await?;
        debug!("🗓️ {} subscription(s) past due", past_due.len());
        for sub in past_due {
            if sub.auto_renew {
                match self.db.renew_subscription(&sub).await {
                    Ok(result) => {
                        summary.renewed += 1;
                        for emitter in &self.producers.subscription_renewed_producer {
                            let event = SubscriptionRenewedEvent {
                                subscription: result.subscription.clone(),
                                member_debit: result.member_debit.clone(),
                            };
                            emitter.publish_event(event).await;
                        }
                        continue;
                    },
                    Err(WalletLedgerError::InsufficientFunds { account_id, balance, required }) => {
                        info!(
                            "🗓️ Subscription {} cannot renew: account {account_id} has {balance}, needs {required}",
                            sub.id
                        );
                    },
                    Err(e) => return Err(e),
                }
            }
            let expired = self.db.expire_subscription(&sub).await?;
            summary.expired += 1;
            for emitter in &self.producers.subscription_expired_producer {
                emitter.publish_event(SubscriptionExpiredEvent { subscription: expired.clone() }).await;
            }
        }
        if summary != RenewalRunSummary::default() {
            info!(
                "🗓️ Renewal pass complete: {} notice(s), {} renewed, {} expired",
                summary.notices_sent, summary.renewed, summary.expired
            );
        }
        Ok(summary)
    }

    async fn send_due_notices(&self) -> Result<usize, WalletLedgerError> {
        let mut sent = 0;
        for window in NoticeWindow::ALL {
            let due = self.db.subscriptions_due_for_notice(window).await?;
            for sub in due {
                for emitter in &self.producers.renewal_notice_producer {
                    emitter.publish_event(RenewalNoticeEvent { subscription: sub.clone(), window }).await;
                }
                self.db.mark_notice_sent(sub.id, window).await?;
                sent += 1;
            }
        }
        Ok(sent)
    }
}
