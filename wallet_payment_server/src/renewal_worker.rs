use std::time::Duration;

use log::*;
use wallet_payment_engine::{events::EventProducers, RenewalApi, SqliteDatabase};
use tokio::task::JoinHandle;

/// Starts the subscription renewal worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every pass sends due expiration notices (at most one per subscription per window) and sweeps past-due
/// subscriptions: auto-renewing ones are renewed from the member's wallet balance and the rest are expired. All of
/// that is idempotent in the engine, so the interval can be as short as desired.
pub fn start_renewal_worker(db: SqliteDatabase, producers: EventProducers, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = RenewalApi::new(db, producers);
        info!("🕰️ Subscription renewal worker started (every {}s)", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running subscription renewal pass");
            match api.run_once().await {
                Ok(summary) => {
                    debug!(
                        "🕰️ Renewal pass done: {} notice(s), {} renewed, {} expired",
                        summary.notices_sent, summary.renewed, summary.expired
                    );
                },
                Err(e) => {
                    error!("🕰️ Error running subscription renewal pass: {e}");
                },
            }
        }
    })
}
