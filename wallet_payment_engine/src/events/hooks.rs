use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    PurchaseCompletedEvent,
    RenewalNoticeEvent,
    SubscriptionExpiredEvent,
    SubscriptionRenewedEvent,
    WalletFundedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub wallet_funded_producer: Vec<EventProducer<WalletFundedEvent>>,
    pub purchase_completed_producer: Vec<EventProducer<PurchaseCompletedEvent>>,
    pub renewal_notice_producer: Vec<EventProducer<RenewalNoticeEvent>>,
    pub subscription_renewed_producer: Vec<EventProducer<SubscriptionRenewedEvent>>,
    pub subscription_expired_producer: Vec<EventProducer<SubscriptionExpiredEvent>>,
}

pub struct EventHandlers {
    pub on_wallet_funded: Option<EventHandler<WalletFundedEvent>>,
    pub on_purchase_completed: Option<EventHandler<PurchaseCompletedEvent>>,
    pub on_renewal_notice: Option<EventHandler<RenewalNoticeEvent>>,
    pub on_subscription_renewed: Option<EventHandler<SubscriptionRenewedEvent>>,
    pub on_subscription_expired: Option<EventHandler<SubscriptionExpiredEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_wallet_funded: hooks.on_wallet_funded.map(|f| EventHandler::new(buffer_size, f)),
            on_purchase_completed: hooks.on_purchase_completed.map(|f| EventHandler::new(buffer_size, f)),
            on_renewal_notice: hooks.on_renewal_notice.map(|f| EventHandler::new(buffer_size, f)),
            on_subscription_renewed: hooks.on_subscription_renewed.map(|f| EventHandler::new(buffer_size, f)),
            on_subscription_expired: hooks.on_subscription_expired.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_wallet_funded {
            result.wallet_funded_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_purchase_completed {
            result.purchase_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_renewal_notice {
            result.renewal_notice_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_subscription_renewed {
            result.subscription_renewed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_subscription_expired {
            result.subscription_expired_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_wallet_funded {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_purchase_completed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_renewal_notice {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_subscription_renewed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_subscription_expired {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_wallet_funded: Option<Handler<WalletFundedEvent>>,
    pub on_purchase_completed: Option<Handler<PurchaseCompletedEvent>>,
    pub on_renewal_notice: Option<Handler<RenewalNoticeEvent>>,
    pub on_subscription_renewed: Option<Handler<SubscriptionRenewedEvent>>,
    pub on_subscription_expired: Option<Handler<SubscriptionExpiredEvent>>,
}

impl EventHooks {
    pub fn on_wallet_funded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WalletFundedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_wallet_funded = Some(Arc::new(f));
        self
    }

    pub fn on_purchase_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PurchaseCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_purchase_completed = Some(Arc::new(f));
        self
    }

    pub fn on_renewal_notice<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RenewalNoticeEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_renewal_notice = Some(Arc::new(f));
        self
    }

    pub fn on_subscription_renewed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SubscriptionRenewedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_subscription_renewed = Some(Arc::new(f));
        self
    }

    pub fn on_subscription_expired<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SubscriptionExpiredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_subscription_expired = Some(Arc::new(f));
        self
    }
}
