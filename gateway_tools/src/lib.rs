//! Client tools for the external payment gateway.
//!
//! This crate owns everything that speaks the gateway's dialect: the REST client for transaction lookups and FX rate
//! quotes, the bounded retry policy for verification calls, and the normalization of the gateway's (inconsistently
//! named) payload fields into a single [`TransactionDetails`] shape. Both the pull (verify) and push (webhook) paths
//! funnel through that one normalization, so nothing downstream ever branches on provider field names.
mod api;
mod config;
mod error;
mod retry;

mod data_objects;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{RateQuote, TransactionDetails, TransactionStatus, WebhookEnvelope};
pub use error::GatewayError;
pub use retry::RetryPolicy;
