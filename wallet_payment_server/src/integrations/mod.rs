//! Adapters between the gateway client's types and the engine's canonical types.
mod gateway;

pub use gateway::{canonical_status, canonical_transaction, GatewayRateProvider};
