//! # Wallet payment server
//! This crate hosts the HTTP surface for the wallet payment engine. It is responsible for:
//! Listening for incoming webhook events from the payment gateway and verifying their signatures.
//! Serving the client-triggered verification path (verify a gateway transaction, then reconcile it).
//! Serving wallet reads (balance, history) and wallet-funded purchases.
//! Running the background subscription renewal worker.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhooks/{gateway}`: The webhook ingestor for gateway charge events.
//! * `/wallet/fund/initiate`, `/wallet/fund/verify`: The funding flow.
//! * `/wallet/balance/{account_id}`, `/wallet/history/{account_id}`: Wallet reads.
//! * `/purchase`: Wallet-funded marketplace purchases.
//! * `/rates/{from}/{to}`: Currency conversion for display purposes.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod renewal_worker;
pub mod routes;
pub mod server;
pub mod webhook_routes;
