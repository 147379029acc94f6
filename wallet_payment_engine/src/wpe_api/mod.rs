//! # Wallet payment engine public API
//!
//! The `wpe_api` module exposes the programmatic API for the wallet payment engine.
//! The API is modular, so that clients of the API can pick and choose the functionality they want, and each API is
//! generic over the backend traits it needs, so a different backend (e.g. Postgres) only has to implement the traits.
//!
//! * [`wallet_api`] provides wallet reads and wallet-funded spending: balance materialization, ledger history and
//!   direct purchases from balance.
//! * [`reconciliation_api`] is the coordinator for external gateway events. Both the webhook and verification paths
//!   feed canonical transactions into it, and it guarantees exactly-once ledger effects per reference.
//! * [`fx_api`] converts amounts between currencies with a short-lived cache and a static fallback table.
//! * [`renewal_api`] drives the subscription renewal scheduler: staged notices, balance-funded renewals, expiry.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use wallet_payment_engine::{events::EventProducers, SqliteDatabase, WalletApi};
//! let db = SqliteDatabase::new(5).await?;
//! // SqliteDatabase implements WalletLedgerDatabase
//! let api = WalletApi::new(db, EventProducers::default());
//! let summary = api.balance(account_id).await?;
//! ```

pub mod exchange_objects;
pub mod fx_api;
pub mod reconciliation_api;
pub mod renewal_api;
pub mod wallet_api;
