//! Wallet Payment Engine
//!
//! The wallet payment engine keeps the books for the student wallet platform: an append-only ledger per account, the
//! reconciliation of external payment-gateway events into exactly-once ledger effects, revenue splits between the
//! platform and content owners, and balance-funded subscription renewals. It is transport-agnostic; the HTTP surface
//! lives in the server crate.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). The backend owns every multi-step atomic flow: if a method
//!    writes more than one row, it opens the transaction itself and either commits everything or nothing. You should
//!    never need to access the database directly; use the public API instead. The exception is the data types used in
//!    the database, which are defined in [`db_types`] and are public.
//! 2. The engine public API ([`mod@wpe_api`]). Thin wrappers, generic over the backend traits in [`mod@traits`], that
//!    add event publication and policy (FX caching, renewal notice windows) on top of the atomic backend operations.
//! 3. Event hooks ([`mod@events`]). Fire-and-forget notifications (wallet funded, purchase completed, renewal notices)
//!    that downstream services such as email can subscribe to. A failing hook never affects a ledger transaction.
pub mod db_types;
pub mod events;
pub mod traits;
pub mod wpe_api;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{AccountManagement, WalletLedgerDatabase, WalletLedgerError};
pub use wpe_api::{
    fx_api::FxApi,
    reconciliation_api::ReconciliationApi,
    renewal_api::RenewalApi,
    wallet_api::WalletApi,
};
